//! Key hashing for host → worker assignment.
//!
//! The scheduler's ordering guarantee rests on every task for a host landing
//! in the same worker queue, so the mapping must be a pure function of the
//! host name and the worker count. MurmurHash3 (x86, 32-bit, seed 0) is used
//! and its output is read as a *signed* 32-bit integer before the Euclidean
//! modulo, so the mapping agrees with other tools that hash hosts the same
//! way.

/// MurmurHash3 x86_32.
///
/// # Example
/// ```
/// # use shardq_core::hash::murmur3_32;
/// assert_eq!(murmur3_32(b"hello", 0), 0x248b_fa47);
/// ```
pub fn murmur3_32(data: &[u8], seed: u32) -> u32 {
    const C1: u32 = 0xcc9e_2d51;
    const C2: u32 = 0x1b87_3593;

    let len = data.len();
    let mut h = seed;

    let mut chunks = data.chunks_exact(4);
    for chunk in &mut chunks {
        let mut k = u32::from_le_bytes([chunk[0], chunk[1], chunk[2], chunk[3]]);
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);

        h ^= k;
        h = h.rotate_left(13);
        h = h.wrapping_mul(5).wrapping_add(0xe654_6b64);
    }

    // Tail: up to 3 remaining bytes
    let tail = chunks.remainder();
    if !tail.is_empty() {
        let mut k: u32 = 0;
        if tail.len() >= 3 {
            k ^= (tail[2] as u32) << 16;
        }
        if tail.len() >= 2 {
            k ^= (tail[1] as u32) << 8;
        }
        k ^= tail[0] as u32;
        k = k.wrapping_mul(C1);
        k = k.rotate_left(15);
        k = k.wrapping_mul(C2);
        h ^= k;
    }

    // Finalization mix
    h ^= len as u32;
    h ^= h >> 16;
    h = h.wrapping_mul(0x85eb_ca6b);
    h ^= h >> 13;
    h = h.wrapping_mul(0xc2b2_ae35);
    h ^= h >> 16;

    h
}

/// Map a host to a worker index in `0..worker_count`.
///
/// # Panics
///
/// Panics if `worker_count` is zero. Callers validate the worker count as a
/// configuration error before any host is hashed.
#[inline]
pub fn assign_worker(host: &str, worker_count: usize) -> usize {
    assert!(worker_count > 0, "worker count must be at least 1");
    let signed = murmur3_32(host.as_bytes(), 0) as i32 as i64;
    signed.rem_euclid(worker_count as i64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_murmur3_reference_vectors() {
        assert_eq!(murmur3_32(b"", 0), 0);
        assert_eq!(murmur3_32(b"", 1), 0x514e_28b7);
        assert_eq!(murmur3_32(b"", 0xffff_ffff), 0x81f1_6f39);
        assert_eq!(murmur3_32(&[0, 0, 0, 0], 0), 0x2362_f9de);
        assert_eq!(murmur3_32(b"aaaa", 0x9747_b28c), 0x5a97_808a);
        assert_eq!(murmur3_32(b"Hello, world!", 0x9747_b28c), 0x2488_4cba);
        assert_eq!(
            murmur3_32(b"The quick brown fox jumps over the lazy dog", 0x9747_b28c),
            0x2fa8_26cd
        );
    }

    #[test]
    fn test_murmur3_tail_lengths() {
        // Every tail length must change the hash
        let a = murmur3_32(b"host_0", 0);
        let b = murmur3_32(b"host_00", 0);
        let c = murmur3_32(b"host_000", 0);
        assert_ne!(a, b);
        assert_ne!(b, c);
    }

    #[test]
    fn test_assign_worker_signed_modulo() {
        // "hello" hashes to a positive i32
        assert_eq!(assign_worker("hello", 10), 613_153_351 % 10);

        // A hash with the top bit set must still land in range
        let negative = (0..1000)
            .map(|i| format!("host_{i:06}"))
            .find(|h| (murmur3_32(h.as_bytes(), 0) as i32) < 0)
            .expect("some host hashes negative");
        let signed = murmur3_32(negative.as_bytes(), 0) as i32 as i64;
        assert_eq!(
            assign_worker(&negative, 7),
            signed.rem_euclid(7) as usize
        );
        assert!(assign_worker(&negative, 7) < 7);
    }

    #[test]
    fn test_assign_worker_deterministic() {
        for n in 1..16 {
            let first = assign_worker("host_000008", n);
            for _ in 0..10 {
                assert_eq!(assign_worker("host_000008", n), first);
            }
            assert!(first < n);
        }
    }

    #[test]
    fn test_single_worker_takes_everything() {
        for i in 0..100 {
            assert_eq!(assign_worker(&format!("host_{i}"), 1), 0);
        }
    }

    #[test]
    fn test_assign_worker_distribution() {
        let mut counts = [0u32; 8];
        for i in 0..1000 {
            counts[assign_worker(&format!("host_{i:06}"), 8)] += 1;
        }
        for count in &counts {
            assert!(*count > 0, "worker got zero hosts");
        }
    }

    #[test]
    #[should_panic(expected = "worker count must be at least 1")]
    fn test_zero_workers_panics() {
        assign_worker("host", 0);
    }
}
