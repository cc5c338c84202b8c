//! Host → worker assignment table.
//!
//! Built once per run, before any task is enqueued, and never modified
//! afterwards. Hosts are remembered in first-seen order so reports list them
//! the way they appeared in the input.

use crate::error::{Error, Result};
use crate::hash::assign_worker;
use std::collections::HashMap;

/// Immutable mapping from host to worker index
#[derive(Debug, Clone)]
pub struct AssignmentTable {
    worker_count: usize,
    /// Unique hosts in first-seen order
    hosts: Vec<String>,
    by_host: HashMap<String, usize>,
}

impl AssignmentTable {
    /// Build the table, hashing each unique host once.
    pub fn build<I, S>(hosts: I, worker_count: usize) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        if worker_count == 0 {
            return Err(Error::config("worker count must be at least 1"));
        }

        let mut table = Self {
            worker_count,
            hosts: Vec::new(),
            by_host: HashMap::new(),
        };

        for host in hosts {
            let host = host.as_ref();
            if table.by_host.contains_key(host) {
                continue;
            }
            let worker = assign_worker(host, worker_count);
            table.by_host.insert(host.to_string(), worker);
            table.hosts.push(host.to_string());
        }

        Ok(table)
    }

    /// Worker that owns `host`, if the host is known
    #[inline]
    pub fn worker_for(&self, host: &str) -> Option<usize> {
        self.by_host.get(host).copied()
    }

    /// Number of workers the table was built for
    #[inline]
    pub fn worker_count(&self) -> usize {
        self.worker_count
    }

    /// Number of unique hosts
    #[inline]
    pub fn len(&self) -> usize {
        self.hosts.len()
    }

    /// Whether the table holds no hosts
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.hosts.is_empty()
    }

    /// Iterate `(host, worker)` pairs in first-seen order
    pub fn iter(&self) -> impl Iterator<Item = (&str, usize)> + '_ {
        self.hosts
            .iter()
            .map(move |h| (h.as_str(), self.by_host[h.as_str()]))
    }

    /// Hosts owned by `worker`, in first-seen order
    pub fn hosts_for(&self, worker: usize) -> Vec<&str> {
        self.iter()
            .filter(|(_, w)| *w == worker)
            .map(|(h, _)| h)
            .collect()
    }

    /// Number of hosts owned by each worker
    pub fn load(&self) -> Vec<usize> {
        let mut load = vec![0; self.worker_count];
        for worker in self.by_host.values() {
            load[*worker] += 1;
        }
        load
    }
}
