//! Connection settings

use shardq_core::{Error, Result};
use std::fmt;
use std::time::Duration;

/// Default PostgreSQL port
pub const DEFAULT_PORT: u16 = 5432;

/// Connection settings for one PostgreSQL / TimescaleDB server
#[derive(Clone, PartialEq, Eq)]
pub struct PgConfig {
    /// Server host name or address
    pub host: String,
    /// Server port
    pub port: u16,
    /// Role to connect as
    pub user: String,
    /// Password, if the server requires one
    pub password: Option<String>,
    /// Database name
    pub dbname: String,
    /// Application name prefix (shown in `pg_stat_activity`)
    pub application_name: String,
    /// Connect timeout
    pub connect_timeout: Duration,
}

impl fmt::Debug for PgConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PgConfig")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("user", &self.user)
            .field("password", &self.password.as_ref().map(|_| "***"))
            .field("dbname", &self.dbname)
            .field("application_name", &self.application_name)
            .field("connect_timeout", &self.connect_timeout)
            .finish()
    }
}

impl PgConfig {
    /// Create settings for `user` on `dbname` at `localhost:5432`
    pub fn new(user: impl Into<String>, dbname: impl Into<String>) -> Self {
        Self {
            host: "localhost".into(),
            port: DEFAULT_PORT,
            user: user.into(),
            password: None,
            dbname: dbname.into(),
            application_name: "shardq".into(),
            connect_timeout: Duration::from_secs(10),
        }
    }

    /// Set the host
    pub fn with_host(mut self, host: impl Into<String>) -> Self {
        self.host = host.into();
        self
    }

    /// Set the port
    pub fn with_port(mut self, port: u16) -> Self {
        self.port = port;
        self
    }

    /// Set the password
    pub fn with_password(mut self, password: impl Into<String>) -> Self {
        self.password = Some(password.into());
        self
    }

    /// Set the application name prefix
    pub fn with_application_name(mut self, name: impl Into<String>) -> Self {
        self.application_name = name.into();
        self
    }

    /// Set the connect timeout
    pub fn with_connect_timeout(mut self, timeout: Duration) -> Self {
        self.connect_timeout = timeout;
        self
    }

    /// Check required fields
    pub fn validate(&self) -> Result<()> {
        if self.host.trim().is_empty() {
            return Err(Error::config("database host cannot be empty"));
        }
        if self.user.trim().is_empty() {
            return Err(Error::config("database user cannot be empty"));
        }
        if self.dbname.trim().is_empty() {
            return Err(Error::config("database name cannot be empty"));
        }
        if self.port == 0 {
            return Err(Error::config("database port cannot be 0"));
        }
        Ok(())
    }

    /// Driver configuration for the session of `worker`
    pub fn to_pg_config(&self, worker: usize) -> tokio_postgres::Config {
        let mut config = tokio_postgres::Config::new();
        config
            .host(&self.host)
            .port(self.port)
            .user(&self.user)
            .dbname(&self.dbname)
            .application_name(&format!("{}-worker-{}", self.application_name, worker))
            .connect_timeout(self.connect_timeout);
        if let Some(password) = &self.password {
            config.password(password);
        }
        config
    }

    /// `host:port/dbname` for logs; never includes credentials
    pub fn endpoint(&self) -> String {
        format!("{}:{}/{}", self.host, self.port, self.dbname)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_password() {
        let config = PgConfig::new("postgres", "homework").with_password("hunter2");
        let debug = format!("{:?}", config);

        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("***"));
        assert!(debug.contains("homework"));
    }

    #[test]
    fn test_driver_config() {
        let config = PgConfig::new("postgres", "homework")
            .with_host("db.internal")
            .with_port(6543)
            .with_password("secret");
        let pg = config.to_pg_config(3);

        assert_eq!(pg.get_user(), Some("postgres"));
        assert_eq!(pg.get_dbname(), Some("homework"));
        assert_eq!(pg.get_ports(), &[6543]);
        assert_eq!(pg.get_application_name(), Some("shardq-worker-3"));
        assert_eq!(pg.get_password(), Some(&b"secret"[..]));
        assert_eq!(pg.get_connect_timeout(), Some(&Duration::from_secs(10)));
    }

    #[test]
    fn test_validate() {
        assert!(PgConfig::new("postgres", "homework").validate().is_ok());
        assert!(PgConfig::new("", "homework").validate().is_err());
        assert!(PgConfig::new("postgres", " ").validate().is_err());
        assert!(PgConfig::new("postgres", "db").with_host("").validate().is_err());
        assert!(PgConfig::new("postgres", "db").with_port(0).validate().is_err());
    }

    #[test]
    fn test_endpoint_has_no_credentials() {
        let config = PgConfig::new("postgres", "homework").with_password("hunter2");
        assert_eq!(config.endpoint(), "localhost:5432/homework");
    }
}
