//! Connection options.

use url::Url;

use crate::error::Error;
use crate::protocol::frontend::Startup;

/// Connection options for PostgreSQL.
#[derive(Debug, Clone)]
pub struct Opts {
    /// Hostname or IP address.
    ///
    /// Default: `""`
    pub host: String,

    /// Port number for the PostgreSQL server.
    ///
    /// Default: `5432`
    pub port: u16,

    /// Unix socket path. Takes precedence over `host` when set.
    ///
    /// Default: `None`
    pub socket: Option<String>,

    /// Username sent in the startup message.
    ///
    /// Default: `""`
    pub user: String,

    /// Database name to use.
    ///
    /// Default: `None`
    pub database: Option<String>,

    /// Password for authentication.
    ///
    /// Only trust authentication is supported, so this is never sent.
    ///
    /// Default: `None`
    pub password: Option<String>,

    /// Application name to report to the server.
    ///
    /// Default: `None`
    pub application_name: Option<String>,

    /// Additional startup parameters.
    ///
    /// Default: `[]`
    pub params: Vec<(String, String)>,
}

impl Default for Opts {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 5432,
            socket: None,
            user: String::new(),
            database: None,
            password: None,
            application_name: None,
            params: Vec::new(),
        }
    }
}

impl Opts {
    /// Parameters for the startup message, in the order they are sent.
    pub fn startup_params(&self) -> Vec<(String, String)> {
        let mut params = vec![("user".to_string(), self.user.clone())];
        if let Some(db) = &self.database {
            params.push(("database".to_string(), db.clone()));
        }
        params.push(("client_encoding".to_string(), "UTF8".to_string()));
        if let Some(app) = &self.application_name {
            params.push(("application_name".to_string(), app.clone()));
        }
        params.extend(self.params.iter().cloned());
        params
    }

    pub fn startup(&self) -> Startup {
        Startup::with_params(self.startup_params())
    }
}

impl TryFrom<&Url> for Opts {
    type Error = Error;

    /// Parse a PostgreSQL connection URL.
    ///
    /// Format: `postgres://[user[:password]@]host[:port][/database][?param1=value1&..]`
    ///
    /// `application_name` and `host` (a Unix socket directory or path) are
    /// recognized query parameters; any other key is sent as a startup parameter.
    fn try_from(url: &Url) -> Result<Self, Self::Error> {
        if !["postgres", "postgresql", "pg"].contains(&url.scheme()) {
            return Err(Error::InvalidUsage(format!(
                "Invalid scheme: expected 'postgres://' or 'postgresql://', got '{}://'",
                url.scheme()
            )));
        }

        let mut opts = Opts {
            host: url.host_str().unwrap_or("localhost").to_string(),
            port: url.port().unwrap_or(5432),
            user: url.username().to_string(),
            password: url.password().map(|s| s.to_string()),
            database: url
                .path()
                .strip_prefix('/')
                .filter(|s| !s.is_empty())
                .map(|s| s.to_string()),
            ..Opts::default()
        };

        for (key, value) in url.query_pairs() {
            match key.as_ref() {
                "application_name" => {
                    opts.application_name = Some(value.to_string());
                }
                "host" if value.starts_with('/') => {
                    opts.socket = Some(value.to_string());
                }
                "host" => {
                    opts.host = value.to_string();
                }
                _ => {
                    opts.params.push((key.to_string(), value.to_string()));
                }
            }
        }

        Ok(opts)
    }
}

impl TryFrom<&str> for Opts {
    type Error = Error;

    fn try_from(s: &str) -> Result<Self, Self::Error> {
        let url = Url::parse(s).map_err(|e| Error::InvalidUsage(format!("Invalid URL: {}", e)))?;
        Self::try_from(&url)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_full_url() {
        let opts = Opts::try_from(
            "postgres://alice:pw@db.example.com:6543/app?application_name=svc&search_path=s1",
        )
        .unwrap();
        assert_eq!(opts.host, "db.example.com");
        assert_eq!(opts.port, 6543);
        assert_eq!(opts.user, "alice");
        assert_eq!(opts.password.as_deref(), Some("pw"));
        assert_eq!(opts.database.as_deref(), Some("app"));
        assert_eq!(opts.application_name.as_deref(), Some("svc"));
        assert_eq!(opts.params, [("search_path".to_string(), "s1".to_string())]);
    }

    #[test]
    fn test_defaults_and_socket() {
        let opts = Opts::try_from("postgres://bob@localhost?host=/var/run/postgresql").unwrap();
        assert_eq!(opts.port, 5432);
        assert_eq!(opts.database, None);
        assert_eq!(opts.socket.as_deref(), Some("/var/run/postgresql"));
    }

    #[test]
    fn test_invalid_scheme() {
        assert!(matches!(
            Opts::try_from("mysql://root@localhost/db"),
            Err(Error::InvalidUsage(_))
        ));
        assert!(Opts::try_from("not a url").is_err());
    }

    #[test]
    fn test_startup_params() {
        let opts = Opts {
            user: "postgres".into(),
            database: Some("postgres".into()),
            application_name: Some("test".into()),
            params: vec![("TimeZone".into(), "UTC".into())],
            ..Opts::default()
        };
        let names: Vec<_> = opts.startup_params().into_iter().map(|(k, _)| k).collect();
        assert_eq!(
            names,
            ["user", "database", "client_encoding", "application_name", "TimeZone"]
        );
    }
}
