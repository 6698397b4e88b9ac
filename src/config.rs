//! Connection settings resolved from the process environment.
//!
//! Every required parameter has a primary variable name and an ordered list of
//! aliases. Resolution is written over a lookup closure so callers (and tests)
//! can supply their own environment.

use std::fmt;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::RelayError;

/// An environment variable and the aliases tried after it, in order.
#[derive(Debug, Clone, Copy)]
pub struct EnvVar {
    pub primary: &'static str,
    pub alternatives: &'static [&'static str],
}

pub const DB_USER: EnvVar = EnvVar {
    primary: "DB_USER",
    alternatives: &["DATABASE_USER"],
};
pub const DB_PASSWORD: EnvVar = EnvVar {
    primary: "DB_PASSWORD",
    alternatives: &["DATABASE_PASSWORD"],
};
pub const DB_HOST: EnvVar = EnvVar {
    primary: "DB_HOST",
    alternatives: &["DATABASE_HOST", "DATABASE_IP", "DB_IP"],
};
pub const DB_PORT: EnvVar = EnvVar {
    primary: "DB_PORT",
    alternatives: &["DATABASE_PORT"],
};
pub const DB_NAME: EnvVar = EnvVar {
    primary: "DB_NAME",
    alternatives: &["DATABASE_NAME"],
};

pub const DEFAULT_DATABASE: &str = "master";
pub const DEFAULT_POOL_MAX: usize = 5;
pub const DEFAULT_POOL_MIN: usize = 0;
pub const DEFAULT_IDLE_TIMEOUT: Duration = Duration::from_millis(30_000);
pub const DEFAULT_CONNECTION_TIMEOUT: Duration = Duration::from_millis(15_000);

impl EnvVar {
    /// Look up the primary name, then each alternative. Empty values count as absent.
    pub fn lookup<F>(&self, lookup: &F) -> Option<String>
    where
        F: Fn(&str) -> Option<String>,
    {
        std::iter::once(self.primary)
            .chain(self.alternatives.iter().copied())
            .find_map(|name| lookup(name).filter(|value| !value.is_empty()))
    }

    /// Like [`EnvVar::lookup`] but a miss is a configuration error naming every name tried.
    ///
    /// # Errors
    /// Returns `RelayError::ConfigError` when neither the primary nor any alias is set.
    pub fn require<F>(&self, lookup: &F) -> Result<String, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        self.lookup(lookup).ok_or_else(|| {
            let mut names = self.primary.to_string();
            for alt in self.alternatives {
                names.push_str(" / ");
                names.push_str(alt);
            }
            RelayError::ConfigError(format!("Missing required environment variable: {names}"))
        })
    }
}

/// Database port as read from the environment.
///
/// An unparseable value is not a configuration error; it is carried through and
/// reported when the pool tries to connect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DbPort {
    Valid(u16),
    Invalid(String),
}

impl DbPort {
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        match raw.trim().parse::<u16>() {
            Ok(port) => DbPort::Valid(port),
            Err(_) => DbPort::Invalid(raw.to_string()),
        }
    }
}

/// Immutable connection settings, built once at startup.
#[derive(Clone, PartialEq)]
pub struct DbSettings {
    pub user: String,
    pub password: String,
    pub host: String,
    pub port: DbPort,
    pub database: String,
    pub encrypt: bool,
    pub trust_server_certificate: bool,
    pub pool_max: usize,
    pub pool_min: usize,
    pub idle_timeout: Duration,
    pub connection_timeout: Duration,
}

// Manual Debug implementation so the password never reaches the logs
impl fmt::Debug for DbSettings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DbSettings")
            .field("user", &self.user)
            .field("password", &"<redacted>")
            .field("host", &self.host)
            .field("port", &self.port)
            .field("database", &self.database)
            .field("encrypt", &self.encrypt)
            .field("trust_server_certificate", &self.trust_server_certificate)
            .field("pool_max", &self.pool_max)
            .field("pool_min", &self.pool_min)
            .field("idle_timeout", &self.idle_timeout)
            .field("connection_timeout", &self.connection_timeout)
            .finish()
    }
}

/// Load `.env` from the working directory or its parents into the process environment.
///
/// Returns the file that was loaded, or `None` when there is no `.env`.
///
/// # Errors
/// Returns `RelayError::ConfigError` when a `.env` exists but cannot be read or parsed.
pub fn load_dotenv() -> Result<Option<PathBuf>, RelayError> {
    dotenv_outcome(dotenvy::dotenv())
}

fn dotenv_outcome(result: Result<PathBuf, dotenvy::Error>) -> Result<Option<PathBuf>, RelayError> {
    match result {
        Ok(path) => Ok(Some(path)),
        Err(e) if e.not_found() => Ok(None),
        Err(e) => Err(RelayError::ConfigError(format!("failed to load .env: {e}"))),
    }
}

impl DbSettings {
    /// Settings with the relay's defaults for everything but the four required parameters.
    #[must_use]
    pub fn new(user: String, password: String, host: String, port: DbPort) -> Self {
        Self {
            user,
            password,
            host,
            port,
            database: DEFAULT_DATABASE.to_string(),
            encrypt: false,
            trust_server_certificate: true,
            pool_max: DEFAULT_POOL_MAX,
            pool_min: DEFAULT_POOL_MIN,
            idle_timeout: DEFAULT_IDLE_TIMEOUT,
            connection_timeout: DEFAULT_CONNECTION_TIMEOUT,
        }
    }

    /// Resolve settings from the process environment.
    ///
    /// # Errors
    /// Returns `RelayError::ConfigError` if a required variable is missing.
    pub fn from_env() -> Result<Self, RelayError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Resolve settings through an arbitrary lookup.
    ///
    /// # Errors
    /// Returns `RelayError::ConfigError` if a required variable is missing.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, RelayError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let user = DB_USER.require(&lookup)?;
        let password = DB_PASSWORD.require(&lookup)?;
        let host = DB_HOST.require(&lookup)?;
        let port = DbPort::parse(&DB_PORT.require(&lookup)?);

        let mut settings = Self::new(user, password, host, port);
        if let Some(database) = DB_NAME.lookup(&lookup) {
            settings.database = database;
        }
        settings.encrypt = optional(&lookup, "DB_ENCRYPT", settings.encrypt, parse_bool);
        settings.trust_server_certificate = optional(
            &lookup,
            "DB_TRUST_SERVER_CERTIFICATE",
            settings.trust_server_certificate,
            parse_bool,
        );
        settings.pool_max = optional(&lookup, "DB_POOL_MAX", settings.pool_max, |v| {
            v.parse().ok().filter(|max: &usize| *max > 0)
        });
        settings.pool_min = optional(&lookup, "DB_POOL_MIN", settings.pool_min, |v| v.parse().ok())
            .min(settings.pool_max);
        settings.idle_timeout = optional(
            &lookup,
            "DB_IDLE_TIMEOUT_MS",
            settings.idle_timeout,
            parse_millis,
        );
        settings.connection_timeout = optional(
            &lookup,
            "DB_CONNECTION_TIMEOUT_MS",
            settings.connection_timeout,
            parse_millis,
        );
        Ok(settings)
    }
}

fn optional<F, T, P>(lookup: &F, name: &str, default: T, parse: P) -> T
where
    F: Fn(&str) -> Option<String>,
    T: fmt::Debug,
    P: Fn(&str) -> Option<T>,
{
    let Some(raw) = lookup(name).filter(|v| !v.is_empty()) else {
        return default;
    };
    parse(raw.trim()).unwrap_or_else(|| {
        tracing::warn!("ignoring invalid {name}={raw:?}, using {default:?}");
        default
    })
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}

fn parse_millis(raw: &str) -> Option<Duration> {
    raw.parse().ok().map(Duration::from_millis)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| map.get(name).cloned()
    }

    const REQUIRED: [(&str, &str); 4] = [
        ("DB_USER", "sa"),
        ("DB_PASSWORD", "secret"),
        ("DB_HOST", "db.local"),
        ("DB_PORT", "1433"),
    ];

    #[test]
    fn primary_names_with_defaults() {
        let settings = DbSettings::from_lookup(env(&REQUIRED)).unwrap();
        assert_eq!(settings.user, "sa");
        assert_eq!(settings.host, "db.local");
        assert_eq!(settings.port, DbPort::Valid(1433));
        assert_eq!(settings.database, "master");
        assert!(!settings.encrypt);
        assert!(settings.trust_server_certificate);
        assert_eq!(settings.pool_max, 5);
        assert_eq!(settings.pool_min, 0);
        assert_eq!(settings.idle_timeout, Duration::from_millis(30_000));
        assert_eq!(settings.connection_timeout, Duration::from_millis(15_000));
    }

    #[test]
    fn falls_back_to_aliases_in_order() {
        let lookup = env(&[
            ("DATABASE_USER", "app"),
            ("DATABASE_PASSWORD", "pw"),
            ("DB_IP", "10.0.0.9"),
            ("DATABASE_IP", "10.0.0.8"),
            ("DATABASE_PORT", "14330"),
        ]);
        let settings = DbSettings::from_lookup(lookup).unwrap();
        assert_eq!(settings.user, "app");
        assert_eq!(settings.host, "10.0.0.8");
        assert_eq!(settings.port, DbPort::Valid(14330));
    }

    #[test]
    fn primary_wins_over_alias() {
        let lookup = env(&[("DB_HOST", "primary"), ("DATABASE_HOST", "alias")]);
        assert_eq!(DB_HOST.require(&lookup).unwrap(), "primary");
    }

    #[test]
    fn empty_value_counts_as_missing() {
        let lookup = env(&[("DB_HOST", ""), ("DB_IP", "fallback")]);
        assert_eq!(DB_HOST.require(&lookup).unwrap(), "fallback");
    }

    #[test]
    fn missing_variable_names_every_alias() {
        let err = DbSettings::from_lookup(env(&[
            ("DB_USER", "sa"),
            ("DB_PASSWORD", "secret"),
        ]))
        .unwrap_err();
        assert!(matches!(err, RelayError::ConfigError(_)));
        assert_eq!(
            err.to_string(),
            "Configuration error: Missing required environment variable: DB_HOST / DATABASE_HOST / DATABASE_IP / DB_IP"
        );
    }

    #[test]
    fn bad_port_is_carried_not_rejected() {
        let mut pairs = REQUIRED.to_vec();
        pairs[3] = ("DB_PORT", "not-a-port");
        let settings = DbSettings::from_lookup(env(&pairs)).unwrap();
        assert_eq!(settings.port, DbPort::Invalid("not-a-port".into()));
    }

    #[test]
    fn optional_overrides_and_invalid_fallbacks() {
        let mut pairs = REQUIRED.to_vec();
        pairs.extend([
            ("DATABASE_NAME", "inventory"),
            ("DB_ENCRYPT", "true"),
            ("DB_TRUST_SERVER_CERTIFICATE", "no"),
            ("DB_POOL_MAX", "0"),
            ("DB_POOL_MIN", "9"),
            ("DB_IDLE_TIMEOUT_MS", "soon"),
            ("DB_CONNECTION_TIMEOUT_MS", "2500"),
        ]);
        let settings = DbSettings::from_lookup(env(&pairs)).unwrap();
        assert_eq!(settings.database, "inventory");
        assert!(settings.encrypt);
        assert!(!settings.trust_server_certificate);
        assert_eq!(settings.pool_max, 5);
        assert_eq!(settings.pool_min, 5);
        assert_eq!(settings.idle_timeout, DEFAULT_IDLE_TIMEOUT);
        assert_eq!(settings.connection_timeout, Duration::from_millis(2500));
    }

    #[test]
    fn debug_output_redacts_password() {
        let settings = DbSettings::from_lookup(env(&REQUIRED)).unwrap();
        let text = format!("{settings:?}");
        assert!(!text.contains("secret"));
        assert!(text.contains("<redacted>"));
    }

    #[test]
    fn missing_dotenv_is_fine_but_broken_one_is_reported() {
        let path = PathBuf::from("/srv/relay/.env");
        assert_eq!(dotenv_outcome(Ok(path.clone())).unwrap(), Some(path));

        let missing = dotenvy::Error::Io(std::io::ErrorKind::NotFound.into());
        assert_eq!(dotenv_outcome(Err(missing)).unwrap(), None);

        let broken = dotenvy::Error::LineParse("DB_USER sa".into(), 8);
        let err = dotenv_outcome(Err(broken)).unwrap_err();
        assert!(matches!(err, RelayError::ConfigError(msg) if msg.contains(".env")));

        let unreadable = dotenvy::Error::Io(std::io::ErrorKind::PermissionDenied.into());
        assert!(dotenv_outcome(Err(unreadable)).is_err());
    }
}
