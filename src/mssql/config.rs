use std::fmt;

use deadpool::managed::{Manager, Metrics, RecycleError, RecycleResult};
use tiberius::{AuthMethod, Client, Config as TiberiusConfig, EncryptionLevel};
use tokio::net::TcpStream;
use tokio_util::compat::{Compat, TokioAsyncWriteCompatExt};

use crate::config::{DbPort, DbSettings};
use crate::error::RelayError;

/// Type alias for SQL Server client
pub type MssqlClient = Client<Compat<TcpStream>>;

/// Manager for SQL Server connections (used with Deadpool)
#[derive(Clone)]
pub struct MssqlManager {
    config: TiberiusConfig,
    addr: String,
}

// Manual Debug implementation because tiberius::Config carries the credentials
impl fmt::Debug for MssqlManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MssqlManager")
            .field("addr", &self.addr)
            .finish()
    }
}

impl MssqlManager {
    /// Build a manager from resolved settings.
    ///
    /// # Errors
    /// Returns `RelayError::ConnectionError` when the configured port is not a valid
    /// TCP port; nothing can be dialed in that case.
    pub fn new(settings: &DbSettings) -> Result<Self, RelayError> {
        let config = build_tiberius_config(settings)?;
        let addr = config.get_addr();
        Ok(Self { config, addr })
    }

    #[must_use]
    pub fn addr(&self) -> &str {
        &self.addr
    }
}

impl Manager for MssqlManager {
    type Type = MssqlClient;
    type Error = tiberius::error::Error;

    async fn create(&self) -> Result<Self::Type, Self::Error> {
        let tcp = TcpStream::connect(&self.addr).await?;
        tcp.set_nodelay(true)?;
        Client::connect(self.config.clone(), tcp.compat_write()).await
    }

    async fn recycle(&self, client: &mut Self::Type, _metrics: &Metrics) -> RecycleResult<Self::Error> {
        // Check if connection is still usable by running a simple query
        let stream = client
            .simple_query("SELECT 1")
            .await
            .map_err(RecycleError::Backend)?;
        stream.into_row().await.map_err(RecycleError::Backend)?;
        Ok(())
    }
}

fn build_tiberius_config(settings: &DbSettings) -> Result<TiberiusConfig, RelayError> {
    let port = match &settings.port {
        DbPort::Valid(port) => *port,
        DbPort::Invalid(raw) => {
            return Err(RelayError::ConnectionError(format!(
                "invalid port value {raw:?} for {}",
                settings.host
            )));
        }
    };

    let mut config = TiberiusConfig::new();
    config.host(&settings.host);
    config.port(port);
    config.database(&settings.database);
    config.authentication(AuthMethod::sql_server(&settings.user, &settings.password));
    config.application_name("sql-relay");
    if settings.encrypt {
        config.encryption(EncryptionLevel::Required);
    } else {
        config.encryption(EncryptionLevel::Off);
    }
    if settings.trust_server_certificate {
        config.trust_cert();
    }
    Ok(config)
}
