use std::future::Future;
use std::sync::Arc;

use bb8::ManageConnection;
use tokio_postgres::{Client, NoTls};

use crate::pool::PoolGauge;

/// bb8 manager opening plain-TCP `tokio_postgres` clients.
#[derive(Debug)]
pub struct PgManager {
    config: tokio_postgres::Config,
    gauge: Arc<PoolGauge>,
}

impl PgManager {
    pub(crate) fn new(config: tokio_postgres::Config, gauge: Arc<PoolGauge>) -> Self {
        Self { config, gauge }
    }
}

/// A pooled client plus the bookkeeping the pool needs at check-in.
pub struct PgClient {
    pub(crate) client: Client,
    pub(crate) in_transaction: bool,
    /// Drop instead of returning to the idle set.
    pub(crate) discard: bool,
}

impl ManageConnection for PgManager {
    type Connection = PgClient;
    type Error = tokio_postgres::Error;

    fn connect(&self) -> impl Future<Output = Result<Self::Connection, Self::Error>> + Send {
        let config = self.config.clone();
        async move {
            let (client, connection) = config.connect(NoTls).await?;
            tokio::spawn(async move {
                if let Err(err) = connection.await {
                    tracing::warn!(error = %err, "postgres connection task ended");
                }
            });
            tracing::debug!("opened postgres connection");
            Ok(PgClient {
                client,
                in_transaction: false,
                discard: false,
            })
        }
    }

    fn is_valid(
        &self,
        conn: &mut Self::Connection,
    ) -> impl Future<Output = Result<(), Self::Error>> + Send {
        async move { conn.client.simple_query("SELECT 1").await.map(|_| ()) }
    }

    fn has_broken(&self, conn: &mut Self::Connection) -> bool {
        conn.discard || conn.in_transaction || self.gauge.is_disposed() || conn.client.is_closed()
    }
}
