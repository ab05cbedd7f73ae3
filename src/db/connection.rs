use tokio_postgres::{Client, NoTls};

use super::ConnectionTarget;
use crate::error::{AssistError, AssistResult};

/// Open a client for `target` and drive its connection in the background.
pub async fn open_client(target: &ConnectionTarget) -> AssistResult<Client> {
    let (client, connection) = target
        .pg_config()
        .connect(NoTls)
        .await
        .map_err(|e| AssistError::io(e).context("Error getting connection"))?;

    // Spawn connection handler
    tokio::spawn(async move {
        if let Err(e) = connection.await {
            tracing::warn!("Connection error: {}", e);
        }
    });

    Ok(client)
}

pub struct DbConnection {
    client: Option<Client>,
    target: Option<ConnectionTarget>,
}

impl DbConnection {
    pub fn new() -> Self {
        Self {
            client: None,
            target: None,
        }
    }

    pub async fn connect(&mut self, target: ConnectionTarget) -> AssistResult<()> {
        let client = open_client(&target).await?;
        tracing::info!(
            "Connected to {}:{}/{} as {}",
            target.host,
            target.port,
            target.database,
            target.user
        );
        self.client = Some(client);
        self.target = Some(target);
        Ok(())
    }

    pub fn client(&self) -> Option<&Client> {
        self.client.as_ref()
    }

    pub fn target(&self) -> Option<&ConnectionTarget> {
        self.target.as_ref()
    }

    pub fn is_connected(&self) -> bool {
        self.client.is_some()
    }

    pub fn disconnect(&mut self) {
        self.client = None;
        self.target = None;
    }
}

impl Default for DbConnection {
    fn default() -> Self {
        Self::new()
    }
}
