use google_cloud_storage::client::{Client, ClientConfig};
use tracing::info;

use crate::{config::Config, storage::BucketStorage};

#[derive(Debug, thiserror::Error)]
pub enum BootstrapError {
    #[error("GCP credentials error: {0}")]
    Credentials(String),
}

/// Discovers ambient Google credentials and builds a ready storage adapter.
pub async fn plugin(config: &Config) -> Result<BucketStorage<Client>, BootstrapError> {
    let client_config = ClientConfig::default()
        .with_auth()
        .await
        .map_err(|err| BootstrapError::Credentials(err.to_string()))?;

    let project_id = config
        .project_id
        .clone()
        .or_else(|| client_config.project_id.clone());
    info!(project_id=?project_id, deadline=?config.deadline, "storage client ready");

    let client = Client::new(client_config);

    Ok(BucketStorage::new(client, project_id).with_deadline(config.deadline))
}
