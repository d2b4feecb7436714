//! Channel deletion as a [`DeleteTarget`].

use std::sync::Arc;

use async_trait::async_trait;
use uuid::Uuid;

use kbase_backend::{BackendClient, Caller};
use kbase_core::{BulkDeleteResponse, ChannelCacheRepository, DeleteTarget, Error, Result};

/// Deletes knowledge-base channels for one caller.
///
/// The dependent count is the number of transcribed videos in the local
/// cache; deletion itself happens on the scrape backend.
pub struct ChannelDeleteTarget {
    channels: Arc<dyn ChannelCacheRepository>,
    backend: BackendClient,
    caller: Caller,
}

impl ChannelDeleteTarget {
    pub fn new(
        channels: Arc<dyn ChannelCacheRepository>,
        backend: BackendClient,
        caller: Caller,
    ) -> Self {
        Self {
            channels,
            backend,
            caller,
        }
    }
}

#[async_trait]
impl DeleteTarget for ChannelDeleteTarget {
    async fn dependent_count(&self, id: &str) -> Result<i64> {
        let channel_id = Uuid::parse_str(id)
            .map_err(|_| Error::InvalidInput(format!("Invalid channel id: {}", id)))?;
        self.channels
            .transcribed_count(self.caller.user_id, channel_id)
            .await
    }

    async fn delete_one(&self, id: &str) -> Result<()> {
        self.backend.delete_channel(&self.caller, id).await?;
        Ok(())
    }

    async fn delete_many(&self, ids: &[String]) -> Result<BulkDeleteResponse> {
        Ok(self
            .backend
            .bulk_delete_channels(&self.caller, ids)
            .await?
            .body)
    }
}
