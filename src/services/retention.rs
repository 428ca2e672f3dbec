//! Deferred object deletion.
//!
//! Deletes wait a short, configurable delay before reaching the provider so
//! they do not race in-flight processing of the same key. The delete carries
//! no version id, so versioned buckets keep the data behind a delete marker.

use std::{sync::Arc, time::Duration};
use tracing::{info, warn};

use super::{authorization::AccountAuthorizer, object_api::ObjectStorageApi};
use crate::errors::{RemoteError, StorageError, StorageResult};

pub const DEFAULT_DELETE_DELAY: Duration = Duration::from_secs(1);

#[derive(Clone)]
pub struct ObjectRemover {
    authorizer: Arc<dyn AccountAuthorizer>,
    api: Arc<dyn ObjectStorageApi>,
    delay: Duration,
}

impl ObjectRemover {
    pub fn new(
        authorizer: Arc<dyn AccountAuthorizer>,
        api: Arc<dyn ObjectStorageApi>,
        delay: Duration,
    ) -> Self {
        Self {
            authorizer,
            api,
            delay,
        }
    }

    /// Mark `key` deleted. Missing keys count as already deleted.
    pub async fn remove(&self, key: &str, version_id: Option<&str>) -> StorageResult<()> {
        tokio::time::sleep(self.delay).await;

        let grant = self.authorizer.authorize().await?;
        match self.api.delete_object(key, &grant).await {
            Ok(()) => {
                info!(key, version = version_id.unwrap_or("<latest>"), "object delete marker placed");
                Ok(())
            }
            Err(StorageError::Remote(RemoteError::RemoteRejected { status: 404, .. })) => {
                info!(key, "object already absent");
                Ok(())
            }
            Err(err) => {
                warn!(key, error = %err, "object delete failed");
                Err(err)
            }
        }
    }
}
