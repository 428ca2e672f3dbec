//! Presigned URL issuance. Signing is local: no request leaves the process.

use async_trait::async_trait;
use aws_sdk_s3::presigning::PresigningConfig;
use std::time::Duration;

use super::s3::{StorageAccount, classify, session_token};
use crate::{
    errors::{RemoteError, StorageResult},
    models::storage::{AuthorizationGrant, PresignedUrls},
};

/// Validity of every issued URL: 15 minutes. A fixed constant, not configurable.
pub const PRESIGNED_URL_TTL: Duration = Duration::from_secs(900);

/// Issues credential-free read and write URLs for objects in the bucket.
#[async_trait]
pub trait UrlSigner: Send + Sync {
    /// GET and PUT URLs for `key`.
    async fn presign(&self, key: &str, grant: &AuthorizationGrant) -> StorageResult<PresignedUrls>;

    /// One PUT URL per part of `upload_id`, in part-number order (1..=count).
    async fn presign_parts(
        &self,
        key: &str,
        upload_id: &str,
        part_count: usize,
        grant: &AuthorizationGrant,
    ) -> StorageResult<Vec<String>>;
}

#[derive(Clone)]
pub struct S3Presigner {
    account: StorageAccount,
}

impl S3Presigner {
    pub fn new(account: StorageAccount) -> Self {
        Self { account }
    }
}

fn presigning_config() -> StorageResult<PresigningConfig> {
    PresigningConfig::expires_in(PRESIGNED_URL_TTL).map_err(|err| {
        RemoteError::RequestMalformed(format!("presigning config: {err}")).into()
    })
}

#[async_trait]
impl UrlSigner for S3Presigner {
    async fn presign(&self, key: &str, grant: &AuthorizationGrant) -> StorageResult<PresignedUrls> {
        let client = self.account.client(grant, Some(session_token()))?;

        let read = client
            .get_object()
            .bucket(&self.account.bucket)
            .key(key)
            .presigned(presigning_config()?)
            .await
            .map_err(classify)?;
        let write = client
            .put_object()
            .bucket(&self.account.bucket)
            .key(key)
            .presigned(presigning_config()?)
            .await
            .map_err(classify)?;

        Ok(PresignedUrls {
            read_url: read.uri().to_string(),
            write_url: write.uri().to_string(),
        })
    }

    async fn presign_parts(
        &self,
        key: &str,
        upload_id: &str,
        part_count: usize,
        grant: &AuthorizationGrant,
    ) -> StorageResult<Vec<String>> {
        let client = self.account.client(grant, Some(session_token()))?;

        let mut urls = Vec::with_capacity(part_count);
        for part_number in 1..=part_count as i32 {
            let request = client
                .upload_part()
                .bucket(&self.account.bucket)
                .key(key)
                .upload_id(upload_id)
                .part_number(part_number)
                .presigned(presigning_config()?)
                .await
                .map_err(classify)?;
            urls.push(request.uri().to_string());
        }
        Ok(urls)
    }
}
