//! Object operations that actually reach the storage provider: multipart
//! lifecycle calls, deletes, and PUTs of local file ranges to presigned URLs.

use async_trait::async_trait;
use aws_sdk_s3::types::{CompletedMultipartUpload, CompletedPart as S3CompletedPart};
use reqwest::{
    Body, Client,
    header::{CONTENT_LENGTH, CONTENT_TYPE, ETAG},
};
use std::{io::SeekFrom, path::Path};
use tokio::{
    fs::File,
    io::{AsyncReadExt, AsyncSeekExt},
};
use tokio_util::io::ReaderStream;
use tracing::debug;

use super::s3::{StorageAccount, classify};
use crate::{
    errors::{RemoteError, StorageResult},
    models::storage::{AuthorizationGrant, ByteRange, CompletedPart, PutReceipt},
};

pub const VERSION_ID_HEADER: &str = "x-amz-version-id";

#[async_trait]
pub trait ObjectStorageApi: Send + Sync {
    /// Start a multipart upload and return its upload id.
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        grant: &AuthorizationGrant,
    ) -> StorageResult<String>;

    /// PUT `range` of the file at `source` to a presigned URL.
    async fn put_presigned(
        &self,
        url: &str,
        content_type: Option<&str>,
        source: &Path,
        range: ByteRange,
    ) -> StorageResult<PutReceipt>;

    /// Stitch the parts together; returns the object's version id if any.
    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        grant: &AuthorizationGrant,
    ) -> StorageResult<Option<String>>;

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        grant: &AuthorizationGrant,
    ) -> StorageResult<()>;

    /// Unversioned delete: leaves a delete marker in versioned buckets.
    async fn delete_object(&self, key: &str, grant: &AuthorizationGrant) -> StorageResult<()>;
}

#[derive(Clone)]
pub struct S3ObjectApi {
    http: Client,
    account: StorageAccount,
}

impl S3ObjectApi {
    pub fn new(http: Client, account: StorageAccount) -> Self {
        Self { http, account }
    }
}

#[async_trait]
impl ObjectStorageApi for S3ObjectApi {
    async fn create_multipart_upload(
        &self,
        key: &str,
        content_type: &str,
        grant: &AuthorizationGrant,
    ) -> StorageResult<String> {
        let output = self
            .account
            .client(grant, None)?
            .create_multipart_upload()
            .bucket(&self.account.bucket)
            .key(key)
            .content_type(content_type)
            .send()
            .await
            .map_err(classify)?;

        output.upload_id().map(str::to_string).ok_or_else(|| {
            RemoteError::RemoteRejected {
                status: 200,
                payload: format!("no upload id returned for `{key}`"),
            }
            .into()
        })
    }

    async fn put_presigned(
        &self,
        url: &str,
        content_type: Option<&str>,
        source: &Path,
        range: ByteRange,
    ) -> StorageResult<PutReceipt> {
        let mut file = File::open(source).await?;
        file.seek(SeekFrom::Start(range.offset)).await?;
        let body = Body::wrap_stream(ReaderStream::new(file.take(range.length)));

        let mut request = self
            .http
            .put(url)
            .header(CONTENT_LENGTH, range.length)
            .body(body);
        if let Some(content_type) = content_type {
            request = request.header(CONTENT_TYPE, content_type);
        }

        let response = request.send().await.map_err(RemoteError::from)?;
        let status = response.status();
        if !status.is_success() {
            let payload = response.text().await.unwrap_or_default();
            return Err(RemoteError::RemoteRejected {
                status: status.as_u16(),
                payload,
            }
            .into());
        }

        let header = |name: &str| {
            response
                .headers()
                .get(name)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string)
        };
        let receipt = PutReceipt {
            etag: header(ETAG.as_str()),
            version_id: header(VERSION_ID_HEADER),
        };
        debug!(
            part = range.part_number,
            bytes = range.length,
            etag = receipt.etag.as_deref().unwrap_or("<none>"),
            "uploaded byte range"
        );
        Ok(receipt)
    }

    async fn complete_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        parts: &[CompletedPart],
        grant: &AuthorizationGrant,
    ) -> StorageResult<Option<String>> {
        let completed = CompletedMultipartUpload::builder()
            .set_parts(Some(
                parts
                    .iter()
                    .map(|part| {
                        S3CompletedPart::builder()
                            .part_number(part.part_number)
                            .e_tag(&part.etag)
                            .build()
                    })
                    .collect(),
            ))
            .build();

        let output = self
            .account
            .client(grant, None)?
            .complete_multipart_upload()
            .bucket(&self.account.bucket)
            .key(key)
            .upload_id(upload_id)
            .multipart_upload(completed)
            .send()
            .await
            .map_err(classify)?;

        Ok(output.version_id().map(str::to_string))
    }

    async fn abort_multipart_upload(
        &self,
        key: &str,
        upload_id: &str,
        grant: &AuthorizationGrant,
    ) -> StorageResult<()> {
        self.account
            .client(grant, None)?
            .abort_multipart_upload()
            .bucket(&self.account.bucket)
            .key(key)
            .upload_id(upload_id)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }

    async fn delete_object(&self, key: &str, grant: &AuthorizationGrant) -> StorageResult<()> {
        self.account
            .client(grant, None)?
            .delete_object()
            .bucket(&self.account.bucket)
            .key(key)
            .send()
            .await
            .map_err(classify)?;
        Ok(())
    }
}
