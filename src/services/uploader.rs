//! Upload orchestration.
//!
//! Objects at or below the provider's absolute minimum part size go up in a
//! single presigned PUT. Anything larger becomes a multipart upload: the file
//! is cut into contiguous ranges, every range is PUT concurrently to its own
//! presigned part URL, and the parts are stitched together by part number.
//! A failure after the multipart upload exists triggers a best-effort abort.

use std::{
    path::{Path, PathBuf},
    sync::Arc,
};
use tokio::task::JoinSet;
use tracing::{debug, info, warn};

use super::{authorization::AccountAuthorizer, object_api::ObjectStorageApi, presign::UrlSigner};
use crate::{
    errors::{RemoteError, StorageError, StorageResult},
    models::storage::{AuthorizationGrant, ByteRange, UploadOutcome, UploadSession, UploadStrategy},
};

pub fn select_strategy(size: u64, grant: &AuthorizationGrant) -> UploadStrategy {
    if size > grant.absolute_minimum_part_size {
        UploadStrategy::Multipart
    } else {
        UploadStrategy::Single
    }
}

/// Objects smaller than the recommended part size are cut at the absolute
/// minimum so they still split into several parts.
pub fn part_size(size: u64, grant: &AuthorizationGrant) -> u64 {
    let size = if size < grant.recommended_part_size {
        grant.absolute_minimum_part_size
    } else {
        grant.recommended_part_size
    };
    size.max(1)
}

/// Contiguous ranges covering `0..size`; only the last may be short.
pub fn plan_parts(size: u64, part_size: u64) -> Vec<ByteRange> {
    let part_size = part_size.max(1);
    (0..size.div_ceil(part_size))
        .map(|idx| {
            let offset = idx * part_size;
            ByteRange {
                part_number: idx as i32 + 1,
                offset,
                length: part_size.min(size - offset),
            }
        })
        .collect()
}

#[derive(Clone)]
pub struct MediaUploader {
    authorizer: Arc<dyn AccountAuthorizer>,
    signer: Arc<dyn UrlSigner>,
    api: Arc<dyn ObjectStorageApi>,
}

impl MediaUploader {
    pub fn new(
        authorizer: Arc<dyn AccountAuthorizer>,
        signer: Arc<dyn UrlSigner>,
        api: Arc<dyn ObjectStorageApi>,
    ) -> Self {
        Self {
            authorizer,
            signer,
            api,
        }
    }

    /// Upload `size` bytes from `local_path` to `key`.
    pub async fn upload(
        &self,
        content_type: &str,
        key: &str,
        local_path: &Path,
        size: u64,
    ) -> StorageResult<UploadOutcome> {
        let grant = self.authorizer.authorize().await?;
        grant.validate()?;

        let strategy = select_strategy(size, &grant);
        info!(key, size, ?strategy, "starting upload");

        let (session, result) = match strategy {
            UploadStrategy::Single => {
                let mut session = UploadSession::single(key);
                let result = self
                    .upload_single(&mut session, content_type, local_path, size, &grant)
                    .await;
                (session, result)
            }
            UploadStrategy::Multipart => {
                let upload_id = self
                    .api
                    .create_multipart_upload(key, content_type, &grant)
                    .await?;
                let mut session = UploadSession::multipart(key, upload_id.as_str());
                let result = self
                    .transfer_and_complete(&mut session, &upload_id, local_path, size, &grant)
                    .await;
                (session, result)
            }
        };

        if let Err(err) = &result {
            self.abort_failed(&session, err, &grant).await;
        }
        result
    }

    async fn upload_single(
        &self,
        session: &mut UploadSession,
        content_type: &str,
        local_path: &Path,
        size: u64,
        grant: &AuthorizationGrant,
    ) -> StorageResult<UploadOutcome> {
        let urls = self.signer.presign(&session.key, grant).await?;
        let whole = ByteRange {
            part_number: 1,
            offset: 0,
            length: size,
        };
        let receipt = self
            .api
            .put_presigned(&urls.write_url, Some(content_type), local_path, whole)
            .await?;
        if let Some(etag) = receipt.etag {
            session.record_part(whole.part_number, etag);
        }

        Ok(UploadOutcome {
            read_url: urls.read_url,
            object_version_id: receipt.version_id,
        })
    }

    /// Best-effort abort of whatever the failed session left on the provider.
    /// Its error is logged and never replaces the upload's own.
    async fn abort_failed(
        &self,
        session: &UploadSession,
        err: &StorageError,
        grant: &AuthorizationGrant,
    ) {
        let Some(upload_id) = session.abort_target() else {
            warn!(key = %session.key, strategy = ?session.strategy, error = %err, "upload failed");
            return;
        };
        warn!(key = %session.key, upload_id, error = %err, "multipart upload failed, aborting");
        if let Err(abort_err) = self
            .api
            .abort_multipart_upload(&session.key, upload_id, grant)
            .await
        {
            warn!(
                key = %session.key,
                upload_id,
                error = %abort_err,
                "abort failed; incomplete parts left for lifecycle cleanup"
            );
        }
    }

    async fn transfer_and_complete(
        &self,
        session: &mut UploadSession,
        upload_id: &str,
        local_path: &Path,
        size: u64,
        grant: &AuthorizationGrant,
    ) -> StorageResult<UploadOutcome> {
        let ranges = plan_parts(size, part_size(size, grant));
        let expected = ranges.len();
        let urls = self
            .signer
            .presign_parts(&session.key, upload_id, expected, grant)
            .await?;
        if urls.len() != expected {
            return Err(RemoteError::RequestMalformed(format!(
                "presigned {} part urls for {} parts",
                urls.len(),
                expected
            ))
            .into());
        }

        let mut tasks = JoinSet::new();
        for (range, url) in ranges.into_iter().zip(urls) {
            let api = Arc::clone(&self.api);
            let path: PathBuf = local_path.to_path_buf();
            tasks.spawn(async move {
                let result = api.put_presigned(&url, None, &path, range).await;
                (range.part_number, result)
            });
        }

        // Drain every task so no part PUT is still in flight when we abort.
        let mut first_error: Option<StorageError> = None;
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((part_number, Ok(receipt))) => match receipt.etag {
                    Some(etag) => {
                        debug!(key = %session.key, part_number, "part uploaded");
                        session.record_part(part_number, etag);
                    }
                    None => {
                        first_error.get_or_insert_with(|| {
                            RemoteError::RemoteRejected {
                                status: 200,
                                payload: format!("part {part_number} returned no ETag"),
                            }
                            .into()
                        });
                    }
                },
                Ok((_, Err(err))) => {
                    first_error.get_or_insert(err);
                }
                Err(join_err) => {
                    first_error.get_or_insert_with(|| {
                        RemoteError::RequestMalformed(format!("part task failed: {join_err}"))
                            .into()
                    });
                }
            }
        }
        if let Some(err) = first_error {
            return Err(err);
        }

        let parts = session.ordered_parts(expected)?;
        let version_id = self
            .api
            .complete_multipart_upload(&session.key, upload_id, &parts, grant)
            .await?;
        let read_url = self.signer.presign(&session.key, grant).await?.read_url;

        info!(key = %session.key, parts = expected, "multipart upload complete");
        Ok(UploadOutcome {
            read_url,
            object_version_id: version_id,
        })
    }
}

#[cfg(test)]
pub(crate) mod fakes {
    //! In-memory stand-ins for the storage provider.

    use super::*;
    use crate::models::storage::{CompletedPart, PresignedUrls, PutReceipt};
    use async_trait::async_trait;
    use std::{sync::Mutex, time::Duration};

    pub const MB: u64 = 1_000_000;

    pub fn grant() -> AuthorizationGrant {
        AuthorizationGrant {
            s3_api_url: Some("https://s3.us-west-004.backblazeb2.com".into()),
            absolute_minimum_part_size: 5 * MB,
            recommended_part_size: 20 * MB,
        }
    }

    pub struct FakeAuthorizer {
        pub result: Result<AuthorizationGrant, RemoteError>,
        pub calls: Mutex<usize>,
    }

    impl FakeAuthorizer {
        pub fn granting(grant: AuthorizationGrant) -> Self {
            Self {
                result: Ok(grant),
                calls: Mutex::new(0),
            }
        }
    }

    #[async_trait]
    impl AccountAuthorizer for FakeAuthorizer {
        async fn authorize(&self) -> Result<AuthorizationGrant, RemoteError> {
            *self.calls.lock().unwrap() += 1;
            self.result.clone()
        }
    }

    pub struct FakeSigner;

    #[async_trait]
    impl UrlSigner for FakeSigner {
        async fn presign(
            &self,
            key: &str,
            _grant: &AuthorizationGrant,
        ) -> StorageResult<PresignedUrls> {
            Ok(PresignedUrls {
                read_url: format!("https://storage.test/{key}?op=get"),
                write_url: format!("https://storage.test/{key}?op=put"),
            })
        }

        async fn presign_parts(
            &self,
            key: &str,
            upload_id: &str,
            part_count: usize,
            _grant: &AuthorizationGrant,
        ) -> StorageResult<Vec<String>> {
            Ok((1..=part_count)
                .map(|n| format!("https://storage.test/{key}?uploadId={upload_id}&partNumber={n}"))
                .collect())
        }
    }

    #[derive(Clone, Debug, PartialEq)]
    pub enum Call {
        Create { key: String },
        Put { url: String, range: ByteRange, content_type: Option<String> },
        Complete { parts: Vec<CompletedPart> },
        Abort { upload_id: String },
        Delete { key: String },
    }

    #[derive(Default)]
    pub struct FakeApi {
        pub calls: Mutex<Vec<Call>>,
        /// Part numbers in the order their PUTs finished.
        pub finished: Mutex<Vec<i32>>,
        pub fail_create: bool,
        pub fail_part: Option<i32>,
        pub fail_complete: bool,
        pub fail_abort: bool,
        pub fail_single: bool,
        /// Later parts finish sooner.
        pub reverse_completion: bool,
        pub delete_status: Option<u16>,
    }

    impl FakeApi {
        pub fn calls(&self) -> Vec<Call> {
            self.calls.lock().unwrap().clone()
        }

        pub fn count(&self, pred: impl Fn(&Call) -> bool) -> usize {
            self.calls().iter().filter(|c| pred(c)).count()
        }

        fn record(&self, call: Call) {
            self.calls.lock().unwrap().push(call);
        }
    }

    fn rejected(status: u16) -> StorageError {
        RemoteError::RemoteRejected {
            status,
            payload: "simulated failure".into(),
        }
        .into()
    }

    #[async_trait]
    impl ObjectStorageApi for FakeApi {
        async fn create_multipart_upload(
            &self,
            key: &str,
            _content_type: &str,
            _grant: &AuthorizationGrant,
        ) -> StorageResult<String> {
            self.record(Call::Create { key: key.into() });
            if self.fail_create {
                return Err(RemoteError::NetworkUnavailable("timeout".into()).into());
            }
            Ok("upload-1".into())
        }

        async fn put_presigned(
            &self,
            url: &str,
            content_type: Option<&str>,
            _source: &Path,
            range: ByteRange,
        ) -> StorageResult<PutReceipt> {
            self.record(Call::Put {
                url: url.into(),
                range,
                content_type: content_type.map(str::to_string),
            });
            if self.reverse_completion {
                tokio::time::sleep(Duration::from_millis(60 / range.part_number as u64)).await;
            }
            self.finished.lock().unwrap().push(range.part_number);

            let single = url.ends_with("op=put");
            if (single && self.fail_single) || (!single && self.fail_part == Some(range.part_number)) {
                return Err(rejected(500));
            }
            Ok(PutReceipt {
                etag: Some(format!("etag-{}", range.part_number)),
                version_id: single.then(|| "version-1".to_string()),
            })
        }

        async fn complete_multipart_upload(
            &self,
            _key: &str,
            _upload_id: &str,
            parts: &[CompletedPart],
            _grant: &AuthorizationGrant,
        ) -> StorageResult<Option<String>> {
            self.record(Call::Complete {
                parts: parts.to_vec(),
            });
            if self.fail_complete {
                return Err(rejected(400));
            }
            Ok(Some("version-mp".into()))
        }

        async fn abort_multipart_upload(
            &self,
            _key: &str,
            upload_id: &str,
            _grant: &AuthorizationGrant,
        ) -> StorageResult<()> {
            self.record(Call::Abort {
                upload_id: upload_id.into(),
            });
            if self.fail_abort {
                return Err(rejected(503));
            }
            Ok(())
        }

        async fn delete_object(&self, key: &str, _grant: &AuthorizationGrant) -> StorageResult<()> {
            self.record(Call::Delete { key: key.into() });
            match self.delete_status {
                Some(status) => Err(rejected(status)),
                None => Ok(()),
            }
        }
    }

    pub fn uploader(grant: AuthorizationGrant, api: Arc<FakeApi>) -> MediaUploader {
        MediaUploader::new(
            Arc::new(FakeAuthorizer::granting(grant)),
            Arc::new(FakeSigner),
            api,
        )
    }
}
