//! Ephemeral storage-operation types: authorization grants, presigned URLs and
//! multipart upload sessions. None of these are persisted.

use serde::{Deserialize, Serialize};

use crate::errors::{RemoteError, StorageError, StorageResult};

/// A time-limited storage authorization, fetched fresh for every operation.
#[derive(Deserialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizationGrant {
    /// S3-compatible endpoint all object operations are signed against.
    pub s3_api_url: Option<String>,
    pub absolute_minimum_part_size: u64,
    pub recommended_part_size: u64,
}

impl AuthorizationGrant {
    /// The S3 endpoint, or `StorageUnavailable` when the grant lacks one.
    pub fn s3_endpoint(&self) -> StorageResult<&str> {
        self.s3_api_url
            .as_deref()
            .filter(|url| !url.is_empty())
            .ok_or(StorageError::StorageUnavailable)
    }

    /// Reject a grant that cannot carry an upload: no S3 endpoint, or a
    /// recommended part size below the absolute minimum.
    pub fn validate(&self) -> StorageResult<()> {
        self.s3_endpoint()?;
        if self.absolute_minimum_part_size > self.recommended_part_size {
            return Err(RemoteError::RequestMalformed(format!(
                "grant recommends {}-byte parts below its {}-byte minimum",
                self.recommended_part_size, self.absolute_minimum_part_size
            ))
            .into());
        }
        Ok(())
    }
}

/// Credential-free URLs for one object.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PresignedUrls {
    pub read_url: String,
    pub write_url: String,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UploadStrategy {
    Single,
    Multipart,
}

/// A contiguous slice of the local file uploaded as one part.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ByteRange {
    /// 1-based part number.
    pub part_number: i32,
    pub offset: u64,
    pub length: u64,
}

/// What the storage provider returned for one PUT.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PutReceipt {
    pub etag: Option<String>,
    pub version_id: Option<String>,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CompletedPart {
    pub part_number: i32,
    pub etag: String,
}

/// State of one upload from initiation until completion or abort.
#[derive(Clone, Debug)]
pub struct UploadSession {
    pub key: String,
    pub upload_id: Option<String>,
    pub strategy: UploadStrategy,
    parts: Vec<CompletedPart>,
}

impl UploadSession {
    pub fn single(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upload_id: None,
            strategy: UploadStrategy::Single,
            parts: Vec::new(),
        }
    }

    pub fn multipart(key: impl Into<String>, upload_id: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            upload_id: Some(upload_id.into()),
            strategy: UploadStrategy::Multipart,
            parts: Vec::new(),
        }
    }

    /// Upload id to abort if this session fails. Single-part sessions leave
    /// nothing behind on the provider.
    pub fn abort_target(&self) -> Option<&str> {
        match self.strategy {
            UploadStrategy::Single => None,
            UploadStrategy::Multipart => self.upload_id.as_deref(),
        }
    }

    /// Record a finished part. Arrival order does not matter.
    pub fn record_part(&mut self, part_number: i32, etag: String) {
        self.parts.push(CompletedPart { part_number, etag });
    }

    /// Parts sorted by part number, checked to be exactly `1..=expected`.
    pub fn ordered_parts(&self, expected: usize) -> StorageResult<Vec<CompletedPart>> {
        let mut parts = self.parts.clone();
        parts.sort_by_key(|part| part.part_number);

        let contiguous = parts.len() == expected
            && parts
                .iter()
                .enumerate()
                .all(|(idx, part)| part.part_number as usize == idx + 1);
        if !contiguous {
            return Err(RemoteError::RequestMalformed(format!(
                "multipart upload for `{}` has {} of {} parts",
                self.key,
                parts.len(),
                expected
            ))
            .into());
        }
        Ok(parts)
    }
}

/// Result of a successful upload.
#[derive(Serialize, Clone, Debug, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UploadOutcome {
    pub read_url: String,
    pub object_version_id: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn grant(s3: Option<&str>) -> AuthorizationGrant {
        AuthorizationGrant {
            s3_api_url: s3.map(str::to_string),
            absolute_minimum_part_size: 5,
            recommended_part_size: 20,
        }
    }

    #[test]
    fn grant_without_s3_endpoint_is_unavailable() {
        assert_eq!(grant(None).s3_endpoint(), Err(StorageError::StorageUnavailable));
        assert_eq!(grant(Some("")).s3_endpoint(), Err(StorageError::StorageUnavailable));
        assert_eq!(
            grant(Some("https://s3.us-west-004.backblazeb2.com")).s3_endpoint(),
            Ok("https://s3.us-west-004.backblazeb2.com")
        );
    }

    #[test]
    fn grant_with_recommended_below_minimum_is_malformed() {
        let mut inverted = grant(Some("https://s3.us-west-004.backblazeb2.com"));
        inverted.absolute_minimum_part_size = 20_000_000;
        inverted.recommended_part_size = 5_000_000;
        assert!(matches!(
            inverted.validate(),
            Err(StorageError::Remote(RemoteError::RequestMalformed(_)))
        ));

        inverted.recommended_part_size = 20_000_000;
        assert_eq!(inverted.validate(), Ok(()));
        assert_eq!(grant(None).validate(), Err(StorageError::StorageUnavailable));
    }

    #[test]
    fn grant_parses_provider_payload() {
        let raw = r#"{
            "accountId": "abc",
            "authorizationToken": "4_token",
            "apiUrl": "https://api004.backblazeb2.com",
            "downloadUrl": "https://f004.backblazeb2.com",
            "s3ApiUrl": "https://s3.us-west-004.backblazeb2.com",
            "absoluteMinimumPartSize": 5000000,
            "recommendedPartSize": 100000000
        }"#;
        let grant: AuthorizationGrant = serde_json::from_str(raw).unwrap();
        assert_eq!(grant.absolute_minimum_part_size, 5_000_000);
        assert_eq!(grant.recommended_part_size, 100_000_000);
    }

    #[test]
    fn parts_are_ordered_by_number_not_arrival() {
        let mut session = UploadSession::multipart("videos/a.mp4", "upload-1");
        session.record_part(3, "c".into());
        session.record_part(1, "a".into());
        session.record_part(2, "b".into());

        let parts = session.ordered_parts(3).unwrap();
        let numbers: Vec<_> = parts.iter().map(|p| (p.part_number, p.etag.as_str())).collect();
        assert_eq!(numbers, vec![(1, "a"), (2, "b"), (3, "c")]);
    }

    #[test]
    fn only_multipart_sessions_have_something_to_abort() {
        assert_eq!(UploadSession::single("captions/a.vtt").abort_target(), None);
        assert_eq!(
            UploadSession::multipart("videos/a.mp4", "upload-1").abort_target(),
            Some("upload-1")
        );
    }

    #[test]
    fn gaps_in_parts_are_rejected() {
        let mut session = UploadSession::multipart("k", "u");
        session.record_part(1, "a".into());
        session.record_part(3, "c".into());
        assert!(session.ordered_parts(3).is_err());
        assert!(session.ordered_parts(2).is_err());
    }
}
