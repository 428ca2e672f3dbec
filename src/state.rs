use sqlx::SqlitePool;
use std::{path::PathBuf, sync::Arc};

use crate::{
    db::{
        images::ImageRepository, posts::PostRepository, users::UserRepository,
        videos::VideoRepository,
    },
    services::{
        accounts::AccountService, completion::CompletionHandler, retention::ObjectRemover,
        transcode::TranscodeService, uploader::MediaUploader,
    },
};

/// Shared handles passed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<SqlitePool>,
    /// Staging directory for multipart form files before they are uploaded.
    pub upload_dir: PathBuf,
    pub uploader: MediaUploader,
    pub remover: ObjectRemover,
    pub transcoder: Arc<dyn TranscodeService>,
    pub completion: CompletionHandler,
    pub accounts: AccountService,
    pub users: UserRepository,
    pub posts: PostRepository,
    pub videos: VideoRepository,
    pub images: ImageRepository,
}

#[cfg(test)]
pub(crate) mod fakes {
    use super::*;
    use crate::{
        db::test_pool,
        errors::RemoteError,
        services::{
            accounts::fakes::FakeProvider,
            transcode::TranscodeJob,
            uploader::fakes::{FakeApi, FakeAuthorizer, grant, uploader},
        },
    };
    use async_trait::async_trait;
    use std::sync::Mutex;
    use std::time::Duration;

    /// Accepts every submission, numbering jobs `asset-1`, `asset-2`, ...
    #[derive(Default)]
    pub struct FakeTranscoder {
        pub submissions: Mutex<Vec<(String, Option<String>)>>,
        pub reject: bool,
    }

    #[async_trait]
    impl TranscodeService for FakeTranscoder {
        async fn submit(
            &self,
            video_url: &str,
            captions_url: Option<&str>,
        ) -> Result<TranscodeJob, RemoteError> {
            if self.reject {
                return Err(RemoteError::RemoteRejected {
                    status: 400,
                    payload: "invalid input url".into(),
                });
            }
            let mut submissions = self.submissions.lock().unwrap();
            submissions.push((video_url.to_string(), captions_url.map(str::to_string)));
            let n = submissions.len();
            Ok(TranscodeJob {
                playback_id: format!("playback-{n}"),
                job_id: format!("asset-{n}"),
            })
        }
    }

    pub struct TestState {
        pub state: AppState,
        pub api: Arc<FakeApi>,
        pub transcoder: Arc<FakeTranscoder>,
        pub upload_dir: tempfile::TempDir,
    }

    pub async fn test_state(api: FakeApi, transcoder: FakeTranscoder) -> TestState {
        let db = Arc::new(test_pool().await);
        let api = Arc::new(api);
        let transcoder = Arc::new(transcoder);
        let upload_dir = tempfile::tempdir().unwrap();
        let videos = VideoRepository::new(db.clone());

        let state = AppState {
            db: db.clone(),
            upload_dir: upload_dir.path().to_path_buf(),
            uploader: uploader(grant(), api.clone()),
            remover: ObjectRemover::new(
                Arc::new(FakeAuthorizer::granting(grant())),
                api.clone(),
                Duration::ZERO,
            ),
            transcoder: transcoder.clone(),
            completion: CompletionHandler::new(videos.clone(), chrono::Duration::hours(24)),
            accounts: AccountService::new(
                Arc::new(FakeProvider),
                UserRepository::new(db.clone()),
            ),
            users: UserRepository::new(db.clone()),
            posts: PostRepository::new(db.clone()),
            videos,
            images: ImageRepository::new(db),
        };
        TestState {
            state,
            api,
            transcoder,
            upload_dir,
        }
    }
}
