use anyhow::Result;
use axum::Router;
use std::{fs, io::ErrorKind, path::Path, sync::Arc};
use tokio::net::TcpListener;
use tracing_subscriber::EnvFilter;

mod config;
mod db;
mod errors;
mod handlers;
mod models;
mod routes;
mod services;
mod state;
#[cfg(test)]
mod test_support;

use db::{images::ImageRepository, posts::PostRepository, users::UserRepository, videos::VideoRepository};
use services::{
    accounts::AccountService,
    auth_gateway::SupabaseAuth,
    authorization::B2Authorizer,
    completion::CompletionHandler,
    http::build_client,
    object_api::S3ObjectApi,
    presign::S3Presigner,
    retention::ObjectRemover,
    s3::StorageAccount,
    transcode::MuxClient,
    uploader::MediaUploader,
};
use state::AppState;

#[tokio::main]
async fn main() -> Result<()> {
    // --- Logging setup ---
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    // --- Parse config + migrate flag ---
    let (cfg, migrate) = config::AppConfig::from_env_and_args()?;

    tracing::info!("Starting post-media-store with config: {:?}", cfg);

    // --- Ensure staging directory exists ---
    if !Path::new(&cfg.upload_dir).exists() {
        fs::create_dir_all(&cfg.upload_dir)?;
        tracing::info!("Created upload staging directory at {}", cfg.upload_dir);
    }

    // --- Initialize SQLite connection ---
    let db_url = &cfg.database_url;
    let db_path = db_url
        .trim_start_matches("sqlite://")
        .trim_start_matches("file:");
    if let Some(parent) = Path::new(db_path).parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent)?;
            tracing::info!("Created missing directory {:?}", parent);
        }
    }
    if !Path::new(db_path).exists() {
        // SQLx will not create the database file on its own.
        fs::OpenOptions::new().create(true).append(true).open(db_path)?;
    }

    let db = Arc::new(db::connect(db_url).await?);

    // --- Handle migration mode ---
    if migrate {
        db::run_migrations(&db).await?;
        tracing::info!("Database migration complete.");
        return Ok(());
    }

    // --- Remote collaborators ---
    if cfg.production && cfg.bypass_proxy {
        tracing::warn!("Outbound proxy bypass is enabled in production");
    }
    let http = build_client(cfg.bypass_proxy)?;
    let account = StorageAccount::from(&cfg.storage);
    let authorizer = Arc::new(B2Authorizer::new(http.clone(), &cfg.storage));
    let object_api = Arc::new(S3ObjectApi::new(http.clone(), account.clone()));

    let videos = VideoRepository::new(db.clone());
    let state = AppState {
        db: db.clone(),
        upload_dir: cfg.upload_dir.clone().into(),
        uploader: MediaUploader::new(
            authorizer.clone(),
            Arc::new(S3Presigner::new(account)),
            object_api.clone(),
        ),
        remover: ObjectRemover::new(authorizer, object_api, cfg.delete_delay),
        transcoder: Arc::new(MuxClient::new(http.clone(), cfg.transcode.clone())),
        completion: CompletionHandler::new(videos.clone(), cfg.webhook_recency),
        accounts: AccountService::new(
            Arc::new(SupabaseAuth::new(http, cfg.auth.clone())),
            UserRepository::new(db.clone()),
        ),
        users: UserRepository::new(db.clone()),
        posts: PostRepository::new(db.clone()),
        videos,
        images: ImageRepository::new(db),
    };

    // --- Build router ---
    let app: Router = routes::routes::routes(&cfg.webhook_endpoint).with_state(state);

    // --- Start server ---
    let addr = cfg.addr();
    let listener = match TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(err)
            if err.kind() == ErrorKind::PermissionDenied
                && matches!(cfg.host.as_str(), "0.0.0.0" | "::") =>
        {
            let fallback_addr = format!("127.0.0.1:{}", cfg.port);
            tracing::warn!(
                "Permission denied binding to {} ({}). Falling back to {}",
                addr,
                err,
                fallback_addr
            );
            TcpListener::bind(&fallback_addr).await?
        }
        Err(err) => return Err(err.into()),
    };

    tracing::info!(
        webhook = %format!("/api/{}", cfg.webhook_endpoint),
        "Server listening on http://{}",
        listener.local_addr()?
    );
    axum::serve(listener, app).await?;

    Ok(())
}
