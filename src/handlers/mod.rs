pub mod auth_handlers;
pub mod health_handlers;
pub mod identity;
pub mod post_handlers;
pub mod upload_handlers;
pub mod video_handlers;
pub mod webhook_handlers;
