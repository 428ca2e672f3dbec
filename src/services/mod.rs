//! Outbound integrations and the upload pipeline built on top of them.

pub mod accounts;
pub mod auth_gateway;
pub mod authorization;
pub mod completion;
pub mod http;
pub mod object_api;
pub mod presign;
pub mod retention;
pub mod s3;
pub mod transcode;
pub mod uploader;
