pub mod archive_handler;
pub mod auth_handler;
pub mod photo_handler;
pub mod share_handler;
pub mod upload_handler;
