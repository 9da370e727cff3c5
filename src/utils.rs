pub mod image_probe;
pub mod s3;
