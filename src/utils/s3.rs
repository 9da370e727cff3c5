use aws_config::BehaviorVersion;
use aws_sdk_s3::config::{Credentials, Region};
use aws_sdk_s3::Client;
use tracing::{info, warn};

use crate::config::S3Config;

pub async fn create_s3_client(config: &S3Config) -> Client {
    let credentials = Credentials::new(&config.access_key, &config.secret_key, None, None, "static");

    let shared = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.region.clone()))
        .credentials_provider(credentials)
        .load()
        .await;

    let mut builder = aws_sdk_s3::config::Builder::from(&shared);
    if let Some(endpoint) = &config.endpoint {
        builder = builder.endpoint_url(endpoint).force_path_style(true);
    }

    Client::from_conf(builder.build())
}

/// Startup check: logs whether the bucket is reachable with these credentials.
pub async fn verify_bucket(client: &Client, bucket: &str) {
    match client.head_bucket().bucket(bucket).send().await {
        Ok(_) => {
            info!("S3 bucket {bucket} reachable");
        }
        Err(e) => {
            warn!("S3 bucket {bucket} not reachable: {}", aws_sdk_s3::error::DisplayErrorContext(&e));
        }
    }
}

/// Public URL of an object, virtual-host style unless a base URL is configured.
pub fn object_url(config: &S3Config, key: &str) -> String {
    match &config.public_base_url {
        Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
        None => format!("https://{}.s3.{}.amazonaws.com/{}", config.bucket, config.region, key),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn s3_config(public_base_url: Option<&str>) -> S3Config {
        S3Config {
            access_key: "id".to_string(),
            secret_key: "key".to_string(),
            region: "us-west-2".to_string(),
            bucket: "fotos".to_string(),
            endpoint: None,
            public_base_url: public_base_url.map(str::to_string),
        }
    }

    #[test]
    fn test_object_url() {
        assert_eq!(
            object_url(&s3_config(None), "archived/a"),
            "https://fotos.s3.us-west-2.amazonaws.com/archived/a"
        );
        assert_eq!(
            object_url(&s3_config(Some("https://cdn.example.com/")), "archived/a"),
            "https://cdn.example.com/archived/a"
        );
    }
}
