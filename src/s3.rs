use anyhow::{Context, Result};
use aws_config::BehaviorVersion;
use aws_credential_types::Credentials;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client as S3Client,
};

use crate::config::AppConfig;

/// Builds the client for the per-project delivery buckets. Only called once
/// `AppConfig::object_store_configured()` reports ready, so every setting is
/// required here; a gap at this point is a configuration bug, not a case to
/// fall back from.
pub async fn build_client(config: &AppConfig) -> Result<S3Client> {
    let endpoint = config
        .aws_endpoint_url
        .as_deref()
        .context("AWS_ENDPOINT_URL is not set")?;
    let access_key = config
        .aws_access_key_id
        .as_deref()
        .context("AWS_ACCESS_KEY_ID is not set")?;
    let secret_key = config
        .aws_secret_access_key
        .as_deref()
        .context("AWS_SECRET_ACCESS_KEY is not set")?;

    let credentials = Credentials::new(access_key, secret_key, None, None, "delivery-config");

    let base = aws_config::defaults(BehaviorVersion::latest())
        .region(Region::new(config.aws_region.clone()))
        .endpoint_url(endpoint)
        .credentials_provider(credentials)
        .load()
        .await;

    // self-hosted stores (MinIO, Ceph RGW) route buckets by path, not subdomain
    let s3_config = S3ConfigBuilder::from(&base).force_path_style(true).build();

    Ok(S3Client::from_conf(s3_config))
}
