use anyhow::{bail, Context, Result};
use async_trait::async_trait;
use aws_sdk_s3::types::{Delete, ObjectIdentifier};
use aws_sdk_s3::Client as S3Client;

/// Removal capability against per-project buckets. The catalog never owns the
/// objects themselves; it only asks for them to be gone and gets a per-call
/// success or failure back.
#[async_trait]
pub trait ObjectStorage: Send + Sync + 'static {
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()>;

    /// Removes every object whose key starts with `prefix`. An empty prefix
    /// clears the whole bucket.
    async fn remove_prefix(&self, bucket: &str, prefix: &str) -> Result<()>;
}

pub struct S3Storage {
    client: S3Client,
}

impl S3Storage {
    pub fn new(client: S3Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl ObjectStorage for S3Storage {
    async fn remove_object(&self, bucket: &str, key: &str) -> Result<()> {
        self.client
            .delete_object()
            .bucket(bucket)
            .key(key)
            .send()
            .await
            .with_context(|| format!("failed to delete object '{key}' from bucket '{bucket}'"))?;
        Ok(())
    }

    async fn remove_prefix(&self, bucket: &str, prefix: &str) -> Result<()> {
        let mut continuation: Option<String> = None;

        loop {
            let mut request = self.client.list_objects_v2().bucket(bucket).prefix(prefix);
            if let Some(token) = &continuation {
                request = request.continuation_token(token);
            }
            let page = request
                .send()
                .await
                .with_context(|| format!("failed to list objects under prefix '{prefix}'"))?;

            let targets: Vec<ObjectIdentifier> = page
                .contents()
                .iter()
                .filter_map(|object| object.key())
                .map(|key| {
                    ObjectIdentifier::builder()
                        .key(key)
                        .build()
                        .context("invalid object key in listing")
                })
                .collect::<Result<_>>()?;

            if !targets.is_empty() {
                let delete = Delete::builder()
                    .set_objects(Some(targets))
                    .build()
                    .context("failed to build batch delete request")?;

                let outcome = self
                    .client
                    .delete_objects()
                    .bucket(bucket)
                    .delete(delete)
                    .send()
                    .await
                    .with_context(|| {
                        format!("batch delete under prefix '{prefix}' was rejected")
                    })?;

                let errors = outcome.errors();
                if !errors.is_empty() {
                    let detail = errors
                        .first()
                        .and_then(|e| e.message())
                        .unwrap_or("unknown error");
                    bail!(
                        "failed to remove {} object(s) under prefix '{prefix}': {detail}",
                        errors.len()
                    );
                }
            }

            if page.is_truncated() == Some(true) {
                continuation = page.next_continuation_token().map(str::to_string);
            } else {
                break;
            }
        }

        Ok(())
    }
}
