use anyhow::{Context, Result};
use async_trait::async_trait;
use aws_config::meta::region::RegionProviderChain;
use aws_credential_types::Credentials;
use aws_sdk_s3::primitives::ByteStream;
use aws_sdk_s3::{
    config::{Builder as S3ConfigBuilder, Region},
    Client as S3Client,
};
use uuid::Uuid;

use crate::config::AppConfig;

/// Metadata the sink hands back once a blob is stored; the core only records
/// this, never the blob itself.
#[derive(Debug, Clone)]
pub struct StoredUpload {
    pub url: String,
    pub content_type: String,
}

#[async_trait]
pub trait UploadSink: Send + Sync + 'static {
    async fn store(
        &self,
        content_id: &str,
        file_name: &str,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<StoredUpload>;
}

pub async fn build_client(config: &AppConfig) -> Result<S3Client> {
    let region = Region::new(config.aws_region.clone());
    let region_provider = RegionProviderChain::first_try(Some(region))
        .or_default_provider()
        .or_else("us-east-1");

    #[allow(deprecated)]
    let mut loader = aws_config::from_env().region(region_provider);

    if let Some(endpoint) = &config.aws_endpoint_url {
        loader = loader.endpoint_url(endpoint);
    }

    if let (Some(access_key), Some(secret_key)) = (
        config.aws_access_key_id.clone(),
        config.aws_secret_access_key.clone(),
    ) {
        let credentials = Credentials::new(access_key, secret_key, None, None, "static");
        loader = loader.credentials_provider(credentials);
    }

    let base_config = loader.load().await;
    let s3_config = S3ConfigBuilder::from(&base_config)
        .force_path_style(true)
        .build();

    Ok(S3Client::from_conf(s3_config))
}

pub struct S3UploadSink {
    client: S3Client,
    bucket: String,
    public_base_url: Option<String>,
}

impl S3UploadSink {
    pub fn new(client: S3Client, bucket: impl Into<String>, public_base_url: Option<String>) -> Self {
        Self {
            client,
            bucket: bucket.into(),
            public_base_url,
        }
    }
}

#[async_trait]
impl UploadSink for S3UploadSink {
    async fn store(
        &self,
        content_id: &str,
        file_name: &str,
        content_type: Option<String>,
        bytes: Vec<u8>,
    ) -> Result<StoredUpload> {
        let content_type = content_type.unwrap_or_else(|| {
            mime_guess::from_path(file_name)
                .first_or_octet_stream()
                .essence_str()
                .to_string()
        });
        let key = format!(
            "achievements/{}/{}_{}",
            content_id,
            Uuid::new_v4(),
            sanitize_file_name(file_name)
        );

        self.client
            .put_object()
            .bucket(&self.bucket)
            .key(&key)
            .content_type(&content_type)
            .body(ByteStream::from(bytes))
            .send()
            .await
            .context("failed to upload attachment to S3")?;

        let url = match &self.public_base_url {
            Some(base) => format!("{}/{}", base.trim_end_matches('/'), key),
            None => format!("s3://{}/{}", self.bucket, key),
        };

        Ok(StoredUpload { url, content_type })
    }
}

fn sanitize_file_name(file_name: &str) -> String {
    file_name
        .chars()
        .map(|ch| match ch {
            'a'..='z' | 'A'..='Z' | '0'..='9' | '.' | '-' | '_' => ch,
            _ => '_',
        })
        .collect()
}
