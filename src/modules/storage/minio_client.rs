//! MinIO/S3-compatible storage for issue photos
//!
//! Photos live under the public prefix and are served straight from the
//! bucket, so the client only needs to upload, delete and build URLs.

use chrono::Utc;
use reqwest::{Client, Url};
use s3::creds::Credentials;
use s3::{Bucket, BucketConfiguration, Region};
use serde_json::json;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::core::config::MinIOConfig;
use crate::core::error::AppError;
use crate::modules::storage::sigv4::PolicySigner;

pub struct MinIOClient {
    bucket: Box<Bucket>,
    region: Region,
    credentials: Credentials,
    endpoint: String,
    public_endpoint: String,
    public_prefix: String,
    access_key: String,
    secret_key: String,
    region_name: String,
    http_client: Client,
}

impl MinIOClient {
    /// Build a client without contacting the server
    pub fn from_config(config: MinIOConfig) -> Result<Self, AppError> {
        let endpoint = config.endpoint.trim_end_matches('/').to_string();
        let credentials = Credentials::new(
            Some(&config.access_key),
            Some(&config.secret_key),
            None,
            None,
            None,
        )
        .map_err(|e| AppError::Internal(format!("Failed to create MinIO credentials: {}", e)))?;

        let region = Region::Custom {
            region: config.region.clone(),
            endpoint: endpoint.clone(),
        };

        let mut bucket = Bucket::new(&config.bucket, region.clone(), credentials.clone())
            .map_err(|e| AppError::Internal(format!("Failed to create MinIO bucket: {}", e)))?;

        // Path-style URLs for MinIO (http://endpoint/bucket instead of http://bucket.endpoint)
        bucket.set_path_style();

        let http_client = Client::builder()
            .build()
            .map_err(|e| AppError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            bucket,
            region,
            credentials,
            endpoint,
            public_endpoint: config.public_endpoint.trim_end_matches('/').to_string(),
            public_prefix: config.public_prefix.trim_matches('/').to_string(),
            access_key: config.access_key,
            secret_key: config.secret_key,
            region_name: config.region,
            http_client,
        })
    }

    /// Build a client, create the bucket if needed and open the public prefix for reads
    pub async fn connect(config: MinIOConfig) -> Result<Self, AppError> {
        let client = Self::from_config(config)?;

        client.ensure_bucket_exists().await;
        client.set_public_read_policy().await;

        info!(
            "MinIO client initialized for endpoint: {}, bucket: {}, public_prefix: {}",
            client.endpoint,
            client.bucket.name(),
            client.public_prefix
        );

        Ok(client)
    }

    /// Create the bucket; an existing bucket is not an error
    async fn ensure_bucket_exists(&self) {
        let result = Bucket::create_with_path_style(
            &self.bucket.name(),
            self.region.clone(),
            self.credentials.clone(),
            BucketConfiguration::default(),
        )
        .await;

        match result {
            Ok(_) => info!("Bucket '{}' created successfully", self.bucket.name()),
            Err(e) => {
                let error_str = e.to_string();
                if error_str.contains("BucketAlreadyOwnedByYou")
                    || error_str.contains("BucketAlreadyExists")
                    || error_str.contains("already own it")
                {
                    debug!("Bucket '{}' already exists", self.bucket.name());
                } else {
                    warn!(
                        "Could not create bucket '{}': {}. Assuming it exists.",
                        self.bucket.name(),
                        e
                    );
                }
            }
        }
    }

    /// Allow anonymous `GetObject` on `{public_prefix}/*`
    async fn set_public_read_policy(&self) {
        let bucket_name = self.bucket.name();
        let policy = json!({
            "Version": "2012-10-17",
            "Statement": [
                {
                    "Effect": "Allow",
                    "Principal": {"AWS": "*"},
                    "Action": ["s3:GetObject"],
                    "Resource": [format!("arn:aws:s3:::{}/{}/*", bucket_name, self.public_prefix)]
                }
            ]
        })
        .to_string();

        match self.put_bucket_policy(&bucket_name, &policy).await {
            Ok(()) => info!(
                "Set public read policy for {}/{}/*",
                bucket_name, self.public_prefix
            ),
            Err(e) => warn!(
                "Failed to set bucket policy for '{}': {}. \
                Set it manually with: mc anonymous set download minio/{}/{}",
                bucket_name, e, bucket_name, self.public_prefix
            ),
        }
    }

    async fn put_bucket_policy(&self, bucket_name: &str, policy: &str) -> Result<(), AppError> {
        let endpoint_url = Url::parse(&self.endpoint)
            .map_err(|e| AppError::Internal(format!("Invalid endpoint URL: {}", e)))?;
        let host = endpoint_url
            .host_str()
            .ok_or_else(|| AppError::Internal("Endpoint URL has no host".to_string()))?;
        let host_header = match endpoint_url.port() {
            Some(p) => format!("{}:{}", host, p),
            None => host.to_string(),
        };

        let signed = PolicySigner {
            access_key: &self.access_key,
            secret_key: &self.secret_key,
            region: &self.region_name,
        }
        .sign(&host_header, bucket_name, policy, Utc::now())?;

        let response = self
            .http_client
            .put(format!("{}/{}?policy", self.endpoint, bucket_name))
            .header("Host", &host_header)
            .header("x-amz-date", &signed.amz_date)
            .header("x-amz-content-sha256", &signed.payload_hash)
            .header("Authorization", &signed.authorization)
            .header("Content-Type", "application/json")
            .body(policy.to_string())
            .send()
            .await
            .map_err(|e| AppError::Internal(format!("Failed to send policy request: {}", e)))?;

        if response.status().is_success() {
            return Ok(());
        }

        let status = response.status();
        let body = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());
        Err(AppError::Internal(format!(
            "Failed to set bucket policy: {} - {}",
            status, body
        )))
    }

    /// Key for a photo of an issue, e.g. `public/issues/{issue_id}/{image_id}.jpg`
    pub fn issue_image_key(&self, issue_id: Uuid, image_id: Uuid, extension: &str) -> String {
        format!(
            "{}/issues/{}/{}.{}",
            self.public_prefix, issue_id, image_id, extension
        )
    }

    pub async fn upload(&self, key: &str, data: &[u8], content_type: &str) -> Result<(), AppError> {
        self.bucket
            .put_object_with_content_type(key, data, content_type)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to upload file '{}': {}", key, e)))?;

        debug!("Uploaded file '{}' to bucket '{}'", key, self.bucket.name());
        Ok(())
    }

    pub async fn delete(&self, key: &str) -> Result<(), AppError> {
        self.bucket
            .delete_object(key)
            .await
            .map_err(|e| AppError::Internal(format!("Failed to delete file '{}': {}", key, e)))?;

        debug!("Deleted file '{}' from bucket '{}'", key, self.bucket.name());
        Ok(())
    }

    /// Delete every key, logging failures instead of returning them
    pub async fn delete_best_effort(&self, keys: &[String]) {
        for key in keys {
            if let Err(e) = self.delete(key).await {
                warn!("Orphaned blob left behind: {}", e);
            }
        }
    }

    /// Direct URL for an object under the public prefix
    pub fn public_url(&self, key: &str) -> String {
        format!("{}/{}/{}", self.public_endpoint, self.bucket.name(), key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> MinIOConfig {
        MinIOConfig {
            endpoint: "http://minio:9000/".to_string(),
            public_endpoint: "https://cdn.example.com".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket: "civic-report".to_string(),
            region: "us-east-1".to_string(),
            public_prefix: "/public/".to_string(),
        }
    }

    #[test]
    fn test_issue_image_key_layout() {
        let client = MinIOClient::from_config(config()).unwrap();
        let issue_id = Uuid::now_v7();
        let image_id = Uuid::now_v7();

        assert_eq!(
            client.issue_image_key(issue_id, image_id, "png"),
            format!("public/issues/{}/{}.png", issue_id, image_id)
        );
    }

    #[test]
    fn test_public_url_uses_public_endpoint() {
        let client = MinIOClient::from_config(config()).unwrap();
        assert_eq!(
            client.public_url("public/issues/a/b.jpg"),
            "https://cdn.example.com/civic-report/public/issues/a/b.jpg"
        );
    }
}
