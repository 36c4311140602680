//! S3-compatible remote blob store.
//!
//! Speaks the S3 REST protocol directly over `reqwest` rather than
//! pulling in a vendor SDK: the engine only issues object GET and PUT,
//! so the protocol surface is a few headers plus a SigV4 signature.
//! Path-style addressing keeps custom endpoints (MinIO and friends)
//! working without DNS games.

use super::sign::{hex_sha256, RequestSigner, UNSIGNED_PAYLOAD};
use super::{BlobStore, PutOptions};
use crate::config::StorageConfig;
use crate::error::{StorageError, StorageResult};
use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use reqwest::{Body, Client, StatusCode};
use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;
use tokio_util::io::ReaderStream;
use tracing::debug;
use url::Url;

const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug)]
pub struct S3Store {
    client: Client,
    signer: RequestSigner,
    bucket: String,
    endpoint: Url,
}

impl S3Store {
    /// Build a store from validated configuration.
    ///
    /// Fails fast when credentials or the bucket are missing, or when
    /// the endpoint violates the TLS requirement.
    pub fn new(config: &StorageConfig) -> StorageResult<Self> {
        config.validate()?;
        let access_key = config.access_key.clone().ok_or_else(|| {
            StorageError::Config("access_key is required for the s3 backend".to_string())
        })?;
        let secret_key = config.secret_key.clone().ok_or_else(|| {
            StorageError::Config("secret_key is required for the s3 backend".to_string())
        })?;

        let endpoint = match &config.endpoint {
            Some(endpoint) => endpoint.clone(),
            None => format!("https://s3.{}.amazonaws.com", config.region)
                .parse()
                .map_err(|err| {
                    StorageError::Config(format!("invalid default endpoint: {err}"))
                })?,
        };

        let client = Client::builder()
            .timeout(REQUEST_TIMEOUT)
            .user_agent(concat!("registry-storage/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            client,
            signer: RequestSigner::new(access_key, secret_key, config.region.clone()),
            bucket: config.bucket.clone(),
            endpoint,
        })
    }

    fn object_url(&self, key: &str) -> StorageResult<Url> {
        self.endpoint
            .join(&format!("{}/{key}", self.bucket))
            .map_err(|err| StorageError::Config(format!("invalid object key {key:?}: {err}")))
    }

    fn base_headers(
        &self,
        url: &Url,
        payload_hash: &str,
        opts: Option<&PutOptions>,
    ) -> BTreeMap<String, String> {
        let mut headers = BTreeMap::new();
        headers.insert("host".to_string(), host_header(url));
        headers.insert("x-amz-content-sha256".to_string(), payload_hash.to_string());
        if let Some(opts) = opts {
            headers.insert("content-type".to_string(), opts.content_type.clone());
            if let Some(encoding) = &opts.content_encoding {
                headers.insert("content-encoding".to_string(), encoding.clone());
            }
            headers.insert("x-amz-acl".to_string(), opts.access.as_str().to_string());
        }
        headers
    }

    async fn send_put(
        &self,
        key: &str,
        url: Url,
        headers: BTreeMap<String, String>,
        authorization: String,
        body: Body,
    ) -> StorageResult<()> {
        let mut request = self.client.put(url);
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        let response = request
            .header("authorization", authorization)
            .body(body)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            return Err(StorageError::Backend {
                key: key.to_string(),
                status: status.as_u16(),
            });
        }
        Ok(())
    }
}

#[async_trait]
impl BlobStore for S3Store {
    async fn get(&self, key: &str) -> StorageResult<Bytes> {
        let url = self.object_url(key)?;
        let payload_hash = hex_sha256(b"");
        let mut headers = self.base_headers(&url, &payload_hash, None);
        let authorization =
            self.signer
                .sign("GET", url.path(), &mut headers, &payload_hash, Utc::now());

        let mut request = self.client.get(url);
        for (name, value) in &headers {
            request = request.header(name, value);
        }
        let response = request.header("authorization", authorization).send().await?;

        match response.status() {
            status if status.is_success() => {
                let body = response.bytes().await?;
                debug!(key = %key, size = body.len(), "object fetched");
                Ok(body)
            }
            StatusCode::NOT_FOUND => Err(StorageError::NotFound(key.to_string())),
            status => Err(StorageError::Backend {
                key: key.to_string(),
                status: status.as_u16(),
            }),
        }
    }

    async fn put(&self, key: &str, body: Bytes, opts: &PutOptions) -> StorageResult<()> {
        let url = self.object_url(key)?;
        let payload_hash = hex_sha256(&body);
        let mut headers = self.base_headers(&url, &payload_hash, Some(opts));
        let authorization =
            self.signer
                .sign("PUT", url.path(), &mut headers, &payload_hash, Utc::now());

        let size = body.len();
        self.send_put(key, url, headers, authorization, Body::from(body))
            .await?;
        debug!(key = %key, size, "object stored");
        Ok(())
    }

    async fn put_file(&self, key: &str, path: &Path, opts: &PutOptions) -> StorageResult<()> {
        let url = self.object_url(key)?;
        let file = tokio::fs::File::open(path).await?;
        let size = file.metadata().await?.len();

        // Streamed bodies are signed as UNSIGNED-PAYLOAD; S3 still
        // requires an explicit Content-Length for a plain PUT.
        let mut headers = self.base_headers(&url, UNSIGNED_PAYLOAD, Some(opts));
        headers.insert("content-length".to_string(), size.to_string());
        let authorization =
            self.signer
                .sign("PUT", url.path(), &mut headers, UNSIGNED_PAYLOAD, Utc::now());

        let body = Body::wrap_stream(ReaderStream::new(file));
        self.send_put(key, url, headers, authorization, body).await?;
        debug!(key = %key, archive = %path.display(), size, "file streamed to store");
        Ok(())
    }
}

fn host_header(url: &Url) -> String {
    let host = url.host_str().unwrap_or_default();
    match url.port() {
        Some(port) => format!("{host}:{port}"),
        None => host.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_store() -> S3Store {
        S3Store::new(&StorageConfig::s3("repository.example.org", "AKID", "sekret")).unwrap()
    }

    #[test]
    fn object_urls_are_path_style() {
        let store = test_store();
        let url = store.object_url("registry.json").unwrap();
        assert_eq!(
            url.as_str(),
            "https://s3.us-east-1.amazonaws.com/repository.example.org/registry.json"
        );

        let url = store.object_url("foo/foo-1.2.3.zip").unwrap();
        assert_eq!(url.path(), "/repository.example.org/foo/foo-1.2.3.zip");
    }

    #[test]
    fn custom_endpoint_keeps_its_port_in_the_host_header() {
        let mut config = StorageConfig::s3("bucket", "AKID", "sekret");
        config.endpoint = Some("https://minio.internal:9000".parse().unwrap());
        let store = S3Store::new(&config).unwrap();

        let url = store.object_url("registry.json").unwrap();
        assert_eq!(host_header(&url), "minio.internal:9000");
    }

    #[test]
    fn put_headers_carry_object_metadata() {
        let store = test_store();
        let url = store.object_url("registry.json").unwrap();
        let headers = store.base_headers(&url, UNSIGNED_PAYLOAD, Some(&PutOptions::gzipped_json()));

        assert_eq!(headers.get("content-type").unwrap(), "application/json");
        assert_eq!(headers.get("content-encoding").unwrap(), "gzip");
        assert_eq!(headers.get("x-amz-acl").unwrap(), "public-read");
        assert_eq!(headers.get("x-amz-content-sha256").unwrap(), UNSIGNED_PAYLOAD);
    }

    #[test]
    fn construction_fails_without_credentials() {
        let mut config = StorageConfig::s3("repository.example.org", "AKID", "sekret");
        config.access_key = None;
        let err = S3Store::new(&config).unwrap_err();
        assert!(err.to_string().starts_with("Configuration error"));
    }
}
