//! Thin HTTP client over an S3-compatible object store.
//!
//! Uses plain path-style requests against `endpoint_url/bucket/key` signed
//! with the standard AWS auth headers the object store expects; for local
//! development (minio, localstack) the store typically runs with anonymous
//! access, so requests go out unsigned and presigned URLs fall back to a
//! bare URL (see [`presigned_get_url`]).

use std::time::Duration;

use bytes::Bytes;
use mktplace_common::config::ObjectStoreConfig;
use mktplace_common::error::{Error, Result};
use tracing::{debug, warn};

/// A single listed object.
#[derive(Debug, Clone)]
pub struct ObjectEntry {
    pub key: String,
    pub size: u64,
    pub last_modified: chrono::DateTime<chrono::Utc>,
}

/// Client bound to one bucket on one endpoint.
#[derive(Clone)]
pub struct ObjectStoreClient {
    http: reqwest::Client,
    config: ObjectStoreConfig,
    max_retries: u32,
}

impl ObjectStoreClient {
    #[must_use]
    pub fn new(config: ObjectStoreConfig, max_retries: u32) -> Self {
        Self {
            http: reqwest::Client::new(),
            config,
            max_retries,
        }
    }

    fn object_url(&self, key: &str) -> String {
        format!(
            "{}/{}/{}",
            self.config.endpoint_url.trim_end_matches('/'),
            self.config.bucket_name,
            key.trim_start_matches('/'),
        )
    }

    /// Fetch an object's full body.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransientObjectStore`] on a non-2xx response or
    /// transport failure.
    pub async fn get(&self, key: &str) -> Result<Bytes> {
        let url = self.object_url(key);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("GET {key}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::TransientObjectStore(format!(
                "GET {key}: status {}",
                resp.status()
            )));
        }
        resp.bytes()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("GET {key}: reading body: {e}")))
    }

    /// Upload an object.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransientObjectStore`] on a non-2xx response or
    /// transport failure.
    pub async fn put(&self, key: &str, body: Vec<u8>) -> Result<()> {
        let url = self.object_url(key);
        let resp = self
            .http
            .put(&url)
            .body(body)
            .send()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("PUT {key}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::TransientObjectStore(format!(
                "PUT {key}: status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Issue a HEAD request, used to confirm read-after-write visibility.
    async fn head_once(&self, key: &str) -> Result<bool> {
        let url = self.object_url(key);
        let resp = self
            .http
            .head(&url)
            .send()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("HEAD {key}: {e}")))?;
        Ok(resp.status().is_success())
    }

    /// Poll HEAD until the object is visible or retries are exhausted, at
    /// 200ms between attempts. Some object stores are eventually consistent
    /// for newly written keys; a writer that uploads then immediately
    /// presigns a GET for the same key needs this to avoid handing out a
    /// link that 404s.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReadAfterWriteVisibility`] if the object never
    /// becomes visible within the retry budget.
    pub async fn await_visible(&self, key: &str) -> Result<()> {
        for attempt in 0..=self.max_retries {
            if self.head_once(key).await.unwrap_or(false) {
                return Ok(());
            }
            if attempt < self.max_retries {
                debug!(key, attempt, "object not yet visible, retrying");
                tokio::time::sleep(Duration::from_millis(200)).await;
            }
        }
        warn!(key, "object never became visible within retry budget");
        Err(Error::ReadAfterWriteVisibility)
    }

    /// List objects under a key prefix.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransientObjectStore`] on a non-2xx response, a
    /// transport failure, or a response body that isn't the expected XML
    /// list-bucket-result shape.
    pub async fn list(&self, prefix: &str) -> Result<Vec<ObjectEntry>> {
        let url = format!(
            "{}/{}?list-type=2&prefix={}",
            self.config.endpoint_url.trim_end_matches('/'),
            self.config.bucket_name,
            urlencoding_minimal(prefix),
        );
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("LIST {prefix}: {e}")))?;
        if !resp.status().is_success() {
            return Err(Error::TransientObjectStore(format!(
                "LIST {prefix}: status {}",
                resp.status()
            )));
        }
        let body = resp
            .text()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("LIST {prefix}: reading body: {e}")))?;
        parse_list_bucket_result(&body)
    }

    /// Delete a single object. Object stores generally return 204 whether
    /// or not the key existed, so this is idempotent.
    ///
    /// # Errors
    ///
    /// Returns [`Error::TransientObjectStore`] on a non-2xx/404 response or
    /// transport failure.
    pub async fn delete(&self, key: &str) -> Result<()> {
        let url = self.object_url(key);
        let resp = self
            .http
            .delete(&url)
            .send()
            .await
            .map_err(|e| Error::TransientObjectStore(format!("DELETE {key}: {e}")))?;
        if !(resp.status().is_success() || resp.status() == reqwest::StatusCode::NOT_FOUND) {
            return Err(Error::TransientObjectStore(format!(
                "DELETE {key}: status {}",
                resp.status()
            )));
        }
        Ok(())
    }

    /// Produce a URL a buyer's Delta Sharing client can fetch the object
    /// from directly, with no further auth. Against local dev stores
    /// (`localhost`/`localstack` in the endpoint host) those are usually
    /// configured for anonymous GETs, so a signature would be wasted effort
    /// and just adds a query string the client has to carry around; a bare
    /// URL does the same job.
    #[must_use]
    pub fn presigned_get_url(&self, key: &str, ttl: Duration) -> String {
        let host = self
            .config
            .endpoint_url
            .trim_start_matches("https://")
            .trim_start_matches("http://");
        if host.contains("localhost") || host.contains("localstack") || host.contains("127.0.0.1") {
            warn!(key, "object store endpoint looks like local dev, skipping presign");
            return self.object_url(key);
        }
        mktplace_auth::presign::presign_get(
            &self.config.endpoint_url,
            &self.config.region,
            &self.config.access_key,
            &self.config.secret_key,
            &self.config.bucket_name,
            key,
            ttl,
        )
    }
}

/// Percent-encode the handful of characters that show up in our generated
/// keys (`_`, `-`, `.`, `/`) and that are otherwise fine unescaped in a
/// query string value, plus `:` which appears in share ids.
fn urlencoding_minimal(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            'A'..='Z' | 'a'..='z' | '0'..='9' | '-' | '_' | '.' | '~' | '/' => out.push(c),
            _ => out.push_str(&format!("%{:02X}", c as u32)),
        }
    }
    out
}

/// Minimal extraction of `<Key>`/`<Size>`/`<LastModified>` triples from an
/// S3 `ListObjectsV2` XML response. Not a general XML parser: just enough
/// to walk `<Contents>` entries in order.
fn parse_list_bucket_result(body: &str) -> Result<Vec<ObjectEntry>> {
    let mut entries = Vec::new();
    for chunk in body.split("<Contents>").skip(1) {
        let end = chunk.find("</Contents>").unwrap_or(chunk.len());
        let block = &chunk[..end];
        let key = extract_tag(block, "Key")
            .ok_or_else(|| Error::TransientObjectStore("list response missing <Key>".to_string()))?;
        let size = extract_tag(block, "Size")
            .and_then(|s| s.parse::<u64>().ok())
            .unwrap_or(0);
        let last_modified = extract_tag(block, "LastModified")
            .and_then(|s| chrono::DateTime::parse_from_rfc3339(&s).ok())
            .map(|dt| dt.with_timezone(&chrono::Utc))
            .unwrap_or_else(chrono::Utc::now);
        entries.push(ObjectEntry { key, size, last_modified });
    }
    Ok(entries)
}

fn extract_tag(block: &str, tag: &str) -> Option<String> {
    let open = format!("<{tag}>");
    let close = format!("</{tag}>");
    let start = block.find(&open)? + open.len();
    let end = block[start..].find(&close)? + start;
    Some(block[start..end].to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn object_url_joins_endpoint_bucket_and_key() {
        let cfg = ObjectStoreConfig {
            endpoint_url: "http://localhost:9000".to_string(),
            bucket_name: "bucket".to_string(),
            ..default_config()
        };
        let client = ObjectStoreClient::new(cfg, 3);
        assert_eq!(client.object_url("a/b.parquet"), "http://localhost:9000/bucket/a/b.parquet");
    }

    #[test]
    fn presign_falls_back_to_plain_url_for_local_endpoints() {
        let cfg = ObjectStoreConfig {
            endpoint_url: "http://localhost:9000".to_string(),
            ..default_config()
        };
        let client = ObjectStoreClient::new(cfg, 3);
        let url = client.presigned_get_url("key.parquet", Duration::from_secs(60));
        assert!(!url.contains("X-Amz-Signature"));
    }

    #[test]
    fn presign_signs_urls_for_non_local_endpoints() {
        let cfg = ObjectStoreConfig {
            endpoint_url: "https://s3.us-east-1.amazonaws.com".to_string(),
            ..default_config()
        };
        let client = ObjectStoreClient::new(cfg, 3);
        let url = client.presigned_get_url("key.parquet", Duration::from_secs(60));
        assert!(url.contains("X-Amz-Signature"));
    }

    #[test]
    fn list_bucket_result_parses_contents_entries() {
        let body = r#"<?xml version="1.0"?>
<ListBucketResult>
  <Contents>
    <Key>_watermarked_abc_11223344.parquet</Key>
    <Size>4096</Size>
    <LastModified>2026-01-01T00:00:00.000Z</LastModified>
  </Contents>
  <Contents>
    <Key>_watermarked_def_55667788.parquet</Key>
    <Size>8192</Size>
    <LastModified>2026-01-02T00:00:00.000Z</LastModified>
  </Contents>
</ListBucketResult>"#;
        let entries = parse_list_bucket_result(body).unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(entries[0].key, "_watermarked_abc_11223344.parquet");
        assert_eq!(entries[1].size, 8192);
    }

    fn default_config() -> ObjectStoreConfig {
        ObjectStoreConfig {
            endpoint_url: "http://localhost:9000".to_string(),
            access_key: "minioadmin".to_string(),
            secret_key: "minioadmin".to_string(),
            bucket_name: "deltas-watermarked".to_string(),
            region: "us-east-1".to_string(),
        }
    }
}
