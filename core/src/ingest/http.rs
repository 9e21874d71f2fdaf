//! HTTP snapshot source
//!
//! A plain GET per attempt. Response decompression is left to the wire codec,
//! so the client is built without reqwest's transparent gzip support and the
//! declared `Content-Encoding` travels with the body.
//!
//! Copyright (c) 2025 Mohammad Atashi <mohammadaliatashi@icloud.com>

use std::time::Duration;

use async_trait::async_trait;
use log::{debug, warn};
use reqwest::header::{HeaderMap, ACCEPT, CONTENT_ENCODING, RETRY_AFTER};
use reqwest::{Client, StatusCode};

use super::source::{FetchOutcome, SnapshotSource, SourceError};
use crate::codec::{ContentEncoding, FormatHeader, Payload};

pub const HEADER_VERTEX_STRIDE: &str = "x-vertex-stride";
pub const HEADER_VERTEX_FORMAT: &str = "x-vertex-format";

pub struct HttpSnapshotSource {
    name: String,
    url: String,
    client: Client,
}

impl HttpSnapshotSource {
    pub fn new(name: impl Into<String>, url: impl Into<String>, timeout: Duration) -> Result<Self, SourceError> {
        let url = url.into();
        if url.trim().is_empty() {
            return Err(SourceError::Configuration("snapshot URL is empty".into()));
        }
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| SourceError::Configuration(e.to_string()))?;
        Ok(Self { name: name.into(), url, client })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl SnapshotSource for HttpSnapshotSource {
    fn name(&self) -> &str {
        &self.name
    }

    async fn fetch(&self) -> Result<FetchOutcome, SourceError> {
        let response = self
            .client
            .get(&self.url)
            .header(ACCEPT, "application/octet-stream")
            .send()
            .await
            .map_err(|e| SourceError::Transport(e.to_string()))?;

        let status = response.status();
        match status {
            StatusCode::NO_CONTENT => {
                debug!("Source '{}' has no content", self.name);
                Ok(FetchOutcome::NoContent)
            }
            StatusCode::SERVICE_UNAVAILABLE => {
                let retry_after = retry_after(response.headers());
                warn!("Source '{}' unavailable (retry after {:?})", self.name, retry_after);
                Ok(FetchOutcome::Unavailable { retry_after })
            }
            s if s.is_success() => {
                let headers = response.headers().clone();
                let body = response.bytes().await.map_err(|e| SourceError::Transport(e.to_string()))?;
                debug!("Source '{}' delivered {} bytes", self.name, body.len());
                Ok(FetchOutcome::Payload(payload_from_parts(&headers, body.to_vec())))
            }
            s => Err(SourceError::UnexpectedStatus { status: s.as_u16() }),
        }
    }
}

/// Attach the transport metadata carried by `headers` to `body`
pub fn payload_from_parts(headers: &HeaderMap, body: Vec<u8>) -> Payload {
    let text = |name: &str| headers.get(name).and_then(|value| value.to_str().ok()).map(str::trim);

    let encoding = text(CONTENT_ENCODING.as_str()).map(ContentEncoding::from_header).unwrap_or_default();
    // An unparsable stride declaration can never match the contract
    let stride = text(HEADER_VERTEX_STRIDE).map(|value| value.parse::<u32>().unwrap_or(0));
    let format = text(HEADER_VERTEX_FORMAT).map(str::to_owned);

    Payload::raw(body).with_encoding(encoding).with_header(FormatHeader { stride, format })
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored
pub fn retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.trim().parse::<u64>().ok())
        .map(Duration::from_secs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use reqwest::header::HeaderValue;

    #[test]
    fn test_payload_reads_declared_headers() {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
        headers.insert(HEADER_VERTEX_STRIDE, HeaderValue::from_static("28"));
        headers.insert(HEADER_VERTEX_FORMAT, HeaderValue::from_static("vertex-record"));

        let payload = payload_from_parts(&headers, vec![1, 2, 3]);
        assert_eq!(payload.encoding, ContentEncoding::Gzip);
        assert_eq!(payload.header.stride, Some(28));
        assert_eq!(payload.header.format.as_deref(), Some("vertex-record"));
        assert!(payload.header.validate().is_ok());
    }

    #[test]
    fn test_garbage_stride_is_rejected_by_codec() {
        let mut headers = HeaderMap::new();
        headers.insert(HEADER_VERTEX_STRIDE, HeaderValue::from_static("wide"));

        let payload = payload_from_parts(&headers, Vec::new());
        assert_eq!(payload.header.stride, Some(0));
        assert!(payload.header.validate().is_err());
    }

    #[test]
    fn test_missing_headers_mean_identity() {
        let payload = payload_from_parts(&HeaderMap::new(), vec![0; 28]);
        assert_eq!(payload.encoding, ContentEncoding::Identity);
        assert_eq!(payload.header, FormatHeader::default());
    }

    #[test]
    fn test_retry_after_seconds() {
        let mut headers = HeaderMap::new();
        assert_eq!(retry_after(&headers), None);

        headers.insert(RETRY_AFTER, HeaderValue::from_static("7"));
        assert_eq!(retry_after(&headers), Some(Duration::from_secs(7)));

        headers.insert(RETRY_AFTER, HeaderValue::from_static("Wed, 21 Oct 2015 07:28:00 GMT"));
        assert_eq!(retry_after(&headers), None);
    }

    #[test]
    fn test_empty_url_is_rejected() {
        assert!(matches!(
            HttpSnapshotSource::new("primary", " ", Duration::from_secs(1)),
            Err(SourceError::Configuration(_))
        ));
    }
}
