//!
//! HTTP client for the remote block source.
//!
//! This module provides the `BlockSource` seam used by the sync controller and its HTTP
//! implementation. A fetch asks for exactly one height; the caller is responsible for asking for
//! heights in order.

use super::types::*;
use async_trait::async_trait;
use reqwest::{Client, Url};
use std::time::Duration;
use tracing::debug;

/// Anything that can hand out blocks by height.
#[async_trait]
pub trait BlockSource: Send + Sync {
	/// Fetch the block at `height`.
	///
	/// Returns `BlockFetch::Absent` when the source has nothing at that height yet. Transport
	/// failures are errors and must not be folded into `Absent`.
	async fn fetch_block(&self, height: u64) -> Result<BlockFetch, SourceError>;
}

/// Block source backed by a plain HTTP endpoint
#[derive(Clone)]
pub struct HttpBlockSource {
	/// The underlying HTTP client.
	http_client: Client,
	/// Base URL of the block endpoint, without a trailing slash.
	endpoint: String,
}

impl HttpBlockSource {
	/// Create a new block source client.
	///
	/// # Arguments
	/// * `endpoint` - Base URL; blocks are read from `<endpoint>/block/{height}`.
	/// * `timeout` - Per-request timeout applied by the HTTP client.
	///
	/// # Returns
	/// A new `HttpBlockSource`, or a `SourceError` if the endpoint is not a valid URL or the
	/// client cannot be built.
	pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, SourceError> {
		Url::parse(endpoint).map_err(|e| SourceError::EndpointError(format!("{endpoint}: {e}")))?;

		let http_client = Client::builder().timeout(timeout).build()?;

		Ok(Self {
			http_client,
			endpoint: endpoint.trim_end_matches('/').to_string(),
		})
	}

	/// URL a given height is requested from.
	pub fn block_url(&self, height: u64) -> String {
		format!("{}/block/{}", self.endpoint, height)
	}
}

#[async_trait]
impl BlockSource for HttpBlockSource {
	async fn fetch_block(&self, height: u64) -> Result<BlockFetch, SourceError> {
		let url = self.block_url(height);
		debug!("Fetching block {} from {}", height, url);

		let response = self.http_client.get(&url).send().await?;

		if !response.status().is_success() {
			return Err(SourceError::StatusError {
				height,
				status: response.status().as_u16(),
			});
		}

		let body = response.text().await?;
		decode_block_response(height, &body)
	}
}

/// Decode a block endpoint response body.
///
/// A body without `data`, or whose `data` has no `block`, means the source has no block at this
/// height. A body that is not JSON at all is a transport error.
pub fn decode_block_response(height: u64, body: &str) -> Result<BlockFetch, SourceError> {
	let response: BlockResponse = serde_json::from_str(body)?;

	let Some(data) = response.data else {
		return Ok(BlockFetch::Absent);
	};

	match data.get("block") {
		Some(block) if !block.is_null() => Ok(BlockFetch::Present(BlockMessage {
			height,
			payload: data.to_string(),
		})),
		_ => Ok(BlockFetch::Absent),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::chain::light::tests::{block_at, block_payload};
	use serde_json::json;
	use tokio::io::{AsyncReadExt, AsyncWriteExt};
	use tokio::net::TcpListener;
	use tokio::sync::oneshot;

	/// Serve one canned HTTP response on a local port. The receiver yields the request line.
	async fn serve_once(status: &str, body: String) -> (String, oneshot::Receiver<String>) {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let endpoint = format!("http://{}", listener.local_addr().unwrap());
		let status = status.to_string();
		let (request_tx, request_rx) = oneshot::channel();

		tokio::spawn(async move {
			let (mut stream, _) = listener.accept().await.unwrap();

			let mut request = Vec::new();
			let mut buf = [0u8; 1024];
			while !request.windows(4).any(|w| w == b"\r\n\r\n") {
				let n = stream.read(&mut buf).await.unwrap();
				if n == 0 {
					break;
				}
				request.extend_from_slice(&buf[..n]);
			}
			let request = String::from_utf8_lossy(&request);
			let line = request.lines().next().unwrap_or_default().to_string();
			let _ = request_tx.send(line);

			let response = format!(
				"HTTP/1.1 {}\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
				status,
				body.len(),
				body
			);
			stream.write_all(response.as_bytes()).await.unwrap();
			stream.shutdown().await.unwrap();
		});

		(endpoint, request_rx)
	}

	fn source(endpoint: &str) -> HttpBlockSource {
		HttpBlockSource::new(endpoint, Duration::from_secs(5)).unwrap()
	}

	#[test]
	fn test_present_block_keeps_whole_data_object() {
		let body = json!({
			"data": {
				"block": { "header": { "hash": "aa" } },
				"proof": { "targets": [], "hashes": [] },
				"leaf_data": []
			}
		})
		.to_string();

		let BlockFetch::Present(block) = decode_block_response(7, &body).expect("valid body") else {
			panic!("block should be present");
		};
		assert_eq!(block.height, 7);

		let payload: serde_json::Value = serde_json::from_str(&block.payload).unwrap();
		assert_eq!(payload["block"]["header"]["hash"], "aa");
		assert!(payload.get("proof").is_some());
		assert!(payload.get("leaf_data").is_some());
	}

	#[test]
	fn test_missing_block_is_absent() {
		assert_eq!(decode_block_response(1, "{}").unwrap(), BlockFetch::Absent);
		assert_eq!(
			decode_block_response(1, r#"{"data": null}"#).unwrap(),
			BlockFetch::Absent
		);
		assert_eq!(
			decode_block_response(1, r#"{"data": {"proof": {}}}"#).unwrap(),
			BlockFetch::Absent
		);
		assert_eq!(
			decode_block_response(1, r#"{"data": {"block": null}}"#).unwrap(),
			BlockFetch::Absent
		);
	}

	#[test]
	fn test_non_json_body_is_transport_error() {
		let err = decode_block_response(1, "<html>bad gateway</html>").unwrap_err();
		assert!(matches!(err, SourceError::JsonError(_)));
	}

	#[test]
	fn test_block_url_strips_trailing_slash() {
		let source = HttpBlockSource::new("http://localhost:8080/", Duration::from_secs(1)).unwrap();
		assert_eq!(source.block_url(12), "http://localhost:8080/block/12");
	}

	#[test]
	fn test_invalid_endpoint_rejected() {
		let err = HttpBlockSource::new("not a url", Duration::from_secs(1))
			.err()
			.expect("endpoint should be rejected");
		assert!(matches!(err, SourceError::EndpointError(_)));
	}

	#[tokio::test]
	async fn test_fetch_non_success_status_is_error() {
		let (endpoint, request) = serve_once("503 Service Unavailable", "{}".to_string()).await;

		let err = source(&endpoint).fetch_block(4).await.unwrap_err();
		assert!(matches!(err, SourceError::StatusError { height: 4, status: 503 }));
		assert!(request.await.unwrap().starts_with("GET /block/4 "));
	}

	#[tokio::test]
	async fn test_fetch_empty_data_is_absent() {
		let (endpoint, request) = serve_once("200 OK", r#"{"data":{}}"#.to_string()).await;

		let fetched = source(&endpoint).fetch_block(9).await.unwrap();
		assert_eq!(fetched, BlockFetch::Absent);
		assert!(request.await.unwrap().starts_with("GET /block/9 "));
	}

	#[tokio::test]
	async fn test_fetch_block_is_present() {
		let payload = block_payload(&block_at(1));
		let body = format!(r#"{{"data":{}}}"#, payload);
		let (endpoint, request) = serve_once("200 OK", body).await;

		let BlockFetch::Present(block) = source(&endpoint).fetch_block(1).await.unwrap() else {
			panic!("block should be present");
		};
		assert_eq!(block.height, 1);

		let sent: serde_json::Value = serde_json::from_str(&payload).unwrap();
		let received: serde_json::Value = serde_json::from_str(&block.payload).unwrap();
		assert_eq!(received, sent);
		assert!(request.await.unwrap().starts_with("GET /block/1 "));
	}

	#[tokio::test]
	async fn test_fetch_from_closed_port_is_error() {
		let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
		let endpoint = format!("http://{}", listener.local_addr().unwrap());
		drop(listener);

		let err = source(&endpoint).fetch_block(1).await.unwrap_err();
		assert!(matches!(err, SourceError::HttpError(_)));
	}
}
