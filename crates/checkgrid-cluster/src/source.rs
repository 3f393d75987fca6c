//! Metadata sources: where cluster snapshots come from.

use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::sync::Mutex;
use std::time::Duration;

use checkgrid_core::ClusterState;
use http_body_util::BodyExt;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ClusterStateFetchError, FetchResult};

/// Wire shape of `GET {metadata_url}/clusters/{cluster_id}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterMetadata {
    pub deployment_mode: String,
    pub operating_system: String,
    pub release_version: String,
    #[serde(default)]
    pub enabled_components: Vec<String>,
}

impl ClusterMetadata {
    pub fn into_state(self, cluster_id: &str, fetched_at: u64) -> ClusterState {
        ClusterState {
            cluster_id: cluster_id.to_string(),
            release_version: self.release_version,
            deployment_mode: self.deployment_mode,
            operating_system: self.operating_system,
            enabled_components: self.enabled_components.into_iter().collect(),
            fetched_at,
        }
    }
}

/// Read access to the cluster metadata collaborator.
pub trait MetadataSource: Send + Sync {
    fn fetch<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<ClusterMetadata>> + Send + 'a>>;
}

// ── HTTP ──────────────────────────────────────────────────────────

/// Plain HTTP/1.1 metadata client.
#[derive(Debug, Clone)]
pub struct HttpMetadataSource {
    /// `host:port` to connect to.
    address: String,
    /// Value of the `host` header.
    host: String,
    /// Path prefix from the configured url, without trailing slash.
    base_path: String,
    timeout: Duration,
}

impl HttpMetadataSource {
    pub fn new(metadata_url: &str, timeout: Duration) -> FetchResult<Self> {
        let uri: http::Uri = metadata_url
            .parse()
            .map_err(|e: http::uri::InvalidUri| ClusterStateFetchError::InvalidUrl(e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(ClusterStateFetchError::InvalidUrl(format!(
                "{metadata_url}: only http:// is supported"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| ClusterStateFetchError::InvalidUrl(format!("{metadata_url}: missing host")))?;
        let address = match authority.port_u16() {
            Some(_) => authority.to_string(),
            None => format!("{}:80", authority.host()),
        };

        Ok(Self {
            address,
            host: authority.to_string(),
            base_path: uri.path().trim_end_matches('/').to_string(),
            timeout,
        })
    }

    async fn get(&self, cluster_id: &str) -> FetchResult<ClusterMetadata> {
        let path = format!("{}/clusters/{cluster_id}", self.base_path);

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| ClusterStateFetchError::Connect(e.to_string()))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| ClusterStateFetchError::Connect(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("GET")
            .uri(&path)
            .header("host", &self.host)
            .header("accept", "application/json")
            .header("user-agent", "checkgrid/0.1")
            .body(http_body_util::Empty::<bytes::Bytes>::new())
            .map_err(|e| ClusterStateFetchError::InvalidUrl(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| ClusterStateFetchError::Connect(e.to_string()))?;
        let status = resp.status();
        if !status.is_success() {
            debug!(%status, %cluster_id, "metadata request non-2xx");
            return Err(ClusterStateFetchError::Status(status.as_u16()));
        }

        let body = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| ClusterStateFetchError::Connect(e.to_string()))?
            .to_bytes();
        serde_json::from_slice(&body).map_err(|e| ClusterStateFetchError::Malformed(e.to_string()))
    }
}

impl MetadataSource for HttpMetadataSource {
    fn fetch<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<ClusterMetadata>> + Send + 'a>> {
        Box::pin(async move {
            match tokio::time::timeout(self.timeout, self.get(cluster_id)).await {
                Ok(result) => result,
                Err(_) => {
                    debug!(%cluster_id, "metadata request timed out");
                    Err(ClusterStateFetchError::Timeout)
                }
            }
        })
    }
}

// ── Static ────────────────────────────────────────────────────────

/// In-memory metadata for tests and offline use.
///
/// Unknown clusters answer like a 404; clusters marked unavailable fail
/// like an unreachable service.
#[derive(Debug, Default)]
pub struct StaticMetadataSource {
    clusters: Mutex<HashMap<String, Option<ClusterMetadata>>>,
}

impl StaticMetadataSource {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&self, cluster_id: &str, metadata: ClusterMetadata) {
        self.clusters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cluster_id.to_string(), Some(metadata));
    }

    /// Make subsequent fetches for `cluster_id` fail.
    pub fn set_unavailable(&self, cluster_id: &str) {
        self.clusters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .insert(cluster_id.to_string(), None);
    }
}

impl MetadataSource for StaticMetadataSource {
    fn fetch<'a>(
        &'a self,
        cluster_id: &'a str,
    ) -> Pin<Box<dyn Future<Output = FetchResult<ClusterMetadata>> + Send + 'a>> {
        let entry = self
            .clusters
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .get(cluster_id)
            .cloned();
        Box::pin(async move {
            match entry {
                Some(Some(metadata)) => Ok(metadata),
                Some(None) => Err(ClusterStateFetchError::Connect(format!(
                    "cluster {cluster_id} unavailable"
                ))),
                None => Err(ClusterStateFetchError::Status(404)),
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    /// Serve one canned HTTP response and hand back the request line.
    async fn serve_once(status: &str, body: &str) -> (String, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
            body.len()
        );
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut buf = vec![0u8; 4096];
            let n = socket.read(&mut buf).await.unwrap();
            socket.write_all(response.as_bytes()).await.unwrap();
            let request = String::from_utf8_lossy(&buf[..n]).to_string();
            request.lines().next().unwrap_or_default().to_string()
        });
        (format!("http://{addr}/api/"), handle)
    }

    #[tokio::test]
    async fn http_source_parses_metadata() {
        let (url, server) = serve_once(
            "200 OK",
            r#"{"deployment_mode":"ha_compact","operating_system":"ubuntu","release_version":"8.0","enabled_components":["murano"]}"#,
        )
        .await;
        let source = HttpMetadataSource::new(&url, Duration::from_secs(2)).unwrap();

        let metadata = source.fetch("env-7").await.unwrap();
        assert_eq!(metadata.release_version, "8.0");
        assert_eq!(metadata.enabled_components, vec!["murano"]);

        let request_line = server.await.unwrap();
        assert_eq!(request_line, "GET /api/clusters/env-7 HTTP/1.1");
    }

    #[tokio::test]
    async fn http_source_rejects_non_2xx() {
        let (url, _server) = serve_once("503 Service Unavailable", "{}").await;
        let source = HttpMetadataSource::new(&url, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.fetch("env-1").await,
            Err(ClusterStateFetchError::Status(503))
        ));
    }

    #[tokio::test]
    async fn http_source_rejects_malformed_body() {
        let (url, _server) = serve_once("200 OK", r#"{"deployment_mode":"ha"}"#).await;
        let source = HttpMetadataSource::new(&url, Duration::from_secs(2)).unwrap();
        assert!(matches!(
            source.fetch("env-1").await,
            Err(ClusterStateFetchError::Malformed(_))
        ));
    }

    #[tokio::test]
    async fn http_source_times_out() {
        // Accept the connection but never answer.
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let _server = tokio::spawn(async move {
            let (_socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
        });

        let source =
            HttpMetadataSource::new(&format!("http://{addr}"), Duration::from_millis(100)).unwrap();
        assert!(matches!(
            source.fetch("env-1").await,
            Err(ClusterStateFetchError::Timeout)
        ));
    }

    #[test]
    fn url_validation() {
        assert!(HttpMetadataSource::new("https://meta.local", Duration::from_secs(1)).is_err());
        assert!(HttpMetadataSource::new("not a url", Duration::from_secs(1)).is_err());

        let source = HttpMetadataSource::new("http://meta.local/v1", Duration::from_secs(1)).unwrap();
        assert_eq!(source.address, "meta.local:80");
        assert_eq!(source.base_path, "/v1");
    }

    #[tokio::test]
    async fn static_source_behaviour() {
        let source = StaticMetadataSource::new();
        source.insert(
            "env-1",
            ClusterMetadata {
                deployment_mode: "multinode".to_string(),
                operating_system: "centos".to_string(),
                release_version: "7.0".to_string(),
                enabled_components: vec![],
            },
        );
        assert!(source.fetch("env-1").await.is_ok());
        assert!(matches!(
            source.fetch("env-2").await,
            Err(ClusterStateFetchError::Status(404))
        ));

        source.set_unavailable("env-1");
        assert!(matches!(
            source.fetch("env-1").await,
            Err(ClusterStateFetchError::Connect(_))
        ));
    }
}
