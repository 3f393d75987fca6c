//! Event sinks: where published events end up.

use std::future::Future;
use std::pin::Pin;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tracing::{debug, info};

use crate::error::PublishError;
use crate::event::RunEvent;

pub trait EventSink: Send + Sync {
    fn deliver<'a>(
        &'a self,
        event: &'a RunEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>>;
}

// ── HTTP ──────────────────────────────────────────────────────────

/// POSTs each event as JSON to a bus gateway.
#[derive(Debug, Clone)]
pub struct HttpSink {
    address: String,
    host: String,
    path: String,
    timeout: Duration,
}

impl HttpSink {
    pub fn new(endpoint: &str, timeout: Duration) -> Result<Self, PublishError> {
        let uri: http::Uri = endpoint
            .parse()
            .map_err(|e: http::uri::InvalidUri| PublishError::InvalidEndpoint(e.to_string()))?;
        if uri.scheme_str() != Some("http") {
            return Err(PublishError::InvalidEndpoint(format!(
                "{endpoint}: only http:// is supported"
            )));
        }
        let authority = uri
            .authority()
            .ok_or_else(|| PublishError::InvalidEndpoint(format!("{endpoint}: missing host")))?;
        let address = match authority.port_u16() {
            Some(_) => authority.to_string(),
            None => format!("{}:80", authority.host()),
        };
        let path = uri
            .path_and_query()
            .map(|pq| pq.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            address,
            host: authority.to_string(),
            path,
            timeout,
        })
    }

    async fn post(&self, body: Vec<u8>) -> Result<(), PublishError> {
        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;
        let io = hyper_util::rt::TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;

        // Drive the connection in the background.
        tokio::spawn(async move {
            let _ = conn.await;
        });

        let req = http::Request::builder()
            .method("POST")
            .uri(&self.path)
            .header("host", &self.host)
            .header("content-type", "application/json")
            .header("user-agent", "checkgrid/0.1")
            .body(http_body_util::Full::new(bytes::Bytes::from(body)))
            .map_err(|e| PublishError::InvalidEndpoint(e.to_string()))?;

        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| PublishError::Connect(e.to_string()))?;
        if !resp.status().is_success() {
            return Err(PublishError::Status(resp.status().as_u16()));
        }
        Ok(())
    }
}

impl EventSink for HttpSink {
    fn deliver<'a>(
        &'a self,
        event: &'a RunEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>> {
        Box::pin(async move {
            let body = serde_json::to_vec(event)?;
            match tokio::time::timeout(self.timeout, self.post(body)).await {
                Ok(result) => result,
                Err(_) => Err(PublishError::Timeout),
            }
        })
    }
}

// ── Log ───────────────────────────────────────────────────────────

/// Used when no endpoint is configured.
#[derive(Debug, Clone, Copy, Default)]
pub struct LogSink;

impl EventSink for LogSink {
    fn deliver<'a>(
        &'a self,
        event: &'a RunEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>> {
        Box::pin(async move {
            match &event.test_id {
                Some(test_id) => debug!(
                    run_id = %event.run_id,
                    cluster_id = %event.cluster_id,
                    %test_id,
                    status = %event.status,
                    "test event"
                ),
                None => info!(
                    run_id = %event.run_id,
                    cluster_id = %event.cluster_id,
                    test_set = %event.test_set_id,
                    status = %event.status,
                    "run event"
                ),
            }
            Ok(())
        })
    }
}

// ── Memory ────────────────────────────────────────────────────────

/// Records delivered events. Can be switched to reject everything.
#[derive(Debug, Clone, Default)]
pub struct MemorySink {
    events: Arc<Mutex<Vec<RunEvent>>>,
    failing: Arc<Mutex<bool>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A sink whose every delivery fails.
    pub fn failing() -> Self {
        let sink = Self::default();
        sink.set_failing(true);
        sink
    }

    pub fn set_failing(&self, failing: bool) {
        *self.failing.lock().unwrap_or_else(|e| e.into_inner()) = failing;
    }

    pub fn events(&self) -> Vec<RunEvent> {
        self.events.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    /// Delivered events of one run, in delivery order.
    pub fn events_for(&self, run_id: u64) -> Vec<RunEvent> {
        self.events()
            .into_iter()
            .filter(|e| e.run_id == run_id)
            .collect()
    }
}

impl EventSink for MemorySink {
    fn deliver<'a>(
        &'a self,
        event: &'a RunEvent,
    ) -> Pin<Box<dyn Future<Output = Result<(), PublishError>> + Send + 'a>> {
        let result = if *self.failing.lock().unwrap_or_else(|e| e.into_inner()) {
            Err(PublishError::Rejected("sink set to fail".to_string()))
        } else {
            self.events
                .lock()
                .unwrap_or_else(|e| e.into_inner())
                .push(event.clone());
            Ok(())
        };
        Box::pin(async move { result })
    }
}
