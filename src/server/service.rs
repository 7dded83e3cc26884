use super::request::{parse_request, read_request, ParsedRequest, ReadOutcome};
use super::response::{error_page, write_response};
use crate::ids::RequestId;
use crate::metrics::ServerMetrics;
use crate::router::{RouteTarget, Router};
use crate::runtime_config::RuntimeConfig;
use crate::sandbox::{Sandbox, SandboxResponse};
use http::Method;
use may::net::TcpStream;
use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, info, warn};

/// The per-connection service: ties the router, sandbox, and metrics
/// together and runs the connection state machine
/// (read → parse → route → respond → close).
#[derive(Clone)]
pub struct AppService {
    pub router: Arc<Router>,
    pub sandbox: Arc<Sandbox>,
    pub metrics: Arc<ServerMetrics>,
    pub config: RuntimeConfig,
}

impl AppService {
    pub fn new(router: Router, sandbox: Sandbox) -> Self {
        Self {
            router: Arc::new(router),
            sandbox: Arc::new(sandbox),
            metrics: Arc::new(ServerMetrics::new()),
            config: RuntimeConfig::default(),
        }
    }

    pub fn with_config(mut self, config: RuntimeConfig) -> Self {
        self.config = config;
        self
    }

    /// Drive one connection from accept to close.
    ///
    /// Runs on the connection's own coroutine; reads and writes suspend
    /// cooperatively. Every exit path either delivered a well-formed
    /// response or abandoned a connection that failed at the transport
    /// level. Errors never propagate out of the task.
    pub(crate) fn handle_connection(&self, mut stream: TcpStream) {
        let request_id = RequestId::new();
        let peer = stream
            .peer_addr()
            .map(|a| a.to_string())
            .unwrap_or_default();
        if let Err(e) = stream.set_read_timeout(Some(self.config.read_timeout)) {
            debug!(%request_id, error = %e, "failed to set read timeout");
        }
        let start = Instant::now();

        let raw = match read_request(&mut stream, self.config.max_request_bytes) {
            Ok(ReadOutcome::Request(bytes)) => bytes,
            Ok(ReadOutcome::TooLarge) => {
                self.metrics.inc_protocol_error();
                warn!(%request_id, peer = %peer, "request exceeds size limit");
                let _ = write_response(&mut stream, &error_page(400, Some("Request too large.")));
                return;
            }
            Err(e) => {
                debug!(%request_id, peer = %peer, error = %e, "read failed, abandoning connection");
                return;
            }
        };

        let parsed = match parse_request(&raw) {
            Ok(parsed) => parsed,
            Err(e) => {
                self.metrics.inc_protocol_error();
                warn!(%request_id, peer = %peer, error = %e, "malformed request");
                let _ = write_response(&mut stream, &error_page(400, None));
                return;
            }
        };

        info!(
            %request_id,
            peer = %peer,
            method = %parsed.method,
            path = %parsed.path,
            "request received"
        );

        let status = self.respond(&mut stream, &parsed);

        let latency = start.elapsed();
        self.metrics.record_request(latency);
        match status {
            404 => self.metrics.inc_not_found(),
            500 => self.metrics.inc_server_error(),
            _ => {}
        }
        info!(
            %request_id,
            status,
            latency_ms = latency.as_millis() as u64,
            "request complete"
        );
    }

    fn respond(&self, stream: &mut TcpStream, parsed: &ParsedRequest) -> u16 {
        if parsed.method == Method::GET && parsed.path == "/health" {
            let resp = health_endpoint();
            let _ = write_response(stream, &resp);
            return resp.status;
        }
        if parsed.method == Method::GET && parsed.path == "/metrics" {
            let resp = metrics_endpoint(&self.metrics, self.sandbox.sessions().len());
            let _ = write_response(stream, &resp);
            return resp.status;
        }

        match self.router.route(&parsed.path) {
            RouteTarget::Handler(handler) => {
                let resp = self.sandbox.invoke(handler.as_ref(), parsed);
                if let Err(e) = write_response(stream, &resp) {
                    debug!(error = %e, "response write failed");
                }
                resp.status
            }
            RouteTarget::Static(path) => {
                match self.router.statics().stream_to(stream, &path) {
                    Ok(()) => 200,
                    Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                        // resolved but vanished before open; no bytes sent yet
                        let _ = write_response(stream, &error_page(500, None));
                        500
                    }
                    Err(e) => {
                        debug!(error = %e, "static stream failed mid-transfer");
                        500
                    }
                }
            }
            RouteTarget::NotFound => {
                let _ = write_response(stream, &error_page(404, None));
                404
            }
        }
    }
}

/// Basic health check endpoint returning `{ "status": "ok" }`.
pub fn health_endpoint() -> SandboxResponse {
    SandboxResponse {
        status: 200,
        headers: vec![
            ("Content-Type".to_string(), "application/json".to_string()),
            ("Connection".to_string(), "close".to_string()),
        ],
        cookies: Vec::new(),
        body: serde_json::json!({ "status": "ok" }).to_string().into_bytes(),
    }
}

/// Metrics endpoint returning Prometheus text format statistics.
pub fn metrics_endpoint(metrics: &ServerMetrics, session_count: usize) -> SandboxResponse {
    let body = format!(
        "# HELP fiberserve_requests_total Total number of handled requests\n\
         # TYPE fiberserve_requests_total counter\n\
         fiberserve_requests_total {}\n\
         # HELP fiberserve_request_latency_seconds Average request latency in seconds\n\
         # TYPE fiberserve_request_latency_seconds gauge\n\
         fiberserve_request_latency_seconds {}\n\
         # HELP fiberserve_protocol_errors_total Requests rejected with 400\n\
         # TYPE fiberserve_protocol_errors_total counter\n\
         fiberserve_protocol_errors_total {}\n\
         # HELP fiberserve_not_found_total 404 responses\n\
         # TYPE fiberserve_not_found_total counter\n\
         fiberserve_not_found_total {}\n\
         # HELP fiberserve_server_errors_total 500 responses\n\
         # TYPE fiberserve_server_errors_total counter\n\
         fiberserve_server_errors_total {}\n\
         # HELP fiberserve_sessions Active sessions in the store\n\
         # TYPE fiberserve_sessions gauge\n\
         fiberserve_sessions {}\n",
        metrics.request_count(),
        metrics.average_latency().as_secs_f64(),
        metrics.protocol_errors(),
        metrics.not_found(),
        metrics.server_errors(),
        session_count
    );
    SandboxResponse {
        status: 200,
        headers: vec![
            ("Content-Type".to_string(), "text/plain; version=0.0.4".to_string()),
            ("Connection".to_string(), "close".to_string()),
        ],
        cookies: Vec::new(),
        body: body.into_bytes(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn health_is_json_ok() {
        let resp = health_endpoint();
        assert_eq!(resp.status, 200);
        assert_eq!(resp.get_header("content-type"), Some("application/json"));
        assert_eq!(resp.body, br#"{"status":"ok"}"#.to_vec());
    }

    #[test]
    fn metrics_render_counters() {
        let metrics = ServerMetrics::new();
        metrics.record_request(std::time::Duration::from_millis(5));
        let resp = metrics_endpoint(&metrics, 3);
        let text = String::from_utf8(resp.body).unwrap();
        assert!(text.contains("fiberserve_requests_total 1\n"));
        assert!(text.contains("fiberserve_sessions 3\n"));
    }
}
