//! Raw status acquisition.
//!
//! A [`StatusSource`] performs exactly one round-trip per call, either by
//! running the cluster admin tool or by querying the REST status API. There
//! are no retries here: a failed fetch fails the poll, and the next interval
//! is the retry.

use std::path::PathBuf;
use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::{ACCEPT, CONTENT_TYPE};
use serde_json::Value;
use tokio::process::Command;

use crate::config::{CollectorConfig, SourceConfig};
use crate::error::{CollectError, CollectResult};
use crate::facet::Query;

const JSON_MIME: &str = "application/json";

/// One status round-trip against the cluster.
#[async_trait]
pub trait StatusSource: Send + Sync {
    /// Fetch the raw JSON document for `query`. `Value::Null` means the
    /// cluster answered with nothing; the parser turns that into an
    /// empty-payload failure.
    async fn fetch(&self, query: Query) -> CollectResult<Value>;
}

/// Build the source selected by the configuration.
pub fn from_config(config: &CollectorConfig) -> CollectResult<Arc<dyn StatusSource>> {
    let timeout = config.timeout();
    match &config.source {
        SourceConfig::Tool { binary, extra_args } => Ok(Arc::new(
            CephTool::new(binary.clone(), config.cluster.clone(), timeout)
                .with_extra_args(extra_args.clone()),
        )),
        SourceConfig::Rest { host, port } => Ok(Arc::new(RestApi::new(host, *port, timeout)?)),
    }
}

/// Runs `<binary> [extra args] <subcommand> --format json --cluster <name>`.
#[derive(Debug, Clone)]
pub struct CephTool {
    binary: PathBuf,
    extra_args: Vec<String>,
    cluster: String,
    timeout: Duration,
}

impl CephTool {
    /// Create a source that runs `binary` against `cluster`.
    pub fn new(binary: impl Into<PathBuf>, cluster: impl Into<String>, timeout: Duration) -> Self {
        Self {
            binary: binary.into(),
            extra_args: Vec::new(),
            cluster: cluster.into(),
            timeout,
        }
    }

    /// Arguments placed before the subcommand, e.g. `--id` or `--keyring`.
    pub fn with_extra_args(mut self, extra_args: Vec<String>) -> Self {
        self.extra_args = extra_args;
        self
    }

    fn args(&self, query: Query) -> Vec<&str> {
        let mut args: Vec<&str> = self.extra_args.iter().map(String::as_str).collect();
        args.extend_from_slice(query.tool_args());
        args.extend_from_slice(&["--format", "json", "--cluster", self.cluster.as_str()]);
        args
    }

    fn command_line(&self, query: Query) -> String {
        let mut line = self.binary.display().to_string();
        for arg in self.args(query) {
            line.push(' ');
            line.push_str(arg);
        }
        line
    }
}

#[async_trait]
impl StatusSource for CephTool {
    async fn fetch(&self, query: Query) -> CollectResult<Value> {
        let command = self.command_line(query);
        let mut cmd = Command::new(&self.binary);
        cmd.args(self.args(query))
            .stdin(Stdio::null())
            .kill_on_drop(true);

        tracing::debug!(command = %command, "running admin tool");

        let output = match tokio::time::timeout(self.timeout, cmd.output()).await {
            Ok(Ok(output)) => output,
            Ok(Err(e)) => return Err(CollectError::tool(command, e.to_string())),
            Err(_) => return Err(CollectError::tool(command, CollectError::timed_out(self.timeout))),
        };

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(CollectError::tool(
                command,
                format!("{}: {}", output.status, stderr.trim()),
            ));
        }

        if output.stdout.iter().all(u8::is_ascii_whitespace) {
            return Ok(Value::Null);
        }

        serde_json::from_slice(&output.stdout)
            .map_err(|e| CollectError::tool(command, format!("output is not JSON: {e}")))
    }
}

/// Queries `http://<host>:<port>/api/v0.1/<path>` and unwraps the `output`
/// envelope.
#[derive(Debug, Clone)]
pub struct RestApi {
    client: reqwest::Client,
    base_url: String,
}

impl RestApi {
    /// Build a client for `http://host:port/api/v0.1`.
    pub fn new(host: &str, port: u16, timeout: Duration) -> CollectResult<Self> {
        let base_url = format!("http://{host}:{port}/api/v0.1");
        let client = reqwest::Client::builder()
            .timeout(timeout)
            .no_proxy()
            .build()
            .map_err(|e| CollectError::http(base_url.clone(), e))?;
        Ok(Self { client, base_url })
    }

    /// Return the endpoint URL for `query`.
    pub fn url(&self, query: Query) -> String {
        format!("{}/{}", self.base_url, query.rest_path())
    }
}

#[async_trait]
impl StatusSource for RestApi {
    async fn fetch(&self, query: Query) -> CollectResult<Value> {
        let url = self.url(query);
        tracing::debug!(url = %url, "querying status API");

        let response = self
            .client
            .get(&url)
            .header(ACCEPT, JSON_MIME)
            .send()
            .await
            .map_err(|e| CollectError::http(url.clone(), e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(CollectError::http(url, format!("status {status}")));
        }

        let content_type = response
            .headers()
            .get(CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .unwrap_or_default()
            .to_string();
        // Media types are case-insensitive.
        if !content_type.to_ascii_lowercase().starts_with(JSON_MIME) {
            return Err(CollectError::http(
                url,
                format!("expected {JSON_MIME}, got {content_type:?}"),
            ));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| CollectError::http(url.clone(), e))?;
        let mut body: Value = serde_json::from_slice(&body)
            .map_err(|e| CollectError::http(url.clone(), format!("body is not JSON: {e}")))?;

        match body.get_mut("output") {
            Some(output) => Ok(output.take()),
            None => Err(CollectError::schema(query, "response has no `output` key")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpListener;

    fn sh(script: &str, timeout: Duration) -> CephTool {
        // `sh -c <script> ceph <subcommand...>`: the subcommand lands in $@.
        CephTool::new("sh", "prod", timeout)
            .with_extra_args(vec!["-c".into(), script.into(), "ceph".into()])
    }

    #[test]
    fn test_tool_command_line() {
        let tool = CephTool::new("/usr/bin/ceph", "prod", Duration::from_secs(1))
            .with_extra_args(vec!["--id".into(), "admin".into()]);
        assert_eq!(
            tool.command_line(Query::PoolStats),
            "/usr/bin/ceph --id admin osd pool stats --format json --cluster prod"
        );
    }

    #[tokio::test]
    async fn test_tool_passes_subcommand_and_cluster() {
        let tool = sh(r#"printf '{"argv":"%s"}' "$*""#, Duration::from_secs(5));
        let value = tool.fetch(Query::MonDump).await.unwrap();
        assert_eq!(value, json!({"argv": "mon dump --format json --cluster prod"}));
    }

    #[tokio::test]
    async fn test_tool_nonzero_exit() {
        let tool = sh("echo 'cluster unreachable' >&2; exit 3", Duration::from_secs(5));
        let err = tool.fetch(Query::OsdDump).await.unwrap_err();
        assert_eq!(err.kind(), "ToolInvocationError");
        assert!(err.to_string().contains("cluster unreachable"));
    }

    #[tokio::test]
    async fn test_tool_timeout() {
        let tool = sh("sleep 5", Duration::from_millis(200));
        let err = tool.fetch(Query::PgDump).await.unwrap_err();
        assert_eq!(err.kind(), "ToolInvocationError");
        assert!(err.to_string().contains("timed out"));
    }

    #[tokio::test]
    async fn test_tool_unparsable_output() {
        let tool = sh("echo 'HEALTH_OK'", Duration::from_secs(5));
        let err = tool.fetch(Query::Df).await.unwrap_err();
        assert_eq!(err.kind(), "ToolInvocationError");
    }

    #[tokio::test]
    async fn test_tool_missing_binary() {
        let tool = CephTool::new("/nonexistent/ceph", "prod", Duration::from_secs(1));
        let err = tool.fetch(Query::Df).await.unwrap_err();
        assert_eq!(err.kind(), "ToolInvocationError");
    }

    #[tokio::test]
    async fn test_tool_silent_output_is_null() {
        let tool = sh("true", Duration::from_secs(5));
        assert_eq!(tool.fetch(Query::MonDump).await.unwrap(), Value::Null);
    }

    /// Answer one HTTP request with a canned response and hand back the raw
    /// request text.
    async fn serve_once(
        status: &'static str,
        content_type: &'static str,
        body: String,
    ) -> (u16, tokio::task::JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let mut request = Vec::new();
            let mut buf = [0u8; 1024];
            while !request.windows(4).any(|w| w == b"\r\n\r\n") {
                let n = socket.read(&mut buf).await.unwrap();
                if n == 0 {
                    break;
                }
                request.extend_from_slice(&buf[..n]);
            }
            let response = format!(
                "HTTP/1.1 {status}\r\nContent-Type: {content_type}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            String::from_utf8_lossy(&request).into_owned()
        });
        (port, handle)
    }

    #[tokio::test]
    async fn test_rest_unwraps_output() {
        let body = json!({"status": "OK", "output": {"mons": [], "quorum": []}}).to_string();
        let (port, server) = serve_once("200 OK", "application/json", body).await;

        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let value = api.fetch(Query::MonDump).await.unwrap();
        assert_eq!(value, json!({"mons": [], "quorum": []}));

        let request = server.await.unwrap();
        assert!(request.starts_with("GET /api/v0.1/mon/dump HTTP/1.1"));
        assert!(request.to_ascii_lowercase().contains("accept: application/json"));
    }

    #[tokio::test]
    async fn test_rest_pool_stats_path() {
        let body = json!({"output": []}).to_string();
        let (port, server) = serve_once("200 OK", "application/json; charset=utf-8", body).await;

        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        assert_eq!(api.fetch(Query::PoolStats).await.unwrap(), json!([]));
        assert!(server.await.unwrap().starts_with("GET /api/v0.1/osd/pool/stats "));
    }

    #[tokio::test]
    async fn test_rest_content_type_is_case_insensitive() {
        let body = json!({"output": {"osds": []}}).to_string();
        let (port, _server) = serve_once("200 OK", "Application/JSON; Charset=UTF-8", body).await;

        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        assert_eq!(api.fetch(Query::OsdDump).await.unwrap(), json!({"osds": []}));
    }

    #[tokio::test]
    async fn test_rest_server_error() {
        let (port, _server) =
            serve_once("500 Internal Server Error", "application/json", "{}".into()).await;
        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = api.fetch(Query::OsdDump).await.unwrap_err();
        assert_eq!(err.kind(), "HttpError");
        assert!(err.to_string().contains("500"));
    }

    #[tokio::test]
    async fn test_rest_rejects_non_json_content_type() {
        let (port, _server) = serve_once("200 OK", "text/html", "<html></html>".into()).await;
        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = api.fetch(Query::Df).await.unwrap_err();
        assert_eq!(err.kind(), "HttpError");
    }

    #[tokio::test]
    async fn test_rest_missing_output_key() {
        let body = json!({"status": "OK"}).to_string();
        let (port, _server) = serve_once("200 OK", "application/json", body).await;
        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = api.fetch(Query::Df).await.unwrap_err();
        assert_eq!(err.kind(), "SchemaError");
    }

    #[tokio::test]
    async fn test_rest_connection_refused() {
        let port = {
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            listener.local_addr().unwrap().port()
        };
        let api = RestApi::new("127.0.0.1", port, Duration::from_secs(5)).unwrap();
        let err = api.fetch(Query::MonDump).await.unwrap_err();
        assert_eq!(err.kind(), "HttpError");
    }

    #[tokio::test]
    async fn test_rest_timeout() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let _server = tokio::spawn(async move {
            let (socket, _) = listener.accept().await.unwrap();
            tokio::time::sleep(Duration::from_secs(10)).await;
            drop(socket);
        });

        let api = RestApi::new("127.0.0.1", port, Duration::from_millis(200)).unwrap();
        let err = api.fetch(Query::PgDump).await.unwrap_err();
        assert_eq!(err.kind(), "HttpError");
    }
}
