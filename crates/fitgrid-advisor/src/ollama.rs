//! Ollama `/api/generate` client.
//!
//! One HTTP/1.1 connection per request: connect, handshake, POST
//! `{"model", "prompt", "stream": false}`, read the `response` field.

use bytes::Bytes;
use http::header::{CONTENT_TYPE, HOST, USER_AGENT};
use http_body_util::{BodyExt, Full};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use tracing::debug;

use fitgrid_scheduler::{Advisor, AdvisoryError, AdvisoryFuture};

use crate::error::{SetupError, SetupResult};

#[derive(Debug, Serialize)]
struct GenerateRequest<'a> {
    model: &'a str,
    prompt: &'a str,
    stream: bool,
}

#[derive(Debug, Deserialize)]
struct GenerateResponse {
    response: String,
}

/// Advisor backed by a text generation model served over HTTP.
#[derive(Debug, Clone)]
pub struct OllamaAdvisor {
    /// `host:port` to connect to.
    address: String,
    /// Value of the `Host` header.
    authority: String,
    path: String,
    model: String,
}

impl OllamaAdvisor {
    /// Parse an endpoint such as `http://localhost:11434/api/generate`.
    pub fn new(url: &str, model: impl Into<String>) -> SetupResult<Self> {
        let invalid = |reason: &str| SetupError::InvalidUrl {
            url: url.to_string(),
            reason: reason.to_string(),
        };

        let uri: http::Uri = url.parse().map_err(|e: http::uri::InvalidUri| invalid(&e.to_string()))?;
        match uri.scheme_str() {
            Some("http") => {}
            Some(other) => return Err(SetupError::UnsupportedScheme(other.to_string())),
            None => return Err(invalid("missing scheme")),
        }

        let host = uri.host().ok_or_else(|| invalid("missing host"))?;
        let port = uri.port_u16().unwrap_or(80);
        let authority = uri
            .authority()
            .map(|a| a.as_str().to_string())
            .unwrap_or_else(|| host.to_string());
        let path = uri
            .path_and_query()
            .map(|p| p.as_str().to_string())
            .unwrap_or_else(|| "/".to_string());

        Ok(Self {
            address: format!("{host}:{port}"),
            authority,
            path,
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }

    pub fn endpoint(&self) -> String {
        format!("http://{}{}", self.authority, self.path)
    }

    /// Send one non-streaming generation request and return the model's text.
    pub async fn generate(&self, prompt: &str) -> Result<String, AdvisoryError> {
        let body = serde_json::to_vec(&GenerateRequest {
            model: &self.model,
            prompt,
            stream: false,
        })
        .map_err(|e| AdvisoryError::BadResponse(e.to_string()))?;

        let stream = tokio::net::TcpStream::connect(&self.address)
            .await
            .map_err(|e| AdvisoryError::Unavailable(e.to_string()))?;

        let io = TokioIo::new(stream);
        let (mut sender, conn) = hyper::client::conn::http1::handshake(io)
            .await
            .map_err(|e| AdvisoryError::Unavailable(e.to_string()))?;

        tokio::spawn(async move {
            if let Err(e) = conn.await {
                debug!(error = %e, "advisor connection closed with error");
            }
        });

        let req = http::Request::builder()
            .method(http::Method::POST)
            .uri(&self.path)
            .header(HOST, &self.authority)
            .header(CONTENT_TYPE, "application/json")
            .header(USER_AGENT, "fitgrid-advisor/0.1")
            .body(Full::new(Bytes::from(body)))
            .map_err(|e| AdvisoryError::BadResponse(e.to_string()))?;

        debug!(endpoint = %self.endpoint(), model = %self.model, "querying advisor");
        let resp = sender
            .send_request(req)
            .await
            .map_err(|e| AdvisoryError::Unavailable(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            return Err(AdvisoryError::Status(status.as_u16()));
        }

        let bytes = resp
            .into_body()
            .collect()
            .await
            .map_err(|e| AdvisoryError::Unavailable(e.to_string()))?
            .to_bytes();

        let parsed: GenerateResponse =
            serde_json::from_slice(&bytes).map_err(|e| AdvisoryError::BadResponse(e.to_string()))?;
        Ok(parsed.response)
    }
}

impl Advisor for OllamaAdvisor {
    fn recommend<'a>(&'a self, prompt: &'a str) -> AdvisoryFuture<'a> {
        Box::pin(self.generate(prompt))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio::task::JoinHandle;

    /// Accept one connection, capture the raw request, send a canned reply.
    async fn serve_once(status_line: &'static str, body: &'static str) -> (String, JoinHandle<String>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let handle = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let request = read_request(&mut socket).await;
            let response = format!(
                "HTTP/1.1 {status_line}\r\ncontent-type: application/json\r\n\
                 content-length: {}\r\nconnection: close\r\n\r\n{body}",
                body.len()
            );
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            request
        });

        (format!("http://{addr}/api/generate"), handle)
    }

    async fn read_request(socket: &mut TcpStream) -> String {
        let mut buf = Vec::new();
        let mut chunk = [0u8; 1024];
        loop {
            let n = socket.read(&mut chunk).await.unwrap();
            if n == 0 {
                break;
            }
            buf.extend_from_slice(&chunk[..n]);

            let text = String::from_utf8_lossy(&buf).into_owned();
            if let Some(end) = text.find("\r\n\r\n") {
                let content_length = text[..end]
                    .lines()
                    .filter_map(|line| line.split_once(':'))
                    .find(|(k, _)| k.eq_ignore_ascii_case("content-length"))
                    .and_then(|(_, v)| v.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if buf.len() >= end + 4 + content_length {
                    break;
                }
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    #[test]
    fn parses_endpoint_url() {
        let advisor = OllamaAdvisor::new("http://localhost:11434/api/generate", "llama2").unwrap();
        assert_eq!(advisor.address, "localhost:11434");
        assert_eq!(advisor.authority, "localhost:11434");
        assert_eq!(advisor.path, "/api/generate");
        assert_eq!(advisor.model(), "llama2");

        let default_port = OllamaAdvisor::new("http://advisor.lan/gen", "m").unwrap();
        assert_eq!(default_port.address, "advisor.lan:80");
    }

    #[test]
    fn rejects_unusable_urls() {
        assert!(matches!(
            OllamaAdvisor::new("https://example.com/api/generate", "m"),
            Err(SetupError::UnsupportedScheme(_))
        ));
        assert!(matches!(
            OllamaAdvisor::new("localhost:11434", "m"),
            Err(SetupError::InvalidUrl { .. }) | Err(SetupError::UnsupportedScheme(_))
        ));
        assert!(OllamaAdvisor::new("not a url", "m").is_err());
    }

    #[tokio::test]
    async fn returns_response_field() {
        let (url, server) =
            serve_once("200 OK", r#"{"model":"llama2","response":"node_b\nIt is idle.","done":true}"#).await;
        let advisor = OllamaAdvisor::new(&url, "llama2").unwrap();

        let text = advisor.generate("pick a node").await.unwrap();
        assert_eq!(text, "node_b\nIt is idle.");

        let request = server.await.unwrap();
        assert!(request.starts_with("POST /api/generate HTTP/1.1"));
        assert!(request.contains(r#""model":"llama2""#));
        assert!(request.contains(r#""prompt":"pick a node""#));
        assert!(request.contains(r#""stream":false"#));
    }

    #[tokio::test]
    async fn works_through_the_advisor_trait() {
        let (url, _server) = serve_once("200 OK", r#"{"response":"n1"}"#).await;
        let advisor: Arc<dyn Advisor> = Arc::new(OllamaAdvisor::new(&url, "llama2").unwrap());
        assert_eq!(advisor.recommend("prompt").await.unwrap(), "n1");
    }

    #[tokio::test]
    async fn non_success_status_is_an_error() {
        let (url, _server) = serve_once("500 Internal Server Error", r#"{"error":"model not loaded"}"#).await;
        let advisor = OllamaAdvisor::new(&url, "llama2").unwrap();
        assert!(matches!(
            advisor.generate("x").await,
            Err(AdvisoryError::Status(500))
        ));
    }

    #[tokio::test]
    async fn missing_response_field_is_an_error() {
        let (url, _server) = serve_once("200 OK", r#"{"done":true}"#).await;
        let advisor = OllamaAdvisor::new(&url, "llama2").unwrap();
        assert!(matches!(
            advisor.generate("x").await,
            Err(AdvisoryError::BadResponse(_))
        ));
    }

    #[tokio::test]
    async fn unreachable_endpoint_is_unavailable() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let advisor = OllamaAdvisor::new(&format!("http://{addr}/api/generate"), "llama2").unwrap();
        assert!(matches!(
            advisor.generate("x").await,
            Err(AdvisoryError::Unavailable(_))
        ));
    }
}
