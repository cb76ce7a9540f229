use bytes::Bytes;
use http_body_util::{combinators::BoxBody, BodyExt, Full};
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Request as HyperRequest, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::decision::DecisionEngine;
use crate::request::Request;

/// Thin reference front-end standing in for whatever protocol the
/// real external authorization caller speaks. Accepts
/// `POST /v1/authorize` with a JSON body shaped like `Request`, and
/// answers with the decision (spec §4.9). This is intentionally the
/// only place JSON touches the wire -- `DecisionEngine` itself never
/// depends on a transport.
pub struct AuthzServer {
    engine: Arc<DecisionEngine>,
    listener: TcpListener,
}

#[derive(Deserialize)]
struct AuthorizeRequest {
    remote_address: String,
    authority: String,
    path: String,
    method: String,
}

#[derive(Serialize)]
struct AuthorizeResponse {
    allowed: bool,
    remaining: u32,
}

impl AuthzServer {
    pub async fn bind(engine: Arc<DecisionEngine>, address: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self::from_listener(engine, listener))
    }

    pub fn from_listener(engine: Arc<DecisionEngine>, listener: TcpListener) -> Self {
        Self { engine, listener }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!(
            "Authorization listener on http://{}",
            self.listener.local_addr()?
        );

        loop {
            let (stream, remote_addr) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let engine = Arc::clone(&self.engine);

            tokio::spawn(async move {
                let service = service_fn(move |req: HyperRequest<Incoming>| {
                    let engine = Arc::clone(&engine);
                    async move { Ok::<_, hyper::Error>(Self::handle(engine, req).await) }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("authz connection error from {}: {}", remote_addr, e);
                }
            });
        }
    }

    async fn handle(
        engine: Arc<DecisionEngine>,
        req: HyperRequest<Incoming>,
    ) -> Response<BoxBody<Bytes, hyper::Error>> {
        if req.method() != hyper::Method::POST || req.uri().path() != "/v1/authorize" {
            return Self::error_response(StatusCode::NOT_FOUND, "not found");
        }

        let body = match req.into_body().collect().await {
            Ok(collected) => collected.to_bytes(),
            Err(_) => return Self::error_response(StatusCode::BAD_REQUEST, "failed to read body"),
        };

        let parsed: AuthorizeRequest = match serde_json::from_slice(&body) {
            Ok(parsed) => parsed,
            Err(_) => return Self::error_response(StatusCode::BAD_REQUEST, "malformed request body"),
        };

        let request = Request::new(
            parsed.remote_address,
            parsed.authority,
            parsed.path,
            parsed.method,
        );

        debug!(path = %request.path, remote = %request.remote_address, "authorize request");

        let decision = engine.decide(&request).await;

        let body = serde_json::to_string(&AuthorizeResponse {
            allowed: decision.allowed,
            remaining: decision.remaining,
        })
        .unwrap_or_else(|_| r#"{"allowed":false,"remaining":0}"#.to_string());

        Response::builder()
            .status(if decision.allowed { StatusCode::OK } else { StatusCode::FORBIDDEN })
            .header("content-type", "application/json")
            .header("x-ratelimit-remaining", decision.remaining.to_string())
            .body(Self::full_body(body))
            .unwrap()
    }

    fn error_response(status: StatusCode, message: &str) -> Response<BoxBody<Bytes, hyper::Error>> {
        let body = format!(r#"{{"error":"{}"}}"#, message);
        Response::builder()
            .status(status)
            .header("content-type", "application/json")
            .body(Self::full_body(body))
            .unwrap()
    }

    fn full_body<T: Into<Bytes>>(content: T) -> BoxBody<Bytes, hyper::Error> {
        Full::new(content.into())
            .map_err(|never| match never {})
            .boxed()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::{BlacklistPredicate, Chain, WhitelistPredicate};
    use crate::config::{ConfStore, Defaults};
    use crate::metrics::NullReporter;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::TcpStream;

    async fn spawn_test_server(defaults: Defaults) -> SocketAddr {
        let conf_store = Arc::new(ConfStore::from_defaults(&defaults));
        let chain = Chain::new(vec![Box::new(WhitelistPredicate), Box::new(BlacklistPredicate)]);
        let engine = Arc::new(DecisionEngine::new(chain, conf_store, Arc::new(NullReporter)));

        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let server = AuthzServer::from_listener(engine, listener);
        tokio::spawn(server.run());
        addr
    }

    async fn send(addr: SocketAddr, request: &str) -> String {
        let mut stream = TcpStream::connect(addr).await.unwrap();
        stream.write_all(request.as_bytes()).await.unwrap();
        stream.shutdown().await.ok();
        let mut buf = String::new();
        stream.read_to_string(&mut buf).await.ok();
        buf
    }

    #[tokio::test]
    async fn unlisted_address_is_allowed() {
        let addr = spawn_test_server(Defaults::default()).await;
        let body = r#"{"remote_address":"8.8.8.8","authority":"example.com","path":"/","method":"GET"}"#;
        let request = format!(
            "POST /v1/authorize HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let resp = send(addr, &request).await;
        assert!(resp.starts_with("HTTP/1.1 200"));
        assert!(resp.contains("\"allowed\":true"));
    }

    #[tokio::test]
    async fn blacklisted_address_is_denied() {
        let defaults = Defaults {
            blacklist: vec!["10.0.0.0/8".to_string()],
            ..Default::default()
        };
        let addr = spawn_test_server(defaults).await;
        let body = r#"{"remote_address":"10.1.2.3","authority":"example.com","path":"/","method":"GET"}"#;
        let request = format!(
            "POST /v1/authorize HTTP/1.1\r\nHost: localhost\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            body.len(),
            body
        );
        let resp = send(addr, &request).await;
        assert!(resp.starts_with("HTTP/1.1 403"));
        assert!(resp.contains("\"allowed\":false"));
    }
}
