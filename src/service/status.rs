//! Minimal HTTP status responder
//!
//! Lets the binary run standalone: every request gets a small JSON
//! document naming the service. Real collector and bouncer handlers
//! plug in through the same [`Service`] trait.

use super::Service;
use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;
use http_body_util::Full;
use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use tokio::net::TcpStream;
use tracing::debug;

/// Answers every request with `{"service": <name>, "status": "ok", ...}`
pub struct StatusService {
    name: String,
    body: Bytes,
}

impl StatusService {
    pub fn new(name: &str) -> Self {
        let body = serde_json::json!({
            "service": name,
            "status": "ok",
            "version": crate::VERSION,
        });
        Self {
            name: name.to_string(),
            body: Bytes::from(body.to_string()),
        }
    }
}

#[async_trait]
impl Service for StatusService {
    fn name(&self) -> &str {
        &self.name
    }

    async fn handle(&self, stream: TcpStream, peer: SocketAddr) -> Result<()> {
        let io = TokioIo::new(stream);
        let body = self.body.clone();

        let service = service_fn(move |req| {
            let body = body.clone();
            async move { Ok::<_, hyper::Error>(respond(&req, body)) }
        });

        if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
            debug!("Connection error from {}: {}", peer, e);
        }
        Ok(())
    }
}

fn respond(req: &Request<Incoming>, body: Bytes) -> Response<Full<Bytes>> {
    let (status, body) = match *req.method() {
        Method::GET | Method::HEAD => (StatusCode::OK, body),
        _ => (
            StatusCode::METHOD_NOT_ALLOWED,
            Bytes::from_static(b"{\"error\":\"method not allowed\"}"),
        ),
    };

    Response::builder()
        .status(status)
        .header("Content-Type", "application/json")
        .body(Full::new(body))
        .unwrap_or_else(|_| Response::new(Full::new(Bytes::from_static(b"{}"))))
}
