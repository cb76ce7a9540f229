use hyper::body::Incoming;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::Request;
use hyper_util::rt::TokioIo;
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use super::AdminApi;

/// Serves the admin mutator API. Kept separate from the authorization
/// listener so the two can be bound to different addresses -- the
/// admin surface is meant for an internal network, not the data path
/// (spec §4.8).
pub struct AdminServer {
    api: Arc<AdminApi>,
    listener: TcpListener,
}

impl AdminServer {
    pub async fn bind(api: AdminApi, address: SocketAddr) -> std::io::Result<Self> {
        let listener = TcpListener::bind(address).await?;
        Ok(Self::from_listener(api, listener))
    }

    pub fn from_listener(api: AdminApi, listener: TcpListener) -> Self {
        Self {
            api: Arc::new(api),
            listener,
        }
    }

    pub async fn run(self) -> Result<(), Box<dyn std::error::Error + Send + Sync>> {
        info!("Admin API listening on http://{}", self.listener.local_addr()?);

        loop {
            let (stream, remote_addr) = self.listener.accept().await?;
            let io = TokioIo::new(stream);
            let api = Arc::clone(&self.api);

            tokio::spawn(async move {
                let service = service_fn(move |req: Request<Incoming>| {
                    let api = Arc::clone(&api);
                    async move {
                        debug!("Admin request: {} {}", req.method(), req.uri().path());
                        Ok::<_, hyper::Error>(api.handle(req).await)
                    }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    error!("Admin connection error from {}: {}", remote_addr, e);
                }
            });
        }
    }
}
