//! Accept loop

use super::{ConnectionHandler, Role};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tracing::{debug, error, info, info_span, Instrument, Span};

/// Accepts connections and runs each one on its own task.
///
/// Log output goes to the span given at construction; every connection gets
/// a child span carrying the client address.
pub struct Listener<R> {
    listener: TcpListener,
    handler: ConnectionHandler<R>,
    limit: Option<Arc<Semaphore>>,
    span: Span,
}

impl<R: Role> Listener<R> {
    /// Bind `host:port`. Failing to bind is the only fatal error a relay has.
    pub async fn bind(
        host: &str,
        port: u16,
        handler: ConnectionHandler<R>,
        max_connections: Option<usize>,
        span: Span,
    ) -> crate::Result<Self> {
        let listener = TcpListener::bind((host, port)).await?;

        Ok(Self {
            listener,
            handler,
            limit: max_connections.map(|n| Arc::new(Semaphore::new(n))),
            span,
        })
    }

    /// Address actually bound, useful with port 0
    pub fn local_addr(&self) -> crate::Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Accept forever
    pub async fn run(self) -> crate::Result<()> {
        info!(parent: &self.span, "{} relay listening on {}", self.handler.role().name(), self.local_addr()?);

        loop {
            // Wait for a free slot before accepting, so excess clients queue
            // in the kernel backlog
            let permit = match &self.limit {
                Some(limit) => Some(
                    Arc::clone(limit)
                        .acquire_owned()
                        .await
                        .map_err(|_| crate::Error::ConnectionClosed)?,
                ),
                None => None,
            };

            match self.listener.accept().await {
                Ok((stream, peer_addr)) => {
                    debug!(parent: &self.span, "New connection from {}", peer_addr);
                    stream.set_nodelay(true).ok();

                    let handler = self.handler.clone();
                    let span = info_span!(parent: &self.span, "conn", peer = %peer_addr);
                    tokio::spawn(
                        async move {
                            // Errors are logged by the handler
                            let _ = handler.handle(stream).await;
                            drop(permit);
                        }
                        .instrument(span),
                    );
                }
                Err(e) => {
                    error!(parent: &self.span, "Accept error: {}", e);
                }
            }
        }
    }
}
