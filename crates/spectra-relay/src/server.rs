//! Listener and accept loop.

use std::net::SocketAddr;

use tokio::net::TcpListener;
use tokio::sync::OnceCell;
use tokio_util::sync::CancellationToken;

use spectra_common::Result;
use spectra_config::SpectraConfig;

use crate::connection::{accept, handle_connection};
use crate::engine::{Relay, RelaySettings};

/// The relay attached to a TCP listener.
pub struct RelayServer {
    config: SpectraConfig,
    relay: Relay,
    bound: OnceCell<SocketAddr>,
    shutdown: CancellationToken,
}

impl RelayServer {
    pub fn new(config: SpectraConfig) -> Self {
        let relay = Relay::new(RelaySettings::from_config(&config));
        Self {
            config,
            relay,
            bound: OnceCell::new(),
            shutdown: CancellationToken::new(),
        }
    }

    pub fn relay(&self) -> &Relay {
        &self.relay
    }

    /// Bind the listener and spawn the accept loop. Returns the bound address.
    ///
    /// Only the first call binds; later calls return the same address.
    pub async fn start(&self) -> Result<SocketAddr> {
        if let Some(addr) = self.bound.get() {
            tracing::debug!(addr = %addr, "Relay already attached");
            return Ok(*addr);
        }
        let addr = self
            .bound
            .get_or_try_init(|| async {
                let listener = TcpListener::bind(self.config.server.bind_addr()).await?;
                let addr = listener.local_addr()?;
                tokio::spawn(accept_loop(
                    listener,
                    self.config.clone(),
                    self.relay.clone(),
                    self.shutdown.clone(),
                ));
                tracing::info!(
                    addr = %addr,
                    path = %self.config.server.path,
                    "spectra-relay listening"
                );
                Ok::<_, spectra_common::RelayError>(addr)
            })
            .await?;
        Ok(*addr)
    }

    /// Address the listener is bound to, once started.
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    /// Stop accepting and close every open connection.
    pub fn shutdown(&self) {
        self.shutdown.cancel();
    }

    pub async fn wait_for_shutdown(&self) {
        self.shutdown.cancelled().await;
    }
}

async fn accept_loop(
    listener: TcpListener,
    config: SpectraConfig,
    relay: Relay,
    shutdown: CancellationToken,
) {
    loop {
        let accepted = tokio::select! {
            accepted = listener.accept() => accepted,
            _ = shutdown.cancelled() => break,
        };

        match accepted {
            Ok((stream, addr)) => {
                let relay = relay.clone();
                let config = config.clone();
                let shutdown = shutdown.child_token();
                tokio::spawn(async move {
                    match accept(stream, &config).await {
                        Ok((ws, info)) => {
                            handle_connection(ws, addr, info, relay, config.heartbeat, shutdown)
                                .await
                        }
                        Err(e) => {
                            tracing::warn!(peer = %addr, error = %e, "WS handshake failed");
                        }
                    }
                });
            }
            Err(e) => {
                tracing::warn!(error = %e, "TCP accept error");
            }
        }
    }
    tracing::info!("Accept loop stopped");
}
