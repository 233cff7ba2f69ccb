//! Server network layer: WebSocket accept loop and per-connection pumps.

use crate::auth::{query_param, StaticTokens};
use crate::config::ServerConfig;
use crate::dispatcher::Hub;
use crate::registry::SessionRegistry;
use crate::supervisor::BotSupervisor;
use futures::{SinkExt, StreamExt};
use log::{debug, error, info, warn};
use shared::{ServerMessage, TOKEN_PARAM};
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::accept_hdr_async;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::Message;

/// Main server: owns the listener and the hub every connection talks to.
pub struct Server {
    listener: TcpListener,
    hub: Arc<Hub>,
    idle_timeout: Duration,
    sweep_interval: Duration,
}

impl Server {
    /// Binds the listener and wires registry, supervisor and hub together.
    /// Bots are pointed at the bound address, so port 0 works.
    pub async fn bind(config: ServerConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let tokens = StaticTokens::from_entries(&config.tokens)?;
        let listener = TcpListener::bind(config.address()).await?;
        let local_addr = listener.local_addr()?;
        info!("Server listening on {}", local_addr);
        if tokens.is_empty() {
            warn!("No tokens configured, every player will be anonymous");
        }

        let registry = Arc::new(SessionRegistry::new(config.registry()));
        let server_url = format!("ws://{}", dialable(local_addr));
        let supervisor = Arc::new(BotSupervisor::new(
            config.supervisor(server_url),
            Arc::clone(&registry),
        ));
        let hub = Arc::new(Hub::new(
            registry,
            supervisor,
            Arc::new(tokens),
            config.termination_flush,
        ));

        Ok(Server {
            listener,
            hub,
            idle_timeout: config.idle_timeout,
            sweep_interval: config.sweep_interval,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn hub(&self) -> &Arc<Hub> {
        &self.hub
    }

    /// Accepts connections and sweeps stale sessions until dropped or the
    /// listener fails.
    pub async fn run(&self) -> std::io::Result<()> {
        tokio::select! {
            result = self.accept_loop() => result,
            _ = self.eviction_sweeper() => Ok(()),
        }
    }

    async fn accept_loop(&self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let hub = Arc::clone(&self.hub);
            tokio::spawn(async move {
                handle_connection(hub, stream, addr).await;
            });
        }
    }

    /// Periodically evicts idle sessions
    async fn eviction_sweeper(&self) {
        let mut interval = tokio::time::interval(self.sweep_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        // The first tick fires immediately.
        interval.tick().await;

        loop {
            interval.tick().await;
            let evicted = self.hub.evict_stale(self.idle_timeout).await;
            if evicted > 0 {
                info!("Evicted {} idle games", evicted);
            }
        }
    }
}

/// Address a local process can connect to, given the bound address.
fn dialable(addr: SocketAddr) -> SocketAddr {
    match addr.ip() {
        IpAddr::V4(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V4(Ipv4Addr::LOCALHOST), addr.port())
        }
        IpAddr::V6(ip) if ip.is_unspecified() => {
            SocketAddr::new(IpAddr::V6(Ipv6Addr::LOCALHOST), addr.port())
        }
        _ => addr,
    }
}

async fn handle_connection(hub: Arc<Hub>, stream: TcpStream, addr: SocketAddr) {
    let mut query = None;
    let capture_query = |request: &Request, response: Response| -> Result<Response, ErrorResponse> {
        query = request.uri().query().map(str::to_owned);
        Ok(response)
    };

    let ws_stream = match accept_hdr_async(stream, capture_query).await {
        Ok(ws) => ws,
        Err(e) => {
            error!("WebSocket handshake failed for {}: {}", addr, e);
            return;
        }
    };
    let token = query.as_deref().and_then(|q| query_param(q, TOKEN_PARAM));

    let (mut ws_sink, mut ws_receiver) = ws_stream.split();
    let (tx, mut rx) = mpsc::unbounded_channel::<ServerMessage>();
    let connection = hub.connect(token.as_deref(), tx).await;
    debug!("Connection {} accepted from {}", connection.id, addr);

    // Outbound frames leave in queue order, which is session apply order.
    let writer = tokio::spawn(async move {
        while let Some(message) = rx.recv().await {
            if let Err(e) = ws_sink.send(Message::Text(message.to_json().into())).await {
                debug!("Send failed: {}", e);
                break;
            }
        }
        let _ = ws_sink.close().await;
    });

    while let Some(frame) = ws_receiver.next().await {
        match frame {
            Ok(Message::Text(text)) => hub.handle_text(&connection, &text).await,
            Ok(Message::Close(_)) => break,
            Ok(Message::Binary(_)) => {
                warn!("Ignoring binary frame from {}", connection.identity());
            }
            Ok(_) => {}
            Err(e) => {
                debug!("WebSocket error for connection {}: {}", connection.id, e);
                break;
            }
        }
    }

    hub.disconnect(&connection).await;
    writer.abort();
}
