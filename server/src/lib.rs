//! # Minesweeper Session Server
//!
//! This library provides the authoritative server for solo and competitive
//! minesweeper. It owns every board, applies each player action exactly once,
//! and fans the resulting deltas out to all participants of a game so that
//! their views converge.
//!
//! ## Core Responsibilities
//!
//! ### Authoritative Sessions
//! A session wraps one board together with its participants, scores, turn
//! and lifecycle status (`draft`, `playing`, `won`, `lost`, `terminated`).
//! Clients only ever see revealed cells; mine locations never leave the
//! server until they are revealed.
//!
//! ### Reconnection
//! Durable identities are mapped to their session, so a player who drops
//! and reconnects is sent the complete current state. Anonymous players are
//! scoped to a single connection and lose their game with it.
//!
//! ### Computer Opponents
//! The host of a competitive game can summon one bot. Bots run as separate
//! `sweeper-bot` processes that connect back as ordinary clients. The server
//! guarantees that no bot process outlives the game it was summoned into.
//!
//! ## Architecture Design
//!
//! ### Per-Session Serialization
//! Each session lives behind its own async mutex. Every mutation of a game
//! happens under that lock and queues its broadcast before releasing it, so
//! each participant observes deltas in exactly the order they were applied.
//! Different games never contend with each other.
//!
//! ### WebSocket Transport
//! Clients speak JSON over WebSocket text frames. Each connection gets a
//! reader loop feeding the hub and a writer task draining an unbounded
//! outbound queue.
//!
//! ## Module Organization
//!
//! ### Auth Module (`auth`)
//! Identities and the authenticator boundary:
//! - Durable, anonymous and bot identities
//! - The `Authenticator` trait and a static token table
//!
//! ### Session Module (`session`)
//! One game: board, participants, scores, turns and snapshots.
//!
//! ### Registry Module (`registry`)
//! The directory of live sessions and the only place sessions are created,
//! joined, left, terminated and dropped.
//!
//! ### Supervisor Module (`supervisor`)
//! Spawns, monitors and kills bot worker processes.
//!
//! ### Dispatcher Module (`dispatcher`)
//! Routes decoded client messages and handles connects and disconnects.
//!
//! ### Network Module (`network`)
//! Listener, handshake, per-connection pumps and the idle-session sweeper.
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::ServerConfig;
//! use server::network::Server;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ServerConfig {
//!         port: 8080,
//!         tokens: vec!["s3cret=alice:Alice".to_string()],
//!         ..ServerConfig::default()
//!     };
//!     let server = Server::bind(config).await?;
//!
//!     tokio::select! {
//!         result = server.run() => result?,
//!         _ = tokio::signal::ctrl_c() => {}
//!     }
//!     server.hub().shutdown().await;
//!     Ok(())
//! }
//! ```

pub mod auth;
pub mod config;
pub mod dispatcher;
pub mod network;
pub mod registry;
pub mod session;
pub mod supervisor;
