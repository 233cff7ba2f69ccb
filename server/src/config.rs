//! Runtime configuration for the server and its collaborators.

use crate::registry::RegistryConfig;
use crate::supervisor::SupervisorConfig;
use std::path::PathBuf;
use std::time::Duration;

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_players: usize,
    /// Sessions idle this long with nobody connected are evicted.
    pub idle_timeout: Duration,
    pub sweep_interval: Duration,
    /// Pause between sending `game_terminated` and dropping the session.
    pub termination_flush: Duration,
    pub bot_program: PathBuf,
    pub bot_args: Vec<String>,
    pub bot_connect_timeout: Duration,
    pub bot_kill_grace: Duration,
    pub bot_think_time: Duration,
    /// `TOKEN=USER[:Display Name]` entries for the static authenticator.
    pub tokens: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 8080,
            max_players: 4,
            idle_timeout: Duration::from_secs(600),
            sweep_interval: Duration::from_secs(30),
            termination_flush: Duration::from_millis(100),
            bot_program: default_bot_program(),
            bot_args: Vec::new(),
            bot_connect_timeout: Duration::from_secs(10),
            bot_kill_grace: Duration::from_millis(2000),
            bot_think_time: Duration::from_millis(400),
            tokens: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn registry(&self) -> RegistryConfig {
        RegistryConfig {
            max_players: self.max_players,
        }
    }

    pub fn supervisor(&self, server_url: impl Into<String>) -> SupervisorConfig {
        SupervisorConfig {
            program: self.bot_program.clone(),
            base_args: self.bot_args.clone(),
            server_url: server_url.into(),
            connect_timeout: self.bot_connect_timeout,
            kill_grace: self.bot_kill_grace,
            think_time: self.bot_think_time,
        }
    }
}

/// `sweeper-bot` in the directory of the running executable.
pub fn default_bot_program() -> PathBuf {
    let name = format!("sweeper-bot{}", std::env::consts::EXE_SUFFIX);
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|dir| dir.join(&name)))
        .unwrap_or_else(|| PathBuf::from(name))
}
