//! Bot process supervision.
//!
//! Every summoned bot is a separate OS process running the `sweeper-bot`
//! worker, which dials back into the server like any other client. Each
//! process is owned by a monitor task; the supervisor keeps only a
//! [`BotProcess`] handle per bot identity. Dropping the handle, killing it
//! explicitly, a crash and a missed connect deadline all end in the monitor
//! reaping the child, and the child is spawned with `kill_on_drop` so not
//! even a panicking monitor can leak it.

use crate::auth::Identity;
use crate::registry::SessionRegistry;
use crate::session::Participant;
use log::{debug, error, info, warn};
use shared::{GameError, GameResult};
use std::collections::HashMap;
use std::path::PathBuf;
use std::process::{ExitStatus, Stdio};
use std::sync::Arc;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::{Child, Command};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    /// Worker executable.
    pub program: PathBuf,
    /// Arguments placed before the generated connection flags.
    pub base_args: Vec<String>,
    /// WebSocket URL the worker connects back to.
    pub server_url: String,
    pub connect_timeout: Duration,
    pub kill_grace: Duration,
    pub think_time: Duration,
}

impl SupervisorConfig {
    pub fn new(program: impl Into<PathBuf>, server_url: impl Into<String>) -> Self {
        Self {
            program: program.into(),
            base_args: Vec::new(),
            server_url: server_url.into(),
            connect_timeout: Duration::from_secs(10),
            kill_grace: Duration::from_secs(2),
            think_time: Duration::from_millis(400),
        }
    }
}

/// Scoped handle to one running worker. The monitor task owns the child.
struct BotProcess {
    session_id: String,
    pid: Option<u32>,
    kill_tx: Option<oneshot::Sender<()>>,
    monitor: JoinHandle<Option<ExitStatus>>,
}

impl BotProcess {
    /// Asks the monitor to kill the child and waits until it is reaped.
    async fn terminate(mut self) -> Option<ExitStatus> {
        if let Some(kill_tx) = self.kill_tx.take() {
            let _ = kill_tx.send(());
        }
        match (&mut self.monitor).await {
            Ok(status) => status,
            Err(e) => {
                error!("Bot monitor task failed: {}", e);
                None
            }
        }
    }
}

struct PendingTicket {
    identity: Identity,
    connected_tx: oneshot::Sender<()>,
}

type ProcessTable = Arc<Mutex<HashMap<Identity, BotProcess>>>;
type TicketTable = Arc<Mutex<HashMap<String, PendingTicket>>>;

pub struct BotSupervisor {
    config: SupervisorConfig,
    registry: Arc<SessionRegistry>,
    processes: ProcessTable,
    tickets: TicketTable,
}

impl BotSupervisor {
    pub fn new(config: SupervisorConfig, registry: Arc<SessionRegistry>) -> Self {
        Self {
            config,
            registry,
            processes: Arc::new(Mutex::new(HashMap::new())),
            tickets: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    /// Adds a bot participant to the session and starts its worker.
    pub async fn summon(&self, session_id: &str, requested_by: &Identity) -> GameResult<Identity> {
        let identity = Identity::bot();
        let display_name = format!("Bot {}", &identity.key()[4..8]);
        self.registry
            .add_bot(session_id, requested_by, Participant::bot(identity.clone(), display_name))
            .await?;

        let ticket = Uuid::new_v4().simple().to_string();
        let (connected_tx, connected_rx) = oneshot::channel();
        self.tickets.lock().await.insert(
            ticket.clone(),
            PendingTicket {
                identity: identity.clone(),
                connected_tx,
            },
        );

        let child = match self.spawn_worker(session_id, &identity, &ticket) {
            Ok(child) => child,
            Err(e) => {
                error!("Failed to spawn bot {} for game {}: {}", identity, session_id, e);
                self.tickets.lock().await.remove(&ticket);
                if let Err(cleanup) = self.registry.leave(session_id, &identity).await {
                    debug!("Bot {} already gone from game {}: {}", identity, session_id, cleanup);
                }
                return Err(GameError::BotSpawnFailure(e.to_string()));
            }
        };

        let pid = child.id();
        info!("Spawned bot {} (pid {:?}) for game {}", identity, pid, session_id);

        let (kill_tx, kill_rx) = oneshot::channel();
        // Held across the spawn so a worker that dies at once cannot try to
        // deregister before it is registered.
        let mut processes = self.processes.lock().await;
        let monitor = tokio::spawn(monitor_worker(
            child,
            MonitorContext {
                identity: identity.clone(),
                session_id: session_id.to_string(),
                ticket,
                kill_grace: self.config.kill_grace,
                connect_timeout: self.config.connect_timeout,
                registry: Arc::clone(&self.registry),
                processes: Arc::clone(&self.processes),
                tickets: Arc::clone(&self.tickets),
            },
            kill_rx,
            connected_rx,
        ));

        processes.insert(
            identity.clone(),
            BotProcess {
                session_id: session_id.to_string(),
                pid,
                kill_tx: Some(kill_tx),
                monitor,
            },
        );
        drop(processes);

        // A teardown between `add_bot` and the insert found nothing to kill.
        if self.reap_orphan(session_id, &identity).await {
            return Err(GameError::SessionNotFound);
        }

        Ok(identity)
    }

    /// Kills a registered bot that is no longer a participant of its live
    /// session. Returns true when it had to.
    async fn reap_orphan(&self, session_id: &str, identity: &Identity) -> bool {
        if self.registry.has_member(session_id, identity).await {
            return false;
        }
        warn!("Bot {} lost game {} while starting, killing it", identity, session_id);
        self.terminate(identity).await;
        true
    }

    fn spawn_worker(
        &self,
        session_id: &str,
        identity: &Identity,
        ticket: &str,
    ) -> std::io::Result<Child> {
        let mut command = Command::new(&self.config.program);
        command
            .args(&self.config.base_args)
            .arg("--server")
            .arg(&self.config.server_url)
            .arg("--game-id")
            .arg(session_id)
            .arg("--identity")
            .arg(identity.key())
            .arg("--ticket")
            .arg(ticket)
            .arg("--think-ms")
            .arg(self.config.think_time.as_millis().to_string())
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::piped())
            .kill_on_drop(true);
        command.spawn()
    }

    /// Removes a bot on the host's behalf and kills its process.
    pub async fn kick(
        &self,
        session_id: &str,
        target: &Identity,
        requested_by: &Identity,
    ) -> GameResult<()> {
        self.registry.remove_bot(session_id, target, requested_by).await?;
        self.terminate(target).await;
        Ok(())
    }

    /// Kills one bot's process, blocking until it has exited. Returns the
    /// exit status, or `None` when no process was registered.
    pub async fn terminate(&self, identity: &Identity) -> Option<ExitStatus> {
        // The handle is taken before the ticket goes, so a monitor reacting to
        // the withdrawn ticket still reports to this call.
        let process = self.processes.lock().await.remove(identity);
        self.tickets
            .lock()
            .await
            .retain(|_, pending| &pending.identity != identity);

        let process = process?;
        let session_id = process.session_id.clone();
        let status = process.terminate().await;
        info!("Bot {} of game {} terminated ({:?})", identity, session_id, status);
        status
    }

    pub async fn terminate_all(&self, identities: &[Identity]) {
        for identity in identities {
            self.terminate(identity).await;
        }
    }

    /// Kills every supervised process.
    pub async fn shutdown(&self) {
        let identities: Vec<Identity> = self.processes.lock().await.keys().cloned().collect();
        self.terminate_all(&identities).await;
    }

    /// Consumes a one-time connect ticket, returning the bot it was issued to.
    pub async fn redeem_ticket(&self, ticket: &str) -> Option<Identity> {
        let pending = self.tickets.lock().await.remove(ticket)?;
        let _ = pending.connected_tx.send(());
        debug!("Bot {} redeemed its ticket", pending.identity);
        Some(pending.identity)
    }

    pub async fn is_running(&self, identity: &Identity) -> bool {
        self.processes.lock().await.contains_key(identity)
    }

    pub async fn pid(&self, identity: &Identity) -> Option<u32> {
        self.processes.lock().await.get(identity).and_then(|p| p.pid)
    }

    pub async fn process_count(&self) -> usize {
        self.processes.lock().await.len()
    }
}

struct MonitorContext {
    identity: Identity,
    session_id: String,
    ticket: String,
    kill_grace: Duration,
    connect_timeout: Duration,
    registry: Arc<SessionRegistry>,
    processes: ProcessTable,
    tickets: TicketTable,
}

/// Owns the child until it exits. Ends on a kill request, on the child's own
/// exit, or when the bot fails to connect in time.
async fn monitor_worker(
    mut child: Child,
    ctx: MonitorContext,
    mut kill_rx: oneshot::Receiver<()>,
    mut connected_rx: oneshot::Receiver<()>,
) -> Option<ExitStatus> {
    if let Some(stderr) = child.stderr.take() {
        let identity = ctx.identity.clone();
        tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            while let Ok(Some(line)) = lines.next_line().await {
                debug!("[{}] {}", identity, line);
            }
        });
    }

    let deadline = tokio::time::sleep(ctx.connect_timeout);
    tokio::pin!(deadline);
    let mut awaiting_connect = true;

    loop {
        tokio::select! {
            // A dropped sender means the handle is gone; kill either way.
            _ = &mut kill_rx => {
                return reap(&mut child, &ctx.identity, ctx.kill_grace).await;
            }
            status = child.wait() => {
                match &status {
                    Ok(status) if status.success() => info!("Bot {} exited", ctx.identity),
                    Ok(status) => warn!("Bot {} exited abnormally: {}", ctx.identity, status),
                    Err(e) => error!("Failed to wait on bot {}: {}", ctx.identity, e),
                }
                ctx.tickets.lock().await.remove(&ctx.ticket);
                ctx.processes.lock().await.remove(&ctx.identity);
                return status.ok();
            }
            result = &mut connected_rx, if awaiting_connect => {
                awaiting_connect = false;
                if result.is_err() {
                    // Only teardown withdraws a ticket before it is redeemed.
                    info!("Ticket for bot {} withdrawn, stopping it", ctx.identity);
                    ctx.processes.lock().await.remove(&ctx.identity);
                    return reap(&mut child, &ctx.identity, ctx.kill_grace).await;
                }
            }
            _ = &mut deadline, if awaiting_connect => {
                let err = GameError::BotNotResponding(ctx.identity.to_string());
                warn!("{} (no connection within {:?})", err, ctx.connect_timeout);
                ctx.tickets.lock().await.remove(&ctx.ticket);
                ctx.processes.lock().await.remove(&ctx.identity);
                let status = reap(&mut child, &ctx.identity, ctx.kill_grace).await;
                if let Err(e) = ctx.registry.leave(&ctx.session_id, &ctx.identity).await {
                    debug!("Bot {} already gone from game {}: {}", ctx.identity, ctx.session_id, e);
                }
                return status;
            }
        }
    }
}

/// Kills the child and waits for it, escalating if it lingers.
async fn reap(child: &mut Child, identity: &Identity, grace: Duration) -> Option<ExitStatus> {
    if let Err(e) = child.start_kill() {
        debug!("Kill signal to bot {} failed: {}", identity, e);
    }

    match tokio::time::timeout(grace, child.wait()).await {
        Ok(Ok(status)) => Some(status),
        Ok(Err(e)) => {
            error!("Failed to reap bot {}: {}", identity, e);
            None
        }
        Err(_) => {
            warn!("Bot {} survived {:?} after kill, forcing", identity, grace);
            match child.kill().await {
                Ok(()) => child.try_wait().ok().flatten(),
                Err(e) => {
                    error!("Forced kill of bot {} failed: {}", identity, e);
                    None
                }
            }
        }
    }
}
