use crate::game::BotGameState;
use futures::{SinkExt, StreamExt};
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::SeedableRng;
use shared::{ClientMessage, ServerMessage, TOKEN_PARAM};
use std::time::Duration;
use tokio::time::sleep;
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// What to do after handling one server message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Flow {
    Continue,
    Exit,
}

/// The server address with the ticket appended as the `token` query parameter.
pub fn connect_url(server: &str, ticket: &str) -> Result<Url, url::ParseError> {
    let mut url = Url::parse(server)?;
    url.query_pairs_mut().append_pair(TOKEN_PARAM, ticket);
    Ok(url)
}

pub struct Client {
    url: Url,
    game_id: String,
    think_time: Duration,
    game_state: BotGameState,
    rng: StdRng,
    /// A move is in flight and its update has not arrived yet.
    awaiting_result: bool,
}

impl Client {
    pub fn new(
        server: &str,
        game_id: &str,
        identity: &str,
        ticket: &str,
        think_time: Duration,
        seed: Option<u64>,
    ) -> Result<Self, url::ParseError> {
        let url = connect_url(server, ticket)?;
        let rng = match seed {
            Some(seed) => StdRng::seed_from_u64(seed),
            None => StdRng::from_entropy(),
        };

        Ok(Client {
            url,
            game_id: game_id.to_string(),
            think_time,
            game_state: BotGameState::new(identity),
            rng,
            awaiting_result: false,
        })
    }

    pub fn game_state(&self) -> &BotGameState {
        &self.game_state
    }

    /// Plays until the game ends, is terminated or the server goes away.
    pub async fn run(&mut self) -> Result<(), Box<dyn std::error::Error>> {
        info!("Connecting to game {}...", self.game_id);
        let (ws_stream, _) = connect_async(self.url.as_str()).await?;
        let (mut ws_sink, mut ws_receiver) = ws_stream.split();

        while let Some(frame) = ws_receiver.next().await {
            let text = match frame? {
                Message::Text(text) => text,
                Message::Close(_) => break,
                _ => continue,
            };

            let message: ServerMessage = match serde_json::from_str(&text) {
                Ok(message) => message,
                Err(e) => {
                    warn!("Unreadable server message: {}", e);
                    continue;
                }
            };
            if self.handle_message(message) == Flow::Exit {
                break;
            }

            if self.game_state.is_my_turn() && !self.awaiting_result {
                sleep(self.think_time).await;
                if let Some(pos) = self.game_state.choose_move(&mut self.rng) {
                    debug!("Revealing ({}, {})", pos.x, pos.y);
                    let reveal = ClientMessage::Reveal { x: pos.x, y: pos.y };
                    let request = serde_json::to_string(&reveal)?;
                    ws_sink.send(Message::Text(request.into())).await?;
                    self.awaiting_result = true;
                }
            }
        }

        let _ = ws_sink.close().await;
        info!("Leaving game {}", self.game_id);
        Ok(())
    }

    pub fn handle_message(&mut self, message: ServerMessage) -> Flow {
        match message {
            ServerMessage::Welcome { identity, .. } => {
                if identity != self.game_state.identity() {
                    warn!("Server calls us {}, expected {}", identity, self.game_state.identity());
                    self.game_state.set_identity(identity);
                }
                Flow::Continue
            }
            ServerMessage::GameStart(snapshot) => {
                if snapshot.game_id != self.game_id {
                    warn!("Restored into game {}, expected {}", snapshot.game_id, self.game_id);
                }
                self.game_state.apply_snapshot(&snapshot);
                self.awaiting_result = false;
                self.flow()
            }
            ServerMessage::GameUpdate(update) => {
                self.game_state.apply_update(&update);
                if !update.cells.is_empty() {
                    self.awaiting_result = false;
                }
                self.flow()
            }
            ServerMessage::GameTerminated { reason, message } => {
                info!("Game terminated ({:?}): {}", reason, message);
                Flow::Exit
            }
            ServerMessage::Error { code, message } => {
                warn!("Move rejected ({}): {}", code, message);
                self.awaiting_result = false;
                Flow::Continue
            }
        }
    }

    fn flow(&self) -> Flow {
        if self.game_state.is_finished() {
            info!("Game over: {:?}", self.game_state.status());
            Flow::Exit
        } else {
            Flow::Continue
        }
    }
}
