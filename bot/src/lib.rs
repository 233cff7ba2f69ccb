//! # Minesweeper Bot Library
//!
//! The computer opponent summoned into competitive games. The server starts
//! one `sweeper-bot` process per bot, handing it the game id, its identity
//! and a one-time ticket. The bot dials back in over WebSocket like any other
//! client and plays until the game ends or is terminated, then exits.
//!
//! ## Module Organization
//!
//! ### Game Module (`game`)
//! The bot's mirror of the board and its move choice: reveal a cell that a
//! neighbouring number proves is a mine, otherwise a random hidden cell.
//!
//! ### Network Module (`network`)
//! Connects with the ticket, applies snapshots and deltas, and sends a
//! `reveal` whenever it is the bot's turn.

pub mod game;
pub mod network;
