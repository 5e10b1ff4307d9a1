//! Authoritative server for a multiplayer dungeon gold hunt.
//!
//! Up to 26 players (plus one spectator) connect over UDP with a
//! text-line protocol, explore a shared ASCII map, and race to collect
//! randomly scattered gold piles. The server owns all game state and is
//! the only authority: clients send keystrokes, the server answers with
//! full per-player map snapshots filtered through line-of-sight.
//!
//! Module layout:
//! - [`grid`]: the flat character-buffer map and its position arithmetic
//! - [`gold`]: startup gold scatter and the deposit table
//! - [`visibility`]: the raycast line-of-sight engine
//! - [`game`]: player lifecycle and state coordination
//! - [`network`]: the single-task UDP event loop

pub mod game;
pub mod gold;
pub mod grid;
pub mod network;
pub mod visibility;
