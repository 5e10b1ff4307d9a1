//! UDP transport for the text-line protocol
//!
//! One socket, one loop, no per-client tasks: each datagram is parsed,
//! applied to the game to completion, and its broadcasts flushed before
//! the next datagram is read. That single-owner loop is what serializes
//! all access to the game state.

use crate::game::Game;
use log::{error, info, warn};
use shared::ClientMessage;
use std::net::SocketAddr;
use tokio::net::UdpSocket;

pub struct Server {
    socket: UdpSocket,
    game: Game,
}

impl Server {
    /// Binds the socket and takes ownership of the game state.
    pub async fn bind(addr: &str, game: Game) -> Result<Server, std::io::Error> {
        let socket = UdpSocket::bind(addr).await?;
        info!("server listening on {}", socket.local_addr()?);
        Ok(Server { socket, game })
    }

    /// The bound address, needed when binding to port 0.
    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.socket.local_addr()
    }

    /// Runs the event loop until the last gold pile is collected, then
    /// returns after the final standings have been sent.
    pub async fn run(&mut self) -> Result<(), std::io::Error> {
        let mut buffer = [0u8; 1024];

        loop {
            let (len, from) = self.socket.recv_from(&mut buffer).await?;

            let text = match std::str::from_utf8(&buffer[..len]) {
                Ok(text) => text,
                Err(_) => {
                    warn!("dropping non-UTF-8 datagram from {}", from);
                    continue;
                }
            };

            let Some(message) = ClientMessage::parse(text) else {
                warn!("ignoring malformed message {:?} from {}", text, from);
                continue;
            };

            let (outbound, game_over) = self.game.handle(from, message);
            for out in outbound {
                let data = out.message.to_string();
                if let Err(e) = self.socket.send_to(data.as_bytes(), out.addr).await {
                    // a dead client must not take the game down
                    error!("failed to send to {}: {}", out.addr, e);
                }
            }

            if game_over {
                info!("all gold collected, game over");
                return Ok(());
            }
        }
    }
}
