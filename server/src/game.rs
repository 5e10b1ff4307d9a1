//! Player lifecycle and authoritative game-state coordination
//!
//! The `Game` owns every piece of mutable state: the master grid, the wall
//! index, the gold table, the player roster and the spectator slot. One
//! inbound event is applied to full completion, including all visibility
//! refreshes and the outbound broadcasts it produces, before the next is
//! processed; the transport loop upholds that serialization.

use crate::gold::{distribute, GoldConfig, GoldError, GoldTable};
use crate::grid::Grid;
use crate::visibility;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::Rng;
use shared::{is_walkable, ClientMessage, ServerMessage, BLANK, FLOOR, MAX_PLAYERS};
use std::collections::HashMap;
use std::net::SocketAddr;

/// One player slot. Deactivated on quit rather than destroyed, so a later
/// rejoin from the same address reuses the slot and its glyph.
#[derive(Debug)]
pub struct Player {
    pub name: String,
    pub glyph: char,
    pub addr: SocketAddr,
    pub active: bool,
    /// Current location as a linear grid position.
    pub pos: usize,
    /// Gold carried in the purse.
    pub gold: u32,
    /// Currently-perceptible cells, fully recomputed on every move.
    pub visible: Grid,
    /// Monotonic memory of static terrain ever revealed.
    pub visited: Grid,
}

/// A broadcast-ready message for the transport to deliver.
#[derive(Debug)]
pub struct Outbound {
    pub addr: SocketAddr,
    pub message: ServerMessage,
}

/// The single source of truth for one running game.
pub struct Game {
    pub grid: Grid,
    pub walls: Vec<usize>,
    pub gold: GoldTable,
    pub config: GoldConfig,
    pub players: HashMap<SocketAddr, Player>,
    pub spectator: Option<SocketAddr>,
    rng: StdRng,
}

/// Movement deltas per key, in (column, row) form:
/// ```text
/// y k u
/// h @ l
/// b j n
/// ```
fn key_delta(key: char) -> Option<(i64, i64)> {
    match key.to_ascii_lowercase() {
        'h' => Some((-1, 0)),
        'l' => Some((1, 0)),
        'k' => Some((0, -1)),
        'j' => Some((0, 1)),
        'y' => Some((-1, -1)),
        'u' => Some((1, -1)),
        'b' => Some((-1, 1)),
        'n' => Some((1, 1)),
        _ => None,
    }
}

impl Game {
    /// Builds the game state: distributes the gold over the grid, then
    /// freezes the wall index for the life of the game.
    pub fn new(mut grid: Grid, config: GoldConfig, mut rng: StdRng) -> Result<Game, GoldError> {
        let gold = distribute(&mut grid, &config, &mut rng)?;
        let walls = grid.wall_index();
        Ok(Game {
            grid,
            walls,
            gold,
            config,
            players: HashMap::new(),
            spectator: None,
            rng,
        })
    }

    /// Applies one inbound event to completion and returns the broadcasts
    /// it produced, plus whether the game just finished (all gold
    /// collected).
    pub fn handle(&mut self, from: SocketAddr, message: ClientMessage) -> (Vec<Outbound>, bool) {
        let mut out = match message {
            ClientMessage::Play { name } => self.join(from, name),
            ClientMessage::Spectate => self.spectate(from),
            ClientMessage::Key { key } => self.key(from, key),
        };

        let over = self.gold.is_exhausted();
        if over {
            out.extend(self.game_over());
        }
        (out, over)
    }

    /// Sum of all purses, for the gold conservation invariant.
    pub fn carried_gold(&self) -> u32 {
        self.players.values().map(|p| p.gold).sum()
    }

    fn join(&mut self, from: SocketAddr, name: String) -> Vec<Outbound> {
        if let Some(player) = self.players.get_mut(&from) {
            if player.active {
                warn!("ignoring PLAY from already-active player at {}", from);
                return Vec::new();
            }
            // rejoin reuses the slot: fresh name, empty purse, blank maps
            info!("player {} rejoining from {} as '{}'", player.glyph, from, name);
            player.name = name;
            player.active = true;
            player.gold = 0;
            player.visible.blank();
            player.visited.blank();
        } else {
            if self.players.len() >= MAX_PLAYERS {
                return vec![Outbound {
                    addr: from,
                    message: ServerMessage::Quit {
                        message: "Game is full".to_string(),
                    },
                }];
            }

            let glyph = (b'A' + self.players.len() as u8) as char;
            let pos = self.random_floor_cell();
            info!("player {} ('{}') joined from {}", glyph, name, from);

            self.players.insert(
                from,
                Player {
                    name,
                    glyph,
                    addr: from,
                    active: true,
                    pos,
                    gold: 0,
                    visible: self.grid.blank_clone(),
                    visited: self.grid.blank_clone(),
                },
            );
        }

        let player = &self.players[&from];
        let mut out = vec![
            Outbound {
                addr: from,
                message: ServerMessage::Joined {
                    glyph: player.glyph,
                },
            },
            Outbound {
                addr: from,
                message: ServerMessage::Grid {
                    height: self.grid.height(),
                    width: self.grid.width(),
                },
            },
        ];

        self.refresh_player(from);
        out.extend(self.display_all());
        out
    }

    fn spectate(&mut self, from: SocketAddr) -> Vec<Outbound> {
        let mut out = Vec::new();

        if let Some(old) = self.spectator {
            if old != from {
                info!("spectator {} replaced by {}", old, from);
                out.push(Outbound {
                    addr: old,
                    message: ServerMessage::Quit {
                        message: "You have been replaced by a new spectator.".to_string(),
                    },
                });
            }
        }
        self.spectator = Some(from);

        out.push(Outbound {
            addr: from,
            message: ServerMessage::Grid {
                height: self.grid.height(),
                width: self.grid.width(),
            },
        });
        out.push(Outbound {
            addr: from,
            message: ServerMessage::Display {
                map: self.render_spectator_view(),
            },
        });
        out
    }

    fn key(&mut self, from: SocketAddr, key: char) -> Vec<Outbound> {
        if key == 'Q' || key == 'q' {
            return self.quit(from);
        }

        // spectators have no command other than quitting
        if self.spectator == Some(from) {
            return Vec::new();
        }

        match self.players.get(&from) {
            None => {
                debug!("key from unknown address {}", from);
                return Vec::new();
            }
            Some(player) if !player.active => {
                debug!("ignoring stale key from inactive player at {}", from);
                return Vec::new();
            }
            Some(_) => {}
        }

        let Some((dx, dy)) = key_delta(key) else {
            debug!("unrecognized key '{}' from {}", key, from);
            return Vec::new();
        };

        if key.is_ascii_uppercase() {
            self.run(from, dx, dy)
        } else {
            self.try_step(from, dx, dy).unwrap_or_default()
        }
    }

    /// Deactivates a player or clears the spectator slot. Duplicate quits
    /// and quits from unknown addresses are no-ops.
    fn quit(&mut self, from: SocketAddr) -> Vec<Outbound> {
        if let Some(player) = self.players.get_mut(&from) {
            if player.active {
                player.active = false;
                info!("player {} quit", player.glyph);
                return vec![Outbound {
                    addr: from,
                    message: ServerMessage::Quit {
                        message: "Thanks for playing!".to_string(),
                    },
                }];
            }
            return Vec::new();
        }

        if self.spectator == Some(from) {
            self.spectator = None;
            return vec![Outbound {
                addr: from,
                message: ServerMessage::Quit {
                    message: "Thanks for spectating!".to_string(),
                },
            }];
        }

        Vec::new()
    }

    /// Resolves a single-step destination, or `None` when the move must be
    /// rejected: a boundary or blank target, leaving the buffer, or
    /// arithmetic that would wrap across a row edge.
    fn destination(&self, from_pos: usize, dx: i64, dy: i64) -> Option<usize> {
        let pitch = self.grid.pitch() as i64;
        let target = from_pos as i64 + dx + dy * pitch;
        if target < 0 || target as usize >= self.grid.len() {
            return None;
        }
        let target = target as usize;

        // the linear delta must decompose into exactly the requested
        // column and row movement, otherwise the step wrapped
        if self.grid.col(target) as i64 - self.grid.col(from_pos) as i64 != dx {
            return None;
        }
        if self.grid.row(target) as i64 - self.grid.row(from_pos) as i64 != dy {
            return None;
        }

        let c = self.grid.get(target)?;
        if !is_walkable(c) {
            return None;
        }
        Some(target)
    }

    /// One accepted single-step move with its full side-effect sequence,
    /// or `None` when the move is rejected (no state change, no
    /// broadcast).
    fn try_step(&mut self, from: SocketAddr, dx: i64, dy: i64) -> Option<Vec<Outbound>> {
        let (old, glyph) = {
            let player = self.players.get(&from)?;
            (player.pos, player.glyph)
        };
        let new = self.destination(old, dx, dy)?;

        let mut out = Vec::new();

        self.players.get_mut(&from)?.pos = new;

        // pickup: zero the pile, credit the mover, restore plain floor
        if let Some(amount) = self.gold.collect(new) {
            self.grid.set(new, FLOOR);
            if let Some(player) = self.players.get_mut(&from) {
                player.gold += amount;
            }
            info!("player {} picked up {} gold", glyph, amount);
            out.extend(self.gold_update(from, amount));
        }

        // an occupied destination swaps the occupant back to the origin
        for other in self.players.values_mut() {
            if other.addr != from && other.active && other.pos == new {
                other.pos = old;
            }
        }

        self.refresh_player(from);
        self.propagate_move(from, glyph, old, new);

        out.extend(self.display_all());
        Some(out)
    }

    /// The run variant: repeats the full single-step sequence, one cell at
    /// a time, until the next cell is rejected or the gold runs out.
    fn run(&mut self, from: SocketAddr, dx: i64, dy: i64) -> Vec<Outbound> {
        let mut out = Vec::new();
        while let Some(step_out) = self.try_step(from, dx, dy) {
            out.extend(step_out);
            if self.gold.is_exhausted() {
                break;
            }
        }
        out
    }

    fn random_floor_cell(&mut self) -> usize {
        loop {
            let pos = self.rng.gen_range(0..self.grid.len());
            if self.grid.get(pos) == Some(FLOOR) {
                return pos;
            }
        }
    }

    fn refresh_player(&mut self, addr: SocketAddr) {
        if let Some(player) = self.players.get_mut(&addr) {
            visibility::refresh(
                &self.grid,
                &self.walls,
                player.pos,
                &mut player.visible,
                &mut player.visited,
            );
        }
    }

    /// Propagates one accepted move through everyone's visible maps: any
    /// player whose map currently shows the affected cells sees the mover
    /// leave and arrive, and the mover sees any other player standing on
    /// a cell their own refreshed map shows.
    fn propagate_move(&mut self, from: SocketAddr, glyph: char, old: usize, new: usize) {
        let terrain_old = self.grid.get(old).unwrap_or(BLANK);

        for player in self.players.values_mut() {
            if player.addr == from || !player.active {
                continue;
            }
            if player.visible.get(old).is_some_and(|c| c != BLANK) {
                player.visible.set(old, terrain_old);
            }
            if player.visible.get(new).is_some_and(|c| c != BLANK) {
                player.visible.set(new, glyph);
            }
        }

        let occupants: Vec<(usize, char)> = self
            .players
            .values()
            .filter(|p| p.addr != from && p.active)
            .map(|p| (p.pos, p.glyph))
            .collect();
        if let Some(mover) = self.players.get_mut(&from) {
            for (pos, other_glyph) in occupants {
                if mover.visible.get(pos).is_some_and(|c| c != BLANK) {
                    mover.visible.set(pos, other_glyph);
                }
            }
        }
    }

    /// `GOLD <picked> <purse> <remaining>` to every active player and the
    /// spectator; non-movers see a pickup of zero.
    fn gold_update(&self, picker: SocketAddr, amount: u32) -> Vec<Outbound> {
        let remaining = self.gold.remaining();
        let mut out: Vec<Outbound> = self
            .players
            .values()
            .filter(|p| p.active)
            .map(|p| Outbound {
                addr: p.addr,
                message: ServerMessage::Gold {
                    picked_up: if p.addr == picker { amount } else { 0 },
                    purse: p.gold,
                    remaining,
                },
            })
            .collect();
        if let Some(spectator_addr) = self.spectator {
            out.push(Outbound {
                addr: spectator_addr,
                message: ServerMessage::Gold {
                    picked_up: 0,
                    purse: 0,
                    remaining,
                },
            });
        }
        out
    }

    /// A DISPLAY snapshot for every active player plus the spectator.
    fn display_all(&self) -> Vec<Outbound> {
        let mut out: Vec<Outbound> = self
            .players
            .values()
            .filter(|p| p.active)
            .map(|p| Outbound {
                addr: p.addr,
                message: ServerMessage::Display {
                    map: self.render_player_view(p),
                },
            })
            .collect();
        if let Some(spectator_addr) = self.spectator {
            out.push(Outbound {
                addr: spectator_addr,
                message: ServerMessage::Display {
                    map: self.render_spectator_view(),
                },
            });
        }
        out
    }

    /// A player's view: their accumulated map, overlaid with the gold and
    /// player glyphs currently in sight, with their own cell marked `@`.
    fn render_player_view(&self, player: &Player) -> String {
        let mut buf = player.visited.as_str().as_bytes().to_vec();
        for (i, &c) in player.visible.as_str().as_bytes().iter().enumerate() {
            if c == b'*' || c.is_ascii_uppercase() {
                buf[i] = c;
            }
        }
        if player.pos < buf.len() {
            buf[player.pos] = b'@';
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// The spectator's view: the full unobstructed map with every active
    /// player's glyph overlaid.
    fn render_spectator_view(&self) -> String {
        let mut buf = self.grid.as_str().as_bytes().to_vec();
        for player in self.players.values().filter(|p| p.active) {
            if player.pos < buf.len() {
                buf[player.pos] = player.glyph as u8;
            }
        }
        String::from_utf8_lossy(&buf).into_owned()
    }

    /// Final standings, one line per player slot ever created, sent to
    /// everyone including the spectator.
    fn game_over(&self) -> Vec<Outbound> {
        let mut standings: Vec<&Player> = self.players.values().collect();
        standings.sort_by_key(|p| p.glyph);

        let mut summary = String::from("GAME OVER:\n");
        for player in &standings {
            summary.push_str(&format!(
                "{} {:>10} {}\n",
                player.glyph, player.gold, player.name
            ));
        }

        let mut out: Vec<Outbound> = self
            .players
            .values()
            .map(|p| Outbound {
                addr: p.addr,
                message: ServerMessage::Quit {
                    message: summary.clone(),
                },
            })
            .collect();
        if let Some(spectator_addr) = self.spectator {
            out.push(Outbound {
                addr: spectator_addr,
                message: ServerMessage::Quit { message: summary },
            });
        }
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gold::Pile;
    use rand::SeedableRng;
    use shared::GOLD_TOTAL;
    use std::net::{IpAddr, Ipv4Addr};

    // two 10x3 rooms joined by a single-width corridor; 60 floor cells
    const MAP: &str = "\
+----------+          +----------+
|..........|          |..........|
|..........############..........|
|..........|          |..........|
+----------+          +----------+
";

    fn addr(n: u16) -> SocketAddr {
        SocketAddr::new(IpAddr::V4(Ipv4Addr::new(127, 0, 0, 1)), 40000 + n)
    }

    fn new_game(seed: u64) -> Game {
        let grid = Grid::from_text(MAP).unwrap();
        Game::new(grid, GoldConfig::default(), StdRng::seed_from_u64(seed)).unwrap()
    }

    fn join(game: &mut Game, n: u16, name: &str) -> Vec<Outbound> {
        let (out, over) = game.handle(
            addr(n),
            ClientMessage::Play {
                name: name.to_string(),
            },
        );
        assert!(!over);
        out
    }

    /// Parks a player on a chosen cell, bypassing the random spawn.
    fn place(game: &mut Game, n: u16, col: usize, row: usize) -> usize {
        let pos = row * game.grid.pitch() + col;
        game.players.get_mut(&addr(n)).unwrap().pos = pos;
        pos
    }

    #[test]
    fn test_join_assigns_glyph_and_floor_spawn() {
        let mut game = new_game(1);
        let out = join(&mut game, 0, "alice");

        assert!(matches!(
            out[0].message,
            ServerMessage::Joined { glyph: 'A' }
        ));
        assert!(matches!(
            out[1].message,
            ServerMessage::Grid {
                height: 5,
                width: 34
            }
        ));
        let player = &game.players[&addr(0)];
        assert!(player.active);
        // spawns land on walkable terrain, never on gold or walls
        assert_eq!(game.grid.get(player.pos), Some('.'));
    }

    #[test]
    fn test_join_capacity_bound() {
        let mut game = new_game(2);
        for n in 0..26 {
            join(&mut game, n, "p");
        }
        let (out, _) = game.handle(
            addr(99),
            ClientMessage::Play {
                name: "late".to_string(),
            },
        );
        assert_eq!(out.len(), 1);
        assert!(matches!(
            &out[0].message,
            ServerMessage::Quit { message } if message == "Game is full"
        ));
        assert_eq!(game.players.len(), 26);
    }

    #[test]
    fn test_duplicate_play_from_active_player_ignored() {
        let mut game = new_game(3);
        join(&mut game, 0, "alice");
        let (out, _) = game.handle(
            addr(0),
            ClientMessage::Play {
                name: "alice-again".to_string(),
            },
        );
        assert!(out.is_empty());
        assert_eq!(game.players[&addr(0)].name, "alice");
    }

    #[test]
    fn test_move_into_wall_rejected() {
        let mut game = new_game(4);
        join(&mut game, 0, "alice");
        let pos = place(&mut game, 0, 1, 1); // next to the left wall

        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'h' });
        assert!(out.is_empty());
        assert_eq!(game.players[&addr(0)].pos, pos);
    }

    #[test]
    fn test_accepted_move_updates_position() {
        let mut game = new_game(5);
        join(&mut game, 0, "alice");
        let pos = place(&mut game, 0, 2, 2);

        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'l' });
        assert_eq!(game.players[&addr(0)].pos, pos + 1);
        // at least the mover's DISPLAY goes out
        assert!(out
            .iter()
            .any(|o| matches!(o.message, ServerMessage::Display { .. }) && o.addr == addr(0)));
    }

    #[test]
    fn test_diagonal_moves() {
        let mut game = new_game(6);
        join(&mut game, 0, "alice");
        let pos = place(&mut game, 0, 5, 2);
        let pitch = game.grid.pitch();

        game.handle(addr(0), ClientMessage::Key { key: 'y' });
        assert_eq!(game.players[&addr(0)].pos, pos - pitch - 1);
    }

    #[test]
    fn test_swap_on_occupied_cell() {
        let mut game = new_game(7);
        join(&mut game, 0, "alice");
        join(&mut game, 1, "bob");
        let a_pos = place(&mut game, 0, 3, 2);
        let b_pos = place(&mut game, 1, 4, 2);

        game.handle(addr(0), ClientMessage::Key { key: 'l' });

        let a = &game.players[&addr(0)];
        let b = &game.players[&addr(1)];
        assert_eq!(a.pos, b_pos);
        assert_eq!(b.pos, a_pos);
        assert!(a.active && b.active);
    }

    #[test]
    fn test_pickup_credits_mover_and_broadcasts() {
        let mut game = new_game(8);
        join(&mut game, 0, "alice");
        join(&mut game, 1, "bob");
        // park bob on the corridor, which never holds gold
        place(&mut game, 1, 15, 2);

        // park alice one step left of a real pile and step onto it
        let pile_pos = game.gold.positions().next().unwrap();
        let amount = match game.gold.pile_at(pile_pos).unwrap() {
            Pile::Remaining(amount) => amount,
            Pile::Collected => unreachable!("nothing collected yet"),
        };
        game.players.get_mut(&addr(0)).unwrap().pos = pile_pos - 1;

        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'l' });

        let player = &game.players[&addr(0)];
        assert_eq!(player.pos, pile_pos);
        assert_eq!(player.gold, amount);
        // the cell reverts to plain floor
        assert_eq!(game.grid.get(pile_pos), Some('.'));
        assert_eq!(game.gold.remaining() + game.carried_gold(), GOLD_TOTAL);

        // mover sees its own pickup; bystanders see zero
        assert!(out.iter().any(|o| o.addr == addr(0)
            && matches!(o.message, ServerMessage::Gold { picked_up, .. } if picked_up == amount)));
        assert!(out.iter().any(|o| o.addr == addr(1)
            && matches!(o.message, ServerMessage::Gold { picked_up: 0, .. })));
    }

    #[test]
    fn test_gold_invariant_across_random_walk() {
        let mut game = new_game(9);
        join(&mut game, 0, "alice");
        join(&mut game, 1, "bob");

        let keys = ['h', 'j', 'k', 'l', 'y', 'u', 'b', 'n'];
        let mut rng = StdRng::seed_from_u64(99);
        for _ in 0..500 {
            let n = rng.gen_range(0..2u16);
            let key = keys[rng.gen_range(0..keys.len())];
            game.handle(addr(n), ClientMessage::Key { key });
            assert_eq!(
                game.gold.remaining() + game.carried_gold(),
                GOLD_TOTAL,
                "gold conservation violated"
            );
        }
    }

    #[test]
    fn test_visited_map_is_monotonic() {
        let mut game = new_game(10);
        join(&mut game, 0, "alice");
        place(&mut game, 0, 5, 2);

        let mut seen = 0;
        let keys = ['l', 'l', 'j', 'k', 'h', 'l', 'l', 'l'];
        for key in keys {
            game.handle(addr(0), ClientMessage::Key { key });
            let now = game.players[&addr(0)]
                .visited
                .positions_matching(|c| c != ' ')
                .len();
            assert!(now >= seen, "visited map shrank");
            seen = now;
        }
    }

    #[test]
    fn test_quit_deactivates_and_is_idempotent() {
        let mut game = new_game(11);
        join(&mut game, 0, "alice");

        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'Q' });
        assert!(matches!(
            &out[0].message,
            ServerMessage::Quit { message } if message == "Thanks for playing!"
        ));
        assert!(!game.players[&addr(0)].active);

        // duplicate quit is a no-op
        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'q' });
        assert!(out.is_empty());

        // stale moves from a deactivated player are ignored
        let before = game.players[&addr(0)].pos;
        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'l' });
        assert!(out.is_empty());
        assert_eq!(game.players[&addr(0)].pos, before);
    }

    #[test]
    fn test_rejoin_reuses_slot_and_resets() {
        let mut game = new_game(12);
        join(&mut game, 0, "alice");
        game.players.get_mut(&addr(0)).unwrap().gold = 17;
        game.handle(addr(0), ClientMessage::Key { key: 'Q' });

        let out = join(&mut game, 0, "alice2");
        assert!(matches!(
            out[0].message,
            ServerMessage::Joined { glyph: 'A' }
        ));
        let player = &game.players[&addr(0)];
        assert!(player.active);
        assert_eq!(player.name, "alice2");
        assert_eq!(player.gold, 0);
        assert_eq!(game.players.len(), 1);
    }

    #[test]
    fn test_spectator_eviction_and_quit() {
        let mut game = new_game(13);

        let (out, _) = game.handle(addr(50), ClientMessage::Spectate);
        assert!(matches!(out[0].message, ServerMessage::Grid { .. }));
        assert!(matches!(out[1].message, ServerMessage::Display { .. }));

        // a new spectator evicts and notifies the old one
        let (out, _) = game.handle(addr(51), ClientMessage::Spectate);
        assert!(out.iter().any(|o| o.addr == addr(50)
            && matches!(&o.message, ServerMessage::Quit { message }
                if message.contains("replaced"))));
        assert_eq!(game.spectator, Some(addr(51)));

        // spectator movement keys are ignored
        let (out, _) = game.handle(addr(51), ClientMessage::Key { key: 'l' });
        assert!(out.is_empty());

        let (out, _) = game.handle(addr(51), ClientMessage::Key { key: 'q' });
        assert!(matches!(
            &out[0].message,
            ServerMessage::Quit { message } if message == "Thanks for spectating!"
        ));
        assert_eq!(game.spectator, None);
    }

    #[test]
    fn test_display_marks_own_position() {
        let mut game = new_game(14);
        join(&mut game, 0, "alice");
        let pos = place(&mut game, 0, 3, 2);
        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'l' });

        let display = out
            .iter()
            .rev()
            .find_map(|o| match &o.message {
                ServerMessage::Display { map } if o.addr == addr(0) => Some(map.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(display.as_bytes()[pos + 1], b'@');
    }

    #[test]
    fn test_spectator_sees_players_on_full_map() {
        let mut game = new_game(15);
        join(&mut game, 0, "alice");
        let pos = place(&mut game, 0, 2, 1);
        game.handle(addr(50), ClientMessage::Spectate);

        let (out, _) = game.handle(addr(0), ClientMessage::Key { key: 'l' });
        let display = out
            .iter()
            .rev()
            .find_map(|o| match &o.message {
                ServerMessage::Display { map } if o.addr == addr(50) => Some(map.clone()),
                _ => None,
            })
            .unwrap();
        assert_eq!(display.as_bytes()[pos + 1], b'A');
    }

    #[test]
    fn test_game_over_when_all_gold_collected() {
        let mut game = new_game(16);
        join(&mut game, 0, "alice");
        place(&mut game, 0, 2, 2);

        // hand-collect every pile but one, then walk onto the last
        let positions: Vec<usize> = game.gold.positions().collect();
        for pos in positions {
            if let Some(amount) = game.gold.collect(pos) {
                game.grid.set(pos, '.');
                game.players.get_mut(&addr(0)).unwrap().gold += amount;
            }
        }
        assert!(game.gold.is_exhausted());

        // the next event triggers the final standings broadcast
        let (out, over) = game.handle(addr(0), ClientMessage::Key { key: 'l' });
        assert!(over);
        let quit = out
            .iter()
            .find_map(|o| match &o.message {
                ServerMessage::Quit { message } => Some(message.clone()),
                _ => None,
            })
            .unwrap();
        assert!(quit.starts_with("GAME OVER:"));
        assert!(quit.contains("alice"));
    }

    #[test]
    fn test_run_stops_at_wall() {
        let mut game = new_game(17);
        join(&mut game, 0, "alice");
        place(&mut game, 0, 1, 1);

        game.handle(addr(0), ClientMessage::Key { key: 'L' });
        // sprints across the room and stops on the last floor cell before
        // the right-hand wall of the left room
        let player = &game.players[&addr(0)];
        assert_eq!(game.grid.col(player.pos), 10);
        assert_eq!(game.grid.row(player.pos), 1);
    }

    #[test]
    fn test_run_through_corridor_row() {
        let mut game = new_game(18);
        join(&mut game, 0, "alice");
        place(&mut game, 0, 1, 2);

        game.handle(addr(0), ClientMessage::Key { key: 'L' });
        // row 2 is open all the way through the corridor into the far room
        let player = &game.players[&addr(0)];
        assert_eq!(game.grid.col(player.pos), 32);
        assert_eq!(game.grid.row(player.pos), 2);
    }
}
