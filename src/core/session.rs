//! Server-side game session
//!
//! One `GameSession` holds the phase, round and turn counters, the seated
//! players and the acknowledgment ledger. Every mutation happens under the
//! single mutex of `SharedSession`; connection workers lock it per line.

use std::collections::BTreeMap;
use std::fmt;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, MutexGuard};

use log::{debug, info};
use rand::rngs::StdRng;
use rand::SeedableRng;
use tokio::sync::mpsc;

use crate::config::ServerConfig;
use crate::constants::{DICE_COUNT, MAX_ROLLS_PER_TURN, REJECT_NOTICE};
use crate::core::barrier::RoundBarrier;
use crate::core::connection::Connection;
use crate::core::ledger::AckLedger;
use crate::core::message::ServerMessage;
use crate::core::message_types::{ClientCommand, MsgId, PlayerId, ServerFrame};
use crate::error::{ProtocolError, Result};
use crate::game::{Category, Player};

/// Server conversation phases
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Phase {
    StartingGame,
    StartingRound,
    StartingTurn,
    Rolling,
    Scoring,
    TurnOver,
    RoundOver,
    GameOver,
}

impl Phase {
    /// Phases in which one player is acting
    pub fn is_turn_phase(self) -> bool {
        matches!(
            self,
            Phase::StartingTurn | Phase::Rolling | Phase::Scoring | Phase::TurnOver
        )
    }

    /// Phases in which a new player may be seated
    pub fn admits_players(self) -> bool {
        matches!(self, Phase::StartingGame | Phase::StartingRound)
    }
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Phase::StartingGame => "StartingGame",
            Phase::StartingRound => "StartingRound",
            Phase::StartingTurn => "StartingTurn",
            Phase::Rolling => "Rolling",
            Phase::Scoring => "Scoring",
            Phase::TurnOver => "TurnOver",
            Phase::RoundOver => "RoundOver",
            Phase::GameOver => "GameOver",
        };
        f.write_str(name)
    }
}

pub struct GameSession {
    phase: Phase,
    max_round: u32,
    max_players: usize,
    current_round: u32,
    current_player: PlayerId,
    /// Players who have taken or are taking their turn this round
    acted_this_round: usize,
    rolls_this_turn: u8,
    next_msg_id: MsgId,
    last_player_id: PlayerId,
    players: BTreeMap<PlayerId, Player>,
    ledger: AckLedger,
    barrier: Arc<RoundBarrier>,
    rng: StdRng,
}

impl GameSession {
    pub fn new(max_round: u32, max_players: usize) -> Self {
        Self::with_rng(max_round, max_players, StdRng::from_entropy())
    }

    /// Session with a fixed dice sequence
    pub fn with_seed(max_round: u32, max_players: usize, seed: u64) -> Self {
        Self::with_rng(max_round, max_players, StdRng::seed_from_u64(seed))
    }

    pub fn from_config(config: &ServerConfig) -> Self {
        Self::new(config.max_round, config.max_players)
    }

    fn with_rng(max_round: u32, max_players: usize, rng: StdRng) -> Self {
        Self {
            phase: Phase::StartingGame,
            max_round,
            max_players,
            current_round: 1,
            current_player: 1,
            acted_this_round: 1,
            rolls_this_turn: 0,
            next_msg_id: 1,
            last_player_id: 0,
            players: BTreeMap::new(),
            ledger: AckLedger::new(),
            barrier: Arc::new(RoundBarrier::new()),
            rng,
        }
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    pub fn current_round(&self) -> u32 {
        self.current_round
    }

    pub fn max_round(&self) -> u32 {
        self.max_round
    }

    pub fn max_players(&self) -> usize {
        self.max_players
    }

    pub fn current_player(&self) -> PlayerId {
        self.current_player
    }

    pub fn rolls_this_turn(&self) -> u8 {
        self.rolls_this_turn
    }

    pub fn player_count(&self) -> usize {
        self.players.len()
    }

    pub fn player(&self, player_id: PlayerId) -> Option<&Player> {
        self.players.get(&player_id)
    }

    pub fn player_ids(&self) -> Vec<PlayerId> {
        self.players.keys().copied().collect()
    }

    pub fn ledger(&self) -> &AckLedger {
        &self.ledger
    }

    pub fn barrier(&self) -> Arc<RoundBarrier> {
        Arc::clone(&self.barrier)
    }

    /// Every seated player has had a turn this round
    pub fn is_round_over(&self) -> bool {
        self.acted_this_round >= self.players.len()
            || self.next_player_after(self.current_player).is_none()
    }

    /// The final round is over
    pub fn is_game_over(&self) -> bool {
        self.current_round >= self.max_round && self.is_round_over()
    }

    /// "Round: r Turn: PLAYER-n STATE: Phase"
    pub fn state_string(&self) -> String {
        format!(
            "Round: {} Turn: PLAYER-{} STATE: {}",
            self.current_round, self.current_player, self.phase
        )
    }

    pub fn all_scores(&self) -> String {
        self.players
            .values()
            .map(|p| format!("{}: {}", p.name(), p.scorecard()))
            .collect::<Vec<_>>()
            .join(" ")
    }

    pub fn seats_full(&self) -> bool {
        self.players.len() >= self.max_players
    }

    /// Whether `try_admit` would seat a player right now
    pub fn admission_open(&self) -> bool {
        self.phase.admits_players() && !self.seats_full()
    }

    // ---- outbound ----

    fn next_id(&mut self) -> MsgId {
        let id = self.next_msg_id;
        self.next_msg_id += 1;
        id
    }

    /// Send a fresh-id frame to one player, recording it if it needs a response
    fn send_to(&mut self, player_id: PlayerId, frame: ServerFrame, content: &str, need_response: bool) {
        if !self.players.contains_key(&player_id) {
            return;
        }
        let mut message = ServerMessage::new(frame, self.next_id(), content);
        if need_response {
            message = message.requiring_response();
        }
        let rendered = message.render();
        if let Some(player) = self.players.get(&player_id) {
            player.connection.send_line(&rendered);
        }
        if need_response {
            self.ledger.record(player_id, rendered, message.msg_id);
        }
    }

    /// Each recipient gets its own message id
    fn send_all(&mut self, frame: ServerFrame, content: &str, need_response: bool) {
        for player_id in self.player_ids() {
            self.send_to(player_id, frame, content, need_response);
        }
    }

    fn send_others(&mut self, except: PlayerId, frame: ServerFrame, content: &str, need_response: bool) {
        for player_id in self.player_ids() {
            if player_id != except {
                self.send_to(player_id, frame, content, need_response);
            }
        }
    }

    /// Reply echoing the request id; never recorded
    fn reply(&self, player_id: PlayerId, frame: ServerFrame, msg_id: MsgId, content: &str) {
        if let Some(player) = self.players.get(&player_id) {
            let message = ServerMessage::new(frame, msg_id, content);
            player.connection.send_line(&message.render());
        }
    }

    /// INFO notice to one player, used for rejected lines
    pub fn send_notice(&mut self, player_id: PlayerId, notice: &str) {
        self.send_to(player_id, ServerFrame::Info, notice, false);
    }

    // ---- admission ----

    /// Seat a new player if the phase and seat count allow it.
    ///
    /// In `StartingGame` every player is asked to acknowledge `START_GAME`
    /// again. In `StartingRound` only the joiner gets `START_ROUND` and the
    /// round barrier grows by one.
    pub fn try_admit(
        &mut self,
        sender: mpsc::UnboundedSender<String>,
        peer_addr: Option<SocketAddr>,
    ) -> Option<PlayerId> {
        if !self.admission_open() {
            return None;
        }

        self.last_player_id += 1;
        let player_id = self.last_player_id;
        let connection = Connection::new(player_id, sender, peer_addr);
        self.players.insert(player_id, Player::new(player_id, connection));
        info!(
            "PLAYER-{} joined from {:?}, {} seated",
            player_id,
            peer_addr,
            self.players.len()
        );

        self.send_to(
            player_id,
            ServerFrame::Info,
            &format!(
                "You joined the game now. Your name is PLAYER-{}. Please enjoy yourself.",
                player_id
            ),
            false,
        );
        let count = self.players.len();
        self.send_all(
            ServerFrame::Info,
            &format!("PLAYER-{} joined game. Current player number is {}.", player_id, count),
            false,
        );

        match self.phase {
            Phase::StartingGame => {
                self.ledger.clear();
                self.send_all(ServerFrame::StartGame, "", true);
            }
            _ => {
                self.barrier.add_party();
                let round = self.current_round.to_string();
                self.send_to(player_id, ServerFrame::StartRound, &round, true);
            }
        }
        Some(player_id)
    }

    // ---- inbound ----

    /// Apply one decoded command from `player_id`.
    ///
    /// A message-id mismatch is returned to the caller and leaves the
    /// session untouched.
    pub fn handle_command(&mut self, player_id: PlayerId, command: ClientCommand) -> std::result::Result<(), ProtocolError> {
        if !self.players.contains_key(&player_id) {
            debug!("Ignoring {} from unseated PLAYER-{}", command.name(), player_id);
            return Ok(());
        }

        match (self.phase, command) {
            (_, ClientCommand::PrintGameState { msg_id }) => {
                let content = format!("{} {}", self.state_string(), self.all_scores());
                self.reply(player_id, ServerFrame::GameState, msg_id, content.trim_end());
            }
            (Phase::StartingGame, ClientCommand::QuitGame { msg_id }) => {
                self.quit_before_start(player_id, msg_id);
            }
            (_, ClientCommand::QuitGame { msg_id }) => {
                self.current_round = self.max_round;
                self.reply(player_id, ServerFrame::Ack, msg_id, "OK! Changing to the last round.");
                self.send_others(
                    player_id,
                    ServerFrame::Info,
                    &format!(
                        "PLAYER-{} sent quit game request. Changing to the last round.",
                        player_id
                    ),
                    false,
                );
            }
            (Phase::StartingGame, ClientCommand::Ack { msg_id, .. }) => {
                self.ledger.match_response(player_id, msg_id)?;
                if self.ledger.is_empty() {
                    self.start_round();
                }
            }
            (Phase::StartingRound, ClientCommand::Ack { msg_id, .. }) => {
                self.ledger.match_response(player_id, msg_id)?;
                if self.ledger.is_empty() {
                    self.start_first_turn();
                }
            }
            (Phase::StartingTurn, ClientCommand::Ack { msg_id, .. }) => {
                self.ledger.match_response(player_id, msg_id)?;
                self.phase = Phase::Rolling;
                self.roll(player_id, [false; DICE_COUNT]);
            }
            (Phase::Rolling, ClientCommand::KeepDice { msg_id, keep }) => {
                self.ledger.match_response(player_id, msg_id)?;
                self.roll(player_id, keep);
            }
            (Phase::Scoring, ClientCommand::ScoreChoice { msg_id, category }) => {
                self.ledger.match_response(player_id, msg_id)?;
                self.choose_score(player_id, category);
            }
            (Phase::TurnOver, ClientCommand::Ack { msg_id, .. }) => {
                self.ledger.match_response(player_id, msg_id)?;
                self.finish_turn();
            }
            (Phase::RoundOver, ClientCommand::Ack { msg_id, .. }) => {
                self.ledger.match_response(player_id, msg_id)?;
                self.reach_checkpoint(player_id);
                if self.ledger.is_empty() {
                    self.complete_round();
                }
            }
            (Phase::GameOver, ClientCommand::Ack { msg_id, .. }) => {
                self.ledger.match_response(player_id, msg_id)?;
            }
            (phase, command) => {
                debug!("Rejecting {} from PLAYER-{} in {}", command.name(), player_id, phase);
                self.send_notice(player_id, REJECT_NOTICE);
            }
        }
        Ok(())
    }

    fn quit_before_start(&mut self, player_id: PlayerId, msg_id: MsgId) {
        info!("PLAYER-{} ended the game before it started", player_id);
        self.phase = Phase::GameOver;
        self.reply(player_id, ServerFrame::Ack, msg_id, "OK!");
        self.send_others(
            player_id,
            ServerFrame::Info,
            &format!("PLAYER-{} sent quit game request.", player_id),
            false,
        );
        let scores = self.all_scores();
        self.send_all(ServerFrame::GameOver, &scores, true);
    }

    fn arm_barrier(&mut self) {
        for player in self.players.values_mut() {
            player.reached_checkpoint = false;
        }
        self.barrier.arm(self.players.len());
    }

    fn reach_checkpoint(&mut self, player_id: PlayerId) {
        if let Some(player) = self.players.get_mut(&player_id) {
            if !player.reached_checkpoint {
                player.reached_checkpoint = true;
                self.barrier.release_one();
            }
        }
    }

    fn first_player(&self) -> Option<PlayerId> {
        self.players.keys().next().copied()
    }

    fn next_player_after(&self, player_id: PlayerId) -> Option<PlayerId> {
        self.players.range(player_id + 1..).next().map(|(id, _)| *id)
    }

    fn start_round(&mut self) {
        self.arm_barrier();
        self.phase = Phase::StartingRound;
        debug!("Starting round {}", self.current_round);
        let round = self.current_round.to_string();
        self.send_all(ServerFrame::StartRound, &round, true);
    }

    fn start_first_turn(&mut self) {
        let Some(first) = self.first_player() else {
            return;
        };
        self.current_player = first;
        self.acted_this_round = 1;
        self.start_turn();
    }

    fn start_turn(&mut self) {
        self.phase = Phase::StartingTurn;
        self.rolls_this_turn = 0;
        let actor = self.current_player;
        self.send_all(ServerFrame::Info, &format!("PLAYER-{} turns now.", actor), false);
        // the roll counter, 1 for the roll this acknowledgment triggers
        let roll = (self.rolls_this_turn + 1).to_string();
        self.send_to(actor, ServerFrame::StartTurn, &roll, true);
    }

    /// Roll the unkept dice, then either prompt for another roll or move to scoring
    fn roll(&mut self, player_id: PlayerId, keep: [bool; DICE_COUNT]) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        player.roll_kept(keep, &mut self.rng);
        let dice = player.dice().to_string();
        let possible = player.scorecard().possible_string();
        self.rolls_this_turn += 1;

        let thrown = format!("PLAYER-{} throws dice {}", player_id, dice);
        if self.rolls_this_turn < MAX_ROLLS_PER_TURN {
            self.send_to(player_id, ServerFrame::ChooseDice, &dice, true);
            self.send_others(player_id, ServerFrame::Info, &thrown, false);
        } else {
            self.phase = Phase::Scoring;
            self.send_to(player_id, ServerFrame::Info, &format!("FINAL_DICE {}", dice), false);
            self.send_others(player_id, ServerFrame::Info, &thrown, false);
            self.send_to(player_id, ServerFrame::ChooseScore, &possible, true);
        }
    }

    fn choose_score(&mut self, player_id: PlayerId, category: Category) {
        let Some(player) = self.players.get_mut(&player_id) else {
            return;
        };
        if !player.commit_score(category) {
            let possible = player.scorecard().possible_string();
            self.send_to(player_id, ServerFrame::ScoreChoiceInvalid, &possible, true);
            return;
        }

        let card = player.scorecard().to_string();
        self.send_to(player_id, ServerFrame::ScoreChoiceValid, &card, false);
        self.send_others(
            player_id,
            ServerFrame::Info,
            &format!("PLAYER-{} chooses score {}", player_id, card),
            false,
        );
        self.phase = Phase::TurnOver;
        self.send_to(player_id, ServerFrame::TurnOver, "", true);
    }

    /// Hand the turn to the next seated player, or close the round
    fn finish_turn(&mut self) {
        if self.is_round_over() {
            self.phase = Phase::RoundOver;
            let round = self.current_round.to_string();
            self.send_all(ServerFrame::RoundOver, &round, true);
            return;
        }
        // A round that is not over always has a next player
        if let Some(next) = self.next_player_after(self.current_player) {
            self.current_player = next;
            self.acted_this_round += 1;
            self.start_turn();
        }
    }

    fn complete_round(&mut self) {
        if self.is_game_over() {
            info!("Game over after round {}", self.current_round);
            self.phase = Phase::GameOver;
            let scores = self.all_scores();
            self.send_all(ServerFrame::GameOver, &scores, true);
            return;
        }

        self.current_round += 1;
        self.current_player = self.first_player().unwrap_or(self.current_player);
        self.acted_this_round = 1;
        self.rolls_this_turn = 0;
        self.arm_barrier();
        self.phase = Phase::StartingRound;
        let scores = self.all_scores();
        self.send_all(ServerFrame::Info, &scores, false);
        let round = self.current_round.to_string();
        self.send_all(ServerFrame::StartRound, &round, true);
    }

    // ---- departure ----

    /// Remove `player_id` after its connection closed.
    ///
    /// The last player leaving resets the session. Otherwise the leaver's
    /// pending entries are purged, its barrier count is released and the
    /// game carries on without it.
    pub fn player_quit(&mut self, player_id: PlayerId) {
        if !self.players.contains_key(&player_id) {
            return;
        }

        if self.phase == Phase::StartingGame {
            self.remove_player(player_id);
            if self.players.is_empty() {
                self.reset();
                return;
            }
            self.announce_departure(player_id);
            self.ledger.clear();
            self.send_all(ServerFrame::StartGame, "", true);
            self.barrier.drain();
            return;
        }

        if self.players.len() == 1 {
            info!("PLAYER-{} was the last player, restarting the game service", player_id);
            self.reset();
            return;
        }

        let phase = self.phase;
        let was_actor = phase.is_turn_phase() && player_id == self.current_player;
        if phase.is_turn_phase() && player_id <= self.current_player {
            self.acted_this_round = self.acted_this_round.saturating_sub(1);
        }
        self.remove_player(player_id);
        if phase == Phase::GameOver {
            return;
        }
        self.announce_departure(player_id);

        match phase {
            Phase::StartingRound if self.ledger.is_empty() => self.start_first_turn(),
            Phase::RoundOver if self.ledger.is_empty() => self.complete_round(),
            _ if was_actor => self.finish_turn(),
            _ => {}
        }
    }

    fn remove_player(&mut self, player_id: PlayerId) {
        let Some(player) = self.players.remove(&player_id) else {
            return;
        };
        let purged = self.ledger.purge(player_id);
        if !player.reached_checkpoint {
            self.barrier.release_one();
        }
        info!(
            "PLAYER-{} left after {:?}, {} pending purged, {} seated",
            player_id,
            player.connection.connection_duration(),
            purged,
            self.players.len()
        );
    }

    fn announce_departure(&mut self, player_id: PlayerId) {
        let count = self.players.len();
        self.send_all(
            ServerFrame::Info,
            &format!("PLAYER-{} quit the game. Current player number is {}.", player_id, count),
            false,
        );
    }

    /// Back to an empty `StartingGame`. Player ids keep counting up.
    pub fn reset(&mut self) {
        info!("Resetting game session");
        self.phase = Phase::StartingGame;
        self.next_msg_id = 1;
        self.current_round = 1;
        self.current_player = 1;
        self.acted_this_round = 1;
        self.rolls_this_turn = 0;
        self.players.clear();
        self.ledger.clear();
        self.barrier.drain();
    }
}

/// Thread-safe session wrapper
pub type SharedSession = Arc<Mutex<GameSession>>;

pub fn create_session(config: &ServerConfig) -> SharedSession {
    Arc::new(Mutex::new(GameSession::from_config(config)))
}

/// Lock the session, mapping a poisoned mutex to a crate error
pub fn lock_session(session: &SharedSession) -> Result<MutexGuard<'_, GameSession>> {
    Ok(session.lock()?)
}
