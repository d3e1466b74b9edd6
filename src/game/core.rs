// A game session is a board plus the two seats playing on it, the turn order
// and everything needed to decide when and how the game ends.
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use strum_macros::{Display, EnumString};
use uuid::Uuid;

use crate::game::board::{Board, BoardError, BoardSize, CaptureSet, Color, Point, PointTotals};

#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[strum(serialize_all = "SCREAMING_SNAKE_CASE")]
pub enum GameState {
    Invitation,
    InProgress,
    Complete,
}

/// How points are counted once both players pass
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize, Display, EnumString,
)]
#[serde(rename_all = "lowercase")]
#[strum(serialize_all = "lowercase", ascii_case_insensitive)]
pub enum ScoringRule {
    /// Stones plus surrounded territory
    #[default]
    Area,
    /// Stones on the board only
    Stones,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Ruleset {
    pub scoring: ScoringRule,
    /// Compensation points credited to White
    pub komi: i32,
}

impl Ruleset {
    /// Komi may not exceed the number of intersections on the board
    pub fn komi_fits(&self, board_size: BoardSize) -> bool {
        self.komi.unsigned_abs() as usize <= board_size.dimension().pow(2)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Seat {
    pub player_id: String,
    pub color: Color,
    pub ready: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum MoveAction {
    Place { x: i32, y: i32 },
    Pass,
    Resign,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MoveRecord {
    pub seat: usize,
    pub color: Color,
    pub action: MoveAction,
    pub captures: CaptureSet,
    pub played_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "SCREAMING_SNAKE_CASE")]
pub enum GameOutcome {
    Winner { seat: usize },
    Draw,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct FinalScore {
    /// Points for seat 0 minus points for seat 1. Zero after a resignation,
    /// where `totals` only records the position the game ended in.
    pub score: i32,
    pub totals: PointTotals,
    pub outcome: GameOutcome,
    pub by_resignation: bool,
}

/// What a successful move, pass or resignation did to the session
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveOutcome {
    pub move_number: usize,
    pub action: MoveAction,
    pub captures: CaptureSet,
    pub state: GameState,
    pub current_turn: usize,
    pub consecutive_passes: u8,
    pub result: Option<FinalScore>,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SessionError {
    #[error("It is not seat {seat}'s turn")]
    NotYourTurn { seat: usize },
    #[error("Game is not active (state: {state})")]
    GameNotActive { state: GameState },
    #[error("Seat {0} does not exist")]
    InvalidSeat(usize),
    #[error("Seat {0} has already confirmed")]
    AlreadyConfirmed(usize),
    #[error(transparent)]
    Board(#[from] BoardError),
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GameSession {
    id: String,
    seats: [Seat; 2],
    state: GameState,
    current_turn: usize, // Index of the seat that moves next
    consecutive_passes: u8,
    board: Board,
    history: Vec<MoveRecord>,
    ruleset: Ruleset,
    result: Option<FinalScore>,
    version: i64,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl GameSession {
    /// Creates a session in the INVITATION state. Seat 0 plays Black.
    pub fn new(board_size: BoardSize, player_ids: [String; 2], ruleset: Ruleset) -> Self {
        let [black, white] = player_ids;
        let now = Utc::now();

        let session = Self {
            id: Uuid::new_v4().to_string(),
            seats: [
                Seat {
                    player_id: black,
                    color: Color::Black,
                    ready: false,
                },
                Seat {
                    player_id: white,
                    color: Color::White,
                    ready: false,
                },
            ],
            state: GameState::Invitation,
            current_turn: 0,
            consecutive_passes: 0,
            board: Board::new(board_size),
            history: Vec::new(),
            ruleset,
            result: None,
            version: 0,
            created_at: now,
            updated_at: now,
        };
        session.assert_invariants();
        session
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn seats(&self) -> &[Seat; 2] {
        &self.seats
    }

    pub fn seat_for_player(&self, player_id: &str) -> Option<usize> {
        self.seats.iter().position(|s| s.player_id == player_id)
    }

    pub fn state(&self) -> GameState {
        self.state
    }

    pub fn current_turn(&self) -> usize {
        self.current_turn
    }

    pub fn consecutive_passes(&self) -> u8 {
        self.consecutive_passes
    }

    pub fn board(&self) -> &Board {
        &self.board
    }

    pub fn board_size(&self) -> BoardSize {
        self.board.size()
    }

    pub fn history(&self) -> &[MoveRecord] {
        &self.history
    }

    pub fn ruleset(&self) -> Ruleset {
        self.ruleset
    }

    pub fn result(&self) -> Option<&FinalScore> {
        self.result.as_ref()
    }

    pub fn version(&self) -> i64 {
        self.version
    }

    pub fn created_at(&self) -> DateTime<Utc> {
        self.created_at
    }

    pub fn updated_at(&self) -> DateTime<Utc> {
        self.updated_at
    }

    /// Marks a seat as ready. Once both seats are ready the game starts.
    pub fn confirm_seat(&mut self, seat: usize) -> Result<GameState, SessionError> {
        if self.state != GameState::Invitation {
            return Err(SessionError::GameNotActive { state: self.state });
        }
        let entry = self
            .seats
            .get_mut(seat)
            .ok_or(SessionError::InvalidSeat(seat))?;
        if entry.ready {
            return Err(SessionError::AlreadyConfirmed(seat));
        }
        entry.ready = true;

        if self.seats.iter().all(|s| s.ready) {
            self.begin();
        }

        self.assert_invariants();
        Ok(self.state)
    }

    /// Skips the confirmation step and starts the game immediately
    pub fn start(&mut self) -> Result<(), SessionError> {
        if self.state != GameState::Invitation {
            return Err(SessionError::GameNotActive { state: self.state });
        }
        for seat in self.seats.iter_mut() {
            seat.ready = true;
        }
        self.begin();
        self.assert_invariants();
        Ok(())
    }

    pub fn apply_move(&mut self, seat: usize, point: Point) -> Result<MoveOutcome, SessionError> {
        self.check_turn(seat)?;

        let color = self.seats[seat].color;
        let captures = self.board.place(color, point)?;

        self.consecutive_passes = 0;
        Ok(self.record(
            seat,
            MoveAction::Place {
                x: point.x,
                y: point.y,
            },
            captures,
        ))
    }

    pub fn apply_pass(&mut self, seat: usize) -> Result<MoveOutcome, SessionError> {
        self.check_turn(seat)?;

        self.consecutive_passes += 1;
        if self.consecutive_passes == 2 {
            self.state = GameState::Complete;
            self.result = Some(self.score());
        }

        Ok(self.record(seat, MoveAction::Pass, Vec::new()))
    }

    /// Ends the game in favour of the other seat. Allowed out of turn.
    pub fn resign(&mut self, seat: usize) -> Result<MoveOutcome, SessionError> {
        if self.state != GameState::InProgress {
            return Err(SessionError::GameNotActive { state: self.state });
        }
        if seat >= self.seats.len() {
            return Err(SessionError::InvalidSeat(seat));
        }

        let winner = 1 - seat;
        self.state = GameState::Complete;
        self.result = Some(FinalScore {
            score: 0,
            totals: self.totals(),
            outcome: GameOutcome::Winner { seat: winner },
            by_resignation: true,
        });

        let color = self.seats[seat].color;
        let move_number = self.push_history(seat, color, MoveAction::Resign, Vec::new());
        self.assert_invariants();
        Ok(self.outcome(move_number))
    }

    /// Scores the current position with the session's ruleset
    pub fn score(&self) -> FinalScore {
        let totals = self.totals();
        let score = self.seat_difference(&totals);
        let outcome = match score {
            s if s > 0 => GameOutcome::Winner { seat: 0 },
            s if s < 0 => GameOutcome::Winner { seat: 1 },
            _ => GameOutcome::Draw,
        };

        FinalScore {
            score,
            totals,
            outcome,
            by_resignation: false,
        }
    }

    /// Called by the service right before persisting a mutation
    pub(crate) fn mark_updated(&mut self) {
        self.version += 1;
        self.updated_at = Utc::now();
    }

    fn begin(&mut self) {
        self.state = GameState::InProgress;
        self.current_turn = self
            .seats
            .iter()
            .position(|s| s.color == Color::Black)
            .unwrap_or(0);
    }

    fn check_turn(&self, seat: usize) -> Result<(), SessionError> {
        if self.state != GameState::InProgress {
            return Err(SessionError::GameNotActive { state: self.state });
        }
        if seat >= self.seats.len() {
            return Err(SessionError::InvalidSeat(seat));
        }
        if seat != self.current_turn {
            return Err(SessionError::NotYourTurn { seat });
        }
        Ok(())
    }

    fn record(&mut self, seat: usize, action: MoveAction, captures: CaptureSet) -> MoveOutcome {
        let color = self.seats[seat].color;
        let move_number = self.push_history(seat, color, action, captures);
        self.current_turn = 1 - self.current_turn;
        self.assert_invariants();
        self.outcome(move_number)
    }

    fn push_history(
        &mut self,
        seat: usize,
        color: Color,
        action: MoveAction,
        captures: CaptureSet,
    ) -> usize {
        self.history.push(MoveRecord {
            seat,
            color,
            action,
            captures,
            played_at: Utc::now(),
        });
        self.history.len()
    }

    fn outcome(&self, move_number: usize) -> MoveOutcome {
        let last = &self.history[move_number - 1];
        MoveOutcome {
            move_number,
            action: last.action.clone(),
            captures: last.captures.clone(),
            state: self.state,
            current_turn: self.current_turn,
            consecutive_passes: self.consecutive_passes,
            result: self.result,
        }
    }

    fn totals(&self) -> PointTotals {
        let mut totals = match self.ruleset.scoring {
            ScoringRule::Area => self.board.area_score(),
            ScoringRule::Stones => self.board.stone_score(),
        };
        totals.white = totals.white.saturating_add(self.ruleset.komi);
        totals
    }

    fn seat_difference(&self, totals: &PointTotals) -> i32 {
        totals
            .for_color(self.seats[0].color)
            .saturating_sub(totals.for_color(self.seats[1].color))
    }

    fn assert_invariants(&self) {
        assert!(
            self.consecutive_passes <= 2,
            "session {} has {} consecutive passes",
            self.id,
            self.consecutive_passes
        );
        assert!(
            self.current_turn < self.seats.len(),
            "session {} has turn index {}",
            self.id,
            self.current_turn
        );
        assert_ne!(
            self.seats[0].color, self.seats[1].color,
            "session {} seats share a color",
            self.id
        );
        assert_eq!(
            self.state == GameState::Complete,
            self.result.is_some(),
            "session {} result does not match state {}",
            self.id,
            self.state
        );
    }
}
