use rand::Rng;

use crate::constants::DICE_COUNT;
use crate::core::connection::Connection;
use crate::core::message_types::PlayerId;
use crate::game::category::Category;
use crate::game::dice::Dice;
use crate::game::scorecard::ScoreCard;

/// A seated player: output channel, dice and scorecard
#[derive(Debug)]
pub struct Player {
    pub id: PlayerId,
    pub connection: Connection,
    dice: Dice,
    scorecard: ScoreCard,
    /// Set once the player has reached this round's boundary
    pub(crate) reached_checkpoint: bool,
}

impl Player {
    pub fn new(id: PlayerId, connection: Connection) -> Self {
        Self {
            id,
            connection,
            dice: Dice::default(),
            scorecard: ScoreCard::new(),
            reached_checkpoint: false,
        }
    }

    pub fn name(&self) -> String {
        format!("PLAYER-{}", self.id)
    }

    pub fn dice(&self) -> &Dice {
        &self.dice
    }

    pub fn scorecard(&self) -> &ScoreCard {
        &self.scorecard
    }

    /// Re-roll the unkept dice and refresh the possible scores
    pub fn roll_kept<R: Rng + ?Sized>(&mut self, keep: [bool; DICE_COUNT], rng: &mut R) {
        self.dice.roll_kept(keep, rng);
        self.scorecard.calculate_possible(&self.dice);
    }

    /// Force the dice faces, used by tests and replays
    pub fn set_dice(&mut self, dice: Dice) {
        self.dice = dice;
        self.scorecard.calculate_possible(&self.dice);
    }

    pub fn possible_scores(&self) -> [u32; 13] {
        self.scorecard.possible_scores()
    }

    pub fn commit_score(&mut self, category: Category) -> bool {
        self.scorecard.commit(category)
    }

    pub fn total_score(&self) -> u32 {
        self.scorecard.total()
    }
}
