//! Scorecard arithmetic. Each category is a pure function of the dice.

use std::fmt;

use crate::game::category::Category;
use crate::game::dice::Dice;

const FULL_HOUSE_SCORE: u32 = 25;
const SMALL_STRAIGHT_SCORE: u32 = 30;
const LARGE_STRAIGHT_SCORE: u32 = 40;
const YAHTZEE_SCORE: u32 = 50;

/// Points `dice` would earn in `category`
pub fn score(category: Category, dice: &Dice) -> u32 {
    let counts = dice.face_counts();
    let has_run = |start: usize, len: usize| counts[start..start + len].iter().all(|&c| c > 0);

    match category {
        Category::Aces
        | Category::Twos
        | Category::Threes
        | Category::Fours
        | Category::Fives
        | Category::Sixes => {
            let face = category.index() as u8 + 1;
            dice.count_of(face) as u32 * u32::from(face)
        }
        Category::ThreeOfKind if counts.iter().any(|&c| c >= 3) => dice.sum(),
        Category::FourOfKind if counts.iter().any(|&c| c >= 4) => dice.sum(),
        Category::FullHouse if counts.contains(&3) && counts.contains(&2) => FULL_HOUSE_SCORE,
        Category::SmallStraight if (0..3).any(|start| has_run(start, 4)) => SMALL_STRAIGHT_SCORE,
        Category::LargeStraight if (0..2).any(|start| has_run(start, 5)) => LARGE_STRAIGHT_SCORE,
        Category::Yahtzee if counts.contains(&5) => YAHTZEE_SCORE,
        Category::Chance => dice.sum(),
        _ => 0,
    }
}

#[derive(Debug, Clone, Default)]
pub struct ScoreCard {
    scores: [Option<u32>; 13],
    possible: [u32; 13],
}

impl ScoreCard {
    pub fn new() -> Self {
        Self::default()
    }

    /// Recompute the possible-score table for fresh dice
    pub fn calculate_possible(&mut self, dice: &Dice) {
        for category in Category::ALL {
            self.possible[category.index()] = score(category, dice);
        }
    }

    pub fn possible_scores(&self) -> [u32; 13] {
        self.possible
    }

    pub fn score_of(&self, category: Category) -> Option<u32> {
        self.scores[category.index()]
    }

    /// Commit the possible score for `category`. Returns false if the slot
    /// was already used.
    pub fn commit(&mut self, category: Category) -> bool {
        let slot = &mut self.scores[category.index()];
        if slot.is_some() {
            return false;
        }
        *slot = Some(self.possible[category.index()]);
        true
    }

    pub fn total(&self) -> u32 {
        self.scores.iter().flatten().sum()
    }

    pub fn is_complete(&self) -> bool {
        self.scores.iter().all(Option::is_some)
    }

    /// "Aces: 3 Twos: UNAVAILABLE ..." for the CHOOSE_SCORE prompt
    pub fn possible_string(&self) -> String {
        Category::ALL
            .iter()
            .map(|&c| match self.score_of(c) {
                Some(_) => format!("{}: UNAVAILABLE", c),
                None => format!("{}: {}", c, self.possible[c.index()]),
            })
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl fmt::Display for ScoreCard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for category in Category::ALL {
            match self.score_of(category) {
                Some(points) => write!(f, "{}: {} ", category, points)?,
                None => write!(f, "{}: - ", category)?,
            }
        }
        write!(f, "Total: {}", self.total())
    }
}
