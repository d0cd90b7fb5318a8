//! Dice, score categories and player records used by the session.

pub mod category;
pub mod dice;
pub mod player;
pub mod scorecard;

pub use category::Category;
pub use dice::Dice;
pub use player::Player;
pub use scorecard::ScoreCard;
