//! Shared score record and its persistence.

mod board;
pub mod score;

pub use board::{ScoreBoard, ScoreFiles};
pub use score::ScoreState;
