pub mod match_state;
pub mod level;
