pub mod indicators;
pub mod levels;
pub mod risk;
