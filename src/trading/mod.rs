pub mod position_tracker;

pub use position_tracker::{Position, PositionEvent, PositionSlot, PositionTracker};
