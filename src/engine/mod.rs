pub mod pipeline;
pub mod state;

pub use pipeline::{Engine, TickOutcome};
pub use state::{EngineState, InstrumentState};
