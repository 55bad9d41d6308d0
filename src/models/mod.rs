pub mod candle;
pub mod direction;
pub mod timeframe;

pub use candle::{Candle, CandleSeries, CandleWindow};
pub use direction::*;
pub use timeframe::Granularity;
