pub mod dedup;
pub mod messages;
pub mod sink;

pub use dedup::{AlertCandidate, AlertKey, AlertKind, Deduper};
pub use messages::InstrumentView;
pub use sink::{AlertSink, LogSink, TelegramSink};

use serde::Serialize;
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NotificationKind {
    Startup,
    WeakSignal,
    StrongSignal,
    TakeProfit1,
    TakeProfit2,
    StopHit,
    Digest,
}

impl fmt::Display for NotificationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            NotificationKind::Startup => "startup",
            NotificationKind::WeakSignal => "weak_signal",
            NotificationKind::StrongSignal => "strong_signal",
            NotificationKind::TakeProfit1 => "tp1",
            NotificationKind::TakeProfit2 => "tp2",
            NotificationKind::StopHit => "stop",
            NotificationKind::Digest => "digest",
        };
        f.write_str(s)
    }
}

/// A rendered message ready for an [`AlertSink`].
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    pub kind: NotificationKind,
    pub instrument: Option<String>,
    pub text: String,
}

impl Notification {
    pub fn new(kind: NotificationKind, instrument: Option<&str>, text: String) -> Self {
        Self {
            kind,
            instrument: instrument.map(str::to_string),
            text,
        }
    }
}
