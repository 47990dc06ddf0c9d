use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};

/// Monotonic logical timestamp, as reported by the message-stream system.
///
/// Opaque to the coordinator beyond ordering: it is stored and compared,
/// never decomposed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Timestamp(u64);

impl Timestamp {
    pub const ZERO: Timestamp = Timestamp(0);

    pub fn new(value: u64) -> Self {
        Self(value)
    }

    pub fn as_u64(&self) -> u64 {
        self.0
    }
}

impl Display for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<u64> for Timestamp {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

impl From<Timestamp> for u64 {
    fn from(ts: Timestamp) -> Self {
        ts.0
    }
}

/// A checkpoint position on a channel: the message ID a consumer must
/// resume from, paired with the logical time of that message.
///
/// Opaque beyond comparison and persistence — the coordinator never
/// interprets `message_id`, only forwards it between the broker, the
/// target manager, and worker watch requests.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MsgPosition {
    channel_name: String,
    message_id: Vec<u8>,
    timestamp: Timestamp,
}

impl MsgPosition {
    pub fn new(channel_name: impl Into<String>, message_id: Vec<u8>, timestamp: Timestamp) -> Self {
        Self {
            channel_name: channel_name.into(),
            message_id,
            timestamp,
        }
    }

    pub fn channel_name(&self) -> &str {
        &self.channel_name
    }

    pub fn message_id(&self) -> &[u8] {
        &self.message_id
    }

    pub fn timestamp(&self) -> Timestamp {
        self.timestamp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn timestamp_ordering_is_numeric() {
        assert!(Timestamp::new(5) < Timestamp::new(10));
        assert_eq!(Timestamp::ZERO.as_u64(), 0);
    }

    #[test]
    fn position_roundtrips_through_json() {
        let pos = MsgPosition::new("dmc0", vec![1, 2, 3], Timestamp::new(42));
        let json = serde_json::to_string(&pos).unwrap();
        let back: MsgPosition = serde_json::from_str(&json).unwrap();
        assert_eq!(pos, back);
    }
}
