//! Round-robin cursor. Persisted as a plain string, handled internally as the
//! id of the last item handed out.

use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SelectionCursor {
    pub last_id: i64,
}

impl SelectionCursor {
    pub fn new(last_id: i64) -> Self {
        Self { last_id }
    }

    /// Unparseable tokens restart the rotation from the beginning.
    pub fn decode(raw: Option<&str>) -> Option<Self> {
        let raw = raw?.trim();
        if raw.is_empty() {
            return None;
        }
        match raw.parse::<i64>() {
            Ok(last_id) => Some(Self { last_id }),
            Err(_) => {
                warn!("Ignoring malformed selection cursor {raw:?}");
                None
            }
        }
    }

    pub fn encode(&self) -> String {
        self.last_id.to_string()
    }
}
