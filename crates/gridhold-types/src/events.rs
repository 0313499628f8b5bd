use serde::{Deserialize, Serialize};

/// What happened to the base-point table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PointAction {
    Joined,
    Saved,
    Deleted,
    Reset,
    Cleanup,
    AccountDeleted,
}

/// Events pushed to `/api/events` subscribers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data", rename_all_fields = "camelCase")]
pub enum MapEvent {
    /// First frame on every stream
    Hello { client_id: String, clients: usize },

    /// Base points were created or removed; clients should refetch
    BasePointsChanged {
        action: PointAction,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        user_id: Option<String>,
        count: usize,
    },
}

impl MapEvent {
    /// SSE event name for this variant.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hello { .. } => "hello",
            Self::BasePointsChanged { .. } => "base_points_changed",
        }
    }
}
