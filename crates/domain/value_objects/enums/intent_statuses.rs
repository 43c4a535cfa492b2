use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Lifecycle of a subscription intent:
/// `pending` (written) -> `applied` (local state finalized) -> `completed` | `gateway_failed`.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum IntentStatus {
    Pending,
    Applied,
    Completed,
    GatewayFailed,
}

impl IntentStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            IntentStatus::Pending => "pending",
            IntentStatus::Applied => "applied",
            IntentStatus::Completed => "completed",
            IntentStatus::GatewayFailed => "gateway_failed",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(IntentStatus::Pending),
            "applied" => Some(IntentStatus::Applied),
            "completed" => Some(IntentStatus::Completed),
            "gateway_failed" => Some(IntentStatus::GatewayFailed),
            _ => None,
        }
    }
}

impl Display for IntentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
