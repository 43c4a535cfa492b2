use std::fmt::Display;

use serde::{Deserialize, Serialize};

/// Action recorded in `subscription_history` and carried by outbox intents.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum SubscriptionAction {
    Cancelled,
}

impl SubscriptionAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            SubscriptionAction::Cancelled => "Cancelled",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value {
            "Cancelled" => Some(SubscriptionAction::Cancelled),
            _ => None,
        }
    }
}

impl Display for SubscriptionAction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
