use serde::{Deserialize, Serialize};

/// Limits and feature flags attached to a plan. Stored as JSONB in the database.
#[derive(Debug, Clone, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PlanFeatures {
    #[serde(default)]
    pub max_enrolled_courses: Option<i32>,

    #[serde(default)]
    pub certificates: Option<bool>,

    #[serde(default)]
    pub offline_downloads: Option<bool>,

    #[serde(default)]
    pub priority_support: Option<bool>,
}

impl PlanFeatures {
    /// `None` means unlimited enrollment.
    pub fn max_enrolled_courses(&self) -> Option<i32> {
        self.max_enrolled_courses.filter(|limit| *limit > 0)
    }

    pub fn has_certificates(&self) -> bool {
        self.certificates.unwrap_or(false)
    }

    pub fn has_offline_downloads(&self) -> bool {
        self.offline_downloads.unwrap_or(false)
    }

    pub fn has_priority_support(&self) -> bool {
        self.priority_support.unwrap_or(false)
    }
}
