use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::models::activity_log::ActivityType;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViolationType {
    Behavior,
    Visibility,
    Clipboard,
}

impl ViolationType {
    pub fn activity_type(&self) -> ActivityType {
        match self {
            ViolationType::Behavior => ActivityType::AiWarning,
            ViolationType::Visibility => ActivityType::TabSwitch,
            ViolationType::Clipboard => ActivityType::CopyPaste,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Violation {
    #[serde(rename = "type")]
    pub violation_type: ViolationType,
    pub reason: String,
    pub timestamp: DateTime<Utc>,
}
