use serde::{Deserialize, Serialize};
use strum::Display;

use super::record::Severity;

/// Follow-up tier attached to a severity prediction
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, Display)]
#[serde(rename_all = "snake_case")]
pub enum AdvisoryTier {
    /// Fatal outcome predicted
    #[strum(serialize = "high_priority_alert")]
    HighPriorityAlert,
    /// Serious outcome predicted
    #[strum(serialize = "advisory")]
    Advisory,
    /// Minor outcome predicted
    #[strum(serialize = "routine")]
    Routine,
}

impl AdvisoryTier {
    pub fn for_severity(severity: Severity) -> Self {
        match severity {
            Severity::Fatal => AdvisoryTier::HighPriorityAlert,
            Severity::Serious => AdvisoryTier::Advisory,
            Severity::Minor => AdvisoryTier::Routine,
        }
    }

    pub fn message(&self) -> &'static str {
        match self {
            AdvisoryTier::HighPriorityAlert => {
                "High-priority alert: conditions indicate a likely fatal outcome"
            }
            AdvisoryTier::Advisory => "Advisory: conditions indicate a likely serious outcome",
            AdvisoryTier::Routine => "Routine: conditions indicate a likely minor outcome",
        }
    }
}
