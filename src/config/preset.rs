//! Named commission-plan presets.

use serde::{Deserialize, Serialize};

use crate::commission::CommissionPlan;
use crate::graph::traversal::MAX_REFERRAL_DEPTH;

/// Built-in rate schedules selectable by name in config and on the CLI.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanName {
    /// Front-loaded: 10% / 5% / 3%, then 1% to level 10 and 0.1% down to
    /// level 120. Totals 36% of the purchase price.
    #[default]
    Standard,
    /// 0.5% at every level down to 120. Totals 60%.
    Flat,
    /// 15% / 10% / 5%, levels 1-3 only. Totals 30%.
    Shallow,
}

impl PlanName {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Standard => "standard",
            Self::Flat => "flat",
            Self::Shallow => "shallow",
        }
    }

    pub fn from_str_loose(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "standard" => Some(Self::Standard),
            "flat" => Some(Self::Flat),
            "shallow" => Some(Self::Shallow),
            _ => None,
        }
    }

    /// The preset's rate schedule.
    pub fn schedule(&self) -> CommissionPlan {
        let depth = MAX_REFERRAL_DEPTH as usize;
        match self {
            Self::Standard => {
                let mut levels = vec![1000, 500, 300];
                levels.extend(std::iter::repeat(100).take(7));
                levels.extend(std::iter::repeat(10).take(depth - 10));
                CommissionPlan::new(levels)
            }
            Self::Flat => CommissionPlan::new(vec![50; depth]),
            Self::Shallow => CommissionPlan::new(vec![1500, 1000, 500]),
        }
    }
}

impl std::fmt::Display for PlanName {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
