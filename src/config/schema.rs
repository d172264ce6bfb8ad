//! Engine configuration, loaded from YAML with serde defaults.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::commission::{CommissionPlan, BPS_DENOM};
use crate::config::preset::PlanName;
use crate::error::{ReftreeError, Result};
use crate::graph::traversal::MAX_REFERRAL_DEPTH;
use crate::types::PackageTier;

/// Environment variable overriding the configured database path.
pub const DB_PATH_ENV: &str = "REFTREE_DB";

// ---------------------------------------------------------------------------
// TierDepths
// ---------------------------------------------------------------------------

/// How deep in their downline a member may earn from, per owned package
/// tier. A member's best tier determines their earning depth.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct TierDepths {
    pub starter: u32,
    pub silver: u32,
    pub gold: u32,
    #[serde(rename = "super")]
    pub super_: u32,
}

impl Default for TierDepths {
    fn default() -> Self {
        Self {
            starter: 10,
            silver: 30,
            gold: 60,
            super_: MAX_REFERRAL_DEPTH,
        }
    }
}

impl TierDepths {
    /// Earning depth for a tier, clamped to [`MAX_REFERRAL_DEPTH`].
    pub fn depth_for(&self, tier: PackageTier) -> u32 {
        let depth = match tier {
            PackageTier::Starter => self.starter,
            PackageTier::Silver => self.silver,
            PackageTier::Gold => self.gold,
            PackageTier::Super => self.super_,
        };
        depth.min(MAX_REFERRAL_DEPTH)
    }
}

// ---------------------------------------------------------------------------
// ReftreeConfig
// ---------------------------------------------------------------------------

/// Top-level configuration.
///
/// Every field has a default so an empty YAML file (or no file at all)
/// yields a working engine. The `REFTREE_DB` environment variable
/// overrides `db_path` after loading.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ReftreeConfig {
    pub db_path: PathBuf,
    /// Traversal depth bound; values above 120 are clamped on validate.
    pub max_depth: u32,
    /// Tax withheld at source on payouts, in basis points of gross.
    pub tds_bps: u32,
    /// Named rate-schedule preset; ignored when `level_bps` is set.
    pub plan: PlanName,
    /// Explicit per-level schedule overriding the preset.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level_bps: Option<Vec<u32>>,
    pub tier_depths: TierDepths,
}

impl Default for ReftreeConfig {
    fn default() -> Self {
        Self {
            db_path: default_db_path(),
            max_depth: MAX_REFERRAL_DEPTH,
            tds_bps: 500,
            plan: PlanName::Standard,
            level_bps: None,
            tier_depths: TierDepths::default(),
        }
    }
}

fn default_db_path() -> PathBuf {
    directories::ProjectDirs::from("", "", "reftree")
        .map(|dirs| dirs.data_dir().join("reftree.db"))
        .unwrap_or_else(|| PathBuf::from("reftree.db"))
}

impl ReftreeConfig {
    /// Load from a YAML file, or defaults when `path` is `None`. The
    /// `REFTREE_DB` environment variable, when set, wins over both.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let mut config = match path {
            Some(p) => {
                let raw = std::fs::read_to_string(p)?;
                serde_yaml::from_str(&raw)?
            }
            None => Self::default(),
        };
        if let Ok(db) = std::env::var(DB_PATH_ENV) {
            if !db.is_empty() {
                config.db_path = PathBuf::from(db);
            }
        }
        config.validate()?;
        Ok(config)
    }

    /// Clamp the depth bound and check the rate fields.
    pub fn validate(&mut self) -> Result<()> {
        if self.max_depth == 0 {
            return Err(ReftreeError::Config("max_depth must be at least 1".to_string()));
        }
        self.max_depth = self.max_depth.min(MAX_REFERRAL_DEPTH);
        if self.tds_bps as i64 > BPS_DENOM {
            return Err(ReftreeError::Config(format!(
                "tds_bps {} exceeds {BPS_DENOM}",
                self.tds_bps
            )));
        }
        self.resolve_plan().validate()
    }

    /// The effective commission plan: the explicit schedule when given,
    /// the named preset otherwise.
    pub fn resolve_plan(&self) -> CommissionPlan {
        match &self.level_bps {
            Some(levels) => CommissionPlan::new(levels.clone()),
            None => self.plan.schedule(),
        }
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
