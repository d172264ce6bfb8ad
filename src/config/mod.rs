//! Configuration: YAML-loaded engine settings and commission plan presets.

pub mod preset;
pub mod schema;

pub use preset::PlanName;
pub use schema::{ReftreeConfig, TierDepths};
