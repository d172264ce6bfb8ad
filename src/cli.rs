//! Command-line surface.
//!
//! Thin wrappers over the library: each subcommand opens the store, runs
//! one operation, and prints the result as JSON.

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use serde_json::json;
use tracing::info;

use crate::commission::CommissionEngine;
use crate::config::ReftreeConfig;
use crate::error::{ReftreeError, Result};
use crate::graph::{Aggregator, Categorizer, ReferralStore, TreeWalker};
use crate::id::referral_code;
use crate::observability::Metrics;
use crate::types::{KycStatus, Member, Package, PackageTier, Window};
use crate::wallet::Wallet;

#[derive(Parser)]
#[command(name = "reftree", version, about = "Referral-tree commission engine")]
pub struct Cli {
    /// Path to a YAML config file.
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Database path, overriding config and REFTREE_DB.
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Subcommand)]
pub enum Command {
    /// Create the database and apply the schema.
    Init,

    /// Register a member, optionally under a sponsor.
    AddMember {
        name: String,
        #[arg(long)]
        email: Option<String>,
        /// Referral code of the sponsor.
        #[arg(long)]
        sponsor: Option<String>,
    },

    /// Link (or re-link) a member under a sponsor.
    SetSponsor { member: String, sponsor: String },

    /// Set a member's KYC status.
    Kyc {
        member: String,
        #[arg(value_parser = parse_kyc)]
        status: KycStatus,
    },

    /// Create or update a package.
    AddPackage {
        id: String,
        name: String,
        #[arg(value_parser = parse_tier)]
        tier: PackageTier,
        price_cents: i64,
        #[arg(long)]
        inactive: bool,
    },

    /// Record a purchase and distribute commissions to the upline.
    Buy {
        member: String,
        package: String,
        /// Record only; skip commission distribution.
        #[arg(long)]
        no_distribute: bool,
    },

    /// Distribute commissions for an already-recorded purchase.
    Distribute { purchase_id: i64 },

    /// List a member's downline with depth annotations.
    Downline {
        member: String,
        /// Levels to walk; defaults to the configured bound.
        #[arg(long)]
        depth: Option<u32>,
    },

    /// List a member's sponsor chain.
    Upline {
        member: String,
        /// Levels to climb; defaults to the configured bound.
        #[arg(long)]
        depth: Option<u32>,
    },

    /// Audit the edge set for circular referral chains.
    Cycles,

    /// Direct/indirect breakdown of a member's downline.
    Breakdown {
        member: String,
        #[arg(long, default_value = "lifetime", value_parser = parse_window)]
        window: Window,
    },

    /// Full team report: per-level stats and earnings buckets.
    Report { member: String },

    /// Commissions a member has earned, oldest first.
    Commissions { member: String },

    /// Leaderboard by lifetime commission earnings.
    Top {
        #[arg(long, default_value_t = 10)]
        limit: usize,
    },

    /// Balance, available amount, and ledger of a member's wallet.
    Wallet { member: String },

    /// Payout request workflow.
    #[command(subcommand)]
    Payout(PayoutCommand),

    /// Tree-wide counts.
    Stats,
}

#[derive(Subcommand)]
pub enum PayoutCommand {
    /// Open a payout request (requires approved KYC).
    Request { member: String, gross_cents: i64 },
    /// Approve or reject a pending request.
    Settle {
        id: i64,
        #[arg(long)]
        reject: bool,
    },
    /// List a member's payout requests.
    List { member: String },
}

fn parse_kyc(s: &str) -> std::result::Result<KycStatus, String> {
    KycStatus::from_str_loose(s).ok_or_else(|| format!("unknown kyc status '{s}'"))
}

fn parse_tier(s: &str) -> std::result::Result<PackageTier, String> {
    PackageTier::from_str_loose(s).ok_or_else(|| format!("unknown package tier '{s}'"))
}

fn parse_window(s: &str) -> std::result::Result<Window, String> {
    Window::from_str_loose(s).ok_or_else(|| format!("unknown window '{s}' (7d, 30d, lifetime)"))
}

/// Execute a parsed command against the configured store. `now` is the
/// current time in epoch seconds, injected by the binary. Returns the
/// counters accumulated while handling the command.
pub fn run(cli: Cli, now: i64) -> Result<Metrics> {
    let mut metrics = Metrics::new();
    let config = ReftreeConfig::load(cli.config.as_deref())?;
    let db_path = cli.db.unwrap_or_else(|| config.db_path.clone());
    let db_str = db_path
        .to_str()
        .ok_or_else(|| ReftreeError::Config(format!("non-utf8 db path {}", db_path.display())))?;

    if let Some(parent) = db_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let store = ReferralStore::new(db_str)?;

    match cli.command {
        Command::Init => {
            info!(path = %db_path.display(), "database initialized");
            print_json(&json!({ "db_path": db_path, "status": "ready" }));
        }

        Command::AddMember {
            name,
            email,
            sponsor,
        } => {
            let id = referral_code(&name, sponsor.as_deref(), now);
            let member = Member {
                id: id.clone(),
                name,
                email,
                joined_at: now,
                kyc_status: KycStatus::Unverified,
            };
            store.upsert_member(&member)?;
            if let Some(sponsor_id) = &sponsor {
                store.set_sponsor(&id, sponsor_id)?;
            }
            metrics.members_registered += 1;
            print_json(&member);
        }

        Command::SetSponsor { member, sponsor } => {
            store.set_sponsor(&member, &sponsor)?;
            print_json(&json!({ "member": member, "sponsor": sponsor }));
        }

        Command::Kyc { member, status } => {
            store.set_kyc_status(&member, status)?;
            print_json(&json!({ "member": member, "kyc_status": status }));
        }

        Command::AddPackage {
            id,
            name,
            tier,
            price_cents,
            inactive,
        } => {
            let package = Package {
                id,
                name,
                tier,
                price_cents,
                active: !inactive,
            };
            store.upsert_package(&package)?;
            print_json(&package);
        }

        Command::Buy {
            member,
            package,
            no_distribute,
        } => {
            let purchase = store.record_purchase(&member, &package, now)?;
            metrics.purchases_recorded += 1;
            if no_distribute {
                print_json(&purchase);
            } else {
                let engine = CommissionEngine::new(
                    &store,
                    config.resolve_plan(),
                    config.tier_depths,
                )?;
                let outcome = engine.distribute(&purchase, now)?;
                metrics.walks_run += 1;
                metrics.commissions_paid += outcome.commissions.len() as u64;
                metrics.commission_cents_total += outcome.total_cents;
                print_json(&json!({ "purchase": purchase, "distribution": outcome }));
            }
        }

        Command::Distribute { purchase_id } => {
            let purchase = store.get_purchase(purchase_id)?.ok_or(ReftreeError::Invalid {
                what: "purchase id",
                value: purchase_id.to_string(),
            })?;
            let engine =
                CommissionEngine::new(&store, config.resolve_plan(), config.tier_depths)?;
            let outcome = engine.distribute(&purchase, now)?;
            metrics.walks_run += 1;
            metrics.commissions_paid += outcome.commissions.len() as u64;
            metrics.commission_cents_total += outcome.total_cents;
            print_json(&outcome);
        }

        Command::Downline { member, depth } => {
            let walker = TreeWalker::new(&store);
            metrics.walks_run += 1;
            print_json(&walker.find_downline(&member, depth.unwrap_or(config.max_depth))?);
        }

        Command::Upline { member, depth } => {
            let walker = TreeWalker::new(&store);
            metrics.walks_run += 1;
            print_json(&walker.find_upline(&member, depth.unwrap_or(config.max_depth))?);
        }

        Command::Cycles => {
            let walker = TreeWalker::new(&store);
            print_json(&walker.detect_cycles()?);
        }

        Command::Breakdown { member, window } => {
            let categorizer = Categorizer::new(&store);
            metrics.walks_run += 1;
            print_json(&categorizer.breakdown(&member, now, window)?);
        }

        Command::Report { member } => {
            let aggregator = Aggregator::new(&store);
            metrics.walks_run += 1;
            print_json(&aggregator.team_report(&member, now)?);
        }

        Command::Commissions { member } => print_json(&store.commissions_of(&member)?),

        Command::Top { limit } => {
            let aggregator = Aggregator::new(&store);
            print_json(&aggregator.top_earners(limit)?);
        }

        Command::Wallet { member } => {
            let wallet = Wallet::new(&store, config.tds_bps);
            print_json(&json!({
                "member": member,
                "balance_cents": wallet.balance(&member)?,
                "available_cents": wallet.available(&member)?,
                "ledger": wallet.ledger_of(&member)?,
            }));
        }

        Command::Payout(payout) => {
            let wallet = Wallet::new(&store, config.tds_bps);
            match payout {
                PayoutCommand::Request {
                    member,
                    gross_cents,
                } => print_json(&wallet.request_payout(&member, gross_cents, now)?),
                PayoutCommand::Settle { id, reject } => {
                    print_json(&wallet.settle_payout(id, !reject, now)?)
                }
                PayoutCommand::List { member } => print_json(&wallet.payouts_of(&member)?),
            }
        }

        Command::Stats => print_json(&store.get_stats()?),
    }

    tracing::debug!(metrics = %metrics.to_json(), "command complete");
    Ok(metrics)
}

fn print_json<T: serde::Serialize>(value: &T) {
    match serde_json::to_string_pretty(value) {
        Ok(out) => println!("{out}"),
        Err(err) => eprintln!("serialization failed: {err}"),
    }
}
