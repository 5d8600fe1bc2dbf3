//! # Aggregation Engine — Ledger to Category Totals
//!
//! Folds a participant's activity ledger into per-bucket counts and a running
//! point total. Pure and order-independent: the same ledger snapshot always
//! produces the same aggregates, so callers may recompute at any time and the
//! result must agree with any cached copy.
//!
//! Rows whose subtype drifted outside the known discipline set (historical
//! data) are counted in the type-level total only and logged — they are never
//! dropped and never abort the fold.

use serde::Serialize;
use tracing::warn;

use crate::db::ActivityRow;
use crate::effective_points;
use crate::ledger::RewardType;

/// Fixed-schema aggregate record for one participant.
///
/// Bucket fields count ledger rows per `(reward_type, discipline)`; the
/// `*_total` fields count all rows of a type, including unrecognized-subtype
/// rows, so buckets never exceed their type total.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ProgressAggregates {
    pub zakal_bjj: i64,
    pub zakal_kick: i64,
    pub zakal_ofp: i64,
    pub gran: i64,
    pub shram_bjj: i64,
    pub shram_kick: i64,
    pub shram_ofp: i64,
    pub shram_tactics: i64,
    pub zakal_total: i64,
    pub shram_total: i64,
    pub total_points: i64,
}

impl ProgressAggregates {
    /// Fold a ledger snapshot into aggregates.
    pub fn from_rows(rows: &[ActivityRow]) -> Self {
        let mut agg = ProgressAggregates::default();
        for row in rows {
            agg.add(
                &row.reward_type,
                row.subtype.as_deref(),
                row.points,
                row.multiplier,
            );
        }
        agg
    }

    /// Fold in a single ledger entry.
    pub fn add(&mut self, reward_type: &str, subtype: Option<&str>, points: i64, multiplier: f64) {
        self.total_points += effective_points(points, multiplier);
        match RewardType::parse(reward_type) {
            Some(RewardType::Zakal) => {
                self.zakal_total += 1;
                match subtype {
                    Some("bjj") => self.zakal_bjj += 1,
                    Some("kick") => self.zakal_kick += 1,
                    Some("ofp") => self.zakal_ofp += 1,
                    other => {
                        warn!(reward_type, subtype = ?other, "unrecognized zakal subtype, counted at type level");
                    }
                }
            }
            Some(RewardType::Gran) => {
                // lecture codes are free-form, all gran rows share one bucket
                self.gran += 1;
            }
            Some(RewardType::Shram) => {
                self.shram_total += 1;
                match subtype {
                    Some("bjj") => self.shram_bjj += 1,
                    Some("kick") => self.shram_kick += 1,
                    Some("ofp") => self.shram_ofp += 1,
                    Some("tactics") => self.shram_tactics += 1,
                    other => {
                        warn!(reward_type, subtype = ?other, "unrecognized shram subtype, counted at type level");
                    }
                }
            }
            None => {
                // reward_type itself drifted; points still count, category does not
                warn!(reward_type, "unrecognized reward type in ledger");
            }
        }
    }

    /// Look up an aggregate metric by requirement key.
    ///
    /// These are the names totem requirement maps may reference. Unknown keys
    /// return `None`, which makes the requirement unsatisfiable rather than
    /// silently satisfied.
    pub fn metric(&self, key: &str) -> Option<i64> {
        match key {
            "zakal_bjj" => Some(self.zakal_bjj),
            "zakal_kick" => Some(self.zakal_kick),
            "zakal_ofp" => Some(self.zakal_ofp),
            "gran" => Some(self.gran),
            "shram_bjj" => Some(self.shram_bjj),
            "shram_kick" => Some(self.shram_kick),
            "shram_ofp" => Some(self.shram_ofp),
            "shram_tactics" => Some(self.shram_tactics),
            "zakal_total" => Some(self.zakal_total),
            "shram_total" => Some(self.shram_total),
            "total_points" => Some(self.total_points),
            _ => None,
        }
    }

    /// Zakal bucket count for a direction code, 0 for non-training directions.
    pub fn zakal_for(&self, code: &str) -> i64 {
        match code {
            "bjj" => self.zakal_bjj,
            "kick" => self.zakal_kick,
            "ofp" => self.zakal_ofp,
            _ => 0,
        }
    }

    /// Shram bucket count for a direction code.
    pub fn shram_for(&self, code: &str) -> i64 {
        match code {
            "bjj" => self.shram_bjj,
            "kick" => self.shram_kick,
            "ofp" => self.shram_ofp,
            "tactics" => self.shram_tactics,
            _ => 0,
        }
    }
}
