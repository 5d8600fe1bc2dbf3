//! # Activity Ledger — Validated Append-Only Scoring Facts
//!
//! Each ledger entry is an immutable fact: who did what, in which category,
//! for how many points. Validation happens entirely before persistence —
//! a rejected entry is never partially applied.
//!
//! ## Reward categories
//!
//! | Type | Meaning | Subtype |
//! |-------|---------|---------|
//! | `zakal` | Physical training session | required: bjj / kick / ofp |
//! | `gran` | Theory — lecture or homework | optional lecture code |
//! | `shram` | Trial / test, higher point value | required: bjj / kick / ofp / tactics |
//!
//! The subtype sets are closed. Inserts with an unknown subtype are rejected
//! with a field-specific [`ValidationError`]; historical rows that drifted
//! outside the known set are handled downstream by the aggregation engine
//! (counted at the type level, never dropped).

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// The three reward categories of the program.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    Zakal,
    Gran,
    Shram,
}

impl RewardType {
    pub fn as_str(&self) -> &'static str {
        match self {
            RewardType::Zakal => "zakal",
            RewardType::Gran => "gran",
            RewardType::Shram => "shram",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "zakal" => Some(RewardType::Zakal),
            "gran" => Some(RewardType::Gran),
            "shram" => Some(RewardType::Shram),
            _ => None,
        }
    }
}

/// Training disciplines tracked per-bucket by the aggregation engine.
///
/// `tactics` is a trial-only discipline: valid for `shram`, not for `zakal`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Discipline {
    Bjj,
    Kick,
    Ofp,
    Tactics,
}

impl Discipline {
    pub fn as_str(&self) -> &'static str {
        match self {
            Discipline::Bjj => "bjj",
            Discipline::Kick => "kick",
            Discipline::Ofp => "ofp",
            Discipline::Tactics => "tactics",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "bjj" => Some(Discipline::Bjj),
            "kick" => Some(Discipline::Kick),
            "ofp" => Some(Discipline::Ofp),
            "tactics" => Some(Discipline::Tactics),
            _ => None,
        }
    }

    /// Disciplines a `zakal` entry may carry.
    pub const ZAKAL: [Discipline; 3] = [Discipline::Bjj, Discipline::Kick, Discipline::Ofp];

    /// Disciplines a `shram` entry may carry.
    pub const SHRAM: [Discipline; 4] = [
        Discipline::Bjj,
        Discipline::Kick,
        Discipline::Ofp,
        Discipline::Tactics,
    ];
}

/// Multipliers accepted on insert. Anything else is a validation error.
pub const ALLOWED_MULTIPLIERS: [f64; 2] = [1.0, 1.5];

/// Field-specific rejection reasons for an activity insert.
///
/// Surfaced to the caller as a user-visible message (HTTP 422 at the portal
/// boundary); never results in a partially applied write.
#[derive(Debug, Error, PartialEq)]
pub enum ValidationError {
    #[error("unknown reward type '{0}' (expected zakal, gran or shram)")]
    UnknownRewardType(String),
    #[error("unknown {reward_type} discipline '{subtype}'")]
    UnknownSubtype { reward_type: &'static str, subtype: String },
    #[error("{0} activities require a discipline subtype")]
    MissingSubtype(&'static str),
    #[error("points must be positive, got {0}")]
    NonPositivePoints(i64),
    #[error("multiplier {0} is not allowed (expected 1.0 or 1.5)")]
    UnknownMultiplier(f64),
}

/// Raw activity fields as submitted by a trainer or admin.
#[derive(Clone, Debug, Deserialize)]
pub struct NewActivity {
    pub participant_id: uuid::Uuid,
    pub reward_type: String,
    #[serde(default)]
    pub subtype: Option<String>,
    pub points: i64,
    #[serde(default = "default_multiplier")]
    pub multiplier: f64,
    pub activity_date: NaiveDate,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub verified_by: Option<String>,
}

fn default_multiplier() -> f64 {
    1.0
}

/// An activity that passed validation and is ready to append.
#[derive(Clone, Debug)]
pub struct ValidatedActivity {
    pub participant_id: uuid::Uuid,
    pub reward_type: RewardType,
    pub subtype: Option<String>,
    pub points: i64,
    pub multiplier: f64,
    pub activity_date: NaiveDate,
    pub description: Option<String>,
    pub verified_by: Option<String>,
}

impl NewActivity {
    /// Validate all fields against the closed enum sets.
    ///
    /// `zakal` and `shram` require a known discipline subtype; `gran` takes an
    /// optional free-form lecture code (kept as-is, lowercased).
    pub fn validate(self) -> Result<ValidatedActivity, ValidationError> {
        let reward_type = RewardType::parse(&self.reward_type)
            .ok_or_else(|| ValidationError::UnknownRewardType(self.reward_type.clone()))?;

        if self.points <= 0 {
            return Err(ValidationError::NonPositivePoints(self.points));
        }
        if !ALLOWED_MULTIPLIERS.contains(&self.multiplier) {
            return Err(ValidationError::UnknownMultiplier(self.multiplier));
        }

        let subtype = self
            .subtype
            .as_deref()
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_lowercase);

        let subtype = match reward_type {
            RewardType::Zakal | RewardType::Shram => {
                let allowed: &[Discipline] = if reward_type == RewardType::Zakal {
                    &Discipline::ZAKAL
                } else {
                    &Discipline::SHRAM
                };
                let raw = subtype
                    .ok_or(ValidationError::MissingSubtype(reward_type.as_str()))?;
                let discipline = Discipline::parse(&raw).filter(|d| allowed.contains(d));
                match discipline {
                    Some(d) => Some(d.as_str().to_string()),
                    None => {
                        return Err(ValidationError::UnknownSubtype {
                            reward_type: reward_type.as_str(),
                            subtype: raw,
                        })
                    }
                }
            }
            RewardType::Gran => subtype,
        };

        Ok(ValidatedActivity {
            participant_id: self.participant_id,
            reward_type,
            subtype,
            points: self.points,
            multiplier: self.multiplier,
            activity_date: self.activity_date,
            description: self.description,
            verified_by: self.verified_by,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base() -> NewActivity {
        NewActivity {
            participant_id: uuid::Uuid::new_v4(),
            reward_type: "zakal".into(),
            subtype: Some("bjj".into()),
            points: 1,
            multiplier: 1.0,
            activity_date: NaiveDate::from_ymd_opt(2026, 2, 10).unwrap(),
            description: None,
            verified_by: Some("coach".into()),
        }
    }

    #[test]
    fn valid_zakal_passes() {
        let v = base().validate().unwrap();
        assert_eq!(v.reward_type, RewardType::Zakal);
        assert_eq!(v.subtype.as_deref(), Some("bjj"));
    }

    #[test]
    fn unknown_reward_type_rejected() {
        let mut a = base();
        a.reward_type = "medal".into();
        assert_eq!(
            a.validate().unwrap_err(),
            ValidationError::UnknownRewardType("medal".into())
        );
    }

    #[test]
    fn zakal_requires_subtype() {
        let mut a = base();
        a.subtype = None;
        assert_eq!(
            a.validate().unwrap_err(),
            ValidationError::MissingSubtype("zakal")
        );
    }

    #[test]
    fn blank_subtype_treated_as_missing() {
        let mut a = base();
        a.subtype = Some("   ".into());
        assert_eq!(
            a.validate().unwrap_err(),
            ValidationError::MissingSubtype("zakal")
        );
    }

    #[test]
    fn zakal_rejects_tactics() {
        // tactics is a trial-only discipline
        let mut a = base();
        a.subtype = Some("tactics".into());
        assert!(matches!(
            a.validate().unwrap_err(),
            ValidationError::UnknownSubtype { reward_type: "zakal", .. }
        ));
    }

    #[test]
    fn shram_accepts_tactics() {
        let mut a = base();
        a.reward_type = "shram".into();
        a.subtype = Some("tactics".into());
        let v = a.validate().unwrap();
        assert_eq!(v.reward_type, RewardType::Shram);
        assert_eq!(v.subtype.as_deref(), Some("tactics"));
    }

    #[test]
    fn gran_subtype_is_optional_free_text() {
        let mut a = base();
        a.reward_type = "gran".into();
        a.subtype = None;
        assert!(a.validate().is_ok());

        let mut b = base();
        b.reward_type = "gran".into();
        b.subtype = Some("Nutrition".into());
        assert_eq!(b.validate().unwrap().subtype.as_deref(), Some("nutrition"));
    }

    #[test]
    fn non_positive_points_rejected() {
        for p in [0i64, -1, -100] {
            let mut a = base();
            a.points = p;
            assert_eq!(a.validate().unwrap_err(), ValidationError::NonPositivePoints(p));
        }
    }

    #[test]
    fn off_menu_multiplier_rejected() {
        let mut a = base();
        a.multiplier = 2.0;
        assert_eq!(
            a.validate().unwrap_err(),
            ValidationError::UnknownMultiplier(2.0)
        );
    }

    #[test]
    fn subtype_normalized_to_lowercase() {
        let mut a = base();
        a.subtype = Some("BJJ".into());
        assert_eq!(a.validate().unwrap().subtype.as_deref(), Some("bjj"));
    }
}
