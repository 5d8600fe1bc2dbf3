pub mod aggregate;
pub mod db;
pub mod eligibility;
pub mod events;
pub mod ledger;
pub mod portal;
pub mod prom_metrics;
pub mod recompute;

/// Points a single ledger entry contributes to the participant total.
///
/// The only multipliers in play are 1.0 and 1.5 (validated on insert),
/// so half-up rounding decides the x1.5 odd-points case: 3 × 1.5 = 5.
pub fn effective_points(points: i64, multiplier: f64) -> i64 {
    (points as f64 * multiplier).round() as i64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn effective_points_identity_multiplier() {
        for p in [1i64, 2, 5, 10, 100] {
            assert_eq!(effective_points(p, 1.0), p);
        }
    }

    #[test]
    fn effective_points_bonus_multiplier_rounds_half_up() {
        assert_eq!(effective_points(2, 1.5), 3);
        assert_eq!(effective_points(3, 1.5), 5); // 4.5 rounds up
        assert_eq!(effective_points(4, 1.5), 6);
        assert_eq!(effective_points(5, 1.5), 8); // 7.5 rounds up
        assert_eq!(effective_points(6, 1.5), 9);
    }

    #[test]
    fn effective_points_zero() {
        assert_eq!(effective_points(0, 1.5), 0);
    }
}
