/// Axis step planning for the timeline.
///
/// Picks a "nice" gridline spacing so the axis shows at most about eight
/// intervals regardless of session length.

/// Candidate step sizes in seconds, ascending.
pub const STEP_CANDIDATES: &[f64] = &[
    1.0, 2.0, 5.0, 10.0, 15.0, 20.0, 30.0, 60.0, 120.0, 300.0, 600.0,
];

/// Target maximum number of intervals on the axis.
pub const TARGET_INTERVALS: f64 = 8.0;

/// Choose an axis step for a total duration in seconds.
///
/// Returns the first candidate `s` with `total / s <= 8`. Totals too large
/// for every candidate fall back to `max(1, round(total / 8))`. Zero,
/// negative, and non-finite totals return the smallest candidate.
pub fn plan_axis_step(total_seconds: f64) -> f64 {
    if !total_seconds.is_finite() || total_seconds <= 0.0 {
        return STEP_CANDIDATES[0];
    }

    STEP_CANDIDATES
        .iter()
        .copied()
        .find(|&s| total_seconds / s <= TARGET_INTERVALS)
        .unwrap_or_else(|| (total_seconds / TARGET_INTERVALS).round().max(1.0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_values() {
        assert_eq!(plan_axis_step(40.0), 5.0);
        assert_eq!(plan_axis_step(4.0), 1.0);
        assert_eq!(plan_axis_step(8.0), 1.0);
        assert_eq!(plan_axis_step(8.5), 2.0);
        assert_eq!(plan_axis_step(4800.0), 600.0);
        assert_eq!(plan_axis_step(5000.0), 625.0);
    }

    #[test]
    fn zero_and_garbage_return_smallest_step() {
        assert_eq!(plan_axis_step(0.0), 1.0);
        assert_eq!(plan_axis_step(-3.0), 1.0);
        assert_eq!(plan_axis_step(f64::NAN), 1.0);
        assert_eq!(plan_axis_step(f64::INFINITY), 1.0);
    }

    #[test]
    fn first_fit_property_holds() {
        let mut total = 0.25;
        while total < 20_000.0 {
            let step = plan_axis_step(total);
            if STEP_CANDIDATES.contains(&step) {
                assert!(total / step <= TARGET_INTERVALS, "total={total} step={step}");
                for &smaller in STEP_CANDIDATES.iter().filter(|&&s| s < step) {
                    assert!(total / smaller > TARGET_INTERVALS, "total={total} smaller={smaller}");
                }
            } else {
                assert!(total / 600.0 > TARGET_INTERVALS);
            }
            total *= 1.37;
        }
    }
}
