//! Exact percentage arithmetic
//!
//! Precision above [`MAX_PRECISION`] is clamped to it.

use crate::config::MAX_PRECISION;
use serde::Serialize;
use std::fmt;

/// Covered / total pair with exact decimal rendering
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct Ratio {
    /// Covered count
    pub hit: usize,
    /// Total count
    pub total: usize,
}

impl Ratio {
    /// Create a ratio
    #[must_use]
    pub const fn new(hit: usize, total: usize) -> Self {
        Self { hit, total }
    }

    /// Percentage as a float (100.0 when total is 0)
    #[must_use]
    pub fn as_percent(&self) -> f64 {
        if self.total == 0 {
            return 100.0;
        }
        self.hit as f64 / self.total as f64 * 100.0
    }

    /// Whether every counted item is covered
    #[must_use]
    pub const fn is_complete(&self) -> bool {
        self.hit >= self.total
    }

    /// Percentage scaled by `10^precision`, rounded half up
    ///
    /// Never rounds an incomplete ratio up to 100 or a non-zero ratio down
    /// to 0, so "100" always means fully covered.
    #[must_use]
    pub fn scaled(&self, precision: usize) -> u128 {
        let precision = precision.min(MAX_PRECISION);
        let scale = 10u128.pow(precision as u32);
        if self.total == 0 {
            return 100 * scale;
        }
        let hit = self.hit as u128;
        let total = self.total as u128;
        let mut scaled = (2 * hit * 100 * scale + total) / (2 * total);
        if scaled == 100 * scale && hit < total {
            scaled -= 1;
        }
        if scaled == 0 && hit > 0 {
            scaled = 1;
        }
        scaled
    }

    /// Render with `precision` decimal places, without `%`
    #[must_use]
    pub fn format(&self, precision: usize) -> String {
        let precision = precision.min(MAX_PRECISION);
        let scaled = self.scaled(precision);
        if precision == 0 {
            return scaled.to_string();
        }
        let scale = 10u128.pow(precision as u32);
        format!(
            "{}.{:0width$}",
            scaled / scale,
            scaled % scale,
            width = precision
        )
    }

    /// Whether the rounded percentage is below `threshold`
    #[must_use]
    pub fn below(&self, threshold: f64, precision: usize) -> bool {
        let precision = precision.min(MAX_PRECISION);
        let scale = 10f64.powi(precision as i32);
        let shown = self.scaled(precision) as f64 / scale;
        shown < threshold
    }
}

impl fmt::Display for Ratio {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}%", self.format(f.precision().unwrap_or(2)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_is_full() {
        assert_eq!(Ratio::new(0, 0).format(2), "100.00");
        assert!((Ratio::new(0, 0).as_percent() - 100.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_sixty_percent() {
        assert_eq!(Ratio::new(3, 5).format(1), "60.0");
        assert_eq!(Ratio::new(3, 5).format(0), "60");
    }

    #[test]
    fn test_round_half_up() {
        // 1/8 = 12.5%
        assert_eq!(Ratio::new(1, 8).format(0), "13");
        // 1/16 = 6.25%
        assert_eq!(Ratio::new(1, 16).format(1), "6.3");
        // 2/3 = 66.666..%
        assert_eq!(Ratio::new(2, 3).format(2), "66.67");
    }

    #[test]
    fn test_incomplete_never_shows_hundred() {
        assert_eq!(Ratio::new(999, 1000).format(0), "99");
        assert_eq!(Ratio::new(99_999, 100_000).format(2), "99.99");
    }

    #[test]
    fn test_nonzero_never_shows_zero() {
        assert_eq!(Ratio::new(1, 1000).format(0), "1");
    }

    #[test]
    fn test_display_uses_precision() {
        assert_eq!(format!("{}", Ratio::new(1, 3)), "33.33%");
        assert_eq!(format!("{:.1}", Ratio::new(1, 3)), "33.3%");
    }

    #[test]
    fn test_precision_is_clamped() {
        let widest = Ratio::new(1, 3).format(MAX_PRECISION);
        assert_eq!(widest, "33.333333");
        assert_eq!(Ratio::new(1, 3).format(60), widest);
        assert_eq!(Ratio::new(2, 3).scaled(usize::MAX), Ratio::new(2, 3).scaled(MAX_PRECISION));
        assert_eq!(format!("{:.40}", Ratio::new(0, 0)), "100.000000%");
        assert!(Ratio::new(1, 3).below(33.34, 100));
    }

    #[test]
    fn test_below_threshold() {
        assert!(Ratio::new(79, 100).below(80.0, 2));
        assert!(!Ratio::new(80, 100).below(80.0, 2));
        assert!(!Ratio::new(0, 0).below(100.0, 2));
    }
}
