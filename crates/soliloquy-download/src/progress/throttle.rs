//! Percent-watermark throttling.
//!
//! Progress is published on the watch channel for every chunk; the
//! notification-style `DownloadEvent::Progress` only fires when the percent
//! crosses the next watermark.

/// Rate-limiter for progress notifications.
///
/// The watermark only moves forward. A resumed transfer that starts at 40%
/// reports 40 once and then every `step` points after that.
#[derive(Debug, Clone)]
pub struct PercentWatermark {
    step: u8,
    next: u8,
}

impl PercentWatermark {
    /// Create a watermark firing every `step` percentage points (min 1).
    pub fn new(step: u8) -> Self {
        Self {
            step: step.clamp(1, 100),
            next: 0,
        }
    }

    /// Returns `Some(percent)` when `percent` reaches the next watermark.
    pub fn advance(&mut self, percent: u8) -> Option<u8> {
        let percent = percent.min(100);
        if percent < self.next {
            return None;
        }
        // Next multiple of `step` strictly above `percent`.
        let next = (u16::from(percent) / u16::from(self.step) + 1) * u16::from(self.step);
        self.next = u8::try_from(next).unwrap_or(u8::MAX);
        Some(percent)
    }

    /// The lowest percent that will fire next.
    pub const fn next(&self) -> u8 {
        self.next
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_report_always_fires() {
        let mut watermark = PercentWatermark::new(5);
        assert_eq!(watermark.advance(0), Some(0));
        assert_eq!(watermark.next(), 5);
    }

    #[test]
    fn fires_once_per_step() {
        let mut watermark = PercentWatermark::new(5);
        let fired: Vec<u8> = (0..=100).filter_map(|p| watermark.advance(p)).collect();
        assert_eq!(
            fired,
            vec![0, 5, 10, 15, 20, 25, 30, 35, 40, 45, 50, 55, 60, 65, 70, 75, 80, 85, 90, 95, 100]
        );
    }

    #[test]
    fn jumps_skip_intermediate_watermarks() {
        let mut watermark = PercentWatermark::new(5);
        assert_eq!(watermark.advance(0), Some(0));
        assert_eq!(watermark.advance(37), Some(37));
        assert_eq!(watermark.advance(39), None);
        assert_eq!(watermark.advance(40), Some(40));
    }

    #[test]
    fn hundred_fires_once() {
        let mut watermark = PercentWatermark::new(5);
        assert_eq!(watermark.advance(100), Some(100));
        assert_eq!(watermark.advance(100), None);
    }

    #[test]
    fn zero_step_is_clamped() {
        let mut watermark = PercentWatermark::new(0);
        assert_eq!(watermark.advance(0), Some(0));
        assert_eq!(watermark.advance(1), Some(1));
    }
}
