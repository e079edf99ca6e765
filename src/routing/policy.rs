//! Peak-hours policies

use crate::config::PeakHoursConfig;
use chrono::Timelike;

/// Decides whether the current moment falls within peak hours.
pub trait PeakHoursPolicy: Send + Sync {
    fn is_peak(&self) -> bool;
}

/// Peak hours by server-local wall-clock time.
#[derive(Debug, Clone)]
pub struct WallClockPeakHours {
    window: PeakHoursConfig,
}

impl WallClockPeakHours {
    pub fn new(window: PeakHoursConfig) -> Self {
        Self { window }
    }
}

impl PeakHoursPolicy for WallClockPeakHours {
    fn is_peak(&self) -> bool {
        self.window.enabled && hour_in_window(chrono::Local::now().hour(), &self.window)
    }
}

/// Constant answer, for tests and for deployments without a peak window.
#[derive(Debug, Clone, Copy)]
pub struct FixedPeakHours(pub bool);

impl PeakHoursPolicy for FixedPeakHours {
    fn is_peak(&self) -> bool {
        self.0
    }
}

/// Half-open `[start, end)` hour window that wraps midnight when start > end.
pub fn hour_in_window(hour: u32, window: &PeakHoursConfig) -> bool {
    let (start, end) = (window.start_hour, window.end_hour);
    if start <= end {
        start <= hour && hour < end
    } else {
        hour >= start || hour < end
    }
}
