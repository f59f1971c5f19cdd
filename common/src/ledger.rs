use std::collections::VecDeque;

pub const HOUR_MS: u64 = 3_600_000;
pub const DAY_MS: u64 = 24 * HOUR_MS;

/// Trailing-24h record of actuator activity, one entry per control tick.
#[derive(Debug, Default)]
pub struct DutyCycleLedger {
    entries: VecDeque<(u64, bool)>,
}

impl DutyCycleLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends this tick's activity sample and evicts everything older
    /// than 24h, keeping the ledger bounded by tick rate x 24h.
    pub fn record(&mut self, now_ms: u64, active: bool) {
        self.entries.push_back((now_ms, active));
        let horizon = now_ms.saturating_sub(DAY_MS);
        while let Some(&(ts, _)) = self.entries.front() {
            if ts >= horizon {
                break;
            }
            self.entries.pop_front();
        }
    }

    /// Percentage of ticks active within the trailing `window_ms`, 0-100.
    ///
    /// Only samples strictly inside the window count; a sample at exactly
    /// `now - window_ms` belongs to the previous window. A window longer
    /// than the recorded history counts every sample.
    pub fn duty_percent(&self, now_ms: u64, window_ms: u64) -> f64 {
        let horizon = now_ms.checked_sub(window_ms);
        let mut total = 0u64;
        let mut active = 0u64;
        for &(ts, was_active) in self.entries.iter().rev() {
            if let Some(horizon) = horizon {
                if ts <= horizon {
                    break;
                }
            }
            total += 1;
            if was_active {
                active += 1;
            }
        }
        if total == 0 {
            return 0.0;
        }
        active as f64 * 100.0 / total as f64
    }

    /// Age of the oldest retained entry; 0 when empty. The overuse check
    /// requires a full hour of coverage before trusting the percentage.
    pub fn span_ms(&self, now_ms: u64) -> u64 {
        self.entries
            .front()
            .map(|&(ts, _)| now_ms.saturating_sub(ts))
            .unwrap_or(0)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
