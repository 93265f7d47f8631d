//! Position value providers. The engine treats trackers as external
//! collaborators reached through a single read-only query; their internal
//! bookkeeping is out of scope here.

use std::sync::{Arc, Mutex};

use crate::clock::Clock;
use crate::errors::FundError;

/// Read-only query contract for a tracked position. Values are signed,
/// 18-decimal amounts in the accounting currency; debt positions report
/// negative values.
pub trait PositionTracker: Send + Sync {
    fn current_value(&self) -> Result<i128, FundError>;
    fn label(&self) -> &str;
}

/// A position with an externally managed value, settable between queries.
pub struct StaticPosition {
    label: String,
    value: Mutex<i128>,
}

impl StaticPosition {
    pub fn new(label: impl Into<String>, value: i128) -> Self {
        Self { label: label.into(), value: Mutex::new(value) }
    }

    pub fn set_value(&self, value: i128) {
        if let Ok(mut guard) = self.value.lock() {
            *guard = value;
        }
    }
}

impl PositionTracker for StaticPosition {
    fn current_value(&self) -> Result<i128, FundError> {
        self.value
            .lock()
            .map(|v| *v)
            .map_err(|_| FundError::Storage("position value lock poisoned".to_string()))
    }

    fn label(&self) -> &str {
        &self.label
    }
}

/// Linear credit/debt schedule: value moves from `principal` at a constant
/// per-second rate between `start` and `end`, then stays flat.
pub struct LinearSchedule {
    label: String,
    principal: i128,
    rate_per_second: i128,
    start: u64,
    end: u64,
    clock: Arc<dyn Clock>,
}

impl LinearSchedule {
    pub fn new(
        label: impl Into<String>,
        principal: i128,
        rate_per_second: i128,
        start: u64,
        end: u64,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { label: label.into(), principal, rate_per_second, start, end, clock }
    }
}

impl PositionTracker for LinearSchedule {
    fn current_value(&self) -> Result<i128, FundError> {
        let now = self.clock.now().clamp(self.start, self.end);
        let elapsed = now.saturating_sub(self.start) as i128;
        let accrued = self
            .rate_per_second
            .checked_mul(elapsed)
            .ok_or(FundError::MathOverflow("linear schedule accrual"))?;
        self.principal
            .checked_add(accrued)
            .ok_or(FundError::MathOverflow("linear schedule value"))
    }

    fn label(&self) -> &str {
        &self.label
    }
}
