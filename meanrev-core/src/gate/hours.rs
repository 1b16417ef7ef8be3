use super::{GateContext, GateVerdict, SafetyCheck};
use chrono::Timelike;

/// Allows trading only when the local hour is within `[start, end]`, both inclusive.
///
/// With `[8, 22]`, 22:59 is still inside the window.
#[derive(Debug, Clone)]
pub struct TradingHoursCheck {
    start: u32,
    end: u32,
}

impl TradingHoursCheck {
    pub fn new(start: u32, end: u32) -> Self {
        Self { start, end }
    }
}

impl SafetyCheck for TradingHoursCheck {
    fn name(&self) -> &str {
        "trading_hours"
    }

    fn check(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let hour = ctx.now.hour();
        if (self.start..=self.end).contains(&hour) {
            GateVerdict::Passed
        } else {
            GateVerdict::OutsideTradingHours { hour }
        }
    }
}
