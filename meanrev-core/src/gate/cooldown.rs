use super::{GateContext, GateVerdict, SafetyCheck};

/// Minimum spacing between orders, anchored at the last submission.
#[derive(Debug, Clone)]
pub struct CooldownCheck {
    min_interval_secs: i64,
}

impl CooldownCheck {
    pub fn new(min_interval_secs: i64) -> Self {
        Self { min_interval_secs }
    }
}

impl SafetyCheck for CooldownCheck {
    fn name(&self) -> &str {
        "cooldown"
    }

    fn check(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let Some(last) = ctx.last_trade_time else {
            return GateVerdict::Passed;
        };
        // A clock that stepped backwards yields a negative elapsed time and
        // keeps the cooldown active.
        let elapsed_secs = (ctx.now - last).num_seconds();
        if elapsed_secs < self.min_interval_secs {
            GateVerdict::Cooldown {
                elapsed_secs,
                required_secs: self.min_interval_secs,
            }
        } else {
            GateVerdict::Passed
        }
    }
}
