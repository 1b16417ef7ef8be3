use super::{GateContext, GateVerdict, SafetyCheck};

/// Rejects when ask - bid exceeds `max_points` instrument points.
#[derive(Debug, Clone)]
pub struct SpreadCheck {
    max_points: f64,
}

impl SpreadCheck {
    pub fn new(max_points: f64) -> Self {
        Self { max_points }
    }
}

impl SafetyCheck for SpreadCheck {
    fn name(&self) -> &str {
        "spread"
    }

    fn check(&self, ctx: &GateContext<'_>) -> GateVerdict {
        let spread = ctx.tick.spread();
        let max = self.max_points * ctx.symbol.point;
        if spread > max {
            GateVerdict::SpreadTooWide { spread, max }
        } else {
            GateVerdict::Passed
        }
    }
}
