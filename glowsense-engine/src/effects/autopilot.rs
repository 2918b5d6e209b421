use super::EffectRenderer;
use crate::compositor::Canvas;
use crate::types::{Result, Rgb};

/// Autopilot base layer: the whole strip in the autopilot colour
///
/// Re-asserted every tick so pixels released by an overlay pick it up.
pub struct AutopilotBase {
    color: Rgb,
}

impl AutopilotBase {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

impl EffectRenderer for AutopilotBase {
    fn render(&mut self, canvas: &mut Canvas<'_>, _tick: u64) -> Result<()> {
        canvas.fill(self.color);
        Ok(())
    }
}
