use super::EffectRenderer;
use crate::compositor::{dim, Canvas};
use crate::types::{Result, Rgb};

/// Ticks from dark to full brightness
const RAMP_STEPS: u64 = 25;

/// Slow glow in the centre of the strip while the driver is asked to hold the wheel
pub struct HandsOnGlow {
    color: Rgb,
}

impl HandsOnGlow {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }

    /// Triangle wave 0 -> 255 -> 0 over `2 * RAMP_STEPS` ticks
    fn level(tick: u64) -> u8 {
        let t = tick % (2 * RAMP_STEPS);
        let ramp = if t <= RAMP_STEPS { t } else { 2 * RAMP_STEPS - t };
        (ramp * 255 / RAMP_STEPS) as u8
    }
}

impl EffectRenderer for HandsOnGlow {
    fn render(&mut self, canvas: &mut Canvas<'_>, tick: u64) -> Result<()> {
        canvas.fill(dim(self.color, Self::level(tick)));
        Ok(())
    }
}
