use super::EffectRenderer;
use crate::compositor::Canvas;
use crate::types::{Result, Rgb};

/// Blinking blind-spot warning: on for one tick, base layer for the next
pub struct BlindSpotWarning {
    color: Rgb,
}

impl BlindSpotWarning {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

impl EffectRenderer for BlindSpotWarning {
    fn render(&mut self, canvas: &mut Canvas<'_>, tick: u64) -> Result<()> {
        if tick % 2 == 0 {
            canvas.fill(self.color);
        } else {
            canvas.clear();
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::{render_tick, Harness};
    use crate::effects::EffectId;

    const RED: Rgb = Rgb { r: 255, g: 0, b: 0 };

    #[test]
    fn test_blinks_in_outermost_pixels() {
        let harness = Harness::new(vec![EffectId::LeftBlindSpot]);
        let mut warning = BlindSpotWarning::new(RED);

        render_tick(&harness, EffectId::LeftBlindSpot, &mut warning, 0);
        assert_eq!(harness.compositor.pixel(0), Some(RED));
        assert_eq!(harness.compositor.pixel(4), Some(RED));
        assert_eq!(harness.compositor.pixel(5), Some(harness.default_color()));

        render_tick(&harness, EffectId::LeftBlindSpot, &mut warning, 1);
        assert_eq!(harness.compositor.pixel(0), Some(harness.default_color()));
    }
}
