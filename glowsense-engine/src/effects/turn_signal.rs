use super::{EffectRenderer, Side};
use crate::compositor::Canvas;
use crate::types::{Result, Rgb};

/// Sweep steps before the dark phase
const SWEEP_STEPS: u64 = 3;

/// Sequential turn signal
///
/// Lights the zone from its inner edge outwards in [`SWEEP_STEPS`] steps, then
/// shows the base layer for one step.
pub struct TurnSignal {
    side: Side,
    color: Rgb,
}

impl TurnSignal {
    pub fn new(side: Side, color: Rgb) -> Self {
        Self { side, color }
    }
}

impl EffectRenderer for TurnSignal {
    fn render(&mut self, canvas: &mut Canvas<'_>, tick: u64) -> Result<()> {
        let phase = tick % (SWEEP_STEPS + 1);
        canvas.clear();
        if phase == SWEEP_STEPS {
            return Ok(());
        }

        let Some(bounds) = canvas.zone().bounds() else {
            return Ok(());
        };
        let lit = (bounds.len() as u64 * (phase + 1)).div_ceil(SWEEP_STEPS) as usize;
        let lit_range = match self.side {
            Side::Left => bounds.end - lit..bounds.end,
            Side::Right => bounds.start..bounds.start + lit,
        };
        for index in lit_range {
            canvas.set(index, self.color);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::effects::testing::{render_tick, Harness};
    use crate::effects::EffectId;

    const YELLOW: Rgb = Rgb { r: 255, g: 255, b: 0 };

    #[test]
    fn test_left_sweep_grows_outwards() {
        let harness = Harness::new(vec![EffectId::LeftTurn]);
        let mut turn = TurnSignal::new(Side::Left, YELLOW);

        render_tick(&harness, EffectId::LeftTurn, &mut turn, 0);
        assert_eq!(harness.compositor.pixel(19), Some(YELLOW));
        assert_eq!(harness.compositor.pixel(13), Some(YELLOW));
        assert_eq!(harness.compositor.pixel(12), Some(harness.default_color()));

        render_tick(&harness, EffectId::LeftTurn, &mut turn, 2);
        assert_eq!(harness.compositor.pixel(0), Some(YELLOW));

        render_tick(&harness, EffectId::LeftTurn, &mut turn, 3);
        assert_eq!(harness.compositor.pixel(0), Some(harness.default_color()));
        assert_eq!(harness.compositor.pixel(19), Some(harness.default_color()));
    }

    #[test]
    fn test_right_sweep_respects_blind_spot() {
        let harness = Harness::new(vec![EffectId::RightTurn, EffectId::RightBlindSpot]);
        let mut turn = TurnSignal::new(Side::Right, YELLOW);

        render_tick(&harness, EffectId::RightTurn, &mut turn, 2);
        assert_eq!(harness.compositor.pixel(40), Some(YELLOW));
        assert_eq!(harness.compositor.pixel(54), Some(YELLOW));
        assert_eq!(harness.compositor.pixel(55), Some(harness.default_color()));
    }
}
