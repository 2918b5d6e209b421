use super::EffectRenderer;
use crate::compositor::{dim, Canvas};
use crate::types::{Result, Rgb, Signal};

/// Ticks per brightness ramp (up, then down)
const PULSE_STEPS: u64 = 20;
/// Ticks held at the low bound before the next breath
const HOLD_STEPS: u64 = 8;
const LOW_LEVEL: u8 = 40;
const HIGH_LEVEL: u8 = 255;

/// Number of lit pixels for a state of charge percentage
pub fn lit_pixel_count(soc: f64, led_count: usize) -> usize {
    if !soc.is_finite() || soc <= 0.0 {
        return 0;
    }
    let lit = (soc.min(100.0) / 100.0 * led_count as f64).floor() as usize;
    lit.min(led_count)
}

/// Charging base layer: a breathing bar proportional to state of charge
pub struct ChargingPulse {
    color: Rgb,
}

impl ChargingPulse {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }

    fn level(tick: u64) -> u8 {
        let span = u64::from(HIGH_LEVEL - LOW_LEVEL);
        let low = u64::from(LOW_LEVEL);
        let t = tick % (2 * PULSE_STEPS + HOLD_STEPS);
        let level = if t < PULSE_STEPS {
            low + span * t / PULSE_STEPS
        } else if t < 2 * PULSE_STEPS {
            low + span * (2 * PULSE_STEPS - t) / PULSE_STEPS
        } else {
            low
        };
        level as u8
    }
}

impl EffectRenderer for ChargingPulse {
    fn render(&mut self, canvas: &mut Canvas<'_>, tick: u64) -> Result<()> {
        let soc = canvas
            .state()
            .get(Signal::StateOfCharge)
            .map_or(0.0, |reading| reading.value);
        let lit = lit_pixel_count(soc, canvas.led_count());
        let color = dim(self.color, Self::level(tick));

        let indices: Vec<usize> = canvas.zone().indices().collect();
        for index in indices {
            let pixel = if index < lit { color } else { Rgb::default() };
            canvas.set(index, pixel);
        }
        Ok(())
    }
}
