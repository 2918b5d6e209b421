use super::EffectRenderer;
use crate::compositor::Canvas;
use crate::types::{Result, Rgb};

/// Forward-collision strobe over the whole strip
pub struct CollisionStrobe {
    color: Rgb,
}

impl CollisionStrobe {
    pub fn new(color: Rgb) -> Self {
        Self { color }
    }
}

impl EffectRenderer for CollisionStrobe {
    fn render(&mut self, canvas: &mut Canvas<'_>, tick: u64) -> Result<()> {
        let color = if tick % 2 == 0 { self.color } else { Rgb::default() };
        canvas.fill(color);
        Ok(())
    }
}
