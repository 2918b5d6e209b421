//! Strip that reports its contents through the log
//!
//! Used when no hardware driver is attached: every `log_every` shows, the
//! strip is printed as runs of identical colours.

use glowsense_engine::{LedDevice, Rgb};

pub struct LogDevice {
    pixels: Vec<Rgb>,
    brightness: u8,
    log_every: u64,
    shows: u64,
}

impl LogDevice {
    pub fn new(led_count: usize, log_every: u64) -> Self {
        Self {
            pixels: vec![Rgb::default(); led_count],
            brightness: u8::MAX,
            log_every,
            shows: 0,
        }
    }

    /// Run-length summary, e.g. `20x(255,255,0) 40x(255,165,0)`
    pub fn summary(&self) -> String {
        let mut runs: Vec<(usize, Rgb)> = Vec::new();
        for &pixel in &self.pixels {
            match runs.last_mut() {
                Some((count, color)) if *color == pixel => *count += 1,
                _ => runs.push((1, pixel)),
            }
        }
        runs.iter()
            .map(|(count, c)| format!("{}x({},{},{})", count, c.r, c.g, c.b))
            .collect::<Vec<_>>()
            .join(" ")
    }
}

impl LedDevice for LogDevice {
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn set_global_brightness(&mut self, level: u8) {
        if level != self.brightness {
            log::info!("Strip brightness {}", level);
        }
        self.brightness = level;
    }

    fn show(&mut self) -> glowsense_engine::Result<()> {
        self.shows += 1;
        if self.log_every > 0 && self.shows % self.log_every == 0 {
            log::debug!("[strip] {}", self.summary());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_summary_groups_runs() {
        let mut device = LogDevice::new(6, 1);
        for i in 0..2 {
            device.set_pixel(i, Rgb::new(255, 255, 0));
        }
        for i in 2..6 {
            device.set_pixel(i, Rgb::new(255, 165, 0));
        }
        device.set_pixel(99, Rgb::new(1, 1, 1));

        assert_eq!(device.summary(), "2x(255,255,0) 4x(255,165,0)");
        assert!(device.show().is_ok());
        assert_eq!(device.len(), 6);
    }
}
