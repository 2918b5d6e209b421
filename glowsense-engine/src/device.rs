//! LED device abstraction
//!
//! The compositor talks to the physical strip through [`LedDevice`]. Any
//! `smart_leds` driver can be plugged in through [`SmartLedsDevice`];
//! [`MemoryDevice`] keeps the strip in memory for tests and dry runs.

use crate::types::{EngineError, Result, Rgb};
use smart_leds::SmartLedsWrite;
use std::sync::{Arc, Mutex, MutexGuard};

/// Abstract LED driver
///
/// Implement this trait to support different hardware platforms.
pub trait LedDevice: Send {
    /// Number of addressable pixels
    fn len(&self) -> usize;

    /// Stage a pixel colour; takes effect on the next [`show`](LedDevice::show)
    fn set_pixel(&mut self, index: usize, color: Rgb);

    /// Strip-wide brightness scale (0-255)
    fn set_global_brightness(&mut self, level: u8);

    /// Push staged pixels to the strip
    fn show(&mut self) -> Result<()>;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Adapter for any `smart_leds` driver
pub struct SmartLedsDevice<W> {
    writer: W,
    pixels: Vec<Rgb>,
    brightness: u8,
}

impl<W> SmartLedsDevice<W>
where
    W: SmartLedsWrite<Color = Rgb>,
{
    pub fn new(writer: W, led_count: usize) -> Self {
        Self {
            writer,
            pixels: vec![Rgb::default(); led_count],
            brightness: u8::MAX,
        }
    }
}

impl<W> LedDevice for SmartLedsDevice<W>
where
    W: SmartLedsWrite<Color = Rgb> + Send,
    W::Error: std::fmt::Debug,
{
    fn len(&self) -> usize {
        self.pixels.len()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.pixels.get_mut(index) {
            *pixel = color;
        }
    }

    fn set_global_brightness(&mut self, level: u8) {
        self.brightness = level;
    }

    fn show(&mut self) -> Result<()> {
        let pixels = smart_leds::brightness(self.pixels.iter().copied(), self.brightness);
        self.writer
            .write(pixels)
            .map_err(|e| EngineError::Device(format!("{:?}", e)))
    }
}

/// Strip contents as last shown
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MemoryStrip {
    /// Pixels staged but not necessarily shown
    pub staged: Vec<Rgb>,
    /// Pixels at the most recent `show`
    pub shown: Vec<Rgb>,
    pub brightness: u8,
    /// Number of `show` calls
    pub frames: u64,
}

/// In-memory strip; clones share the same pixels
#[derive(Debug, Clone)]
pub struct MemoryDevice {
    strip: Arc<Mutex<MemoryStrip>>,
}

impl MemoryDevice {
    pub fn new(led_count: usize) -> Self {
        Self {
            strip: Arc::new(Mutex::new(MemoryStrip {
                staged: vec![Rgb::default(); led_count],
                shown: vec![Rgb::default(); led_count],
                brightness: u8::MAX,
                frames: 0,
            })),
        }
    }

    fn lock(&self) -> MutexGuard<'_, MemoryStrip> {
        self.strip.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Copy of the strip state
    pub fn snapshot(&self) -> MemoryStrip {
        self.lock().clone()
    }

    /// Colour of one pixel as last shown
    pub fn shown_pixel(&self, index: usize) -> Option<Rgb> {
        self.lock().shown.get(index).copied()
    }

    pub fn frames(&self) -> u64 {
        self.lock().frames
    }
}

impl LedDevice for MemoryDevice {
    fn len(&self) -> usize {
        self.lock().staged.len()
    }

    fn set_pixel(&mut self, index: usize, color: Rgb) {
        if let Some(pixel) = self.lock().staged.get_mut(index) {
            *pixel = color;
        }
    }

    fn set_global_brightness(&mut self, level: u8) {
        self.lock().brightness = level;
    }

    fn show(&mut self) -> Result<()> {
        let mut strip = self.lock();
        strip.shown = strip.staged.clone();
        strip.frames += 1;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct VecWriter {
        written: Vec<Rgb>,
    }

    impl SmartLedsWrite for VecWriter {
        type Error = ();
        type Color = Rgb;

        fn write<T, I>(&mut self, iterator: T) -> std::result::Result<(), Self::Error>
        where
            T: IntoIterator<Item = I>,
            I: Into<Self::Color>,
        {
            self.written = iterator.into_iter().map(Into::into).collect();
            Ok(())
        }
    }

    #[test]
    fn test_memory_device_shows_staged_pixels() {
        let device = MemoryDevice::new(4);
        let mut handle = device.clone();
        handle.set_pixel(1, Rgb::new(1, 2, 3));
        handle.set_pixel(10, Rgb::new(9, 9, 9));
        assert_eq!(device.shown_pixel(1), Some(Rgb::default()));

        handle.show().unwrap();
        assert_eq!(device.shown_pixel(1), Some(Rgb::new(1, 2, 3)));
        assert_eq!(device.frames(), 1);
        assert_eq!(device.len(), 4);
    }

    #[test]
    fn test_smart_leds_adapter_applies_brightness() {
        let mut device = SmartLedsDevice::new(VecWriter { written: Vec::new() }, 2);
        device.set_pixel(0, Rgb::new(255, 255, 255));
        device.set_global_brightness(0);
        device.show().unwrap();

        assert_eq!(device.writer.written, vec![Rgb::new(0, 0, 0); 2]);
    }
}
