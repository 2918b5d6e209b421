//! LED compositor
//!
//! Resolves concurrently running effects into pixel writes on the shared
//! strip. Two layers are kept:
//!
//! - the **base layer**: default colour, autopilot blue or the charging pulse
//! - the **visible frame**: base layer plus whatever overlays drew on top
//!
//! Effects draw through a [`Canvas`] limited to their resolved zone. Writes are
//! staged and only committed when the render routine succeeds, so a failing
//! tick leaves the zone in its last colour. Pixels are stored as packed atomics,
//! so effects with disjoint zones never contend; only the device flush is
//! serialised behind one lock.

mod zone;

pub use zone::{overlay_mask, resolve_zone, Liveness, Zone};

use crate::config::{BrightnessConfig, StripLayout};
use crate::device::LedDevice;
use crate::effects::{EffectId, EffectRenderer, Layer};
use crate::state::VehicleState;
use crate::types::{EngineError, Result, Rgb};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::{Mutex, MutexGuard};

fn pack(color: Rgb) -> u32 {
    (u32::from(color.r) << 16) | (u32::from(color.g) << 8) | u32::from(color.b)
}

fn unpack(value: u32) -> Rgb {
    Rgb::new((value >> 16) as u8, (value >> 8) as u8, value as u8)
}

/// Scale an 8-bit value by a factor (0-255 = 0.0-1.0)
pub const fn scale8(value: u8, scale: u8) -> u8 {
    ((value as u16 * (1 + scale as u16)) >> 8) as u8
}

/// Dim a colour to `level` (0-255)
pub fn dim(color: Rgb, level: u8) -> Rgb {
    Rgb::new(scale8(color.r, level), scale8(color.g, level), scale8(color.b, level))
}

/// Map the UI brightness percentage onto the device brightness range
pub fn scale_brightness(percent: f64, range: &BrightnessConfig) -> u8 {
    let percent = if percent.is_finite() { percent.clamp(0.0, 100.0) } else { 100.0 };
    let (min, max) = (f64::from(range.min.min(range.max)), f64::from(range.max.max(range.min)));
    (min + (max - min) * percent / 100.0).round() as u8
}

struct PixelLayer {
    pixels: Vec<AtomicU32>,
}

impl PixelLayer {
    fn filled(len: usize, color: Rgb) -> Self {
        Self {
            pixels: (0..len).map(|_| AtomicU32::new(pack(color))).collect(),
        }
    }

    fn get(&self, index: usize) -> Option<Rgb> {
        self.pixels
            .get(index)
            .map(|pixel| unpack(pixel.load(Ordering::Acquire)))
    }

    fn set(&self, index: usize, color: Rgb) {
        if let Some(pixel) = self.pixels.get(index) {
            pixel.store(pack(color), Ordering::Release);
        }
    }
}

/// Shared strip state and the device it is flushed to
pub struct Compositor {
    layout: StripLayout,
    default_color: Rgb,
    base: PixelLayer,
    visible: PixelLayer,
    /// While set, effects only update the base layer
    held: AtomicBool,
    device: Mutex<Box<dyn LedDevice>>,
}

impl Compositor {
    /// Create a compositor with every pixel at the default colour
    ///
    /// Fails if the device has fewer pixels than the configured strip.
    pub fn new(layout: StripLayout, default_color: Rgb, device: Box<dyn LedDevice>) -> Result<Self> {
        if device.len() < layout.led_count {
            return Err(EngineError::Device(format!(
                "device has {} pixels, strip layout needs {}",
                device.len(),
                layout.led_count
            )));
        }
        Ok(Self {
            layout,
            default_color,
            base: PixelLayer::filled(layout.led_count, default_color),
            visible: PixelLayer::filled(layout.led_count, default_color),
            held: AtomicBool::new(false),
            device: Mutex::new(device),
        })
    }

    pub fn layout(&self) -> &StripLayout {
        &self.layout
    }

    pub fn default_color(&self) -> Rgb {
        self.default_color
    }

    /// Visible colour of a pixel
    pub fn pixel(&self, index: usize) -> Option<Rgb> {
        self.visible.get(index)
    }

    /// Base-layer colour of a pixel
    pub fn base_pixel(&self, index: usize) -> Option<Rgb> {
        self.base.get(index)
    }

    /// Run one render tick of an effect and flush its zone
    pub fn render(
        &self,
        id: EffectId,
        renderer: &mut dyn EffectRenderer,
        tick: u64,
        liveness: &dyn Liveness,
        state: &VehicleState,
    ) -> Result<()> {
        let Some(mut canvas) = self.canvas(id, liveness, state) else {
            return Ok(());
        };
        renderer.render(&mut canvas, tick)?;
        self.commit(canvas)
    }

    /// Run the single cleanup render of a stopping effect
    pub fn cleanup(
        &self,
        id: EffectId,
        renderer: &mut dyn EffectRenderer,
        liveness: &dyn Liveness,
        state: &VehicleState,
    ) -> Result<()> {
        // The base layer already belongs to the effect taking over
        if id.layer() == Layer::Base && Self::other_base_live(id, liveness) {
            log::trace!("Cleanup of {} skipped, base layer handed over", id);
            return Ok(());
        }
        // A preempted overlay has nothing on screen; the preempting
        // effect's own cleanup reveals the base layer
        let Some(mut canvas) = self.canvas(id, liveness, state) else {
            return Ok(());
        };
        renderer.cleanup(&mut canvas)?;
        self.commit(canvas)
    }

    fn other_base_live(id: EffectId, liveness: &dyn Liveness) -> bool {
        EffectId::ALL
            .into_iter()
            .any(|other| other != id && other.layer() == Layer::Base && liveness.is_live(other))
    }

    fn canvas<'a>(&'a self, id: EffectId, liveness: &dyn Liveness, state: &'a VehicleState) -> Option<Canvas<'a>> {
        let zone = resolve_zone(id, &self.layout, liveness);
        if zone.is_empty() {
            return None;
        }
        let mask = match id.layer() {
            Layer::Base => overlay_mask(&self.layout, liveness),
            Layer::Overlay => Vec::new(),
        };
        Some(Canvas {
            compositor: self,
            state,
            layer: id.layer(),
            zone,
            mask,
            writes: Vec::new(),
        })
    }

    fn commit(&self, canvas: Canvas<'_>) -> Result<()> {
        let Canvas {
            layer,
            zone,
            mask,
            writes,
            ..
        } = canvas;

        if self.is_held() {
            if layer == Layer::Base {
                for (index, color) in writes {
                    self.base.set(index, color);
                }
            }
            return Ok(());
        }

        for (index, color) in writes {
            match layer {
                Layer::Overlay => self.visible.set(index, color),
                Layer::Base => {
                    self.base.set(index, color);
                    if !mask.get(index).copied().unwrap_or(false) {
                        self.visible.set(index, color);
                    }
                }
            }
        }
        self.flush(zone.indices())
    }

    fn lock_device(&self) -> MutexGuard<'_, Box<dyn LedDevice>> {
        self.device.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    /// Push a region of the visible frame to the device and show it
    fn flush<I>(&self, indices: I) -> Result<()>
    where
        I: IntoIterator<Item = usize>,
    {
        let mut device = self.lock_device();
        for index in indices {
            if let Some(color) = self.visible.get(index) {
                device.set_pixel(index, color);
            }
        }
        device.show()?;
        log::trace!("Strip flushed");
        Ok(())
    }

    fn whole_strip(&self) -> std::ops::Range<usize> {
        0..self.layout.led_count
    }

    /// Put both layers back to the default colour and show it
    ///
    /// Also releases a held indication.
    pub fn reset(&self) -> Result<()> {
        self.held.store(false, Ordering::Release);
        for index in self.whole_strip() {
            self.base.set(index, self.default_color);
            self.visible.set(index, self.default_color);
        }
        self.flush(self.whole_strip())
    }

    /// Show a solid colour on the visible frame without touching the base layer
    pub fn fill_visible(&self, color: Rgb) -> Result<()> {
        for index in self.whole_strip() {
            self.visible.set(index, color);
        }
        self.flush(self.whole_strip())
    }

    /// Show a solid indication over the whole strip and keep effects off the
    /// visible frame until [`release`](Self::release)
    pub fn hold(&self, color: Rgb) -> Result<()> {
        self.held.store(true, Ordering::Release);
        self.fill_visible(color)
    }

    /// End a held indication and show the base layer again
    pub fn release(&self) -> Result<()> {
        self.held.store(false, Ordering::Release);
        self.restore_visible()
    }

    pub fn is_held(&self) -> bool {
        self.held.load(Ordering::Acquire)
    }

    /// Copy the base layer back onto the visible frame
    pub fn restore_visible(&self) -> Result<()> {
        for index in self.whole_strip() {
            if let Some(color) = self.base.get(index) {
                self.visible.set(index, color);
            }
        }
        self.flush(self.whole_strip())
    }

    /// Apply a strip-wide brightness without disturbing running effects
    pub fn set_global_brightness(&self, level: u8) -> Result<()> {
        let mut device = self.lock_device();
        device.set_global_brightness(level);
        device.show()
    }
}

/// Zone-limited drawing surface handed to an effect for one render tick
pub struct Canvas<'a> {
    compositor: &'a Compositor,
    state: &'a VehicleState,
    layer: Layer,
    zone: Zone,
    mask: Vec<bool>,
    writes: Vec<(usize, Rgb)>,
}

impl<'a> Canvas<'a> {
    pub fn zone(&self) -> &Zone {
        &self.zone
    }

    pub fn state(&self) -> &'a VehicleState {
        self.state
    }

    pub fn led_count(&self) -> usize {
        self.compositor.layout.led_count
    }

    /// Set a pixel by absolute index; indices outside the zone are ignored
    pub fn set(&mut self, index: usize, color: Rgb) {
        if self.zone.contains(index) {
            self.writes.push((index, color));
        }
    }

    /// Paint the whole zone
    pub fn fill(&mut self, color: Rgb) {
        let indices: Vec<usize> = self.zone.indices().collect();
        self.writes.extend(indices.into_iter().map(|index| (index, color)));
    }

    /// Return the zone to what lies beneath this effect
    ///
    /// Overlays reveal the current base layer; base layers fall back to the
    /// default colour.
    pub fn clear(&mut self) {
        match self.layer {
            Layer::Overlay => {
                let restored: Vec<(usize, Rgb)> = self
                    .zone
                    .indices()
                    .filter_map(|index| self.compositor.base.get(index).map(|color| (index, color)))
                    .collect();
                self.writes.extend(restored);
            }
            Layer::Base => {
                let color = self.compositor.default_color;
                self.fill(color);
            }
        }
    }

    /// Current base-layer colour under a pixel
    pub fn base_color(&self, index: usize) -> Option<Rgb> {
        self.compositor.base.get(index)
    }
}
