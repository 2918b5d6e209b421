//! Effect zones and the zone resolution rules
//!
//! Every effect owns a static zone; turn signals are truncated while the
//! blind-spot warning on the same side is live, and all other overlays give
//! way while the forward-collision alert is live.

use crate::config::StripLayout;
use crate::effects::{EffectId, Layer};
use std::ops::Range;

/// Pixel ranges an effect may draw into
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct Zone {
    spans: Vec<Range<usize>>,
}

impl Zone {
    pub fn empty() -> Self {
        Self::default()
    }

    /// Contiguous zone; empty ranges produce an empty zone
    pub fn span(range: Range<usize>) -> Self {
        Self::from_spans([range])
    }

    /// Composite zone built from several ranges
    pub fn from_spans<I>(spans: I) -> Self
    where
        I: IntoIterator<Item = Range<usize>>,
    {
        Self {
            spans: spans.into_iter().filter(|r| r.start < r.end).collect(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.spans.is_empty()
    }

    /// Number of pixels in the zone
    pub fn len(&self) -> usize {
        self.spans.iter().map(|r| r.end - r.start).sum()
    }

    pub fn spans(&self) -> &[Range<usize>] {
        &self.spans
    }

    /// Pixel indices in ascending span order
    pub fn indices(&self) -> impl Iterator<Item = usize> + '_ {
        self.spans.iter().flat_map(|r| r.clone())
    }

    pub fn contains(&self, index: usize) -> bool {
        self.spans.iter().any(|r| r.contains(&index))
    }

    /// Smallest range covering the whole zone
    pub fn bounds(&self) -> Option<Range<usize>> {
        let start = self.spans.iter().map(|r| r.start).min()?;
        let end = self.spans.iter().map(|r| r.end).max()?;
        Some(start..end)
    }
}

/// Read-only view of which effects currently have a live task
///
/// Reads are relaxed: a sibling may be seen one tick late, and the next
/// render tick corrects the zone.
pub trait Liveness {
    fn is_live(&self, id: EffectId) -> bool;
}

fn left(layout: &StripLayout, length: usize) -> Range<usize> {
    0..length.min(layout.led_count)
}

fn right(layout: &StripLayout, length: usize) -> Range<usize> {
    layout.led_count.saturating_sub(length)..layout.led_count
}

/// Zone an effect may draw into right now
pub fn resolve_zone(id: EffectId, layout: &StripLayout, liveness: &dyn Liveness) -> Zone {
    if id.layer() == Layer::Overlay
        && id != EffectId::ForwardCollision
        && liveness.is_live(EffectId::ForwardCollision)
    {
        return Zone::empty();
    }

    let count = layout.led_count;
    let signal = layout.signal_length;
    let blindspot = layout.blindspot_length;

    match id {
        EffectId::LeftTurn => {
            let zone = left(layout, signal);
            if liveness.is_live(EffectId::LeftBlindSpot) {
                Zone::span(blindspot.min(zone.end)..zone.end)
            } else {
                Zone::span(zone)
            }
        }
        EffectId::RightTurn => {
            let zone = right(layout, signal);
            if liveness.is_live(EffectId::RightBlindSpot) {
                Zone::span(zone.start..count.saturating_sub(blindspot).max(zone.start))
            } else {
                Zone::span(zone)
            }
        }
        EffectId::LeftBlindSpot => Zone::span(left(layout, blindspot)),
        EffectId::RightBlindSpot => Zone::span(right(layout, blindspot)),
        EffectId::HandsOnNag => Zone::span(signal.min(count)..count.saturating_sub(signal)),
        EffectId::ForwardCollision | EffectId::Autopilot | EffectId::Charging => Zone::span(0..count),
    }
}

/// Pixels held by live overlays, which base-layer writes must not show through
pub fn overlay_mask(layout: &StripLayout, liveness: &dyn Liveness) -> Vec<bool> {
    let mut mask = vec![false; layout.led_count];
    for id in EffectId::ALL {
        if id.layer() != Layer::Overlay || !liveness.is_live(id) {
            continue;
        }
        for index in resolve_zone(id, layout, liveness).indices() {
            if let Some(owned) = mask.get_mut(index) {
                *owned = true;
            }
        }
    }
    mask
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Live(Vec<EffectId>);

    impl Liveness for Live {
        fn is_live(&self, id: EffectId) -> bool {
            self.0.contains(&id)
        }
    }

    const LAYOUT: StripLayout = StripLayout {
        led_count: 60,
        signal_length: 20,
        blindspot_length: 5,
    };

    #[test]
    fn test_turn_zone_without_blind_spot() {
        let zone = resolve_zone(EffectId::LeftTurn, &LAYOUT, &Live(vec![]));
        assert_eq!(zone, Zone::span(0..20));
        let zone = resolve_zone(EffectId::RightTurn, &LAYOUT, &Live(vec![]));
        assert_eq!(zone, Zone::span(40..60));
    }

    #[test]
    fn test_turn_zone_truncated_by_live_blind_spot() {
        let live = Live(vec![EffectId::LeftBlindSpot, EffectId::RightBlindSpot]);
        let left = resolve_zone(EffectId::LeftTurn, &LAYOUT, &live);
        assert_eq!(left, Zone::span(5..20));
        assert!(!left.contains(0) && !left.contains(4));

        let right = resolve_zone(EffectId::RightTurn, &LAYOUT, &live);
        assert_eq!(right, Zone::span(40..55));
    }

    #[test]
    fn test_blind_spot_owns_outermost_pixels() {
        let live = Live(vec![EffectId::LeftTurn]);
        assert_eq!(resolve_zone(EffectId::LeftBlindSpot, &LAYOUT, &live), Zone::span(0..5));
        assert_eq!(resolve_zone(EffectId::RightBlindSpot, &LAYOUT, &live), Zone::span(55..60));
    }

    #[test]
    fn test_collision_preempts_other_overlays() {
        let live = Live(vec![EffectId::ForwardCollision, EffectId::LeftTurn]);
        assert!(resolve_zone(EffectId::LeftTurn, &LAYOUT, &live).is_empty());
        assert!(resolve_zone(EffectId::HandsOnNag, &LAYOUT, &live).is_empty());
        assert_eq!(resolve_zone(EffectId::ForwardCollision, &LAYOUT, &live).len(), 60);
        // Base layers keep their zone and are masked instead
        assert_eq!(resolve_zone(EffectId::Autopilot, &LAYOUT, &live).len(), 60);
    }

    #[test]
    fn test_overlay_mask() {
        let live = Live(vec![EffectId::LeftTurn, EffectId::LeftBlindSpot, EffectId::Autopilot]);
        let mask = overlay_mask(&LAYOUT, &live);
        assert!(mask[..20].iter().all(|&owned| owned));
        assert!(mask[20..].iter().all(|&owned| !owned));
    }

    #[test]
    fn test_short_strip_clamps_zones() {
        let layout = StripLayout {
            led_count: 8,
            signal_length: 20,
            blindspot_length: 5,
        };
        let live = Live(vec![EffectId::LeftBlindSpot]);
        assert_eq!(resolve_zone(EffectId::LeftTurn, &layout, &live), Zone::span(5..8));
        assert!(resolve_zone(EffectId::HandsOnNag, &layout, &live).is_empty());
    }

    #[test]
    fn test_composite_zone() {
        let zone = Zone::from_spans([0..3, 7..9, 4..4]);
        assert_eq!(zone.len(), 5);
        assert_eq!(zone.indices().collect::<Vec<_>>(), vec![0, 1, 2, 7, 8]);
        assert_eq!(zone.bounds(), Some(0..9));
    }
}
