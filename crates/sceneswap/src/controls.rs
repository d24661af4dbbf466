//! Lock-free runtime controls shared between a UI thread and the render loop.

use crate::filters::FilterKind;
use std::sync::atomic::{AtomicU32, AtomicU8, Ordering};

pub const DEFAULT_MIX_FACTOR: f32 = 1.0;

/// Mix factor and active filter.
///
/// Writers and the render loop never lock; the render loop reads each value
/// once per frame and tolerates seeing a slightly stale one.
#[derive(Debug)]
pub struct RenderControls {
    mix_bits: AtomicU32,
    filter: AtomicU8,
}

impl Default for RenderControls {
    fn default() -> Self {
        Self::new(DEFAULT_MIX_FACTOR, FilterKind::default())
    }
}

impl RenderControls {
    pub fn new(mix_factor: f32, filter: FilterKind) -> Self {
        Self {
            mix_bits: AtomicU32::new(mix_factor.to_bits()),
            filter: AtomicU8::new(filter.index() as u8),
        }
    }

    /// Stores the value as given; clamping happens on read.
    pub fn set_mix_factor(&self, value: f32) {
        self.mix_bits.store(value.to_bits(), Ordering::Relaxed);
    }

    /// Latest mix factor, clamped to `[0, 1]`. NaN reads as the default.
    pub fn mix_factor(&self) -> f32 {
        let raw = f32::from_bits(self.mix_bits.load(Ordering::Relaxed));
        if raw.is_nan() {
            DEFAULT_MIX_FACTOR
        } else {
            raw.clamp(0.0, 1.0)
        }
    }

    pub fn set_active_filter(&self, kind: FilterKind) {
        self.filter.store(kind.index() as u8, Ordering::Relaxed);
    }

    pub fn active_filter(&self) -> FilterKind {
        FilterKind::from_index(self.filter.load(Ordering::Relaxed) as usize).unwrap_or_default()
    }
}
