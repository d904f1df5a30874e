//! Field-resolution persistent state: fertility, climate regime, and
//! irrigation capital rasters (`SPEC_FULL.md` §3, §4.3).

use crate::types::{ClimateRegime, FieldIndex};

#[derive(Debug, Clone)]
pub struct FieldState {
    width: i32,
    height: i32,
    pub fertility: Vec<f32>,
    pub regime: Vec<u8>,
    pub irrigation_capital: Vec<f32>,
}

impl FieldState {
    pub fn new(width: i32, height: i32) -> Self {
        let count = (width.max(0) as usize) * (height.max(0) as usize);
        Self {
            width,
            height,
            fertility: vec![0.5_f32; count],
            regime: vec![ClimateRegime::Normal as u8; count],
            irrigation_capital: vec![0.0_f32; count],
        }
    }

    pub fn width(&self) -> i32 {
        self.width
    }

    pub fn height(&self) -> i32 {
        self.height
    }

    pub fn len(&self) -> usize {
        self.fertility.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fertility.is_empty()
    }

    pub fn index(&self, fx: i32, fy: i32) -> FieldIndex {
        (fy as usize) * (self.width as usize) + (fx as usize)
    }

    pub fn regime_at(&self, idx: FieldIndex) -> ClimateRegime {
        ClimateRegime::from_u8(self.regime[idx])
    }

    pub fn set_regime_at(&mut self, idx: FieldIndex, regime: ClimateRegime) {
        self.regime[idx] = regime as u8;
    }

    /// Resizes in place when the host's field dimensions change, resetting
    /// all state (matches the reference implementation's re-init-on-resize
    /// behavior rather than attempting a lossy interpolation).
    pub fn resize(&mut self, width: i32, height: i32) {
        if width == self.width && height == self.height {
            return;
        }
        *self = Self::new(width, height);
    }
}
