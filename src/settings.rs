//! Session state that a surrounding layer persists between runs.

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::config::ConfigMode;
use crate::enums::{
    Connectivity, CursorMode, DisplayMode, Interpolation, RegionGrowingMode, SegmentationMode,
    ViewMode,
};
use crate::error::ViewerError;
use crate::lut::ColorMode;
use crate::slot::DISPLAY_RANGE;

/// Overlay toggles. Only the segmentation labels affect compositing; the
/// rest are read by whoever draws on top of the composited buffers.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct DisplayFlags {
    pub cursor: bool,
    pub cursor_mode: CursorMode,
    pub axis_labels: bool,
    pub segmentation_labels: bool,
    pub segmentation_contours: bool,
    pub target_isolines: bool,
    pub source_isolines: bool,
    pub landmarks: bool,
    pub roi: bool,
}

impl Default for DisplayFlags {
    fn default() -> Self {
        Self {
            cursor: true,
            cursor_mode: CursorMode::default(),
            axis_labels: true,
            segmentation_labels: true,
            segmentation_contours: false,
            target_isolines: false,
            source_isolines: false,
            landmarks: false,
            roi: false,
        }
    }
}

/// Display window and color mode of one lookup table, in internal
/// intensity units.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct LutSettings {
    pub display_min: i32,
    pub display_max: i32,
    pub color_mode: ColorMode,
}

impl LutSettings {
    fn new(display_min: i32, display_max: i32, color_mode: ColorMode) -> Self {
        Self {
            display_min,
            display_max,
            color_mode,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct RegionGrowingSettings {
    pub min: f64,
    pub max: f64,
    pub mode: RegionGrowingMode,
    pub connectivity: Connectivity,
}

impl Default for RegionGrowingSettings {
    fn default() -> Self {
        Self {
            min: 0.0,
            max: 0.0,
            mode: RegionGrowingMode::default(),
            connectivity: Connectivity::default(),
        }
    }
}

#[derive(Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub struct ViewerSettings {
    pub screen_width: u32,
    pub screen_height: u32,
    /// Cursor position in world coordinates (mm)
    pub origin: [f64; 3],
    /// Screen pixels per millimetre
    pub resolution: f64,
    pub config_mode: ConfigMode,
    pub view_mode: ViewMode,
    pub view_mix: f64,
    pub target_lut: LutSettings,
    pub source_lut: LutSettings,
    pub subtraction_lut: LutSettings,
    pub target_interpolation: Interpolation,
    pub source_interpolation: Interpolation,
    pub display: DisplayFlags,
    pub snap_to_grid: bool,
    pub display_mode: DisplayMode,
    pub flip: [bool; 3],
    pub source_transform_apply: bool,
    pub source_transform_invert: bool,
    pub cache_displacements: bool,
    pub segmentation_mode: SegmentationMode,
    pub brush_width: usize,
    pub region_growing: RegionGrowingSettings,
}

impl Default for ViewerSettings {
    fn default() -> Self {
        Self {
            screen_width: 512,
            screen_height: 512,
            origin: [0.0; 3],
            resolution: 1.0,
            config_mode: ConfigMode::default(),
            view_mode: ViewMode::default(),
            view_mix: 0.5,
            target_lut: LutSettings::new(0, DISPLAY_RANGE, ColorMode::Luminance),
            source_lut: LutSettings::new(0, DISPLAY_RANGE, ColorMode::Luminance),
            subtraction_lut: LutSettings::new(-DISPLAY_RANGE, DISPLAY_RANGE, ColorMode::Luminance),
            target_interpolation: Interpolation::default(),
            source_interpolation: Interpolation::default(),
            display: DisplayFlags::default(),
            snap_to_grid: true,
            display_mode: DisplayMode::default(),
            flip: [false; 3],
            source_transform_apply: true,
            source_transform_invert: false,
            cache_displacements: false,
            segmentation_mode: SegmentationMode::default(),
            brush_width: 1,
            region_growing: RegionGrowingSettings::default(),
        }
    }
}

impl ViewerSettings {
    /// Reject values no viewer can be configured with.
    pub fn validate(&self) -> Result<(), ViewerError> {
        if self.screen_width == 0 || self.screen_height == 0 {
            return Err(ViewerError::InvalidScreen {
                width: self.screen_width,
                height: self.screen_height,
            });
        }
        if !self.resolution.is_finite() || self.resolution <= 0.0 {
            return Err(ViewerError::InvalidResolution(self.resolution));
        }
        Ok(())
    }
}
