use log::trace;
use nalgebra::Point3;

use super::Viewer;
use crate::contour::{ContourAnchor, EditorState, SegmentationEditor};
use crate::enums::{ContourMode, SegmentationMode};
use crate::error::ViewerError;
use crate::resample::Resampler;
use crate::segment_table::NUMBER_OF_SEGMENTS;
use crate::settings::RegionGrowingSettings;

impl<R: Resampler> Viewer<R> {
    pub fn editor(&self) -> &SegmentationEditor {
        &self.editor
    }

    pub fn contour_state(&self) -> EditorState {
        self.editor.state()
    }

    pub fn segmentation_mode(&self) -> SegmentationMode {
        self.segmentation_mode
    }

    pub fn set_segmentation_mode(&mut self, mode: SegmentationMode) {
        self.segmentation_mode = mode;
    }

    pub fn brush_width(&self) -> usize {
        self.brush_width
    }

    pub fn set_brush_width(&mut self, width: usize) {
        self.brush_width = width.max(1);
    }

    pub fn region_growing(&self) -> &RegionGrowingSettings {
        &self.region_growing
    }

    pub fn set_region_growing(&mut self, settings: RegionGrowingSettings) {
        self.region_growing = settings;
    }

    /// World point under a screen pixel if it lies in the anchored viewport.
    ///
    /// Without an anchor the viewport under the pixel becomes the anchor when
    /// `begin` is set; otherwise the point is rejected.
    fn anchored_point(&mut self, px: f64, py: f64, begin: bool) -> Option<Point3<f64>> {
        let (k, world) = self.locate(px, py)?;
        match self.editor.anchor() {
            Some(anchor) if anchor.viewport == k => Some(world),
            Some(_) => {
                trace!("Ignoring point outside the anchored viewport");
                None
            }
            None if begin => {
                let target = self.target.volume()?;
                let state = &self.viewports[k];
                let anchor = ContourAnchor {
                    viewport: k,
                    mode: state.viewport.mode(),
                };
                self.editor.begin(anchor, &state.grid, target.geometry());
                self.editor.anchor().map(|_| world)
            }
            None => None,
        }
    }

    /// Add a traced point at a screen pixel. Returns whether it was taken.
    pub fn add_contour_point(&mut self, px: f64, py: f64, mode: ContourMode) -> bool {
        let Some(world) = self.anchored_point(px, py, true) else {
            return false;
        };
        self.editor
            .add_point(world, mode, self.segmentation_mode, self.brush_width);
        true
    }

    /// Flood fill the traced outline from a screen pixel. Returns the number
    /// of newly selected pixels.
    pub fn fill_area(&mut self, px: f64, py: f64) -> usize {
        match self.anchored_point(px, py, false) {
            Some(world) => self.editor.fill_area(world),
            None => 0,
        }
    }

    /// Grow a region through the target from the voxel under a screen pixel
    /// using the current region growing settings.
    pub fn region_grow_contour(&mut self, px: f64, py: f64) -> usize {
        let Some(world) = self.anchored_point(px, py, true) else {
            return 0;
        };
        let Some(target) = self.target.volume() else {
            return 0;
        };
        self.editor
            .region_grow(target, self.target.frame(), world, &self.region_growing)
    }

    pub fn undo_contour(&mut self) {
        self.editor.undo();
    }

    pub fn clear_contour(&mut self) {
        self.editor.clear();
    }

    /// Write `label` into the segmentation under the selection and clear it.
    /// Returns the number of segmentation voxels written.
    pub fn fill_contour(&mut self, label: i32) -> Result<usize, ViewerError> {
        if !(0..NUMBER_OF_SEGMENTS as i32).contains(&label) {
            return Err(ViewerError::InvalidLabel(label));
        }
        let Some(target) = self.target.volume() else {
            self.editor.clear();
            return Ok(0);
        };
        Ok(self
            .editor
            .commit(label as i16, &mut self.segmentation, target.geometry()))
    }
}
