use log::{debug, trace};
use nalgebra::{Point3, Vector3};

use super::Viewer;
use crate::coords::CoordinateMapper;
use crate::error::ViewerError;
use crate::resample::Resampler;

/// What lies under a screen point.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct CursorInfo {
    pub viewport: usize,
    pub world: Point3<f64>,
    pub target_voxel: Option<[usize; 3]>,
    pub target_value: Option<f64>,
    pub label: Option<i16>,
}

fn cycle(frame: usize, frames: usize, forward: bool) -> usize {
    match (frames, forward) {
        (0, _) => 0,
        (n, true) => (frame + 1) % n,
        (n, false) => (frame + n - 1) % n,
    }
}

impl<R: Resampler> Viewer<R> {
    /// Viewport under a screen pixel (origin top left) and the world point
    /// on its slice plane.
    pub(super) fn locate(&self, px: f64, py: f64) -> Option<(usize, Point3<f64>)> {
        let (u, v) = CoordinateMapper::screen_to_normalized(px, py, self.screen.0, self.screen.1);
        let k = CoordinateMapper::locate_viewport(u, v, self.viewports.iter().map(|s| s.viewport.rect()))?;
        let state = &self.viewports[k];
        let (x, y) = CoordinateMapper::normalized_to_viewport_pixel(u, v, &state.viewport);
        Some((k, CoordinateMapper::viewport_pixel_to_world(x, y, 0.0, &state.grid)))
    }

    pub fn screen_point_to_viewport(&self, px: f64, py: f64) -> Option<usize> {
        self.locate(px, py).map(|(k, _)| k)
    }

    pub fn screen_point_to_world(&self, px: f64, py: f64) -> Option<Point3<f64>> {
        self.locate(px, py).map(|(_, world)| world)
    }

    /// Target voxel coordinates under a screen pixel, rounded to the nearest
    /// voxel when snapping to the grid.
    pub fn screen_point_to_voxel(&self, px: f64, py: f64) -> Option<Point3<f64>> {
        let target = self.target.volume()?;
        let voxel = target.world_to_voxel(self.screen_point_to_world(px, py)?);
        Some(if self.snap_to_grid {
            voxel.map(f64::round)
        } else {
            voxel
        })
    }

    pub fn cursor_info(&self, px: f64, py: f64) -> Option<CursorInfo> {
        let (viewport, world) = self.locate(px, py)?;
        let target = self.target.volume();
        let target_voxel = target.and_then(|v| v.geometry().nearest_voxel(world));
        let target_value = target
            .zip(target_voxel)
            .and_then(|(v, voxel)| v.get(voxel, self.target.frame()))
            .map(f64::from);
        let label = self.segmentation.volume().and_then(|v| {
            let voxel = v.geometry().nearest_voxel(world)?;
            v.get(voxel, self.segmentation.frame())
        });
        Some(CursorInfo {
            viewport,
            world,
            target_voxel,
            target_value,
            label,
        })
    }

    // Cursor

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    /// Move the shared cursor, snapped to the target grid when enabled.
    pub fn set_origin(&mut self, world: Point3<f64>) {
        self.origin = match self.target.volume() {
            Some(target) if self.snap_to_grid => CoordinateMapper::snap_to_grid(world, target.geometry()),
            _ => world,
        };
        trace!("Origin moved to {:?}", self.origin);
        self.refresh_grids();
    }

    /// Move the cursor to the world point under a screen pixel.
    pub fn set_origin_from_screen(&mut self, px: f64, py: f64) -> bool {
        match self.screen_point_to_world(px, py) {
            Some(world) => {
                self.set_origin(world);
                true
            }
            None => false,
        }
    }

    /// Move the cursor `steps` slices along the depth axis of the viewport
    /// under a screen pixel.
    pub fn mouse_wheel(&mut self, px: f64, py: f64, steps: i32) -> bool {
        let Some(k) = self.screen_point_to_viewport(px, py) else {
            return false;
        };
        let grid = &self.viewports[k].grid;
        let delta: Vector3<f64> = grid.axis(2) * (grid.spacing().z * steps as f64);
        self.set_origin(self.origin + delta);
        true
    }

    /// Move the cursor `steps` target voxels along target voxel axis `axis`,
    /// staying inside the target.
    pub fn step_origin(&mut self, axis: usize, steps: i64) -> bool {
        let Some(geometry) = self.target.volume().map(|v| v.geometry().clone()) else {
            return false;
        };
        if axis > 2 {
            return false;
        }
        let mut voxel = geometry.world_to_voxel(self.origin).map(f64::round);
        let last = geometry.size()[axis].saturating_sub(1) as f64;
        voxel[axis] = (voxel[axis] + steps as f64).clamp(0.0, last);
        self.set_origin(geometry.voxel_to_world(voxel));
        true
    }

    // Region of interest

    pub fn roi(&self) -> (Point3<f64>, Point3<f64>) {
        self.roi
    }

    /// World bounding box of the target voxel centres.
    fn target_bounds(&self) -> Option<(Vector3<f64>, Vector3<f64>)> {
        let corners = self.target.volume()?.geometry().corners();
        let lo = corners.iter().fold(Vector3::repeat(f64::INFINITY), |a, c| a.inf(&c.coords));
        let hi = corners
            .iter()
            .fold(Vector3::repeat(f64::NEG_INFINITY), |a, c| a.sup(&c.coords));
        Some((lo, hi))
    }

    /// Reset the region of interest to the target extent.
    pub fn reset_roi(&mut self) {
        self.roi = match self.target_bounds() {
            Some((lo, hi)) => (Point3::from(lo), Point3::from(hi)),
            None => (self.origin, self.origin),
        };
    }

    /// Move the lower ROI corner to the point under a screen pixel.
    pub fn set_roi_corner1(&mut self, px: f64, py: f64) -> bool {
        let (Some(world), Some((lo, _))) = (self.screen_point_to_world(px, py), self.target_bounds()) else {
            return false;
        };
        let corner = world.coords.sup(&lo).inf(&self.roi.1.coords);
        self.roi.0 = Point3::from(corner);
        true
    }

    /// Move the upper ROI corner to the point under a screen pixel.
    pub fn set_roi_corner2(&mut self, px: f64, py: f64) -> bool {
        let (Some(world), Some((_, hi))) = (self.screen_point_to_world(px, py), self.target_bounds()) else {
            return false;
        };
        let corner = world.coords.inf(&hi).sup(&self.roi.0.coords);
        self.roi.1 = Point3::from(corner);
        true
    }

    // Frames

    pub fn target_frame(&self) -> usize {
        self.target.frame()
    }

    /// Select the target frame. The source is resampled at the target time,
    /// so it is dirtied too while its transformation is applied.
    pub fn set_target_frame(&mut self, frame: usize) {
        let previous = self.target.frame();
        self.target.set_frame(frame);
        if self.target.frame() != previous {
            if self.source.apply_transformation() {
                self.source.mark_dirty();
            }
            self.invalidate_cache();
            debug!("Target frame {}", self.target.frame());
        }
    }

    pub fn next_target_frame(&mut self) {
        self.set_target_frame(cycle(self.target.frame(), self.target.frames(), true));
    }

    pub fn previous_target_frame(&mut self) {
        self.set_target_frame(cycle(self.target.frame(), self.target.frames(), false));
    }

    pub fn source_frame(&self) -> usize {
        self.source.frame()
    }

    pub fn set_source_frame(&mut self, frame: usize) {
        let previous = self.source.frame();
        self.source.set_frame(frame);
        if self.source.frame() != previous {
            self.invalidate_cache();
            debug!("Source frame {}", self.source.frame());
        }
    }

    pub fn next_source_frame(&mut self) {
        self.set_source_frame(cycle(self.source.frame(), self.source.frames(), true));
    }

    pub fn previous_source_frame(&mut self) {
        self.set_source_frame(cycle(self.source.frame(), self.source.frames(), false));
    }

    // Resolution

    /// Screen pixels per millimetre.
    pub fn resolution(&self) -> f64 {
        self.resolution
    }

    pub fn set_resolution(&mut self, resolution: f64) -> Result<(), ViewerError> {
        if !resolution.is_finite() || resolution <= 0.0 {
            return Err(ViewerError::InvalidResolution(resolution));
        }
        self.resolution = resolution;
        self.refresh_grids();
        Ok(())
    }

    pub fn zoom(&mut self, factor: f64) -> Result<(), ViewerError> {
        self.set_resolution(self.resolution * factor)
    }

    pub fn zoom_in(&mut self) -> Result<(), ViewerError> {
        self.zoom(2.0)
    }

    pub fn zoom_out(&mut self) -> Result<(), ViewerError> {
        self.zoom(0.5)
    }

    pub fn zoom_in_fine(&mut self) -> Result<(), ViewerError> {
        self.zoom(std::f64::consts::SQRT_2)
    }

    pub fn zoom_out_fine(&mut self) -> Result<(), ViewerError> {
        self.zoom(std::f64::consts::FRAC_1_SQRT_2)
    }

    /// Spacing along the depth axis of viewport `k`.
    pub fn slice_thickness(&self, k: usize) -> Option<f64> {
        self.viewports
            .get(k)
            .map(|state| self.depth_spacing(&state.viewport))
    }
}

#[cfg(test)]
mod tests {
    use super::super::tests::{cube, viewer_with_target};
    use super::*;
    use crate::config::ConfigMode;
    use crate::geometry::GridGeometry;
    use crate::volume::Volume;
    use ndarray::Array4;

    #[test]
    fn screen_points_resolve_to_viewport_and_world() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.configure(ConfigMode::XyXzV).unwrap();
        assert_eq!(viewer.screen_point_to_viewport(10.0, 50.0), Some(0));
        assert_eq!(viewer.screen_point_to_viewport(90.0, 50.0), Some(1));
        assert_eq!(viewer.screen_point_to_viewport(150.0, 50.0), None);
        // The shared edge starts the right viewport and the top row of the
        // screen lies above every viewport
        assert_eq!(viewer.screen_point_to_viewport(50.0, 50.0), Some(1));
        assert_eq!(viewer.screen_point_to_viewport(10.0, 0.0), None);
        assert_eq!(viewer.screen_point_to_viewport(10.0, 0.5), Some(0));

        // Centre pixel of the 50x100 XY viewport sits 0.5 pixels from the
        // cursor in both directions
        let world = viewer.screen_point_to_world(25.0, 50.0).unwrap();
        assert!((world - Point3::new(1.0, 1.0, 0.5)).norm() < 1e-9);
    }

    #[test]
    fn clicked_voxel_round_trips() {
        let viewer = viewer_with_target(4, 100);
        // Screen (50, 50) is viewport pixel (50, 50), world (1, 1, 0.5)
        let voxel = viewer.screen_point_to_voxel(50.0, 50.0).unwrap();
        assert_eq!(voxel, Point3::new(3.0, 3.0, 2.0));
        let info = viewer.cursor_info(50.0, 50.0).unwrap();
        assert_eq!(info.target_voxel, Some([3, 3, 2]));
        assert_eq!(info.target_value, Some(8.0));
        assert_eq!(info.label, None);
    }

    #[test]
    fn origin_snaps_and_steps_inside_target() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.set_origin(Point3::new(0.2, -0.7, 0.4));
        assert_eq!(viewer.origin(), Point3::new(0.5, -0.5, 0.5));

        assert!(viewer.step_origin(2, 10));
        assert_eq!(viewer.origin().z, 1.5);
        assert!(viewer.step_origin(0, -10));
        assert_eq!(viewer.origin().x, -1.5);
        assert!(!viewer.step_origin(3, 1));

        viewer.set_snap_to_grid(false);
        viewer.set_origin(Point3::new(0.2, 0.0, 0.0));
        assert_eq!(viewer.origin(), Point3::new(0.2, 0.0, 0.0));
    }

    #[test]
    fn mouse_wheel_moves_along_depth() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.configure(ConfigMode::XyXzV).unwrap();
        assert!(viewer.mouse_wheel(10.0, 50.0, -1));
        assert_eq!(viewer.origin(), Point3::new(0.5, 0.5, -0.5));
        assert!(viewer.mouse_wheel(90.0, 50.0, 1));
        assert_eq!(viewer.origin(), Point3::new(0.5, 1.5, -0.5));
        assert!(!viewer.mouse_wheel(-5.0, 50.0, 1));
        assert_eq!(viewer.slice_thickness(1), Some(1.0));
    }

    #[test]
    fn moving_the_cursor_dirties_every_layer() {
        use crate::enums::SlotKind;
        use crate::slot::SlotState;

        let mut viewer = viewer_with_target(4, 32);
        viewer.update();
        assert!(viewer.set_origin_from_screen(16.0, 16.0));
        assert_eq!(viewer.slot_state(SlotKind::Target), SlotState::Dirty);
        assert_eq!(viewer.slot_state(SlotKind::Segmentation), SlotState::Dirty);
    }

    #[test]
    fn roi_corners_stay_ordered_and_inside() {
        let mut viewer = viewer_with_target(4, 100);
        assert_eq!(
            viewer.roi(),
            (Point3::new(-1.5, -1.5, -1.5), Point3::new(1.5, 1.5, 1.5))
        );
        // Far bottom left of the screen is clamped to the target
        assert!(viewer.set_roi_corner1(0.0, 100.0));
        assert_eq!(viewer.roi().0, Point3::new(-1.5, -1.5, 0.5));
        // Upper corner cannot pass the lower one
        assert!(viewer.set_roi_corner2(0.0, 100.0));
        assert_eq!(viewer.roi().1, Point3::new(-1.5, -1.5, 0.5));
    }

    #[test]
    fn frames_wrap_around() {
        let mut viewer = Viewer::new(32, 32).unwrap();
        let geometry = GridGeometry::axis_aligned([2, 2, 2], (1.0, 1.0, 1.0)).unwrap();
        let data = Array4::from_shape_fn((3, 2, 2, 2), |(t, ..)| t as f32);
        viewer.set_target(Some(Volume::new(data, geometry).unwrap()));
        viewer.set_source(Some(cube(2)));

        viewer.previous_target_frame();
        assert_eq!(viewer.target_frame(), 2);
        viewer.next_target_frame();
        assert_eq!(viewer.target_frame(), 0);
        viewer.set_target_frame(7);
        assert_eq!(viewer.target_frame(), 2);

        viewer.next_source_frame();
        assert_eq!(viewer.source_frame(), 0);
    }

    #[test]
    fn zoom_changes_pixel_spacing() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.zoom_in().unwrap();
        assert_eq!(viewer.resolution(), 2.0);
        assert_eq!(viewer.viewports()[0].grid().spacing().x, 0.5);
        viewer.zoom_in_fine().unwrap();
        viewer.zoom_in_fine().unwrap();
        viewer.zoom_out().unwrap();
        assert!((viewer.resolution() - 2.0).abs() < 1e-12);
        assert_eq!(viewer.zoom(0.0), Err(ViewerError::InvalidResolution(0.0)));
        assert!((viewer.resolution() - 2.0).abs() < 1e-12);
    }
}
