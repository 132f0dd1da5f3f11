//! Interactive selection raster: contour tracing, fill, region growing,
//! undo and commit into the segmentation volume.

use log::{debug, info, trace};
use nalgebra::{Point3, Vector3};
use ndarray::{Array3, Axis};
use rayon::prelude::*;

use crate::enums::{ContourMode, RegionGrowingMode, SegmentationMode, ViewerMode};
use crate::fill::{flood_fill, region_grow_2d, region_grow_3d};
use crate::geometry::{GridGeometry, voxel_index};
use crate::settings::RegionGrowingSettings;
use crate::slot::VolumeSlot;
use crate::viewport::Viewport;
use crate::volume::Volume;

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum EditorState {
    Empty,
    Tracing,
}

/// Viewport the selection raster was anchored to when editing began.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ContourAnchor {
    pub viewport: usize,
    pub mode: ViewerMode,
}

#[derive(Clone, Debug, PartialEq)]
enum Edit {
    Seed { pixel: [i64; 2], width: usize },
    Extend { pixel: [i64; 2], width: usize },
    /// Extend to `pixel`, then back to the seed
    Close { pixel: [i64; 2], width: usize },
    /// Raster voxels (i, j, k) set by a fill or region grow
    Mark(Vec<[usize; 3]>),
}

#[derive(Clone, Debug)]
pub struct SegmentationEditor {
    selection: VolumeSlot<u8>,
    anchor: Option<ContourAnchor>,
    /// Raster slice lying on the anchor plane
    plane: usize,
    history: Vec<Edit>,
    seed: Option<[i64; 2]>,
    last: Option<[i64; 2]>,
}

impl Default for SegmentationEditor {
    fn default() -> Self {
        Self {
            selection: VolumeSlot::mask(),
            anchor: None,
            plane: 0,
            history: Vec::new(),
            seed: None,
            last: None,
        }
    }
}

impl SegmentationEditor {
    pub fn state(&self) -> EditorState {
        if self.history.is_empty() {
            EditorState::Empty
        } else {
            EditorState::Tracing
        }
    }

    pub fn anchor(&self) -> Option<ContourAnchor> {
        self.anchor
    }

    pub fn selection(&self) -> &VolumeSlot<u8> {
        &self.selection
    }

    pub fn selection_mut(&mut self) -> &mut VolumeSlot<u8> {
        &mut self.selection
    }

    pub fn raster(&self) -> Option<&Volume<u8>> {
        self.selection.volume()
    }

    /// Number of marked raster voxels.
    pub fn marked(&self) -> usize {
        self.raster()
            .map_or(0, |raster| raster.data().iter().filter(|&&v| v > 0).count())
    }

    /// Anchor a fresh raster to a viewport.
    ///
    /// In-plane the raster matches the viewport's output grid. Along the
    /// viewport normal it uses the target spacing and spans the whole
    /// target, with slice `plane` on the cursor.
    pub fn begin(&mut self, anchor: ContourAnchor, grid: &GridGeometry, target: &GridGeometry) {
        let depth = grid.axis(2);
        let spacing = grid.spacing();
        let cursor = grid.origin();
        let offsets = target
            .corners()
            .map(|corner| (corner - cursor).dot(&depth) / spacing.z);
        let lo = offsets.iter().copied().fold(0.0, f64::min).floor() as i64;
        let hi = offsets.iter().copied().fold(0.0, f64::max).ceil() as i64;
        let slices = (hi - lo + 1) as usize;
        let plane = (-lo) as usize;
        let centre = (slices as f64 - 1.0) / 2.0;
        let origin = cursor + depth * ((centre - plane as f64) * spacing.z);

        let [width, height, _] = grid.size();
        let raster = GridGeometry::new([width, height, slices], spacing, *grid.axes(), origin)
            .map(|geometry| Volume::zeros(geometry, 1));
        match raster {
            Ok(raster) => {
                self.selection.set_volume(Some(raster));
                self.anchor = Some(anchor);
                self.plane = plane;
                self.history.clear();
                self.seed = None;
                self.last = None;
                debug!(
                    "Selection raster {}x{}x{} anchored to viewport {}",
                    width, height, slices, anchor.viewport
                );
            }
            Err(e) => trace!("Cannot anchor selection raster: {e}"),
        }
    }

    /// Raster pixel on the anchor plane under a world point.
    fn pixel(&self, world: Point3<f64>) -> Option<[i64; 2]> {
        let v = self.raster()?.world_to_voxel(world);
        Some([voxel_index(v.x), voxel_index(v.y)])
    }

    /// Add a traced point. Points are projected onto the anchor plane.
    pub fn add_point(
        &mut self,
        world: Point3<f64>,
        contour_mode: ContourMode,
        segmentation_mode: SegmentationMode,
        width: usize,
    ) {
        let Some(pixel) = self.pixel(world) else {
            return;
        };
        let width = width.max(1);
        let edit = match (contour_mode, self.last) {
            (ContourMode::FirstPoint, _) | (_, None) => Edit::Seed { pixel, width },
            (ContourMode::NewPoint, Some(_)) => Edit::Extend { pixel, width },
            (ContourMode::LastPoint, Some(_)) => match segmentation_mode {
                SegmentationMode::Contour => Edit::Close { pixel, width },
                SegmentationMode::Paint => Edit::Extend { pixel, width },
            },
        };
        self.push(edit);
    }

    fn push(&mut self, edit: Edit) {
        self.apply(&edit);
        self.history.push(edit);
        self.selection.mark_dirty();
    }

    fn apply(&mut self, edit: &Edit) {
        let plane = self.plane;
        let (seed, last) = (self.seed, self.last);
        let Some(raster) = self.selection.volume_mut() else {
            return;
        };
        match edit {
            Edit::Seed { pixel, width } => {
                paint_line(raster, plane, *pixel, *pixel, *width);
                self.seed = Some(*pixel);
                self.last = Some(*pixel);
            }
            Edit::Extend { pixel, width } => {
                paint_line(raster, plane, last.unwrap_or(*pixel), *pixel, *width);
                self.last = Some(*pixel);
            }
            Edit::Close { pixel, width } => {
                paint_line(raster, plane, last.unwrap_or(*pixel), *pixel, *width);
                if let Some(seed) = seed {
                    paint_line(raster, plane, *pixel, seed, *width);
                }
                self.last = seed;
            }
            Edit::Mark(voxels) => {
                for &voxel in voxels {
                    raster.set(voxel, 0, 1);
                }
            }
        }
    }

    /// Flood fill the anchor plane from a world point, bounded by the marked
    /// pixels. Returns the number of newly marked pixels.
    pub fn fill_area(&mut self, world: Point3<f64>) -> usize {
        if self.marked() == 0 {
            return 0;
        }
        let plane = self.plane;
        let (Some(pixel), Some(raster)) = (self.pixel(world), self.raster()) else {
            return 0;
        };
        let (Ok(i), Ok(j)) = (usize::try_from(pixel[0]), usize::try_from(pixel[1])) else {
            return 0;
        };
        let Some(slice) = raster.get_slice_from_axis(plane, 2, 0) else {
            return 0;
        };
        let filled: Vec<[usize; 3]> = flood_fill(slice, (j, i))
            .into_iter()
            .map(|(j, i)| [i, j, plane])
            .collect();
        let count = filled.len();
        if count > 0 {
            self.push(Edit::Mark(filled));
        }
        count
    }

    /// Grow a region through `target` from the voxel under `seed` and mark
    /// every raster voxel falling into it. Two-dimensional growing stays in
    /// the target slice most parallel to the anchor plane and only marks the
    /// anchor plane of the raster.
    pub fn region_grow(
        &mut self,
        target: &Volume<f32>,
        frame: usize,
        seed: Point3<f64>,
        params: &RegionGrowingSettings,
    ) -> usize {
        let Some(raster) = self.raster() else {
            return 0;
        };
        let Some([si, sj, sk]) = target.geometry().nearest_voxel(seed) else {
            trace!("Region growing seed {seed:?} is outside the target");
            return 0;
        };
        let range = (params.min, params.max);
        let normal: Vector3<f64> = raster.geometry().axis(2);

        let grown: Vec<[usize; 3]> = match params.mode {
            RegionGrowingMode::ThreeD => {
                region_grow_3d(target.frame(frame), (sk, sj, si), range, params.connectivity)
                    .into_iter()
                    .map(|(k, j, i)| [i, j, k])
                    .collect()
            }
            RegionGrowingMode::TwoD => {
                let axis = target.geometry().most_aligned_axis(&normal);
                let seed = [si, sj, sk];
                let Some(slice) = target.get_slice_from_axis(seed[axis], axis, frame) else {
                    return 0;
                };
                // Slice rows and columns are the remaining voxel axes in
                // (z, y, x) order
                let (row_axis, col_axis) = match axis {
                    0 => (2, 1),
                    1 => (2, 0),
                    _ => (1, 0),
                };
                region_grow_2d(slice, (seed[row_axis], seed[col_axis]), range, params.connectivity)
                    .into_iter()
                    .map(|(r, c)| {
                        let mut v = seed;
                        v[row_axis] = r;
                        v[col_axis] = c;
                        v
                    })
                    .collect()
            }
        };
        debug!("Region growing reached {} target voxels", grown.len());
        if grown.is_empty() {
            return 0;
        }

        let [tx, ty, tz] = target.geometry().size();
        let mut inside = Array3::from_elem((tz, ty, tx), false);
        for [i, j, k] in &grown {
            inside[[*k, *j, *i]] = true;
        }

        let [width, height, slices] = raster.geometry().size();
        let planes = match params.mode {
            RegionGrowingMode::TwoD => self.plane..self.plane + 1,
            RegionGrowingMode::ThreeD => 0..slices,
        };
        let geometry = raster.geometry();
        let target_geometry = target.geometry();
        let current = raster.frame(0);
        let marks: Vec<[usize; 3]> = planes
            .into_par_iter()
            .flat_map_iter(|k| {
                let plane = current.index_axis_move(Axis(0), k);
                let inside = &inside;
                (0..height).flat_map(move |j| {
                    (0..width).filter_map(move |i| {
                        if plane[[j, i]] > 0 {
                            return None;
                        }
                        let world = geometry.voxel_to_world(Point3::new(i as f64, j as f64, k as f64));
                        let [a, b, c] = target_geometry.nearest_voxel(world)?;
                        inside[[c, b, a]].then_some([i, j, k])
                    })
                })
            })
            .collect();

        let count = marks.len();
        if count > 0 {
            self.push(Edit::Mark(marks));
        }
        count
    }

    /// Remove the most recent edit and rebuild the raster from the rest.
    pub fn undo(&mut self) {
        if self.history.pop().is_none() {
            return;
        }
        if self.history.is_empty() {
            self.clear();
            return;
        }
        if let Some(raster) = self.selection.volume_mut() {
            raster.data_mut().fill(0);
        }
        self.seed = None;
        self.last = None;
        let history = std::mem::take(&mut self.history);
        for edit in &history {
            self.apply(edit);
        }
        self.history = history;
    }

    /// Discard the raster and every edit.
    pub fn clear(&mut self) {
        self.selection.set_volume(None);
        self.anchor = None;
        self.plane = 0;
        self.history.clear();
        self.seed = None;
        self.last = None;
    }

    /// Re-bind the anchor after the viewports were rebuilt: the last viewport
    /// with the anchored mode takes over, otherwise the selection is dropped.
    pub fn rebind(&mut self, viewports: &[Viewport]) {
        let Some(anchor) = self.anchor else {
            return;
        };
        match viewports.iter().rposition(|v| v.mode() == anchor.mode) {
            Some(viewport) => self.anchor = Some(ContourAnchor { viewport, ..anchor }),
            None => self.clear(),
        }
    }

    /// Write `label` into the segmentation under every marked raster voxel,
    /// creating the segmentation from the target geometry if needed, then
    /// clear the selection. Returns the number of segmentation voxels written.
    pub fn commit(
        &mut self,
        label: i16,
        segmentation: &mut VolumeSlot<i16>,
        target: &GridGeometry,
    ) -> usize {
        if segmentation.is_empty() {
            segmentation.set_volume(Some(Volume::zeros(target.clone(), 1)));
        }
        let frame = segmentation.frame();
        let mut written = 0;
        if let (Some(raster), Some(labels)) = (self.selection.volume(), segmentation.volume_mut()) {
            let geometry = raster.geometry();
            for ((_, k, j, i), _) in raster.data().indexed_iter().filter(|(_, v)| **v > 0) {
                let world = geometry.voxel_to_world(Point3::new(i as f64, j as f64, k as f64));
                if let Some(voxel) = labels.geometry().nearest_voxel(world) {
                    written += usize::from(labels.set(voxel, frame, label));
                }
            }
        }
        info!("Committed selection as label {label} ({written} voxels)");
        self.clear();
        written
    }
}

/// Mark a brush-wide line between two pixels of one raster slice.
fn paint_line(raster: &mut Volume<u8>, plane: usize, from: [i64; 2], to: [i64; 2], width: usize) {
    let lo = (width as i64 - 1) / 2;
    let hi = width as i64 / 2;
    for [x, y] in bresenham(from, to) {
        for dy in -lo..=hi {
            for dx in -lo..=hi {
                let (px, py) = (x + dx, y + dy);
                if px >= 0 && py >= 0 {
                    raster.set([px as usize, py as usize, plane], 0, 1);
                }
            }
        }
    }
}

fn bresenham([x0, y0]: [i64; 2], [x1, y1]: [i64; 2]) -> Vec<[i64; 2]> {
    let dx = (x1 - x0).abs();
    let dy = -(y1 - y0).abs();
    let sx = if x0 < x1 { 1 } else { -1 };
    let sy = if y0 < y1 { 1 } else { -1 };
    let mut err = dx + dy;
    let (mut x, mut y) = (x0, y0);
    let mut points = Vec::with_capacity((dx - dy + 1) as usize);
    loop {
        points.push([x, y]);
        if x == x1 && y == y1 {
            break;
        }
        let e2 = 2 * err;
        if e2 >= dy {
            err += dy;
            x += sx;
        }
        if e2 <= dx {
            err += dx;
            y += sy;
        }
    }
    points
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::Connectivity;
    use nalgebra::Matrix3;
    use ndarray::Array3;

    fn target() -> GridGeometry {
        GridGeometry::axis_aligned([10, 10, 10], (1.0, 1.0, 1.0)).unwrap()
    }

    /// XY viewport grid of 11x11 pixels at 1 mm over the target, cursor at
    /// voxel (5, 5, 5). Pixel (i, j) lies on target voxel (i, j, 5).
    fn xy_grid() -> GridGeometry {
        GridGeometry::new(
            [11, 11, 1],
            Vector3::repeat(1.0),
            Matrix3::identity(),
            Point3::new(0.5, 0.5, 0.5),
        )
        .unwrap()
    }

    fn anchor() -> ContourAnchor {
        ContourAnchor {
            viewport: 0,
            mode: ViewerMode::XY,
        }
    }

    /// World position of raster pixel (i, j) on the anchor plane.
    fn at(i: f64, j: f64) -> Point3<f64> {
        xy_grid().voxel_to_world(Point3::new(i, j, 0.0))
    }

    fn square(editor: &mut SegmentationEditor) {
        editor.add_point(at(2.0, 2.0), ContourMode::FirstPoint, SegmentationMode::Contour, 1);
        editor.add_point(at(7.0, 2.0), ContourMode::NewPoint, SegmentationMode::Contour, 1);
        editor.add_point(at(7.0, 7.0), ContourMode::NewPoint, SegmentationMode::Contour, 1);
        editor.add_point(at(2.0, 7.0), ContourMode::LastPoint, SegmentationMode::Contour, 1);
    }

    #[test]
    fn raster_spans_target_depth() {
        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &target());
        let raster = editor.raster().unwrap();
        // Target slices span -4.5..4.5 mm, cursor at 0.5
        assert_eq!(raster.geometry().size(), [11, 11, 10]);
        assert_eq!(editor.plane, 5);
        let p = raster.voxel_to_world(Point3::new(5.0, 5.0, 5.0));
        assert!((p - Point3::new(0.5, 0.5, 0.5)).norm() < 1e-9);
    }

    #[test]
    fn closed_contour_fills_and_commits() {
        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &target());
        square(&mut editor);
        assert_eq!(editor.state(), EditorState::Tracing);
        assert_eq!(editor.marked(), 20);

        assert_eq!(editor.fill_area(at(4.0, 4.0)), 16);
        // Filling a marked pixel does nothing
        assert_eq!(editor.fill_area(at(4.0, 4.0)), 0);

        let mut segmentation = VolumeSlot::<i16>::labels();
        let written = editor.commit(7, &mut segmentation, &target());
        assert_eq!(written, 36);
        assert_eq!(editor.state(), EditorState::Empty);
        assert!(editor.raster().is_none());
        let labels = segmentation.volume().unwrap();
        assert_eq!(labels.get([2, 2, 5], 0), Some(7));
        assert_eq!(labels.get([5, 5, 5], 0), Some(7));
        assert_eq!(labels.get([8, 5, 5], 0), Some(0));
        assert_eq!(labels.get([5, 5, 4], 0), Some(0));
    }

    #[test]
    fn paint_mode_does_not_close() {
        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &target());
        editor.add_point(at(2.0, 2.0), ContourMode::FirstPoint, SegmentationMode::Paint, 1);
        editor.add_point(at(5.0, 2.0), ContourMode::NewPoint, SegmentationMode::Paint, 1);
        editor.add_point(at(5.0, 5.0), ContourMode::LastPoint, SegmentationMode::Paint, 1);
        assert_eq!(editor.marked(), 7);
    }

    #[test]
    fn brush_width_thickens_lines() {
        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &target());
        editor.add_point(at(2.0, 2.0), ContourMode::FirstPoint, SegmentationMode::Paint, 3);
        editor.add_point(at(6.0, 2.0), ContourMode::NewPoint, SegmentationMode::Paint, 3);
        assert_eq!(editor.marked(), 21);
    }

    #[test]
    fn undo_every_point_returns_to_empty() {
        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &target());
        editor.add_point(at(2.0, 2.0), ContourMode::FirstPoint, SegmentationMode::Paint, 1);
        editor.add_point(at(5.0, 2.0), ContourMode::NewPoint, SegmentationMode::Paint, 1);
        editor.add_point(at(5.0, 5.0), ContourMode::NewPoint, SegmentationMode::Paint, 1);

        editor.undo();
        assert_eq!(editor.marked(), 4);
        editor.undo();
        assert_eq!(editor.marked(), 1);
        editor.undo();
        assert_eq!(editor.state(), EditorState::Empty);
        assert_eq!(editor.marked(), 0);
        assert!(editor.anchor().is_none());
    }

    #[test]
    fn region_growing_respects_threshold_and_slice() {
        let geometry = target();
        let data = Array3::from_shape_fn((10, 10, 10), |(_, _, i)| if i < 5 { 100.0f32 } else { 0.0 });
        let volume = Volume::from_frame(data, geometry.clone()).unwrap();

        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &geometry);
        let params = RegionGrowingSettings {
            min: 50.0,
            max: 150.0,
            mode: RegionGrowingMode::TwoD,
            connectivity: Connectivity::Face,
        };
        assert_eq!(editor.region_grow(&volume, 0, at(2.0, 2.0), &params), 50);
        let raster = editor.raster().unwrap();
        for ((_, k, _, i), &v) in raster.data().indexed_iter() {
            if v > 0 {
                assert_eq!(k, 5);
                assert!(i < 5);
            }
        }

        // Seed below the threshold window
        assert_eq!(editor.region_grow(&volume, 0, at(8.0, 2.0), &params), 0);
        // Seed outside the target
        assert_eq!(editor.region_grow(&volume, 0, Point3::new(50.0, 0.0, 0.0), &params), 0);

        let volumetric = RegionGrowingSettings {
            mode: RegionGrowingMode::ThreeD,
            ..params
        };
        editor.clear();
        editor.begin(anchor(), &xy_grid(), &geometry);
        assert_eq!(editor.region_grow(&volume, 0, at(2.0, 2.0), &volumetric), 500);
    }

    #[test]
    fn rebinds_to_matching_viewport() {
        use crate::viewport::ViewportConfig;
        let configs = [
            ViewportConfig::new(0.0, 0.0, 0.5, 1.0, ViewerMode::XZ).unwrap(),
            ViewportConfig::new(0.5, 0.0, 1.0, 1.0, ViewerMode::XY).unwrap(),
        ];
        let viewports: Vec<Viewport> = configs
            .iter()
            .map(|c| Viewport::new(c, 100, 100, false).unwrap())
            .collect();

        let mut editor = SegmentationEditor::default();
        editor.begin(anchor(), &xy_grid(), &target());
        editor.add_point(at(2.0, 2.0), ContourMode::FirstPoint, SegmentationMode::Paint, 1);
        editor.rebind(&viewports);
        assert_eq!(editor.anchor().map(|a| a.viewport), Some(1));

        editor.rebind(&viewports[..1]);
        assert_eq!(editor.state(), EditorState::Empty);
    }
}
