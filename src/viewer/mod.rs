//! The reslicing and compositing engine tying volumes, viewports, lookup
//! tables and the selection editor together.

mod editing;
mod interaction;

pub use interaction::CursorInfo;

use image::RgbaImage;
use log::{debug, info, warn};
use nalgebra::{Point3, Vector3};
use rayon::prelude::*;
use web_time::Instant;

use crate::cache::DisplacementCache;
use crate::compositor::{CompositeSettings, Compositor, Layers};
use crate::config::{ConfigMode, source_viewer_flags};
use crate::contour::{EditorState, SegmentationEditor};
use crate::coords::CoordinateMapper;
use crate::enums::{DisplayMode, Interpolation, SegmentationMode, SlotKind, ViewMode};
use crate::error::ViewerError;
use crate::geometry::GridGeometry;
use crate::lut::{Color, LookupTable};
use crate::resample::{CpuResampler, Resampler};
use crate::segment_table::SegmentTable;
use crate::settings::{DisplayFlags, LutSettings, RegionGrowingSettings, ViewerSettings};
use crate::slot::{DISPLAY_RANGE, SlotState, VolumeSlot};
use crate::transform::Transformation;
use crate::viewport::{ViewAxes, Viewport, ViewportConfig, ViewportRect, depth_axis};
use crate::volume::Volume;

/// One configured viewport with its output grid and composited colors.
#[derive(Clone, Debug)]
pub struct ViewportState {
    viewport: Viewport,
    grid: GridGeometry,
    /// Composited colors, row by row from the bottom of the viewport
    drawable: Vec<Color>,
}

impl ViewportState {
    pub fn viewport(&self) -> &Viewport {
        &self.viewport
    }

    pub fn grid(&self) -> &GridGeometry {
        &self.grid
    }
}

/// Multi-viewport reslicing and compositing engine.
///
/// Mutations only mark layers dirty; [`Viewer::update`] reslices the dirty
/// layers into every viewport and recomposites all viewports.
#[derive(Debug)]
pub struct Viewer<R: Resampler = CpuResampler> {
    resampler: R,
    screen: (u32, u32),
    origin: Point3<f64>,
    resolution: f64,
    axes: ViewAxes,
    flip: [bool; 3],
    display_mode: DisplayMode,
    config_mode: Option<ConfigMode>,
    viewports: Vec<ViewportState>,

    target: VolumeSlot<f32>,
    source: VolumeSlot<f32>,
    segmentation: VolumeSlot<i16>,
    editor: SegmentationEditor,
    cache_displacements: bool,
    cache: Option<DisplacementCache>,

    target_lut: LookupTable,
    source_lut: LookupTable,
    subtraction_lut: LookupTable,
    segments: SegmentTable,
    view_mode: ViewMode,
    view_mix: f64,

    segmentation_mode: SegmentationMode,
    brush_width: usize,
    region_growing: RegionGrowingSettings,
    display: DisplayFlags,
    snap_to_grid: bool,
    roi: (Point3<f64>, Point3<f64>),
}

impl Viewer<CpuResampler> {
    /// Viewer with the reference resampler and a single XY viewport.
    pub fn new(screen_width: u32, screen_height: u32) -> Result<Self, ViewerError> {
        Self::with_resampler(CpuResampler, screen_width, screen_height)
    }
}

impl<R: Resampler> Viewer<R> {
    pub fn with_resampler(
        resampler: R,
        screen_width: u32,
        screen_height: u32,
    ) -> Result<Self, ViewerError> {
        if screen_width == 0 || screen_height == 0 {
            return Err(ViewerError::InvalidScreen {
                width: screen_width,
                height: screen_height,
            });
        }
        let defaults = ViewerSettings::default();
        let mut viewer = Self {
            resampler,
            screen: (screen_width, screen_height),
            origin: Point3::origin(),
            resolution: defaults.resolution,
            axes: ViewAxes::default(),
            flip: defaults.flip,
            display_mode: defaults.display_mode,
            config_mode: None,
            viewports: Vec::new(),
            target: VolumeSlot::intensity(),
            source: VolumeSlot::intensity(),
            segmentation: VolumeSlot::labels(),
            editor: SegmentationEditor::default(),
            cache_displacements: defaults.cache_displacements,
            cache: None,
            target_lut: LookupTable::new(0, DISPLAY_RANGE),
            source_lut: LookupTable::new(0, DISPLAY_RANGE),
            subtraction_lut: LookupTable::new(-DISPLAY_RANGE, DISPLAY_RANGE),
            segments: SegmentTable::default(),
            view_mode: defaults.view_mode,
            view_mix: defaults.view_mix,
            segmentation_mode: defaults.segmentation_mode,
            brush_width: defaults.brush_width,
            region_growing: defaults.region_growing,
            display: defaults.display,
            snap_to_grid: defaults.snap_to_grid,
            roi: (Point3::origin(), Point3::origin()),
        };
        viewer.configure(defaults.config_mode)?;
        Ok(viewer)
    }

    // Configuration

    /// Rebuild all viewports from a preset layout.
    pub fn configure(&mut self, mode: ConfigMode) -> Result<(), ViewerError> {
        self.configure_custom(&mode.layout())?;
        self.config_mode = Some(mode);
        Ok(())
    }

    /// Rebuild all viewports from an explicit layout of one to four entries.
    ///
    /// Nothing changes if any entry is invalid.
    pub fn configure_custom(&mut self, configs: &[ViewportConfig]) -> Result<(), ViewerError> {
        if !(1..=4).contains(&configs.len()) {
            return Err(ViewerError::ViewportCount(configs.len()));
        }
        let flags = source_viewer_flags(configs);
        let viewports = configs
            .iter()
            .zip(flags)
            .map(|(config, source_viewer)| {
                let rect = config.rect;
                ViewportRect::new(rect.xmin, rect.ymin, rect.xmax, rect.ymax)?;
                let viewport = Viewport::new(config, self.screen.0, self.screen.1, source_viewer)?;
                let grid = self.output_grid(&viewport)?;
                let drawable = vec![Color::BACKGROUND; viewport.width() * viewport.height()];
                Ok(ViewportState {
                    viewport,
                    grid,
                    drawable,
                })
            })
            .collect::<Result<Vec<_>, ViewerError>>()?;

        let layout: Vec<Viewport> = viewports.iter().map(|v| v.viewport).collect();
        self.viewports = viewports;
        self.config_mode = None;
        self.editor.rebind(&layout);
        self.mark_all_dirty();
        info!("Configured {} viewports", self.viewports.len());
        Ok(())
    }

    /// Change the screen size, keeping the current layout.
    pub fn resize(&mut self, screen_width: u32, screen_height: u32) -> Result<(), ViewerError> {
        if screen_width == 0 || screen_height == 0 {
            return Err(ViewerError::InvalidScreen {
                width: screen_width,
                height: screen_height,
            });
        }
        let previous = self.screen;
        self.screen = (screen_width, screen_height);
        let configs: Vec<ViewportConfig> = self
            .viewports
            .iter()
            .map(|v| ViewportConfig {
                rect: *v.viewport.rect(),
                mode: v.viewport.mode(),
            })
            .collect();
        let mode = self.config_mode;
        if let Err(e) = self.configure_custom(&configs) {
            self.screen = previous;
            return Err(e);
        }
        self.config_mode = mode;
        Ok(())
    }

    /// Derive view axes and origin from the target and clear the selection.
    pub fn reset(&mut self) {
        self.axes = self.display_axes();
        self.origin = self
            .target
            .volume()
            .map(|volume| {
                let geometry = volume.geometry();
                CoordinateMapper::snap_to_grid(geometry.origin(), geometry)
            })
            .unwrap_or_else(Point3::origin);
        self.editor.clear();
        self.reset_roi();
        self.refresh_grids();
        info!("Reset view to origin {:?}", self.origin);
    }

    /// View axes for the current display mode and flips.
    ///
    /// Each target voxel axis is labelled by the world axis it is most
    /// parallel to and its direction along it; neurological order puts every
    /// voxel axis on that world axis pointing the positive way, radiological
    /// additionally mirrors left and right.
    fn display_axes(&self) -> ViewAxes {
        let Some(geometry) = self.target.volume().map(Volume::geometry) else {
            return ViewAxes::default();
        };
        let mut axes = [Vector3::x(), Vector3::y(), Vector3::z()];
        match self.display_mode {
            DisplayMode::Native => {
                for (n, axis) in axes.iter_mut().enumerate() {
                    *axis = geometry.axis(n);
                }
            }
            DisplayMode::Neurological | DisplayMode::Radiological => {
                for n in 0..3 {
                    let a = geometry.axis(n);
                    let (world, component) = a
                        .iter()
                        .copied()
                        .enumerate()
                        .max_by(|x, y| x.1.abs().total_cmp(&y.1.abs()))
                        .unwrap_or((n, 1.0));
                    axes[world] = a * component.signum();
                }
                if self.display_mode == DisplayMode::Radiological {
                    axes[0] = -axes[0];
                }
            }
        }
        for (axis, flip) in axes.iter_mut().zip(self.flip) {
            if flip {
                *axis = -*axis;
            }
        }
        ViewAxes {
            x: axes[0],
            y: axes[1],
            z: axes[2],
        }
    }

    fn depth_spacing(&self, viewport: &Viewport) -> f64 {
        self.target
            .volume()
            .map_or(1.0, |volume| volume.geometry().spacing()[depth_axis(viewport.mode())])
    }

    fn output_grid(&self, viewport: &Viewport) -> Result<GridGeometry, ViewerError> {
        viewport.output_grid(
            self.origin,
            self.resolution,
            &self.axes,
            self.depth_spacing(viewport),
        )
    }

    /// Recompute every viewport's output grid after the origin, resolution
    /// or axes changed.
    fn refresh_grids(&mut self) {
        for k in 0..self.viewports.len() {
            match self.output_grid(&self.viewports[k].viewport) {
                Ok(grid) => self.viewports[k].grid = grid,
                Err(e) => warn!("Keeping previous grid of viewport {k}: {e}"),
            }
        }
        self.mark_all_dirty();
    }

    fn mark_all_dirty(&mut self) {
        self.target.mark_dirty();
        self.source.mark_dirty();
        self.segmentation.mark_dirty();
        self.editor.selection_mut().mark_dirty();
    }

    fn invalidate_cache(&mut self) {
        self.cache = None;
    }

    // Update pass

    /// Reslice every dirty layer into all viewports, then recomposite.
    pub fn update(&mut self) {
        let start = Instant::now();
        let grids: Vec<GridGeometry> = self.viewports.iter().map(|v| v.grid.clone()).collect();
        self.refresh_cache();

        let target_time = self.target.time();
        let resampler = &self.resampler;
        let resliced = [
            self.target.reslice(resampler, &grids, None, target_time),
            self.source
                .reslice(resampler, &grids, self.cache.as_ref(), target_time),
            self.segmentation.reslice(resampler, &grids, None, target_time),
            self.editor
                .selection_mut()
                .reslice(resampler, &grids, None, target_time),
        ]
        .iter()
        .filter(|&&r| r)
        .count();

        self.composite();
        debug!(
            "Updated {} viewports ({} layers resliced) in {:?}",
            self.viewports.len(),
            resliced,
            start.elapsed()
        );
    }

    fn refresh_cache(&mut self) {
        let transformation = self.source.effective_transformation();
        let wanted = self.cache_displacements
            && !self.source.invert_transformation()
            && transformation.requires_displacement_caching()
            && !self.source.is_empty()
            && self.source.state() == SlotState::Dirty;
        if !wanted || self.cache.is_some() {
            return;
        }
        if let Some(target) = self.target.volume().filter(|v| !v.is_empty()) {
            self.cache = Some(DisplacementCache::build(
                transformation,
                target.geometry(),
                self.source.time(),
                self.target.time(),
            ));
        }
    }

    fn composite(&mut self) {
        let settings = CompositeSettings {
            view_mode: self.view_mode,
            view_mix: self.view_mix,
            target_lut: &self.target_lut,
            source_lut: &self.source_lut,
            subtraction_lut: &self.subtraction_lut,
            segments: self.display.segmentation_labels.then_some(&self.segments),
        };
        let target = &self.target;
        let source = &self.source;
        let segmentation = &self.segmentation;
        let selection = (self.editor.state() == EditorState::Tracing).then(|| self.editor.selection());

        self.viewports
            .par_iter_mut()
            .enumerate()
            .for_each(|(k, state)| {
                let (Some(t), Some(s), Some(seg)) =
                    (target.output(k), source.output(k), segmentation.output(k))
                else {
                    return;
                };
                let layers = Layers {
                    target: t,
                    source: s,
                    segmentation: seg,
                    selection: selection.and_then(|slot| slot.output(k)),
                };
                Compositor::composite(
                    &layers,
                    &settings,
                    state.viewport.is_source_viewer(),
                    &mut state.drawable,
                );
            });
    }

    // Buffer access

    pub fn number_of_viewports(&self) -> usize {
        self.viewports.len()
    }

    pub fn viewports(&self) -> &[ViewportState] {
        &self.viewports
    }

    /// Composited colors of viewport `k` as of the last [`Viewer::update`],
    /// row by row from the bottom.
    pub fn composited_buffer(&self, k: usize) -> Option<&[Color]> {
        self.viewports.get(k).map(|v| v.drawable.as_slice())
    }

    /// Composited viewport `k` as an image with row 0 at the top.
    pub fn composited_image(&self, k: usize) -> Option<RgbaImage> {
        let state = self.viewports.get(k)?;
        let width = state.viewport.width();
        let bytes: &[u8] = bytemuck::cast_slice(state.drawable.as_slice());
        let pixels: Vec<u8> = bytes
            .chunks_exact(width * 4)
            .rev()
            .flatten()
            .copied()
            .collect();
        RgbaImage::from_raw(width as u32, state.viewport.height() as u32, pixels)
    }

    /// Resliced output of one layer in viewport `k`, in internal units.
    pub fn resliced(&self, kind: SlotKind, k: usize) -> Option<&ndarray::Array2<i16>> {
        match kind {
            SlotKind::Target => self.target.output(k),
            SlotKind::Source => self.source.output(k),
            SlotKind::Segmentation => self.segmentation.output(k),
            SlotKind::Selection => self.editor.selection().output(k),
        }
    }

    pub fn slot_state(&self, kind: SlotKind) -> SlotState {
        match kind {
            SlotKind::Target => self.target.state(),
            SlotKind::Source => self.source.state(),
            SlotKind::Segmentation => self.segmentation.state(),
            SlotKind::Selection => self.editor.selection().state(),
        }
    }

    // Volumes

    /// Replace the target; all derived state is rebuilt.
    pub fn set_target(&mut self, volume: Option<Volume<f32>>) {
        self.target.set_volume(volume);
        self.target_lut.initialize(0, DISPLAY_RANGE);
        self.subtraction_lut.initialize(-DISPLAY_RANGE, DISPLAY_RANGE);
        self.invalidate_cache();
        self.reset();
    }

    pub fn set_source(&mut self, volume: Option<Volume<f32>>) {
        self.source.set_volume(volume);
        self.source_lut.initialize(0, DISPLAY_RANGE);
        self.invalidate_cache();
    }

    pub fn set_segmentation(&mut self, volume: Option<Volume<i16>>) {
        self.segmentation.set_volume(volume);
    }

    pub fn target(&self) -> Option<&Volume<f32>> {
        self.target.volume()
    }

    pub fn source(&self) -> Option<&Volume<f32>> {
        self.source.volume()
    }

    pub fn segmentation(&self) -> Option<&Volume<i16>> {
        self.segmentation.volume()
    }

    // Source transformation

    pub fn source_transformation(&self) -> &Transformation {
        self.source.transformation()
    }

    pub fn set_source_transformation(&mut self, transformation: Transformation) {
        info!("Source transformation: {}", transformation.description());
        self.source.set_transformation(transformation);
        self.invalidate_cache();
    }

    pub fn source_transform_apply(&self) -> bool {
        self.source.apply_transformation()
    }

    pub fn set_source_transform_apply(&mut self, apply: bool) {
        self.source.set_apply_transformation(apply);
        self.invalidate_cache();
    }

    pub fn source_transform_invert(&self) -> bool {
        self.source.invert_transformation()
    }

    pub fn set_source_transform_invert(&mut self, invert: bool) {
        self.source.set_invert_transformation(invert);
        self.invalidate_cache();
    }

    pub fn cache_displacements(&self) -> bool {
        self.cache_displacements
    }

    pub fn set_cache_displacements(&mut self, cache: bool) {
        if cache != self.cache_displacements {
            self.cache_displacements = cache;
            self.invalidate_cache();
            self.source.mark_dirty();
        }
    }

    pub fn displacement_cache(&self) -> Option<&DisplacementCache> {
        self.cache.as_ref()
    }

    // Interpolation

    pub fn target_interpolation(&self) -> Interpolation {
        self.target.interpolation()
    }

    pub fn set_target_interpolation(&mut self, interpolation: Interpolation) {
        self.target.set_interpolation(interpolation);
    }

    pub fn source_interpolation(&self) -> Interpolation {
        self.source.interpolation()
    }

    pub fn set_source_interpolation(&mut self, interpolation: Interpolation) {
        self.source.set_interpolation(interpolation);
    }

    // View mode and lookup tables

    pub fn view_mode(&self) -> ViewMode {
        self.view_mode
    }

    pub fn set_view_mode(&mut self, mode: ViewMode) {
        self.view_mode = mode;
    }

    pub fn view_mix(&self) -> f64 {
        self.view_mix
    }

    /// Blend factor of the shutter and blend modes, clamped to `[0, 1]`.
    pub fn set_view_mix(&mut self, mix: f64) {
        self.view_mix = mix.clamp(0.0, 1.0);
    }

    pub fn target_lut(&self) -> &LookupTable {
        &self.target_lut
    }

    pub fn target_lut_mut(&mut self) -> &mut LookupTable {
        &mut self.target_lut
    }

    pub fn source_lut(&self) -> &LookupTable {
        &self.source_lut
    }

    pub fn source_lut_mut(&mut self) -> &mut LookupTable {
        &mut self.source_lut
    }

    pub fn subtraction_lut(&self) -> &LookupTable {
        &self.subtraction_lut
    }

    pub fn subtraction_lut_mut(&mut self) -> &mut LookupTable {
        &mut self.subtraction_lut
    }

    /// Display window of the target table in raw target intensities.
    pub fn set_target_display_range(&mut self, min: f64, max: f64) {
        let (min, max) = (self.target.to_internal(min), self.target.to_internal(max));
        self.target_lut.set_display_range(min, max);
    }

    pub fn target_display_range(&self) -> (f64, f64) {
        (
            self.target.to_raw(self.target_lut.display_min()),
            self.target.to_raw(self.target_lut.display_max()),
        )
    }

    /// Display window of the source table in raw source intensities.
    pub fn set_source_display_range(&mut self, min: f64, max: f64) {
        let (min, max) = (self.source.to_internal(min), self.source.to_internal(max));
        self.source_lut.set_display_range(min, max);
    }

    pub fn source_display_range(&self) -> (f64, f64) {
        (
            self.source.to_raw(self.source_lut.display_min()),
            self.source.to_raw(self.source_lut.display_max()),
        )
    }

    pub fn segment_table(&self) -> &SegmentTable {
        &self.segments
    }

    pub fn segment_table_mut(&mut self) -> &mut SegmentTable {
        &mut self.segments
    }

    // Display

    pub fn display(&self) -> &DisplayFlags {
        &self.display
    }

    pub fn set_display(&mut self, display: DisplayFlags) {
        self.display = display;
    }

    pub fn display_mode(&self) -> DisplayMode {
        self.display_mode
    }

    /// Takes effect on the next [`Viewer::reset`].
    pub fn set_display_mode(&mut self, mode: DisplayMode) {
        self.display_mode = mode;
    }

    pub fn flip(&self) -> [bool; 3] {
        self.flip
    }

    /// Mirror display axes; takes effect on the next [`Viewer::reset`].
    pub fn set_flip(&mut self, flip: [bool; 3]) {
        self.flip = flip;
    }

    pub fn axes(&self) -> &ViewAxes {
        &self.axes
    }

    pub fn snap_to_grid(&self) -> bool {
        self.snap_to_grid
    }

    pub fn set_snap_to_grid(&mut self, snap: bool) {
        self.snap_to_grid = snap;
    }

    pub fn config_mode(&self) -> Option<ConfigMode> {
        self.config_mode
    }

    pub fn screen(&self) -> (u32, u32) {
        self.screen
    }

    // Session

    /// Snapshot of every persisted setting.
    pub fn settings(&self) -> ViewerSettings {
        let lut = |lut: &LookupTable| LutSettings {
            display_min: lut.display_min(),
            display_max: lut.display_max(),
            color_mode: lut.color_mode(),
        };
        ViewerSettings {
            screen_width: self.screen.0,
            screen_height: self.screen.1,
            origin: [self.origin.x, self.origin.y, self.origin.z],
            resolution: self.resolution,
            config_mode: self.config_mode.unwrap_or_default(),
            view_mode: self.view_mode,
            view_mix: self.view_mix,
            target_lut: lut(&self.target_lut),
            source_lut: lut(&self.source_lut),
            subtraction_lut: lut(&self.subtraction_lut),
            target_interpolation: self.target.interpolation(),
            source_interpolation: self.source.interpolation(),
            display: self.display,
            snap_to_grid: self.snap_to_grid,
            display_mode: self.display_mode,
            flip: self.flip,
            source_transform_apply: self.source.apply_transformation(),
            source_transform_invert: self.source.invert_transformation(),
            cache_displacements: self.cache_displacements,
            segmentation_mode: self.segmentation_mode,
            brush_width: self.brush_width,
            region_growing: self.region_growing,
        }
    }

    /// Validate and apply a settings snapshot. Nothing changes on error.
    pub fn apply_settings(&mut self, settings: &ViewerSettings) -> Result<(), ViewerError> {
        settings.validate()?;
        let previous = (self.screen, self.resolution);
        self.screen = (settings.screen_width, settings.screen_height);
        self.resolution = settings.resolution;
        if let Err(e) = self.configure(settings.config_mode) {
            warn!("Rejected settings: {e}");
            (self.screen, self.resolution) = previous;
            return Err(e);
        }

        self.display_mode = settings.display_mode;
        self.flip = settings.flip;
        self.axes = self.display_axes();
        self.origin = Point3::from(settings.origin);
        self.view_mode = settings.view_mode;
        self.set_view_mix(settings.view_mix);
        for (lut, s) in [
            (&mut self.target_lut, &settings.target_lut),
            (&mut self.source_lut, &settings.source_lut),
            (&mut self.subtraction_lut, &settings.subtraction_lut),
        ] {
            lut.set_color_mode(s.color_mode);
            lut.set_display_range(s.display_min, s.display_max);
        }
        self.target.set_interpolation(settings.target_interpolation);
        self.source.set_interpolation(settings.source_interpolation);
        self.display = settings.display;
        self.snap_to_grid = settings.snap_to_grid;
        self.set_source_transform_apply(settings.source_transform_apply);
        self.set_source_transform_invert(settings.source_transform_invert);
        self.set_cache_displacements(settings.cache_displacements);
        self.segmentation_mode = settings.segmentation_mode;
        self.brush_width = settings.brush_width.max(1);
        self.region_growing = settings.region_growing;
        self.refresh_grids();
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::enums::{ContourMode, ViewerMode};
    use crate::segment_table::Segment;
    use ndarray::Array3;

    pub(super) fn cube(size: usize) -> Volume<f32> {
        let geometry = GridGeometry::axis_aligned([size; 3], (1.0, 1.0, 1.0)).unwrap();
        let data = Array3::from_shape_fn((size, size, size), |(k, j, i)| (i + j + k) as f32);
        Volume::from_frame(data, geometry).unwrap()
    }

    pub(super) fn viewer_with_target(size: usize, screen: u32) -> Viewer {
        let mut viewer = Viewer::new(screen, screen).unwrap();
        viewer.set_target(Some(cube(size)));
        viewer
    }

    #[test]
    fn every_slot_has_one_output_per_viewport() {
        let mut viewer = viewer_with_target(8, 64);
        viewer.configure(ConfigMode::XyXzYz).unwrap();
        viewer.update();
        for kind in [
            SlotKind::Target,
            SlotKind::Source,
            SlotKind::Segmentation,
            SlotKind::Selection,
        ] {
            assert_eq!(viewer.slot_state(kind), SlotState::Clean);
            for k in 0..3 {
                let viewport = viewer.viewports()[k].viewport();
                let output = viewer.resliced(kind, k).unwrap();
                assert_eq!(output.dim(), (viewport.height(), viewport.width()));
            }
        }
        assert_eq!(viewer.composited_buffer(2).unwrap().len(), 32 * 32);
    }

    #[test]
    fn invalid_layout_leaves_viewer_unchanged() {
        let mut viewer = viewer_with_target(4, 100);
        let bad = [
            ViewportConfig::new(0.0, 0.0, 0.5, 1.0, ViewerMode::XY).unwrap(),
            ViewportConfig {
                rect: ViewportRect {
                    xmin: 0.5,
                    ymin: 0.0,
                    xmax: 0.5,
                    ymax: 1.0,
                },
                mode: ViewerMode::XZ,
            },
        ];
        assert!(matches!(
            viewer.configure_custom(&bad),
            Err(ViewerError::DegenerateViewport { .. })
        ));
        assert_eq!(viewer.number_of_viewports(), 1);
        assert_eq!(viewer.config_mode(), Some(ConfigMode::Xy));
        assert_eq!(viewer.configure_custom(&[]), Err(ViewerError::ViewportCount(0)));
    }

    #[test]
    fn reset_centres_on_nearest_target_voxel() {
        let viewer = viewer_with_target(4, 100);
        assert_eq!(viewer.settings().origin, [0.5, 0.5, 0.5]);
        assert_eq!(viewer.axes(), &ViewAxes::default());
    }

    #[test]
    fn radiological_mirrors_left_right() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.set_display_mode(DisplayMode::Radiological);
        viewer.reset();
        assert_eq!(viewer.axes().x, -Vector3::x());
        assert_eq!(viewer.axes().y, Vector3::y());

        viewer.set_display_mode(DisplayMode::Neurological);
        viewer.set_flip([false, false, true]);
        viewer.reset();
        assert_eq!(viewer.axes().z, -Vector3::z());
    }

    #[test]
    fn update_only_reslices_dirty_layers() {
        let mut viewer = viewer_with_target(4, 32);
        viewer.update();
        assert_eq!(viewer.slot_state(SlotKind::Target), SlotState::Clean);
        viewer.set_source_interpolation(Interpolation::Linear);
        assert_eq!(viewer.slot_state(SlotKind::Target), SlotState::Clean);
        assert_eq!(viewer.slot_state(SlotKind::Source), SlotState::Dirty);
        viewer.update();
        assert_eq!(viewer.slot_state(SlotKind::Source), SlotState::Clean);
    }

    #[test]
    fn composited_image_puts_top_row_first() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.update();
        let buffer = viewer.composited_buffer(0).unwrap().to_vec();
        let image = viewer.composited_image(0).unwrap();
        assert_eq!(image.dimensions(), (100, 100));
        let bottom_left = buffer[0];
        let pixel = image.get_pixel(0, 99);
        assert_eq!(pixel.0, [bottom_left.r, bottom_left.g, bottom_left.b, bottom_left.a]);
    }

    #[test]
    fn empty_source_shows_as_background_in_subtraction() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.set_view_mode(ViewMode::Subtraction);
        viewer.update();
        assert!(viewer
            .composited_buffer(0)
            .unwrap()
            .iter()
            .all(|&c| c == Color::BACKGROUND));
    }

    #[test]
    fn settings_round_trip() {
        let mut viewer = viewer_with_target(4, 100);
        let mut settings = viewer.settings();
        settings.config_mode = ConfigMode::AbXyV;
        settings.view_mode = ViewMode::Checkerboard;
        settings.view_mix = 0.3;
        settings.resolution = 2.0;
        settings.target_lut.display_max = 5000;
        viewer.apply_settings(&settings).unwrap();
        assert_eq!(viewer.settings(), settings);
        assert_eq!(viewer.number_of_viewports(), 2);
        assert!(viewer.viewports()[1].viewport().is_source_viewer());

        settings.resolution = 0.0;
        assert_eq!(
            viewer.apply_settings(&settings),
            Err(ViewerError::InvalidResolution(0.0))
        );
        assert_eq!(viewer.settings().resolution, 2.0);
    }

    #[test]
    fn raw_display_range_maps_to_internal_units() {
        let mut viewer = viewer_with_target(4, 32);
        // Target intensities span 0..9
        viewer.set_target_display_range(0.0, 4.5);
        assert_eq!(viewer.target_lut().display_max(), 5000);
        assert_eq!(viewer.target_display_range(), (0.0, 4.5));
    }

    /// The square-contour walk-through: a 4x4x4 target shown in one XY
    /// viewport of 100x100 pixels at 1 mm per pixel.
    #[test]
    fn square_contour_fill_and_commit() {
        let mut viewer = viewer_with_target(4, 100);
        viewer.segment_table_mut()
            .set(
                7,
                Segment {
                    name: "square".into(),
                    color: Color::rgb(255, 0, 0),
                    visible: true,
                    transparency: 0.5,
                },
            )
            .unwrap();

        viewer.add_contour_point(25.0, 75.0, ContourMode::FirstPoint);
        viewer.add_contour_point(75.0, 75.0, ContourMode::NewPoint);
        viewer.add_contour_point(75.0, 25.0, ContourMode::NewPoint);
        viewer.add_contour_point(25.0, 25.0, ContourMode::LastPoint);
        assert_eq!(viewer.contour_state(), EditorState::Tracing);
        assert!(viewer.fill_area(50.0, 50.0) > 0);

        viewer.update();
        let selection = viewer.resliced(SlotKind::Selection, 0).unwrap();
        assert_eq!(selection[[50, 50]], 1);
        assert_eq!(selection[[10, 10]], 0);

        viewer.fill_contour(7).unwrap();
        assert_eq!(viewer.contour_state(), EditorState::Empty);
        let labels = viewer.segmentation().unwrap();
        // The square covers the whole target in-plane, on the cursor slice
        for i in 0..4 {
            for j in 0..4 {
                assert_eq!(labels.get([i, j, 2], 0), Some(7));
                assert_eq!(labels.get([i, j, 1], 0), Some(0));
            }
        }

        viewer.update();
        // Red label at half transparency over grey
        let overlay = viewer.composited_buffer(0).unwrap()[50 * 100 + 50];
        assert!(overlay.r >= overlay.g + 127);
        assert_eq!(overlay.g, overlay.b);
    }
}
