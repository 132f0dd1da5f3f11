use log::trace;
use ndarray::Array2;

use crate::cache::DisplacementCache;
use crate::enums::Interpolation;
use crate::geometry::GridGeometry;
use crate::resample::{PointMapping, Resampler};
use crate::transform::Transformation;
use crate::volume::{Volume, Voxel};

/// Upper end of the internal intensity range resliced intensities are
/// rescaled into. Padding is encoded as -1.
pub const DISPLAY_RANGE: i32 = 10000;

/// How resampled values are stored in a slot's outputs.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum SlotEncoding {
    /// Intensities rescaled from `[min, max]` into `[0, DISPLAY_RANGE]`
    Display { min: f64, max: f64 },
    /// Labels stored as is, -1 outside the volume
    Label,
    /// Mask values stored as is, 0 outside the volume
    Mask,
}

impl SlotEncoding {
    fn padding(&self) -> f64 {
        match *self {
            SlotEncoding::Display { min, .. } => min - 1.0,
            SlotEncoding::Label => -1.0,
            SlotEncoding::Mask => 0.0,
        }
    }

    pub fn empty_value(&self) -> i16 {
        match self {
            SlotEncoding::Display { .. } | SlotEncoding::Label => -1,
            SlotEncoding::Mask => 0,
        }
    }

    #[inline]
    pub fn encode(&self, value: f64) -> i16 {
        match *self {
            SlotEncoding::Display { min, max } => {
                if value < min {
                    -1
                } else if max > min {
                    ((value - min) * DISPLAY_RANGE as f64 / (max - min))
                        .round()
                        .clamp(0.0, DISPLAY_RANGE as f64) as i16
                } else {
                    0
                }
            }
            SlotEncoding::Label => value.round().clamp(-1.0, i16::MAX as f64) as i16,
            SlotEncoding::Mask => value.round().clamp(0.0, i16::MAX as f64) as i16,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum SlotState {
    Clean,
    #[default]
    Dirty,
}

/// One logical volume together with everything needed to reslice it into
/// the viewports, and the resliced outputs themselves.
#[derive(Clone, Debug)]
pub struct VolumeSlot<T: Voxel> {
    volume: Option<Volume<T>>,
    transformation: Transformation,
    apply_transformation: bool,
    invert_transformation: bool,
    interpolation: Interpolation,
    frame: usize,
    encoding: SlotEncoding,
    state: SlotState,
    outputs: Vec<Array2<i16>>,
}

impl<T: Voxel> VolumeSlot<T> {
    fn with_encoding(encoding: SlotEncoding, interpolation: Interpolation) -> Self {
        Self {
            volume: None,
            transformation: Transformation::Identity,
            apply_transformation: true,
            invert_transformation: false,
            interpolation,
            frame: 0,
            encoding,
            state: SlotState::Dirty,
            outputs: Vec::new(),
        }
    }

    /// Slot for an intensity volume shown through a lookup table.
    pub fn intensity() -> Self {
        Self::with_encoding(SlotEncoding::Display { min: 0.0, max: 0.0 }, Interpolation::NearestNeighbor)
    }

    pub fn labels() -> Self {
        Self::with_encoding(SlotEncoding::Label, Interpolation::NearestNeighbor)
    }

    pub fn mask() -> Self {
        Self::with_encoding(SlotEncoding::Mask, Interpolation::NearestNeighbor)
    }

    pub fn volume(&self) -> Option<&Volume<T>> {
        self.volume.as_ref()
    }

    /// Mutable access to the volume; marks the slot dirty.
    pub fn volume_mut(&mut self) -> Option<&mut Volume<T>> {
        self.state = SlotState::Dirty;
        self.volume.as_mut()
    }

    /// Replace the volume, dropping the previous one.
    pub fn set_volume(&mut self, volume: Option<Volume<T>>) {
        if let SlotEncoding::Display { .. } = self.encoding {
            let (min, max) = volume.as_ref().map(Volume::min_max).unwrap_or((0.0, 0.0));
            self.encoding = SlotEncoding::Display { min, max };
        }
        self.volume = volume;
        self.frame = self.frame.min(self.frames().saturating_sub(1));
        self.state = SlotState::Dirty;
    }

    pub fn take_volume(&mut self) -> Option<Volume<T>> {
        self.state = SlotState::Dirty;
        self.volume.take()
    }

    /// True when there is no volume or it has no voxels.
    pub fn is_empty(&self) -> bool {
        self.volume.as_ref().is_none_or(Volume::is_empty)
    }

    pub fn frames(&self) -> usize {
        self.volume.as_ref().map_or(0, Volume::frames)
    }

    pub fn frame(&self) -> usize {
        self.frame
    }

    /// Select a frame, clamped to the available ones.
    pub fn set_frame(&mut self, frame: usize) {
        let frame = frame.min(self.frames().saturating_sub(1));
        if frame != self.frame {
            self.frame = frame;
            self.state = SlotState::Dirty;
        }
    }

    pub fn time(&self) -> f64 {
        self.volume
            .as_ref()
            .map_or(0.0, |volume| volume.frame_to_time(self.frame))
    }

    pub fn transformation(&self) -> &Transformation {
        &self.transformation
    }

    pub fn set_transformation(&mut self, transformation: Transformation) {
        self.transformation = transformation;
        self.state = SlotState::Dirty;
    }

    pub fn apply_transformation(&self) -> bool {
        self.apply_transformation
    }

    pub fn set_apply_transformation(&mut self, apply: bool) {
        if apply != self.apply_transformation {
            self.apply_transformation = apply;
            self.state = SlotState::Dirty;
        }
    }

    pub fn invert_transformation(&self) -> bool {
        self.invert_transformation
    }

    pub fn set_invert_transformation(&mut self, invert: bool) {
        if invert != self.invert_transformation {
            self.invert_transformation = invert;
            self.state = SlotState::Dirty;
        }
    }

    /// Transformation in effect when reslicing.
    pub fn effective_transformation(&self) -> &Transformation {
        static IDENTITY: Transformation = Transformation::Identity;
        if self.apply_transformation {
            &self.transformation
        } else {
            &IDENTITY
        }
    }

    pub fn interpolation(&self) -> Interpolation {
        self.interpolation
    }

    pub fn set_interpolation(&mut self, interpolation: Interpolation) {
        if interpolation != self.interpolation {
            self.interpolation = interpolation;
            self.state = SlotState::Dirty;
        }
    }

    pub fn encoding(&self) -> SlotEncoding {
        self.encoding
    }

    /// Scalar range of the volume, `(0, 0)` when empty.
    pub fn range(&self) -> (f64, f64) {
        match self.encoding {
            SlotEncoding::Display { min, max } => (min, max),
            _ => self.volume.as_ref().map_or((0.0, 0.0), Volume::min_max),
        }
    }

    /// Raw intensity to the internal display range.
    pub fn to_internal(&self, value: f64) -> i32 {
        let (min, max) = self.range();
        if max > min {
            ((value - min) * DISPLAY_RANGE as f64 / (max - min)).round() as i32
        } else {
            0
        }
    }

    /// Internal display range value back to raw intensity.
    pub fn to_raw(&self, internal: i32) -> f64 {
        let (min, max) = self.range();
        min + internal as f64 * (max - min) / DISPLAY_RANGE as f64
    }

    pub fn state(&self) -> SlotState {
        self.state
    }

    pub fn mark_dirty(&mut self) {
        self.state = SlotState::Dirty;
    }

    pub fn outputs(&self) -> &[Array2<i16>] {
        &self.outputs
    }

    pub fn output(&self, viewport: usize) -> Option<&Array2<i16>> {
        self.outputs.get(viewport)
    }

    /// Reslice the volume into every grid if the slot is dirty or its
    /// outputs do not match the grids. Returns whether anything was done.
    ///
    /// `cache` is only consulted when the forward transformation is applied
    /// and actually needs one.
    pub fn reslice<R: Resampler>(
        &mut self,
        resampler: &R,
        grids: &[GridGeometry],
        cache: Option<&DisplacementCache>,
        target_time: f64,
    ) -> bool {
        let matching = self.outputs.len() == grids.len()
            && self
                .outputs
                .iter()
                .zip(grids)
                .all(|(output, grid)| output.dim() == (grid.size()[1], grid.size()[0]));
        if self.state == SlotState::Clean && matching {
            return false;
        }

        let empty = self.encoding.empty_value();
        self.outputs = match self.volume.as_ref().filter(|volume| !volume.is_empty()) {
            None => grids
                .iter()
                .map(|grid| {
                    let [width, height, _] = grid.size();
                    Array2::from_elem((height, width), empty)
                })
                .collect(),
            Some(volume) => {
                let transformation = self.effective_transformation();
                let use_cache = !self.invert_transformation
                    && transformation.requires_displacement_caching();
                let mapping = PointMapping::new(transformation)
                    .inverted(self.invert_transformation)
                    .with_cache(cache.filter(|_| use_cache))
                    .with_times(volume.frame_to_time(self.frame), target_time);
                let encoding = self.encoding;
                grids
                    .iter()
                    .map(|grid| {
                        resampler
                            .resample(
                                volume,
                                self.frame,
                                &mapping,
                                self.interpolation,
                                grid,
                                encoding.padding(),
                            )
                            .mapv(|v| encoding.encode(v))
                    })
                    .collect()
            }
        };
        trace!("Resliced slot into {} viewports", grids.len());
        self.state = SlotState::Clean;
        true
    }
}
