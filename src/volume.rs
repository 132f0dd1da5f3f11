use crate::error::ViewerError;
use crate::geometry::GridGeometry;

use nalgebra::Point3;
use ndarray::Array3;
use ndarray::Array4;
use ndarray::ArrayView2;
use ndarray::ArrayView3;
use ndarray::ArrayViewMut3;
use ndarray::Axis;
use ndarray::s;
use rayon::prelude::*;

/// Scalar types a [`Volume`] can hold.
pub trait Voxel: Copy + Default + PartialEq + Send + Sync + 'static {
    fn to_f64(self) -> f64;
    fn from_f64(value: f64) -> Self;
}

impl Voxel for f32 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value as f32
    }
}

impl Voxel for i16 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(i16::MIN as f64, i16::MAX as f64) as i16
    }
}

impl Voxel for u8 {
    #[inline]
    fn to_f64(self) -> f64 {
        self as f64
    }

    #[inline]
    fn from_f64(value: f64) -> Self {
        value.round().clamp(0.0, 255.0) as u8
    }
}

/// A 3D or 4D scalar grid placed in world space.
#[derive(Clone, Debug)]
pub struct Volume<T = f32> {
    /// Voxels indexed as (t, z, y, x)
    pub data: Array4<T>,
    pub geometry: GridGeometry,
    time_origin: f64,
    time_spacing: f64,
}

impl<T: Voxel> Volume<T> {
    pub fn new(data: Array4<T>, geometry: GridGeometry) -> Result<Self, ViewerError> {
        let (_, depth, height, width) = data.dim();
        if [width, height, depth] != geometry.size() {
            return Err(ViewerError::InconsistentDimensions);
        }
        Ok(Self {
            data,
            geometry,
            time_origin: 0.0,
            time_spacing: 1.0,
        })
    }

    /// Single-frame volume from (z, y, x) data
    pub fn from_frame(data: Array3<T>, geometry: GridGeometry) -> Result<Self, ViewerError> {
        Self::new(data.insert_axis(Axis(0)), geometry)
    }

    pub fn zeros(geometry: GridGeometry, frames: usize) -> Self {
        let [x, y, z] = geometry.size();
        Self {
            data: Array4::from_elem((frames.max(1), z, y, x), T::default()),
            geometry,
            time_origin: 0.0,
            time_spacing: 1.0,
        }
    }

    /// Stack single-frame volumes of a multi-file sequence into one 4D volume.
    ///
    /// # Errors
    ///
    /// Returns error if the sequence is empty or the frames disagree in geometry
    pub fn from_frames(frames: Vec<Volume<T>>) -> Result<Self, ViewerError> {
        let first = frames.first().ok_or(ViewerError::NoFrames)?;
        let geometry = first.geometry.clone();
        if frames
            .iter()
            .any(|frame| frame.geometry != geometry || frame.frames() != 1)
        {
            return Err(ViewerError::InconsistentDimensions);
        }
        let [x, y, z] = geometry.size();
        let mut data = Array4::from_elem((frames.len(), z, y, x), T::default());
        for (t, frame) in frames.iter().enumerate() {
            data.slice_mut(s![t, .., .., ..]).assign(&frame.frame(0));
        }
        Self::new(data, geometry)
    }

    /// Time origin and frame spacing; a zero spacing is treated as one.
    pub fn with_time_axis(mut self, origin: f64, spacing: f64) -> Self {
        self.time_origin = origin;
        self.time_spacing = if spacing == 0.0 { 1.0 } else { spacing };
        self
    }

    /// Get the dimensions of the volume (frames, depth, height, width)
    pub fn dim(&self) -> (usize, usize, usize, usize) {
        self.data.dim()
    }

    pub fn frames(&self) -> usize {
        self.data.dim().0
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Get a reference to the underlying data
    pub fn data(&self) -> &Array4<T> {
        &self.data
    }

    /// Get a mutable reference to the underlying data
    pub fn data_mut(&mut self) -> &mut Array4<T> {
        &mut self.data
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// View of frame `t` as (z, y, x), clamped to the last frame.
    pub fn frame(&self, t: usize) -> ArrayView3<'_, T> {
        let t = t.min(self.frames().saturating_sub(1));
        self.data.index_axis(Axis(0), t)
    }

    pub fn frame_mut(&mut self, t: usize) -> ArrayViewMut3<'_, T> {
        let t = t.min(self.frames().saturating_sub(1));
        self.data.index_axis_mut(Axis(0), t)
    }

    pub fn get(&self, [i, j, k]: [usize; 3], t: usize) -> Option<T> {
        self.data.get((t, k, j, i)).copied()
    }

    pub fn set(&mut self, [i, j, k]: [usize; 3], t: usize, value: T) -> bool {
        match self.data.get_mut((t, k, j, i)) {
            Some(voxel) => {
                *voxel = value;
                true
            }
            None => false,
        }
    }

    /// Slice of frame `t` with voxel `axis` (0 = x, 1 = y, 2 = z) held at `index`.
    pub fn get_slice_from_axis(
        &self,
        index: usize,
        axis: usize,
        t: usize,
    ) -> Option<ArrayView2<'_, T>> {
        if !self.is_valid_index(index, axis) {
            return None;
        }
        let frame = self.frame(t);
        let slice = match axis {
            2 => frame.slice_move(s![index, .., ..]),
            1 => frame.slice_move(s![.., index, ..]),
            _ => frame.slice_move(s![.., .., index]),
        };
        Some(slice)
    }

    fn is_valid_index(&self, index: usize, axis: usize) -> bool {
        axis < 3 && index < self.geometry.size()[axis]
    }

    /// Smallest and largest voxel value, `(0, 0)` for an empty volume.
    pub fn min_max(&self) -> (f64, f64) {
        if self.is_empty() {
            return (0.0, 0.0);
        }
        self.data
            .as_slice_memory_order()
            .map(|values| {
                values
                    .par_iter()
                    .map(|v| v.to_f64())
                    .fold(
                        || (f64::INFINITY, f64::NEG_INFINITY),
                        |(lo, hi), v| (lo.min(v), hi.max(v)),
                    )
                    .reduce(
                        || (f64::INFINITY, f64::NEG_INFINITY),
                        |a, b| (a.0.min(b.0), a.1.max(b.1)),
                    )
            })
            .unwrap_or_else(|| {
                self.data.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
                    (lo.min(v.to_f64()), hi.max(v.to_f64()))
                })
            })
    }

    pub fn frame_to_time(&self, t: usize) -> f64 {
        self.time_origin + t as f64 * self.time_spacing
    }

    pub fn world_to_voxel(&self, world: Point3<f64>) -> Point3<f64> {
        self.geometry.world_to_voxel(world)
    }

    pub fn voxel_to_world(&self, voxel: Point3<f64>) -> Point3<f64> {
        self.geometry.voxel_to_world(voxel)
    }
}
