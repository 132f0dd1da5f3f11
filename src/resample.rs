use nalgebra::Point3;
use ndarray::Array2;
use rayon::prelude::*;

use crate::cache::DisplacementCache;
use crate::enums::Interpolation;
use crate::geometry::GridGeometry;
use crate::interpolator::Interpolator;
use crate::transform::Transformation;
use crate::volume::{Volume, Voxel};

static IDENTITY: Transformation = Transformation::Identity;

/// Maps output (target space) points into the input volume's world space.
#[derive(Clone, Copy, Debug)]
pub struct PointMapping<'a> {
    transformation: &'a Transformation,
    invert: bool,
    cache: Option<&'a DisplacementCache>,
    source_time: f64,
    target_time: f64,
}

impl<'a> PointMapping<'a> {
    pub fn new(transformation: &'a Transformation) -> Self {
        Self {
            transformation,
            invert: false,
            cache: None,
            source_time: 0.0,
            target_time: 0.0,
        }
    }

    pub fn identity() -> PointMapping<'static> {
        PointMapping::new(&IDENTITY)
    }

    pub fn inverted(mut self, invert: bool) -> Self {
        self.invert = invert;
        self
    }

    /// Only consulted when the forward transformation is applied.
    pub fn with_cache(mut self, cache: Option<&'a DisplacementCache>) -> Self {
        self.cache = cache;
        self
    }

    pub fn with_times(mut self, source_time: f64, target_time: f64) -> Self {
        self.source_time = source_time;
        self.target_time = target_time;
        self
    }

    pub fn map(&self, p: Point3<f64>) -> Option<Point3<f64>> {
        if self.invert {
            return self
                .transformation
                .inverse_transform(p, self.source_time, self.target_time);
        }
        match self.cache.and_then(|cache| cache.displacement(p)) {
            Some(d) => Some(p + d),
            None => Some(
                self.transformation
                    .transform(p, self.source_time, self.target_time),
            ),
        }
    }
}

/// Resamples one frame of a volume onto a planar output grid.
pub trait Resampler: Send + Sync {
    /// The output has one row per grid voxel along y and one column per voxel
    /// along x. Points that map outside the input get `padding`.
    fn resample<T: Voxel>(
        &self,
        input: &Volume<T>,
        frame: usize,
        mapping: &PointMapping<'_>,
        interpolation: Interpolation,
        grid: &GridGeometry,
        padding: f64,
    ) -> Array2<f64>;
}

/// Reference resampler evaluating every output pixel on the CPU, one rayon
/// task per output row.
#[derive(Clone, Copy, Debug, Default)]
pub struct CpuResampler;

impl Resampler for CpuResampler {
    fn resample<T: Voxel>(
        &self,
        input: &Volume<T>,
        frame: usize,
        mapping: &PointMapping<'_>,
        interpolation: Interpolation,
        grid: &GridGeometry,
        padding: f64,
    ) -> Array2<f64> {
        let [width, height, _] = grid.size();
        if input.is_empty() {
            return Array2::from_elem((height, width), padding);
        }
        let frame = input.frame(frame);

        let values: Vec<f64> = (0..height)
            .into_par_iter()
            .flat_map(|y| {
                (0..width)
                    .map(|x| {
                        let world = grid.voxel_to_world(Point3::new(x as f64, y as f64, 0.0));
                        mapping
                            .map(world)
                            .and_then(|p| {
                                let v = input.world_to_voxel(p);
                                match interpolation {
                                    Interpolation::NearestNeighbor => {
                                        Interpolator::nearest_neighbor(&frame, v.x, v.y, v.z)
                                    }
                                    Interpolation::Linear => {
                                        Interpolator::trilinear_interpolate(&frame, v.x, v.y, v.z)
                                    }
                                }
                            })
                            .unwrap_or(padding)
                    })
                    .collect::<Vec<f64>>()
            })
            .collect();

        Array2::from_shape_vec((height, width), values)
            .unwrap_or_else(|_| Array2::from_elem((height, width), padding))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::transform::RigidParameters;
    use nalgebra::{Matrix3, Vector3};
    use ndarray::Array3;

    fn ramp() -> Volume<f32> {
        let geometry = GridGeometry::axis_aligned([4, 4, 4], (1.0, 1.0, 1.0)).unwrap();
        let data = Array3::from_shape_fn((4, 4, 4), |(k, j, i)| (i + 10 * j + 100 * k) as f32);
        Volume::from_frame(data, geometry).unwrap()
    }

    fn xy_plane(origin: Point3<f64>) -> GridGeometry {
        GridGeometry::new([4, 4, 1], Vector3::repeat(1.0), Matrix3::identity(), origin).unwrap()
    }

    #[test]
    fn identity_reproduces_voxels_on_matching_grid() {
        let volume = ramp();
        // z = 0.5 is the centre of slice k = 2
        let grid = xy_plane(Point3::new(0.0, 0.0, 0.5));
        let out = CpuResampler.resample(
            &volume,
            0,
            &PointMapping::identity(),
            Interpolation::NearestNeighbor,
            &grid,
            -1.0,
        );
        assert_eq!(out.dim(), (4, 4));
        assert_eq!(out[[1, 3]], 213.0);
    }

    #[test]
    fn pads_points_outside_input() {
        let volume = ramp();
        let t = Transformation::Rigid(RigidParameters::new(
            Vector3::new(2.0, 0.0, 0.0),
            Vector3::zeros(),
        ));
        let grid = xy_plane(Point3::new(0.0, 0.0, 0.5));
        let out = CpuResampler.resample(
            &volume,
            0,
            &PointMapping::new(&t),
            Interpolation::Linear,
            &grid,
            -1.0,
        );
        assert_eq!(out[[0, 0]], 202.0);
        assert_eq!(out[[0, 3]], -1.0);

        let back = CpuResampler.resample(
            &volume,
            0,
            &PointMapping::new(&t).inverted(true),
            Interpolation::NearestNeighbor,
            &grid,
            -1.0,
        );
        assert_eq!(back[[0, 0]], -1.0);
        assert_eq!(back[[0, 2]], 200.0);
    }

    #[test]
    fn empty_input_is_all_padding() {
        let geometry = GridGeometry::axis_aligned([0, 0, 0], (1.0, 1.0, 1.0)).unwrap();
        let volume = Volume::<f32>::zeros(geometry, 1);
        let grid = xy_plane(Point3::origin());
        let out = CpuResampler.resample(
            &volume,
            0,
            &PointMapping::identity(),
            Interpolation::Linear,
            &grid,
            7.0,
        );
        assert!(out.iter().all(|&v| v == 7.0));
    }
}
