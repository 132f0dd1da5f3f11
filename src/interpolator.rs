use ndarray::ArrayView3;

use crate::geometry::voxel_index;
use crate::volume::Voxel;

pub(crate) struct Interpolator;

impl Interpolator {
    /// Value of the voxel nearest to the continuous index `(x, y, z)`.
    ///
    /// `frame` is indexed as (z, y, x). Returns `None` outside the grid.
    #[inline]
    pub(crate) fn nearest_neighbor<T: Voxel>(
        frame: &ArrayView3<T>,
        x: f64,
        y: f64,
        z: f64,
    ) -> Option<f64> {
        let (depth, height, width) = frame.dim();
        let (i, j, k) = (voxel_index(x), voxel_index(y), voxel_index(z));
        if i < 0 || j < 0 || k < 0 {
            return None;
        }
        let (i, j, k) = (i as usize, j as usize, k as usize);
        if i >= width || j >= height || k >= depth {
            return None;
        }
        Some(frame[[k, j, i]].to_f64())
    }

    /// Trilinear interpolation at the continuous index `(x, y, z)`.
    ///
    /// Points within half a voxel of the border are clamped onto it; points
    /// further out return `None`.
    #[inline]
    pub(crate) fn trilinear_interpolate<T: Voxel>(
        frame: &ArrayView3<T>,
        x: f64,
        y: f64,
        z: f64,
    ) -> Option<f64> {
        let (depth, height, width) = frame.dim();
        if depth == 0 || height == 0 || width == 0 {
            return None;
        }
        let inside = |v: f64, n: usize| v >= -0.5 && v <= n as f64 - 0.5;
        if !inside(x, width) || !inside(y, height) || !inside(z, depth) {
            return None;
        }

        let x = x.clamp(0.0, (width - 1) as f64);
        let y = y.clamp(0.0, (height - 1) as f64);
        let z = z.clamp(0.0, (depth - 1) as f64);

        let x0 = x.floor() as usize;
        let y0 = y.floor() as usize;
        let z0 = z.floor() as usize;
        let x1 = (x0 + 1).min(width - 1);
        let y1 = (y0 + 1).min(height - 1);
        let z1 = (z0 + 1).min(depth - 1);

        let dx = x - x0 as f64;
        let dy = y - y0 as f64;
        let dz = z - z0 as f64;
        let one_minus_dx = 1.0 - dx;
        let one_minus_dy = 1.0 - dy;

        let plane = |k: usize| {
            let v00 = frame[[k, y0, x0]].to_f64();
            let v01 = frame[[k, y0, x1]].to_f64();
            let v10 = frame[[k, y1, x0]].to_f64();
            let v11 = frame[[k, y1, x1]].to_f64();

            let v0 = v00.mul_add(one_minus_dx, v01 * dx);
            let v1 = v10.mul_add(one_minus_dx, v11 * dx);
            v0.mul_add(one_minus_dy, v1 * dy)
        };

        Some(plane(z0).mul_add(1.0 - dz, plane(z1) * dz))
    }
}
