use nalgebra::{Matrix3, Point3, Vector3};

use crate::error::ViewerError;

/// Index of the voxel whose centre is nearest to a continuous voxel
/// coordinate. Halfway points go up.
#[inline]
pub(crate) fn voxel_index(x: f64) -> i64 {
    (x + 0.5).floor() as i64
}

/// Voxel-to-world mapping of a regular grid.
///
/// The origin is the world position of the grid centre, so voxel
/// `(size - 1) / 2` along every axis sits exactly on it. Axis directions are
/// the columns of `axes`; `spacing` is given per axis in world units.
#[derive(Clone, Debug, PartialEq)]
pub struct GridGeometry {
    size: [usize; 3],
    spacing: Vector3<f64>,
    axes: Matrix3<f64>,
    origin: Point3<f64>,
    inverse_axes: Matrix3<f64>,
}

impl GridGeometry {
    pub fn new(
        size: [usize; 3],
        spacing: Vector3<f64>,
        axes: Matrix3<f64>,
        origin: Point3<f64>,
    ) -> Result<Self, ViewerError> {
        if spacing.iter().any(|s| !s.is_finite() || *s <= 0.0) {
            return Err(ViewerError::DegenerateSpacing([
                spacing.x, spacing.y, spacing.z,
            ]));
        }
        let inverse_axes = axes
            .try_inverse()
            .filter(|_| axes.determinant().abs() > 1e-9)
            .ok_or(ViewerError::DegenerateAxes)?;
        Ok(Self {
            size,
            spacing,
            axes,
            origin,
            inverse_axes,
        })
    }

    /// Grid aligned with the world axes and centred on the world origin.
    pub fn axis_aligned(size: [usize; 3], spacing: (f64, f64, f64)) -> Result<Self, ViewerError> {
        Self::new(
            size,
            Vector3::new(spacing.0, spacing.1, spacing.2),
            Matrix3::identity(),
            Point3::origin(),
        )
    }

    pub fn with_origin(mut self, origin: Point3<f64>) -> Self {
        self.origin = origin;
        self
    }

    pub fn size(&self) -> [usize; 3] {
        self.size
    }

    pub fn spacing(&self) -> Vector3<f64> {
        self.spacing
    }

    pub fn axes(&self) -> &Matrix3<f64> {
        &self.axes
    }

    /// Unit direction of voxel axis `index` (0 = x, 1 = y, 2 = z).
    pub fn axis(&self, index: usize) -> Vector3<f64> {
        self.axes.column(index).into_owned()
    }

    pub fn origin(&self) -> Point3<f64> {
        self.origin
    }

    pub fn num_voxels(&self) -> usize {
        self.size.iter().product()
    }

    pub fn is_empty(&self) -> bool {
        self.num_voxels() == 0
    }

    fn centre(&self) -> Vector3<f64> {
        Vector3::new(
            (self.size[0] as f64 - 1.0) / 2.0,
            (self.size[1] as f64 - 1.0) / 2.0,
            (self.size[2] as f64 - 1.0) / 2.0,
        )
    }

    pub fn voxel_to_world(&self, voxel: Point3<f64>) -> Point3<f64> {
        let offset = (voxel.coords - self.centre()).component_mul(&self.spacing);
        self.origin + self.axes * offset
    }

    pub fn world_to_voxel(&self, world: Point3<f64>) -> Point3<f64> {
        let local = self.inverse_axes * (world - self.origin);
        Point3::from(local.component_div(&self.spacing) + self.centre())
    }

    pub fn contains_voxel(&self, voxel: [i64; 3]) -> bool {
        voxel
            .iter()
            .zip(self.size)
            .all(|(&v, n)| v >= 0 && (v as usize) < n)
    }

    /// Index of the voxel nearest to `world`, or `None` outside the grid.
    pub fn nearest_voxel(&self, world: Point3<f64>) -> Option<[usize; 3]> {
        let v = self.world_to_voxel(world);
        let rounded = [voxel_index(v.x), voxel_index(v.y), voxel_index(v.z)];
        self.contains_voxel(rounded)
            .then(|| [rounded[0] as usize, rounded[1] as usize, rounded[2] as usize])
    }

    /// Voxel axis whose direction is most parallel to `direction`.
    pub fn most_aligned_axis(&self, direction: &Vector3<f64>) -> usize {
        (0..3)
            .max_by(|&a, &b| {
                let da = self.axis(a).dot(direction).abs();
                let db = self.axis(b).dot(direction).abs();
                da.total_cmp(&db)
            })
            .unwrap_or(2)
    }

    /// World positions of the eight corner voxel centres.
    pub fn corners(&self) -> [Point3<f64>; 8] {
        let hi = self.size.map(|n| n.saturating_sub(1) as f64);
        let mut corners = [Point3::origin(); 8];
        for (n, corner) in corners.iter_mut().enumerate() {
            let v = Point3::new(
                if n & 1 == 0 { 0.0 } else { hi[0] },
                if n & 2 == 0 { 0.0 } else { hi[1] },
                if n & 4 == 0 { 0.0 } else { hi[2] },
            );
            *corner = self.voxel_to_world(v);
        }
        corners
    }
}
