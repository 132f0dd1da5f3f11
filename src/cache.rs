use log::info;
use nalgebra::{Point3, Vector3};
use ndarray::{Array3, Zip};
use web_time::Instant;

use crate::geometry::GridGeometry;
use crate::transform::Transformation;

/// Dense displacements of one transformation sampled on a fixed lattice.
///
/// A cache is built for one (transformation, geometry, time pair) generation
/// and never mutated afterwards; any change to those inputs means building a
/// new one.
#[derive(Clone, Debug)]
pub struct DisplacementCache {
    geometry: GridGeometry,
    /// Displacements indexed as (z, y, x)
    displacements: Array3<Vector3<f64>>,
}

impl DisplacementCache {
    pub fn build(
        transformation: &Transformation,
        geometry: &GridGeometry,
        source_time: f64,
        target_time: f64,
    ) -> Self {
        let start = Instant::now();
        let [x, y, z] = geometry.size();
        let mut displacements = Array3::from_elem((z, y, x), Vector3::zeros());
        Zip::indexed(&mut displacements).par_for_each(|(k, j, i), d| {
            let p = geometry.voxel_to_world(Point3::new(i as f64, j as f64, k as f64));
            *d = transformation.transform(p, source_time, target_time) - p;
        });
        info!(
            "Built displacement cache of {}x{}x{} in {:?}",
            x,
            y,
            z,
            start.elapsed()
        );
        Self {
            geometry: geometry.clone(),
            displacements,
        }
    }

    pub fn geometry(&self) -> &GridGeometry {
        &self.geometry
    }

    /// Trilinearly interpolated displacement at `p`, `None` outside the lattice.
    pub fn displacement(&self, p: Point3<f64>) -> Option<Vector3<f64>> {
        let (depth, height, width) = self.displacements.dim();
        if depth == 0 || height == 0 || width == 0 {
            return None;
        }
        let u = self.geometry.world_to_voxel(p);
        let inside = |v: f64, n: usize| v >= -0.5 && v <= n as f64 - 0.5;
        if !inside(u.x, width) || !inside(u.y, height) || !inside(u.z, depth) {
            return None;
        }
        let x = u.x.clamp(0.0, (width - 1) as f64);
        let y = u.y.clamp(0.0, (height - 1) as f64);
        let z = u.z.clamp(0.0, (depth - 1) as f64);
        let (x0, y0, z0) = (x.floor() as usize, y.floor() as usize, z.floor() as usize);
        let (x1, y1, z1) = (
            (x0 + 1).min(width - 1),
            (y0 + 1).min(height - 1),
            (z0 + 1).min(depth - 1),
        );
        let (dx, dy, dz) = (x - x0 as f64, y - y0 as f64, z - z0 as f64);

        let d = &self.displacements;
        let plane = |k: usize| {
            let v0 = d[[k, y0, x0]] * (1.0 - dx) + d[[k, y0, x1]] * dx;
            let v1 = d[[k, y1, x0]] * (1.0 - dx) + d[[k, y1, x1]] * dx;
            v0 * (1.0 - dy) + v1 * dy
        };
        Some(plane(z0) * (1.0 - dz) + plane(z1) * dz)
    }
}
