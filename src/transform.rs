//! Spatial transformations applied to the source layer when reslicing.
//!
//! Every transformation maps a point of the target (output) space into the
//! source (input) space. Linear kinds carry their parameters explicitly; the
//! deformable kinds are cubic B-spline free-form deformations, optionally
//! stacked on top of a global affine part.

use nalgebra::{Matrix3, Matrix4, Point3, Rotation3, Vector3};
use ndarray::Array3;

use crate::geometry::GridGeometry;

const INVERSE_ITERATIONS: usize = 50;
const INVERSE_TOLERANCE: f64 = 1e-6;

#[derive(Clone, Debug, Default, PartialEq)]
pub struct RigidParameters {
    pub translation: Vector3<f64>,
    /// Rotation about the x, y and z axes in degrees
    pub rotation: Vector3<f64>,
}

impl RigidParameters {
    pub fn new(translation: Vector3<f64>, rotation: Vector3<f64>) -> Self {
        Self {
            translation,
            rotation,
        }
    }

    fn rotation_matrix(&self) -> Matrix3<f64> {
        let r = self.rotation.map(f64::to_radians);
        Rotation3::from_euler_angles(r.x, r.y, r.z).into_inner()
    }

    pub fn matrix(&self) -> Matrix4<f64> {
        let mut m = self.rotation_matrix().to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.translation);
        m
    }
}

#[derive(Clone, Debug, PartialEq)]
pub struct AffineParameters {
    pub rigid: RigidParameters,
    /// Scale factors along x, y and z
    pub scale: Vector3<f64>,
    /// Shear factors (xy, yz, xz)
    pub shear: Vector3<f64>,
}

impl Default for AffineParameters {
    fn default() -> Self {
        Self {
            rigid: RigidParameters::default(),
            scale: Vector3::repeat(1.0),
            shear: Vector3::zeros(),
        }
    }
}

impl AffineParameters {
    pub fn matrix(&self) -> Matrix4<f64> {
        let shear = Matrix3::new(
            1.0,
            self.shear.x,
            self.shear.z,
            0.0,
            1.0,
            self.shear.y,
            0.0,
            0.0,
            1.0,
        );
        let linear = self.rigid.rotation_matrix() * shear * Matrix3::from_diagonal(&self.scale);
        let mut m = linear.to_homogeneous();
        m.fixed_view_mut::<3, 1>(0, 3).copy_from(&self.rigid.translation);
        m
    }
}

/// Cubic B-spline free-form deformation over a control point lattice.
#[derive(Clone, Debug, PartialEq)]
pub struct FreeFormDeformation {
    lattice: GridGeometry,
    /// Control point displacements indexed as (z, y, x)
    coefficients: Array3<Vector3<f64>>,
}

impl FreeFormDeformation {
    /// Deformation with all control points at rest.
    pub fn new(lattice: GridGeometry) -> Self {
        let [x, y, z] = lattice.size();
        Self {
            coefficients: Array3::from_elem((z, y, x), Vector3::zeros()),
            lattice,
        }
    }

    pub fn lattice(&self) -> &GridGeometry {
        &self.lattice
    }

    pub fn number_of_control_points(&self) -> usize {
        self.coefficients.len()
    }

    pub fn control_point(&self, [i, j, k]: [usize; 3]) -> Option<Vector3<f64>> {
        self.coefficients.get((k, j, i)).copied()
    }

    pub fn put_control_point(&mut self, [i, j, k]: [usize; 3], displacement: Vector3<f64>) -> bool {
        match self.coefficients.get_mut((k, j, i)) {
            Some(c) => {
                *c = displacement;
                true
            }
            None => false,
        }
    }

    /// Displacement at a world position; zero far from the lattice.
    pub fn displacement(&self, p: Point3<f64>) -> Vector3<f64> {
        let u = self.lattice.world_to_voxel(p);
        let (ox, oy, oz) = (u.x.floor(), u.y.floor(), u.z.floor());
        let wx = bspline_weights(u.x - ox);
        let wy = bspline_weights(u.y - oy);
        let wz = bspline_weights(u.z - oz);
        let (dz, dy, dx) = self.coefficients.dim();

        let mut d = Vector3::zeros();
        for (c, wc) in wz.iter().enumerate() {
            let k = oz as i64 - 1 + c as i64;
            if k < 0 || k as usize >= dz {
                continue;
            }
            for (b, wb) in wy.iter().enumerate() {
                let j = oy as i64 - 1 + b as i64;
                if j < 0 || j as usize >= dy {
                    continue;
                }
                for (a, wa) in wx.iter().enumerate() {
                    let i = ox as i64 - 1 + a as i64;
                    if i < 0 || i as usize >= dx {
                        continue;
                    }
                    d += self.coefficients[[k as usize, j as usize, i as usize]] * (wa * wb * wc);
                }
            }
        }
        d
    }
}

#[inline]
fn bspline_weights(t: f64) -> [f64; 4] {
    let t2 = t * t;
    let t3 = t2 * t;
    [
        (1.0 - t).powi(3) / 6.0,
        (3.0 * t3 - 6.0 * t2 + 4.0) / 6.0,
        (-3.0 * t3 + 3.0 * t2 + 3.0 * t + 1.0) / 6.0,
        t3 / 6.0,
    ]
}

/// Global affine part plus an ordered list of local deformation levels.
///
/// Local displacements are evaluated at the untransformed point and summed
/// onto the affinely mapped point.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct MultiLevelTransformation {
    pub global: AffineParameters,
    pub levels: Vec<FreeFormDeformation>,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TransformationKind {
    Identity,
    Rigid,
    Affine,
    FreeForm,
    MultiLevel,
}

#[derive(Clone, Debug, Default, PartialEq)]
pub enum Transformation {
    #[default]
    Identity,
    Rigid(RigidParameters),
    Affine(AffineParameters),
    FreeForm(FreeFormDeformation),
    MultiLevel(MultiLevelTransformation),
}

impl Transformation {
    pub fn kind(&self) -> TransformationKind {
        match self {
            Transformation::Identity => TransformationKind::Identity,
            Transformation::Rigid(_) => TransformationKind::Rigid,
            Transformation::Affine(_) => TransformationKind::Affine,
            Transformation::FreeForm(_) => TransformationKind::FreeForm,
            Transformation::MultiLevel(_) => TransformationKind::MultiLevel,
        }
    }

    /// Matrix of the linear part, if any.
    pub fn global_matrix(&self) -> Option<Matrix4<f64>> {
        match self {
            Transformation::Identity => Some(Matrix4::identity()),
            Transformation::Rigid(p) => Some(p.matrix()),
            Transformation::Affine(p) => Some(p.matrix()),
            Transformation::FreeForm(_) => None,
            Transformation::MultiLevel(m) => Some(m.global.matrix()),
        }
    }

    /// Map a target-space point into source space.
    ///
    /// None of the supported kinds is time dependent; the time arguments are
    /// part of the interface for callers that reslice 4D sequences.
    pub fn transform(&self, p: Point3<f64>, _source_time: f64, _target_time: f64) -> Point3<f64> {
        match self {
            Transformation::Identity => p,
            Transformation::Rigid(params) => params.matrix().transform_point(&p),
            Transformation::Affine(params) => params.matrix().transform_point(&p),
            Transformation::FreeForm(ffd) => p + ffd.displacement(p),
            Transformation::MultiLevel(m) => {
                let local: Vector3<f64> = m.levels.iter().map(|ffd| ffd.displacement(p)).sum();
                m.global.matrix().transform_point(&p) + local
            }
        }
    }

    /// Map a source-space point back into target space.
    ///
    /// Linear kinds are inverted exactly; deformable kinds by fixed-point
    /// iteration, returning `None` when it does not converge.
    pub fn inverse_transform(
        &self,
        p: Point3<f64>,
        source_time: f64,
        target_time: f64,
    ) -> Option<Point3<f64>> {
        match self {
            Transformation::Identity => Some(p),
            Transformation::Rigid(_) | Transformation::Affine(_) => self
                .global_matrix()
                .and_then(|m| m.try_inverse())
                .map(|inv| inv.transform_point(&p)),
            Transformation::FreeForm(_) | Transformation::MultiLevel(_) => {
                let linear_inverse = self
                    .global_matrix()
                    .unwrap_or_else(Matrix4::identity)
                    .try_inverse()?;
                let mut x = linear_inverse.transform_point(&p);
                for _ in 0..INVERSE_ITERATIONS {
                    let residual = p - self.transform(x, source_time, target_time);
                    if residual.norm() < INVERSE_TOLERANCE {
                        return Some(x);
                    }
                    x += linear_inverse.fixed_view::<3, 3>(0, 0) * residual;
                }
                None
            }
        }
    }

    /// Deformable transformations are too expensive to evaluate per voxel
    /// and should be sampled through a displacement cache.
    pub fn requires_displacement_caching(&self) -> bool {
        match self {
            Transformation::FreeForm(_) => true,
            Transformation::MultiLevel(m) => !m.levels.is_empty(),
            _ => false,
        }
    }

    pub fn number_of_parameters(&self) -> usize {
        match self {
            Transformation::Identity => 0,
            Transformation::Rigid(_) => 6,
            Transformation::Affine(_) => 12,
            Transformation::FreeForm(ffd) => 3 * ffd.number_of_control_points(),
            Transformation::MultiLevel(m) => {
                12 + m
                    .levels
                    .iter()
                    .map(|ffd| 3 * ffd.number_of_control_points())
                    .sum::<usize>()
            }
        }
    }

    /// Parameters of the linear kinds in the order tx, ty, tz, rx, ry, rz,
    /// sx, sy, sz, sxy, syz, sxz. Deformable kinds report their global part.
    pub fn parameters(&self) -> Vec<f64> {
        let rigid = |p: &RigidParameters| {
            vec![
                p.translation.x,
                p.translation.y,
                p.translation.z,
                p.rotation.x,
                p.rotation.y,
                p.rotation.z,
            ]
        };
        let affine = |p: &AffineParameters| {
            let mut v = rigid(&p.rigid);
            v.extend(p.scale.iter());
            v.extend(p.shear.iter());
            v
        };
        match self {
            Transformation::Identity | Transformation::FreeForm(_) => Vec::new(),
            Transformation::Rigid(p) => rigid(p),
            Transformation::Affine(p) => affine(p),
            Transformation::MultiLevel(m) => affine(&m.global),
        }
    }

    /// Inverse of [`Transformation::parameters`]. Returns false if the
    /// number of values does not match.
    pub fn put_parameters(&mut self, values: &[f64]) -> bool {
        let put_rigid = |p: &mut RigidParameters, v: &[f64]| {
            p.translation = Vector3::new(v[0], v[1], v[2]);
            p.rotation = Vector3::new(v[3], v[4], v[5]);
        };
        let put_affine = |p: &mut AffineParameters, v: &[f64]| {
            put_rigid(&mut p.rigid, v);
            p.scale = Vector3::new(v[6], v[7], v[8]);
            p.shear = Vector3::new(v[9], v[10], v[11]);
        };
        match self {
            Transformation::Rigid(p) if values.len() == 6 => put_rigid(p, values),
            Transformation::Affine(p) if values.len() == 12 => put_affine(p, values),
            Transformation::MultiLevel(m) if values.len() == 12 => put_affine(&mut m.global, values),
            _ => return false,
        }
        true
    }

    /// One-line summary for info overlays.
    pub fn description(&self) -> String {
        match self {
            Transformation::Identity => "Identity transformation (0 DOF)".to_string(),
            Transformation::Rigid(_) => "Rigid transformation (6 DOF)".to_string(),
            Transformation::Affine(_) => "Affine transformation (12 DOF)".to_string(),
            Transformation::FreeForm(ffd) => {
                let s = ffd.lattice().spacing();
                format!(
                    "Free-form transformation ({} DOF, control point spacing {:.2} x {:.2} x {:.2} mm)",
                    self.number_of_parameters(),
                    s.x,
                    s.y,
                    s.z
                )
            }
            Transformation::MultiLevel(m) => format!(
                "Multi-level free-form transformation ({} levels, {} DOF)",
                m.levels.len(),
                self.number_of_parameters()
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn close(a: Point3<f64>, b: Point3<f64>, eps: f64) -> bool {
        (a - b).norm() < eps
    }

    fn bumped_ffd() -> FreeFormDeformation {
        let lattice = GridGeometry::axis_aligned([5, 5, 5], (10.0, 10.0, 10.0)).unwrap();
        let mut ffd = FreeFormDeformation::new(lattice);
        assert!(ffd.put_control_point([2, 2, 2], Vector3::new(3.0, 0.0, 0.0)));
        ffd
    }

    #[test]
    fn rigid_translates_and_rotates() {
        let t = Transformation::Rigid(RigidParameters::new(
            Vector3::new(1.0, 2.0, 3.0),
            Vector3::new(0.0, 0.0, 90.0),
        ));
        let p = t.transform(Point3::new(1.0, 0.0, 0.0), 0.0, 0.0);
        assert!(close(p, Point3::new(1.0, 3.0, 3.0), 1e-9));
    }

    #[test]
    fn affine_inverse_round_trips() {
        let t = Transformation::Affine(AffineParameters {
            rigid: RigidParameters::new(Vector3::new(4.0, -2.0, 1.0), Vector3::new(10.0, 20.0, 30.0)),
            scale: Vector3::new(1.1, 0.9, 1.2),
            shear: Vector3::new(0.1, 0.0, 0.05),
        });
        let p = Point3::new(3.0, -7.0, 12.0);
        let q = t.transform(p, 0.0, 0.0);
        assert!(close(t.inverse_transform(q, 0.0, 0.0).unwrap(), p, 1e-9));
    }

    #[test]
    fn free_form_displacement_peaks_at_control_point() {
        let ffd = bumped_ffd();
        // B-spline weight of the centre control point at a knot is (4/6)^3
        let d = ffd.displacement(Point3::origin());
        assert!((d.x - 3.0 * (4.0_f64 / 6.0).powi(3)).abs() < 1e-9);
        assert_eq!(ffd.displacement(Point3::new(100.0, 0.0, 0.0)), Vector3::zeros());
    }

    #[test]
    fn free_form_inverse_converges() {
        let t = Transformation::FreeForm(bumped_ffd());
        let p = Point3::new(2.0, 1.0, -1.0);
        let q = t.transform(p, 0.0, 0.0);
        assert!(close(t.inverse_transform(q, 0.0, 0.0).unwrap(), p, 1e-5));
    }

    #[test]
    fn metadata_comes_from_variant() {
        let ffd = Transformation::FreeForm(bumped_ffd());
        assert!(ffd.requires_displacement_caching());
        assert_eq!(ffd.number_of_parameters(), 3 * 125);
        assert!(ffd.description().starts_with("Free-form transformation (375 DOF"));

        let rigid = Transformation::Rigid(RigidParameters::default());
        assert!(!rigid.requires_displacement_caching());
        assert_eq!(rigid.description(), "Rigid transformation (6 DOF)");

        let mut affine = Transformation::Affine(AffineParameters::default());
        assert_eq!(affine.parameters()[6..9], [1.0, 1.0, 1.0]);
        assert!(affine.put_parameters(&[1.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 2.0, 2.0, 0.0, 0.0, 0.0]));
        let p = affine.transform(Point3::new(1.0, 1.0, 1.0), 0.0, 0.0);
        assert!(close(p, Point3::new(3.0, 2.0, 2.0), 1e-12));
        assert!(!affine.put_parameters(&[0.0; 6]));

        let empty = Transformation::MultiLevel(MultiLevelTransformation::default());
        assert!(!empty.requires_displacement_caching());
        assert_eq!(empty.number_of_parameters(), 12);
    }
}
