//! Conversions between screen pixels, normalized window coordinates,
//! viewport pixels, world space and volume voxels.

use nalgebra::Point3;

use crate::geometry::GridGeometry;
use crate::viewport::{Viewport, ViewportRect};

pub struct CoordinateMapper;

impl CoordinateMapper {
    /// Screen pixel to normalized window coordinates with the origin at the
    /// bottom left.
    #[inline]
    pub fn screen_to_normalized(px: f64, py: f64, screen_width: u32, screen_height: u32) -> (f64, f64) {
        let w = screen_width as f64;
        let h = screen_height as f64;
        (px / w, (h - py) / h)
    }

    /// Index of the first rectangle containing `(u, v)`.
    pub fn locate_viewport<'a>(
        u: f64,
        v: f64,
        rects: impl IntoIterator<Item = &'a ViewportRect>,
    ) -> Option<usize> {
        rects.into_iter().position(|rect| rect.contains(u, v))
    }

    #[inline]
    pub fn normalized_to_viewport_pixel(u: f64, v: f64, viewport: &Viewport) -> (f64, f64) {
        let rect = viewport.rect();
        (
            (u - rect.xmin) / rect.width() * viewport.width() as f64,
            (v - rect.ymin) / rect.height() * viewport.height() as f64,
        )
    }

    #[inline]
    pub fn viewport_pixel_to_world(x: f64, y: f64, z: f64, grid: &GridGeometry) -> Point3<f64> {
        grid.voxel_to_world(Point3::new(x, y, z))
    }

    /// Move `world` onto the centre of the nearest voxel of `reference`.
    pub fn snap_to_grid(world: Point3<f64>, reference: &GridGeometry) -> Point3<f64> {
        let v = reference.world_to_voxel(world);
        reference.voxel_to_world(v.map(f64::round))
    }
}
