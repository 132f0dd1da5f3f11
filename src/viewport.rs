use nalgebra::{Matrix3, Point3, Vector3};

use crate::enums::ViewerMode;
use crate::error::ViewerError;
use crate::geometry::GridGeometry;

/// Screen rectangle of a viewport in normalized window coordinates, origin
/// at the bottom left.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportRect {
    pub xmin: f64,
    pub ymin: f64,
    pub xmax: f64,
    pub ymax: f64,
}

impl ViewportRect {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64) -> Result<Self, ViewerError> {
        let valid = [xmin, ymin, xmax, ymax]
            .iter()
            .all(|v| v.is_finite() && (0.0..=1.0).contains(v))
            && xmin < xmax
            && ymin < ymax;
        if !valid {
            return Err(ViewerError::DegenerateViewport {
                xmin,
                ymin,
                xmax,
                ymax,
            });
        }
        Ok(Self {
            xmin,
            ymin,
            xmax,
            ymax,
        })
    }

    pub fn full() -> Self {
        Self {
            xmin: 0.0,
            ymin: 0.0,
            xmax: 1.0,
            ymax: 1.0,
        }
    }

    /// Half-open on the upper edges; a shared edge belongs to the upper
    /// rectangle.
    pub fn contains(&self, u: f64, v: f64) -> bool {
        u >= self.xmin && u < self.xmax && v >= self.ymin && v < self.ymax
    }

    pub fn width(&self) -> f64 {
        self.xmax - self.xmin
    }

    pub fn height(&self) -> f64 {
        self.ymax - self.ymin
    }
}

/// One entry of a viewport configuration.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewportConfig {
    pub rect: ViewportRect,
    pub mode: ViewerMode,
}

impl ViewportConfig {
    pub fn new(xmin: f64, ymin: f64, xmax: f64, ymax: f64, mode: ViewerMode) -> Result<Self, ViewerError> {
        Ok(Self {
            rect: ViewportRect::new(xmin, ymin, xmax, ymax)?,
            mode,
        })
    }
}

/// World directions of the display x, y and z axes.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ViewAxes {
    pub x: Vector3<f64>,
    pub y: Vector3<f64>,
    pub z: Vector3<f64>,
}

impl Default for ViewAxes {
    fn default() -> Self {
        Self {
            x: Vector3::x(),
            y: Vector3::y(),
            z: Vector3::z(),
        }
    }
}

impl ViewAxes {
    pub fn axis(&self, index: usize) -> Vector3<f64> {
        match index {
            0 => self.x,
            1 => self.y,
            _ => self.z,
        }
    }

    /// In-plane horizontal, in-plane vertical and depth directions of a
    /// viewport of the given mode.
    pub fn oriented(&self, mode: ViewerMode) -> (Vector3<f64>, Vector3<f64>, Vector3<f64>) {
        match mode {
            ViewerMode::XY => (self.x, self.y, self.z),
            ViewerMode::XZ => (self.x, self.z, self.y),
            ViewerMode::YZ => (self.y, self.z, self.x),
        }
    }
}

/// Display axis index used as depth by a viewport of the given mode.
pub(crate) fn depth_axis(mode: ViewerMode) -> usize {
    match mode {
        ViewerMode::XY => 2,
        ViewerMode::XZ => 1,
        ViewerMode::YZ => 0,
    }
}

/// A configured viewport: its screen rectangle, pixel size and orientation.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    rect: ViewportRect,
    mode: ViewerMode,
    width: usize,
    height: usize,
    source_viewer: bool,
}

impl Viewport {
    pub fn new(
        config: &ViewportConfig,
        screen_width: u32,
        screen_height: u32,
        source_viewer: bool,
    ) -> Result<Self, ViewerError> {
        let width = (config.rect.width() * screen_width as f64).round() as usize;
        let height = (config.rect.height() * screen_height as f64).round() as usize;
        if width == 0 || height == 0 {
            return Err(ViewerError::EmptyViewport { width, height });
        }
        Ok(Self {
            rect: config.rect,
            mode: config.mode,
            width,
            height,
            source_viewer,
        })
    }

    pub fn rect(&self) -> &ViewportRect {
        &self.rect
    }

    pub fn mode(&self) -> ViewerMode {
        self.mode
    }

    pub fn width(&self) -> usize {
        self.width
    }

    pub fn height(&self) -> usize {
        self.height
    }

    /// Whether target and source swap roles when compositing this viewport.
    pub fn is_source_viewer(&self) -> bool {
        self.source_viewer
    }

    /// Planar output grid this viewport reslices into, centred on `origin`.
    pub fn output_grid(
        &self,
        origin: Point3<f64>,
        resolution: f64,
        axes: &ViewAxes,
        depth_spacing: f64,
    ) -> Result<GridGeometry, ViewerError> {
        let (u, v, depth) = axes.oriented(self.mode);
        let pixel = 1.0 / resolution;
        GridGeometry::new(
            [self.width, self.height, 1],
            Vector3::new(pixel, pixel, depth_spacing),
            Matrix3::from_columns(&[u, v, depth]),
            origin,
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rejects_degenerate_rectangles() {
        assert!(ViewportRect::new(0.5, 0.0, 0.5, 1.0).is_err());
        assert!(ViewportRect::new(0.0, 0.0, 1.2, 1.0).is_err());
        assert!(ViewportRect::new(0.0, f64::NAN, 1.0, 1.0).is_err());
        assert!(ViewportRect::new(0.0, 0.0, 0.5, 1.0).is_ok());
    }

    #[test]
    fn pixel_size_follows_screen() {
        let config = ViewportConfig::new(0.0, 0.0, 0.5, 1.0, ViewerMode::XZ).unwrap();
        let viewport = Viewport::new(&config, 201, 100, false).unwrap();
        assert_eq!((viewport.width(), viewport.height()), (101, 100));

        let tiny = ViewportConfig::new(0.0, 0.0, 0.001, 1.0, ViewerMode::XY).unwrap();
        assert_eq!(
            Viewport::new(&tiny, 100, 100, false),
            Err(ViewerError::EmptyViewport {
                width: 0,
                height: 100
            })
        );
    }

    #[test]
    fn output_grid_uses_mode_axes() {
        let config = ViewportConfig::new(0.0, 0.0, 1.0, 1.0, ViewerMode::YZ).unwrap();
        let viewport = Viewport::new(&config, 10, 20, false).unwrap();
        let grid = viewport
            .output_grid(Point3::origin(), 2.0, &ViewAxes::default(), 3.0)
            .unwrap();
        assert_eq!(grid.size(), [10, 20, 1]);
        assert_eq!(grid.axis(0), Vector3::y());
        assert_eq!(grid.axis(1), Vector3::z());
        assert_eq!(grid.axis(2), Vector3::x());
        assert_eq!(grid.spacing(), Vector3::new(0.5, 0.5, 3.0));
    }
}
