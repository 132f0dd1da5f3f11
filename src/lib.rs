//! # reslice-view
//!
//! This crate is the core of a multi-viewport viewer for volumetric medical
//! images. It reslices a target and a source volume, a label volume and an
//! interactively edited selection into up to four planar viewports and
//! combines them into one color buffer per viewport.
//!
//! Every viewport shows one of the three display planes:
//!  - XY
//!  - XZ
//!  - YZ
//!
//! All viewports share one cursor, so they differ only in orientation. The
//! source can be shown through a rigid, affine or free-form transformation.
//! Target and source are compared side by side, through a shutter, blended,
//! subtracted or alpha composited. Resampling and compositing run in
//! parallel using rayon.
//!
//! The engine does no drawing, file I/O or event handling of its own. A
//! surrounding application feeds it volumes and screen coordinates and
//! blits the composited buffers.
//!
//! # Examples
//!
//! ## Showing three orthogonal views of a volume
//!
//! Load a volume as the target, lay out three viewports and write the first
//! one to disk.
//!
//! ```no_run
//! # use reslice_view::{ConfigMode, GridGeometry, Viewer, Volume};
//! # use ndarray::Array3;
//! let geometry = GridGeometry::axis_aligned([64, 64, 32], (1.0, 1.0, 2.0))
//!     .expect("should have accepted the spacing");
//! let target = Volume::from_frame(Array3::<f32>::zeros((32, 64, 64)), geometry)
//!     .expect("should have matched the geometry");
//!
//! let mut viewer = Viewer::new(512, 512).expect("should have accepted the screen size");
//! viewer.set_target(Some(target));
//! viewer
//!     .configure(ConfigMode::XyXzYz)
//!     .expect("should have laid out three viewports");
//! viewer.update();
//! let image = viewer
//!     .composited_image(0)
//!     .expect("should have composited the first viewport");
//! image.save("xy.png").expect("should have written the image");
//! ```
//!
//! ## Tracing a selection
//!
//! Screen coordinates have their origin at the top left. Points of one
//! trace must stay inside the viewport the trace started in.
//!
//! ```no_run
//! # use reslice_view::{ContourMode, Viewer};
//! # fn trace(viewer: &mut Viewer) -> Result<(), reslice_view::ViewerError> {
//! viewer.add_contour_point(100.0, 100.0, ContourMode::FirstPoint);
//! viewer.add_contour_point(200.0, 100.0, ContourMode::NewPoint);
//! viewer.add_contour_point(150.0, 200.0, ContourMode::LastPoint);
//! viewer.fill_area(150.0, 150.0);
//! viewer.fill_contour(1)?;
//! # Ok(())
//! # }
//! ```

pub mod cache;
pub mod compositor;
pub mod config;
pub mod contour;
pub mod coords;
pub mod enums;
pub mod error;
pub mod fill;
pub mod geometry;
mod interpolator;
pub mod lut;
pub mod resample;
pub mod segment_table;
pub mod settings;
pub mod slot;
pub mod transform;
pub mod viewer;
pub mod viewport;
pub mod volume;

pub use config::ConfigMode;
pub use enums::{ContourMode, DisplayMode, Interpolation, SegmentationMode, ViewMode, ViewerMode};
pub use error::ViewerError;
pub use geometry::GridGeometry;
pub use lut::{Color, ColorMode, LookupTable};
pub use settings::ViewerSettings;
pub use transform::Transformation;
pub use viewer::Viewer;
pub use volume::Volume;
