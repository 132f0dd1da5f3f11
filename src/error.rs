use thiserror::Error;

#[derive(Debug, Error, PartialEq)]
pub enum ViewerError {
    #[error("Degenerate viewport rectangle ({xmin}, {ymin}) - ({xmax}, {ymax})")]
    DegenerateViewport {
        xmin: f64,
        ymin: f64,
        xmax: f64,
        ymax: f64,
    },

    #[error("Viewport covers no screen pixels ({width}x{height})")]
    EmptyViewport { width: usize, height: usize },

    #[error("Invalid number of viewports: {0} (expected 1 to 4)")]
    ViewportCount(usize),

    #[error("Voxel spacing must be positive and finite, got {0:?}")]
    DegenerateSpacing([f64; 3]),

    #[error("Axis directions are not linearly independent")]
    DegenerateAxes,

    #[error("Resolution must be positive and finite, got {0}")]
    InvalidResolution(f64),

    #[error("Screen size must be non-zero, got {width}x{height}")]
    InvalidScreen { width: u32, height: u32 },

    #[error("Inconsistent image dimensions")]
    InconsistentDimensions,

    #[error("No frames to assemble into a volume")]
    NoFrames,

    #[error("Segment label {0} is outside the segment table")]
    InvalidLabel(i32),
}
