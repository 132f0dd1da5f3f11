#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// Which two world axes span a viewport and which one is its slice normal.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ViewerMode {
    XY,
    XZ,
    YZ,
}

impl ViewerMode {
    pub(crate) fn index(self) -> usize {
        match self {
            ViewerMode::XY => 0,
            ViewerMode::XZ => 1,
            ViewerMode::YZ => 2,
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Interpolation {
    #[default]
    NearestNeighbor,
    Linear,
    // TODO:
    // CSpline,
    // BSpline,
}

/// How the target and source layers are combined into one image.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ViewMode {
    /// Target only
    #[default]
    A,
    /// Source only
    B,
    VerticalShutter,
    HorizontalShutter,
    Subtraction,
    /// Uniform blend of target and source weighted by the view mix.
    ///
    /// Despite the name no spatial checker pattern is drawn.
    Checkerboard,
    AOverB,
    BOverA,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ContourMode {
    FirstPoint,
    NewPoint,
    LastPoint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum SegmentationMode {
    /// Free-hand contour, the last point closes the path
    #[default]
    Contour,
    /// Paint brush, the last point is a plain append
    Paint,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum RegionGrowingMode {
    #[default]
    TwoD,
    ThreeD,
}

/// Neighbourhood used by region growing: face neighbours (4 in 2D, 6 in 3D)
/// or every touching voxel (8 in 2D, 26 in 3D).
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum Connectivity {
    #[default]
    Face,
    Full,
}

/// How the view axes are derived from the target image orientation.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum DisplayMode {
    /// Voxel axes as stored
    Native,
    #[default]
    Neurological,
    Radiological,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum CursorMode {
    #[default]
    CrossHair,
    CursorX,
    CursorV,
    CursorBar,
}

/// The four logical layers resliced into every viewport.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum SlotKind {
    Target,
    Source,
    Segmentation,
    Selection,
}
