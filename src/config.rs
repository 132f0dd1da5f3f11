#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

use crate::enums::ViewerMode;
use crate::viewport::{ViewportConfig, ViewportRect};

/// Preset viewport layouts.
///
/// `V` layouts place the views side by side, `H` layouts stack them. The
/// `Ab*` presets pair a target view with a source view of the same plane.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ConfigMode {
    #[default]
    Xy,
    Xz,
    Yz,
    XyXzV,
    XyYzV,
    XzYzV,
    XyXzH,
    XyYzH,
    XzYzH,
    XyXzYz,
    AbXyV,
    AbXzV,
    AbYzV,
    AbXyXzV,
    AbXyH,
    AbXzH,
    AbYzH,
    AbXyXzH,
}

impl ConfigMode {
    pub fn layout(self) -> Vec<ViewportConfig> {
        use ViewerMode::*;

        let cell = |xmin, ymin, xmax, ymax, mode| ViewportConfig {
            rect: ViewportRect {
                xmin,
                ymin,
                xmax,
                ymax,
            },
            mode,
        };
        let side_by_side = |a, b| vec![cell(0.0, 0.0, 0.5, 1.0, a), cell(0.5, 0.0, 1.0, 1.0, b)];
        let stacked = |a, b| vec![cell(0.0, 0.5, 1.0, 1.0, a), cell(0.0, 0.0, 1.0, 0.5, b)];

        match self {
            ConfigMode::Xy => vec![cell(0.0, 0.0, 1.0, 1.0, XY)],
            ConfigMode::Xz => vec![cell(0.0, 0.0, 1.0, 1.0, XZ)],
            ConfigMode::Yz => vec![cell(0.0, 0.0, 1.0, 1.0, YZ)],
            ConfigMode::XyXzV => side_by_side(XY, XZ),
            ConfigMode::XyYzV => side_by_side(XY, YZ),
            ConfigMode::XzYzV => side_by_side(XZ, YZ),
            ConfigMode::XyXzH => stacked(XY, XZ),
            ConfigMode::XyYzH => stacked(XY, YZ),
            ConfigMode::XzYzH => stacked(XZ, YZ),
            ConfigMode::XyXzYz => vec![
                cell(0.0, 0.0, 0.5, 1.0, XY),
                cell(0.5, 0.5, 1.0, 1.0, XZ),
                cell(0.5, 0.0, 1.0, 0.5, YZ),
            ],
            ConfigMode::AbXyV => side_by_side(XY, XY),
            ConfigMode::AbXzV => side_by_side(XZ, XZ),
            ConfigMode::AbYzV => side_by_side(YZ, YZ),
            ConfigMode::AbXyH => stacked(XY, XY),
            ConfigMode::AbXzH => stacked(XZ, XZ),
            ConfigMode::AbYzH => stacked(YZ, YZ),
            ConfigMode::AbXyXzV => vec![
                cell(0.0, 0.5, 0.5, 1.0, XY),
                cell(0.5, 0.5, 1.0, 1.0, XY),
                cell(0.0, 0.0, 0.5, 0.5, XZ),
                cell(0.5, 0.0, 1.0, 0.5, XZ),
            ],
            ConfigMode::AbXyXzH => vec![
                cell(0.0, 0.5, 0.5, 1.0, XY),
                cell(0.0, 0.0, 0.5, 0.5, XY),
                cell(0.5, 0.5, 1.0, 1.0, XZ),
                cell(0.5, 0.0, 1.0, 0.5, XZ),
            ],
        }
    }
}

/// Mark every second viewport of each viewer mode as a source viewer.
pub(crate) fn source_viewer_flags(configs: &[ViewportConfig]) -> Vec<bool> {
    let mut toggle = [false; 3];
    configs
        .iter()
        .map(|config| {
            let flag = &mut toggle[config.mode.index()];
            let is_source = *flag;
            *flag = !*flag;
            is_source
        })
        .collect()
}
