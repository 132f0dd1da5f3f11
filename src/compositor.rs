use ndarray::Array2;

use crate::enums::ViewMode;
use crate::lut::{Color, LookupTable};
use crate::segment_table::SegmentTable;

/// Resliced outputs of one viewport.
#[derive(Clone, Copy, Debug)]
pub struct Layers<'a> {
    pub target: &'a Array2<i16>,
    pub source: &'a Array2<i16>,
    pub segmentation: &'a Array2<i16>,
    /// Present only while a selection is being edited
    pub selection: Option<&'a Array2<i16>>,
}

/// Everything besides the layers that decides the composited colors.
#[derive(Clone, Copy, Debug)]
pub struct CompositeSettings<'a> {
    pub view_mode: ViewMode,
    pub view_mix: f64,
    pub target_lut: &'a LookupTable,
    pub source_lut: &'a LookupTable,
    pub subtraction_lut: &'a LookupTable,
    /// Segment overlay, `None` when labels are hidden
    pub segments: Option<&'a SegmentTable>,
}

pub struct Compositor;

impl Compositor {
    /// Combine the layers of one viewport into `drawable`, row by row from
    /// the bottom of the viewport.
    ///
    /// A source viewer swaps the roles of target and source.
    pub fn composite(
        layers: &Layers<'_>,
        settings: &CompositeSettings<'_>,
        source_viewer: bool,
        drawable: &mut [Color],
    ) {
        let (mut a, mut b) = (layers.target, layers.source);
        let (mut lut_a, mut lut_b) = (settings.target_lut, settings.source_lut);
        if source_viewer {
            std::mem::swap(&mut a, &mut b);
            std::mem::swap(&mut lut_a, &mut lut_b);
        }

        let (height, width) = a.dim();
        let mix = settings.view_mix;
        for j in 0..height {
            for i in 0..width {
                let Some(out) = drawable.get_mut(j * width + i) else {
                    return;
                };
                let va = a[[j, i]] as i32;
                let vb = b.get([j, i]).copied().unwrap_or(-1) as i32;
                *out = match settings.view_mode {
                    ViewMode::A => lut_a.at(va),
                    ViewMode::B => lut_b.at(vb),
                    ViewMode::VerticalShutter => {
                        if (i as f64) < mix * width as f64 {
                            lut_a.at(va)
                        } else {
                            lut_b.at(vb)
                        }
                    }
                    ViewMode::HorizontalShutter => {
                        if (j as f64) < mix * height as f64 {
                            lut_a.at(va)
                        } else {
                            lut_b.at(vb)
                        }
                    }
                    ViewMode::Subtraction => {
                        if va >= 0 && vb >= 0 {
                            settings.subtraction_lut.at(va - vb)
                        } else {
                            Color::BACKGROUND
                        }
                    }
                    ViewMode::Checkerboard => blend(lut_a.at(va), lut_b.at(vb), mix),
                    ViewMode::AOverB => {
                        let ca = lut_a.at(va);
                        blend(ca, lut_b.at(vb), ca.a as f64 / 255.0)
                    }
                    ViewMode::BOverA => {
                        let cb = lut_b.at(vb);
                        blend(cb, lut_a.at(va), cb.a as f64 / 255.0)
                    }
                };
            }
        }

        if let Some(segments) = settings.segments {
            for ((j, i), &label) in layers.segmentation.indexed_iter() {
                if label < 0 {
                    continue;
                }
                if let (Some((color, alpha)), Some(out)) =
                    (segments.overlay(label as i32), drawable.get_mut(j * width + i))
                {
                    *out = blend(color, *out, alpha);
                }
            }
        }

        if let Some(selection) = layers.selection {
            for ((j, i), _) in selection.indexed_iter().filter(|(_, v)| **v > 0) {
                if let Some(out) = drawable.get_mut(j * width + i) {
                    *out = highlight(*out);
                }
            }
        }
    }
}

/// `w * a + (1 - w) * b` on the color channels, rounded to nearest. Alpha
/// is kept from `b`.
#[inline]
fn blend(a: Color, b: Color, w: f64) -> Color {
    let mix = |x: u8, y: u8| (w * x as f64 + (1.0 - w) * y as f64).round().clamp(0.0, 255.0) as u8;
    Color::new(mix(a.r, b.r), mix(a.g, b.g), mix(a.b, b.b), b.a)
}

/// Halfway towards yellow.
#[inline]
fn highlight(c: Color) -> Color {
    let half = |x: u8, offset: f64| (0.5 * x as f64 + offset).round() as u8;
    Color::new(half(c.r, 127.5), half(c.g, 127.5), half(c.b, 0.0), c.a)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::lut::ColorMode;
    use crate::segment_table::Segment;

    struct Fixture {
        target: Array2<i16>,
        source: Array2<i16>,
        segmentation: Array2<i16>,
        target_lut: LookupTable,
        source_lut: LookupTable,
        subtraction_lut: LookupTable,
    }

    impl Fixture {
        /// Target is pure red 200, source pure green 100.
        fn new() -> Self {
            let mut target_lut = LookupTable::new(0, 255);
            target_lut.set_color_mode(ColorMode::Red);
            let mut source_lut = LookupTable::new(0, 255);
            source_lut.set_color_mode(ColorMode::Green);
            Self {
                target: Array2::from_elem((3, 4), 200),
                source: Array2::from_elem((3, 4), 100),
                segmentation: Array2::from_elem((3, 4), -1),
                target_lut,
                source_lut,
                subtraction_lut: LookupTable::new(-200, 200),
            }
        }

        fn run(&self, mode: ViewMode, mix: f64, source_viewer: bool) -> Vec<Color> {
            self.run_with(mode, mix, source_viewer, None, None)
        }

        fn run_with(
            &self,
            mode: ViewMode,
            mix: f64,
            source_viewer: bool,
            segments: Option<&SegmentTable>,
            selection: Option<&Array2<i16>>,
        ) -> Vec<Color> {
            let layers = Layers {
                target: &self.target,
                source: &self.source,
                segmentation: &self.segmentation,
                selection,
            };
            let settings = CompositeSettings {
                view_mode: mode,
                view_mix: mix,
                target_lut: &self.target_lut,
                source_lut: &self.source_lut,
                subtraction_lut: &self.subtraction_lut,
                segments,
            };
            let mut drawable = vec![Color::BACKGROUND; 12];
            Compositor::composite(&layers, &settings, source_viewer, &mut drawable);
            drawable
        }
    }

    // Fixture luts span [0, 255], so intensity 200 is channel value 200
    const RED: Color = Color::rgb(200, 0, 0);
    const GREEN: Color = Color::rgb(0, 100, 0);

    #[test]
    fn single_modes_and_source_viewer_swap() {
        let f = Fixture::new();
        assert!(f.run(ViewMode::A, 0.5, false).iter().all(|&c| c == RED));
        assert!(f.run(ViewMode::B, 0.5, false).iter().all(|&c| c == GREEN));
        // Swapped: A shows the source layer through the source lut
        assert!(f.run(ViewMode::A, 0.5, true).iter().all(|&c| c == GREEN));
    }

    #[test]
    fn checkerboard_is_uniform_blend() {
        let f = Fixture::new();
        assert_eq!(f.run(ViewMode::Checkerboard, 0.0, false), f.run(ViewMode::B, 0.0, false));
        assert_eq!(f.run(ViewMode::Checkerboard, 1.0, false), f.run(ViewMode::A, 0.0, false));
        let blended = f.run(ViewMode::Checkerboard, 0.3, false);
        assert!(blended.iter().all(|c| (c.r, c.g, c.b) == (60, 70, 0)));
    }

    #[test]
    fn shutters_split_at_mix() {
        let f = Fixture::new();
        assert!(f.run(ViewMode::VerticalShutter, 0.0, false).iter().all(|&c| c == GREEN));
        assert!(f.run(ViewMode::VerticalShutter, 1.0, false).iter().all(|&c| c == RED));

        let split = f.run(ViewMode::VerticalShutter, 0.5, false);
        assert_eq!(&split[0..4], &[RED, RED, GREEN, GREEN]);

        assert!(f.run(ViewMode::HorizontalShutter, 0.0, false).iter().all(|&c| c == GREEN));
        assert!(f.run(ViewMode::HorizontalShutter, 1.0, false).iter().all(|&c| c == RED));

        let split = f.run(ViewMode::HorizontalShutter, 0.5, false);
        assert!(split[0..8].iter().all(|&c| c == RED));
        assert!(split[8..12].iter().all(|&c| c == GREEN));
    }

    #[test]
    fn subtraction_needs_both_layers() {
        let mut f = Fixture::new();
        f.source[[0, 0]] = -1;
        let out = f.run(ViewMode::Subtraction, 0.5, false);
        assert_eq!(out[0], Color::BACKGROUND);
        assert_eq!(out[1], f.subtraction_lut.at(100));
    }

    #[test]
    fn alpha_compositing_uses_lut_opacity() {
        let mut f = Fixture::new();
        assert!(f.run(ViewMode::AOverB, 0.5, false).iter().all(|&c| c == RED));
        f.target_lut.set_opacity(0);
        let out = f.run(ViewMode::AOverB, 0.5, false);
        assert_eq!((out[0].r, out[0].g, out[0].b), (0, 100, 0));
        assert!(f.run(ViewMode::BOverA, 0.5, false).iter().all(|&c| c == GREEN));
    }

    #[test]
    fn b_over_a_weights_by_source_opacity() {
        let mut f = Fixture::new();
        f.source_lut.set_opacity(128);
        // w = 128 / 255: red 127/255 * 200 rounds to 100, green w * 100 to 50
        let out = f.run(ViewMode::BOverA, 0.5, false);
        assert!(out.iter().all(|&c| c == Color::new(100, 50, 0, 255)));
    }

    #[test]
    fn blending_keeps_base_alpha() {
        let mut f = Fixture::new();
        f.source_lut.set_opacity(128);
        let out = f.run(ViewMode::Checkerboard, 0.3, false);
        assert!(out.iter().all(|&c| c == Color::new(60, 70, 0, 128)));
        f.target_lut.set_opacity(0);
        let out = f.run(ViewMode::AOverB, 0.5, false);
        assert!(out.iter().all(|&c| c == Color::new(0, 100, 0, 128)));
    }

    #[test]
    fn overlays_segments_and_selection() {
        let mut f = Fixture::new();
        f.segmentation[[0, 1]] = 3;
        f.segmentation[[0, 2]] = 4;
        let mut segments = SegmentTable::default();
        segments
            .set(
                3,
                Segment {
                    name: "lesion".into(),
                    color: Color::rgb(0, 0, 200),
                    visible: true,
                    transparency: 0.5,
                },
            )
            .unwrap();
        let mut selection = Array2::zeros((3, 4));
        selection[[2, 3]] = 1;

        let out = f.run_with(ViewMode::A, 0.5, false, Some(&segments), Some(&selection));
        assert_eq!(out[1], Color::rgb(100, 0, 100));
        // Label 4 is not visible
        assert_eq!(out[2], RED);
        assert_eq!(out[11], Color::rgb(228, 128, 0));
        assert_eq!(out[0], RED);
    }
}
