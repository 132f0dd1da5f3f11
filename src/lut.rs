use bytemuck::{Pod, Zeroable};

#[cfg(feature = "serde")]
use serde::{Deserialize, Serialize};

/// An 8-bit RGBA pixel.
#[repr(C)]
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Pod, Zeroable)]
pub struct Color {
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub a: u8,
}

impl Color {
    /// Fully transparent black.
    pub const BACKGROUND: Color = Color::new(0, 0, 0, 0);

    pub const fn new(r: u8, g: u8, b: u8, a: u8) -> Self {
        Self { r, g, b, a }
    }

    pub const fn rgb(r: u8, g: u8, b: u8) -> Self {
        Self::new(r, g, b, 255)
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
#[cfg_attr(feature = "serde", derive(Serialize, Deserialize))]
pub enum ColorMode {
    Red,
    Green,
    Blue,
    #[default]
    Luminance,
    InverseLuminance,
    Rainbow,
    HotMetal,
}

/// Maps integer intensities in `[min, max]` to colors.
///
/// The display window `[display_min, display_max]` is stretched over the
/// full 8-bit range; intensities below it get the lowest color and above it
/// the highest. Intensities outside `[min, max]` are clamped first.
#[derive(Clone, Debug)]
pub struct LookupTable {
    min: i32,
    max: i32,
    display_min: i32,
    display_max: i32,
    mode: ColorMode,
    opacity: u8,
    table: Vec<Color>,
}

impl Default for LookupTable {
    fn default() -> Self {
        let mut lut = Self {
            min: 0,
            max: 0,
            display_min: 0,
            display_max: 0,
            mode: ColorMode::default(),
            opacity: 255,
            table: Vec::new(),
        };
        lut.initialize(0, 10000);
        lut
    }
}

impl LookupTable {
    pub fn new(min: i32, max: i32) -> Self {
        let mut lut = Self::default();
        lut.initialize(min, max);
        lut
    }

    /// Set the intensity range and reset the display window to cover it.
    pub fn initialize(&mut self, min: i32, max: i32) {
        let (min, max) = if min <= max { (min, max) } else { (max, min) };
        self.min = min;
        self.max = max;
        self.display_min = min;
        self.display_max = max;
        self.rebuild();
    }

    #[inline]
    pub fn at(&self, intensity: i32) -> Color {
        let index = (intensity.clamp(self.min, self.max) - self.min) as usize;
        self.table[index]
    }

    pub fn min(&self) -> i32 {
        self.min
    }

    pub fn max(&self) -> i32 {
        self.max
    }

    pub fn display_min(&self) -> i32 {
        self.display_min
    }

    pub fn display_max(&self) -> i32 {
        self.display_max
    }

    pub fn color_mode(&self) -> ColorMode {
        self.mode
    }

    pub fn opacity(&self) -> u8 {
        self.opacity
    }

    pub fn set_color_mode(&mut self, mode: ColorMode) {
        self.mode = mode;
        self.rebuild();
    }

    /// Set the display window, clamped to the intensity range.
    pub fn set_display_range(&mut self, display_min: i32, display_max: i32) {
        self.display_min = display_min.clamp(self.min, self.max);
        self.display_max = display_max.clamp(self.min, self.max);
        self.rebuild();
    }

    pub fn set_display_min(&mut self, display_min: i32) {
        self.set_display_range(display_min, self.display_max);
    }

    pub fn set_display_max(&mut self, display_max: i32) {
        self.set_display_range(self.display_min, display_max);
    }

    /// Alpha of every entry, consulted by the alpha-compositing view modes.
    pub fn set_opacity(&mut self, opacity: u8) {
        self.opacity = opacity;
        self.rebuild();
    }

    fn normalized(&self, intensity: i32) -> f64 {
        if self.display_max <= self.display_min {
            return if intensity < self.display_min { 0.0 } else { 1.0 };
        }
        let n = (intensity - self.display_min) as f64
            / (self.display_max - self.display_min) as f64;
        n.clamp(0.0, 1.0)
    }

    fn rebuild(&mut self) {
        let table: Vec<Color> = (self.min..=self.max)
            .map(|i| self.color(self.normalized(i)))
            .collect();
        self.table = table;
    }

    fn color(&self, n: f64) -> Color {
        let c = |v: f64| (255.0 * v).round().clamp(0.0, 255.0) as u8;
        let (r, g, b) = match self.mode {
            ColorMode::Red => (c(n), 0, 0),
            ColorMode::Green => (0, c(n), 0),
            ColorMode::Blue => (0, 0, c(n)),
            ColorMode::Luminance => (c(n), c(n), c(n)),
            ColorMode::InverseLuminance => (c(1.0 - n), c(1.0 - n), c(1.0 - n)),
            ColorMode::Rainbow => {
                // blue -> cyan -> green -> yellow -> red
                let s = 4.0 * n;
                match s {
                    s if s < 1.0 => (0, c(s), 255),
                    s if s < 2.0 => (0, 255, c(2.0 - s)),
                    s if s < 3.0 => (c(s - 2.0), 255, 0),
                    s => (255, c(4.0 - s), 0),
                }
            }
            ColorMode::HotMetal => (c(3.0 * n), c(3.0 * n - 1.0), c(3.0 * n - 2.0)),
        };
        Color::new(r, g, b, self.opacity)
    }
}
