use crate::error::ViewerError;
use crate::lut::Color;

pub const NUMBER_OF_SEGMENTS: usize = 256;

#[derive(Clone, Debug, PartialEq)]
pub struct Segment {
    pub name: String,
    pub color: Color,
    pub visible: bool,
    /// Blend factor of the overlay in `[0, 1]`
    pub transparency: f64,
}

impl Default for Segment {
    fn default() -> Self {
        Self {
            name: String::new(),
            color: Color::rgb(0, 0, 0),
            visible: false,
            transparency: 0.5,
        }
    }
}

/// Label id to overlay appearance.
#[derive(Clone, Debug)]
pub struct SegmentTable {
    segments: Vec<Segment>,
}

impl Default for SegmentTable {
    fn default() -> Self {
        Self {
            segments: vec![Segment::default(); NUMBER_OF_SEGMENTS],
        }
    }
}

impl SegmentTable {
    pub fn get(&self, label: i32) -> Option<&Segment> {
        usize::try_from(label).ok().and_then(|l| self.segments.get(l))
    }

    pub fn set(&mut self, label: i32, segment: Segment) -> Result<(), ViewerError> {
        let slot = usize::try_from(label)
            .ok()
            .and_then(|l| self.segments.get_mut(l))
            .ok_or(ViewerError::InvalidLabel(label))?;
        *slot = Segment {
            transparency: segment.transparency.clamp(0.0, 1.0),
            ..segment
        };
        Ok(())
    }

    pub fn set_visibility(&mut self, label: i32, visible: bool) -> Result<(), ViewerError> {
        let segment = usize::try_from(label)
            .ok()
            .and_then(|l| self.segments.get_mut(l))
            .ok_or(ViewerError::InvalidLabel(label))?;
        segment.visible = visible;
        Ok(())
    }

    /// Overlay color and blend factor of a visible label.
    #[inline]
    pub(crate) fn overlay(&self, label: i32) -> Option<(Color, f64)> {
        self.get(label)
            .filter(|s| s.visible)
            .map(|s| (s.color, s.transparency))
    }

    pub fn clear(&mut self) {
        self.segments.fill(Segment::default());
    }

    pub fn iter(&self) -> impl Iterator<Item = (i32, &Segment)> {
        self.segments.iter().enumerate().map(|(l, s)| (l as i32, s))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_visible_segments_overlay() {
        let mut table = SegmentTable::default();
        let segment = Segment {
            name: "liver".into(),
            color: Color::rgb(200, 0, 0),
            visible: true,
            transparency: 1.5,
        };
        table.set(7, segment).unwrap();
        assert_eq!(table.overlay(7), Some((Color::rgb(200, 0, 0), 1.0)));
        table.set_visibility(7, false).unwrap();
        assert_eq!(table.overlay(7), None);
        assert_eq!(table.overlay(-1), None);
    }

    #[test]
    fn rejects_labels_outside_table() {
        let mut table = SegmentTable::default();
        assert_eq!(
            table.set(256, Segment::default()),
            Err(ViewerError::InvalidLabel(256))
        );
        assert!(table.get(255).is_some());
    }
}
