//! Flood fill of a marked raster plane and intensity-bounded region growing.

use std::collections::VecDeque;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3};

use crate::enums::Connectivity;
use crate::volume::Voxel;

const FACE_2D: [(i64, i64); 4] = [(-1, 0), (1, 0), (0, -1), (0, 1)];

fn offsets_2d(connectivity: Connectivity) -> Vec<(i64, i64)> {
    match connectivity {
        Connectivity::Face => FACE_2D.to_vec(),
        Connectivity::Full => (-1..=1)
            .flat_map(|a| (-1..=1).map(move |b| (a, b)))
            .filter(|&o| o != (0, 0))
            .collect(),
    }
}

fn offsets_3d(connectivity: Connectivity) -> Vec<(i64, i64, i64)> {
    let all = (-1i64..=1).flat_map(|a| (-1i64..=1).flat_map(move |b| (-1i64..=1).map(move |c| (a, b, c))));
    match connectivity {
        Connectivity::Face => all
            .filter(|&(a, b, c)| a.abs() + b.abs() + c.abs() == 1)
            .collect(),
        Connectivity::Full => all.filter(|&o| o != (0, 0, 0)).collect(),
    }
}

#[inline]
fn step(index: usize, offset: i64, len: usize) -> Option<usize> {
    let next = index as i64 + offset;
    (next >= 0 && (next as usize) < len).then_some(next as usize)
}

/// Unmarked pixels 4-connected to `seed` without crossing a marked one.
///
/// Returns nothing when the seed itself is marked or outside the plane.
pub fn flood_fill(plane: ArrayView2<u8>, seed: (usize, usize)) -> Vec<(usize, usize)> {
    let (rows, cols) = plane.dim();
    if plane.get(seed).is_none_or(|&v| v > 0) {
        return Vec::new();
    }
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut queue = VecDeque::from([seed]);
    let mut filled = Vec::new();
    visited[seed] = true;
    while let Some((r, c)) = queue.pop_front() {
        filled.push((r, c));
        for (dr, dc) in FACE_2D {
            let (Some(nr), Some(nc)) = (step(r, dr, rows), step(c, dc, cols)) else {
                continue;
            };
            if !visited[(nr, nc)] && plane[(nr, nc)] == 0 {
                visited[(nr, nc)] = true;
                queue.push_back((nr, nc));
            }
        }
    }
    filled
}

/// Pixels connected to `seed` whose value lies in `[lo, hi]`.
pub fn region_grow_2d<T: Voxel>(
    slice: ArrayView2<T>,
    seed: (usize, usize),
    (lo, hi): (f64, f64),
    connectivity: Connectivity,
) -> Vec<(usize, usize)> {
    let inside = |v: &T| (lo..=hi).contains(&v.to_f64());
    if slice.get(seed).is_none_or(|v| !inside(v)) {
        return Vec::new();
    }
    let (rows, cols) = slice.dim();
    let offsets = offsets_2d(connectivity);
    let mut visited = Array2::from_elem((rows, cols), false);
    let mut queue = VecDeque::from([seed]);
    let mut grown = Vec::new();
    visited[seed] = true;
    while let Some((r, c)) = queue.pop_front() {
        grown.push((r, c));
        for &(dr, dc) in &offsets {
            let (Some(nr), Some(nc)) = (step(r, dr, rows), step(c, dc, cols)) else {
                continue;
            };
            if !visited[(nr, nc)] && inside(&slice[(nr, nc)]) {
                visited[(nr, nc)] = true;
                queue.push_back((nr, nc));
            }
        }
    }
    grown
}

/// Voxels connected to `seed` whose value lies in `[lo, hi]`, indexed as
/// (z, y, x) like the frame.
pub fn region_grow_3d<T: Voxel>(
    frame: ArrayView3<T>,
    seed: (usize, usize, usize),
    (lo, hi): (f64, f64),
    connectivity: Connectivity,
) -> Vec<(usize, usize, usize)> {
    let inside = |v: &T| (lo..=hi).contains(&v.to_f64());
    if frame.get(seed).is_none_or(|v| !inside(v)) {
        return Vec::new();
    }
    let dim = frame.dim();
    let offsets = offsets_3d(connectivity);
    let mut visited = Array3::from_elem(dim, false);
    let mut queue = VecDeque::from([seed]);
    let mut grown = Vec::new();
    visited[seed] = true;
    while let Some((k, j, i)) = queue.pop_front() {
        grown.push((k, j, i));
        for &(dk, dj, di) in &offsets {
            let (Some(nk), Some(nj), Some(ni)) =
                (step(k, dk, dim.0), step(j, dj, dim.1), step(i, di, dim.2))
            else {
                continue;
            };
            let next = (nk, nj, ni);
            if !visited[next] && inside(&frame[next]) {
                visited[next] = true;
                queue.push_back(next);
            }
        }
    }
    grown
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{Array2, Array3};

    #[test]
    fn fills_inside_a_closed_boundary() {
        let mut plane = Array2::<u8>::zeros((7, 7));
        for n in 1..6 {
            plane[(1, n)] = 1;
            plane[(5, n)] = 1;
            plane[(n, 1)] = 1;
            plane[(n, 5)] = 1;
        }
        let filled = flood_fill(plane.view(), (3, 3));
        assert_eq!(filled.len(), 9);
        assert!(filled.iter().all(|&(r, c)| (2..5).contains(&r) && (2..5).contains(&c)));
        assert!(flood_fill(plane.view(), (1, 1)).is_empty());
        assert!(flood_fill(plane.view(), (9, 9)).is_empty());
    }

    #[test]
    fn diagonal_gap_does_not_leak() {
        let mut plane = Array2::<u8>::zeros((3, 3));
        plane[(0, 1)] = 1;
        plane[(1, 0)] = 1;
        assert_eq!(flood_fill(plane.view(), (0, 0)), vec![(0, 0)]);
    }

    #[test]
    fn region_grow_respects_thresholds() {
        let slice = Array2::from_shape_fn((5, 5), |(_, c)| if c == 2 { 100.0f32 } else { 10.0 });
        let left = region_grow_2d(slice.view(), (0, 0), (0.0, 50.0), Connectivity::Face);
        assert_eq!(left.len(), 10);
        assert!(left.iter().all(|&(_, c)| c < 2));
        assert!(region_grow_2d(slice.view(), (0, 2), (0.0, 50.0), Connectivity::Face).is_empty());
    }

    #[test]
    fn connectivity_controls_diagonal_steps() {
        let slice = Array2::from_shape_fn((3, 3), |(r, c)| if r == c { 1u8 } else { 0 });
        assert_eq!(region_grow_2d(slice.view(), (0, 0), (1.0, 1.0), Connectivity::Face).len(), 1);
        assert_eq!(region_grow_2d(slice.view(), (0, 0), (1.0, 1.0), Connectivity::Full).len(), 3);

        let frame = Array3::from_shape_fn((3, 3, 3), |(k, j, i)| (k == j && j == i) as u8);
        assert_eq!(region_grow_3d(frame.view(), (0, 0, 0), (1.0, 1.0), Connectivity::Face).len(), 1);
        assert_eq!(region_grow_3d(frame.view(), (0, 0, 0), (1.0, 1.0), Connectivity::Full).len(), 3);
    }

    #[test]
    fn region_grow_3d_spans_slices() {
        let frame = Array3::from_shape_fn((4, 3, 3), |(k, _, _)| if k == 3 { 0i16 } else { 5 });
        let grown = region_grow_3d(frame.view(), (1, 1, 1), (5.0, 5.0), Connectivity::Face);
        assert_eq!(grown.len(), 27);
        assert!(grown.iter().all(|&(k, _, _)| k < 3));
    }
}
