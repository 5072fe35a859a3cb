//! Screen-space and page-space geometry.
//!
//! Screen rectangles have a top-left origin and grow downward. PDF page
//! space has a bottom-left origin and grows upward. A quad is the 8-number
//! group `[blx, bly, brx, bry, tlx, tly, trx, try]` used by `/QuadPoints`.

use serde::{Deserialize, Serialize};

pub type Quad = [f64; 8];

const BOT_L_Y: usize = 1;
const BOT_R_X: usize = 2;
const BOT_R_Y: usize = 3;
const TOP_L_Y: usize = 5;
const TOP_R_X: usize = 6;
const TOP_R_Y: usize = 7;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScreenRect {
    pub left: f64,
    pub top: f64,
    pub width: f64,
    pub height: f64,
}

impl ScreenRect {
    pub fn new(left: f64, top: f64, width: f64, height: f64) -> Self {
        Self {
            left,
            top,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.left + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.top + self.height
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum Rotation {
    #[default]
    None,
    Quarter,
    Half,
    ThreeQuarters,
}

impl Rotation {
    /// Normalizes a `/Rotate` value. Anything that is not a multiple of 90
    /// is treated as unrotated.
    pub fn from_degrees(degrees: i64) -> Self {
        match degrees.rem_euclid(360) {
            90 => Rotation::Quarter,
            180 => Rotation::Half,
            270 => Rotation::ThreeQuarters,
            _ => Rotation::None,
        }
    }

    pub fn degrees(self) -> i64 {
        match self {
            Rotation::None => 0,
            Rotation::Quarter => 90,
            Rotation::Half => 180,
            Rotation::ThreeQuarters => 270,
        }
    }

    /// Screen fraction (top-left origin) to unrotated page fraction
    /// (bottom-left origin).
    fn screen_to_page(self, sx: f64, sy: f64) -> (f64, f64) {
        match self {
            Rotation::None => (sx, 1.0 - sy),
            Rotation::Quarter => (sy, sx),
            Rotation::Half => (1.0 - sx, sy),
            Rotation::ThreeQuarters => (1.0 - sy, 1.0 - sx),
        }
    }

    fn page_to_screen(self, px: f64, py: f64) -> (f64, f64) {
        match self {
            Rotation::None => (px, 1.0 - py),
            Rotation::Quarter => (py, px),
            Rotation::Half => (1.0 - px, py),
            Rotation::ThreeQuarters => (1.0 - py, 1.0 - px),
        }
    }
}

/// The visible extent of a page in PDF units: the crop box, or the media
/// box when the page has no crop box.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageBox {
    pub x0: f64,
    pub y0: f64,
    pub x1: f64,
    pub y1: f64,
    #[serde(default)]
    pub rotation: Rotation,
}

impl PageBox {
    /// Builds a box from any two opposite corners.
    pub fn new(a: f64, b: f64, c: f64, d: f64) -> Self {
        Self {
            x0: a.min(c),
            y0: b.min(d),
            x1: a.max(c),
            y1: b.max(d),
            rotation: Rotation::None,
        }
    }

    pub fn with_rotation(mut self, rotation: Rotation) -> Self {
        self.rotation = rotation;
        self
    }

    pub fn width(&self) -> f64 {
        self.x1 - self.x0
    }

    pub fn height(&self) -> f64 {
        self.y1 - self.y0
    }
}

/// Insets of an overlay, in percent of the rendered page, the way a
/// positioned element is laid out over the page view.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Insets {
    pub top: f64,
    pub left: f64,
    pub bottom: f64,
    pub right: f64,
}

/// Converts a text node's on-screen rectangle to a page-space quad.
pub fn screen_rect_to_quad(node: &ScreenRect, page: &ScreenRect, page_box: &PageBox) -> Quad {
    let fx0 = (node.left - page.left) / page.width;
    let fx1 = (node.right() - page.left) / page.width;
    let fy0 = (node.top - page.top) / page.height;
    let fy1 = (node.bottom() - page.top) / page.height;

    let (ax, ay) = page_box.rotation.screen_to_page(fx0, fy0);
    let (bx, by) = page_box.rotation.screen_to_page(fx1, fy1);

    let x0 = ax.min(bx) * page_box.width() + page_box.x0;
    let x1 = ax.max(bx) * page_box.width() + page_box.x0;
    let y0 = ay.min(by) * page_box.height() + page_box.y0;
    let y1 = ay.max(by) * page_box.height() + page_box.y0;

    [x0, y0, x1, y0, x0, y1, x1, y1]
}

/// Inverse of [`screen_rect_to_quad`]: where a quad sits on the rendered
/// page, as percentage insets from each edge.
pub fn quad_to_overlay(quad: &Quad, page_box: &PageBox) -> Insets {
    let (xmin, xmax) = min_max(quad.iter().step_by(2).copied());
    let (ymin, ymax) = min_max(quad.iter().skip(1).step_by(2).copied());

    let px0 = (xmin - page_box.x0) / page_box.width();
    let px1 = (xmax - page_box.x0) / page_box.width();
    let py0 = (ymin - page_box.y0) / page_box.height();
    let py1 = (ymax - page_box.y0) / page_box.height();

    let (ax, ay) = page_box.rotation.page_to_screen(px0, py0);
    let (bx, by) = page_box.rotation.page_to_screen(px1, py1);

    Insets {
        top: 100.0 * ay.min(by),
        left: 100.0 * ax.min(bx),
        bottom: 100.0 * (1.0 - ay.max(by)),
        right: 100.0 * (1.0 - ax.max(bx)),
    }
}

/// Splits a flat `/QuadPoints` array into quads, ignoring a trailing
/// partial group.
pub fn chunk_quads(flat: &[f64]) -> Vec<Quad> {
    flat.chunks_exact(8)
        .map(|chunk| {
            let mut quad = [0.0; 8];
            quad.copy_from_slice(chunk);
            quad
        })
        .collect()
}

pub fn flatten_quads(quads: &[Quad]) -> Vec<f64> {
    quads.iter().flat_map(|q| q.iter().copied()).collect()
}

/// `[xmin, ymin, xmax, ymax]` over every corner of every quad.
pub fn bounding_rect(quads: &[Quad]) -> Option<[f64; 4]> {
    if quads.is_empty() {
        return None;
    }
    let (xmin, xmax) = min_max(quads.iter().flat_map(|q| q.iter().step_by(2).copied()));
    let (ymin, ymax) = min_max(quads.iter().flat_map(|q| q.iter().skip(1).step_by(2).copied()));
    Some([xmin, ymin, xmax, ymax])
}

fn min_max(values: impl Iterator<Item = f64>) -> (f64, f64) {
    values.fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), v| {
        (lo.min(v), hi.max(v))
    })
}

fn overlaps_vertically(current: &Quad, next: &Quad) -> bool {
    current[BOT_R_Y] < next[TOP_L_Y] && current[TOP_R_Y] > next[BOT_L_Y]
}

/// Cleans up the per-node quads of one selection.
///
/// The first pass keeps a quad and then jumps straight to the next quad
/// that shares its line, dropping spans in between that sit out of line.
/// The second pass merges consecutive quads on the same line whose right
/// edges keep moving right.
pub fn smooth_quads(quads: &[Quad]) -> Vec<Quad> {
    let mut cleaned: Vec<Quad> = Vec::with_capacity(quads.len());
    let mut i = 0;
    while i < quads.len() {
        let current = quads[i];
        cleaned.push(current);
        if let Some(skip) = quads[i + 1..]
            .iter()
            .position(|next| overlaps_vertically(&current, next))
        {
            i += skip;
        }
        i += 1;
    }

    let mut combined: Vec<Quad> = Vec::with_capacity(cleaned.len());
    for quad in cleaned {
        match combined.last_mut() {
            Some(cur)
                if overlaps_vertically(cur, &quad)
                    && cur[TOP_R_X] < quad[TOP_R_X]
                    && cur[BOT_R_X] < quad[BOT_R_X] =>
            {
                cur[BOT_R_X] = quad[BOT_R_X];
                cur[TOP_R_X] = quad[TOP_R_X];
                cur[BOT_R_Y] = quad[BOT_R_Y];
                cur[TOP_R_Y] = quad[TOP_R_Y];
            }
            _ => combined.push(quad),
        }
    }
    combined
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-9;

    fn letter() -> PageBox {
        PageBox::new(0.0, 0.0, 612.0, 792.0)
    }

    fn assert_close(a: f64, b: f64) {
        assert!((a - b).abs() < EPS, "{a} != {b}");
    }

    #[test]
    fn quad_flips_vertical_axis() {
        let page = ScreenRect::new(100.0, 50.0, 612.0, 792.0);
        let node = ScreenRect::new(172.0, 122.0, 100.0, 12.0);
        let quad = screen_rect_to_quad(&node, &page, &letter());
        let expected = [72.0, 708.0, 172.0, 708.0, 72.0, 720.0, 172.0, 720.0];
        for (got, want) in quad.iter().zip(expected) {
            assert!((got - want).abs() < 1e-6, "{quad:?}");
        }
    }

    #[test]
    fn quad_rescales_into_offset_crop_box() {
        let page = ScreenRect::new(0.0, 0.0, 200.0, 100.0);
        let node = ScreenRect::new(0.0, 0.0, 100.0, 50.0);
        let crop = PageBox::new(10.0, 20.0, 410.0, 220.0);
        let quad = screen_rect_to_quad(&node, &page, &crop);
        assert_eq!(quad, [10.0, 120.0, 210.0, 120.0, 10.0, 220.0, 210.0, 220.0]);
    }

    #[test]
    fn overlay_round_trips_every_rotation() {
        let page = ScreenRect::new(30.0, 40.0, 500.0, 700.0);
        let node = ScreenRect::new(80.0, 140.0, 120.0, 14.0);
        for degrees in [0, 90, 180, 270] {
            let page_box = PageBox::new(5.0, 10.0, 600.0, 800.0)
                .with_rotation(Rotation::from_degrees(degrees));
            let quad = screen_rect_to_quad(&node, &page, &page_box);
            let insets = quad_to_overlay(&quad, &page_box);
            assert_close(insets.left, 100.0 * (node.left - page.left) / page.width);
            assert_close(insets.top, 100.0 * (node.top - page.top) / page.height);
            assert_close(
                insets.right,
                100.0 * (page.right() - node.right()) / page.width,
            );
            assert_close(
                insets.bottom,
                100.0 * (page.bottom() - node.bottom()) / page.height,
            );
        }
    }

    #[test]
    fn rotation_normalizes_degrees() {
        assert_eq!(Rotation::from_degrees(-90), Rotation::ThreeQuarters);
        assert_eq!(Rotation::from_degrees(450), Rotation::Quarter);
        assert_eq!(Rotation::from_degrees(45), Rotation::None);
    }

    #[test]
    fn bounding_rect_covers_all_corners() {
        let quads = [
            [0.0, 0.0, 10.0, 0.0, 0.0, 5.0, 10.0, 5.0],
            [2.0, -3.0, 20.0, -3.0, 2.0, 1.0, 20.0, 1.0],
        ];
        assert_eq!(bounding_rect(&quads), Some([0.0, -3.0, 20.0, 5.0]));
        assert_eq!(bounding_rect(&[]), None);
    }

    #[test]
    fn chunking_drops_partial_groups() {
        let flat = [0.0, 0.0, 1.0, 0.0, 0.0, 1.0, 1.0, 1.0, 9.0];
        assert_eq!(chunk_quads(&flat).len(), 1);
    }

    fn span(x0: f64, x1: f64, y0: f64, y1: f64) -> Quad {
        [x0, y0, x1, y0, x0, y1, x1, y1]
    }

    #[test]
    fn smoothing_merges_contiguous_spans_on_a_line() {
        let quads = [
            span(0.0, 10.0, 100.0, 110.0),
            span(10.0, 30.0, 101.0, 111.0),
            span(30.0, 50.0, 100.0, 110.0),
        ];
        let smoothed = smooth_quads(&quads);
        assert_eq!(smoothed.len(), 1);
        assert_eq!(smoothed[0][BOT_R_X], 50.0);
        assert_eq!(smoothed[0][TOP_R_X], 50.0);
        assert_eq!(smoothed[0][0], 0.0);
    }

    #[test]
    fn smoothing_keeps_separate_lines() {
        let quads = [span(0.0, 100.0, 100.0, 110.0), span(0.0, 40.0, 80.0, 90.0)];
        assert_eq!(smooth_quads(&quads).len(), 2);
    }

    #[test]
    fn smoothing_skips_spans_out_of_line() {
        let quads = [
            span(0.0, 10.0, 100.0, 110.0),
            span(200.0, 210.0, 300.0, 310.0),
            span(10.0, 20.0, 100.0, 110.0),
        ];
        let smoothed = smooth_quads(&quads);
        assert_eq!(smoothed.len(), 1);
        assert_eq!(smoothed[0][TOP_R_X], 20.0);
    }

    #[test]
    fn smoothing_empty_input_is_empty() {
        assert!(smooth_quads(&[]).is_empty());
    }
}
