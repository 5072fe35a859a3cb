//! Turns an on-screen text selection into page-space annotation geometry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::CoreError;
use crate::geometry::{
    bounding_rect, flatten_quads, screen_rect_to_quad, smooth_quads, PageBox, ScreenRect,
};

/// One rendered text node, as reported by the viewer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextRun {
    /// 1-based, the way the viewer numbers pages.
    pub page_number: usize,
    pub text: String,
    pub rect: ScreenRect,
}

impl TextRun {
    /// The characters `start..end` of this run. Glyphs are assumed to be of
    /// equal width, so the sub-rect is a proportional slice.
    pub fn slice(&self, start: usize, end: usize) -> TextRun {
        let len = self.text.chars().count();
        let end = end.min(len);
        let start = start.min(end);
        if len == 0 {
            return self.clone();
        }
        let per_char = self.rect.width / len as f64;
        TextRun {
            page_number: self.page_number,
            text: self.text.chars().skip(start).take(end - start).collect(),
            rect: ScreenRect::new(
                self.rect.left + per_char * start as f64,
                self.rect.top,
                per_char * (end - start) as f64,
                self.rect.height,
            ),
        }
    }
}

/// The text nodes a selection touches, in document order. Offsets are
/// character offsets into the first and last run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionRange {
    pub runs: Vec<TextRun>,
    pub start_offset: usize,
    pub end_offset: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PageView {
    pub page_number: usize,
    pub rect: ScreenRect,
}

/// What the rendering side knows about page placement.
pub trait ViewerLayout {
    fn page_view(&self, page_number: usize) -> Option<PageView>;
    /// Zero-based indices of the pages currently on screen.
    fn visible_pages(&self) -> Vec<usize>;
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionDescriptor {
    pub page_index: usize,
    pub quad_points: Vec<f64>,
    pub bounding_rect: [f64; 4],
    pub text: String,
}

fn trim_runs(range: &SelectionRange) -> Vec<TextRun> {
    let last = range.runs.len().saturating_sub(1);
    range
        .runs
        .iter()
        .enumerate()
        .map(|(i, run)| {
            let start = if i == 0 { range.start_offset } else { 0 };
            let end = if i == last {
                range.end_offset
            } else {
                usize::MAX
            };
            run.slice(start, end)
        })
        .filter(|run| !run.text.is_empty())
        .collect()
}

/// Returns `Ok(None)` for an empty selection and
/// [`CoreError::CrossPageSelection`] when the selection starts and ends on
/// different pages.
pub fn extract_selection<L, F>(
    range: &SelectionRange,
    layout: &L,
    page_box_of: F,
    smooth: bool,
) -> Result<Option<SelectionDescriptor>, CoreError>
where
    L: ViewerLayout + ?Sized,
    F: Fn(usize) -> Option<PageBox>,
{
    let runs = trim_runs(range);
    let (Some(first), Some(last)) = (runs.first(), runs.last()) else {
        return Ok(None);
    };
    if first.page_number != last.page_number {
        return Err(CoreError::CrossPageSelection);
    }

    let page_number = first.page_number;
    let view = layout
        .page_view(page_number)
        .ok_or(CoreError::UnknownPage(page_number))?;
    let page_index = page_number
        .checked_sub(1)
        .ok_or(CoreError::UnknownPage(page_number))?;
    let page_box = page_box_of(page_index).ok_or(CoreError::UnknownPage(page_number))?;

    let mut quads: Vec<_> = runs
        .iter()
        .map(|run| screen_rect_to_quad(&run.rect, &view.rect, &page_box))
        .collect();
    if smooth {
        quads = smooth_quads(&quads);
    }
    debug!(page_index, quads = quads.len(), "selection extracted");

    Ok(Some(SelectionDescriptor {
        page_index,
        bounding_rect: bounding_rect(&quads).unwrap_or_default(),
        quad_points: flatten_quads(&quads),
        text: runs.iter().map(|run| run.text.as_str()).collect(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    struct TwoPages;

    impl ViewerLayout for TwoPages {
        fn page_view(&self, page_number: usize) -> Option<PageView> {
            let top = match page_number {
                1 => 0.0,
                2 => 1000.0,
                _ => return None,
            };
            Some(PageView {
                page_number,
                rect: ScreenRect::new(0.0, top, 100.0, 1000.0),
            })
        }

        fn visible_pages(&self) -> Vec<usize> {
            vec![0, 1]
        }
    }

    fn page_box(_: usize) -> Option<PageBox> {
        Some(PageBox::new(0.0, 0.0, 100.0, 1000.0))
    }

    fn run(page_number: usize, text: &str, left: f64, top: f64) -> TextRun {
        TextRun {
            page_number,
            text: text.into(),
            rect: ScreenRect::new(left, top, 10.0 * text.len() as f64, 10.0),
        }
    }

    #[test]
    fn slicing_keeps_proportional_width() {
        let sliced = run(1, "abcdef", 0.0, 0.0).slice(2, 5);
        assert_eq!(sliced.text, "cde");
        assert_eq!(sliced.rect.left, 20.0);
        assert_eq!(sliced.rect.width, 30.0);
    }

    #[test]
    fn single_line_selection_becomes_one_quad() {
        let range = SelectionRange {
            runs: vec![run(1, "hello ", 0.0, 100.0), run(1, "world", 60.0, 100.0)],
            start_offset: 1,
            end_offset: 3,
        };
        let selection = extract_selection(&range, &TwoPages, page_box, true)
            .unwrap()
            .unwrap();
        assert_eq!(selection.page_index, 0);
        assert_eq!(selection.text, "ello wor");
        assert_close(
            &selection.quad_points,
            &[10.0, 890.0, 90.0, 890.0, 10.0, 900.0, 90.0, 900.0],
        );
        assert_close(&selection.bounding_rect, &[10.0, 890.0, 90.0, 900.0]);
    }

    fn assert_close(got: &[f64], want: &[f64]) {
        assert_eq!(got.len(), want.len(), "{got:?}");
        for (g, w) in got.iter().zip(want) {
            assert!((g - w).abs() < 1e-6, "{got:?} != {want:?}");
        }
    }

    #[test]
    fn unsmoothed_selection_keeps_one_quad_per_run() {
        let range = SelectionRange {
            runs: vec![run(2, "one", 0.0, 1100.0), run(2, "two", 30.0, 1100.0)],
            start_offset: 0,
            end_offset: 3,
        };
        let selection = extract_selection(&range, &TwoPages, page_box, false)
            .unwrap()
            .unwrap();
        assert_eq!(selection.page_index, 1);
        assert_eq!(selection.quad_points.len(), 16);
    }

    #[test]
    fn cross_page_selection_is_rejected() {
        let range = SelectionRange {
            runs: vec![run(1, "end of one", 0.0, 990.0), run(2, "start", 0.0, 1000.0)],
            start_offset: 0,
            end_offset: 5,
        };
        let err = extract_selection(&range, &TwoPages, page_box, true).unwrap_err();
        assert!(matches!(err, CoreError::CrossPageSelection));
    }

    #[test]
    fn empty_selection_yields_nothing() {
        let empty = SelectionRange {
            runs: Vec::new(),
            start_offset: 0,
            end_offset: 0,
        };
        assert!(extract_selection(&empty, &TwoPages, page_box, true)
            .unwrap()
            .is_none());

        let collapsed = SelectionRange {
            runs: vec![run(1, "abc", 0.0, 0.0)],
            start_offset: 2,
            end_offset: 2,
        };
        assert!(extract_selection(&collapsed, &TwoPages, page_box, true)
            .unwrap()
            .is_none());
    }

    #[test]
    fn unknown_page_is_an_error() {
        let range = SelectionRange {
            runs: vec![run(7, "lost", 0.0, 0.0)],
            start_offset: 0,
            end_offset: 4,
        };
        assert!(matches!(
            extract_selection(&range, &TwoPages, page_box, true),
            Err(CoreError::UnknownPage(7))
        ));
    }
}
