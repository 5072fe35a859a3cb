//! Maps stored markup annotations back onto the rendered page as overlay
//! rectangles.

use serde::{Deserialize, Serialize};

use crate::annotation::{AnnotationRecord, MarkupKind};
use crate::color::Rgb;
use crate::geometry::{quad_to_overlay, Insets, PageBox};

const UNDERLINE_THICKNESS_PX: u32 = 2;
const FALLBACK_COLOR: Rgb = Rgb::new(0, 0, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OverlayStyle {
    Fill,
    UnderlineBorder { thickness_px: u32 },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OverlayRect {
    /// `"{object number}R"`, shared by every rect of one annotation.
    pub element_id: String,
    pub insets: Insets,
    pub style: OverlayStyle,
    pub color: String,
    pub opacity: Option<f64>,
}

pub fn project_annotation(record: &AnnotationRecord, page_box: &PageBox) -> Vec<OverlayRect> {
    let style = match record.subtype.markup() {
        Some(MarkupKind::Highlight) => OverlayStyle::Fill,
        Some(MarkupKind::Underline) => OverlayStyle::UnderlineBorder {
            thickness_px: UNDERLINE_THICKNESS_PX,
        },
        _ => return Vec::new(),
    };
    let color = record.color.unwrap_or(FALLBACK_COLOR).to_hex(None);
    let element_id = format!("{}R", record.reference.number);

    record
        .quads()
        .iter()
        .map(|quad| OverlayRect {
            element_id: element_id.clone(),
            insets: quad_to_overlay(quad, page_box),
            style,
            color: color.clone(),
            opacity: record.opacity,
        })
        .collect()
}

pub fn project_page(records: &[AnnotationRecord], page_box: &PageBox) -> Vec<OverlayRect> {
    records
        .iter()
        .flat_map(|record| project_annotation(record, page_box))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotation::AnnotationSubtype;
    use crate::ObjRef;

    fn record(subtype: AnnotationSubtype) -> AnnotationRecord {
        AnnotationRecord {
            reference: ObjRef::new(12, 0),
            page_index: Some(0),
            subtype,
            quad_points: vec![
                10.0, 80.0, 50.0, 80.0, 10.0, 90.0, 50.0, 90.0, //
                10.0, 60.0, 30.0, 60.0, 10.0, 70.0, 30.0, 70.0,
            ],
            rect: None,
            color: Some(Rgb::new(255, 255, 0)),
            opacity: Some(0.4),
            contents: None,
            unique_name: None,
        }
    }

    #[test]
    fn highlight_projects_one_fill_per_quad() {
        let page_box = PageBox::new(0.0, 0.0, 100.0, 100.0);
        let rects = project_annotation(
            &record(AnnotationSubtype::Markup(MarkupKind::Highlight)),
            &page_box,
        );
        assert_eq!(rects.len(), 2);
        assert_eq!(rects[0].style, OverlayStyle::Fill);
        assert_eq!(rects[0].element_id, "12R");
        assert_eq!(rects[0].color, "#ffff00");
        let insets = rects[0].insets;
        assert!((insets.top - 10.0).abs() < 1e-9);
        assert!((insets.left - 10.0).abs() < 1e-9);
        assert!((insets.bottom - 80.0).abs() < 1e-9);
        assert!((insets.right - 50.0).abs() < 1e-9);
    }

    #[test]
    fn underline_uses_bottom_border() {
        let page_box = PageBox::new(0.0, 0.0, 100.0, 100.0);
        let rects = project_annotation(
            &record(AnnotationSubtype::Markup(MarkupKind::Underline)),
            &page_box,
        );
        assert!(rects
            .iter()
            .all(|r| r.style == OverlayStyle::UnderlineBorder { thickness_px: 2 }));
    }

    #[test]
    fn other_subtypes_render_nothing() {
        let page_box = PageBox::new(0.0, 0.0, 100.0, 100.0);
        for subtype in [
            AnnotationSubtype::Markup(MarkupKind::Squiggly),
            AnnotationSubtype::Markup(MarkupKind::StrikeOut),
            AnnotationSubtype::Other("Link".into()),
        ] {
            assert!(project_annotation(&record(subtype), &page_box).is_empty());
        }
    }
}
