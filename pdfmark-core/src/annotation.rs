use std::fmt;

use serde::{Deserialize, Serialize};

use crate::color::Rgb;
use crate::geometry::{chunk_quads, Quad};
use crate::ObjRef;

/// Text markup subtypes (ISO 32000 §12.5.6.10).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum MarkupKind {
    Highlight,
    Underline,
    Squiggly,
    StrikeOut,
}

impl MarkupKind {
    pub const ALL: [MarkupKind; 4] = [
        MarkupKind::Highlight,
        MarkupKind::Underline,
        MarkupKind::Squiggly,
        MarkupKind::StrikeOut,
    ];

    pub fn pdf_name(self) -> &'static str {
        match self {
            MarkupKind::Highlight => "Highlight",
            MarkupKind::Underline => "Underline",
            MarkupKind::Squiggly => "Squiggly",
            MarkupKind::StrikeOut => "StrikeOut",
        }
    }

    pub fn from_pdf_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|kind| kind.pdf_name() == name)
    }
}

impl fmt::Display for MarkupKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.pdf_name())
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnnotationSubtype {
    Markup(MarkupKind),
    Other(String),
}

impl AnnotationSubtype {
    pub fn from_pdf_name(name: &str) -> Self {
        MarkupKind::from_pdf_name(name)
            .map(AnnotationSubtype::Markup)
            .unwrap_or_else(|| AnnotationSubtype::Other(name.to_owned()))
    }

    pub fn markup(&self) -> Option<MarkupKind> {
        match self {
            AnnotationSubtype::Markup(kind) => Some(*kind),
            AnnotationSubtype::Other(_) => None,
        }
    }
}

/// An annotation dictionary read back from the document, tagged with its
/// own reference so it can be removed by identity later.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotationRecord {
    pub reference: ObjRef,
    pub page_index: Option<usize>,
    pub subtype: AnnotationSubtype,
    pub quad_points: Vec<f64>,
    pub rect: Option<[f64; 4]>,
    pub color: Option<Rgb>,
    pub opacity: Option<f64>,
    pub contents: Option<String>,
    pub unique_name: Option<String>,
}

impl AnnotationRecord {
    pub fn quads(&self) -> Vec<Quad> {
        chunk_quads(&self.quad_points)
    }
}

/// Everything needed to create one markup annotation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HighlightRequest {
    pub page_index: usize,
    pub kind: MarkupKind,
    pub color: Rgb,
    pub opacity: f64,
    pub quad_points: Vec<f64>,
    /// Quad points are authoritative; a missing rect is written as a
    /// degenerate `[0 0 0 0]` box.
    pub rect: Option<[f64; 4]>,
    pub contents: Option<String>,
}
