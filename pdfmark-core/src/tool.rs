use once_cell::sync::Lazy;
use serde::{Deserialize, Serialize};

use crate::annotation::MarkupKind;
use crate::color::Rgb;

const DEFAULT_TOOL_COLOR: Rgb = Rgb::new(0, 0, 255);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ToolKind {
    Highlight,
    Underline,
    Squiggly,
    StrikeOut,
    Link,
    FreeText,
    Popup,
    Line,
    Outline,
    Crop,
    Eraser,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToolCategory {
    /// Produces a text markup annotation from a selection.
    Markup,
    Drawing,
    Metadata,
    /// Edits document structure rather than annotating it.
    Editor,
}

impl ToolKind {
    pub fn category(self) -> ToolCategory {
        match self {
            ToolKind::Highlight | ToolKind::Underline | ToolKind::Squiggly | ToolKind::StrikeOut => {
                ToolCategory::Markup
            }
            ToolKind::Line | ToolKind::FreeText => ToolCategory::Drawing,
            ToolKind::Link | ToolKind::Popup => ToolCategory::Metadata,
            ToolKind::Outline | ToolKind::Crop | ToolKind::Eraser => ToolCategory::Editor,
        }
    }

    pub fn markup(self) -> Option<MarkupKind> {
        match self {
            ToolKind::Highlight => Some(MarkupKind::Highlight),
            ToolKind::Underline => Some(MarkupKind::Underline),
            ToolKind::Squiggly => Some(MarkupKind::Squiggly),
            ToolKind::StrikeOut => Some(MarkupKind::StrikeOut),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Tool {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub kind: ToolKind,
    #[serde(default = "default_color")]
    pub color: Rgb,
    #[serde(default = "default_opacity")]
    pub opacity: f64,
    /// Pixels; underline tools fall back to 2.
    #[serde(default)]
    pub underline_thickness: Option<u32>,
}

fn default_color() -> Rgb {
    DEFAULT_TOOL_COLOR
}

fn default_opacity() -> f64 {
    1.0
}

impl Tool {
    pub fn new(name: &str, kind: ToolKind, color: Rgb, opacity: f64) -> Self {
        Self {
            name: Some(name.to_owned()),
            kind,
            color,
            opacity,
            underline_thickness: None,
        }
    }

    pub fn category(&self) -> ToolCategory {
        self.kind.category()
    }

    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{:?}", self.kind))
    }
}

pub static DEFAULT_TOOLS: Lazy<Vec<Tool>> = Lazy::new(|| {
    vec![
        Tool::new("Yellow", ToolKind::Highlight, Rgb::new(255, 255, 0), 0.5),
        Tool::new("Green", ToolKind::Highlight, Rgb::new(0, 255, 0), 0.5),
        Tool::new("Red underline", ToolKind::Underline, Rgb::new(255, 0, 0), 1.0),
        Tool::new("Outline", ToolKind::Outline, DEFAULT_TOOL_COLOR, 1.0),
    ]
});

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_tool_kind() {
        assert_eq!(ToolKind::Underline.category(), ToolCategory::Markup);
        assert_eq!(ToolKind::Outline.category(), ToolCategory::Editor);
        assert_eq!(ToolKind::Popup.category(), ToolCategory::Metadata);
        assert_eq!(ToolKind::Line.category(), ToolCategory::Drawing);
        assert_eq!(ToolKind::Crop.markup(), None);
    }

    #[test]
    fn default_tool_list_starts_with_a_highlighter() {
        assert_eq!(DEFAULT_TOOLS[0].kind, ToolKind::Highlight);
        assert!(DEFAULT_TOOLS
            .iter()
            .any(|tool| tool.kind == ToolKind::Outline));
    }

    #[test]
    fn missing_color_falls_back_to_blue() {
        let tool: Tool = toml::from_str("type = \"Squiggly\"").unwrap();
        assert_eq!(tool.color, Rgb::new(0, 0, 255));
        assert_eq!(tool.opacity, 1.0);
        assert_eq!(tool.label(), "Squiggly");
    }
}
