use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use crate::annotation::HighlightRequest;
use crate::config::Config;
use crate::error::CoreError;
use crate::history::{ActionParams, EditHistory};
use crate::projector::{project_page, OverlayRect};
use crate::selection::{extract_selection, SelectionDescriptor, SelectionRange, ViewerLayout};
use crate::tool::{Tool, ToolCategory, ToolKind, DEFAULT_TOOLS};
use crate::{MarkupDocument, ObjRef, Rgb};

const DEFAULT_UNDERLINE_PX: u32 = 2;
const YELLOW: Rgb = Rgb::new(255, 255, 0);
/// Non-highlight markup previews use a half-transparent tint.
const PREVIEW_OPACITY: f64 = 0.5;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub shift: bool,
    pub ctrl: bool,
    pub alt: bool,
}

impl Modifiers {
    /// Shift nests deeper, ctrl nests shallower.
    pub fn depth_delta(self) -> i32 {
        if self.shift {
            1
        } else if self.ctrl {
            -1
        } else {
            0
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ControllerEvent {
    ClearSelection,
    AutoSaveRequested,
    OutlineAddRequested {
        title: String,
        page_index: usize,
        depth_delta: i32,
    },
    OutlineChanged,
    ToolChanged(Tool),
    PageDrawn { page_index: usize, overlays: usize },
    PageCleared(usize),
}

/// Live-selection preview styling, exposed as two CSS custom properties.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SelectionStyle {
    pub highlight_color: String,
    pub text_decoration: String,
}

impl SelectionStyle {
    pub fn for_tool(tool: &Tool) -> Self {
        let highlight_color = match tool.kind {
            ToolKind::Highlight => tool.color.to_hex(Some(tool.opacity)),
            _ if tool.category() == ToolCategory::Editor => "default".to_owned(),
            _ => tool.color.to_hex(Some(PREVIEW_OPACITY)),
        };
        let text_decoration = match tool.kind {
            ToolKind::Underline => format!(
                "underline {}px {}",
                tool.underline_thickness.unwrap_or(DEFAULT_UNDERLINE_PX),
                tool.color
            ),
            _ => "none".to_owned(),
        };
        Self {
            highlight_color,
            text_decoration,
        }
    }

    pub fn to_css(&self) -> String {
        format!(
            ":root {{ --highlight-color: {}; --highlight-text-decoration: {}; }}",
            self.highlight_color, self.text_decoration
        )
    }
}

/// Owns one open document and routes viewer events into edits on it.
pub struct HighlightController<D: MarkupDocument> {
    document: D,
    history: EditHistory<D::Action>,
    current_tool: Tool,
    style: SelectionStyle,
    visible_pages: Vec<usize>,
    overlays: HashMap<usize, Vec<OverlayRect>>,
    clear_selection: bool,
    smooth_selection: bool,
    events: Arc<Mutex<Vec<ControllerEvent>>>,
}

impl<D: MarkupDocument> HighlightController<D> {
    pub fn new(document: D, config: &Config) -> Self {
        let current_tool = config
            .tools
            .first()
            .or_else(|| DEFAULT_TOOLS.first())
            .cloned()
            .unwrap_or_else(|| Tool::new("Highlight", ToolKind::Highlight, YELLOW, 0.5));
        Self {
            document,
            history: EditHistory::new(),
            style: SelectionStyle::for_tool(&current_tool),
            current_tool,
            visible_pages: Vec::new(),
            overlays: HashMap::new(),
            clear_selection: config.clear_selection,
            smooth_selection: config.smooth_selection,
            events: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn events(&self) -> Arc<Mutex<Vec<ControllerEvent>>> {
        Arc::clone(&self.events)
    }

    /// Takes every queued event, oldest first, leaving the queue empty.
    pub fn drain_events(&self) -> Vec<ControllerEvent> {
        std::mem::take(&mut *self.events.lock())
    }

    pub fn document(&self) -> &D {
        &self.document
    }

    /// Direct access bypasses the history; callers must not mutate anything
    /// a recorded action depends on.
    pub fn document_mut(&mut self) -> &mut D {
        &mut self.document
    }

    pub fn into_document(self) -> D {
        self.document
    }

    pub fn history(&self) -> &EditHistory<D::Action> {
        &self.history
    }

    pub fn current_tool(&self) -> &Tool {
        &self.current_tool
    }

    pub fn selection_style(&self) -> &SelectionStyle {
        &self.style
    }

    pub fn visible_pages(&self) -> &[usize] {
        &self.visible_pages
    }

    pub fn overlays(&self, page_index: usize) -> &[OverlayRect] {
        self.overlays
            .get(&page_index)
            .map(Vec::as_slice)
            .unwrap_or_default()
    }

    fn emit(&self, event: ControllerEvent) {
        self.events.lock().push(event);
    }

    pub fn set_current_tool(&mut self, tool: Tool) {
        self.style = SelectionStyle::for_tool(&tool);
        info!(tool = %tool.label(), "tool changed");
        self.current_tool = tool.clone();
        self.emit(ControllerEvent::ToolChanged(tool));
    }

    fn extract<L: ViewerLayout + ?Sized>(
        &self,
        range: &SelectionRange,
        layout: &L,
    ) -> Option<SelectionDescriptor> {
        let document = &self.document;
        match extract_selection(
            range,
            layout,
            |page| document.page_box(page),
            self.smooth_selection,
        ) {
            Ok(selection) => selection,
            Err(CoreError::CrossPageSelection) => {
                warn!("selection spans multiple pages, nothing created");
                None
            }
            Err(err) => {
                warn!(%err, "selection ignored");
                None
            }
        }
    }

    /// A finished selection. Markup tools annotate it; the outline tool
    /// asks for a new outline item titled with the selected text.
    #[instrument(skip(self, range, layout))]
    pub fn handle_selection_made<L: ViewerLayout + ?Sized>(
        &mut self,
        range: &SelectionRange,
        layout: &L,
        modifiers: Modifiers,
    ) -> Result<Option<ActionParams>, D::Error> {
        match self.current_tool.category() {
            ToolCategory::Markup => {
                let Some(kind) = self.current_tool.kind.markup() else {
                    return Ok(None);
                };
                let Some(selection) = self.extract(range, layout) else {
                    return Ok(None);
                };
                let request = HighlightRequest {
                    page_index: selection.page_index,
                    kind,
                    color: self.current_tool.color,
                    opacity: self.current_tool.opacity,
                    quad_points: selection.quad_points,
                    rect: Some(selection.bounding_rect),
                    contents: Some(selection.text),
                };
                let params = self.annotate(request)?;
                if self.clear_selection {
                    self.emit(ControllerEvent::ClearSelection);
                }
                Ok(Some(params))
            }
            ToolCategory::Editor if self.current_tool.kind == ToolKind::Outline => {
                if let Some(selection) = self.extract(range, layout) {
                    self.emit(ControllerEvent::OutlineAddRequested {
                        title: selection.text,
                        page_index: selection.page_index,
                        depth_delta: modifiers.depth_delta(),
                    });
                }
                Ok(None)
            }
            _ => Ok(None),
        }
    }

    pub fn handle_page_rendered<L: ViewerLayout + ?Sized>(
        &mut self,
        page_number: usize,
        layout: &L,
    ) -> Result<(), D::Error> {
        debug!(page_number, "page rendered");
        self.update_pages(layout)?;
        match page_number.checked_sub(1) {
            Some(page_index) => self.draw_page(page_index),
            None => Ok(()),
        }
    }

    pub fn handle_page_changing<L: ViewerLayout + ?Sized>(
        &mut self,
        layout: &L,
    ) -> Result<(), D::Error> {
        self.update_pages(layout)
    }

    fn update_pages<L: ViewerLayout + ?Sized>(&mut self, layout: &L) -> Result<(), D::Error> {
        let visible = layout.visible_pages();
        let to_clear: Vec<usize> = self
            .visible_pages
            .iter()
            .copied()
            .filter(|page| !visible.contains(page))
            .collect();
        let to_draw: Vec<usize> = visible
            .iter()
            .copied()
            .filter(|page| !self.visible_pages.contains(page))
            .collect();
        self.visible_pages = visible;

        for page in to_clear {
            self.clear_page(page);
        }
        for page in to_draw {
            self.draw_page(page)?;
        }
        Ok(())
    }

    fn clear_page(&mut self, page_index: usize) {
        self.overlays.remove(&page_index);
        self.emit(ControllerEvent::PageCleared(page_index));
    }

    /// Rebuilds the overlay of one page from the document's annotations.
    pub fn draw_page(&mut self, page_index: usize) -> Result<(), D::Error> {
        let Some(page_box) = self.document.page_box(page_index) else {
            self.overlays.remove(&page_index);
            return Ok(());
        };
        let records = self.document.annotations_for_page(page_index)?;
        let overlays = project_page(&records, &page_box);
        debug!(page_index, annotations = records.len(), "page overlay rebuilt");
        self.emit(ControllerEvent::PageDrawn {
            page_index,
            overlays: overlays.len(),
        });
        self.overlays.insert(page_index, overlays);
        Ok(())
    }

    /// Runs after every change to the document, whether done, undone or
    /// redone.
    fn after_edit(&mut self, params: &ActionParams) -> Result<(), D::Error> {
        match params.page_index {
            Some(page_index) => self.draw_page(page_index)?,
            None => self.emit(ControllerEvent::OutlineChanged),
        }
        self.emit(ControllerEvent::AutoSaveRequested);
        Ok(())
    }

    fn dispatch(&mut self, action: D::Action) -> Result<ActionParams, D::Error> {
        let params = self.history.do_action(action, &mut self.document)?;
        self.after_edit(&params)?;
        Ok(params)
    }

    pub fn annotate(&mut self, request: HighlightRequest) -> Result<ActionParams, D::Error> {
        let action = self.document.create_highlight(request)?;
        self.dispatch(action)
    }

    pub fn remove_annotation(&mut self, reference: ObjRef) -> Result<ActionParams, D::Error> {
        let action = self.document.remove_annotation(reference)?;
        self.dispatch(action)
    }

    pub fn add_outline_item(
        &mut self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> Result<ActionParams, D::Error> {
        let action = self
            .document
            .add_outline_item(title, page_index, depth_delta)?;
        self.dispatch(action)
    }

    pub fn remove_outline_item(
        &mut self,
        title: &str,
        page_index: usize,
    ) -> Result<ActionParams, D::Error> {
        let action = self.document.remove_outline_item(title, page_index)?;
        self.dispatch(action)
    }

    pub fn change_outline_item_depth(
        &mut self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> Result<ActionParams, D::Error> {
        let action = self
            .document
            .change_outline_item_depth(title, page_index, depth_delta)?;
        self.dispatch(action)
    }

    pub fn undo(&mut self) -> Result<Option<ActionParams>, D::Error> {
        let Some(params) = self.history.undo(&mut self.document)? else {
            debug!("nothing to undo");
            return Ok(None);
        };
        self.after_edit(&params)?;
        Ok(Some(params))
    }

    pub fn redo(&mut self) -> Result<Option<ActionParams>, D::Error> {
        let Some(params) = self.history.redo(&mut self.document)? else {
            debug!("nothing to redo");
            return Ok(None);
        };
        self.after_edit(&params)?;
        Ok(Some(params))
    }
}
