pub mod annotation;
pub mod color;
pub mod config;
pub mod controller;
pub mod error;
pub mod geometry;
pub mod history;
pub mod outline;
pub mod projector;
pub mod recovery;
pub mod save;
pub mod selection;
pub mod tool;

use std::fmt;

use serde::{Deserialize, Serialize};

pub use annotation::{AnnotationRecord, AnnotationSubtype, HighlightRequest, MarkupKind};
pub use color::Rgb;
pub use config::Config;
pub use controller::{ControllerEvent, HighlightController, Modifiers, SelectionStyle};
pub use error::{CoreError, CoreResult};
pub use geometry::{PageBox, Quad, Rotation, ScreenRect};
pub use history::{ActionParams, ActionSubject, EditHistory, Reversible};
pub use outline::{FlatOutlineItem, OutlineNode, OutlineSpec, OutlineTarget, RawValue};
pub use projector::{OverlayRect, OverlayStyle};
pub use selection::{PageView, SelectionDescriptor, SelectionRange, TextRun, ViewerLayout};
pub use tool::{Tool, ToolCategory, ToolKind};

/// Identity of an indirect object: object number plus generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ObjRef {
    pub number: u32,
    pub generation: u16,
}

impl ObjRef {
    pub const fn new(number: u32, generation: u16) -> Self {
        Self { number, generation }
    }

    pub fn as_pair(self) -> (u32, u16) {
        (self.number, self.generation)
    }
}

impl From<(u32, u16)> for ObjRef {
    fn from((number, generation): (u32, u16)) -> Self {
        Self { number, generation }
    }
}

impl fmt::Display for ObjRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} R", self.number, self.generation)
    }
}

/// A loaded document that can hold markup annotations and an outline.
///
/// Mutators never touch the document directly. They return an unapplied
/// [`Reversible`] action, and the caller hands it to an [`EditHistory`]
/// which applies it.
pub trait MarkupDocument: Sized {
    type Error: std::error::Error + Send + Sync + 'static;
    type Action: Reversible<Self, Error = Self::Error>;

    fn page_count(&self) -> usize;
    fn page_box(&self, page_index: usize) -> Option<PageBox>;
    fn annotations_for_page(&self, page_index: usize) -> Result<Vec<AnnotationRecord>, Self::Error>;
    fn create_highlight(&self, request: HighlightRequest) -> Result<Self::Action, Self::Error>;
    fn remove_annotation(&self, reference: ObjRef) -> Result<Self::Action, Self::Error>;
    fn add_outline_item(
        &self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> Result<Self::Action, Self::Error>;
    fn remove_outline_item(&self, title: &str, page_index: usize)
        -> Result<Self::Action, Self::Error>;
    fn change_outline_item_depth(
        &self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> Result<Self::Action, Self::Error>;
}

/// Parses raw document bytes off the caller's task.
#[async_trait::async_trait]
pub trait DocumentLoader: Send + Sync {
    type Document: Send;
    type Error: std::error::Error + Send + Sync + 'static;

    async fn load(&self, bytes: Vec<u8>) -> Result<Self::Document, Self::Error>;
}
