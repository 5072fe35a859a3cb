mod annotations;
mod edits;
mod error;
#[cfg(test)]
mod fixtures;
mod objects;
mod outline_io;
mod proxy;

use async_trait::async_trait;
use pdfmark_core::{
    AnnotationRecord, DocumentLoader, HighlightRequest, MarkupDocument, ObjRef, PageBox,
};

pub use edits::DocEdit;
pub use error::{DocError, DocResult};
pub use proxy::{DocProxy, VIEW_INFO_KEY};

impl MarkupDocument for DocProxy {
    type Error = DocError;
    type Action = DocEdit;

    fn page_count(&self) -> usize {
        DocProxy::page_count(self)
    }

    fn page_box(&self, page_index: usize) -> Option<PageBox> {
        DocProxy::page_box(self, page_index)
    }

    fn annotations_for_page(&self, page_index: usize) -> DocResult<Vec<AnnotationRecord>> {
        self.list_highlights_for_page_idx(page_index)
    }

    fn create_highlight(&self, request: HighlightRequest) -> DocResult<DocEdit> {
        DocProxy::create_highlight(self, request)
    }

    fn remove_annotation(&self, reference: ObjRef) -> DocResult<DocEdit> {
        DocProxy::remove_annotation(self, reference)
    }

    fn add_outline_item(&self, title: &str, page_index: usize, depth_delta: i32) -> DocResult<DocEdit> {
        DocProxy::add_outline_item(self, title, page_index, depth_delta)
    }

    fn remove_outline_item(&self, title: &str, page_index: usize) -> DocResult<DocEdit> {
        DocProxy::remove_outline_item(self, title, page_index)
    }

    fn change_outline_item_depth(
        &self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> DocResult<DocEdit> {
        DocProxy::change_outline_item_depth(self, title, page_index, depth_delta)
    }
}

/// Loads documents with `lopdf` on tokio's blocking pool.
#[derive(Debug, Default, Clone, Copy)]
pub struct LopdfLoader;

#[async_trait]
impl DocumentLoader for LopdfLoader {
    type Document = DocProxy;
    type Error = DocError;

    async fn load(&self, bytes: Vec<u8>) -> DocResult<DocProxy> {
        DocProxy::load(bytes).await
    }
}
