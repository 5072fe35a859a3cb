use pdfmark_core::ObjRef;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocError {
    #[error("cannot load document")]
    Load(#[source] lopdf::Error),

    #[error("cannot load document: encrypted documents are not supported")]
    Encrypted,

    #[error("page index {index} out of range ({count} pages)")]
    PageOutOfRange { index: usize, count: usize },

    #[error("document has no catalog")]
    MissingCatalog,

    #[error("object {0} not found")]
    ObjectNotFound(ObjRef),

    #[error("object {0} is not an annotation")]
    NotAnAnnotation(ObjRef),

    #[error("annotation {annotation} is not listed on page {page}")]
    AnnotationNotListed { annotation: ObjRef, page: ObjRef },

    #[error("no outline item {title:?} on page {page_index}")]
    OutlineItemNotFound { title: String, page_index: usize },

    #[error("document load task failed")]
    Join(#[from] tokio::task::JoinError),

    #[error(transparent)]
    Pdf(#[from] lopdf::Error),

    #[error(transparent)]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Json(#[from] serde_json::Error),
}

pub type DocResult<T> = std::result::Result<T, DocError>;
