use lopdf::{Dictionary, Object, ObjectId};
use pdfmark_core::{ActionParams, ActionSubject, ObjRef, OutlineSpec, Reversible};
use tracing::debug;

use crate::error::{DocError, DocResult};
use crate::objects::to_ref;
use crate::proxy::DocProxy;

/// A recorded, reversible change to a [`DocProxy`].
///
/// Annotation edits remember the object number they were registered
/// under, so undoing and redoing them keeps the same references.
#[derive(Debug, Clone)]
pub enum DocEdit {
    AddAnnotation {
        annotation: Dictionary,
        page: ObjectId,
        id: Option<ObjectId>,
        params: ActionParams,
    },
    RemoveAnnotation {
        annotation: Dictionary,
        page: ObjectId,
        id: ObjectId,
        params: ActionParams,
    },
    /// Full outline replacement; the top-level items before and after.
    ReplaceOutline {
        before: Vec<OutlineSpec>,
        after: Vec<OutlineSpec>,
        params: ActionParams,
    },
}

impl DocEdit {
    /// The annotation this edit adds or removes, once it has an identity.
    pub fn annotation_ref(&self) -> Option<ObjRef> {
        match self {
            DocEdit::AddAnnotation { id, .. } => id.map(to_ref),
            DocEdit::RemoveAnnotation { id, .. } => Some(to_ref(*id)),
            DocEdit::ReplaceOutline { .. } => None,
        }
    }
}

fn restore(
    proxy: &mut DocProxy,
    annotation: &Dictionary,
    page: ObjectId,
    id: Option<ObjectId>,
) -> DocResult<ObjectId> {
    let id = proxy.register_at(id, Object::Dictionary(annotation.clone()));
    proxy.attach_annotation(page, id)?;
    debug!(annotation = ?id, page = ?page, "annotation attached");
    Ok(id)
}

/// Deletes the annotation only once its page entry is gone, so no page is
/// left pointing at a missing object.
fn discard(proxy: &mut DocProxy, page: ObjectId, id: ObjectId) -> DocResult<()> {
    if !proxy.detach_annotation(page, id)? {
        return Err(DocError::AnnotationNotListed {
            annotation: to_ref(id),
            page: to_ref(page),
        });
    }
    proxy.doc.objects.remove(&id);
    debug!(annotation = ?id, page = ?page, "annotation detached");
    Ok(())
}

impl Reversible<DocProxy> for DocEdit {
    type Error = DocError;

    fn redo(&mut self, proxy: &mut DocProxy) -> DocResult<()> {
        match self {
            DocEdit::AddAnnotation {
                annotation,
                page,
                id,
                params,
            } => {
                let registered = restore(proxy, annotation, *page, *id)?;
                *id = Some(registered);
                params.subject = ActionSubject::Annotation(to_ref(registered));
            }
            DocEdit::RemoveAnnotation { page, id, .. } => discard(proxy, *page, *id)?,
            DocEdit::ReplaceOutline { after, .. } => proxy.replace_outline(after)?,
        }
        Ok(())
    }

    fn undo(&mut self, proxy: &mut DocProxy) -> DocResult<()> {
        match self {
            DocEdit::AddAnnotation { page, id, .. } => {
                if let Some(id) = *id {
                    discard(proxy, *page, id)?;
                }
            }
            DocEdit::RemoveAnnotation {
                annotation,
                page,
                id,
                params,
            } => {
                *id = restore(proxy, annotation, *page, Some(*id))?;
                params.subject = ActionSubject::Annotation(to_ref(*id));
            }
            DocEdit::ReplaceOutline { before, .. } => proxy.replace_outline(before)?,
        }
        Ok(())
    }

    fn params(&self) -> &ActionParams {
        match self {
            DocEdit::AddAnnotation { params, .. }
            | DocEdit::RemoveAnnotation { params, .. }
            | DocEdit::ReplaceOutline { params, .. } => params,
        }
    }
}
