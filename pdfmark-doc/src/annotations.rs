use lopdf::{Dictionary, Object, ObjectId};
use pdfmark_core::{
    ActionParams, ActionSubject, AnnotationRecord, AnnotationSubtype, HighlightRequest, ObjRef,
    Rgb,
};
use tracing::warn;
use uuid::Uuid;

use crate::edits::DocEdit;
use crate::error::{DocError, DocResult};
use crate::objects::{self, real, to_id, to_ref};
use crate::proxy::DocProxy;

/// Annotation flag: print.
const PRINT_FLAG: i64 = 4;

enum AnnotsSlot {
    Missing,
    Direct,
    Indirect(ObjectId),
}

impl DocProxy {
    fn annots_slot(&self, page: ObjectId) -> DocResult<AnnotsSlot> {
        let dict = self.doc.get_dictionary(page)?;
        Ok(match dict.get(b"Annots") {
            Ok(Object::Reference(id)) => AnnotsSlot::Indirect(*id),
            Ok(Object::Array(_)) => AnnotsSlot::Direct,
            _ => AnnotsSlot::Missing,
        })
    }

    fn annots_mut(&mut self, page: ObjectId) -> DocResult<Option<&mut Vec<Object>>> {
        Ok(match self.annots_slot(page)? {
            AnnotsSlot::Missing => None,
            AnnotsSlot::Direct => Some(
                self.doc
                    .get_object_mut(page)?
                    .as_dict_mut()?
                    .get_mut(b"Annots")?
                    .as_array_mut()?,
            ),
            AnnotsSlot::Indirect(id) => Some(self.doc.get_object_mut(id)?.as_array_mut()?),
        })
    }

    /// Appends `annotation` to the page's `/Annots`, creating the array if
    /// the page has none.
    pub(crate) fn attach_annotation(&mut self, page: ObjectId, annotation: ObjectId) -> DocResult<()> {
        if let AnnotsSlot::Missing = self.annots_slot(page)? {
            self.doc
                .get_object_mut(page)?
                .as_dict_mut()?
                .set("Annots", Vec::<Object>::new());
        }
        if let Some(annots) = self.annots_mut(page)? {
            annots.push(Object::Reference(annotation));
        }
        Ok(())
    }

    /// Drops every entry of `annotation` from the page's `/Annots`.
    pub(crate) fn detach_annotation(&mut self, page: ObjectId, annotation: ObjectId) -> DocResult<bool> {
        let Some(annots) = self.annots_mut(page)? else {
            return Ok(false);
        };
        let before = annots.len();
        annots.retain(|entry| entry.as_reference().ok() != Some(annotation));
        Ok(annots.len() != before)
    }

    fn page_annotation_ids(&self, page: ObjectId) -> Vec<ObjectId> {
        let Ok(dict) = self.doc.get_dictionary(page) else {
            return Vec::new();
        };
        let Some(annots) = objects::entry(&self.doc, dict, b"Annots").and_then(|a| a.as_array().ok())
        else {
            return Vec::new();
        };
        annots
            .iter()
            .filter_map(|entry| entry.as_reference().ok())
            .collect()
    }

    fn read_annotation(&self, id: ObjectId, dict: &Dictionary) -> AnnotationRecord {
        let doc = &self.doc;
        let color = dict
            .get(b"C")
            .ok()
            .and_then(|c| objects::numbers(doc, c))
            .filter(|c| c.len() == 3)
            .map(|c| Rgb::from_unit([c[0], c[1], c[2]]));
        let rect = dict
            .get(b"Rect")
            .ok()
            .and_then(|r| objects::numbers(doc, r))
            .filter(|r| r.len() == 4)
            .map(|r| [r[0], r[1], r[2], r[3]]);
        AnnotationRecord {
            reference: to_ref(id),
            page_index: dict
                .get(b"P")
                .ok()
                .and_then(|p| self.page_index_of_object(p)),
            subtype: AnnotationSubtype::from_pdf_name(
                objects::name_entry(doc, dict, b"Subtype").unwrap_or_default(),
            ),
            quad_points: dict
                .get(b"QuadPoints")
                .ok()
                .and_then(|q| objects::numbers(doc, q))
                .unwrap_or_default(),
            rect,
            color,
            opacity: objects::entry(doc, dict, b"CA").and_then(objects::number),
            contents: objects::text_entry(doc, dict, b"Contents"),
            unique_name: objects::text_entry(doc, dict, b"NM"),
        }
    }

    /// Every annotation referenced from the page, in `/Annots` order.
    pub fn list_highlights_for_page_idx(&self, index: usize) -> DocResult<Vec<AnnotationRecord>> {
        let page = self.page_id(index)?;
        Ok(self
            .page_annotation_ids(page)
            .into_iter()
            .filter_map(|id| match self.doc.get_dictionary(id) {
                Ok(dict) => Some(AnnotationRecord {
                    page_index: Some(index),
                    ..self.read_annotation(id, dict)
                }),
                Err(_) => {
                    warn!(annotation = ?id, page = index, "dangling annotation reference");
                    None
                }
            })
            .collect())
    }

    /// Every text markup annotation in the document, whether or not a page
    /// still lists it.
    pub fn list_highlights(&self) -> Vec<AnnotationRecord> {
        self.doc
            .objects
            .iter()
            .filter_map(|(id, obj)| {
                let dict = obj.as_dict().ok()?;
                let subtype = objects::name_entry(&self.doc, dict, b"Subtype")?;
                AnnotationSubtype::from_pdf_name(subtype)
                    .markup()
                    .map(|_| self.read_annotation(*id, dict))
            })
            .collect()
    }

    fn build_annotation(&self, request: &HighlightRequest, page: ObjectId) -> Dictionary {
        let [r, g, b] = request.color.to_unit();
        let rect = request.rect.unwrap_or_default();
        let mut dict = Dictionary::new();
        dict.set("Type", Object::Name(b"Annot".to_vec()));
        dict.set("Subtype", Object::Name(request.kind.pdf_name().as_bytes().to_vec()));
        dict.set("Rect", rect.iter().copied().map(real).collect::<Vec<_>>());
        dict.set(
            "QuadPoints",
            request.quad_points.iter().copied().map(real).collect::<Vec<_>>(),
        );
        dict.set("C", vec![real(r), real(g), real(b)]);
        dict.set("CA", real(request.opacity.clamp(0.0, 1.0)));
        dict.set("P", Object::Reference(page));
        dict.set("F", PRINT_FLAG);
        dict.set("NM", Object::string_literal(Uuid::new_v4().to_string()));
        if let Some(contents) = &request.contents {
            dict.set("Contents", objects::encode_text(contents));
        }
        dict
    }

    fn lists_annotation(&self, index: usize, id: ObjectId) -> Option<(usize, ObjectId)> {
        let page = self.page_id(index).ok()?;
        self.page_annotation_ids(page)
            .contains(&id)
            .then_some((index, page))
    }

    /// The page whose `/Annots` lists an annotation. `/P` is only a hint:
    /// when it is missing or names a page that does not list the
    /// annotation, every page is scanned.
    fn owning_page(&self, id: ObjectId, dict: &Dictionary) -> Option<(usize, ObjectId)> {
        let hint = dict.get(b"P").ok().and_then(|p| self.page_index_of_object(p));
        if let Some(owner) = hint.and_then(|index| self.lists_annotation(index, id)) {
            return Some(owner);
        }
        let owner = (0..self.page_count()).find_map(|index| self.lists_annotation(index, id));
        if let (Some(hint), Some((index, _))) = (hint, owner) {
            warn!(annotation = ?id, hint, page = index, "stale /P entry");
        }
        owner
    }

    /// Unlists and deletes every text markup annotation. Returns how many
    /// were removed.
    pub(crate) fn strip_markup_annotations(&mut self) -> DocResult<usize> {
        let mut removed = 0;
        for page in self.pages().into_iter().map(to_id) {
            let markup: Vec<ObjectId> = self
                .page_annotation_ids(page)
                .into_iter()
                .filter(|id| self.is_markup(*id))
                .collect();
            for id in markup {
                self.detach_annotation(page, id)?;
                self.doc.objects.remove(&id);
                removed += 1;
            }
        }
        Ok(removed)
    }

    fn is_markup(&self, id: ObjectId) -> bool {
        self.doc
            .get_dictionary(id)
            .ok()
            .and_then(|dict| objects::name_entry(&self.doc, dict, b"Subtype"))
            .is_some_and(|subtype| AnnotationSubtype::from_pdf_name(subtype).markup().is_some())
    }

    /// Builds an unapplied edit that registers a new markup annotation and
    /// lists it on its page.
    pub fn create_highlight(&self, request: HighlightRequest) -> DocResult<DocEdit> {
        let page = self.page_id(request.page_index)?;
        let annotation = self.build_annotation(&request, page);
        Ok(DocEdit::AddAnnotation {
            annotation,
            page,
            id: None,
            params: ActionParams {
                page_index: Some(request.page_index),
                subject: ActionSubject::NewAnnotation,
            },
        })
    }

    /// Builds an unapplied edit that unlists and deletes an annotation.
    pub fn remove_annotation(&self, reference: ObjRef) -> DocResult<DocEdit> {
        let id = to_id(reference);
        let dict = self
            .doc
            .get_dictionary(id)
            .map_err(|_| DocError::ObjectNotFound(reference))?;
        let is_annotation = objects::name_entry(&self.doc, dict, b"Type") == Some("Annot")
            || (dict.has(b"Subtype") && dict.has(b"Rect"));
        if !is_annotation {
            return Err(DocError::NotAnAnnotation(reference));
        }
        let (page_index, page) = self
            .owning_page(id, dict)
            .ok_or(DocError::ObjectNotFound(reference))?;
        Ok(DocEdit::RemoveAnnotation {
            annotation: dict.clone(),
            page,
            id,
            params: ActionParams {
                page_index: Some(page_index),
                subject: ActionSubject::Annotation(reference),
            },
        })
    }
}
