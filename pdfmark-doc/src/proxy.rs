use std::collections::BTreeMap;
use std::io::Write;

use lopdf::{Dictionary, Document, Object, ObjectId, StringFormat};
use pdfmark_core::{ObjRef, PageBox};
use serde_json::{Map, Value};
use tracing::{debug, info, instrument, warn};

use crate::error::{DocError, DocResult};
use crate::objects::{self, to_id, to_ref};

/// Info dictionary key holding the viewer's JSON state.
pub const VIEW_INFO_KEY: &str = "PdfmarkViewInfo";

/// Sole owner of a loaded document's object graph.
pub struct DocProxy {
    pub(crate) doc: Document,
    pages: Vec<ObjectId>,
}

impl std::fmt::Debug for DocProxy {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocProxy")
            .field("pages", &self.pages.len())
            .field("objects", &self.doc.objects.len())
            .finish()
    }
}

impl DocProxy {
    pub fn from_bytes(bytes: &[u8]) -> DocResult<Self> {
        let doc = Document::load_mem(bytes).map_err(DocError::Load)?;
        Self::from_document(doc)
    }

    /// Parses on the blocking pool. No proxy exists unless parsing
    /// succeeded.
    #[instrument(skip(bytes), fields(len = bytes.len()))]
    pub async fn load(bytes: Vec<u8>) -> DocResult<Self> {
        let proxy = tokio::task::spawn_blocking(move || Self::from_bytes(&bytes)).await??;
        info!(pages = proxy.page_count(), "document loaded");
        Ok(proxy)
    }

    pub fn from_document(doc: Document) -> DocResult<Self> {
        if doc.is_encrypted() {
            return Err(DocError::Encrypted);
        }
        let pages = doc.get_pages().into_values().collect();
        Ok(Self { doc, pages })
    }

    pub fn document(&self) -> &Document {
        &self.doc
    }

    pub fn pages(&self) -> Vec<ObjRef> {
        self.pages.iter().copied().map(to_ref).collect()
    }

    pub fn page_count(&self) -> usize {
        self.pages.len()
    }

    pub(crate) fn page_id(&self, index: usize) -> DocResult<ObjectId> {
        self.pages
            .get(index)
            .copied()
            .ok_or(DocError::PageOutOfRange {
                index,
                count: self.pages.len(),
            })
    }

    pub fn page_box(&self, index: usize) -> Option<PageBox> {
        let page_id = self.pages.get(index)?;
        objects::page_box(&self.doc, *page_id)
    }

    /// Linear scan of the page list.
    pub fn page_index_of(&self, reference: ObjRef) -> Option<usize> {
        let id = to_id(reference);
        self.pages.iter().position(|page| *page == id)
    }

    pub(crate) fn page_index_of_object(&self, obj: &Object) -> Option<usize> {
        obj.as_reference()
            .ok()
            .and_then(|id| self.page_index_of(to_ref(id)))
    }

    pub(crate) fn catalog_id(&self) -> DocResult<ObjectId> {
        self.doc
            .trailer
            .get(b"Root")
            .and_then(Object::as_reference)
            .map_err(|_| DocError::MissingCatalog)
    }

    pub(crate) fn catalog_mut(&mut self) -> DocResult<&mut Dictionary> {
        let id = self.catalog_id()?;
        self.doc
            .get_object_mut(id)
            .and_then(Object::as_dict_mut)
            .map_err(|_| DocError::MissingCatalog)
    }

    /// Lowers `max_id` to the highest live object number so that freed
    /// numbers at the top of the range are handed out again.
    pub fn recompute_max_id(&mut self) {
        let highest = self
            .doc
            .objects
            .keys()
            .map(|(number, _)| *number)
            .max()
            .unwrap_or(0);
        debug!(from = self.doc.max_id, to = highest, "max object id recomputed");
        self.doc.max_id = highest;
    }

    /// Puts `object` back under `id`, or under a fresh id when `id` has been
    /// taken in the meantime.
    pub(crate) fn register_at(&mut self, id: Option<ObjectId>, object: Object) -> ObjectId {
        match id {
            Some(id) if !self.doc.objects.contains_key(&id) => {
                self.doc.objects.insert(id, object);
                self.doc.max_id = self.doc.max_id.max(id.0);
                id
            }
            _ => self.doc.add_object(object),
        }
    }

    /// Classic cross-reference table, no object streams.
    #[instrument(skip(self))]
    pub fn get_doc_as_bytes(&mut self) -> DocResult<Vec<u8>> {
        let mut bytes = Vec::new();
        self.doc.save_to(&mut bytes)?;
        debug!(len = bytes.len(), "document serialized");
        Ok(bytes)
    }

    /// The document as a reader without this tool's markup would see it:
    /// a copy with every highlight and underline removed from its page.
    /// The loaded document is not changed.
    #[instrument(skip(self))]
    pub fn get_doc_as_bytes_no_annots(&self) -> DocResult<Vec<u8>> {
        let mut copy = Self {
            doc: self.doc.clone(),
            pages: self.pages.clone(),
        };
        let removed = copy.strip_markup_annotations()?;
        debug!(removed, "markup annotations left out of export");
        copy.get_doc_as_bytes()
    }

    /// Compresses content streams, then writes to `writer`. The output is
    /// still a classic cross-reference file; no object or xref streams are
    /// written.
    #[instrument(skip(self, writer))]
    pub fn stream_doc_as_bytes<W: Write>(&mut self, writer: &mut W) -> DocResult<()> {
        self.doc.compress();
        self.doc.save_to(writer)?;
        Ok(())
    }

    fn info_dict(&self) -> Option<&Dictionary> {
        let info = self.doc.trailer.get(b"Info").ok()?;
        objects::resolve(&self.doc, info)?.as_dict().ok()
    }

    fn info_dict_mut(&mut self) -> DocResult<&mut Dictionary> {
        let info_id = match self.doc.trailer.get(b"Info") {
            Ok(Object::Reference(id)) if self.doc.objects.contains_key(id) => *id,
            Ok(Object::Dictionary(_)) => {
                return self
                    .doc
                    .trailer
                    .get_mut(b"Info")
                    .and_then(Object::as_dict_mut)
                    .map_err(DocError::from);
            }
            _ => {
                let id = self.doc.add_object(Dictionary::new());
                self.doc.trailer.set("Info", Object::Reference(id));
                id
            }
        };
        Ok(self.doc.get_object_mut(info_id)?.as_dict_mut()?)
    }

    /// The info dictionary as text, skipping the viewer's own state entry.
    pub fn metadata(&self) -> BTreeMap<String, String> {
        let Some(info) = self.info_dict() else {
            return BTreeMap::new();
        };
        info.iter()
            .filter(|(key, _)| key.as_slice() != VIEW_INFO_KEY.as_bytes())
            .filter_map(|(key, value)| {
                let text = match objects::resolve(&self.doc, value)? {
                    Object::String(bytes, _) => objects::decode_text(bytes),
                    Object::Name(name) => String::from_utf8_lossy(name).into_owned(),
                    other => objects::number(other)?.to_string(),
                };
                Some((String::from_utf8_lossy(key).into_owned(), text))
            })
            .collect()
    }

    /// Stored viewer state, or an empty object when it is missing or
    /// unreadable.
    pub fn get_custom_view_info(&self) -> Map<String, Value> {
        let Some(raw) = self
            .info_dict()
            .and_then(|info| objects::entry(&self.doc, info, VIEW_INFO_KEY.as_bytes()))
        else {
            return Map::new();
        };
        let Object::String(bytes, _) = raw else {
            warn!("view info is not a string");
            return Map::new();
        };
        match serde_json::from_slice::<Value>(bytes) {
            Ok(Value::Object(map)) => map,
            Ok(_) => {
                warn!("view info is not a JSON object");
                Map::new()
            }
            Err(err) => {
                warn!(%err, "view info is not valid JSON");
                Map::new()
            }
        }
    }

    /// Sets one key of the stored viewer state.
    pub fn set_custom_view_info(&mut self, key: &str, value: Value) -> DocResult<()> {
        let mut state = self.get_custom_view_info();
        state.insert(key.to_owned(), value);
        let encoded = serde_json::to_vec(&Value::Object(state))?;
        self.info_dict_mut()?.set(
            VIEW_INFO_KEY,
            Object::String(encoded, StringFormat::Hexadecimal),
        );
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures::sample_pdf;
    use serde_json::json;

    #[test]
    fn garbage_bytes_fail_to_load() {
        let err = DocProxy::from_bytes(b"definitely not a pdf").unwrap_err();
        assert!(matches!(err, DocError::Load(_)));
        assert_eq!(err.to_string(), "cannot load document");
    }

    #[tokio::test]
    async fn async_load_exposes_ordered_pages() {
        let proxy = DocProxy::load(sample_pdf(5)).await.unwrap();
        assert_eq!(proxy.page_count(), 5);
        let pages = proxy.pages();
        for (index, page) in pages.iter().enumerate() {
            assert_eq!(proxy.page_index_of(*page), Some(index));
        }
        let page_box = proxy.page_box(0).unwrap();
        assert_eq!((page_box.width(), page_box.height()), (612.0, 792.0));
        assert!(proxy.page_box(5).is_none());
    }

    #[tokio::test]
    async fn async_load_failure_yields_no_proxy() {
        assert!(DocProxy::load(b"%PDF-1.7 truncated".to_vec()).await.is_err());
    }

    #[test]
    fn view_info_round_trips_through_save() {
        let mut proxy = DocProxy::from_bytes(&sample_pdf(2)).unwrap();
        assert!(proxy.get_custom_view_info().is_empty());

        proxy.set_custom_view_info("zoom", json!(1.25)).unwrap();
        proxy.set_custom_view_info("lastPage", json!(1)).unwrap();
        let bytes = proxy.get_doc_as_bytes().unwrap();

        let reopened = DocProxy::from_bytes(&bytes).unwrap();
        let state = reopened.get_custom_view_info();
        assert_eq!(state.get("zoom"), Some(&json!(1.25)));
        assert_eq!(state.get("lastPage"), Some(&json!(1)));
        assert!(!reopened.metadata().contains_key(VIEW_INFO_KEY));
    }

    #[test]
    fn unparsable_view_info_reads_as_empty() {
        let mut proxy = DocProxy::from_bytes(&sample_pdf(1)).unwrap();
        proxy
            .info_dict_mut()
            .unwrap()
            .set(VIEW_INFO_KEY, Object::string_literal("{not json"));
        assert!(proxy.get_custom_view_info().is_empty());
    }

    #[test]
    fn metadata_reads_info_strings() {
        let mut proxy = DocProxy::from_bytes(&sample_pdf(1)).unwrap();
        proxy
            .info_dict_mut()
            .unwrap()
            .set("Title", Object::string_literal("Field Notes"));
        assert_eq!(
            proxy.metadata().get("Title").map(String::as_str),
            Some("Field Notes")
        );
    }

    #[test]
    fn streaming_save_produces_a_loadable_document() {
        let mut proxy = DocProxy::from_bytes(&sample_pdf(3)).unwrap();
        let mut out = Vec::new();
        proxy.stream_doc_as_bytes(&mut out).unwrap();
        assert!(out.starts_with(b"%PDF-"));
        assert!(!out.windows(7).any(|window| window == b"/ObjStm"));
        assert_eq!(DocProxy::from_bytes(&out).unwrap().page_count(), 3);
    }

    #[test]
    fn freed_top_ids_are_reused_after_recompute() {
        let mut proxy = DocProxy::from_bytes(&sample_pdf(1)).unwrap();
        let id = proxy.doc.add_object(Dictionary::new());
        proxy.doc.objects.remove(&id);
        proxy.recompute_max_id();
        assert_eq!(proxy.doc.new_object_id(), id);
    }
}
