//! Outline (bookmark) trees in the object graph.
//!
//! Writes are always whole-tree: the existing outline is deleted and a new
//! one is created from an [`OutlineSpec`] list. Reads tolerate broken
//! links; a dangling or cyclic pointer ends the sibling chain it is on.

use std::collections::HashSet;

use lopdf::{Dictionary, Object, ObjectId};
use pdfmark_core::outline::{self, FlatOutlineItem};
use pdfmark_core::{ActionParams, ActionSubject, ObjRef, OutlineNode, OutlineSpec, OutlineTarget};
use tracing::{debug, info, instrument, warn};

use crate::edits::DocEdit;
use crate::error::{DocError, DocResult};
use crate::objects::{self, real, to_id, to_ref};
use crate::proxy::DocProxy;

/// Default destination mode: left, top, zoom.
const XYZ: &str = "XYZ";
const MAX_NAME_TREE_DEPTH: usize = 32;

struct ArenaNode<'a> {
    id: ObjectId,
    spec: Option<&'a OutlineSpec>,
    parent: Option<usize>,
    children: Vec<usize>,
    count: i64,
}

fn is_outline_root(doc: &lopdf::Document, dict: &Dictionary) -> bool {
    objects::name_entry(doc, dict, b"Type") == Some("Outlines")
        || (dict.has(b"First")
            && dict.has(b"Last")
            && !dict.has(b"Parent")
            && !dict.has(b"Title"))
}

fn next_ref(dict: &Dictionary, key: &[u8]) -> Option<ObjectId> {
    dict.get(key).and_then(Object::as_reference).ok()
}

impl DocProxy {
    /// Every outline root in the document, including roots the catalog no
    /// longer points at.
    pub fn list_outlines(&self) -> Vec<OutlineNode> {
        let mut visited = HashSet::new();
        let mut roots = Vec::new();
        for (id, obj) in &self.doc.objects {
            let Ok(dict) = obj.as_dict() else {
                continue;
            };
            if is_outline_root(&self.doc, dict) && visited.insert(*id) {
                roots.push(self.read_outline_node(*id, dict, &mut visited));
            }
        }
        roots
    }

    /// The top-level items of every outline root, as a tree that
    /// [`DocProxy::create_outline`] accepts back.
    pub fn list_serializable_outlines(&self) -> Vec<OutlineSpec> {
        self.list_outlines()
            .iter()
            .flat_map(|root| root.children.iter().map(OutlineNode::to_spec))
            .collect()
    }

    fn read_outline_node(
        &self,
        id: ObjectId,
        dict: &Dictionary,
        visited: &mut HashSet<ObjectId>,
    ) -> OutlineNode {
        let mut children = Vec::new();
        let mut current = next_ref(dict, b"First");
        while let Some(child_id) = current {
            if !visited.insert(child_id) {
                warn!(item = ?child_id, "outline cycle");
                break;
            }
            let Ok(child) = self.doc.get_dictionary(child_id) else {
                warn!(item = ?child_id, "dangling outline item");
                break;
            };
            children.push(self.read_outline_node(child_id, child, visited));
            current = next_ref(child, b"Next");
        }

        let destination = self.read_destination(dict);
        OutlineNode {
            reference: Some(to_ref(id)),
            title: objects::text_entry(&self.doc, dict, b"Title"),
            page_index: destination.as_ref().and_then(OutlineTarget::page_index),
            destination,
            count: objects::entry(&self.doc, dict, b"Count")
                .and_then(|count| count.as_i64().ok())
                .unwrap_or(0),
            children,
        }
    }

    /// `/Dest`, or the `/D` of a go-to action. Explicit destinations on
    /// known pages are modelled; anything else, named destinations and
    /// other actions included, is preserved as stored.
    fn read_destination(&self, dict: &Dictionary) -> Option<OutlineTarget> {
        if let Ok(dest) = dict.get(b"Dest") {
            let resolved = objects::resolve(&self.doc, dest);
            if let Some(target) = resolved
                .and_then(|obj| obj.as_array().ok())
                .and_then(|array| self.explicit_destination(array))
            {
                return Some(target);
            }
            return Some(OutlineTarget::Preserved {
                page: resolved.and_then(|obj| self.destination_page(obj)),
                dest: Some(objects::to_raw(dest)),
                action: None,
            });
        }

        let raw_action = dict.get(b"A").ok()?;
        let action = objects::resolve(&self.doc, raw_action).and_then(|obj| obj.as_dict().ok());
        let goto = action
            .filter(|action| objects::name_entry(&self.doc, action, b"S") == Some("GoTo"))
            .and_then(|action| objects::entry(&self.doc, action, b"D"));
        if let Some(target) = goto
            .and_then(|dest| dest.as_array().ok())
            .and_then(|array| self.explicit_destination(array))
        {
            return Some(target);
        }
        Some(OutlineTarget::Preserved {
            page: goto.and_then(|dest| self.destination_page(dest)),
            dest: None,
            action: Some(objects::to_raw(raw_action)),
        })
    }

    fn explicit_destination(&self, array: &[Object]) -> Option<OutlineTarget> {
        let (page_ref, rest) = array.split_first()?;
        let page = self.page_index_of_object(page_ref)?;
        let kind = rest
            .first()
            .and_then(objects::name)
            .unwrap_or(XYZ)
            .to_owned();
        let args: Vec<Option<f64>> = rest
            .iter()
            .skip(1)
            .map(|arg| objects::resolve(&self.doc, arg).and_then(objects::number))
            .collect();

        let top = self.page_box(page).map(|page_box| page_box.y1);
        if kind == XYZ && args.as_slice() == [Some(0.0), top, None] {
            return Some(OutlineTarget::Page(page));
        }
        Some(OutlineTarget::View { page, kind, args })
    }

    /// The page an explicit or named destination leads to.
    fn destination_page(&self, dest: &Object) -> Option<usize> {
        let explicit = match dest {
            Object::Array(_) => dest,
            named => self.named_destination(named)?,
        };
        let array = explicit.as_array().ok()?;
        self.page_index_of_object(array.first()?)
    }

    /// Looks a name up in the catalog's `/Dests` dictionary, or a string in
    /// the `/Names` `/Dests` tree first.
    fn named_destination(&self, name: &Object) -> Option<&Object> {
        let catalog = self.doc.get_dictionary(self.catalog_id().ok()?).ok()?;
        let found = match name {
            Object::Name(key) => self.dests_entry(catalog, key),
            Object::String(key, _) => self
                .name_tree_entry(catalog, key)
                .or_else(|| self.dests_entry(catalog, key)),
            _ => None,
        }?;
        match found {
            Object::Dictionary(entry) => objects::entry(&self.doc, entry, b"D"),
            explicit => Some(explicit),
        }
    }

    fn dests_entry<'a>(&'a self, catalog: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let dests = objects::entry(&self.doc, catalog, b"Dests")?.as_dict().ok()?;
        objects::entry(&self.doc, dests, key)
    }

    fn name_tree_entry<'a>(&'a self, catalog: &'a Dictionary, key: &[u8]) -> Option<&'a Object> {
        let names = objects::entry(&self.doc, catalog, b"Names")?.as_dict().ok()?;
        let tree = objects::entry(&self.doc, names, b"Dests")?.as_dict().ok()?;
        self.lookup_name_tree(tree, key, 0)
    }

    fn lookup_name_tree<'a>(
        &'a self,
        node: &'a Dictionary,
        key: &[u8],
        depth: usize,
    ) -> Option<&'a Object> {
        if depth > MAX_NAME_TREE_DEPTH {
            warn!("name tree too deep");
            return None;
        }
        let doc = &self.doc;
        if let Some(names) = objects::entry(doc, node, b"Names").and_then(|n| n.as_array().ok()) {
            for pair in names.chunks_exact(2) {
                if let Some(Object::String(candidate, _)) = objects::resolve(doc, &pair[0]) {
                    if candidate.as_slice() == key {
                        return objects::resolve(doc, &pair[1]);
                    }
                }
            }
        }
        objects::entry(doc, node, b"Kids")?
            .as_array()
            .ok()?
            .iter()
            .filter_map(|kid| objects::resolve(doc, kid)?.as_dict().ok())
            .find_map(|kid| self.lookup_name_tree(kid, key, depth + 1))
    }

    fn check_targets(&self, specs: &[OutlineSpec]) -> DocResult<()> {
        for spec in specs {
            if let Some(OutlineTarget::Page(page) | OutlineTarget::View { page, .. }) = &spec.target {
                self.page_id(*page)?;
            }
            self.check_targets(&spec.children)?;
        }
        Ok(())
    }

    fn write_target(&self, dict: &mut Dictionary, target: &OutlineTarget) -> DocResult<()> {
        match target {
            OutlineTarget::Page(index) => {
                let page = self.page_id(*index)?;
                let top = self.page_box(*index).map_or(0.0, |page_box| page_box.y1);
                dict.set(
                    "Dest",
                    vec![
                        Object::Reference(page),
                        Object::Name(XYZ.into()),
                        real(0.0),
                        real(top),
                        Object::Null,
                    ],
                );
            }
            OutlineTarget::View { page, kind, args } => {
                let mut dest = vec![
                    Object::Reference(self.page_id(*page)?),
                    Object::Name(kind.as_bytes().to_vec()),
                ];
                dest.extend(args.iter().map(|arg| arg.map_or(Object::Null, real)));
                dict.set("Dest", dest);
            }
            OutlineTarget::Preserved { dest, action, .. } => {
                if let Some(dest) = dest {
                    dict.set("Dest", objects::from_raw(dest));
                }
                if let Some(action) = action {
                    dict.set("A", objects::from_raw(action));
                }
            }
        }
        Ok(())
    }

    /// Writes a fresh outline and points the catalog at it. Does not merge
    /// with an existing outline; see [`DocProxy::replace_outline`].
    #[instrument(skip(self, specs), fields(items = specs.len()))]
    pub fn create_outline(&mut self, specs: &[OutlineSpec]) -> DocResult<ObjRef> {
        self.check_targets(specs)?;

        // Pass 1: identities, links and counts.
        let mut arena = vec![ArenaNode {
            id: self.doc.new_object_id(),
            spec: None,
            parent: None,
            children: Vec::new(),
            count: 0,
        }];
        let mut pending: Vec<(usize, &OutlineSpec)> =
            specs.iter().rev().map(|spec| (0, spec)).collect();
        while let Some((parent, spec)) = pending.pop() {
            let index = arena.len();
            arena.push(ArenaNode {
                id: self.doc.new_object_id(),
                spec: Some(spec),
                parent: Some(parent),
                children: Vec::new(),
                count: 0,
            });
            arena[parent].children.push(index);
            let mut ancestor = Some(parent);
            while let Some(up) = ancestor {
                arena[up].count += 1;
                ancestor = arena[up].parent;
            }
            pending.extend(spec.children.iter().rev().map(|child| (index, child)));
        }

        // Pass 2: dictionaries.
        for node in &arena {
            let mut dict = Dictionary::new();
            match node.spec {
                None => dict.set("Type", Object::Name(b"Outlines".to_vec())),
                Some(spec) => {
                    dict.set("Title", objects::encode_text(&spec.title));
                    if let Some(target) = &spec.target {
                        self.write_target(&mut dict, target)?;
                    }
                }
            }
            if let Some(parent) = node.parent {
                dict.set("Parent", Object::Reference(arena[parent].id));
                let siblings = &arena[parent].children;
                let position = siblings.iter().position(|&i| arena[i].id == node.id);
                if let Some(position) = position {
                    if let Some(&prev) = position.checked_sub(1).and_then(|p| siblings.get(p)) {
                        dict.set("Prev", Object::Reference(arena[prev].id));
                    }
                    if let Some(&next) = siblings.get(position + 1) {
                        dict.set("Next", Object::Reference(arena[next].id));
                    }
                }
            }
            if let (Some(&first), Some(&last)) = (node.children.first(), node.children.last()) {
                dict.set("First", Object::Reference(arena[first].id));
                dict.set("Last", Object::Reference(arena[last].id));
            }
            if node.count > 0 {
                dict.set("Count", node.count);
            }
            self.doc.objects.insert(node.id, Object::Dictionary(dict));
        }

        let root = arena[0].id;
        self.catalog_mut()?.set("Outlines", Object::Reference(root));
        info!(root = ?root, items = arena.len() - 1, "outline written");
        Ok(to_ref(root))
    }

    /// Deletes `node` and its subtree, children first.
    pub fn delete_outline(&mut self, node: &OutlineNode) {
        for child in &node.children {
            self.delete_outline(child);
        }
        if let Some(reference) = node.reference {
            self.doc.objects.remove(&to_id(reference));
        }
    }

    /// Deletes every outline root and unhooks the catalog.
    #[instrument(skip(self))]
    pub fn remove_outlines(&mut self) -> DocResult<()> {
        let roots = self.list_outlines();
        for root in &roots {
            self.delete_outline(root);
        }
        self.catalog_mut()?.remove(b"Outlines");
        self.recompute_max_id();
        debug!(roots = roots.len(), "outlines removed");
        Ok(())
    }

    /// Swaps the whole outline for `specs`. An empty list leaves the
    /// document with no outline at all.
    pub fn replace_outline(&mut self, specs: &[OutlineSpec]) -> DocResult<()> {
        self.check_targets(specs)?;
        self.remove_outlines()?;
        if !specs.is_empty() {
            self.create_outline(specs)?;
        }
        Ok(())
    }

    fn outline_edit(
        &self,
        title: &str,
        page_index: usize,
        edit: impl FnOnce(&mut Vec<FlatOutlineItem>) -> bool,
    ) -> DocResult<DocEdit> {
        self.page_id(page_index)?;
        let before = self.list_serializable_outlines();
        let mut items = outline::flatten(&before);
        if !edit(&mut items) {
            return Err(DocError::OutlineItemNotFound {
                title: title.to_owned(),
                page_index,
            });
        }
        Ok(DocEdit::ReplaceOutline {
            before,
            after: outline::rebuild(&items),
            params: ActionParams {
                page_index: None,
                subject: ActionSubject::OutlineItem {
                    title: title.to_owned(),
                    page_index,
                },
            },
        })
    }

    pub fn add_outline_item(
        &self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> DocResult<DocEdit> {
        self.outline_edit(title, page_index, |items| {
            outline::insert_item(items, title, page_index, depth_delta);
            true
        })
    }

    pub fn remove_outline_item(&self, title: &str, page_index: usize) -> DocResult<DocEdit> {
        self.outline_edit(title, page_index, |items| {
            outline::remove_item(items, title, page_index).is_some()
        })
    }

    pub fn change_outline_item_depth(
        &self,
        title: &str,
        page_index: usize,
        depth_delta: i32,
    ) -> DocResult<DocEdit> {
        self.outline_edit(title, page_index, |items| {
            outline::change_depth(items, title, page_index, depth_delta).is_some()
        })
    }
}
