//! Outline (bookmark) trees and the flat-list edits applied to them.
//!
//! Edits never patch a tree in place. The tree is flattened into a
//! depth-annotated list, the list is edited, and a new tree is rebuilt from
//! it.

use serde::{Deserialize, Serialize};

use crate::ObjRef;

/// How much deeper than its predecessor an inserted or moved item may go.
pub const MAX_DEPTH_STEP: usize = 2;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum OutlineTarget {
    /// Top of the page, no horizontal offset.
    Page(usize),
    /// An explicit destination such as `/XYZ left top zoom`. `None` args
    /// are written as PDF `null`.
    View {
        page: usize,
        kind: String,
        args: Vec<Option<f64>>,
    },
    /// A named destination or an action, written back exactly as it was
    /// read. `page` is where it leads when that could be worked out.
    Preserved {
        #[serde(default)]
        page: Option<usize>,
        #[serde(default)]
        dest: Option<RawValue>,
        #[serde(default)]
        action: Option<RawValue>,
    },
}

impl OutlineTarget {
    pub fn page_index(&self) -> Option<usize> {
        match self {
            OutlineTarget::Page(page) => Some(*page),
            OutlineTarget::View { page, .. } => Some(*page),
            OutlineTarget::Preserved { page, .. } => *page,
        }
    }
}

/// A document value held verbatim. Names and strings keep their raw bytes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawValue {
    Null,
    Boolean(bool),
    Integer(i64),
    Real(f64),
    Name(Vec<u8>),
    String(Vec<u8>),
    Array(Vec<RawValue>),
    Dictionary(Vec<(Vec<u8>, RawValue)>),
    Reference(ObjRef),
}

/// Caller-side description of an outline tree, the input to a full write.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineSpec {
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub target: Option<OutlineTarget>,
    #[serde(default)]
    pub children: Vec<OutlineSpec>,
}

impl OutlineSpec {
    pub fn page(title: impl Into<String>, page_index: usize) -> Self {
        Self {
            title: title.into(),
            target: Some(OutlineTarget::Page(page_index)),
            children: Vec::new(),
        }
    }

    pub fn with_children(mut self, children: Vec<OutlineSpec>) -> Self {
        self.children = children;
        self
    }

    pub fn page_index(&self) -> Option<usize> {
        self.target.as_ref().and_then(OutlineTarget::page_index)
    }
}

/// An outline item as read back from a document.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OutlineNode {
    pub reference: Option<ObjRef>,
    pub title: Option<String>,
    /// `None` when the destination does not point at a known page.
    pub page_index: Option<usize>,
    pub destination: Option<OutlineTarget>,
    /// The stored `/Count`, 0 when absent.
    pub count: i64,
    pub children: Vec<OutlineNode>,
}

impl OutlineNode {
    pub fn descendant_count(&self) -> usize {
        self.children
            .iter()
            .map(|child| 1 + child.descendant_count())
            .sum()
    }

    /// True when every stored count in the subtree matches its real size.
    pub fn counts_consistent(&self) -> bool {
        self.count.unsigned_abs() as usize == self.descendant_count()
            && self.children.iter().all(OutlineNode::counts_consistent)
    }

    pub fn to_spec(&self) -> OutlineSpec {
        OutlineSpec {
            title: self.title.clone().unwrap_or_default(),
            target: self
                .destination
                .clone()
                .or_else(|| self.page_index.map(OutlineTarget::Page)),
            children: self.children.iter().map(OutlineNode::to_spec).collect(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlatOutlineItem {
    pub title: String,
    pub target: Option<OutlineTarget>,
    /// 1 for top-level items.
    pub depth: usize,
}

impl FlatOutlineItem {
    pub fn page_index(&self) -> Option<usize> {
        self.target.as_ref().and_then(OutlineTarget::page_index)
    }

    fn matches(&self, title: &str, page_index: usize) -> bool {
        self.title == title && self.page_index() == Some(page_index)
    }
}

/// Depth-first, parents before children.
pub fn flatten(roots: &[OutlineSpec]) -> Vec<FlatOutlineItem> {
    fn walk(nodes: &[OutlineSpec], depth: usize, out: &mut Vec<FlatOutlineItem>) {
        for node in nodes {
            out.push(FlatOutlineItem {
                title: node.title.clone(),
                target: node.target.clone(),
                depth,
            });
            walk(&node.children, depth + 1, out);
        }
    }

    let mut out = Vec::new();
    walk(roots, 1, &mut out);
    out
}

/// Inverse of [`flatten`]. An item deeper than its predecessor's child
/// level still becomes a child of the nearest shallower item.
pub fn rebuild(items: &[FlatOutlineItem]) -> Vec<OutlineSpec> {
    fn close(stack: &mut Vec<(usize, OutlineSpec)>, roots: &mut Vec<OutlineSpec>) {
        if let Some((_, node)) = stack.pop() {
            match stack.last_mut() {
                Some((_, parent)) => parent.children.push(node),
                None => roots.push(node),
            }
        }
    }

    let mut roots = Vec::new();
    let mut stack: Vec<(usize, OutlineSpec)> = Vec::new();
    for item in items {
        while stack.last().is_some_and(|(depth, _)| *depth >= item.depth) {
            close(&mut stack, &mut roots);
        }
        stack.push((
            item.depth,
            OutlineSpec {
                title: item.title.clone(),
                target: item.target.clone(),
                children: Vec::new(),
            },
        ));
    }
    while !stack.is_empty() {
        close(&mut stack, &mut roots);
    }
    roots
}

fn clamp_depth(previous_depth: Option<usize>, wanted: i64) -> usize {
    let upper = previous_depth.map_or(1, |depth| depth + MAX_DEPTH_STEP);
    wanted.clamp(1, upper as i64) as usize
}

/// Inserts a new page item after the last item on or before its page.
///
/// The depth follows that preceding item, shifted by `depth_delta`. Items
/// sharing a page are not told apart, so the new item always lands after
/// all of them. Returns the insertion index.
pub fn insert_item(
    items: &mut Vec<FlatOutlineItem>,
    title: &str,
    page_index: usize,
    depth_delta: i32,
) -> usize {
    let position = items
        .iter()
        .rposition(|item| item.page_index().is_some_and(|page| page <= page_index))
        .map_or(0, |found| found + 1);
    let previous_depth = position.checked_sub(1).map(|prev| items[prev].depth);
    let depth = match previous_depth {
        Some(depth) => clamp_depth(Some(depth), depth as i64 + i64::from(depth_delta)),
        None => 1,
    };
    items.insert(
        position,
        FlatOutlineItem {
            title: title.to_owned(),
            target: Some(OutlineTarget::Page(page_index)),
            depth,
        },
    );
    position
}

/// Removes the first item matching title and page.
pub fn remove_item(
    items: &mut Vec<FlatOutlineItem>,
    title: &str,
    page_index: usize,
) -> Option<FlatOutlineItem> {
    let position = items.iter().position(|item| item.matches(title, page_index))?;
    Some(items.remove(position))
}

/// Moves the first matching item `depth_delta` levels, clamped against the
/// item before it. Returns the new depth.
pub fn change_depth(
    items: &mut [FlatOutlineItem],
    title: &str,
    page_index: usize,
    depth_delta: i32,
) -> Option<usize> {
    let position = items.iter().position(|item| item.matches(title, page_index))?;
    let previous_depth = position.checked_sub(1).map(|prev| items[prev].depth);
    let item = &mut items[position];
    item.depth = clamp_depth(previous_depth, item.depth as i64 + i64::from(depth_delta));
    Some(item.depth)
}

/// Titles from the root down to the deepest item at or before `page_index`.
pub fn breadcrumb(roots: &[OutlineSpec], page_index: usize) -> Vec<String> {
    let mut path = Vec::new();
    let mut level = roots;
    while let Some(node) = level
        .iter()
        .filter(|node| node.page_index().is_some_and(|page| page <= page_index))
        .last()
    {
        path.push(node.title.clone());
        level = &node.children;
    }
    path
}
