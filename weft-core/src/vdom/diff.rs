//! Reconciler
//!
//! Applies the difference between two virtual trees to the live document.
//!
//! # How Patching Works
//!
//! The reconciler keeps no state of its own. Each call receives the
//! previously mounted baseline ([`Mounted`]) and the desired tree, mutates
//! the document, and returns the new baseline.
//!
//! - Nodes of a different shape (variant, tag, or key) are replaced
//!   wholesale. This is the normal path for incompatible nodes, not an
//!   error.
//! - Matching elements get an attribute diff (only changed values are
//!   written) and a listener diff by event slot.
//! - Text nodes are updated in place.
//! - Children are matched by key if any sibling on either side carries one,
//!   otherwise by position.
//!
//! # Keyed Children
//!
//! Old nodes are matched by key and reused. Unmatched old nodes are removed
//! first. The old positions of the reused nodes, read in new order, form a
//! sequence whose longest increasing subsequence stays put; every other
//! reused node is moved once, and new nodes are inserted at their place.
//! Placement runs from the last child to the first so each node can be
//! positioned before its already-placed successor.
//!
//! # Root Fragments
//!
//! A fragment handed to [`Reconciler::patch`] is built with an empty text
//! node as its last child. Inserting the fragment moves that marker along
//! with the content, so later patches can find the live container and the
//! end of the fragment's range even after every other child is gone.

use std::collections::{HashMap, HashSet, VecDeque};

use serde::Deserialize;
use smallvec::SmallVec;
use tracing::{trace, warn};

use crate::dom::{Document, NodeId};
use crate::error::DomError;

use super::lis::lis;
use super::node::{flatten, Key, VNode};

/// A virtual node together with the live node built for it.
#[derive(Debug, Clone)]
pub struct Mounted {
    vnode: VNode,
    node: NodeId,
    children: Vec<Mounted>,
    /// End-of-range marker of a root fragment.
    marker: Option<NodeId>,
}

impl Mounted {
    pub fn node(&self) -> NodeId {
        self.node
    }

    pub fn vnode(&self) -> &VNode {
        &self.vnode
    }

    pub fn children(&self) -> &[Mounted] {
        &self.children
    }

    /// The first live node this entry places into its parent.
    fn anchor(&self) -> Option<NodeId> {
        match self.vnode {
            VNode::Fragment(_) => self
                .children
                .first()
                .and_then(Mounted::anchor)
                .or(self.marker),
            _ => Some(self.node),
        }
    }
}

/// Reconciler settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ReconcilerConfig {
    /// Deepest tree the reconciler will build or patch.
    pub depth_limit: usize,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self { depth_limit: 512 }
    }
}

/// Builds and patches live nodes from virtual trees.
#[derive(Debug, Clone, Default)]
pub struct Reconciler {
    config: ReconcilerConfig,
}

impl Reconciler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_config(config: ReconcilerConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &ReconcilerConfig {
        &self.config
    }

    /// Patch `old` into `new`, or build `new` from scratch when there is no
    /// baseline.
    ///
    /// A freshly built root is detached; inserting it is up to the caller.
    /// A patched root stays where it is, or is swapped in place when the
    /// shapes differ.
    pub fn patch(
        &self,
        doc: &Document,
        old: Option<Mounted>,
        new: &VNode,
    ) -> Result<Mounted, DomError> {
        match old {
            None => self.build(doc, new, 0),
            Some(old) => self.diff_node(doc, old, new, 0),
        }
    }

    /// Patch the children of `parent` from `old` into `new`.
    ///
    /// `parent` must contain exactly the nodes described by `old`.
    pub fn patch_children(
        &self,
        doc: &Document,
        parent: NodeId,
        old: Vec<Mounted>,
        new: &[VNode],
    ) -> Result<Vec<Mounted>, DomError> {
        let mut flat = Vec::with_capacity(new.len());
        flatten(new, &mut flat);
        self.diff_children(doc, parent, old, &flat, None, 1)
    }

    /// Detach and free everything `mounted` created.
    pub fn unmount(&self, doc: &Document, mounted: Mounted) -> Result<(), DomError> {
        match mounted.vnode {
            VNode::Fragment(_) => {
                for child in mounted.children {
                    self.unmount(doc, child)?;
                }
                if let Some(marker) = mounted.marker {
                    detach_and_release(doc, marker)?;
                }
                doc.release(mounted.node)
            }
            _ => detach_and_release(doc, mounted.node),
        }
    }

    fn check_depth(&self, depth: usize) -> Result<(), DomError> {
        if depth > self.config.depth_limit {
            return Err(DomError::DepthLimit(self.config.depth_limit));
        }
        Ok(())
    }

    fn build(&self, doc: &Document, vnode: &VNode, depth: usize) -> Result<Mounted, DomError> {
        self.check_depth(depth)?;
        let (node, children) = match vnode {
            VNode::Text(text) => (doc.create_text(text.text()), &[][..]),
            VNode::Element(element) => {
                let node = doc.create_element(element.tag());
                for (name, value) in element.attrs() {
                    doc.set_attribute(node, name, value.clone())?;
                }
                for (event, handler) in element.events() {
                    doc.add_listener(node, event, handler.clone())?;
                }
                (node, element.children())
            }
            VNode::Fragment(fragment) => (doc.create_fragment(), fragment.children()),
        };

        let mut flat = Vec::with_capacity(children.len());
        flatten(children, &mut flat);
        let mut mounted = Vec::with_capacity(flat.len());
        for child in &flat {
            let built = self.build(doc, child, depth + 1)?;
            doc.append_child(node, built.node)?;
            mounted.push(built);
        }

        let marker = match vnode {
            VNode::Fragment(_) => {
                let marker = doc.create_text("");
                doc.append_child(node, marker)?;
                Some(marker)
            }
            _ => None,
        };

        Ok(Mounted {
            vnode: vnode.clone(),
            node,
            children: mounted,
            marker,
        })
    }

    /// Where the live children of `mounted` currently sit.
    fn container_of(&self, doc: &Document, mounted: &Mounted) -> Result<NodeId, DomError> {
        // Once inserted, a fragment's children live in the fragment's
        // destination rather than in the fragment itself.
        match mounted.marker {
            Some(marker) => Ok(doc.parent(marker)?.unwrap_or(mounted.node)),
            None => Ok(mounted.node),
        }
    }

    fn replace(
        &self,
        doc: &Document,
        old: Mounted,
        new: &VNode,
        depth: usize,
    ) -> Result<Mounted, DomError> {
        trace!(old = %old.node, "replacing node of different shape");
        let fresh = self.build(doc, new, depth)?;
        let position = match old.anchor() {
            Some(anchor) => doc
                .parent(anchor)?
                .filter(|&parent| parent != old.node)
                .map(|parent| (parent, anchor)),
            None => None,
        };
        if let Some((parent, anchor)) = position {
            doc.insert_before(parent, fresh.node, Some(anchor))?;
        }
        self.unmount(doc, old)?;
        Ok(fresh)
    }

    fn diff_node(
        &self,
        doc: &Document,
        old: Mounted,
        new: &VNode,
        depth: usize,
    ) -> Result<Mounted, DomError> {
        self.check_depth(depth)?;
        if old.vnode.ptr_eq(new) {
            return Ok(old);
        }
        if !old.vnode.same_shape(new) {
            return self.replace(doc, old, new, depth);
        }

        match (&old.vnode, new) {
            (VNode::Text(before), VNode::Text(after)) => {
                if before.text() != after.text() {
                    trace!(node = %old.node, "updating text");
                    doc.set_text(old.node, after.text())?;
                }
                Ok(Mounted {
                    vnode: new.clone(),
                    node: old.node,
                    children: Vec::new(),
                    marker: None,
                })
            }
            (VNode::Element(before), VNode::Element(after)) => {
                let node = old.node;
                for (name, value) in after.attrs() {
                    if before.attrs().get(name) != Some(value) {
                        doc.set_attribute(node, name, value.clone())?;
                    }
                }
                for name in before.attrs().keys() {
                    if !after.attrs().contains_key(name) {
                        doc.remove_attribute(node, name)?;
                    }
                }

                for (event, handler) in after.events() {
                    if before.events().contains_key(event) {
                        doc.replace_listener(node, event, handler.clone())?;
                    } else {
                        doc.add_listener(node, event, handler.clone())?;
                    }
                }
                for event in before.events().keys() {
                    if !after.events().contains_key(event) {
                        doc.remove_listener(node, event)?;
                    }
                }

                let mut flat = Vec::with_capacity(after.children().len());
                flatten(after.children(), &mut flat);
                let children =
                    self.diff_children(doc, node, old.children, &flat, None, depth + 1)?;
                Ok(Mounted {
                    vnode: new.clone(),
                    node,
                    children,
                    marker: None,
                })
            }
            (VNode::Fragment(_), VNode::Fragment(after)) => {
                let container = self.container_of(doc, &old)?;
                let mut flat = Vec::with_capacity(after.children().len());
                flatten(after.children(), &mut flat);
                let children = self.diff_children(
                    doc,
                    container,
                    old.children,
                    &flat,
                    old.marker,
                    depth + 1,
                )?;
                Ok(Mounted {
                    vnode: new.clone(),
                    node: old.node,
                    children,
                    marker: old.marker,
                })
            }
            _ => self.replace(doc, old, new, depth),
        }
    }

    /// Patch a run of siblings in `parent`. New nodes at the tail go before
    /// `end`, or at the very end when it is `None`.
    fn diff_children(
        &self,
        doc: &Document,
        parent: NodeId,
        old: Vec<Mounted>,
        new: &[VNode],
        end: Option<NodeId>,
        depth: usize,
    ) -> Result<Vec<Mounted>, DomError> {
        let keyed = old.iter().any(|mounted| mounted.vnode.key().is_some())
            || new.iter().any(|vnode| vnode.key().is_some());
        if keyed {
            self.keyed_children(doc, parent, old, new, end, depth)
        } else {
            self.positional_children(doc, parent, old, new, end, depth)
        }
    }

    fn positional_children(
        &self,
        doc: &Document,
        parent: NodeId,
        old: Vec<Mounted>,
        new: &[VNode],
        end: Option<NodeId>,
        depth: usize,
    ) -> Result<Vec<Mounted>, DomError> {
        let mut old = old.into_iter();
        let mut result = Vec::with_capacity(new.len());
        for vnode in new {
            match old.next() {
                Some(previous) => result.push(self.diff_node(doc, previous, vnode, depth)?),
                None => {
                    let fresh = self.build(doc, vnode, depth)?;
                    doc.insert_before(parent, fresh.node, end)?;
                    result.push(fresh);
                }
            }
        }
        for leftover in old {
            self.unmount(doc, leftover)?;
        }
        Ok(result)
    }

    fn keyed_children(
        &self,
        doc: &Document,
        parent: NodeId,
        old: Vec<Mounted>,
        new: &[VNode],
        end: Option<NodeId>,
        depth: usize,
    ) -> Result<Vec<Mounted>, DomError> {
        let mut by_key: HashMap<Key, usize> = HashMap::with_capacity(old.len());
        let mut unkeyed: VecDeque<usize> = VecDeque::new();
        for (index, mounted) in old.iter().enumerate() {
            match mounted.vnode.key() {
                Some(key) => {
                    if by_key.contains_key(key) {
                        warn!(key = %key, "duplicate key in mounted children");
                    } else {
                        by_key.insert(key.clone(), index);
                    }
                }
                None => unkeyed.push_back(index),
            }
        }

        let mut old: Vec<Option<Mounted>> = old.into_iter().map(Some).collect();
        let mut seen: HashSet<&Key> = HashSet::with_capacity(new.len());
        let mut matched: Vec<Option<(usize, Mounted)>> = Vec::with_capacity(new.len());
        for vnode in new {
            let candidate = match vnode.key() {
                Some(key) => {
                    if !seen.insert(key) {
                        warn!(key = %key, "duplicate key in children, mounting fresh");
                    }
                    by_key.remove(key)
                }
                None => unkeyed.pop_front(),
            };
            let reused = candidate.and_then(|index| {
                let fits = old[index]
                    .as_ref()
                    .is_some_and(|mounted| mounted.vnode.same_shape(vnode));
                if fits {
                    old[index].take().map(|mounted| (index, mounted))
                } else {
                    None
                }
            });
            matched.push(reused);
        }

        let mut removed = 0usize;
        for leftover in old.into_iter().flatten() {
            self.unmount(doc, leftover)?;
            removed += 1;
        }

        let mut sources: SmallVec<[Option<usize>; 16]> = SmallVec::with_capacity(new.len());
        let mut entries = Vec::with_capacity(new.len());
        for (vnode, reused) in new.iter().zip(matched) {
            match reused {
                Some((index, mounted)) => {
                    sources.push(Some(index));
                    entries.push(self.diff_node(doc, mounted, vnode, depth)?);
                }
                None => {
                    sources.push(None);
                    entries.push(self.build(doc, vnode, depth)?);
                }
            }
        }

        let reused: Vec<usize> = (0..entries.len()).filter(|&i| sources[i].is_some()).collect();
        let order: Vec<usize> = reused.iter().filter_map(|&i| sources[i]).collect();
        let mut stays = vec![false; entries.len()];
        for position in lis(&order) {
            stays[reused[position]] = true;
        }

        let (mut inserted, mut moved) = (0usize, 0usize);
        let mut next = end;
        for (index, entry) in entries.iter().enumerate().rev() {
            if !stays[index] {
                doc.insert_before(parent, entry.node, next)?;
                if sources[index].is_some() {
                    moved += 1;
                } else {
                    inserted += 1;
                }
            }
            next = Some(entry.node);
        }

        trace!(parent = %parent, inserted, moved, removed, "keyed children patched");
        Ok(entries)
    }
}

fn detach_and_release(doc: &Document, node: NodeId) -> Result<(), DomError> {
    if let Some(parent) = doc.parent(node)? {
        doc.remove_child(parent, node)?;
    }
    doc.release(node)
}
