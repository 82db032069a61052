//! Keyed Collection View
//!
//! A [`CollectionView`] keeps one live element per item of a list without
//! going through virtual nodes. It is meant for long homogeneous lists where
//! building a virtual tree per refresh would cost more than the diff saves.
//!
//! # How Refresh Works
//!
//! 1. Entries whose key is gone are destroyed: the element is detached, the
//!    destroy callback runs, and the entry's disposable is released.
//! 2. Items with a new key get an element from the create callback.
//! 3. Items whose key persists keep their element untouched.
//! 4. In ordered mode, elements are put in item order. Elements on the
//!    longest run that is already in order stay; the rest are moved once.
//!    In unordered mode new elements are appended and nothing moves.
//!
//! The view assumes it is the only writer of its parent's children.

use std::fmt;
use std::hash::Hash;

use indexmap::IndexMap;
use serde::Deserialize;
use tracing::{debug, warn};

use crate::dom::{Document, NodeId};
use crate::error::DomError;
use crate::reactive::Disposable;
use crate::vdom::lis;

/// Collection view settings.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CollectionConfig {
    /// Keep the live order in sync with the item order.
    pub ordered: bool,
}

impl Default for CollectionConfig {
    fn default() -> Self {
        Self { ordered: true }
    }
}

/// What a refresh did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RefreshStats {
    pub created: usize,
    pub destroyed: usize,
    pub moved: usize,
}

impl RefreshStats {
    pub fn is_noop(&self) -> bool {
        *self == Self::default()
    }
}

struct Entry<I> {
    item: I,
    node: NodeId,
    resources: Disposable,
}

type KeyFn<K, I> = Box<dyn Fn(&I) -> K>;
type CreateFn<I> = Box<dyn FnMut(&I) -> (NodeId, Disposable)>;
type DestroyFn<I> = Box<dyn FnMut(&I, NodeId)>;

/// One live element per keyed item, kept in step with a list.
pub struct CollectionView<K, I> {
    document: Document,
    parent: NodeId,
    config: CollectionConfig,
    key_of: KeyFn<K, I>,
    create: CreateFn<I>,
    destroy: DestroyFn<I>,
    entries: IndexMap<K, Entry<I>>,
}

impl<K, I> CollectionView<K, I>
where
    K: Eq + Hash + Clone + fmt::Debug + 'static,
    I: Clone + 'static,
{
    /// Create an empty view rendering into `parent`.
    ///
    /// `create` returns a detached element plus whatever must be released
    /// with it; `destroy` receives the item and its element after the
    /// element has been detached.
    pub fn new(
        document: &Document,
        parent: NodeId,
        key_of: impl Fn(&I) -> K + 'static,
        create: impl FnMut(&I) -> (NodeId, Disposable) + 'static,
        destroy: impl FnMut(&I, NodeId) + 'static,
    ) -> Self {
        Self {
            document: document.clone(),
            parent,
            config: CollectionConfig::default(),
            key_of: Box::new(key_of),
            create: Box::new(create),
            destroy: Box::new(destroy),
            entries: IndexMap::new(),
        }
    }

    pub fn with_config(mut self, config: CollectionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn parent(&self) -> NodeId {
        self.parent
    }

    /// Bring the live elements in line with `items`.
    ///
    /// Later items repeating an earlier key are ignored.
    pub fn refresh(&mut self, items: &[I]) -> Result<RefreshStats, DomError> {
        let mut stats = RefreshStats::default();

        let mut desired: IndexMap<K, &I> = IndexMap::with_capacity(items.len());
        for item in items {
            let key = (self.key_of)(item);
            if desired.contains_key(&key) {
                warn!(key = ?key, "duplicate key in collection, keeping the first");
                continue;
            }
            desired.insert(key, item);
        }

        let gone: Vec<K> = self
            .entries
            .keys()
            .filter(|key| !desired.contains_key(*key))
            .cloned()
            .collect();
        for key in gone {
            if let Some(entry) = self.entries.shift_remove(&key) {
                self.destroy_entry(entry)?;
                stats.destroyed += 1;
            }
        }

        // `entries` now lists the survivors in live order.
        let mut previous: IndexMap<K, Option<Entry<I>>> = std::mem::take(&mut self.entries)
            .into_iter()
            .map(|(key, entry)| (key, Some(entry)))
            .collect();
        let mut sources: Vec<Option<usize>> = Vec::with_capacity(desired.len());
        let mut next_entries: IndexMap<K, Entry<I>> = IndexMap::with_capacity(desired.len());
        for (key, item) in desired {
            let survivor = previous
                .get_full_mut(&key)
                .and_then(|(index, _, slot)| slot.take().map(|entry| (index, entry)));
            match survivor {
                Some((index, mut entry)) => {
                    entry.item = item.clone();
                    sources.push(Some(index));
                    next_entries.insert(key, entry);
                }
                None => {
                    let (node, resources) = (self.create)(item);
                    sources.push(None);
                    next_entries.insert(
                        key,
                        Entry {
                            item: item.clone(),
                            node,
                            resources,
                        },
                    );
                    stats.created += 1;
                }
            }
        }

        // Committed ahead of placement: a failed move leaves entries tracked.
        if !self.config.ordered {
            next_entries = Self::survivors_first(next_entries, &sources);
        }
        self.entries = next_entries;
        if self.config.ordered {
            stats.moved = self.place_ordered(&sources)?;
        } else {
            self.append_fresh(stats.created)?;
        }

        debug!(
            created = stats.created,
            destroyed = stats.destroyed,
            moved = stats.moved,
            len = self.entries.len(),
            "collection refreshed"
        );
        Ok(stats)
    }

    fn place_ordered(&self, sources: &[Option<usize>]) -> Result<usize, DomError> {
        let kept: Vec<usize> = (0..sources.len()).filter(|&i| sources[i].is_some()).collect();
        let order: Vec<usize> = kept.iter().filter_map(|&i| sources[i]).collect();
        let mut stays = vec![false; sources.len()];
        for position in lis(&order) {
            stays[kept[position]] = true;
        }

        let mut moved = 0;
        let mut next: Option<NodeId> = None;
        for (index, entry) in self.entries.values().enumerate().rev() {
            if !stays[index] {
                self.document.insert_before(self.parent, entry.node, next)?;
                if sources[index].is_some() {
                    moved += 1;
                }
            }
            next = Some(entry.node);
        }
        Ok(moved)
    }

    /// Survivors in their live order, then newcomers in item order.
    fn survivors_first(
        entries: IndexMap<K, Entry<I>>,
        sources: &[Option<usize>],
    ) -> IndexMap<K, Entry<I>> {
        let mut survivors: Vec<(usize, K, Entry<I>)> = Vec::with_capacity(entries.len());
        let mut fresh: Vec<(K, Entry<I>)> = Vec::new();
        for ((key, entry), source) in entries.into_iter().zip(sources) {
            match source {
                Some(index) => survivors.push((*index, key, entry)),
                None => fresh.push((key, entry)),
            }
        }
        survivors.sort_by_key(|(index, _, _)| *index);
        survivors
            .into_iter()
            .map(|(_, key, entry)| (key, entry))
            .chain(fresh)
            .collect()
    }

    fn append_fresh(&self, created: usize) -> Result<(), DomError> {
        let skip = self.entries.len() - created;
        for entry in self.entries.values().skip(skip) {
            self.document.append_child(self.parent, entry.node)?;
        }
        Ok(())
    }

    fn destroy_entry(&mut self, entry: Entry<I>) -> Result<(), DomError> {
        let Entry {
            item,
            node,
            resources,
        } = entry;
        if self.document.parent(node)? == Some(self.parent) {
            self.document.remove_child(self.parent, node)?;
        }
        (self.destroy)(&item, node);
        resources.dispose();
        let detached = self.document.contains(node)
            && node != self.document.root()
            && self.document.parent(node)?.is_none();
        if detached {
            self.document.release(node)?;
        }
        Ok(())
    }

    /// Destroy every entry. Returns how many there were.
    pub fn clear(&mut self) -> Result<usize, DomError> {
        let entries = std::mem::take(&mut self.entries);
        let count = entries.len();
        for (_, entry) in entries {
            self.destroy_entry(entry)?;
        }
        Ok(count)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// The live element for `key`.
    pub fn node_for(&self, key: &K) -> Option<NodeId> {
        self.entries.get(key).map(|entry| entry.node)
    }

    /// The item currently backing `key`.
    pub fn item_for(&self, key: &K) -> Option<&I> {
        self.entries.get(key).map(|entry| &entry.item)
    }

    /// Keys in live order.
    pub fn keys(&self) -> impl Iterator<Item = &K> + '_ {
        self.entries.keys()
    }
}

impl<K: fmt::Debug, I> fmt::Debug for CollectionView<K, I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CollectionView")
            .field("parent", &self.parent)
            .field("config", &self.config)
            .field("keys", &self.entries.keys().collect::<Vec<_>>())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dom::Mutation;
    use std::cell::{Cell, RefCell};
    use std::rc::Rc;

    #[derive(Clone, Debug)]
    struct Row {
        id: u32,
        label: &'static str,
    }

    fn rows(ids: &[u32]) -> Vec<Row> {
        ids.iter().map(|&id| Row { id, label: "row" }).collect()
    }

    struct Harness {
        doc: Document,
        parent: NodeId,
        destroyed: Rc<RefCell<Vec<u32>>>,
        released: Rc<Cell<usize>>,
    }

    fn harness() -> (Harness, CollectionView<u32, Row>) {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        doc.append_child(doc.root(), parent).unwrap();
        let destroyed = Rc::new(RefCell::new(Vec::new()));
        let released = Rc::new(Cell::new(0));

        let create_doc = doc.clone();
        let on_release = released.clone();
        let on_destroy = destroyed.clone();
        let view = CollectionView::new(
            &doc,
            parent,
            |row: &Row| row.id,
            move |row: &Row| {
                let node = create_doc.create_element("li");
                create_doc.set_attribute(node, "data-id", row.id as i64).unwrap();
                let text = create_doc.create_text(row.label);
                create_doc.append_child(node, text).unwrap();
                let released = on_release.clone();
                (node, Disposable::new(move || released.set(released.get() + 1)))
            },
            move |row: &Row, _| on_destroy.borrow_mut().push(row.id),
        );
        (
            Harness {
                doc,
                parent,
                destroyed,
                released,
            },
            view,
        )
    }

    fn live_ids(harness: &Harness) -> Vec<String> {
        harness
            .doc
            .children(harness.parent)
            .into_iter()
            .filter_map(|node| harness.doc.attribute(node, "data-id"))
            .map(|value| value.to_string())
            .collect()
    }

    #[test]
    fn first_refresh_creates_everything() {
        let (harness, mut view) = harness();
        let stats = view.refresh(&rows(&[1, 2, 3])).unwrap();

        assert_eq!(stats.created, 3);
        assert_eq!(live_ids(&harness), vec!["1", "2", "3"]);
        assert_eq!(view.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn unchanged_refresh_touches_nothing() {
        let (harness, mut view) = harness();
        view.refresh(&rows(&[1, 2, 3])).unwrap();

        harness.doc.record_mutations(true);
        let stats = view.refresh(&rows(&[1, 2, 3])).unwrap();
        assert!(stats.is_noop());
        assert!(harness.doc.take_mutations().is_empty());
    }

    #[test]
    fn removal_destroys_only_the_missing_item() {
        let (harness, mut view) = harness();
        view.refresh(&rows(&[1, 2, 3])).unwrap();
        let first = view.node_for(&1).unwrap();
        let last = view.node_for(&3).unwrap();

        let stats = view.refresh(&rows(&[1, 3])).unwrap();
        assert_eq!(
            stats,
            RefreshStats {
                created: 0,
                destroyed: 1,
                moved: 0
            }
        );
        assert_eq!(*harness.destroyed.borrow(), vec![2]);
        assert_eq!(harness.released.get(), 1);
        assert_eq!(harness.doc.children(harness.parent), vec![first, last]);
    }

    #[test]
    fn reorder_uses_moves_only() {
        let (harness, mut view) = harness();
        view.refresh(&rows(&[1, 2, 3, 4])).unwrap();
        let before: Vec<NodeId> = [1, 2, 3, 4].iter().map(|k| view.node_for(k).unwrap()).collect();

        harness.doc.record_mutations(true);
        let stats = view.refresh(&rows(&[4, 1, 2, 3])).unwrap();
        let log = harness.doc.take_mutations();

        assert_eq!(stats.moved, 1);
        assert!(log.iter().all(Mutation::is_move));
        assert_eq!(
            harness.doc.children(harness.parent),
            vec![before[3], before[0], before[1], before[2]]
        );
    }

    #[test]
    fn unordered_mode_appends_and_never_moves() {
        let (harness, view) = harness();
        let mut view = view.with_config(CollectionConfig { ordered: false });
        view.refresh(&rows(&[1, 2])).unwrap();

        let stats = view.refresh(&rows(&[3, 2, 1])).unwrap();
        assert_eq!(stats.moved, 0);
        assert_eq!(live_ids(&harness), vec!["1", "2", "3"]);
        assert_eq!(view.keys().copied().collect::<Vec<_>>(), vec![1, 2, 3]);
    }

    #[test]
    fn duplicate_keys_keep_the_first_item() {
        let (_harness, mut view) = harness();
        let items = vec![
            Row { id: 1, label: "first" },
            Row { id: 1, label: "second" },
        ];
        let stats = view.refresh(&items).unwrap();

        assert_eq!(stats.created, 1);
        assert_eq!(view.item_for(&1).map(|row| row.label), Some("first"));
    }

    #[test]
    fn clear_releases_everything() {
        let (harness, mut view) = harness();
        view.refresh(&rows(&[1, 2])).unwrap();
        let nodes_before = harness.doc.node_count();

        assert_eq!(view.clear().unwrap(), 2);
        assert!(view.is_empty());
        assert_eq!(harness.released.get(), 2);
        assert_eq!(harness.doc.node_count(), nodes_before - 4);
    }

    #[test]
    fn failed_placement_keeps_entries_tracked() {
        let doc = Document::new();
        let parent = doc.create_element("ul");
        doc.append_child(doc.root(), parent).unwrap();
        let released = Rc::new(Cell::new(0));

        let create_doc = doc.clone();
        let on_release = released.clone();
        let mut view = CollectionView::new(
            &doc,
            parent,
            |row: &Row| row.id,
            move |row: &Row| {
                // The document root cannot be placed under one of its own
                // descendants.
                let node = if row.id == 99 {
                    create_doc.root()
                } else {
                    create_doc.create_element("li")
                };
                let released = on_release.clone();
                (node, Disposable::new(move || released.set(released.get() + 1)))
            },
            |_: &Row, _| {},
        );
        view.refresh(&rows(&[1, 2])).unwrap();
        let kept = [view.node_for(&1).unwrap(), view.node_for(&2).unwrap()];

        assert!(matches!(
            view.refresh(&rows(&[1, 2, 99])),
            Err(DomError::Cycle { .. })
        ));
        assert_eq!(view.len(), 3);
        assert_eq!(released.get(), 0);
        assert_eq!(doc.children(parent), kept.to_vec());
        assert_eq!(view.node_for(&1), Some(kept[0]));

        let stats = view.refresh(&rows(&[1, 2])).unwrap();
        assert_eq!(stats.destroyed, 1);
        assert_eq!(released.get(), 1);
        assert_eq!(doc.children(parent), kept.to_vec());
        assert!(doc.contains(doc.root()));
    }
}
