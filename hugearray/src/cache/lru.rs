use std::{collections::HashMap, hash::Hash, num::NonZeroUsize};

/// Sentinel for a missing link in the recency list.
const NIL: usize = usize::MAX;

/// A stable handle to an entry of a [Lru].
///
/// A slot remains valid until its entry is evicted or the cache is cleared, after which it may be
/// reused by another entry.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Slot(usize);

struct Node<K, V> {
    key: K,
    value: V,
    /// More recently used neighbor.
    prev: usize,
    /// Less recently used neighbor.
    next: usize,
}

/// A bounded least-recently-used cache whose evictions run a caller-provided hook.
pub struct Lru<K, V> {
    /// Maps each cached key to the slot holding its entry.
    ///
    /// # Invariants
    ///
    /// Each `index` entry maps to exactly one occupied `nodes` slot with a matching key.
    index: HashMap<K, usize>,

    /// Arena of entries, linked from most (`head`) to least (`tail`) recently used.
    nodes: Vec<Option<Node<K, V>>>,

    /// Unoccupied slots in `nodes`.
    free: Vec<usize>,

    head: usize,
    tail: usize,

    capacity: usize,
}

impl<K: Copy + Eq + Hash, V> Lru<K, V> {
    /// Create an empty cache holding at most `capacity` entries.
    pub fn new(capacity: NonZeroUsize) -> Self {
        let capacity = capacity.get();
        Self {
            index: HashMap::with_capacity(capacity),
            nodes: Vec::with_capacity(capacity),
            free: Vec::new(),
            head: NIL,
            tail: NIL,
            capacity,
        }
    }

    /// The maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// The number of cached entries.
    pub fn len(&self) -> usize {
        self.index.len()
    }

    /// Whether the cache holds no entries.
    pub fn is_empty(&self) -> bool {
        self.index.is_empty()
    }

    /// Whether `key` is cached. Does not affect recency.
    pub fn contains(&self, key: &K) -> bool {
        self.index.contains_key(key)
    }

    /// Find the slot of `key`, marking it most recently used.
    pub fn find(&mut self, key: &K) -> Option<Slot> {
        let slot = *self.index.get(key)?;
        self.promote(slot);
        Some(Slot(slot))
    }

    /// Get the value of `key`, marking it most recently used.
    pub fn get(&mut self, key: &K) -> Option<&mut V> {
        let slot = self.find(key)?;
        Some(self.at_mut(slot))
    }

    /// Get the value in `slot`. Does not affect recency.
    ///
    /// # Panics
    ///
    /// Panics if `slot` does not hold an entry (it was evicted or cleared).
    pub fn at_mut(&mut self, slot: Slot) -> &mut V {
        &mut self.node_mut(slot.0).value
    }

    /// Get the key in `slot`, if it holds an entry.
    pub fn key_at(&self, slot: Slot) -> Option<&K> {
        self.nodes
            .get(slot.0)
            .and_then(|node| node.as_ref())
            .map(|node| &node.key)
    }

    /// Insert `value` at `key` as the most recently used entry, returning its slot.
    ///
    /// If `key` is already cached, `evict` is first run on the value being replaced. Otherwise, if
    /// the cache is full, `evict` is first run on the least recently used entry, which is then
    /// discarded. If `evict` fails, the cache is left unchanged and `value` is dropped.
    pub fn put<E, F>(&mut self, key: K, value: V, evict: F) -> Result<Slot, E>
    where
        F: FnOnce(&K, &mut V) -> Result<(), E>,
    {
        if let Some(&slot) = self.index.get(&key) {
            let node = self.node_mut(slot);
            evict(&node.key, &mut node.value)?;
            node.value = value;
            self.promote(slot);
            return Ok(Slot(slot));
        }

        if self.index.len() >= self.capacity {
            let victim = self.tail;
            let node = self.node_mut(victim);
            evict(&node.key, &mut node.value)?;
            let key = node.key;
            self.detach(victim);
            self.index.remove(&key);
            self.nodes[victim] = None;
            self.free.push(victim);
        }

        let node = Node {
            key,
            value,
            prev: NIL,
            next: NIL,
        };
        let slot = match self.free.pop() {
            Some(slot) => {
                self.nodes[slot] = Some(node);
                slot
            }
            None => {
                self.nodes.push(Some(node));
                self.nodes.len() - 1
            }
        };
        self.index.insert(key, slot);
        self.push_front(slot);
        Ok(Slot(slot))
    }

    /// Run `f` on every entry, from least to most recently used, stopping at the first failure.
    /// Does not affect recency.
    pub fn try_for_each<E, F>(&mut self, mut f: F) -> Result<(), E>
    where
        F: FnMut(&K, &mut V) -> Result<(), E>,
    {
        let mut cursor = self.tail;
        while cursor != NIL {
            let node = self.node_mut(cursor);
            f(&node.key, &mut node.value)?;
            cursor = node.prev;
        }
        Ok(())
    }

    /// Iterate over all entries, in no particular order.
    pub fn iter(&self) -> impl Iterator<Item = (&K, &V)> {
        self.nodes
            .iter()
            .flatten()
            .map(|node| (&node.key, &node.value))
    }

    /// Run `evict` on every entry (from least to most recently used) and then discard them all.
    ///
    /// If `evict` fails on any entry, no entry is discarded.
    pub fn clear<E, F>(&mut self, evict: F) -> Result<(), E>
    where
        F: FnMut(&K, &mut V) -> Result<(), E>,
    {
        self.try_for_each(evict)?;
        self.index.clear();
        self.nodes.clear();
        self.free.clear();
        self.head = NIL;
        self.tail = NIL;
        Ok(())
    }

    fn node_mut(&mut self, slot: usize) -> &mut Node<K, V> {
        self.nodes[slot].as_mut().expect("slot is not occupied")
    }

    /// Move `slot` to the front of the recency list.
    fn promote(&mut self, slot: usize) {
        if self.head == slot {
            return;
        }
        self.detach(slot);
        self.push_front(slot);
    }

    fn push_front(&mut self, slot: usize) {
        let head = self.head;
        {
            let node = self.node_mut(slot);
            node.prev = NIL;
            node.next = head;
        }
        if head != NIL {
            self.node_mut(head).prev = slot;
        }
        self.head = slot;
        if self.tail == NIL {
            self.tail = slot;
        }
    }

    fn detach(&mut self, slot: usize) {
        let (prev, next) = {
            let node = self.node_mut(slot);
            (node.prev, node.next)
        };
        if prev != NIL {
            self.node_mut(prev).next = next;
        } else {
            self.head = next;
        }
        if next != NIL {
            self.node_mut(next).prev = prev;
        } else {
            self.tail = prev;
        }
        let node = self.node_mut(slot);
        node.prev = NIL;
        node.next = NIL;
    }
}
