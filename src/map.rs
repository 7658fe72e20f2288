// Copyright 2015 The Rust Project Developers. See the COPYRIGHT
// file at the top-level directory of this distribution and at
// http://rust-lang.org/COPYRIGHT.
//
// Licensed under the Apache License, Version 2.0 <LICENSE-APACHE or
// http://www.apache.org/licenses/LICENSE-2.0> or the MIT license
// <LICENSE-MIT or http://opensource.org/licenses/MIT>, at your
// option. This file may not be copied, modified, or distributed
// except according to those terms.

//! An ordered map with unique keys, plus the cursor machinery for walking and
//! editing it positionally.

use std::cmp::Ordering::{self, Equal, Greater, Less};
use std::fmt::{self, Debug};
use std::hash::{Hash, Hasher};
use std::iter::{self, IntoIterator};
use std::marker::PhantomData;
use std::ops;
use std::ptr;

use compare::{natural, Compare, Natural};

use crate::error::{Error, Result};

/// Index of the reserved sentinel slot. The sentinel stands in for "no child"
/// and "no parent"; it is always black, never holds an entry, and its links
/// point back at itself so the rebalancing passes can read through it without
/// branching on a missing node.
const NIL: usize = 0;

#[derive(Clone, Copy, PartialEq, Eq, Debug)]
enum Color {
    Red,
    Black,
}

/// A tree node in the arena. `children[0]` is the left (less-than) side,
/// `children[1]` the right, so the rebalancing passes can be written once and
/// mirrored through a direction index. `entry` is `None` only for the
/// sentinel and for slots on the free list; a free slot reuses `parent` as
/// the link to the next free slot.
#[derive(Clone)]
struct Node<K, V> {
    parent: usize,
    children: [usize; 2],
    color: Color,
    entry: Option<(K, V)>,
}

/// The red-black engine: an arena of nodes addressed by stable indices. The
/// arena owns every node; parent links are plain back-references used only
/// for traversal and rotation.
#[derive(Clone)]
struct Tree<K, V, C> {
    nodes: Vec<Node<K, V>>,
    root: usize,
    free: usize,
    len: usize,
    cmp: C,
}

/// This is implemented as a red-black tree whose nodes live in a `Vec` arena
/// addressed by stable indices, with a reserved sentinel slot in place of
/// null links. Lookup, insertion and removal take O(log n); iteration visits
/// keys in ascending order under the map's comparator.
///
/// # Examples
///
/// ```rust
/// use arena_collections::TreeMap;
///
/// let mut map = TreeMap::new();
///
/// map.insert(2, "bar");
/// map.insert(1, "foo");
/// map.insert(3, "quux");
///
/// // In ascending order by keys
/// for (key, value) in map.iter() {
///     println!("{}: {}", key, value);
/// }
///
/// // Prints 1, 2, 3
/// for key in map.keys() {
///     println!("{}", key);
/// }
///
/// map.remove(&1);
/// assert_eq!(map.len(), 2);
///
/// if !map.contains_key(&1) {
///     println!("1 is no more");
/// }
///
/// map.clear();
/// assert!(map.is_empty());
/// ```
///
/// A `TreeMap` can also be used with a custom ordering:
///
/// ```rust
/// use arena_collections::TreeMap;
///
/// struct Troll<'a> {
///     name: &'a str,
///     level: u32,
/// }
///
/// // Use a map to store trolls, sorted by level, and track a list of
/// // heroes slain.
/// let mut trolls = TreeMap::with_comparator(|l: &Troll, r: &Troll| l.level.cmp(&r.level));
///
/// trolls.insert(Troll { name: "Orgarr", level: 2 },
///               vec!["King Karl"]);
/// trolls.insert(Troll { name: "Blargarr", level: 3 },
///               vec!["Odd"]);
/// trolls.insert(Troll { name: "Wartilda", level: 1 },
///               vec![]);
///
/// // Print the trolls, ordered by level with smallest level first
/// for (troll, heroes) in trolls.iter() {
///     println!("level {}: '{}' has slain {} heroes", troll.level, troll.name, heroes.len());
/// }
/// ```
///
/// Positions in the map are exposed as [`Cursor`]s, which stay usable after
/// the borrow they were obtained under has ended and are revalidated on
/// every use:
///
/// ```rust
/// use arena_collections::TreeMap;
///
/// let mut map = TreeMap::new();
/// map.insert("a", 1);
/// map.insert("b", 2);
///
/// let pos = map.find(&"a");
/// assert_eq!(map.entry(pos), Ok((&"a", &1)));
/// map.erase(pos).unwrap();
/// // The erased position no longer dereferences.
/// assert!(map.entry(pos).is_err());
/// ```
pub struct TreeMap<K, V, C: Compare<K> = Natural<K>> {
    tree: Tree<K, V, C>,
    tag: u64,
}

/// A position inside a [`TreeMap`]: either an element or the past-the-end
/// position. Cursors are plain copyable values; they carry the identity of
/// the map that minted them and every cursor-taking method checks it, so a
/// cursor used with the wrong map reports
/// [`InvalidIterator`](Error::InvalidIterator) instead of touching foreign
/// memory. Erasing an element invalidates only cursors at that element.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub struct Cursor {
    node: usize,
    tag: u64,
}

impl<K: Clone, V: Clone, C: Compare<K> + Clone> Clone for TreeMap<K, V, C> {
    /// Deep-copies the map. The clone owns a fresh arena sharing no nodes
    /// with the source, and cursors of the source do not validate against it.
    fn clone(&self) -> TreeMap<K, V, C> {
        TreeMap {
            tree: self.tree.clone(),
            tag: crate::next_container_tag(),
        }
    }
}

// FIXME: determine what `PartialEq` means for comparator-based `TreeMap`s
impl<K: PartialEq + Ord, V: PartialEq> PartialEq for TreeMap<K, V> {
    #[inline]
    fn eq(&self, other: &TreeMap<K, V>) -> bool {
        self.iter().eq(other)
    }
}

// FIXME: determine what `Eq` means for comparator-based `TreeMap`s
impl<K: Eq + Ord, V: Eq> Eq for TreeMap<K, V> {}

// FIXME: determine what `PartialOrd` means for comparator-based `TreeMap`s
impl<K: Ord, V: PartialOrd> PartialOrd for TreeMap<K, V> {
    #[inline]
    fn partial_cmp(&self, other: &TreeMap<K, V>) -> Option<Ordering> {
        self.iter().partial_cmp(other)
    }
}

// FIXME: determine what `Ord` means for comparator-based `TreeMap`s
impl<K: Ord, V: Ord> Ord for TreeMap<K, V> {
    #[inline]
    fn cmp(&self, other: &TreeMap<K, V>) -> Ordering {
        self.iter().cmp(other)
    }
}

impl<K: Debug, V: Debug, C> Debug for TreeMap<K, V, C>
    where C: Compare<K>
{
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{{")?;

        for (i, (k, v)) in self.iter().enumerate() {
            if i != 0 {
                write!(f, ", ")?;
            }
            write!(f, "{:?}: {:?}", *k, *v)?;
        }

        write!(f, "}}")
    }
}

impl<K, V, C> Default for TreeMap<K, V, C>
    where C: Compare<K> + Default
{
    #[inline]
    fn default() -> TreeMap<K, V, C> {
        TreeMap::with_comparator(Default::default())
    }
}

impl<'a, K, V, C, Q: ?Sized> ops::Index<&'a Q> for TreeMap<K, V, C>
    where C: Compare<K> + Compare<Q, K>
{
    type Output = V;
    #[inline]
    fn index(&self, i: &'a Q) -> &V {
        self.get(i).expect("no entry found for key")
    }
}

impl<'a, K, V, C, Q: ?Sized> ops::IndexMut<&'a Q> for TreeMap<K, V, C>
    where C: Compare<K> + Compare<Q, K>
{
    #[inline]
    fn index_mut(&mut self, i: &'a Q) -> &mut V {
        self.get_mut(i).expect("no entry found for key")
    }
}

impl<K: Ord, V> TreeMap<K, V> {
    /// Creates an empty `TreeMap` ordered according to the natural order of its keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map: TreeMap<&str, i32> = TreeMap::new();
    /// map.insert("answer", 42);
    /// ```
    pub fn new() -> TreeMap<K, V> {
        TreeMap::with_comparator(natural())
    }
}

impl<K, V, C> TreeMap<K, V, C>
    where C: Compare<K>
{
    /// Creates an empty `TreeMap` ordered according to the given comparator.
    pub fn with_comparator(cmp: C) -> TreeMap<K, V, C> {
        TreeMap {
            tree: Tree::new(cmp),
            tag: crate::next_container_tag(),
        }
    }

    /// Returns the comparator according to which the `TreeMap` is ordered.
    pub fn comparator(&self) -> &C {
        &self.tree.cmp
    }

    /// Gets a lazy iterator over the keys in the map, in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map = TreeMap::new();
    /// map.insert("a", 1);
    /// map.insert("c", 3);
    /// map.insert("b", 2);
    ///
    /// // Print "a", "b", "c" in order.
    /// for x in map.keys() {
    ///     println!("{}", x);
    /// }
    /// ```
    pub fn keys<'a>(&'a self) -> Keys<'a, K, V> {
        fn first<A, B>((a, _): (A, B)) -> A {
            a
        }
        let first: fn((&'a K, &'a V)) -> &'a K = first; // coerce to fn pointer

        Keys(self.iter().map(first))
    }

    /// Gets a lazy iterator over the values in the map, in ascending order
    /// with respect to the corresponding keys.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map = TreeMap::new();
    /// map.insert("a", 1);
    /// map.insert("c", 3);
    /// map.insert("b", 2);
    ///
    /// // Print 1, 2, 3 ordered by keys.
    /// for x in map.values() {
    ///     println!("{}", x);
    /// }
    /// ```
    pub fn values<'a>(&'a self) -> Values<'a, K, V> {
        fn second<A, B>((_, b): (A, B)) -> B {
            b
        }
        let second: fn((&'a K, &'a V)) -> &'a V = second; // coerce to fn pointer

        Values(self.iter().map(second))
    }

    /// Gets a lazy iterator over the values in the map, in ascending order
    /// with respect to the corresponding keys, returning a mutable reference
    /// to each value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map = TreeMap::new();
    /// map.insert("a", 1);
    /// map.insert("c", 3);
    /// map.insert("b", 2);
    ///
    /// for x in map.values_mut() {
    ///     *x += 1;
    /// }
    ///
    /// // Print 2, 3, 4 ordered by keys.
    /// for x in map.values() {
    ///     println!("{}", x);
    /// }
    /// ```
    pub fn values_mut<'a>(&'a mut self) -> ValuesMut<'a, K, V> {
        fn second<A, B>((_, b): (A, B)) -> B {
            b
        }
        let second: fn((&'a K, &'a mut V)) -> &'a mut V = second; // coerce to fn pointer

        ValuesMut(self.iter_mut().map(second))
    }

    /// Gets a lazy iterator over the key-value pairs in the map, in ascending order.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map = TreeMap::new();
    /// map.insert("a", 1);
    /// map.insert("c", 3);
    /// map.insert("b", 2);
    ///
    /// // Print contents in ascending order
    /// for (key, value) in map.iter() {
    ///     println!("{}: {}", key, value);
    /// }
    /// ```
    pub fn iter(&self) -> Iter<K, V> {
        Iter {
            nodes: &self.tree.nodes,
            node: min_in(&self.tree.nodes, self.tree.root),
        }
    }

    /// Gets a lazy forward iterator over the key-value pairs in the
    /// map, with the values being mutable.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map = TreeMap::new();
    /// map.insert("a", 1);
    /// map.insert("c", 3);
    /// map.insert("b", 2);
    ///
    /// // Add 10 until we find "b"
    /// for (key, value) in map.iter_mut() {
    ///     *value += 10;
    ///     if key == &"b" { break }
    /// }
    ///
    /// assert_eq!(map.get(&"a"), Some(&11));
    /// assert_eq!(map.get(&"b"), Some(&12));
    /// assert_eq!(map.get(&"c"), Some(&3));
    /// ```
    pub fn iter_mut(&mut self) -> IterMut<K, V> {
        let start = min_in(&self.tree.nodes, self.tree.root);
        IterMut {
            nodes: self.tree.nodes.as_mut_ptr(),
            node: start,
            marker: PhantomData,
        }
    }

    /// Gets a lazy iterator that consumes the treemap.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    /// let mut map = TreeMap::new();
    /// map.insert("a", 1);
    /// map.insert("c", 3);
    /// map.insert("b", 2);
    ///
    /// // Not possible with a regular `.iter()`
    /// let vec: Vec<(&str, i32)> = map.into_iter().collect();
    /// assert_eq!(vec, vec![("a", 1), ("b", 2), ("c", 3)]);
    /// ```
    pub fn into_iter(self) -> IntoIter<K, V> {
        let TreeMap { tree, .. } = self;
        let start = min_in(&tree.nodes, tree.root);
        IntoIter {
            nodes: tree.nodes,
            node: start,
            remaining: tree.len,
        }
    }

    /// Return the number of elements in the map.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut a = TreeMap::new();
    /// assert_eq!(a.len(), 0);
    /// a.insert(1, "a");
    /// assert_eq!(a.len(), 1);
    /// ```
    pub fn len(&self) -> usize {
        self.tree.len
    }

    /// Return true if the map contains no elements.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut a = TreeMap::new();
    /// assert!(a.is_empty());
    /// a.insert(1, "a");
    /// assert!(!a.is_empty());
    /// ```
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Clears the map, removing all values. The arena is reset around its
    /// sentinel slot, which is reused rather than rebuilt.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut a = TreeMap::new();
    /// a.insert(1, "a");
    /// a.clear();
    /// assert!(a.is_empty());
    /// ```
    pub fn clear(&mut self) {
        self.tree.clear();
    }

    /// Returns a reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.get(&1), Some(&"a"));
    /// assert_eq!(map.get(&2), None);
    /// ```
    #[inline]
    pub fn get<Q: ?Sized>(&self, key: &Q) -> Option<&V>
        where C: Compare<Q, K>
    {
        let x = self.tree.find_node(key);
        if x == NIL {
            None
        } else {
            Some(self.tree.value(x))
        }
    }

    /// Returns true if the map contains a value for the specified key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.contains_key(&1), true);
    /// assert_eq!(map.contains_key(&2), false);
    /// ```
    #[inline]
    pub fn contains_key<Q: ?Sized>(&self, key: &Q) -> bool
        where C: Compare<Q, K>
    {
        self.get(key).is_some()
    }

    /// Returns the number of elements with the given key, which is either 0
    /// or 1 since the map does not allow duplicates. Two keys count as
    /// equivalent when neither orders before the other.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.count(&1), 1);
    /// assert_eq!(map.count(&2), 0);
    /// ```
    #[inline]
    pub fn count<Q: ?Sized>(&self, key: &Q) -> usize
        where C: Compare<Q, K>
    {
        if self.contains_key(key) {
            1
        } else {
            0
        }
    }

    /// Returns a mutable reference to the value corresponding to the key.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// match map.get_mut(&1) {
    ///     Some(x) => *x = "b",
    ///     None => (),
    /// }
    /// assert_eq!(map[&1], "b");
    /// ```
    #[inline]
    pub fn get_mut<Q: ?Sized>(&mut self, key: &Q) -> Option<&mut V>
        where C: Compare<Q, K>
    {
        let x = self.tree.find_node(key);
        if x == NIL {
            None
        } else {
            Some(self.tree.value_mut(x))
        }
    }

    /// Returns a reference to the value corresponding to the key, or
    /// [`Error::KeyNotFound`] if no equivalent key exists. The map is left
    /// unchanged either way.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::{Error, TreeMap};
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.at(&1), Ok(&"a"));
    /// assert_eq!(map.at(&2), Err(Error::KeyNotFound));
    /// ```
    #[inline]
    pub fn at<Q: ?Sized>(&self, key: &Q) -> Result<&V>
        where C: Compare<Q, K>
    {
        self.get(key).ok_or(Error::KeyNotFound)
    }

    /// Returns a mutable reference to the value corresponding to the key, or
    /// [`Error::KeyNotFound`] if no equivalent key exists. Unlike
    /// [`or_default`](TreeMap::or_default), a miss never inserts.
    #[inline]
    pub fn at_mut<Q: ?Sized>(&mut self, key: &Q) -> Result<&mut V>
        where C: Compare<Q, K>
    {
        self.get_mut(key).ok_or(Error::KeyNotFound)
    }

    /// Inserts a key-value pair into the map if no equivalent key is present.
    /// Returns the position of the key together with `true` if the pair was
    /// inserted, or the position of the already-present key together with
    /// `false`, in which case the map is left untouched and the given value
    /// is dropped.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// let (_, inserted) = map.insert(37, "a");
    /// assert!(inserted);
    ///
    /// let (pos, inserted) = map.insert(37, "b");
    /// assert!(!inserted);
    /// assert_eq!(map.entry(pos), Ok((&37, &"a")));
    /// assert_eq!(map.len(), 1);
    /// ```
    pub fn insert(&mut self, key: K, value: V) -> (Cursor, bool) {
        let x = self.tree.find_node(&key);
        if x != NIL {
            return (self.cursor(x), false);
        }
        let n = self.tree.ins(key, value);
        (self.cursor(n), true)
    }

    /// Removes a key from the map, returning the value at the key if the key
    /// was previously in the map.
    ///
    /// The key may be any borrowed form of the map's key type, but the ordering
    /// on the borrowed form *must* match the ordering on the key type.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.remove(&1), Some("a"));
    /// assert_eq!(map.remove(&1), None);
    /// ```
    pub fn remove<Q: ?Sized>(&mut self, key: &Q) -> Option<V>
        where C: Compare<Q, K>
    {
        let x = self.tree.find_node(key);
        if x == NIL {
            return None;
        }
        let (_, v) = self.tree.remove_at(x);
        Some(v)
    }

    /// If a value for `key` does not exist, create one by callling `default`.
    /// Returns a mut reference to the new or existing value.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut count: TreeMap<&str, usize> = TreeMap::new();
    ///
    /// // count the number of occurrences of letters in the vec
    /// for x in vec!["a","b","a","c","a","b"] {
    ///     *count.get_or_insert(x, || 0) += 1;
    /// }
    /// assert_eq!(count[&"a"], 3);
    /// ```
    pub fn get_or_insert<F>(&mut self, key: K, default: F) -> &mut V
        where F: FnOnce() -> V
    {
        let found = self.tree.find_node(&key);
        let x = if found == NIL {
            self.tree.ins(key, default())
        } else {
            found
        };
        self.tree.value_mut(x)
    }

    /// Returns a mutable reference to the value for `key`, inserting a
    /// default-constructed value first when the key is absent. The checked
    /// counterpart that refuses to insert is [`at`](TreeMap::at); the
    /// asymmetry is deliberate.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map: TreeMap<&str, u32> = TreeMap::new();
    /// *map.or_default("a") += 7;
    /// *map.or_default("a") += 1;
    /// assert_eq!(map[&"a"], 8);
    /// ```
    pub fn or_default(&mut self, key: K) -> &mut V
        where V: Default
    {
        self.get_or_insert(key, V::default)
    }

    /// Returns the value for which `f(key)` returns `Equal`. `f` is invoked
    /// with current key and guides tree navigation. That means `f` should
    /// be aware of natural ordering of the tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// fn get_headers() -> TreeMap<&'static str, &'static str> {
    ///     let mut result = TreeMap::new();
    ///     result.insert("Content-Type", "application/xml");
    ///     result.insert("User-Agent", "Curl-Rust/0.1");
    ///     result
    /// }
    ///
    /// let headers = get_headers();
    /// let ua_key = "User-Agent";
    /// let ua = headers.find_with(|&k| {
    ///    ua_key.cmp(k)
    /// });
    ///
    /// assert_eq!(*ua.unwrap(), "Curl-Rust/0.1");
    /// ```
    #[inline]
    pub fn find_with<F>(&self, mut f: F) -> Option<&V>
        where F: FnMut(&K) -> Ordering
    {
        let mut x = self.tree.root;
        while x != NIL {
            match f(self.tree.key(x)) {
                Less => x = self.tree.nodes[x].children[0],
                Greater => x = self.tree.nodes[x].children[1],
                Equal => return Some(self.tree.value(x)),
            }
        }
        None
    }

    /// Returns the value for which `f(key)` returns `Equal`. `f` is invoked
    /// with current key and guides tree navigation. That means `f` should
    /// be aware of natural ordering of the tree.
    ///
    /// # Examples
    ///
    /// ```rust
    /// let mut t = arena_collections::TreeMap::new();
    /// t.insert("Content-Type", "application/xml");
    /// t.insert("User-Agent", "Curl-Rust/0.1");
    ///
    /// let new_ua = "Safari/156.0";
    /// match t.find_with_mut(|&k| "User-Agent".cmp(k)) {
    ///    Some(x) => *x = new_ua,
    ///    None => panic!(),
    /// }
    ///
    /// assert_eq!(t.get(&"User-Agent"), Some(&new_ua));
    /// ```
    #[inline]
    pub fn find_with_mut<F>(&mut self, mut f: F) -> Option<&mut V>
        where F: FnMut(&K) -> Ordering
    {
        let mut x = self.tree.root;
        while x != NIL {
            match f(self.tree.key(x)) {
                Less => x = self.tree.nodes[x].children[0],
                Greater => x = self.tree.nodes[x].children[1],
                Equal => break,
            }
        }
        if x == NIL {
            None
        } else {
            Some(self.tree.value_mut(x))
        }
    }
}

// Cursor operations.

impl<K, V, C> TreeMap<K, V, C>
    where C: Compare<K>
{
    #[inline]
    fn cursor(&self, node: usize) -> Cursor {
        Cursor {
            node,
            tag: self.tag,
        }
    }

    /// Checks that a cursor belongs to this map.
    fn check(&self, pos: Cursor) -> Result<usize> {
        if pos.tag != self.tag {
            return Err(Error::InvalidIterator);
        }
        Ok(pos.node)
    }

    /// Checks that a cursor belongs to this map and sits on a live element
    /// (not the end position, not a slot vacated by an earlier erase).
    fn check_element(&self, pos: Cursor) -> Result<usize> {
        let x = self.check(pos)?;
        let live = x != NIL
            && self.tree.nodes.get(x).map_or(false, |n| n.entry.is_some());
        if !live {
            return Err(Error::InvalidIterator);
        }
        Ok(x)
    }

    /// Returns the cursor at the smallest key, or [`end`](TreeMap::end) when
    /// the map is empty.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(2, "b");
    /// map.insert(1, "a");
    ///
    /// let mut pos = map.begin();
    /// assert_eq!(map.entry(pos), Ok((&1, &"a")));
    /// pos = map.next(pos).unwrap();
    /// assert_eq!(map.entry(pos), Ok((&2, &"b")));
    /// pos = map.next(pos).unwrap();
    /// assert_eq!(pos, map.end());
    /// ```
    pub fn begin(&self) -> Cursor {
        self.cursor(min_in(&self.tree.nodes, self.tree.root))
    }

    /// Returns the past-the-end cursor. It compares equal to the result of a
    /// failed [`find`](TreeMap::find) and never dereferences.
    pub fn end(&self) -> Cursor {
        self.cursor(NIL)
    }

    /// Returns the position of the given key, or [`end`](TreeMap::end) if no
    /// equivalent key exists.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// assert_eq!(map.entry(map.find(&1)), Ok((&1, &"a")));
    /// assert_eq!(map.find(&2), map.end());
    /// ```
    pub fn find<Q: ?Sized>(&self, key: &Q) -> Cursor
        where C: Compare<Q, K>
    {
        self.cursor(self.tree.find_node(key))
    }

    /// Moves a cursor to the next element in key order; stepping off the
    /// largest element yields [`end`](TreeMap::end). Advancing the end
    /// cursor, a foreign cursor or an erased position fails with
    /// [`Error::InvalidIterator`].
    pub fn next(&self, pos: Cursor) -> Result<Cursor> {
        let x = self.check_element(pos)?;
        Ok(self.cursor(self.tree.successor(x)))
    }

    /// Moves a cursor to the previous element in key order; retreating from
    /// [`end`](TreeMap::end) yields the largest element. Retreating from the
    /// first element, or from `end` on an empty map, fails with
    /// [`Error::InvalidIterator`].
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let last = map.prev(map.end()).unwrap();
    /// assert_eq!(map.entry(last), Ok((&2, &"b")));
    /// assert!(map.prev(map.begin()).is_err());
    /// ```
    pub fn prev(&self, pos: Cursor) -> Result<Cursor> {
        let x = self.check(pos)?;
        if x == NIL {
            let m = self.tree.max_node();
            if m == NIL {
                return Err(Error::InvalidIterator);
            }
            return Ok(self.cursor(m));
        }
        let x = self.check_element(pos)?;
        let p = self.tree.predecessor(x);
        if p == NIL {
            return Err(Error::InvalidIterator);
        }
        Ok(self.cursor(p))
    }

    /// Dereferences a cursor into the key and value it points at.
    pub fn entry(&self, pos: Cursor) -> Result<(&K, &V)> {
        let x = self.check_element(pos)?;
        Ok(self.tree.pair(x))
    }

    /// Dereferences a cursor into the key and a mutable reference to the
    /// value. Keys are never handed out mutably; reordering a live node
    /// would corrupt the search structure.
    pub fn entry_mut(&mut self, pos: Cursor) -> Result<(&K, &mut V)> {
        let x = self.check_element(pos)?;
        Ok(self.tree.pair_mut(x))
    }

    /// Erases the element a cursor points at. Fails with
    /// [`Error::InvalidIterator`] when the cursor belongs to another map, is
    /// the end position, or points at an already-erased slot; the map is
    /// unchanged on failure. Cursors at other elements stay valid.
    ///
    /// # Examples
    ///
    /// ```rust
    /// use arena_collections::TreeMap;
    ///
    /// let mut map = TreeMap::new();
    /// map.insert(1, "a");
    /// map.insert(2, "b");
    ///
    /// let pos = map.find(&1);
    /// map.erase(pos).unwrap();
    /// assert_eq!(map.len(), 1);
    /// assert!(map.erase(pos).is_err());
    /// assert!(map.erase(map.end()).is_err());
    /// ```
    pub fn erase(&mut self, pos: Cursor) -> Result<()> {
        let x = self.check_element(pos)?;
        self.tree.remove_at(x);
        Ok(())
    }
}

// The engine. Structural operations need no comparator and live in an
// unbounded impl so the tests can audit any instantiation.

impl<K, V, C> Tree<K, V, C> {
    fn new(cmp: C) -> Tree<K, V, C> {
        Tree {
            nodes: vec![Node {
                parent: NIL,
                children: [NIL, NIL],
                color: Color::Black,
                entry: None,
            }],
            root: NIL,
            free: NIL,
            len: 0,
            cmp,
        }
    }

    fn clear(&mut self) {
        self.nodes.truncate(1);
        self.nodes[NIL].parent = NIL;
        self.nodes[NIL].children = [NIL, NIL];
        self.nodes[NIL].color = Color::Black;
        self.root = NIL;
        self.free = NIL;
        self.len = 0;
    }

    #[inline]
    fn key(&self, x: usize) -> &K {
        &self.nodes[x].entry.as_ref().expect("sentinel dereferenced").0
    }

    #[inline]
    fn value(&self, x: usize) -> &V {
        &self.nodes[x].entry.as_ref().expect("sentinel dereferenced").1
    }

    #[inline]
    fn value_mut(&mut self, x: usize) -> &mut V {
        &mut self.nodes[x].entry.as_mut().expect("sentinel dereferenced").1
    }

    #[inline]
    fn pair(&self, x: usize) -> (&K, &V) {
        let e = self.nodes[x].entry.as_ref().expect("sentinel dereferenced");
        (&e.0, &e.1)
    }

    #[inline]
    fn pair_mut(&mut self, x: usize) -> (&K, &mut V) {
        let e = self.nodes[x].entry.as_mut().expect("sentinel dereferenced");
        (&e.0, &mut e.1)
    }

    #[inline]
    fn color(&self, x: usize) -> Color {
        self.nodes[x].color
    }

    /// Which side of its parent `x` hangs off: 0 for left, 1 for right.
    /// Meaningless for the root; callers rule that case out first.
    #[inline]
    fn which(&self, x: usize) -> usize {
        (self.nodes[self.nodes[x].parent].children[1] == x) as usize
    }

    /// Takes a slot off the free list, or grows the arena by one.
    fn alloc(&mut self, key: K, value: V) -> usize {
        let node = Node {
            parent: NIL,
            children: [NIL, NIL],
            color: Color::Red,
            entry: Some((key, value)),
        };
        if self.free != NIL {
            let slot = self.free;
            self.free = self.nodes[slot].parent;
            self.nodes[slot] = node;
            slot
        } else {
            self.nodes.push(node);
            self.nodes.len() - 1
        }
    }

    /// Vacates a slot and chains it into the free list through its parent
    /// field. The slot index may be handed out again by a later insertion.
    fn release(&mut self, x: usize) -> Option<(K, V)> {
        let entry = self.nodes[x].entry.take();
        self.nodes[x].children = [NIL, NIL];
        self.nodes[x].parent = self.free;
        self.free = x;
        entry
    }

    fn max_node(&self) -> usize {
        let mut x = self.root;
        while self.nodes[x].children[1] != NIL {
            x = self.nodes[x].children[1];
        }
        x
    }

    fn min_of(&self, mut x: usize) -> usize {
        while self.nodes[x].children[0] != NIL {
            x = self.nodes[x].children[0];
        }
        x
    }

    fn successor(&self, x: usize) -> usize {
        successor_in(&self.nodes, x)
    }

    fn predecessor(&self, x: usize) -> usize {
        if self.nodes[x].children[0] != NIL {
            let mut m = self.nodes[x].children[0];
            while self.nodes[m].children[1] != NIL {
                m = self.nodes[m].children[1];
            }
            return m;
        }
        let mut x = x;
        loop {
            let p = self.nodes[x].parent;
            if p == NIL {
                return NIL;
            }
            if self.nodes[p].children[1] == x {
                return p;
            }
            x = p;
        }
    }

    /// Rotates `x` down in direction `p`, lifting its child on the opposite
    /// side into its place. Preserves the in-order sequence.
    fn rotate(&mut self, x: usize, p: usize) {
        let s1 = self.nodes[x].children[1 - p];
        let xp = self.nodes[x].parent;
        if xp == NIL {
            self.root = s1;
        } else {
            let s = self.which(x);
            self.nodes[xp].children[s] = s1;
        }
        self.nodes[s1].parent = xp;
        let t = self.nodes[s1].children[p];
        self.nodes[x].children[1 - p] = t;
        if t != NIL {
            self.nodes[t].parent = x;
        }
        self.nodes[s1].children[p] = x;
        self.nodes[x].parent = s1;
    }

    /// Exchanges the structural positions of two nodes: links and colors
    /// move, the entries stay in their slots. Slot indices are element
    /// identity, so cursors follow their elements through the exchange.
    ///
    /// The parent/child adjacency cases must be handled apart from the
    /// generic disjoint exchange; blindly swapping the link fields of
    /// adjacent nodes would leave a node naming itself as its own parent.
    fn swap_nodes(&mut self, x: usize, y: usize) {
        let xp = self.nodes[x].parent;
        let yp = self.nodes[y].parent;
        if xp != NIL && xp != y {
            let s = self.which(x);
            self.nodes[xp].children[s] = y;
        }
        if yp != NIL && yp != x {
            let s = self.which(y);
            self.nodes[yp].children[s] = x;
        }

        let [xl, xr] = self.nodes[x].children;
        if xl != NIL && xl != y {
            self.nodes[xl].parent = y;
        }
        if xr != NIL && xr != y {
            self.nodes[xr].parent = y;
        }
        let [yl, yr] = self.nodes[y].children;
        if yl != NIL && yl != x {
            self.nodes[yl].parent = x;
        }
        if yr != NIL && yr != x {
            self.nodes[yr].parent = x;
        }

        let x_parent = self.nodes[x].parent;
        let y_parent = self.nodes[y].parent;
        if x_parent != y && y_parent != x {
            let xc = self.nodes[x].children;
            let yc = self.nodes[y].children;
            self.nodes[x].children = yc;
            self.nodes[y].children = xc;
            self.nodes[x].parent = y_parent;
            self.nodes[y].parent = x_parent;
        } else if x_parent == y {
            let p = self.which(x);
            self.nodes[y].children[p] = self.nodes[x].children[p];
            self.nodes[x].children[p] = y;
            let a = self.nodes[x].children[1 - p];
            let b = self.nodes[y].children[1 - p];
            self.nodes[x].children[1 - p] = b;
            self.nodes[y].children[1 - p] = a;
            self.nodes[x].parent = self.nodes[y].parent;
            self.nodes[y].parent = x;
        } else {
            let p = self.which(y);
            self.nodes[x].children[p] = self.nodes[y].children[p];
            self.nodes[y].children[p] = x;
            let a = self.nodes[x].children[1 - p];
            let b = self.nodes[y].children[1 - p];
            self.nodes[x].children[1 - p] = b;
            self.nodes[y].children[1 - p] = a;
            self.nodes[y].parent = self.nodes[x].parent;
            self.nodes[x].parent = y;
        }

        let cx = self.nodes[x].color;
        self.nodes[x].color = self.nodes[y].color;
        self.nodes[y].color = cx;

        if self.root == x {
            self.root = y;
        } else if self.root == y {
            self.root = x;
        }
    }

    /// Restores the coloring invariants after hanging a fresh red node at a
    /// leaf position. Walks up while the parent is red: a red uncle means
    /// recolor and continue from the grandparent; a black uncle is resolved
    /// with one or two rotations around the grandparent, ending the walk.
    fn insert_fixup(&mut self, mut x: usize) {
        while self.color(self.nodes[x].parent) == Color::Red {
            let f = self.nodes[x].parent;
            let gf = self.nodes[f].parent;
            let p = 1 - self.which(f);
            let unc = self.nodes[gf].children[p];
            if self.color(unc) == Color::Red {
                self.nodes[f].color = Color::Black;
                self.nodes[unc].color = Color::Black;
                self.nodes[gf].color = Color::Red;
                x = gf;
            } else if x == self.nodes[f].children[p] {
                x = f;
                self.rotate(x, 1 - p);
            } else {
                self.nodes[gf].color = Color::Red;
                self.nodes[f].color = Color::Black;
                self.rotate(gf, p);
            }
        }
        let r = self.root;
        self.nodes[r].color = Color::Black;
    }

    /// Restores the black-height after splicing out a black node, starting
    /// from the child that took its place (possibly the sentinel, whose
    /// parent link the splice set up for exactly this walk). A red sibling
    /// is rotated black; a black sibling with black children bubbles the
    /// deficit upward; a black sibling with a red child resolves with one or
    /// two rotations and ends the walk.
    fn delete_fixup(&mut self, mut x: usize) {
        while x != self.root && self.color(x) == Color::Black {
            let p = 1 - self.which(x);
            let f = self.nodes[x].parent;
            let mut sib = self.nodes[f].children[p];
            if self.color(sib) == Color::Red {
                self.nodes[sib].color = Color::Black;
                self.nodes[f].color = Color::Red;
                self.rotate(f, 1 - p);
            } else if self.color(self.nodes[sib].children[0]) == Color::Black
                && self.color(self.nodes[sib].children[1]) == Color::Black
            {
                self.nodes[sib].color = Color::Red;
                x = f;
            } else {
                if self.color(self.nodes[sib].children[p]) == Color::Black {
                    self.nodes[sib].color = Color::Red;
                    let near = self.nodes[sib].children[1 - p];
                    self.nodes[near].color = Color::Black;
                    self.rotate(sib, p);
                    sib = self.nodes[f].children[p];
                }
                self.nodes[sib].color = self.nodes[f].color;
                self.nodes[f].color = Color::Black;
                let far = self.nodes[sib].children[p];
                self.nodes[far].color = Color::Black;
                self.rotate(f, 1 - p);
                break;
            }
        }
        self.nodes[x].color = Color::Black;
    }

    /// Unlinks the node at `x` and returns its entry. A node with two real
    /// children first trades structural positions with its in-order
    /// successor (which has no left child), so the position actually spliced
    /// out has at most one child; that child is linked to the parent and the
    /// fix-up runs from it when a black node was removed.
    fn remove_at(&mut self, x: usize) -> (K, V) {
        let mut ex = x;
        if self.nodes[x].children[0] != NIL && self.nodes[x].children[1] != NIL {
            ex = self.min_of(self.nodes[x].children[1]);
        }
        let g = if self.nodes[ex].children[0] == NIL {
            self.nodes[ex].children[1]
        } else {
            self.nodes[ex].children[0]
        };
        if x != ex {
            self.swap_nodes(x, ex);
        }
        // Slot x now holds the position being spliced out. The sentinel's
        // parent link is set even when g is the sentinel; delete_fixup walks
        // up through it.
        let xp = self.nodes[x].parent;
        self.nodes[g].parent = xp;
        if xp == NIL {
            self.root = g;
        } else {
            let s = self.which(x);
            self.nodes[xp].children[s] = g;
        }
        if self.nodes[x].color == Color::Black {
            self.delete_fixup(g);
        }
        self.len -= 1;
        self.release(x).expect("removed a node without an entry")
    }
}

impl<K, V, C> Tree<K, V, C>
    where C: Compare<K>
{
    /// Standard search descent. Returns NIL when no equivalent key exists;
    /// never mutates.
    fn find_node<Q: ?Sized>(&self, key: &Q) -> usize
        where C: Compare<Q, K>
    {
        let mut x = self.root;
        while x != NIL {
            match self.cmp.compare(key, self.key(x)) {
                Less => x = self.nodes[x].children[0],
                Greater => x = self.nodes[x].children[1],
                Equal => break,
            }
        }
        x
    }

    /// Attaches a new red node at the leaf position for `key` and
    /// rebalances. The caller guarantees no equivalent key is present.
    fn ins(&mut self, key: K, value: V) -> usize {
        let mut x = self.root;
        let mut f = NIL;
        while x != NIL {
            f = x;
            let dir = (self.cmp.compare(self.key(x), &key) == Less) as usize;
            x = self.nodes[x].children[dir];
        }
        let n = self.alloc(key, value);
        if f != NIL {
            let dir = (self.cmp.compare(self.key(f), self.key(n)) == Less) as usize;
            self.nodes[f].children[dir] = n;
        } else {
            self.root = n;
        }
        self.nodes[n].parent = f;
        self.len += 1;
        self.insert_fixup(n);
        n
    }
}

/// Smallest index in the subtree under `x`, or NIL for an empty subtree.
fn min_in<K, V>(nodes: &[Node<K, V>], mut x: usize) -> usize {
    while nodes[x].children[0] != NIL {
        x = nodes[x].children[0];
    }
    x
}

fn successor_in<K, V>(nodes: &[Node<K, V>], x: usize) -> usize {
    unsafe { successor_from(nodes.as_ptr(), x) }
}

/// In-order successor, reading the links through raw pointers so the mutable
/// iterator can advance while references to previously yielded values are
/// still live. Only the `parent`/`children` fields are read, and only of
/// nodes reachable from a live tree; the entries stay untouched.
unsafe fn successor_from<K, V>(nodes: *const Node<K, V>, mut x: usize) -> usize {
    let right = ptr::addr_of!((*nodes.add(x)).children).read()[1];
    if right != NIL {
        let mut m = right;
        loop {
            let l = ptr::addr_of!((*nodes.add(m)).children).read()[0];
            if l == NIL {
                return m;
            }
            m = l;
        }
    }
    loop {
        let p = ptr::addr_of!((*nodes.add(x)).parent).read();
        if p == NIL {
            return NIL;
        }
        if ptr::addr_of!((*nodes.add(p)).children).read()[1] != x {
            return p;
        }
        x = p;
    }
}

/// Lazy forward iterator over a map
pub struct Iter<'a, K, V> {
    nodes: &'a [Node<K, V>],
    node: usize,
}

/// Lazy forward iterator over a map that allows for the mutation of
/// the values. Holds a raw pointer into the arena: the borrow checker
/// cannot see that each element is yielded at most once and that only
/// values are ever handed out mutably, so those two facts are maintained
/// here by hand.
pub struct IterMut<'a, K, V> {
    nodes: *mut Node<K, V>,
    node: usize,
    marker: PhantomData<&'a mut [Node<K, V>]>,
}

/// TreeMap keys iterator.
pub struct Keys<'a, K, V>(iter::Map<Iter<'a, K, V>, fn((&'a K, &'a V)) -> &'a K>);

/// TreeMap values iterator.
pub struct Values<'a, K, V>(iter::Map<Iter<'a, K, V>, fn((&'a K, &'a V)) -> &'a V>);

/// TreeMap mutable values iterator.
pub struct ValuesMut<'a, K, V>(iter::Map<IterMut<'a, K, V>, fn((&'a K, &'a mut V)) -> &'a mut V>);

impl<'a, K, V> Iterator for Iter<'a, K, V> {
    type Item = (&'a K, &'a V);

    fn next(&mut self) -> Option<(&'a K, &'a V)> {
        if self.node == NIL {
            return None;
        }
        let cur = self.node;
        self.node = successor_in(self.nodes, cur);
        let e = self.nodes[cur].entry.as_ref().expect("iterator on vacant slot");
        Some((&e.0, &e.1))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

impl<'a, K, V> Iterator for IterMut<'a, K, V> {
    type Item = (&'a K, &'a mut V);

    fn next(&mut self) -> Option<(&'a K, &'a mut V)> {
        if self.node == NIL {
            return None;
        }
        let cur = self.node;
        self.node = unsafe { successor_from(self.nodes as *const Node<K, V>, cur) };
        let entry: &'a mut Option<(K, V)> =
            unsafe { &mut *ptr::addr_of_mut!((*self.nodes.add(cur)).entry) };
        let e = entry.as_mut().expect("iterator on vacant slot");
        Some((&e.0, &mut e.1))
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (0, None)
    }
}

/// Lazy forward iterator over a map that consumes the map while iterating.
pub struct IntoIter<K, V> {
    nodes: Vec<Node<K, V>>,
    node: usize,
    remaining: usize,
}

impl<K, V> Iterator for IntoIter<K, V> {
    type Item = (K, V);

    #[inline]
    fn next(&mut self) -> Option<(K, V)> {
        if self.node == NIL {
            return None;
        }
        let cur = self.node;
        // Advance first; taking the entry leaves the links intact.
        self.node = successor_in(&self.nodes, cur);
        self.remaining -= 1;
        self.nodes[cur].entry.take()
    }

    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        (self.remaining, Some(self.remaining))
    }
}

impl<'a, K, V> Iterator for Keys<'a, K, V> {
    type Item = &'a K;
    #[inline]
    fn next(&mut self) -> Option<&'a K> {
        self.0.next()
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a, K, V> Iterator for Values<'a, K, V> {
    type Item = &'a V;
    #[inline]
    fn next(&mut self) -> Option<&'a V> {
        self.0.next()
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<'a, K, V> Iterator for ValuesMut<'a, K, V> {
    type Item = &'a mut V;
    #[inline]
    fn next(&mut self) -> Option<&'a mut V> {
        self.0.next()
    }
    #[inline]
    fn size_hint(&self) -> (usize, Option<usize>) {
        self.0.size_hint()
    }
}

impl<K, V, C> iter::FromIterator<(K, V)> for TreeMap<K, V, C>
    where C: Compare<K> + Default
{
    fn from_iter<T: IntoIterator<Item = (K, V)>>(iter: T) -> TreeMap<K, V, C> {
        let mut map: TreeMap<K, V, C> = Default::default();
        map.extend(iter);
        map
    }
}

impl<K, V, C> Extend<(K, V)> for TreeMap<K, V, C>
    where C: Compare<K>
{
    /// Inserts each pair in turn; since insertion never replaces, the first
    /// occurrence of a key wins.
    #[inline]
    fn extend<T: IntoIterator<Item = (K, V)>>(&mut self, iter: T) {
        for (k, v) in iter {
            self.insert(k, v);
        }
    }
}

impl<K: Hash, V: Hash, C> Hash for TreeMap<K, V, C>
    where C: Compare<K>
{
    fn hash<H: Hasher>(&self, state: &mut H) {
        for elt in self.iter() {
            elt.hash(state);
        }
    }
}

impl<'a, K, V, C> IntoIterator for &'a TreeMap<K, V, C>
    where C: Compare<K>
{
    type Item = (&'a K, &'a V);
    type IntoIter = Iter<'a, K, V>;
    fn into_iter(self) -> Iter<'a, K, V> {
        self.iter()
    }
}

impl<'a, K, V, C> IntoIterator for &'a mut TreeMap<K, V, C>
    where C: Compare<K>
{
    type Item = (&'a K, &'a mut V);
    type IntoIter = IterMut<'a, K, V>;
    fn into_iter(self) -> IterMut<'a, K, V> {
        self.iter_mut()
    }
}

impl<K, V, C> IntoIterator for TreeMap<K, V, C>
    where C: Compare<K>
{
    type Item = (K, V);
    type IntoIter = IntoIter<K, V>;
    fn into_iter(self) -> IntoIter<K, V> {
        self.into_iter()
    }
}

#[cfg(feature = "ordered_iter")]
impl<'a, K, V> ordered_iter::OrderedMapIterator for Iter<'a, K, V> {
    type Key = &'a K;
    type Val = &'a V;
}

#[cfg(test)]
mod test_treemap {
    use rand::{self, Rng};

    use super::{Color, Tree, TreeMap, NIL};
    use crate::error::Error;

    #[test]
    fn find_empty() {
        let m: TreeMap<i32, i32> = TreeMap::new();
        assert!(m.get(&5) == None);
    }

    #[test]
    fn find_not_found() {
        let mut m = TreeMap::new();
        assert!(m.insert(1, 2).1);
        assert!(m.insert(5, 3).1);
        assert!(m.insert(9, 3).1);
        assert_eq!(m.get(&2), None);
    }

    #[test]
    fn find_with_empty() {
        let m: TreeMap<&'static str, i32> = TreeMap::new();
        assert!(m.find_with(|&k| "test".cmp(k)) == None);
    }

    #[test]
    fn find_with_not_found() {
        let mut m = TreeMap::new();
        assert!(m.insert("test1", 2).1);
        assert!(m.insert("test2", 3).1);
        assert!(m.insert("test3", 3).1);
        assert_eq!(m.find_with(|&k| "test4".cmp(k)), None);
    }

    #[test]
    fn find_with_found() {
        let mut m = TreeMap::new();
        assert!(m.insert("test1", 2).1);
        assert!(m.insert("test2", 3).1);
        assert!(m.insert("test3", 4).1);
        assert_eq!(m.find_with(|&k| "test2".cmp(k)), Some(&3));
    }

    #[test]
    fn test_find_mut() {
        let mut m = TreeMap::new();
        assert!(m.insert(1, 12).1);
        assert!(m.insert(2, 8).1);
        assert!(m.insert(5, 14).1);
        let new = 100;
        match m.get_mut(&5) {
            None => panic!(),
            Some(x) => *x = new,
        }
        assert_eq!(m.get(&5), Some(&new));
    }

    #[test]
    fn test_find_with_mut() {
        let mut m = TreeMap::new();
        assert!(m.insert("t1", 12).1);
        assert!(m.insert("t2", 8).1);
        assert!(m.insert("t5", 14).1);
        let new = 100;

        match m.find_with_mut(|&k| "t5".cmp(k)) {
            None => panic!(),
            Some(x) => *x = new,
        }
        assert_eq!(m.find_with(|&k| "t5".cmp(k)), Some(&new));
    }

    #[test]
    fn insert_duplicate_rejected() {
        let mut m = TreeMap::new();
        assert!(m.insert(5, 2).1);
        assert!(m.insert(2, 9).1);
        let (pos, inserted) = m.insert(2, 11);
        assert!(!inserted);
        assert_eq!(m.entry(pos), Ok((&2, &9)));
        assert_eq!(m.get(&2), Some(&9));
        assert_eq!(m.len(), 2);
        assert_eq!(pos, m.find(&2));
    }

    #[test]
    fn test_get_or_insert() {
        let mut m = TreeMap::new();
        assert_eq!(*m.get_or_insert(5, || 2), 2);
        assert_eq!(*m.get_or_insert(2, || 9), 9);
        assert_eq!(*m.get_or_insert(2, || 7), 9);
        *m.get_or_insert(2, || 7) = 8;
        assert_eq!(*m.get(&2).unwrap(), 8);
    }

    #[test]
    fn test_at_or_default_asymmetry() {
        let mut m: TreeMap<i32, i32> = TreeMap::new();
        // Checked access refuses to insert,
        assert_eq!(m.at(&1), Err(Error::KeyNotFound));
        assert_eq!(m.at_mut(&1), Err(Error::KeyNotFound));
        assert!(m.is_empty());
        // while or_default materializes the entry.
        assert_eq!(*m.or_default(1), 0);
        assert_eq!(m.len(), 1);
        *m.or_default(1) += 5;
        assert_eq!(m.at(&1), Ok(&5));
    }

    #[test]
    fn test_clear() {
        let mut m = TreeMap::new();
        m.clear();
        assert!(m.insert(5, 11).1);
        assert!(m.insert(12, -3).1);
        assert!(m.insert(19, 2).1);
        m.clear();
        assert!(m.get(&5).is_none());
        assert!(m.get(&12).is_none());
        assert!(m.get(&19).is_none());
        assert!(m.is_empty());
        // The map stays usable after clearing.
        assert!(m.insert(5, 1).1);
        assert_eq!(m.get(&5), Some(&1));
    }

    #[test]
    fn u8_map() {
        let mut m = TreeMap::new();

        let k1 = "foo".as_bytes();
        let k2 = "bar".as_bytes();
        let v1 = "baz".as_bytes();
        let v2 = "foobar".as_bytes();

        m.insert(k1.clone(), v1.clone());
        m.insert(k2.clone(), v2.clone());

        assert_eq!(m.get(&k2), Some(&v2));
        assert_eq!(m.get(&k1), Some(&v1));
    }

    fn check_equal<K: PartialEq + Ord, V: PartialEq>(ctrl: &[(K, V)], map: &TreeMap<K, V>) {
        assert_eq!(ctrl.is_empty(), map.is_empty());
        for x in ctrl.iter() {
            let &(ref k, ref v) = x;
            assert!(map.get(k).unwrap() == v)
        }
        for (map_k, map_v) in map.iter() {
            let mut found = false;
            for x in ctrl.iter() {
                let &(ref ctrl_k, ref ctrl_v) = x;
                if *map_k == *ctrl_k {
                    assert!(*map_v == *ctrl_v);
                    found = true;
                    break;
                }
            }
            assert!(found);
        }
    }

    // Walks a subtree checking the search order, the parent back-links and
    // the coloring rules. Returns the black height; both sides must agree.
    fn check_subtree<K: Ord, V, C>(t: &Tree<K, V, C>, x: usize, count: &mut usize) -> usize {
        if x == NIL {
            return 1;
        }
        *count += 1;
        let n = &t.nodes[x];
        if n.color == Color::Red {
            assert_eq!(t.nodes[n.children[0]].color, Color::Black);
            assert_eq!(t.nodes[n.children[1]].color, Color::Black);
        }
        if n.children[0] != NIL {
            assert_eq!(t.nodes[n.children[0]].parent, x);
            assert!(t.key(n.children[0]) < t.key(x));
        }
        if n.children[1] != NIL {
            assert_eq!(t.nodes[n.children[1]].parent, x);
            assert!(t.key(n.children[1]) > t.key(x));
        }
        let lh = check_subtree(t, n.children[0], count);
        let rh = check_subtree(t, n.children[1], count);
        assert_eq!(lh, rh);
        lh + if n.color == Color::Black { 1 } else { 0 }
    }

    fn check_structure<K: Ord, V>(map: &TreeMap<K, V>) {
        let t = &map.tree;
        assert_eq!(t.nodes[NIL].color, Color::Black);
        assert_eq!(t.nodes[NIL].children, [NIL, NIL]);
        if t.root == NIL {
            assert_eq!(t.len, 0);
            return;
        }
        assert_eq!(t.nodes[t.root].color, Color::Black);
        assert_eq!(t.nodes[t.root].parent, NIL);
        let mut count = 0;
        check_subtree(t, t.root, &mut count);
        assert_eq!(count, t.len);
    }

    #[test]
    fn test_rand_int() {
        let mut map: TreeMap<i32, i32> = TreeMap::new();
        let mut ctrl: Vec<(i32, i32)> = vec![];

        check_equal(&ctrl, &map);
        assert!(map.get(&5).is_none());

        let seed: &[_] = &[42];
        let mut rng: rand::IsaacRng = rand::SeedableRng::from_seed(seed);

        for _ in 0..3 {
            for _ in 0..90 {
                let k = rng.gen();
                let v = rng.gen();
                if !ctrl.iter().any(|x| x.0 == k) {
                    assert!(map.insert(k, v).1);
                    ctrl.push((k, v));
                    check_structure(&map);
                    check_equal(&ctrl, &map);
                }
            }

            for _ in 0..30 {
                let r = rng.gen_range(0, ctrl.len());
                let (key, _) = ctrl.remove(r);
                assert!(map.remove(&key).is_some());
                check_structure(&map);
                check_equal(&ctrl, &map);
            }
        }
    }

    #[test]
    fn test_len() {
        let mut m = TreeMap::new();
        assert!(m.insert(3, 6).1);
        assert_eq!(m.len(), 1);
        assert!(m.insert(0, 0).1);
        assert_eq!(m.len(), 2);
        assert!(m.insert(4, 8).1);
        assert_eq!(m.len(), 3);
        assert!(m.remove(&3).is_some());
        assert_eq!(m.len(), 2);
        assert!(!m.remove(&5).is_some());
        assert_eq!(m.len(), 2);
        assert!(m.insert(2, 4).1);
        assert_eq!(m.len(), 3);
        assert!(m.insert(1, 2).1);
        assert_eq!(m.len(), 4);
        assert_eq!(m.len(), m.iter().count());
    }

    #[test]
    fn test_iterator() {
        let mut m = TreeMap::new();

        assert!(m.insert(3, 6).1);
        assert!(m.insert(0, 0).1);
        assert!(m.insert(4, 8).1);
        assert!(m.insert(2, 4).1);
        assert!(m.insert(1, 2).1);

        let mut n = 0;
        for (k, v) in m.iter() {
            assert_eq!(*k, n);
            assert_eq!(*v, n * 2);
            n += 1;
        }
        assert_eq!(n, 5);
    }

    #[test]
    fn test_mut_iter() {
        let mut m = TreeMap::new();
        for i in 0..10 {
            assert!(m.insert(i, 100 * i).1);
        }

        for (i, (&k, v)) in m.iter_mut().enumerate() {
            *v += k * 10 + i; // 000 + 00 + 0, 100 + 10 + 1, ...
        }

        for (&k, &v) in m.iter() {
            assert_eq!(v, 111 * k);
        }
    }

    #[test]
    fn test_keys() {
        let vec = vec![(1, 'a'), (2, 'b'), (3, 'c')];
        let map: TreeMap<i32, char> = vec.into_iter().collect();
        let keys: Vec<i32> = map.keys().map(|&k| k).collect();
        assert_eq!(keys, vec![1, 2, 3]);
    }

    #[test]
    fn test_values() {
        let vec = vec![(1, 'a'), (2, 'b'), (3, 'c')];
        let map = vec.into_iter().collect::<TreeMap<i32, char>>();
        let values = map.values().map(|&v| v).collect::<Vec<char>>();
        assert_eq!(values, vec!['a', 'b', 'c']);
    }

    #[test]
    fn test_values_mut() {
        let vec = vec![(1, 'a'), (2, 'b'), (3, 'c')];
        let mut map = vec.into_iter().collect::<TreeMap<i32, char>>();
        for ch in map.values_mut() {
            *ch = 'x';
        }
        let values = map.values().map(|&v| v).collect::<Vec<char>>();
        assert_eq!(values, vec!['x', 'x', 'x']);
    }

    #[test]
    fn test_eq() {
        let mut a = TreeMap::new();
        let mut b = TreeMap::new();

        assert!(a == b);
        assert!(a.insert(0, 5).1);
        assert!(a != b);
        assert!(b.insert(0, 4).1);
        assert!(a != b);
        // Inserting an equivalent key changes nothing.
        assert!(!b.insert(0, 5).1);
        assert!(a != b);
        assert_eq!(b.remove(&0), Some(4));
        assert!(b.insert(0, 5).1);
        assert!(a == b);
        assert!(a.insert(5, 19).1);
        assert!(a != b);
        assert!(b.insert(5, 19).1);
        assert!(a == b);
    }

    #[test]
    fn test_lt() {
        let mut a = TreeMap::new();
        let mut b = TreeMap::new();

        assert!(!(a < b) && !(b < a));
        assert!(b.insert(0, 5).1);
        assert!(a < b);
        assert!(a.insert(0, 7).1);
        assert!(!(a < b) && b < a);
        assert!(b.insert(-2, 0).1);
        assert!(b < a);
        assert!(a.insert(-5, 2).1);
        assert!(a < b);
        assert!(a.insert(6, 2).1);
        assert!(a < b && !(b < a));
    }

    #[test]
    fn test_ord() {
        let mut a = TreeMap::new();
        let mut b = TreeMap::new();

        assert!(a <= b && a >= b);
        assert!(a.insert(1, 1).1);
        assert!(a > b && a >= b);
        assert!(b < a && b <= a);
        assert!(b.insert(2, 2).1);
        assert!(b > a && b >= a);
        assert!(a < b && a <= b);
    }

    #[test]
    fn test_debug() {
        let mut map = TreeMap::new();
        let empty: TreeMap<i32, i32> = TreeMap::new();

        map.insert(1, 2);
        map.insert(3, 4);

        assert_eq!(format!("{:?}", map), "{1: 2, 3: 4}");
        assert_eq!(format!("{:?}", empty), "{}");
    }

    #[test]
    fn test_lazy_iterator() {
        let mut m = TreeMap::new();
        let (x1, y1) = (2, 5);
        let (x2, y2) = (9, 12);
        let (x3, y3) = (20, -3);
        let (x4, y4) = (29, 5);
        let (x5, y5) = (103, 3);

        assert!(m.insert(x1, y1).1);
        assert!(m.insert(x2, y2).1);
        assert!(m.insert(x3, y3).1);
        assert!(m.insert(x4, y4).1);
        assert!(m.insert(x5, y5).1);

        let m = m;
        let mut a = m.iter();

        assert_eq!(a.next().unwrap(), (&x1, &y1));
        assert_eq!(a.next().unwrap(), (&x2, &y2));
        assert_eq!(a.next().unwrap(), (&x3, &y3));
        assert_eq!(a.next().unwrap(), (&x4, &y4));
        assert_eq!(a.next().unwrap(), (&x5, &y5));

        assert!(a.next().is_none());

        let mut b = m.iter();

        let expected = [(&x1, &y1), (&x2, &y2), (&x3, &y3), (&x4, &y4), (&x5, &y5)];
        let mut i = 0;

        for x in b.by_ref() {
            assert_eq!(expected[i], x);
            i += 1;

            if i == 2 {
                break;
            }
        }

        for x in b {
            assert_eq!(expected[i], x);
            i += 1;
        }
    }

    #[test]
    fn test_from_iter() {
        let xs = [(1, 1), (2, 2), (3, 3), (4, 4), (5, 5), (6, 6)];

        let map: TreeMap<i32, i32> = xs.iter().map(|&x| x).collect();

        for &(k, v) in xs.iter() {
            assert_eq!(map.get(&k), Some(&v));
        }
    }

    #[test]
    fn test_from_iter_first_wins() {
        let map: TreeMap<i32, char> = vec![(1, 'a'), (1, 'b'), (2, 'c')].into_iter().collect();
        assert_eq!(map.get(&1), Some(&'a'));
        assert_eq!(map.len(), 2);
    }

    #[test]
    fn test_into_iter() {
        let mut m = TreeMap::new();
        for i in 0..10 {
            assert!(m.insert(i, i * 3).1);
        }
        let pairs: Vec<(i32, i32)> = m.into_iter().collect();
        assert_eq!(pairs, (0..10).map(|i| (i, i * 3)).collect::<Vec<_>>());
    }

    #[test]
    fn test_index() {
        let mut map: TreeMap<i32, i32> = TreeMap::new();

        map.insert(1, 2);
        map.insert(2, 1);
        map.insert(3, 4);

        assert_eq!(map[&2], 1);
    }

    #[test]
    #[should_panic]
    fn test_index_nonexistent() {
        let mut map: TreeMap<i32, i32> = TreeMap::new();

        map.insert(1, 2);
        map.insert(2, 1);
        map.insert(3, 4);

        map[&4];
    }

    #[test]
    fn test_comparator_iterator() {
        use compare::{natural, Compare};

        let mut m = TreeMap::with_comparator(natural().rev());

        assert!(m.insert(3, 6).1);
        assert!(m.insert(0, 0).1);
        assert!(m.insert(4, 8).1);
        assert!(m.insert(2, 4).1);
        assert!(m.insert(1, 2).1);

        let mut n = 5;
        for (k, v) in m.iter() {
            n -= 1;
            assert_eq!(*k, n);
            assert_eq!(*v, n * 2);
        }
        assert_eq!(n, 0);
    }

    #[test]
    fn test_comparator_borrowed() {
        use compare::{natural, Compare};

        let mut m = TreeMap::with_comparator(natural().borrowing());

        assert!(m.insert("a".to_string(), 1).1);

        assert!(m.contains_key("a"));
        assert!(m.contains_key(&"a"));
        assert!(m.contains_key(&"a".to_string()));

        assert_eq!(m.get("a"), Some(&1));
        assert_eq!(m.get(&"a"), Some(&1));
        assert_eq!(m.get(&"a".to_string()), Some(&1));

        m["a"] = 2;

        assert_eq!(m["a"], 2);
        assert_eq!(m[&"a".to_string()], 2);

        m[&"a".to_string()] = 3;

        assert_eq!(m.remove("a"), Some(3));
        assert!(m.remove(&"a").is_none());
        assert!(m.remove(&"a".to_string()).is_none());
    }

    #[test]
    fn test_cursor_traversal() {
        let mut m = TreeMap::new();
        for i in 0..7 {
            assert!(m.insert(i * 2, i).1);
        }

        // Forward walk agrees with the iterator.
        let mut pos = m.begin();
        for (k, v) in m.iter() {
            assert_eq!(m.entry(pos), Ok((k, v)));
            pos = m.next(pos).unwrap();
        }
        assert_eq!(pos, m.end());

        // Backward walk from the end position.
        let collected: Vec<(i32, i32)> = m.iter().map(|(&k, &v)| (k, v)).collect();
        let mut pos = m.end();
        for &(k, v) in collected.iter().rev() {
            pos = m.prev(pos).unwrap();
            assert_eq!(m.entry(pos), Ok((&k, &v)));
        }
        assert!(m.prev(pos).is_err());
    }

    #[test]
    fn test_cursor_errors() {
        let mut m = TreeMap::new();
        let empty: TreeMap<i32, i32> = TreeMap::new();
        assert!(m.insert(1, 10).1);
        assert!(m.insert(2, 20).1);

        // The end position neither dereferences nor advances.
        assert_eq!(m.entry(m.end()), Err(Error::InvalidIterator));
        assert_eq!(m.next(m.end()).unwrap_err(), Error::InvalidIterator);
        // Retreating from the first element, or on an empty map.
        assert_eq!(m.prev(m.begin()).unwrap_err(), Error::InvalidIterator);
        assert_eq!(empty.prev(empty.end()).unwrap_err(), Error::InvalidIterator);
        // The end of an empty map is its beginning.
        assert_eq!(empty.begin(), empty.end());

        // Cursors do not transfer between maps.
        let mut other = TreeMap::new();
        assert!(other.insert(1, 10).1);
        let foreign = other.find(&1);
        assert_eq!(m.entry(foreign), Err(Error::InvalidIterator));
        assert_eq!(m.erase(foreign), Err(Error::InvalidIterator));
        assert_eq!(other.len(), 1);
        assert_eq!(m.len(), 2);
    }

    #[test]
    fn test_cursor_stale_after_erase() {
        let mut m = TreeMap::new();
        for i in 0..5 {
            assert!(m.insert(i, i).1);
        }
        let pos = m.find(&3);
        assert!(m.erase(pos).is_ok());
        assert_eq!(m.entry(pos), Err(Error::InvalidIterator));
        assert_eq!(m.erase(pos), Err(Error::InvalidIterator));
        assert_eq!(m.next(pos).unwrap_err(), Error::InvalidIterator);
        assert_eq!(m.len(), 4);
    }

    #[test]
    fn test_entry_mut_through_cursor() {
        let mut m = TreeMap::new();
        assert!(m.insert(1, 10).1);
        let pos = m.find(&1);
        {
            let (k, v) = m.entry_mut(pos).unwrap();
            assert_eq!(*k, 1);
            *v += 5;
        }
        assert_eq!(m.get(&1), Some(&15));
    }

    #[test]
    fn test_erase_two_children() {
        let mut m = TreeMap::new();
        for &k in &[5, 3, 8, 1, 4, 7, 9] {
            assert!(m.insert(k, k * 10).1);
        }
        let values: Vec<i32> = m.values().cloned().collect();
        assert_eq!(values, vec![10, 30, 40, 50, 70, 80, 90]);

        // Key 5 sits mid-tree with two children; cursors at its neighbors
        // must survive the removal.
        let at_four = m.find(&4);
        let at_seven = m.find(&7);
        assert!(m.erase(m.find(&5)).is_ok());
        assert_eq!(m.len(), 6);
        assert_eq!(m.entry(at_four), Ok((&4, &40)));
        assert_eq!(m.entry(at_seven), Ok((&7, &70)));

        let keys: Vec<i32> = m.keys().cloned().collect();
        assert_eq!(keys, vec![1, 3, 4, 7, 8, 9]);
        assert!(keys.windows(2).all(|w| w[0] < w[1]));

        // Walking by successor still covers the whole sequence.
        let mut pos = m.begin();
        let mut walked = vec![];
        while pos != m.end() {
            walked.push(*m.entry(pos).unwrap().0);
            pos = m.next(pos).unwrap();
        }
        assert_eq!(walked, keys);
        check_structure(&m);
    }

    #[test]
    fn test_erase_all_orders() {
        // Erase in several orders, auditing the structure each time.
        let keys = [4, 1, 6, 0, 3, 5, 8, 2, 7, 9];
        for rot in 0..keys.len() {
            let mut m = TreeMap::new();
            for &k in &keys {
                assert!(m.insert(k, k).1);
            }
            check_structure(&m);
            for i in 0..keys.len() {
                let k = keys[(i + rot) % keys.len()];
                assert!(m.erase(m.find(&k)).is_ok());
                check_structure(&m);
                assert_eq!(m.len(), keys.len() - i - 1);
            }
            assert!(m.is_empty());
        }
    }

    #[test]
    fn test_clone_independence() {
        let mut a = TreeMap::new();
        for i in 0..10 {
            assert!(a.insert(i, i * 2).1);
        }
        let mut b = a.clone();

        assert!(a == b);
        assert!(b.remove(&3).is_some());
        assert!(b.insert(42, 0).1);
        assert_eq!(a.get(&3), Some(&6));
        assert!(a.get(&42).is_none());
        assert!(a.remove(&7).is_some());
        assert_eq!(b.get(&7), Some(&14));
        check_structure(&a);
        check_structure(&b);

        // Cursors of the source do not validate against the clone.
        let pos = a.find(&5);
        assert_eq!(b.entry(pos), Err(Error::InvalidIterator));
    }
}
