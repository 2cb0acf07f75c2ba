//! Stream tags: offset-anchored metadata flowing alongside samples
//!
//! A tag is attached by a producer at an absolute item offset on one of its
//! output streams and is observed by every consumer of that stream when its
//! read cursor passes the offset. Keys are interned symbols so equality
//! checks are a single integer compare; values are a small dynamically
//! typed algebra with structural equality.

use std::collections::{HashMap, VecDeque};
use std::fmt;

use parking_lot::Mutex;

/// Interning table shared by every [`Symbol`] in the process.
struct Interner {
    by_name: HashMap<String, u32>,
    names: Vec<String>,
}

impl Interner {
    fn intern(&mut self, name: &str) -> u32 {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = self.names.len() as u32;
        self.names.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        id
    }
}

lazy_static::lazy_static! {
    static ref SYMBOLS: Mutex<Interner> = Mutex::new(Interner {
        by_name: HashMap::new(),
        names: Vec::new(),
    });
}

/// An interned string. Comparison and hashing are O(1); the registry is
/// global and append-only for the life of the process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Symbol(u32);

impl Symbol {
    /// Intern `name`, returning the canonical handle for it.
    pub fn new(name: &str) -> Symbol {
        Symbol(SYMBOLS.lock().intern(name))
    }

    /// Resolve the symbol back to its string form.
    pub fn resolve(&self) -> String {
        SYMBOLS.lock().names[self.0 as usize].clone()
    }
}

impl From<&str> for Symbol {
    fn from(name: &str) -> Self {
        Symbol::new(name)
    }
}

impl fmt::Display for Symbol {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        write!(f, "{}", self.resolve())
    }
}

/// Dynamically typed tag payload.
///
/// Equality is structural; `Real` compares by IEEE equality, which is what
/// tag consumers expect for values they themselves attached.
#[derive(Debug, Clone, PartialEq)]
pub enum TagValue {
    Null,
    Bool(bool),
    Int(i64),
    Real(f64),
    Sym(Symbol),
    Str(String),
    Pair(Box<TagValue>, Box<TagValue>),
    Seq(Vec<TagValue>),
}

impl TagValue {
    /// Construct a pair value.
    pub fn pair(car: TagValue, cdr: TagValue) -> TagValue {
        TagValue::Pair(Box::new(car), Box::new(cdr))
    }
}

impl From<bool> for TagValue {
    fn from(v: bool) -> Self {
        TagValue::Bool(v)
    }
}

impl From<i64> for TagValue {
    fn from(v: i64) -> Self {
        TagValue::Int(v)
    }
}

impl From<f64> for TagValue {
    fn from(v: f64) -> Self {
        TagValue::Real(v)
    }
}

impl From<&str> for TagValue {
    fn from(v: &str) -> Self {
        TagValue::Str(v.to_string())
    }
}

impl From<Symbol> for TagValue {
    fn from(v: Symbol) -> Self {
        TagValue::Sym(v)
    }
}

/// A single tag: absolute item offset on one output stream, plus key,
/// value and the originating block (if known).
#[derive(Debug, Clone, PartialEq)]
pub struct Tag {
    pub offset: u64,
    pub key: Symbol,
    pub value: TagValue,
    pub source: Option<Symbol>,
}

impl Tag {
    pub fn new(offset: u64, key: impl Into<Symbol>, value: impl Into<TagValue>) -> Tag {
        Tag {
            offset,
            key: key.into(),
            value: value.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<Symbol>) -> Tag {
        self.source = Some(source.into());
        self
    }
}

/// Ordered tag collection attached to one output buffer.
///
/// Tags are kept sorted by offset, insertion-stable among equal offsets.
/// Only the producing block appends; consumers query ranges. Tags whose
/// offset every consumer has passed are pruned by the producer.
#[derive(Debug, Default)]
pub struct TagStore {
    tags: VecDeque<Tag>,
}

impl TagStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a tag, keeping offset order. Appends near the tail are the
    /// common case, so the insertion point is searched from the back.
    pub fn append(&mut self, tag: Tag) {
        let mut idx = self.tags.len();
        while idx > 0 && self.tags[idx - 1].offset > tag.offset {
            idx -= 1;
        }
        self.tags.insert(idx, tag);
    }

    /// All tags with `start <= offset < end`, in offset order (insertion
    /// order among equal offsets), optionally restricted to `key`.
    pub fn tags_in_range(&self, start: u64, end: u64, key: Option<Symbol>) -> Vec<Tag> {
        self.tags
            .iter()
            .filter(|t| t.offset >= start && t.offset < end)
            .filter(|t| key.is_none_or(|k| t.key == k))
            .cloned()
            .collect()
    }

    /// Drop tags with offsets below `horizon` (every consumer has read past
    /// them).
    pub fn prune_before(&mut self, horizon: u64) {
        while self.tags.front().is_some_and(|t| t.offset < horizon) {
            self.tags.pop_front();
        }
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn test_symbol_interning() {
        let a = Symbol::new("burst");
        let b = Symbol::new("burst");
        let c = Symbol::new("freq");
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_eq!(a.resolve(), "burst");
    }

    #[test]
    fn test_value_structural_equality() {
        let a = TagValue::pair(TagValue::Int(1), TagValue::Str("x".into()));
        let b = TagValue::pair(TagValue::Int(1), TagValue::Str("x".into()));
        assert_eq!(a, b);
        assert_ne!(a, TagValue::pair(TagValue::Int(2), TagValue::Str("x".into())));

        let seq = TagValue::Seq(vec![TagValue::Bool(true), TagValue::Null]);
        assert_eq!(seq, TagValue::Seq(vec![TagValue::Bool(true), TagValue::Null]));
    }

    #[test]
    fn test_range_query_half_open() {
        let mut store = TagStore::new();
        store.append(Tag::new(5, "a", 1i64));
        store.append(Tag::new(10, "a", 2i64));
        store.append(Tag::new(15, "a", 3i64));

        let tags = store.tags_in_range(5, 15, None);
        assert_eq!(tags.len(), 2);
        assert_eq!(tags[0].offset, 5);
        assert_eq!(tags[1].offset, 10);
    }

    #[test]
    fn test_key_filter() {
        let mut store = TagStore::new();
        store.append(Tag::new(1, "a", 1i64));
        store.append(Tag::new(2, "b", 2i64));
        store.append(Tag::new(3, "a", 3i64));

        let tags = store.tags_in_range(0, 10, Some(Symbol::new("a")));
        assert_eq!(tags.len(), 2);
        assert!(tags.iter().all(|t| t.key == Symbol::new("a")));
    }

    #[test]
    fn test_insertion_order_among_equal_offsets() {
        let mut store = TagStore::new();
        store.append(Tag::new(7, "first", 1i64));
        store.append(Tag::new(7, "second", 2i64));

        let tags = store.tags_in_range(7, 8, None);
        assert_eq!(tags[0].key, Symbol::new("first"));
        assert_eq!(tags[1].key, Symbol::new("second"));
    }

    #[test]
    fn test_prune() {
        let mut store = TagStore::new();
        for off in [2u64, 4, 6, 8] {
            store.append(Tag::new(off, "k", TagValue::Null));
        }
        store.prune_before(5);
        assert_eq!(store.len(), 2);
        assert!(store.tags_in_range(0, 5, None).is_empty());
    }

    proptest! {
        #[test]
        fn tags_in_range_sorted_and_bounded(
            offsets in prop::collection::vec(0u64..1000, 0..50),
            start in 0u64..500,
            span in 0u64..500,
        ) {
            let mut store = TagStore::new();
            for &off in &offsets {
                store.append(Tag::new(off, "k", TagValue::Null));
            }
            let end = start + span;
            let got = store.tags_in_range(start, end, None);
            // Every result in range, sorted by offset.
            prop_assert!(got.iter().all(|t| t.offset >= start && t.offset < end));
            prop_assert!(got.windows(2).all(|w| w[0].offset <= w[1].offset));
            // Count matches a naive filter.
            let expected = offsets.iter().filter(|&&o| o >= start && o < end).count();
            prop_assert_eq!(got.len(), expected);
        }
    }
}
