//! Per-function expression cache.
//!
//! Maps value identities to the shadow expression built for them. The map
//! lives in the arena of one function translation and is dropped with it.

use bumpalo::Bump;
use hashbrown::{DefaultHashBuilder, HashMap};
use std::hash::Hash;

/// Arena-backed mapping from values to their shadows.
pub struct ExpressionCache<'arena, V> {
    map: HashMap<V, V, DefaultHashBuilder, &'arena Bump>,
}

impl<'arena, V: Copy + Eq + Hash> ExpressionCache<'arena, V> {
    pub fn new_in(arena: &'arena Bump) -> Self {
        Self {
            map: HashMap::new_in(arena),
        }
    }

    pub fn get(&self, value: V) -> Option<V> {
        self.map.get(&value).copied()
    }

    /// Record the shadow of `value`. A value is only ever cached once.
    pub fn insert(&mut self, value: V, shadow: V) {
        let previous = self.map.insert(value, shadow);
        debug_assert!(previous.is_none(), "value cached twice");
    }

    pub fn contains(&self, value: V) -> bool {
        self.map.contains_key(&value)
    }

    pub fn len(&self) -> usize {
        self.map.len()
    }

    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lookup_is_stable() {
        let arena = Bump::new();
        let mut cache = ExpressionCache::new_in(&arena);
        assert!(cache.is_empty());

        cache.insert(1u32, 100u32);
        cache.insert(2, 200);

        assert_eq!(cache.get(1), Some(100));
        assert_eq!(cache.get(1), Some(100));
        assert_eq!(cache.get(3), None);
        assert!(cache.contains(2));
        assert_eq!(cache.len(), 2);
    }

    #[test]
    #[should_panic(expected = "value cached twice")]
    #[cfg(debug_assertions)]
    fn test_double_insert_is_a_bug() {
        let arena = Bump::new();
        let mut cache = ExpressionCache::new_in(&arena);
        cache.insert(7u32, 1u32);
        cache.insert(7, 2);
    }
}
