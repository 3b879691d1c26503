//! 标识：库所到 token 数的映射，缺省库所视为 0。
use std::collections::BTreeMap;
use std::fmt;
use std::hash::{Hash, Hasher};

use crate::net::ids::PlaceKey;
use crate::net::structure::Weight;

/// A point-in-time assignment of token counts to places.
///
/// A place missing from the map holds zero tokens. Equality and hashing follow
/// that rule, so `{a: 0}` and `{}` are the same marking; [`Marking::canonical`]
/// drops the explicit zeros when a pruned representation is wanted.
#[derive(Clone)]
pub struct Marking<P: PlaceKey>(BTreeMap<P, Weight>);

impl<P: PlaceKey> Marking<P> {
    pub fn new() -> Self {
        Self(BTreeMap::new())
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&P, Weight)> {
        self.0.iter().map(|(place, tokens)| (place, *tokens))
    }

    pub fn tokens(&self, place: &P) -> Weight {
        self.0.get(place).copied().unwrap_or(0)
    }

    /// Returns the counter for `place`, inserting it at zero first.
    pub fn tokens_mut(&mut self, place: &P) -> &mut Weight {
        self.0.entry(place.clone()).or_insert(0)
    }

    pub fn set(&mut self, place: P, tokens: Weight) {
        self.0.insert(place, tokens);
    }

    /// Whether `place` has an explicit entry, even a zero one.
    pub fn contains_place(&self, place: &P) -> bool {
        self.0.contains_key(place)
    }

    /// Inserts every missing place at zero. Existing counts are untouched.
    pub fn widen<'a, I>(&mut self, places: I)
    where
        P: 'a,
        I: IntoIterator<Item = &'a P>,
    {
        for place in places {
            self.0.entry(place.clone()).or_insert(0);
        }
    }

    pub fn canonical(&self) -> Self {
        Self(
            self.0
                .iter()
                .filter(|(_, tokens)| **tokens > 0)
                .map(|(place, tokens)| (place.clone(), *tokens))
                .collect(),
        )
    }

    pub fn is_canonical(&self) -> bool {
        self.0.values().all(|tokens| *tokens > 0)
    }

    pub fn total_tokens(&self) -> Weight {
        self.0.values().sum()
    }

    pub fn into_inner(self) -> BTreeMap<P, Weight> {
        self.0
    }

    fn nonzero(&self) -> impl Iterator<Item = (&P, &Weight)> {
        self.0.iter().filter(|(_, tokens)| **tokens > 0)
    }
}

impl<P: PlaceKey> Default for Marking<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: PlaceKey> PartialEq for Marking<P> {
    fn eq(&self, other: &Self) -> bool {
        self.nonzero().eq(other.nonzero())
    }
}

impl<P: PlaceKey> Eq for Marking<P> {}

impl<P: PlaceKey> Hash for Marking<P> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        for (place, tokens) in self.nonzero() {
            place.hash(state);
            tokens.hash(state);
        }
    }
}

impl<P: PlaceKey> fmt::Debug for Marking<P> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for (place, tokens) in self.iter() {
            map.entry(place, &tokens);
        }
        map.finish()
    }
}

impl<P: PlaceKey> FromIterator<(P, Weight)> for Marking<P> {
    fn from_iter<I: IntoIterator<Item = (P, Weight)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<P: PlaceKey> From<BTreeMap<P, Weight>> for Marking<P> {
    fn from(map: BTreeMap<P, Weight>) -> Self {
        Self(map)
    }
}

impl<P: PlaceKey, const N: usize> From<[(P, Weight); N]> for Marking<P> {
    fn from(entries: [(P, Weight); N]) -> Self {
        entries.into_iter().collect()
    }
}
