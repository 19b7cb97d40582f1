//! Key identifiers, recorded key traces and discrete representations.

use serde::{Deserialize, Serialize};
use std::borrow::Borrow;
use std::fmt;

use crate::error::{Result, SwipeError};

/// Separator used when a representation is flattened into a lookup key.
///
/// Key ids may be longer than one character, so "1'23" and "12'3" must stay
/// distinct.
pub const REPRESENTATION_SEPARATOR: char = '\'';

/// Identifier of a single key on a layout.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct KeyId(String);

impl KeyId {
    pub fn new<T: Into<String>>(id: T) -> Self {
        KeyId(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for KeyId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for KeyId {
    fn from(s: &str) -> Self {
        KeyId(s.to_string())
    }
}

impl From<String> for KeyId {
    fn from(s: String) -> Self {
        KeyId(s)
    }
}

impl Borrow<str> for KeyId {
    fn borrow(&self) -> &str {
        &self.0
    }
}

/// The ordered key ids recorded during one swipe, one per sampling interval.
///
/// Once constructed a trace is immutable and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct KeyTrace {
    keys: Vec<KeyId>,
}

impl KeyTrace {
    /// Build a trace, rejecting empty sequences.
    pub fn new(keys: Vec<KeyId>) -> Result<Self> {
        if keys.is_empty() {
            return Err(SwipeError::EmptyTrace);
        }
        Ok(Self { keys })
    }

    /// Convenience constructor from string ids, e.g. `["1", "1", "2"]`.
    pub fn from_ids<I, S>(ids: I) -> Result<Self>
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self::new(ids.into_iter().map(|s| KeyId::new(s)).collect())
    }

    pub fn keys(&self) -> &[KeyId] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    pub fn first(&self) -> &KeyId {
        &self.keys[0]
    }

    pub fn last(&self) -> &KeyId {
        &self.keys[self.keys.len() - 1]
    }
}

impl fmt::Display for KeyTrace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let ids: Vec<&str> = self.keys.iter().map(KeyId::as_str).collect();
        write!(f, "[{}]", ids.join(","))
    }
}

/// Canonical key path used to look words up in the vocabulary.
///
/// Consecutive identical keys collapse into one, so a path never repeats a
/// key back to back.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DiscreteRepresentation(Vec<KeyId>);

impl DiscreteRepresentation {
    /// Build a representation, collapsing consecutive duplicates.
    pub fn from_keys<'a, I>(keys: I) -> Self
    where
        I: IntoIterator<Item = &'a KeyId>,
    {
        let mut path: Vec<KeyId> = Vec::new();
        for key in keys {
            if path.last() != Some(key) {
                path.push(key.clone());
            }
        }
        DiscreteRepresentation(path)
    }

    pub fn from_ids<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let keys: Vec<KeyId> = ids.into_iter().map(|s| KeyId::new(s)).collect();
        Self::from_keys(keys.iter())
    }

    /// Parse a flattened lookup key such as `"1'2'1"`.
    pub fn parse(key: &str) -> Self {
        if key.is_empty() {
            return DiscreteRepresentation(Vec::new());
        }
        Self::from_ids(key.split(REPRESENTATION_SEPARATOR))
    }

    pub fn keys(&self) -> &[KeyId] {
        &self.0
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Flattened lookup key, e.g. `"1'2'1"`.
    pub fn to_key(&self) -> String {
        join_key(self.0.iter().map(KeyId::as_str))
    }
}

impl fmt::Display for DiscreteRepresentation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.to_key())
    }
}

/// Join ids into a lookup key, collapsing consecutive duplicates.
pub(crate) fn join_key<'a, I>(ids: I) -> String
where
    I: IntoIterator<Item = &'a str>,
{
    let mut out = String::new();
    let mut prev: Option<&str> = None;
    for id in ids {
        if prev == Some(id) {
            continue;
        }
        if prev.is_some() {
            out.push(REPRESENTATION_SEPARATOR);
        }
        out.push_str(id);
        prev = Some(id);
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_trace_rejected() {
        assert!(matches!(KeyTrace::new(vec![]), Err(SwipeError::EmptyTrace)));
    }

    #[test]
    fn test_trace_endpoints() {
        let trace = KeyTrace::from_ids(["1", "1", "2", "3"]).unwrap();
        assert_eq!(trace.first().as_str(), "1");
        assert_eq!(trace.last().as_str(), "3");
        assert_eq!(trace.len(), 4);
        assert_eq!(trace.to_string(), "[1,1,2,3]");
    }

    #[test]
    fn test_representation_collapses_repeats() {
        let repr = DiscreteRepresentation::from_ids(["A", "A", "B", "A", "A"]);
        assert_eq!(repr.to_key(), "A'B'A");
        assert_eq!(repr.len(), 3);

        let single = DiscreteRepresentation::from_ids(["A", "A"]);
        assert_eq!(single.to_key(), "A");
    }

    #[test]
    fn test_parse_matches_to_key() {
        let repr = DiscreteRepresentation::parse("3'2'4'6");
        assert_eq!(repr.len(), 4);
        assert_eq!(repr.to_key(), "3'2'4'6");
        assert!(DiscreteRepresentation::parse("").is_empty());
    }

    #[test]
    fn test_multi_char_ids_stay_distinct() {
        let a = DiscreteRepresentation::from_ids(["1", "23"]);
        let b = DiscreteRepresentation::from_ids(["12", "3"]);
        assert_ne!(a.to_key(), b.to_key());
    }
}
