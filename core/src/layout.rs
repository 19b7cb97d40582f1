//! Keyboard geometry: keys, roles and point → key lookup.
//!
//! A `KeyLayout` is built once from a list of keys, validated, and then only
//! read. All coordinates are normalized window coordinates in `[0, 1]`.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{Result, SwipeError};
use crate::trace::{DiscreteRepresentation, KeyId, REPRESENTATION_SEPARATOR};

/// Action performed by a control key.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ControlAction {
    Speak,
    DeleteLastWord,
    Clear,
    /// Accept the suggestion shown in the given slot (0 = top suggestion).
    SelectSuggestion(usize),
    Exit,
}

/// What a key does when dwelled on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum KeyRole {
    /// Letter key; starts and takes part in swipes.
    Text,
    /// Inserts its first character directly.
    Punctuation,
    Control(ControlAction),
    /// Inert key; ignored entirely.
    Null,
}

/// Action emitted for a non-text dwell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyAction {
    Control(ControlAction),
    InsertPunctuation(char),
}

/// Tolerance for layouts written as fractions such as `2.0 / 5.0 + 1.0 / 5.0`.
const EPS: f64 = 1e-9;

/// Axis-aligned rectangle in normalized window coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    pub width: f64,
    pub height: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, width: f64, height: f64) -> Self {
        Self {
            x,
            y,
            width,
            height,
        }
    }

    pub fn right(&self) -> f64 {
        self.x + self.width
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.height
    }

    /// Half-open containment; the window's right and bottom edges belong to
    /// the key touching them so every point of `[0, 1]²` can resolve.
    pub fn contains(&self, px: f64, py: f64) -> bool {
        let in_x = px >= self.x && (px < self.right() || (px == 1.0 && self.right() >= 1.0 - EPS));
        let in_y = py >= self.y && (py < self.bottom() || (py == 1.0 && self.bottom() >= 1.0 - EPS));
        in_x && in_y
    }

    /// Area of the intersection with `other` (0.0 when they only touch).
    pub fn intersection_area(&self, other: &Rect) -> f64 {
        let w = self.right().min(other.right()) - self.x.max(other.x);
        let h = self.bottom().min(other.bottom()) - self.y.max(other.y);
        if w <= EPS || h <= EPS {
            0.0
        } else {
            w * h
        }
    }

    fn validate(&self) -> std::result::Result<(), String> {
        let coords = [self.x, self.y, self.width, self.height];
        if coords.iter().any(|c| !c.is_finite()) {
            return Err("coordinates must be finite".to_string());
        }
        if self.width <= 0.0 || self.height <= 0.0 {
            return Err("key cannot have zero area".to_string());
        }
        let edges = [self.x, self.y, self.right(), self.bottom()];
        if edges.iter().any(|e| *e < -EPS || *e > 1.0 + EPS) {
            return Err("key exceeds the border of the window".to_string());
        }
        Ok(())
    }
}

/// A single key region.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Key {
    pub id: KeyId,
    pub rect: Rect,
    /// Characters produced by this key, in display order.
    pub chars: Vec<char>,
    pub role: KeyRole,
}

impl Key {
    pub fn new<I: Into<KeyId>>(id: I, rect: Rect, chars: &str, role: KeyRole) -> Self {
        Self {
            id: id.into(),
            rect,
            chars: chars.chars().collect(),
            role,
        }
    }

    pub fn text<I: Into<KeyId>>(id: I, rect: Rect, chars: &str) -> Self {
        Self::new(id, rect, chars, KeyRole::Text)
    }

    /// The action dwelling on this key triggers outside a swipe, if any.
    pub fn action(&self) -> Option<KeyAction> {
        match self.role {
            KeyRole::Control(action) => Some(KeyAction::Control(action)),
            KeyRole::Punctuation => self.chars.first().map(|c| KeyAction::InsertPunctuation(*c)),
            KeyRole::Text | KeyRole::Null => None,
        }
    }
}

/// Validated, immutable set of keys.
#[derive(Debug, Clone)]
pub struct KeyLayout {
    keys: Vec<Key>,
    index: AHashMap<KeyId, usize>,
    char_to_key: AHashMap<char, KeyId>,
}

impl KeyLayout {
    /// Validate and build a layout.
    ///
    /// Checks, in order: key ids, per-key bounds, then every pair of keys for a
    /// positive-area overlap.
    pub fn build(keys: Vec<Key>) -> Result<Self> {
        let mut index = AHashMap::with_capacity(keys.len());
        for (i, key) in keys.iter().enumerate() {
            let id = key.id.as_str();
            if id.is_empty() {
                return Err(SwipeError::InvalidKeyId {
                    key: id.to_string(),
                    reason: "key id cannot be empty".to_string(),
                });
            }
            if id.contains(REPRESENTATION_SEPARATOR) {
                return Err(SwipeError::InvalidKeyId {
                    key: id.to_string(),
                    reason: format!("key id cannot contain '{}'", REPRESENTATION_SEPARATOR),
                });
            }
            if index.insert(key.id.clone(), i).is_some() {
                return Err(SwipeError::InvalidKeyId {
                    key: id.to_string(),
                    reason: "duplicate key id".to_string(),
                });
            }
        }

        for key in &keys {
            key.rect
                .validate()
                .map_err(|reason| SwipeError::InvalidBounds {
                    key: key.id.to_string(),
                    reason,
                })?;
        }

        for (i, a) in keys.iter().enumerate() {
            for b in &keys[i + 1..] {
                if a.rect.intersection_area(&b.rect) > 0.0 {
                    return Err(SwipeError::OverlapDetected {
                        first: a.id.to_string(),
                        second: b.id.to_string(),
                    });
                }
            }
        }

        let mut char_to_key = AHashMap::new();
        for key in keys.iter().filter(|k| k.role == KeyRole::Text) {
            for ch in &key.chars {
                for lower in ch.to_lowercase() {
                    char_to_key.entry(lower).or_insert_with(|| key.id.clone());
                }
            }
        }

        tracing::debug!(keys = keys.len(), "built key layout");
        Ok(Self {
            keys,
            index,
            char_to_key,
        })
    }

    /// Key containing the point, if any. Points outside `[0, 1]²` never resolve.
    pub fn key_at(&self, x: f64, y: f64) -> Option<&KeyId> {
        if !(0.0..=1.0).contains(&x) || !(0.0..=1.0).contains(&y) {
            return None;
        }
        self.keys
            .iter()
            .find(|k| k.rect.contains(x, y))
            .map(|k| &k.id)
    }

    pub fn key(&self, id: &str) -> Option<&Key> {
        self.index.get(id).map(|&i| &self.keys[i])
    }

    pub fn role_of(&self, id: &str) -> Option<KeyRole> {
        self.key(id).map(|k| k.role)
    }

    pub fn keys(&self) -> &[Key] {
        &self.keys
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Text key producing `ch` (case-insensitive).
    pub fn key_for_char(&self, ch: char) -> Option<&KeyId> {
        let lower = ch.to_lowercase().next().unwrap_or(ch);
        self.char_to_key.get(&lower)
    }

    /// Key path of a perfect swipe for `word`.
    ///
    /// e.g. on the standard layout "hello" → `3'2'4'6`. Returns `None` when a
    /// character has no text key.
    pub fn representation_for_word(&self, word: &str) -> Option<DiscreteRepresentation> {
        let mut path = Vec::with_capacity(word.len());
        for ch in word.chars() {
            path.push(self.key_for_char(ch)?);
        }
        if path.is_empty() {
            return None;
        }
        Some(DiscreteRepresentation::from_keys(path))
    }
}
