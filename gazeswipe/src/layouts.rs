//! Built-in keyboard layouts and JSON layout files.
//!
//! Both built-in layouts put the 26 letters on eight 3×3-style letter keys
//! (`1`..`9`, with `5` left blank). Layout files describe one key per entry:
//!
//! ```json
//! [
//!   {"x1": 0.0, "y1": 0.2, "w": 0.333, "h": 0.2, "key_id": "1",
//!    "contents": ["a", "b", "c"], "type": "text_key"}
//! ]
//! ```
//!
//! `type` is one of the names in [`ROLE_NAMES`] or `suggestion_button`, whose
//! slot comes from the optional `slot` field or the trailing digits of the key
//! id (`suggestion_2` is slot 1).

use std::path::Path;

use gazeswipe_core::{ControlAction, Key, KeyLayout, KeyRole, Rect};
use once_cell::sync::Lazy;
use phf::phf_map;
use regex::Regex;
use serde::Deserialize;

/// Layout names accepted by [`by_name`].
pub const BUILTIN_LAYOUTS: [&str; 2] = ["standard", "compact"];

/// Key type names used by layout files.
pub static ROLE_NAMES: phf::Map<&'static str, KeyRole> = phf_map! {
    "text_key" => KeyRole::Text,
    "punctuation_key" => KeyRole::Punctuation,
    "null_key" => KeyRole::Null,
    "display_frame" => KeyRole::Null,
    "speak_button" => KeyRole::Control(ControlAction::Speak),
    "delete_button" => KeyRole::Control(ControlAction::DeleteLastWord),
    "clear_button" => KeyRole::Control(ControlAction::Clear),
    "exit_button" => KeyRole::Control(ControlAction::Exit),
};

const SUGGESTION_TYPE: &str = "suggestion_button";

static TRAILING_DIGITS: Lazy<Regex> = Lazy::new(|| Regex::new(r"(\d+)$").unwrap());

/// Letter keys shared by both layouts: id and characters, row-major.
const LETTER_KEYS: [(&str, &str); 9] = [
    ("1", "abc"),
    ("2", "def"),
    ("3", "ghi"),
    ("4", "jkl"),
    ("5", ""),
    ("6", "mno"),
    ("7", "pqrs"),
    ("8", "tuv"),
    ("9", "wxyz"),
];

fn letter_key(id: &str, chars: &str, rect: Rect) -> Key {
    if chars.is_empty() {
        Key::new(id, rect, "", KeyRole::Null)
    } else {
        Key::text(id, rect, chars)
    }
}

fn control(id: &str, rect: Rect, label: &str, action: ControlAction) -> Key {
    Key::new(id, rect, label, KeyRole::Control(action))
}

/// The standard layout: display and speak across the top, three suggestion
/// slots with delete/clear/exit below, a 3×3 letter grid and a punctuation row.
pub fn standard_keys() -> Vec<Key> {
    let mut keys = vec![
        Key::new("display", Rect::new(0.0, 0.0, 2.0 / 3.0, 0.1), "", KeyRole::Null),
        control(
            "speak",
            Rect::new(2.0 / 3.0, 0.0, 1.0 / 3.0, 0.1),
            "speak",
            ControlAction::Speak,
        ),
    ];
    for slot in 0..3 {
        keys.push(control(
            &format!("suggestion_{}", slot + 1),
            Rect::new(slot as f64 * 2.0 / 9.0, 0.1, 2.0 / 9.0, 0.1),
            "",
            ControlAction::SelectSuggestion(slot),
        ));
    }
    keys.extend([
        control(
            "delete",
            Rect::new(6.0 / 9.0, 0.1, 1.0 / 9.0, 0.1),
            "del",
            ControlAction::DeleteLastWord,
        ),
        control(
            "clear",
            Rect::new(7.0 / 9.0, 0.1, 1.0 / 9.0, 0.1),
            "clr",
            ControlAction::Clear,
        ),
        control(
            "exit",
            Rect::new(8.0 / 9.0, 0.1, 1.0 / 9.0, 0.1),
            "X",
            ControlAction::Exit,
        ),
    ]);
    for (i, (id, chars)) in LETTER_KEYS.iter().enumerate() {
        let (row, col) = (i / 3, i % 3);
        let rect = Rect::new(col as f64 / 3.0, (row + 1) as f64 / 5.0, 1.0 / 3.0, 0.2);
        keys.push(letter_key(id, chars, rect));
    }
    for (col, mark) in [",", ".", "?"].iter().enumerate() {
        keys.push(Key::new(
            *mark,
            Rect::new(col as f64 / 3.0, 0.8, 1.0 / 3.0, 0.2),
            mark,
            KeyRole::Punctuation,
        ));
    }
    keys
}

/// The five-column layout: letters in the middle three columns, controls on
/// the right, and mode switches on the left. Mode switches and suggestion
/// paging have no behavior here and are inert.
pub fn compact_keys() -> Vec<Key> {
    let fifth = 1.0 / 5.0;
    let mut keys = vec![
        Key::new("display", Rect::new(0.0, 0.0, 4.0 * fifth, 0.125), "", KeyRole::Null),
        control(
            "exit",
            Rect::new(4.0 * fifth, 0.0, fifth, 0.125),
            "X",
            ControlAction::Exit,
        ),
        Key::new(
            "suggestion_left_arrow",
            Rect::new(0.0, 0.125, fifth, 0.125),
            "←",
            KeyRole::Null,
        ),
    ];
    for slot in 0..3 {
        keys.push(control(
            &format!("suggestion_{}", slot + 1),
            Rect::new((slot + 1) as f64 * fifth, 0.125, fifth, 0.125),
            "",
            ControlAction::SelectSuggestion(slot),
        ));
    }
    keys.push(Key::new(
        "suggestion_right_arrow",
        Rect::new(4.0 * fifth, 0.125, fifth, 0.125),
        "→",
        KeyRole::Null,
    ));

    let left = ["number_switch", "text_switch", "settings_switch"];
    let right = [
        ("speak", "speak", ControlAction::Speak),
        ("delete", "del", ControlAction::DeleteLastWord),
        ("clear", "clr", ControlAction::Clear),
    ];
    for row in 0..3 {
        let y = (row + 1) as f64 * 0.25;
        keys.push(Key::new(left[row], Rect::new(0.0, y, fifth, 0.25), "", KeyRole::Null));
        for col in 0..3 {
            let (id, chars) = LETTER_KEYS[row * 3 + col];
            let rect = Rect::new((col + 1) as f64 * fifth, y, fifth, 0.25);
            keys.push(letter_key(id, chars, rect));
        }
        let (id, label, action) = right[row];
        keys.push(control(id, Rect::new(4.0 * fifth, y, fifth, 0.25), label, action));
    }
    keys
}

/// Build a built-in layout by name.
pub fn by_name(name: &str) -> gazeswipe_core::Result<KeyLayout> {
    match name {
        "standard" => KeyLayout::build(standard_keys()),
        "compact" => KeyLayout::build(compact_keys()),
        other => Err(gazeswipe_core::SwipeError::InvalidConfig(format!(
            "unknown layout '{}' (expected one of {:?} or a .json file)",
            other, BUILTIN_LAYOUTS
        ))),
    }
}

/// A built-in name, or a path to a JSON layout file.
pub fn resolve(name_or_path: &str) -> anyhow::Result<KeyLayout> {
    if BUILTIN_LAYOUTS.contains(&name_or_path) {
        return Ok(by_name(name_or_path)?);
    }
    load_json(name_or_path)
}

/// One key entry of a layout file.
#[derive(Debug, Clone, Deserialize)]
pub struct KeySpec {
    pub x1: f64,
    pub y1: f64,
    pub w: f64,
    pub h: f64,
    pub key_id: String,
    #[serde(default)]
    pub contents: Vec<String>,
    #[serde(rename = "type")]
    pub kind: String,
    #[serde(default)]
    pub slot: Option<usize>,
}

impl KeySpec {
    fn role(&self) -> anyhow::Result<KeyRole> {
        if let Some(role) = ROLE_NAMES.get(self.kind.as_str()) {
            return Ok(*role);
        }
        if self.kind == SUGGESTION_TYPE {
            let slot = match self.slot {
                Some(slot) => slot,
                None => TRAILING_DIGITS
                    .captures(&self.key_id)
                    .and_then(|c| c[1].parse::<usize>().ok())
                    .and_then(|n| n.checked_sub(1))
                    .ok_or_else(|| {
                        anyhow::anyhow!(
                            "suggestion key '{}' needs a slot or a numbered id",
                            self.key_id
                        )
                    })?,
            };
            return Ok(KeyRole::Control(ControlAction::SelectSuggestion(slot)));
        }
        anyhow::bail!("key '{}' has unknown type '{}'", self.key_id, self.kind)
    }

    pub fn into_key(self) -> anyhow::Result<Key> {
        let role = self.role()?;
        let chars: String = self.contents.concat();
        Ok(Key::new(
            self.key_id,
            Rect::new(self.x1, self.y1, self.w, self.h),
            &chars,
            role,
        ))
    }
}

/// Parse and validate a JSON layout.
pub fn from_json_str(json: &str) -> anyhow::Result<KeyLayout> {
    let specs: Vec<KeySpec> = serde_json::from_str(json)?;
    let keys = specs
        .into_iter()
        .map(KeySpec::into_key)
        .collect::<anyhow::Result<Vec<_>>>()?;
    Ok(KeyLayout::build(keys)?)
}

pub fn load_json<P: AsRef<Path>>(path: P) -> anyhow::Result<KeyLayout> {
    let path = path.as_ref();
    let json = std::fs::read_to_string(path)
        .map_err(|e| anyhow::anyhow!("reading layout {}: {}", path.display(), e))?;
    let layout = from_json_str(&json)?;
    tracing::info!(path = %path.display(), keys = layout.len(), "loaded layout");
    Ok(layout)
}

#[cfg(test)]
mod tests {
    use super::*;
    use gazeswipe_core::{KeyAction, KeyId};

    #[test]
    fn builtin_layouts_are_valid() {
        for name in BUILTIN_LAYOUTS {
            let layout = by_name(name).unwrap();
            for c in 'a'..='z' {
                assert!(layout.key_for_char(c).is_some(), "{} missing '{}'", name, c);
            }
        }
        assert!(by_name("dvorak").unwrap_err().is_configuration_error());
    }

    #[test]
    fn standard_geometry() {
        let layout = by_name("standard").unwrap();
        assert_eq!(layout.key_at(0.1, 0.3), Some(&KeyId::from("1")));
        assert_eq!(layout.key_at(0.9, 0.9), Some(&KeyId::from("?")));
        assert_eq!(layout.key_at(0.5, 0.5).map(KeyId::as_str), Some("5"));
        assert_eq!(layout.role_of("5"), Some(KeyRole::Null));
        assert_eq!(
            layout.key("suggestion_2").and_then(|k| k.action()),
            Some(KeyAction::Control(ControlAction::SelectSuggestion(1)))
        );
        assert_eq!(
            layout.key(".").and_then(|k| k.action()),
            Some(KeyAction::InsertPunctuation('.'))
        );
        let hello = layout.representation_for_word("hello").unwrap();
        assert_eq!(hello.to_key(), "3'2'4'6");
    }

    #[test]
    fn compact_has_no_punctuation_row() {
        let layout = by_name("compact").unwrap();
        assert!(layout.keys().iter().all(|k| k.role != KeyRole::Punctuation));
        assert_eq!(
            layout.role_of("speak"),
            Some(KeyRole::Control(ControlAction::Speak))
        );
        assert_eq!(layout.role_of("number_switch"), Some(KeyRole::Null));
    }

    #[test]
    fn json_layout_with_role_names() {
        let json = r#"[
            {"x1": 0.0, "y1": 0.0, "w": 0.5, "h": 0.5, "key_id": "1", "contents": ["a", "b"], "type": "text_key"},
            {"x1": 0.5, "y1": 0.0, "w": 0.5, "h": 0.5, "key_id": "2", "contents": ["c"], "type": "text_key"},
            {"x1": 0.0, "y1": 0.5, "w": 0.25, "h": 0.5, "key_id": "suggestion_3", "type": "suggestion_button"},
            {"x1": 0.25, "y1": 0.5, "w": 0.25, "h": 0.5, "key_id": "pick", "type": "suggestion_button", "slot": 0},
            {"x1": 0.5, "y1": 0.5, "w": 0.25, "h": 0.5, "key_id": "bang", "contents": ["!"], "type": "punctuation_key"},
            {"x1": 0.75, "y1": 0.5, "w": 0.25, "h": 0.5, "key_id": "speak", "contents": ["speak"], "type": "speak_button"}
        ]"#;
        let layout = from_json_str(json).unwrap();
        assert_eq!(layout.len(), 6);
        assert_eq!(
            layout.role_of("suggestion_3"),
            Some(KeyRole::Control(ControlAction::SelectSuggestion(2)))
        );
        assert_eq!(
            layout.role_of("pick"),
            Some(KeyRole::Control(ControlAction::SelectSuggestion(0)))
        );
        assert_eq!(layout.representation_for_word("cab").unwrap().to_key(), "2'1");
    }

    #[test]
    fn json_layout_errors() {
        let unknown = r#"[{"x1": 0.0, "y1": 0.0, "w": 1.0, "h": 1.0, "key_id": "x", "type": "slider"}]"#;
        assert!(from_json_str(unknown).is_err());

        let overlap = r#"[
            {"x1": 0.0, "y1": 0.0, "w": 0.6, "h": 1.0, "key_id": "1", "contents": ["a"], "type": "text_key"},
            {"x1": 0.5, "y1": 0.0, "w": 0.5, "h": 1.0, "key_id": "2", "contents": ["b"], "type": "text_key"}
        ]"#;
        let err = from_json_str(overlap).unwrap_err();
        let swipe = err.downcast_ref::<gazeswipe_core::SwipeError>().unwrap();
        assert!(matches!(swipe, gazeswipe_core::SwipeError::OverlapDetected { .. }));
    }

    #[test]
    fn load_json_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("tiny.json");
        std::fs::write(
            &path,
            r#"[{"x1": 0.0, "y1": 0.0, "w": 1.0, "h": 1.0, "key_id": "1", "contents": ["a"], "type": "text_key"}]"#,
        )
        .unwrap();
        let layout = resolve(path.to_str().unwrap()).unwrap();
        assert_eq!(layout.key_at(0.5, 0.5).map(KeyId::as_str), Some("1"));
    }
}
