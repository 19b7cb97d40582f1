//! Vocabulary index: discrete representation → words.
//!
//! Dynamic entries live in a hash map. Prebuilt vocabularies are an fst map
//! from representation key to payload index plus a bincode vector of word
//! lists, the same pair `build_vocab` writes.

use ahash::AHashMap;
use fst::{Map, MapBuilder, Streamer};
use std::collections::BTreeMap;
use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::Path;

use crate::error::{Result, SwipeError};
use crate::layout::KeyLayout;
use crate::utils;

pub const FST_FILE: &str = "vocab.fst";
pub const PAYLOAD_FILE: &str = "vocab.bincode";

#[derive(Debug, Clone, Default)]
pub struct VocabularyIndex {
    map: AHashMap<String, Vec<String>>,
    fst_map: Option<Map<Vec<u8>>>,
    payloads: Option<Vec<Vec<String>>>,
}

impl VocabularyIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add `word` under a flattened representation key such as `"3'2'4'6"`.
    ///
    /// Re-inserting a word under the same key is a no-op. A key first added
    /// on top of a prebuilt vocabulary keeps the prebuilt words ahead of the
    /// new one.
    pub fn insert<K: Into<String>, W: Into<String>>(&mut self, key: K, word: W) {
        let key = key.into();
        let word = word.into();
        if !self.map.contains_key(&key) {
            let prebuilt = self.prebuilt(&key);
            self.map.insert(key.clone(), prebuilt);
        }
        let bucket = self.map.entry(key).or_default();
        if !bucket.contains(&word) {
            bucket.push(word);
        }
    }

    /// Index a word list against a layout.
    ///
    /// Words are normalized first; words with a character no text key
    /// produces are skipped.
    pub fn from_words<I, S>(layout: &KeyLayout, words: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut index = Self::new();
        let mut skipped = 0usize;
        for word in words {
            let word = utils::normalize(word.as_ref());
            if word.is_empty() {
                continue;
            }
            match layout.representation_for_word(&word) {
                Some(repr) => index.insert(repr.to_key(), word),
                None => skipped += 1,
            }
        }
        tracing::debug!(keys = index.map.len(), skipped, "indexed vocabulary");
        index
    }

    /// Words whose perfect swipe matches `key`, in insertion order.
    pub fn lookup(&self, key: &str) -> Vec<String> {
        match self.map.get(key) {
            Some(v) => v.clone(),
            None => self.prebuilt(key),
        }
    }

    fn prebuilt(&self, key: &str) -> Vec<String> {
        if let (Some(map), Some(payloads)) = (&self.fst_map, &self.payloads) {
            if let Some(idx) = map.get(key) {
                if let Some(words) = payloads.get(idx as usize) {
                    return words.clone();
                }
            }
        }

        Vec::new()
    }

    pub fn contains_key(&self, key: &str) -> bool {
        !self.lookup(key).is_empty()
    }

    /// Number of distinct representation keys.
    pub fn len(&self) -> usize {
        let prebuilt = self.payloads.as_ref().map_or(0, |p| p.len());
        let dynamic = match &self.fst_map {
            Some(map) => self.map.keys().filter(|k| !map.contains_key(k.as_str())).count(),
            None => self.map.len(),
        };
        prebuilt + dynamic
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// All entries, sorted by key. Dynamic entries shadow prebuilt ones.
    fn merged(&self) -> BTreeMap<String, Vec<String>> {
        let mut all: BTreeMap<String, Vec<String>> = BTreeMap::new();
        if let (Some(map), Some(payloads)) = (&self.fst_map, &self.payloads) {
            let mut stream = map.stream();
            while let Some((key, idx)) = stream.next() {
                if let Some(words) = payloads.get(idx as usize) {
                    all.insert(String::from_utf8_lossy(key).into_owned(), words.clone());
                }
            }
        }
        for (k, v) in &self.map {
            all.insert(k.clone(), v.clone());
        }
        all
    }

    /// Write `vocab.fst` and `vocab.bincode` into `dir`.
    pub fn save_to_fst_bincode<P: AsRef<Path>>(&self, dir: P) -> Result<()> {
        let dir = dir.as_ref();
        fs::create_dir_all(dir).map_err(|e| SwipeError::io("create vocabulary dir", e))?;

        let file =
            File::create(dir.join(FST_FILE)).map_err(|e| SwipeError::io("create vocab.fst", e))?;
        let mut writer = BufWriter::new(file);
        let mut builder =
            MapBuilder::new(&mut writer).map_err(|e| SwipeError::artifact("fst builder", e))?;

        let mut payloads: Vec<Vec<String>> = Vec::new();
        for (i, (key, words)) in self.merged().into_iter().enumerate() {
            builder
                .insert(&key, i as u64)
                .map_err(|e| SwipeError::artifact("fst insert", e))?;
            payloads.push(words);
        }
        builder
            .finish()
            .map_err(|e| SwipeError::artifact("fst finish", e))?;
        writer
            .flush()
            .map_err(|e| SwipeError::io("write vocab.fst", e))?;

        let bytes =
            bincode::serialize(&payloads).map_err(|e| SwipeError::artifact("serialize payloads", e))?;
        fs::write(dir.join(PAYLOAD_FILE), bytes)
            .map_err(|e| SwipeError::io("write vocab.bincode", e))?;

        tracing::info!(dir = %dir.display(), keys = payloads.len(), "saved vocabulary");
        Ok(())
    }

    /// Load a vocabulary written by `save_to_fst_bincode` or `build_vocab`.
    pub fn load_from_fst_bincode<P: AsRef<Path>>(fst_path: P, bincode_path: P) -> Result<Self> {
        let fst_bytes =
            fs::read(fst_path.as_ref()).map_err(|e| SwipeError::io("read vocab.fst", e))?;
        let map = Map::new(fst_bytes).map_err(|e| SwipeError::artifact("fst map", e))?;

        let payload_bytes =
            fs::read(bincode_path.as_ref()).map_err(|e| SwipeError::io("read vocab.bincode", e))?;
        let payloads: Vec<Vec<String>> = bincode::deserialize(&payload_bytes)
            .map_err(|e| SwipeError::artifact("deserialize payloads", e))?;

        if payloads.len() != map.len() {
            return Err(SwipeError::artifact(
                "vocabulary",
                format!("fst has {} keys but {} payloads", map.len(), payloads.len()),
            ));
        }

        Ok(Self {
            map: AHashMap::new(),
            fst_map: Some(map),
            payloads: Some(payloads),
        })
    }

    /// Load `vocab.fst` + `vocab.bincode` from a directory.
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> Result<Self> {
        let dir = dir.as_ref();
        Self::load_from_fst_bincode(dir.join(FST_FILE), dir.join(PAYLOAD_FILE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::{Key, Rect};

    fn abc_layout() -> KeyLayout {
        KeyLayout::build(vec![
            Key::text("A", Rect::new(0.0, 0.0, 1.0 / 3.0, 1.0), "abc"),
            Key::text("B", Rect::new(1.0 / 3.0, 0.0, 1.0 / 3.0, 1.0), "def"),
            Key::text("C", Rect::new(2.0 / 3.0, 0.0, 1.0 / 3.0, 1.0), "ghi"),
        ])
        .unwrap()
    }

    #[test]
    fn insert_and_lookup() {
        let mut vocab = VocabularyIndex::new();
        vocab.insert("A'B", "ad");
        vocab.insert("A'B", "be");
        vocab.insert("A'B", "ad");
        assert_eq!(vocab.lookup("A'B"), vec!["ad".to_string(), "be".to_string()]);
        assert!(vocab.lookup("B'A").is_empty());
        assert_eq!(vocab.len(), 1);
    }

    #[test]
    fn from_words_normalizes_and_skips() {
        let vocab = VocabularyIndex::from_words(&abc_layout(), ["Bee", " cab ", "xyz", "", "hi"]);
        assert_eq!(vocab.lookup("A'B"), vec!["bee".to_string()]);
        assert_eq!(vocab.lookup("A"), vec!["cab".to_string()]);
        assert_eq!(vocab.lookup("C"), vec!["hi".to_string()]);
        assert_eq!(vocab.len(), 3);
    }

    #[test]
    fn save_and_load_fst_bincode() {
        let dir = tempfile::tempdir().unwrap();
        let vocab = VocabularyIndex::from_words(&abc_layout(), ["ad", "be", "bead", "hi"]);
        vocab.save_to_fst_bincode(dir.path()).unwrap();

        let loaded = VocabularyIndex::load_dir(dir.path()).unwrap();
        assert_eq!(loaded.len(), vocab.len());
        assert_eq!(loaded.lookup("A'B"), vec!["ad".to_string(), "be".to_string()]);
        assert_eq!(loaded.lookup("A'B'A'B"), vec!["bead".to_string()]);
        assert!(loaded.lookup("B").is_empty());
    }

    #[test]
    fn insert_extends_prebuilt_bucket() {
        let dir = tempfile::tempdir().unwrap();
        let mut vocab = VocabularyIndex::new();
        vocab.insert("A", "a");
        vocab.insert("A", "b");
        vocab.save_to_fst_bincode(dir.path()).unwrap();

        let mut loaded = VocabularyIndex::load_dir(dir.path()).unwrap();
        loaded.insert("A", "cab");
        loaded.insert("A", "a");
        loaded.insert("B", "e");
        assert_eq!(
            loaded.lookup("A"),
            vec!["a".to_string(), "b".to_string(), "cab".to_string()]
        );
        assert_eq!(loaded.lookup("B"), vec!["e".to_string()]);
        assert_eq!(loaded.len(), 2);

        // Saving again keeps both the prebuilt and the added words.
        let resaved = tempfile::tempdir().unwrap();
        loaded.save_to_fst_bincode(resaved.path()).unwrap();
        let reloaded = VocabularyIndex::load_dir(resaved.path()).unwrap();
        assert_eq!(reloaded.lookup("A").len(), 3);
    }

    #[test]
    fn load_missing_file_is_io_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = VocabularyIndex::load_dir(dir.path()).unwrap_err();
        assert!(matches!(err, SwipeError::Io { .. }));
    }
}
