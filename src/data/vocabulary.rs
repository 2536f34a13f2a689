use std::collections::HashMap;
use std::path::Path;

use crate::error::{Error, Result};

/// End-of-caption marker, always at index 0.
pub const END_TOKEN: &str = "<end>";

/// Placeholder for words outside the vocabulary.
pub const UNK_TOKEN: &str = "unk";

/// Word list used by the decoder, with `<end>` prepended.
#[derive(Debug, Clone, PartialEq)]
pub struct Vocabulary {
    words: Vec<String>,
    index: HashMap<String, usize>,
}

impl Vocabulary {
    /// Builds a vocabulary from a word list; `<end>` is inserted at index 0
    /// and `unk` is appended when the list lacks it.
    pub fn from_words<I, S>(words: I) -> Vocabulary
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut all = vec![END_TOKEN.to_owned()];
        for word in words {
            let word = word.into();
            if word != END_TOKEN {
                all.push(word);
            }
        }
        if !all.iter().any(|w| w == UNK_TOKEN) {
            all.push(UNK_TOKEN.to_owned());
        }

        let mut index = HashMap::with_capacity(all.len());
        for (i, word) in all.iter().enumerate() {
            index.entry(word.clone()).or_insert(i);
        }
        Vocabulary { words: all, index }
    }

    /// Reads a JSON array of words (as written by the vocabulary builder).
    pub fn load_json(path: &Path) -> Result<Vocabulary> {
        let file = std::fs::File::open(path)
            .map_err(|e| Error::Data(format!("cannot open vocabulary {}: {e}", path.display())))?;
        let reader = std::io::BufReader::new(file);
        let words: Vec<String> = serde_json::from_reader(reader)?;
        Ok(Vocabulary::from_words(words))
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }

    pub fn word(&self, id: usize) -> Option<&str> {
        self.words.get(id).map(String::as_str)
    }

    pub fn id(&self, word: &str) -> Option<usize> {
        self.index.get(word).copied()
    }

    pub fn end_id(&self) -> usize {
        0
    }

    pub fn unk_id(&self) -> usize {
        self.index[UNK_TOKEN]
    }

    /// Maps tokens to ids, sending unknown words to `unk`.
    pub fn encode<S: AsRef<str>>(&self, tokens: &[S]) -> Vec<usize> {
        tokens
            .iter()
            .map(|t| self.id(t.as_ref()).unwrap_or_else(|| self.unk_id()))
            .collect()
    }

    /// Joins ids into a caption, stopping at the first `<end>`.
    pub fn decode(&self, ids: &[usize]) -> String {
        ids.iter()
            .take_while(|&&id| id != self.end_id())
            .filter_map(|&id| self.word(id))
            .collect::<Vec<_>>()
            .join(" ")
    }
}
