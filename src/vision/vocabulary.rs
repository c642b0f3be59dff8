//! Recognition vocabulary
//!
//! Index 0 is the CTC blank, indices 1..=N are the dictionary lines in file
//! order, and a single space symbol closes the table at N+1.

use std::path::Path;
use tracing::debug;

use crate::error::ResourceLoadError;

/// Index reserved for the CTC blank marker
pub const BLANK_INDEX: usize = 0;

const BLANK_SYMBOL: &str = "<blank>";
const SPACE_SYMBOL: &str = " ";

/// Positional symbol table for the recognition model output
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Vocabulary {
    symbols: Vec<String>,
}

impl Vocabulary {
    /// Build a vocabulary from dictionary entries, adding the blank and space slots
    pub fn from_entries<I, S>(entries: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut symbols = vec![BLANK_SYMBOL.to_string()];
        symbols.extend(entries.into_iter().map(Into::into));
        symbols.push(SPACE_SYMBOL.to_string());
        Self { symbols }
    }

    /// Parse newline-delimited dictionary content, one symbol per line
    pub fn from_dictionary(content: &str) -> Self {
        Self::from_entries(content.lines().map(|line| line.trim_end_matches('\r')))
    }

    /// Read a dictionary file
    pub fn load(path: &Path) -> Result<Self, ResourceLoadError> {
        let content = std::fs::read_to_string(path).map_err(|e| ResourceLoadError::Read {
            resource: "dictionary",
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;

        let vocabulary = Self::from_dictionary(&content);
        if vocabulary.dictionary_len() == 0 {
            return Err(ResourceLoadError::EmptyDictionary {
                path: path.to_path_buf(),
            });
        }

        debug!(
            "Loaded dictionary {:?}: {} symbols",
            path,
            vocabulary.dictionary_len()
        );
        Ok(vocabulary)
    }

    /// Total number of slots, blank and space included
    pub fn len(&self) -> usize {
        self.symbols.len()
    }

    /// Always false; the blank and space slots are present even for an empty dictionary
    pub fn is_empty(&self) -> bool {
        self.symbols.is_empty()
    }

    /// Number of symbols that came from the dictionary
    pub fn dictionary_len(&self) -> usize {
        self.symbols.len() - 2
    }

    /// Symbol at `index`, or None when out of range
    pub fn symbol(&self, index: usize) -> Option<&str> {
        self.symbols.get(index).map(String::as_str)
    }
}
