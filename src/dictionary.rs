use std::{
    collections::HashSet,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
};

use crate::Result;

/// Words known at training time; used to split recall into
/// in-vocabulary and out-of-vocabulary words.
#[derive(Debug, Default, Clone)]
pub struct Dictionary {
    words: HashSet<String>,
}

impl Dictionary {
    /// Collects every whitespace separated token of a segmented corpus.
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut dict = Self::default();
        for line in reader.lines() {
            for word in line?.split_whitespace() {
                dict.insert(word);
            }
        }
        log::debug!("dictionary loaded with {} words", dict.len());
        Ok(dict)
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::read(BufReader::new(File::open(path)?))
    }

    pub fn insert(&mut self, word: &str) -> bool {
        self.words.insert(word.to_string())
    }

    pub fn contains(&self, word: &str) -> bool {
        self.words.contains(word)
    }

    pub fn len(&self) -> usize {
        self.words.len()
    }

    pub fn is_empty(&self) -> bool {
        self.words.is_empty()
    }
}

impl<S: AsRef<str>> FromIterator<S> for Dictionary {
    fn from_iter<T: IntoIterator<Item = S>>(iter: T) -> Self {
        Self { words: iter.into_iter().map(|w| w.as_ref().to_string()).collect() }
    }
}
