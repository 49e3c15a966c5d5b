use std::collections::HashMap;

/// Bidirectional mapping between feature strings and dense ids.
pub trait StringTable {
    fn to_id(&self, s: &str) -> Option<usize>;
    fn len(&self) -> usize;
    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

pub trait TextVectorizer {
    fn find_or_insert(&mut self, key: &str) -> usize;
}

#[derive(Debug, Default, Clone)]
pub struct Quark {
    v: Vec<String>,
    m: HashMap<String, usize>,
}

impl From<Vec<String>> for Quark {
    fn from(value: Vec<String>) -> Self {
        let m = value.iter().enumerate().map(|(i, s)| (s.to_string(), i)).collect();
        Self { v: value, m }
    }
}

impl StringTable for Quark {
    fn to_id(&self, s: &str) -> Option<usize> {
        self.m.get(s).copied()
    }

    fn len(&self) -> usize {
        self.v.len()
    }
}

impl TextVectorizer for Quark {
    fn find_or_insert(&mut self, key: &str) -> usize {
        if let Some(&idx) = self.m.get(key) {
            return idx;
        }
        let idx = self.v.len();
        self.m.insert(key.to_string(), idx);
        self.v.push(key.to_string());
        idx
    }
}

impl Quark {
    /// Ids of the known strings in `keys`; unknown strings are skipped.
    pub fn ids<'a, I>(&self, keys: I) -> Vec<usize>
    where
        I: IntoIterator<Item = &'a String>,
    {
        keys.into_iter().filter_map(|k| self.to_id(k)).collect()
    }

    /// False when the table was built from a list with repeated strings.
    pub fn is_unique(&self) -> bool {
        self.m.len() == self.v.len()
    }

    pub fn as_slice(&self) -> &[String] {
        &self.v
    }
}
