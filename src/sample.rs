use std::{
    fmt::Display,
    fs::File,
    io::{BufRead, BufReader},
    path::Path,
    str::FromStr,
};

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Position of a character inside its word.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum Tag {
    /// single-character word
    S,
    /// first character of a word
    B,
    /// inner character of a word
    M,
    /// last character of a word
    E,
}

impl Tag {
    pub const ALL: [Tag; 4] = [Tag::S, Tag::B, Tag::M, Tag::E];

    pub fn as_str(&self) -> &'static str {
        match self {
            Tag::S => "S",
            Tag::B => "B",
            Tag::M => "M",
            Tag::E => "E",
        }
    }

    /// S and E close the word being built.
    #[inline]
    pub fn ends_word(&self) -> bool {
        matches!(self, Tag::S | Tag::E)
    }
}

impl Display for Tag {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Tag {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s {
            "S" => Ok(Tag::S),
            "B" => Ok(Tag::B),
            "M" => Ok(Tag::M),
            "E" => Ok(Tag::E),
            _ => Err(Error::InvalidSample(format!("unknown tag: {s}"))),
        }
    }
}

/// Joins characters into words, flushing the buffer after every S or E tag.
/// Characters left over by a malformed tag sequence form a trailing word.
pub fn to_words<S: AsRef<str>>(chars: &[S], tags: &[Tag]) -> Vec<String> {
    let mut words = Vec::new();
    let mut word = String::new();
    for (c, tag) in chars.iter().zip(tags) {
        word.push_str(c.as_ref());
        if tag.ends_word() {
            words.push(std::mem::take(&mut word));
        }
    }
    if !word.is_empty() {
        words.push(word);
    }
    words
}

/// A segmented sentence: one tag per character.
#[derive(Debug, Clone, Default)]
pub struct Sample {
    chars: Vec<String>,
    tags: Vec<Tag>,
    additional_context: Option<Vec<Vec<String>>>,
}

impl Sample {
    pub fn new(chars: Vec<String>, tags: Vec<Tag>) -> Result<Self> {
        Self::with_context(chars, tags, None)
    }

    /// `additional_context` is handed to the context generator untouched.
    pub fn with_context(
        chars: Vec<String>,
        tags: Vec<Tag>,
        additional_context: Option<Vec<Vec<String>>>,
    ) -> Result<Self> {
        if chars.len() != tags.len() {
            return Err(Error::InvalidSample(format!(
                "there must be exactly one tag for each character. chars: {}, tags: {}",
                chars.len(),
                tags.len()
            )));
        }
        if chars.iter().any(String::is_empty) {
            return Err(Error::InvalidSample(
                "empty elements are not allowed in sentence characters".into(),
            ));
        }
        Ok(Self { chars, tags, additional_context })
    }

    /// Parses a line of whitespace separated words.
    pub fn parse(line: &str) -> Result<Self> {
        let mut chars = Vec::new();
        let mut tags = Vec::new();
        for word in line.split_whitespace() {
            let n = word.chars().count();
            for (i, c) in word.chars().enumerate() {
                chars.push(c.to_string());
                tags.push(match (i, n) {
                    (_, 1) => Tag::S,
                    (0, _) => Tag::B,
                    (i, n) if i == n - 1 => Tag::E,
                    _ => Tag::M,
                });
            }
        }
        Self::new(chars, tags)
    }

    pub fn chars(&self) -> &[String] {
        &self.chars
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn additional_context(&self) -> Option<&[Vec<String>]> {
        self.additional_context.as_deref()
    }

    pub fn len(&self) -> usize {
        self.chars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.chars.is_empty()
    }

    pub fn words(&self) -> Vec<String> {
        to_words(&self.chars, &self.tags)
    }

    /// The sentence in corpus form, every word followed by a space.
    pub fn to_sentence(&self) -> String {
        let mut s = String::new();
        for (c, tag) in self.chars.iter().zip(&self.tags) {
            s.push_str(c);
            if tag.ends_word() {
                s.push(' ');
            }
        }
        s
    }
}

impl PartialEq for Sample {
    fn eq(&self, other: &Self) -> bool {
        self.chars == other.chars && self.tags == other.tags
    }
}

impl Display for Sample {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        for (i, (c, tag)) in self.chars.iter().zip(&self.tags).enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{c}_{tag}")?;
        }
        Ok(())
    }
}

/// Reads one sample per line.
///
/// A line that cannot be decoded is logged and replaced by an empty sample so
/// that one broken sentence does not abort a whole corpus.
pub struct SampleStream<R> {
    reader: R,
    buf: Vec<u8>,
}

impl<R: BufRead> SampleStream<R> {
    pub fn new(reader: R) -> Self {
        Self { reader, buf: Vec::new() }
    }
}

impl SampleStream<BufReader<File>> {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        Ok(Self::new(BufReader::new(File::open(path)?)))
    }
}

impl<R: BufRead> Iterator for SampleStream<R> {
    type Item = Result<Sample>;

    fn next(&mut self) -> Option<Self::Item> {
        self.buf.clear();
        match self.reader.read_until(b'\n', &mut self.buf) {
            Ok(0) => None,
            Ok(_) => {
                let parsed = std::str::from_utf8(&self.buf)
                    .map_err(|e| Error::InvalidSample(e.to_string()))
                    .and_then(|line| Sample::parse(line.trim_end_matches(['\n', '\r'])));
                match parsed {
                    Ok(sample) => Some(Ok(sample)),
                    Err(e) => {
                        log::warn!(
                            "error during parsing, ignoring sentence: {} ({e})",
                            String::from_utf8_lossy(&self.buf).trim_end()
                        );
                        Some(Ok(Sample::default()))
                    }
                }
            }
            Err(e) => Some(Err(e.into())),
        }
    }
}

/// An in-memory corpus. Empty sentences are dropped.
#[derive(Debug, Default, Clone)]
pub struct Dataset {
    samples: Vec<Sample>,
}

impl Dataset {
    pub fn read<R: BufRead>(reader: R) -> Result<Self> {
        let mut ds = Dataset::default();
        for sample in SampleStream::new(reader) {
            ds.push(sample?);
        }
        Ok(ds)
    }

    pub fn push(&mut self, sample: Sample) {
        if !sample.is_empty() {
            self.samples.push(sample);
        }
    }

    pub fn samples(&self) -> &[Sample] {
        &self.samples
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn total_chars(&self) -> usize {
        self.samples.iter().map(Sample::len).sum()
    }

    pub fn max_length(&self) -> usize {
        self.samples.iter().map(Sample::len).max().unwrap_or_default()
    }
}

impl TryFrom<File> for Dataset {
    type Error = Error;

    fn try_from(value: File) -> Result<Self> {
        Dataset::read(BufReader::new(value))
    }
}

impl<'a> FromIterator<&'a str> for Dataset {
    fn from_iter<T: IntoIterator<Item = &'a str>>(lines: T) -> Self {
        let mut ds = Dataset::default();
        for line in lines {
            match Sample::parse(line) {
                Ok(sample) => ds.push(sample),
                Err(e) => log::warn!("error during parsing, ignoring sentence: {line} ({e})"),
            }
        }
        ds
    }
}

impl FromIterator<Sample> for Dataset {
    fn from_iter<T: IntoIterator<Item = Sample>>(iter: T) -> Self {
        let mut ds = Dataset::default();
        iter.into_iter().for_each(|s| ds.push(s));
        ds
    }
}

#[cfg(test)]
mod tests {
    use std::io::Cursor;

    use super::*;

    fn strs(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn parse() {
        let sample = Sample::parse("我 喜欢 自然语言处理 。").unwrap();
        assert_eq!(
            sample.chars(),
            strs(&["我", "喜", "欢", "自", "然", "语", "言", "处", "理", "。"]).as_slice()
        );
        use Tag::*;
        assert_eq!(sample.tags(), &[S, B, E, B, M, M, M, M, E, S]);
        assert_eq!(sample.words(), strs(&["我", "喜欢", "自然语言处理", "。"]));
        assert_eq!(sample.to_sentence(), "我 喜欢 自然语言处理 。 ");
    }

    #[test]
    fn mismatched_lengths() {
        let ret = Sample::new(strs(&["a", "b"]), vec![Tag::S]);
        assert!(matches!(ret, Err(Error::InvalidSample(..))));
        let ret = Sample::new(strs(&["a", ""]), vec![Tag::S, Tag::S]);
        assert!(matches!(ret, Err(Error::InvalidSample(..))));
    }

    #[test]
    fn trailing_word_is_flushed() {
        let words = to_words(&["a", "b", "c"], &[Tag::S, Tag::B, Tag::M]);
        assert_eq!(words, strs(&["a", "bc"]));
    }

    #[test]
    fn display() {
        let sample = Sample::parse("ab c").unwrap();
        assert_eq!(sample.to_string(), "a_B b_E c_S");
    }

    #[test]
    fn stream_skips_broken_lines() {
        let mut input = "我 喜欢\n".as_bytes().to_vec();
        input.extend_from_slice(&[0xff, 0xfe, b'\n']);
        input.extend_from_slice("你 好\r\n".as_bytes());
        let samples: Vec<Sample> = SampleStream::new(Cursor::new(input))
            .collect::<Result<_>>()
            .unwrap();
        assert_eq!(samples.len(), 3);
        assert_eq!(samples[0].len(), 3);
        assert!(samples[1].is_empty());
        assert_eq!(samples[2].words(), strs(&["你", "好"]));
    }

    #[test]
    fn dataset_drops_empty() {
        let ds: Dataset = "a bc\n\nd".lines().collect();
        assert_eq!(ds.len(), 2);
        assert_eq!(ds.total_chars(), 4);
        assert_eq!(ds.max_length(), 3);
    }
}
