use std::{fmt::Display, str::FromStr};

use bitflags::bitflags;
use serde::{Deserialize, Serialize};

use crate::{sample::Tag, Error, Result};

bitflags! {
    /// Feature templates around the current character `c0`.
    ///
    /// `c_n`/`cn` are the characters n positions before/after the current one,
    /// `t_1` is the previous tag and `t_2` the pair of the two previous tags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
    pub struct FeatureTemplates: u32 {
        const C_2 = 1 << 0;
        const C_1 = 1 << 1;
        const C0 = 1 << 2;
        const C1 = 1 << 3;
        const C2 = 1 << 4;
        const C_2C_1 = 1 << 5;
        const C_1C0 = 1 << 6;
        const C0C1 = 1 << 7;
        const C1C2 = 1 << 8;
        const C_1C1 = 1 << 9;
        const C_2C0 = 1 << 10;
        const C_1C0C1 = 1 << 11;
        const T_1 = 1 << 12;
        const T_2 = 1 << 13;

        const UNIGRAMS = Self::C_2.bits() | Self::C_1.bits() | Self::C0.bits() | Self::C1.bits() | Self::C2.bits();
        const BIGRAMS = Self::C_2C_1.bits() | Self::C_1C0.bits() | Self::C0C1.bits() | Self::C1C2.bits() | Self::C_1C1.bits();
        const EXTENDED = Self::C_2C0.bits() | Self::C_1C0C1.bits();
        const TAGS = Self::T_1.bits() | Self::T_2.bits();
    }
}

/// Configuration keys, e.g. `feature.c_1c0=false`.
const KEYS: [(&str, FeatureTemplates); 14] = [
    ("feature.c_2", FeatureTemplates::C_2),
    ("feature.c_1", FeatureTemplates::C_1),
    ("feature.c0", FeatureTemplates::C0),
    ("feature.c1", FeatureTemplates::C1),
    ("feature.c2", FeatureTemplates::C2),
    ("feature.c_2c_1", FeatureTemplates::C_2C_1),
    ("feature.c_1c0", FeatureTemplates::C_1C0),
    ("feature.c0c1", FeatureTemplates::C0C1),
    ("feature.c1c2", FeatureTemplates::C1C2),
    ("feature.c_1c1", FeatureTemplates::C_1C1),
    ("feature.c_2c0", FeatureTemplates::C_2C0),
    ("feature.c_1c0c1", FeatureTemplates::C_1C0C1),
    ("feature.t_1", FeatureTemplates::T_1),
    ("feature.t_2", FeatureTemplates::T_2),
];

impl Default for FeatureTemplates {
    fn default() -> Self {
        Self::all()
    }
}

impl FeatureTemplates {
    pub fn from_key(key: &str) -> Option<Self> {
        KEYS.iter().find(|(k, _)| *k == key).map(|(_, f)| *f)
    }

    pub fn keys() -> impl Iterator<Item = &'static str> {
        KEYS.iter().map(|(k, _)| *k)
    }
}

/// Produces the features describing position `index` of a sentence.
///
/// Implementations may read every character but only the tags strictly before
/// `index`: during decoding `prior_tags` holds the tags of one hypothesis and
/// nothing after it exists yet.
pub trait ContextGenerator: Send + Sync {
    fn context(
        &self,
        index: usize,
        chars: &[String],
        prior_tags: &[Tag],
        additional_context: Option<&[Vec<String>]>,
    ) -> Vec<String>;
}

fn template_context(
    templates: FeatureTemplates,
    index: usize,
    chars: &[String],
    prior_tags: &[Tag],
) -> Vec<String> {
    let at = |offset: isize| -> Option<&str> {
        let i = index as isize + offset;
        if i < 0 {
            return None;
        }
        chars.get(i as usize).map(String::as_str)
    };
    let tag_at = |back: usize| -> Option<Tag> {
        index.checked_sub(back).and_then(|i| prior_tags.get(i)).copied()
    };
    let c_2 = at(-2);
    let c_1 = at(-1);
    let c0 = chars[index].as_str();
    let c1 = at(1);
    let c2 = at(2);
    let t_1 = tag_at(1);
    let t_2 = tag_at(2);

    let has = |f: FeatureTemplates| templates.contains(f);
    let mut features = Vec::with_capacity(16);
    if has(FeatureTemplates::C0) {
        features.push(format!("c0={c0}"));
    }
    if let Some(c_1) = c_1 {
        if has(FeatureTemplates::C_1) {
            features.push(format!("c_1={c_1}"));
        }
        if let (true, Some(t_1)) = (has(FeatureTemplates::T_1), t_1) {
            features.push(format!("t_1={t_1}"));
        }
        if has(FeatureTemplates::C_1C0) {
            features.push(format!("c_1c0={c_1}{c0}"));
        }
    }
    if let Some(c_2) = c_2 {
        if has(FeatureTemplates::C_2) {
            features.push(format!("c_2={c_2}"));
        }
        if let (true, Some(t_2), Some(t_1)) = (has(FeatureTemplates::T_2), t_2, t_1) {
            features.push(format!("t_2={t_2},{t_1}"));
        }
        if has(FeatureTemplates::C_2C0) {
            features.push(format!("c_2c0={c_2}{c0}"));
        }
        if let (true, Some(c_1)) = (has(FeatureTemplates::C_2C_1), c_1) {
            features.push(format!("c_2c_1={c_2}{c_1}"));
        }
    }
    if let Some(c1) = c1 {
        if has(FeatureTemplates::C1) {
            features.push(format!("c1={c1}"));
        }
        if has(FeatureTemplates::C0C1) {
            features.push(format!("c0c1={c0}{c1}"));
        }
        if let Some(c2) = c2 {
            if has(FeatureTemplates::C2) {
                features.push(format!("c2={c2}"));
            }
            if has(FeatureTemplates::C1C2) {
                features.push(format!("c1c2={c1}{c2}"));
            }
        }
        if let Some(c_1) = c_1 {
            if has(FeatureTemplates::C_1C1) {
                features.push(format!("c_1c1={c_1}{c1}"));
            }
            if has(FeatureTemplates::C_1C0C1) {
                features.push(format!("c_1c0c1={c_1}{c0}{c1}"));
            }
        }
    }
    features
}

/// Character unigrams c₋₂..c₂ and the bigrams c₋₂c₋₁, c₋₁c₀, c₀c₁, c₁c₂, c₋₁c₁.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultContextGenerator;

impl DefaultContextGenerator {
    pub const TEMPLATES: FeatureTemplates =
        FeatureTemplates::UNIGRAMS.union(FeatureTemplates::BIGRAMS);
}

impl ContextGenerator for DefaultContextGenerator {
    fn context(
        &self,
        index: usize,
        chars: &[String],
        prior_tags: &[Tag],
        _additional_context: Option<&[Vec<String>]>,
    ) -> Vec<String> {
        template_context(Self::TEMPLATES, index, chars, prior_tags)
    }
}

/// Every character template, extended ones included, and no tag history.
#[derive(Debug, Default, Clone, Copy)]
pub struct ClosedContextGenerator;

impl ClosedContextGenerator {
    pub const TEMPLATES: FeatureTemplates = FeatureTemplates::UNIGRAMS
        .union(FeatureTemplates::BIGRAMS)
        .union(FeatureTemplates::EXTENDED);
}

impl ContextGenerator for ClosedContextGenerator {
    fn context(
        &self,
        index: usize,
        chars: &[String],
        prior_tags: &[Tag],
        _additional_context: Option<&[Vec<String>]>,
    ) -> Vec<String> {
        template_context(Self::TEMPLATES, index, chars, prior_tags)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct ConfigurableContextGenerator {
    templates: FeatureTemplates,
}

impl ConfigurableContextGenerator {
    pub fn new(templates: FeatureTemplates) -> Self {
        Self { templates }
    }

    pub fn templates(&self) -> FeatureTemplates {
        self.templates
    }
}

impl ContextGenerator for ConfigurableContextGenerator {
    fn context(
        &self,
        index: usize,
        chars: &[String],
        prior_tags: &[Tag],
        _additional_context: Option<&[Vec<String>]>,
    ) -> Vec<String> {
        template_context(self.templates, index, chars, prior_tags)
    }
}

/// Selects one of the built-in context generators.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum GeneratorKind {
    #[default]
    Default,
    Closed,
    /// driven by the `feature.*` flags
    Conf,
}

impl GeneratorKind {
    pub fn build(self, templates: FeatureTemplates) -> Box<dyn ContextGenerator> {
        match self {
            GeneratorKind::Default => Box::new(DefaultContextGenerator),
            GeneratorKind::Closed => Box::new(ClosedContextGenerator),
            GeneratorKind::Conf => Box::new(ConfigurableContextGenerator::new(templates)),
        }
    }
}

impl FromStr for GeneratorKind {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "default" => Ok(GeneratorKind::Default),
            "closed" => Ok(GeneratorKind::Closed),
            "conf" => Ok(GeneratorKind::Conf),
            _ => Err(Error::UnsupportedGenerator(s.to_string())),
        }
    }
}

impl Display for GeneratorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            GeneratorKind::Default => "default",
            GeneratorKind::Closed => "closed",
            GeneratorKind::Conf => "conf",
        })
    }
}
