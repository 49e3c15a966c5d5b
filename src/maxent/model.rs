use std::{borrow::Cow, fs::File, io::Write, path::Path};

use serde::{Deserialize, Serialize};

use crate::{
    quark::{Quark, StringTable},
    sample::Tag,
    Error, Result,
};

use super::{
    context::{ContextGenerator, FeatureTemplates, GeneratorKind},
    trainer::Algorithm,
};

pub const DEFAULT_BEAM_SIZE: usize = 3;
pub const DEFAULT_LANGUAGE: &str = "zh";

const FORMAT: &str = "wordseg-maxent";
const VERSION: u32 = 1;

/// Anything that turns a feature context into a distribution over tags.
pub trait Model {
    /// Outcome order of the vectors returned by [`Model::eval`].
    fn outcomes(&self) -> &[Tag];
    fn eval(&self, context: &[String]) -> Vec<f64>;
}

/// Normalizes `scores` in place: `p(o) = exp(s(o)) / Σ exp(s(o'))`.
pub(crate) fn softmax(scores: &mut [f64]) {
    let max = scores.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let mut sum = 0.0;
    for s in scores.iter_mut() {
        *s = (*s - max).exp();
        sum += *s;
    }
    for s in scores.iter_mut() {
        *s /= sum;
    }
}

/// Softmax of the summed weight rows of `fids` in a flat
/// `[feature * n + outcome]` table.
pub(crate) fn eval_weights(weights: &[f64], n: usize, fids: &[usize]) -> Vec<f64> {
    let mut scores = vec![0.0; n];
    for &fid in fids {
        let row = &weights[fid * n..(fid + 1) * n];
        for (s, w) in scores.iter_mut().zip(row) {
            *s += w;
        }
    }
    softmax(&mut scores);
    scores
}

/// A log-linear model over the BMES tags.
///
/// The weight of feature `f` for outcome `o` is stored at
/// `weights[f * num_outcomes + o]`.
#[derive(Debug, Clone)]
pub struct MaxentModel {
    language: String,
    beam_size: usize,
    algorithm: Algorithm,
    generator: GeneratorKind,
    templates: FeatureTemplates,
    outcomes: Vec<Tag>,
    features: Quark,
    weights: Vec<f64>,
}

fn all_templates() -> u32 {
    FeatureTemplates::all().bits()
}

#[derive(Debug, Serialize, Deserialize)]
struct Artifact<'a> {
    format: Cow<'a, str>,
    version: u32,
    language: Cow<'a, str>,
    beam_size: u32,
    algorithm: Algorithm,
    #[serde(default)]
    generator: GeneratorKind,
    /// bits of the `conf` generator templates
    #[serde(default = "all_templates")]
    templates: u32,
    outcomes: Cow<'a, [Tag]>,
    features: Cow<'a, [String]>,
    weights: Cow<'a, [f64]>,
}

impl MaxentModel {
    pub(crate) fn new(
        algorithm: Algorithm,
        outcomes: Vec<Tag>,
        features: Quark,
        weights: Vec<f64>,
    ) -> Self {
        debug_assert_eq!(weights.len(), features.len() * outcomes.len());
        Self {
            language: DEFAULT_LANGUAGE.to_string(),
            beam_size: DEFAULT_BEAM_SIZE,
            algorithm,
            generator: GeneratorKind::default(),
            templates: FeatureTemplates::default(),
            outcomes,
            features,
            weights,
        }
    }

    pub fn with_beam_size(mut self, beam_size: usize) -> Self {
        self.beam_size = beam_size.max(1);
        self
    }

    pub fn with_language(mut self, language: &str) -> Self {
        self.language = language.to_string();
        self
    }

    /// Records the context generator the model was trained with.
    pub fn with_generator(mut self, generator: GeneratorKind, templates: FeatureTemplates) -> Self {
        self.generator = generator;
        self.templates = templates;
        self
    }

    pub fn generator(&self) -> GeneratorKind {
        self.generator
    }

    pub fn templates(&self) -> FeatureTemplates {
        self.templates
    }

    /// A new instance of the generator recorded at training time.
    pub fn context_generator(&self) -> Box<dyn ContextGenerator> {
        self.generator.build(self.templates)
    }

    pub fn language(&self) -> &str {
        &self.language
    }

    pub fn beam_size(&self) -> usize {
        self.beam_size
    }

    pub fn algorithm(&self) -> Algorithm {
        self.algorithm
    }

    pub fn num_features(&self) -> usize {
        self.features.len()
    }

    pub fn num_outcomes(&self) -> usize {
        self.outcomes.len()
    }

    pub fn outcome_index(&self, tag: Tag) -> Option<usize> {
        self.outcomes.iter().position(|&t| t == tag)
    }

    /// Weight of a (feature, outcome) pair; zero when either is unknown.
    pub fn weight(&self, feature: &str, outcome: Tag) -> f64 {
        match (self.features.to_id(feature), self.outcome_index(outcome)) {
            (Some(fid), Some(oid)) => self.weights[fid * self.outcomes.len() + oid],
            _ => 0.0,
        }
    }

    /// Distribution over the outcomes for already indexed features.
    pub(crate) fn eval_ids(&self, fids: &[usize]) -> Vec<f64> {
        eval_weights(&self.weights, self.outcomes.len(), fids)
    }

    pub fn best_outcome(&self, probs: &[f64]) -> Tag {
        let mut best = 0;
        for (i, p) in probs.iter().enumerate().skip(1) {
            if *p > probs[best] {
                best = i;
            }
        }
        self.outcomes[best]
    }

    fn artifact(&self) -> Artifact<'_> {
        Artifact {
            format: Cow::Borrowed(FORMAT),
            version: VERSION,
            language: Cow::Borrowed(&self.language),
            beam_size: self.beam_size as u32,
            algorithm: self.algorithm,
            generator: self.generator,
            templates: self.templates.bits(),
            outcomes: Cow::Borrowed(&self.outcomes),
            features: Cow::Borrowed(self.features.as_slice()),
            weights: Cow::Borrowed(&self.weights),
        }
    }

    /// Writes the model as a BSON document.
    pub fn write<W: Write>(&self, mut wtr: W) -> Result<()> {
        let buffer = bson::to_vec(&self.artifact())
            .map_err(|e| Error::InvalidModel(format!("failed to encode model: {e}")))?;
        wtr.write_all(&buffer)?;
        Ok(())
    }

    pub fn save<P: AsRef<Path>>(&self, path: P) -> Result<()> {
        let mut wtr = std::io::BufWriter::new(File::create(path)?);
        self.write(&mut wtr)?;
        wtr.flush()?;
        Ok(())
    }

    pub fn from_path<P: AsRef<Path>>(path: P) -> Result<Self> {
        Self::from_memory(&std::fs::read(path)?)
    }

    pub fn from_memory(buffer: &[u8]) -> Result<Self> {
        let artifact: Artifact = bson::from_slice(buffer)
            .map_err(|e| Error::InvalidModel(format!("failed to decode model: {e}")))?;
        if artifact.format != FORMAT {
            return Err(Error::InvalidModel(format!("unrecognized model kind: {}", artifact.format)));
        }
        if artifact.version != VERSION {
            return Err(Error::InvalidModel(format!("unsupported model version: {}", artifact.version)));
        }
        if artifact.outcomes.is_empty() {
            return Err(Error::InvalidModel("model has no outcomes".into()));
        }
        if artifact.weights.len() != artifact.features.len() * artifact.outcomes.len() {
            return Err(Error::InvalidModel(format!(
                "weight table has {} entries, expected {} features x {} outcomes",
                artifact.weights.len(),
                artifact.features.len(),
                artifact.outcomes.len()
            )));
        }
        let features = Quark::from(artifact.features.into_owned());
        if !features.is_unique() {
            return Err(Error::InvalidModel("duplicate feature names".into()));
        }
        Ok(Self {
            language: artifact.language.into_owned(),
            beam_size: (artifact.beam_size as usize).max(1),
            algorithm: artifact.algorithm,
            generator: artifact.generator,
            templates: FeatureTemplates::from_bits_truncate(artifact.templates),
            outcomes: artifact.outcomes.into_owned(),
            features,
            weights: artifact.weights.into_owned(),
        })
    }

    /// Plain-text (JSON) rendering of the model.
    pub fn dump<W: Write>(&self, wtr: W) -> Result<()> {
        serde_json::to_writer_pretty(wtr, &self.artifact())?;
        Ok(())
    }
}

impl Model for MaxentModel {
    fn outcomes(&self) -> &[Tag] {
        &self.outcomes
    }

    fn eval(&self, context: &[String]) -> Vec<f64> {
        self.eval_ids(&self.features.ids(context))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn toy() -> MaxentModel {
        let features = Quark::from(vec!["c0=我".to_string(), "c1=喜".to_string()]);
        #[rustfmt::skip]
        let weights = vec![
            1.0, 0.5, 0.0, 0.0,
            -0.25, 2.0, 0.0, 0.0,
        ];
        MaxentModel::new(Algorithm::Gis, Tag::ALL.to_vec(), features, weights)
    }

    #[test]
    fn eval_is_softmax() {
        let model = toy();
        let probs = model.eval(&["c0=我".to_string(), "c1=喜".to_string(), "unknown".to_string()]);
        let scores = [0.75f64, 2.5, 0.0, 0.0];
        let z: f64 = scores.iter().map(|s| s.exp()).sum();
        for (p, s) in probs.iter().zip(scores) {
            assert!((p - s.exp() / z).abs() < 1e-12);
        }
        assert_eq!(model.best_outcome(&probs), Tag::B);
    }

    #[test]
    fn empty_context_is_uniform() {
        let probs = toy().eval(&[]);
        assert!(probs.iter().all(|p| (p - 0.25).abs() < 1e-12));
    }

    #[test]
    fn weight_lookup() {
        let model = toy();
        assert_eq!(model.weight("c1=喜", Tag::B), 2.0);
        assert_eq!(model.weight("c1=喜", Tag::E), 0.0);
        assert_eq!(model.weight("nope", Tag::S), 0.0);
    }

    #[test]
    fn round_trip() {
        let model = toy().with_beam_size(5).with_language("zh-tw");
        let mut buffer = Vec::new();
        model.write(&mut buffer).unwrap();
        let loaded = MaxentModel::from_memory(&buffer).unwrap();
        assert_eq!(loaded.beam_size(), 5);
        assert_eq!(loaded.language(), "zh-tw");
        let context = vec!["c0=我".to_string(), "c1=喜".to_string()];
        assert_eq!(loaded.eval(&context), model.eval(&context));
    }

    #[test]
    fn generator_round_trip() {
        let templates = FeatureTemplates::C0 | FeatureTemplates::T_1;
        let model = toy().with_generator(GeneratorKind::Conf, templates);
        let mut buffer = Vec::new();
        model.write(&mut buffer).unwrap();
        let loaded = MaxentModel::from_memory(&buffer).unwrap();
        assert_eq!(loaded.generator(), GeneratorKind::Conf);
        assert_eq!(loaded.templates(), templates);

        let chars = vec!["我".to_string(), "喜".to_string()];
        let context = loaded.context_generator().context(1, &chars, &[Tag::S], None);
        assert_eq!(context, vec!["c0=喜".to_string(), "t_1=S".to_string()]);
    }

    #[test]
    fn generator_defaults_when_missing() {
        let doc = bson::doc! {
            "format": FORMAT,
            "version": VERSION,
            "language": "zh",
            "beam_size": 3,
            "algorithm": "gis",
            "outcomes": ["S", "B", "M", "E"],
            "features": ["c0=我"],
            "weights": [0.0, 1.0, 0.0, 0.0],
        };
        let loaded = MaxentModel::from_memory(&bson::to_vec(&doc).unwrap()).unwrap();
        assert_eq!(loaded.generator(), GeneratorKind::Default);
        assert_eq!(loaded.templates(), FeatureTemplates::all());
    }

    #[test]
    fn invalid_model() {
        for buffer in [&b""[..], b"abcdefg", b"lCRF"] {
            assert!(matches!(MaxentModel::from_memory(buffer), Err(Error::InvalidModel(..))));
        }
        let doc = bson::doc! { "format": "lCRF", "version": 1 };
        let buffer = bson::to_vec(&doc).unwrap();
        assert!(matches!(MaxentModel::from_memory(&buffer), Err(Error::InvalidModel(..))));
    }

    #[test]
    fn truncated_weights() {
        let binding = toy();
        let mut artifact = binding.artifact();
        artifact.weights = Cow::Owned(vec![0.0; 3]);
        let buffer = bson::to_vec(&artifact).unwrap();
        let ret = MaxentModel::from_memory(&buffer);
        assert!(matches!(ret, Err(Error::InvalidModel(..))));
    }

    #[test]
    fn dump_json() {
        let mut out = Vec::new();
        toy().dump(&mut out).unwrap();
        let value: serde_json::Value = serde_json::from_slice(&out).unwrap();
        assert_eq!(value["format"], "wordseg-maxent");
        assert_eq!(value["outcomes"], serde_json::json!(["S", "B", "M", "E"]));
    }
}
