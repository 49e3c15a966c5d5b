use std::{collections::HashMap, fmt::Display, str::FromStr};

use serde::{Deserialize, Serialize};

use crate::{
    params::TrainingParams,
    quark::{Quark, StringTable, TextVectorizer},
    sample::Sample,
    Error, Result,
};

use super::{
    context::ContextGenerator, gis::GisTrainer, model::MaxentModel, perceptron::PerceptronTrainer,
};

/// Parameter estimation strategy.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Algorithm {
    /// event based: generalized iterative scaling over independent positions
    #[default]
    Gis,
    /// sequence based: averaged perceptron over decoded sentences
    Perceptron,
}

impl FromStr for Algorithm {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "gis" | "maxent" => Ok(Algorithm::Gis),
            "perceptron" | "perceptron_sequence" => Ok(Algorithm::Perceptron),
            _ => Err(Error::UnsupportedAlgorithm(s.to_string())),
        }
    }
}

impl Display for Algorithm {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(match self {
            Algorithm::Gis => "gis",
            Algorithm::Perceptron => "perceptron",
        })
    }
}

impl Algorithm {
    pub fn trainer(self, params: &TrainingParams) -> Box<dyn Trainer> {
        match self {
            Algorithm::Gis => Box::new(GisTrainer::new(params.iterations, params.cutoff)),
            Algorithm::Perceptron => Box::new(PerceptronTrainer::new(
                params.iterations,
                params.cutoff,
                params.beam_size,
            )),
        }
    }
}

pub trait Trainer {
    /// Estimates a model from labeled samples, using `generator` for the
    /// features of every position.
    fn train(&self, samples: &[Sample], generator: &dyn ContextGenerator) -> Result<MaxentModel>;
}

/// Trains with the configured algorithm and stamps the decoding metadata
/// (beam size, language, generator) on the model.
///
/// `generator` is expected to be the one `params` describes.
pub fn train(
    samples: &[Sample],
    params: &TrainingParams,
    generator: &dyn ContextGenerator,
) -> Result<MaxentModel> {
    log::info!(
        "training (algorithm: {}, iterations: {}, cutoff: {}, beam_size: {}) on {} samples",
        params.algorithm,
        params.iterations,
        params.cutoff,
        params.beam_size,
        samples.len()
    );
    let model = params.algorithm.trainer(params).train(samples, generator)?;
    Ok(model
        .with_beam_size(params.beam_size)
        .with_language(&params.language)
        .with_generator(params.generator, params.features))
}

/// Builds the feature table from the training contexts, keeping the features
/// seen in at least `cutoff` events. Ids follow first appearance.
pub(crate) fn index_features<'a, I>(contexts: I, cutoff: usize) -> Quark
where
    I: IntoIterator<Item = &'a [String]>,
{
    let mut counts: HashMap<&str, usize> = HashMap::new();
    let mut order = Vec::new();
    for context in contexts {
        let mut seen: Vec<&str> = context.iter().map(String::as_str).collect();
        seen.sort_unstable();
        seen.dedup();
        for f in seen {
            let n = counts.entry(f).or_insert_with(|| {
                order.push(f);
                0
            });
            *n += 1;
        }
    }
    let mut quark = Quark::default();
    for f in order.into_iter().filter(|f| counts[f] >= cutoff) {
        quark.find_or_insert(f);
    }
    log::info!("feature cutoff {cutoff}: kept {} of {} features", quark.len(), counts.len());
    quark
}
