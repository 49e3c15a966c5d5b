use std::time::Instant;

use crate::{
    quark::{Quark, StringTable},
    sample::{Sample, Tag},
    Error, Result,
};

use super::{
    beam::BeamSearch,
    context::ContextGenerator,
    event::event_stream,
    model::{eval_weights, MaxentModel, Model},
    trainer::{index_features, Algorithm, Trainer},
    validator::BmesValidator,
};

/// The weights being trained, seen through the [`Model`] interface so the
/// beam search can decode with them.
struct Snapshot<'a> {
    features: &'a Quark,
    weights: &'a [f64],
}

impl Model for Snapshot<'_> {
    fn outcomes(&self) -> &[Tag] {
        &Tag::ALL
    }

    fn eval(&self, context: &[String]) -> Vec<f64> {
        eval_weights(self.weights, Tag::ALL.len(), &self.features.ids(context))
    }
}

/// Running weights plus the step-weighted update sums needed for averaging:
/// `avg = w - u / c`.
struct Averaged {
    weights: Vec<f64>,
    updates: Vec<f64>,
    step: f64,
}

impl Averaged {
    fn new(size: usize) -> Self {
        Self { weights: vec![0.0; size], updates: vec![0.0; size], step: 1.0 }
    }

    fn update(&mut self, fids: &[usize], outcome: usize, delta: f64) {
        let n = Tag::ALL.len();
        for &f in fids {
            let k = f * n + outcome;
            self.weights[k] += delta;
            self.updates[k] += self.step * delta;
        }
    }

    fn averaged(&self) -> Vec<f64> {
        self.weights.iter().zip(&self.updates).map(|(w, u)| w - u / self.step).collect()
    }
}

fn outcome_id(tag: Tag) -> usize {
    Tag::ALL.iter().position(|&t| t == tag).unwrap_or_default()
}

/// Sequence-level averaged perceptron.
///
/// Every sentence is decoded with the current weights; when the predicted
/// tags differ from the gold ones, the features of the gold path are
/// rewarded and those of the predicted path penalized.
#[derive(Debug, Clone)]
pub struct PerceptronTrainer {
    iterations: usize,
    cutoff: usize,
    beam_size: usize,
}

impl PerceptronTrainer {
    pub fn new(iterations: usize, cutoff: usize, beam_size: usize) -> Self {
        Self { iterations, cutoff, beam_size }
    }
}

impl Trainer for PerceptronTrainer {
    fn train(&self, samples: &[Sample], generator: &dyn ContextGenerator) -> Result<MaxentModel> {
        let begin = Instant::now();
        let features = {
            let events: Vec<_> = event_stream(samples, generator).collect();
            index_features(events.iter().map(|e| e.context.as_slice()), self.cutoff)
        };
        if features.is_empty() {
            return Err(Error::InvalidSample(format!(
                "no features left after the feature cutoff ({})",
                self.cutoff
            )));
        }
        log::info!("number of features: {}, time cost: {:?}", features.len(), begin.elapsed());

        let beam = BeamSearch::new(self.beam_size);
        let mut params = Averaged::new(features.len() * Tag::ALL.len());
        let samples: Vec<&Sample> = samples.iter().filter(|s| !s.is_empty()).collect();
        for it in 1..=self.iterations {
            let begin = Instant::now();
            let mut errors = 0;
            for sample in &samples {
                let predicted = {
                    let model = Snapshot { features: &features, weights: &params.weights };
                    beam.best_sequence(
                        &model,
                        sample.chars(),
                        sample.additional_context(),
                        generator,
                        &BmesValidator,
                    )?
                };
                if predicted.tags() != sample.tags() {
                    errors += 1;
                    for i in 0..sample.len() {
                        let gold = generator.context(i, sample.chars(), sample.tags(), sample.additional_context());
                        let pred =
                            generator.context(i, sample.chars(), predicted.tags(), sample.additional_context());
                        if sample.tags()[i] == predicted.tags()[i] && gold == pred {
                            continue;
                        }
                        params.update(&features.ids(&gold), outcome_id(sample.tags()[i]), 1.0);
                        params.update(&features.ids(&pred), outcome_id(predicted.tags()[i]), -1.0);
                    }
                }
                params.step += 1.0;
            }
            log::info!(
                "iteration {it}: {errors}/{} sentences wrong, time cost: {:?}",
                samples.len(),
                begin.elapsed()
            );
            if errors == 0 {
                break;
            }
        }
        Ok(MaxentModel::new(Algorithm::Perceptron, Tag::ALL.to_vec(), features, params.averaged()))
    }
}
