use std::time::Instant;

use rayon::prelude::*;

use crate::{
    dictionary::Dictionary,
    evaluation::{EvaluationMonitor, Evaluator, Measure},
    maxent::trainer,
    params::TrainingParams,
    sample::Sample,
    segmenter::Segmenter,
    Error, Result,
};

/// Splits `samples` for one run: sample `i` is held out when
/// `i % folds == fold`, everything else is used for training.
pub(crate) fn partition(samples: &[Sample], folds: usize, fold: usize) -> (Vec<Sample>, Vec<&Sample>) {
    let mut training = Vec::with_capacity(samples.len());
    let mut test = Vec::with_capacity(samples.len() / folds + 1);
    for (i, sample) in samples.iter().enumerate() {
        if i % folds == fold {
            test.push(sample);
        } else {
            training.push(sample.clone());
        }
    }
    (training, test)
}

/// n-fold cross validation; the measures of all runs are merged into one.
#[derive(Debug, Clone)]
pub struct CrossValidator {
    params: TrainingParams,
    folds: usize,
    dictionary: Option<Dictionary>,
}

impl CrossValidator {
    pub fn new(params: TrainingParams, folds: usize) -> Result<Self> {
        if folds < 2 {
            return Err(Error::InvalidParameter { name: "folds".into(), value: folds.to_string() });
        }
        Ok(Self { params, folds, dictionary: None })
    }

    pub fn with_dictionary(mut self, dictionary: Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    fn run(
        &self,
        samples: &[Sample],
        fold: usize,
        listener: Option<&mut dyn EvaluationMonitor>,
    ) -> Result<Measure> {
        let begin = Instant::now();
        let (training, test) = partition(samples, self.folds, fold);
        log::info!("run {}/{}: {} training, {} test samples", fold + 1, self.folds, training.len(), test.len());
        let generator = self.params.context_generator();
        let model = trainer::train(&training, &self.params, generator.as_ref())?;
        let segmenter = Segmenter::from_model(&model);
        let mut evaluator = Evaluator::new(&segmenter);
        if let Some(dictionary) = &self.dictionary {
            evaluator = evaluator.with_dictionary(dictionary);
        }
        if let Some(listener) = listener {
            evaluator = evaluator.with_listener(listener);
        }
        evaluator.evaluate(test)?;
        let measure = evaluator.into_measure();
        log::info!(
            "run {}/{} done: F-Measure {:.5}, time cost: {:?}",
            fold + 1,
            self.folds,
            measure.fmeasure(),
            begin.elapsed()
        );
        Ok(measure)
    }

    /// Runs the folds in parallel.
    pub fn evaluate(&self, samples: &[Sample]) -> Result<Measure> {
        let measures = (0..self.folds)
            .into_par_iter()
            .map(|fold| self.run(samples, fold, None))
            .collect::<Result<Vec<_>>>()?;
        Ok(measures.into_iter().sum())
    }

    /// Runs the folds one after the other, reporting every evaluated sample
    /// to `listener`.
    pub fn evaluate_with(&self, samples: &[Sample], listener: &mut dyn EvaluationMonitor) -> Result<Measure> {
        let mut total = Measure::default();
        for fold in 0..self.folds {
            total = total.merge(self.run(samples, fold, Some(&mut *listener))?);
        }
        Ok(total)
    }
}
