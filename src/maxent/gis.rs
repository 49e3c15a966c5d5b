use std::{
    collections::{hash_map::Entry, HashMap},
    time::Instant,
};

use crate::{
    quark::{Quark, StringTable},
    sample::{Sample, Tag},
    Error, Result,
};

use super::{
    context::ContextGenerator,
    event::{event_stream, Event},
    model::{eval_weights, MaxentModel},
    trainer::{index_features, Algorithm, Trainer},
};

/// Stop once the log-likelihood moves less than this between iterations.
const LL_THRESHOLD: f64 = 1e-4;

/// Identical events merged, with their features already mapped to ids.
#[derive(Debug)]
struct IndexedEvent {
    fids: Vec<usize>,
    outcome: usize,
    count: f64,
}

fn index_events(events: &[Event], features: &Quark, outcomes: &[Tag]) -> Vec<IndexedEvent> {
    let mut seen: HashMap<(usize, Vec<usize>), usize> = HashMap::new();
    let mut indexed: Vec<IndexedEvent> = Vec::new();
    let mut dropped = 0;
    for event in events {
        let mut fids = features.ids(&event.context);
        fids.sort_unstable();
        fids.dedup();
        if fids.is_empty() {
            dropped += 1;
            continue;
        }
        let Some(outcome) = outcomes.iter().position(|&t| t == event.outcome) else {
            continue;
        };
        match seen.entry((outcome, fids)) {
            Entry::Occupied(e) => indexed[*e.get()].count += 1.0,
            Entry::Vacant(e) => {
                let fids = e.key().1.clone();
                e.insert(indexed.len());
                indexed.push(IndexedEvent { fids, outcome, count: 1.0 });
            }
        }
    }
    if dropped > 0 {
        log::info!("dropped {dropped} events without any surviving feature");
    }
    indexed
}

/// Generalized iterative scaling.
///
/// Each iteration moves every observed (feature, outcome) weight by
/// `ln(observed / expected) / C`, where `C` is the largest number of active
/// features in any event.
#[derive(Debug, Clone)]
pub struct GisTrainer {
    iterations: usize,
    cutoff: usize,
}

impl GisTrainer {
    pub fn new(iterations: usize, cutoff: usize) -> Self {
        Self { iterations, cutoff }
    }

    fn estimate(&self, events: &[IndexedEvent], num_features: usize, num_outcomes: usize) -> Vec<f64> {
        let n = num_outcomes;
        let mut observed = vec![0.0; num_features * n];
        let mut correction = 1;
        let mut total = 0.0;
        for ev in events {
            correction = correction.max(ev.fids.len());
            total += ev.count;
            for &f in &ev.fids {
                observed[f * n + ev.outcome] += ev.count;
            }
        }
        let inv_c = 1.0 / correction as f64;
        log::info!("correction constant: {correction}");

        let mut weights = vec![0.0; num_features * n];
        let mut expected = vec![0.0; num_features * n];
        let mut prev_ll = 0.0;
        for it in 1..=self.iterations {
            let begin = Instant::now();
            expected.iter_mut().for_each(|x| *x = 0.0);
            let mut ll = 0.0;
            let mut correct = 0.0;
            for ev in events {
                let probs = eval_weights(&weights, n, &ev.fids);
                for &f in &ev.fids {
                    for (o, p) in probs.iter().enumerate() {
                        expected[f * n + o] += ev.count * p;
                    }
                }
                ll += ev.count * probs[ev.outcome].ln();
                if argmax(&probs) == ev.outcome {
                    correct += ev.count;
                }
            }
            for ((w, obs), exp) in weights.iter_mut().zip(&observed).zip(&expected) {
                if *obs > 0.0 && *exp > 0.0 {
                    *w += (obs / exp).ln() * inv_c;
                }
            }
            log::info!(
                "iteration {it}: loglikelihood={ll:.6}, accuracy={:.5}, time cost: {:?}",
                correct / total,
                begin.elapsed()
            );
            if it > 1 && (ll - prev_ll).abs() < LL_THRESHOLD {
                log::info!("converged after {it} iterations");
                break;
            }
            prev_ll = ll;
        }
        weights
    }
}

fn argmax(probs: &[f64]) -> usize {
    let mut best = 0;
    for (i, p) in probs.iter().enumerate().skip(1) {
        if *p > probs[best] {
            best = i;
        }
    }
    best
}

impl Trainer for GisTrainer {
    fn train(&self, samples: &[Sample], generator: &dyn ContextGenerator) -> Result<MaxentModel> {
        let begin = Instant::now();
        let events: Vec<Event> = event_stream(samples, generator).collect();
        let features = index_features(events.iter().map(|e| e.context.as_slice()), self.cutoff);
        let outcomes = Tag::ALL.to_vec();
        let indexed = index_events(&events, &features, &outcomes);
        if indexed.is_empty() {
            return Err(Error::InvalidSample(format!(
                "no training events left after the feature cutoff ({} events, cutoff {})",
                events.len(),
                self.cutoff
            )));
        }
        log::info!(
            "number of events: {}, unique events: {}, features: {}, time cost: {:?}",
            events.len(),
            indexed.len(),
            features.len(),
            begin.elapsed()
        );
        let weights = self.estimate(&indexed, features.len(), outcomes.len());
        Ok(MaxentModel::new(Algorithm::Gis, outcomes, features, weights))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::maxent::{context::DefaultContextGenerator, model::Model};

    fn corpus() -> Vec<Sample> {
        ["我 喜欢 你", "你 喜欢 我", "我们 喜欢 他们", "他 喜欢 我们"]
            .iter()
            .cycle()
            .take(20)
            .map(|s| Sample::parse(s).unwrap())
            .collect()
    }

    #[test]
    fn merges_identical_events() {
        let features = Quark::from(vec!["a".to_string(), "b".to_string()]);
        let events = vec![
            Event::new(Tag::S, vec!["a".into(), "b".into()]),
            Event::new(Tag::S, vec!["b".into(), "a".into(), "zz".into()]),
            Event::new(Tag::B, vec!["a".into(), "b".into()]),
            Event::new(Tag::E, vec!["zz".into()]),
        ];
        let indexed = index_events(&events, &features, &Tag::ALL);
        assert_eq!(indexed.len(), 2);
        assert_eq!(indexed[0].count, 2.0);
        assert_eq!(indexed[0].fids, vec![0, 1]);
        assert_eq!(indexed[1].outcome, 1);
    }

    #[test]
    fn fits_training_data() {
        let samples = corpus();
        let model = GisTrainer::new(100, 1).train(&samples, &DefaultContextGenerator).unwrap();
        assert_eq!(model.algorithm(), Algorithm::Gis);
        assert_eq!(model.outcomes(), &Tag::ALL);
        let sample = &samples[0];
        for i in 0..sample.len() {
            let context = DefaultContextGenerator.context(i, sample.chars(), sample.tags(), None);
            let probs = model.eval(&context);
            assert_eq!(model.best_outcome(&probs), sample.tags()[i], "position {i}");
        }
    }

    #[test]
    fn observed_pair_gets_positive_weight() {
        let model = GisTrainer::new(30, 1).train(&corpus(), &DefaultContextGenerator).unwrap();
        assert!(model.weight("c0=喜", Tag::B) > model.weight("c0=喜", Tag::E));
        assert!(model.weight("c0=欢", Tag::E) > 0.0);
    }

    #[test]
    fn cutoff_removes_everything() {
        let samples = vec![Sample::parse("我 喜欢").unwrap()];
        let ret = GisTrainer::new(10, 5).train(&samples, &DefaultContextGenerator);
        assert!(matches!(ret, Err(Error::InvalidSample(..))));
    }
}
