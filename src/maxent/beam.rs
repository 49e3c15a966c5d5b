use crate::{sample::Tag, Error, Result};

use super::{context::ContextGenerator, model::Model, validator::SequenceValidator};

/// A (partial) tag sequence with the probability of every chosen tag.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Sequence {
    tags: Vec<Tag>,
    probs: Vec<f64>,
    /// sum of the log probabilities
    score: f64,
}

impl Sequence {
    fn extend(&self, tag: Tag, prob: f64) -> Self {
        let mut tags = Vec::with_capacity(self.tags.len() + 1);
        tags.extend_from_slice(&self.tags);
        tags.push(tag);
        let mut probs = Vec::with_capacity(self.probs.len() + 1);
        probs.extend_from_slice(&self.probs);
        probs.push(prob);
        Self { tags, probs, score: self.score + prob.ln() }
    }

    pub fn tags(&self) -> &[Tag] {
        &self.tags
    }

    pub fn probs(&self) -> &[f64] {
        &self.probs
    }

    pub fn score(&self) -> f64 {
        self.score
    }

    pub fn len(&self) -> usize {
        self.tags.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tags.is_empty()
    }

    pub fn into_tags(self) -> Vec<Tag> {
        self.tags
    }
}

/// Left-to-right beam search over tag sequences.
///
/// Every hypothesis keeps its own tag history, which the context generator
/// sees as the prior tags. Hypotheses with equal scores keep the order in
/// which they were produced: beam rank first, then outcome order of the model.
#[derive(Debug, Clone, Copy)]
pub struct BeamSearch {
    size: usize,
}

impl Default for BeamSearch {
    fn default() -> Self {
        Self::new(super::model::DEFAULT_BEAM_SIZE)
    }
}

impl BeamSearch {
    pub fn new(size: usize) -> Self {
        Self { size: size.max(1) }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn best_sequence<M: Model + ?Sized>(
        &self,
        model: &M,
        chars: &[String],
        additional_context: Option<&[Vec<String>]>,
        generator: &dyn ContextGenerator,
        validator: &dyn SequenceValidator,
    ) -> Result<Sequence> {
        let mut sequences = self.search(self.size, model, chars, additional_context, generator, validator)?;
        // search never returns an empty beam
        Ok(sequences.swap_remove(0))
    }

    /// Up to `num` distinct sequences, best first. The beam is widened to
    /// `num` when it is narrower.
    pub fn best_sequences<M: Model + ?Sized>(
        &self,
        num: usize,
        model: &M,
        chars: &[String],
        additional_context: Option<&[Vec<String>]>,
        generator: &dyn ContextGenerator,
        validator: &dyn SequenceValidator,
    ) -> Result<Vec<Sequence>> {
        let mut sequences =
            self.search(self.size.max(num), model, chars, additional_context, generator, validator)?;
        sequences.truncate(num);
        Ok(sequences)
    }

    fn search<M: Model + ?Sized>(
        &self,
        width: usize,
        model: &M,
        chars: &[String],
        additional_context: Option<&[Vec<String>]>,
        generator: &dyn ContextGenerator,
        validator: &dyn SequenceValidator,
    ) -> Result<Vec<Sequence>> {
        let outcomes = model.outcomes();
        let mut beam = vec![Sequence::default()];
        for i in 0..chars.len() {
            let mut next = Vec::with_capacity(beam.len() * outcomes.len());
            for top in &beam {
                let context = generator.context(i, chars, &top.tags, additional_context);
                let probs = model.eval(&context);
                for (&tag, &p) in outcomes.iter().zip(&probs) {
                    if validator.valid(i, &top.tags, tag) {
                        next.push(top.extend(tag, p));
                    }
                }
            }
            if next.is_empty() {
                return Err(Error::NoLegalSequence(i));
            }
            // stable: ties keep production order
            next.sort_by(|a, b| b.score.total_cmp(&a.score));
            next.truncate(width);
            beam = next;
        }
        Ok(beam)
    }
}
