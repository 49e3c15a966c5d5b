use crate::{
    maxent::{
        beam::{BeamSearch, Sequence},
        context::ContextGenerator,
        model::{MaxentModel, Model},
        validator::BmesValidator,
    },
    sample::{to_words, Sample, Tag},
    Result,
};

pub trait WordSegmenter {
    /// Splits a raw sentence into words. Whitespace in the input is ignored.
    fn segment(&self, sentence: &str) -> Result<Vec<String>>;
}

fn split_chars(sentence: &str) -> Vec<String> {
    sentence.chars().filter(|c| !c.is_whitespace()).map(String::from).collect()
}

/// Tags sentences with a trained model.
pub struct Segmenter<'a> {
    model: &'a MaxentModel,
    generator: Box<dyn ContextGenerator>,
    validator: BmesValidator,
    beam: BeamSearch,
}

impl<'a> Segmenter<'a> {
    /// Uses the context generator recorded in the model.
    pub fn from_model(model: &'a MaxentModel) -> Self {
        Self::new(model, model.context_generator())
    }

    /// `generator` replaces the one recorded in the model and must produce
    /// the features the model was trained on.
    pub fn new(model: &'a MaxentModel, generator: Box<dyn ContextGenerator>) -> Self {
        Self { model, generator, validator: BmesValidator, beam: BeamSearch::new(model.beam_size()) }
    }

    /// Overrides the beam width stored in the model.
    pub fn with_beam_size(mut self, size: usize) -> Self {
        self.beam = BeamSearch::new(size);
        self
    }

    pub fn tag(&self, chars: &[String]) -> Result<Vec<Tag>> {
        Ok(self.tag_with_context(chars, None)?.into_tags())
    }

    /// Best sequence together with its per-position probabilities.
    pub fn tag_with_context(
        &self,
        chars: &[String],
        additional_context: Option<&[Vec<String>]>,
    ) -> Result<Sequence> {
        self.beam.best_sequence(
            self.model,
            chars,
            additional_context,
            self.generator.as_ref(),
            &self.validator,
        )
    }

    pub fn tag_str(&self, sentence: &str) -> Result<Vec<Tag>> {
        self.tag(&split_chars(sentence))
    }

    /// Up to `num` distinct taggings, best first.
    pub fn tag_n(
        &self,
        num: usize,
        chars: &[String],
        additional_context: Option<&[Vec<String>]>,
    ) -> Result<Vec<Vec<Tag>>> {
        let sequences = self.beam.best_sequences(
            num,
            self.model,
            chars,
            additional_context,
            self.generator.as_ref(),
            &self.validator,
        )?;
        Ok(sequences.into_iter().map(Sequence::into_tags).collect())
    }

    /// Every sequence left in the beam after the last position.
    pub fn top_k_sequences(
        &self,
        chars: &[String],
        additional_context: Option<&[Vec<String>]>,
    ) -> Result<Vec<Sequence>> {
        self.beam.best_sequences(
            self.beam.size(),
            self.model,
            chars,
            additional_context,
            self.generator.as_ref(),
            &self.validator,
        )
    }

    /// Outcomes at `index` ranked by probability, given the tags chosen so far.
    pub fn ordered_tags(
        &self,
        index: usize,
        chars: &[String],
        prior_tags: &[Tag],
        additional_context: Option<&[Vec<String>]>,
    ) -> Vec<(Tag, f64)> {
        let context = self.generator.context(index, chars, prior_tags, additional_context);
        let probs = self.model.eval(&context);
        let mut ranked: Vec<(Tag, f64)> =
            self.model.outcomes().iter().copied().zip(probs).collect();
        ranked.sort_by(|a, b| b.1.total_cmp(&a.1));
        ranked
    }

    pub fn all_tags(&self) -> &[Tag] {
        self.model.outcomes()
    }

    /// Tags the characters of `sample`, keeping its additional context.
    pub fn predict(&self, sample: &Sample) -> Result<Sample> {
        let tags = self.tag_with_context(sample.chars(), sample.additional_context())?.into_tags();
        Sample::with_context(
            sample.chars().to_vec(),
            tags,
            sample.additional_context().map(<[Vec<String>]>::to_vec),
        )
    }
}

impl WordSegmenter for Segmenter<'_> {
    fn segment(&self, sentence: &str) -> Result<Vec<String>> {
        let chars = split_chars(sentence);
        let tags = self.tag(&chars)?;
        Ok(to_words(&chars, &tags))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        maxent::{context::DefaultContextGenerator, gis::GisTrainer, trainer::Trainer},
        params::TrainingParams,
        FeatureTemplates, GeneratorKind,
    };

    fn model() -> MaxentModel {
        let samples: Vec<Sample> = ["我 喜欢 你", "你 喜欢 我", "他们 喜欢 我", "我们 喜欢 他们"]
            .iter()
            .cycle()
            .take(16)
            .map(|s| Sample::parse(s).unwrap())
            .collect();
        GisTrainer::new(100, 1).train(&samples, &DefaultContextGenerator).unwrap()
    }

    #[test]
    fn segments_seen_sentences() {
        let model = model();
        let segmenter = Segmenter::new(&model, Box::new(DefaultContextGenerator));
        assert_eq!(segmenter.segment("我喜欢你").unwrap(), vec!["我", "喜欢", "你"]);
        assert_eq!(segmenter.segment("他们 喜欢 我").unwrap(), vec!["他们", "喜欢", "我"]);
        assert!(segmenter.segment("").unwrap().is_empty());
    }

    #[test]
    fn tag_n_is_ranked() {
        let model = model();
        let segmenter = Segmenter::new(&model, Box::new(DefaultContextGenerator));
        let chars = split_chars("我喜欢你");
        let best = segmenter.tag(&chars).unwrap();
        let n = segmenter.tag_n(4, &chars, None).unwrap();
        assert_eq!(n.len(), 4);
        assert_eq!(n[0], best);
        let top = segmenter.top_k_sequences(&chars, None).unwrap();
        assert_eq!(top.len(), model.beam_size());
        assert_eq!(top[0].tags(), best.as_slice());
    }

    #[test]
    fn ordered_tags_sum_to_one() {
        let model = model();
        let segmenter = Segmenter::new(&model, Box::new(DefaultContextGenerator));
        let chars = split_chars("喜欢");
        let ranked = segmenter.ordered_tags(0, &chars, &[], None);
        assert_eq!(ranked.len(), 4);
        assert_eq!(ranked[0].0, Tag::B);
        assert!(ranked.windows(2).all(|w| w[0].1 >= w[1].1));
        assert!((ranked.iter().map(|(_, p)| p).sum::<f64>() - 1.0).abs() < 1e-9);
        assert_eq!(segmenter.all_tags(), &Tag::ALL);
    }

    #[test]
    fn predict_keeps_chars() {
        let model = model();
        let segmenter = Segmenter::new(&model, Box::new(DefaultContextGenerator)).with_beam_size(1);
        let gold = Sample::parse("我 喜欢 你").unwrap();
        let predicted = segmenter.predict(&gold).unwrap();
        assert_eq!(predicted.chars(), gold.chars());
        assert_eq!(predicted, gold);
    }

    #[test]
    fn from_model_uses_recorded_generator() {
        let samples: Vec<Sample> = ["我 喜欢 你", "他们 喜欢 我"]
            .iter()
            .cycle()
            .take(8)
            .map(|s| Sample::parse(s).unwrap())
            .collect();
        let mut params = TrainingParams::default();
        params.cutoff = 1;
        params.generator = GeneratorKind::Conf;
        params.features = FeatureTemplates::C0 | FeatureTemplates::C_1C0 | FeatureTemplates::T_1;
        let model = crate::maxent::trainer::train(&samples, &params, params.context_generator().as_ref()).unwrap();
        assert_eq!(model.generator(), GeneratorKind::Conf);

        let recorded = Segmenter::from_model(&model);
        let explicit = Segmenter::new(&model, params.context_generator());
        let chars = split_chars("他们喜欢你");
        let prior = [Tag::B, Tag::E];
        assert_eq!(
            recorded.ordered_tags(2, &chars, &prior, None),
            explicit.ordered_tags(2, &chars, &prior, None)
        );
        assert_eq!(recorded.segment("他们喜欢你").unwrap(), explicit.segment("他们喜欢你").unwrap());
    }
}
