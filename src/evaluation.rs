use std::{fmt::Display, io::Write, ops::Add};

use crate::{dictionary::Dictionary, sample::Sample, segmenter::Segmenter, Result};

/// Number of gold words found among the predicted ones.
///
/// Every predicted word matches at most once: gold words are visited in
/// order and each consumes the first equal predicted word still available.
pub fn count_true_positives<S: AsRef<str>>(references: &[S], predictions: &[S]) -> usize {
    let mut matched = 0;
    match_words(references, predictions, |_, found| matched += usize::from(found));
    matched
}

/// Calls `visit` once per gold word, with whether it consumed a predicted word.
fn match_words<S: AsRef<str>>(references: &[S], predictions: &[S], mut visit: impl FnMut(&str, bool)) {
    let mut available: Vec<&str> = predictions.iter().map(AsRef::as_ref).collect();
    for reference in references {
        let reference = reference.as_ref();
        let found = match available.iter().position(|p| *p == reference) {
            Some(pos) => {
                available.remove(pos);
                true
            }
            None => false,
        };
        visit(reference, found);
    }
}

/// One-shot precision of a single prediction; `NaN` when nothing was predicted.
pub fn precision<S: AsRef<str>>(references: &[S], predictions: &[S]) -> f64 {
    if predictions.is_empty() {
        return f64::NAN;
    }
    count_true_positives(references, predictions) as f64 / predictions.len() as f64
}

/// One-shot recall of a single prediction; `NaN` when the reference is empty.
pub fn recall<S: AsRef<str>>(references: &[S], predictions: &[S]) -> f64 {
    if references.is_empty() {
        return f64::NAN;
    }
    count_true_positives(references, predictions) as f64 / references.len() as f64
}

fn ratio(num: u64, den: u64) -> f64 {
    if den == 0 {
        0.0
    } else {
        num as f64 / den as f64
    }
}

/// Word-level scores accumulated over many sentences.
///
/// Measures of disjoint runs combine with [`Measure::merge`] (or `+`).
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Measure {
    /// predicted words
    selected: u64,
    /// gold words
    target: u64,
    true_positives: u64,
    sentences: u64,
    exact_sentences: u64,
    target_iv: u64,
    target_oov: u64,
    true_positives_iv: u64,
    true_positives_oov: u64,
}

impl Measure {
    pub fn new() -> Self {
        Self::default()
    }

    /// Scores one sentence. With a dictionary, gold words are also split into
    /// in-vocabulary and out-of-vocabulary words.
    pub fn update(&mut self, reference: &Sample, prediction: &Sample, dictionary: Option<&Dictionary>) {
        self.sentences += 1;
        if reference.tags() == prediction.tags() {
            self.exact_sentences += 1;
        }

        let gold = reference.words();
        let predicted = prediction.words();
        match_words(gold.as_slice(), predicted.as_slice(), |word, found| {
            self.true_positives += u64::from(found);
            match dictionary.map(|d| d.contains(word)) {
                Some(true) => {
                    self.target_iv += 1;
                    self.true_positives_iv += u64::from(found);
                }
                Some(false) => {
                    self.target_oov += 1;
                    self.true_positives_oov += u64::from(found);
                }
                None => {}
            }
        });
        self.selected += predicted.len() as u64;
        self.target += gold.len() as u64;
    }

    pub fn merge(self, other: Self) -> Self {
        Self {
            selected: self.selected + other.selected,
            target: self.target + other.target,
            true_positives: self.true_positives + other.true_positives,
            sentences: self.sentences + other.sentences,
            exact_sentences: self.exact_sentences + other.exact_sentences,
            target_iv: self.target_iv + other.target_iv,
            target_oov: self.target_oov + other.target_oov,
            true_positives_iv: self.true_positives_iv + other.true_positives_iv,
            true_positives_oov: self.true_positives_oov + other.true_positives_oov,
        }
    }

    pub fn precision(&self) -> f64 {
        ratio(self.true_positives, self.selected)
    }

    pub fn recall(&self) -> f64 {
        ratio(self.true_positives, self.target)
    }

    /// Harmonic mean of precision and recall, `-1` when both are zero.
    pub fn fmeasure(&self) -> f64 {
        let (p, r) = (self.precision(), self.recall());
        if p + r > 0.0 {
            2.0 * p * r / (p + r)
        } else {
            -1.0
        }
    }

    pub fn recall_iv(&self) -> f64 {
        ratio(self.true_positives_iv, self.target_iv)
    }

    pub fn recall_oov(&self) -> f64 {
        ratio(self.true_positives_oov, self.target_oov)
    }

    pub fn sentence_accuracy(&self) -> f64 {
        ratio(self.exact_sentences, self.sentences)
    }

    pub fn sentences(&self) -> u64 {
        self.sentences
    }

    pub fn true_positives(&self) -> u64 {
        self.true_positives
    }
}

impl Add for Measure {
    type Output = Measure;

    fn add(self, rhs: Self) -> Self::Output {
        self.merge(rhs)
    }
}

impl std::iter::Sum for Measure {
    fn sum<I: Iterator<Item = Self>>(iter: I) -> Self {
        iter.fold(Measure::default(), Measure::merge)
    }
}

impl Display for Measure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Precision: {}", self.precision())?;
        writeln!(f, "Recall: {}", self.recall())?;
        writeln!(f, "F-Measure: {}", self.fmeasure())?;
        writeln!(f, "RIV: {}", self.recall_iv())?;
        writeln!(f, "ROOV: {}", self.recall_oov())?;
        write!(f, "SentenceAccuracy: {}", self.sentence_accuracy())
    }
}

/// Receives every evaluated pair of gold and predicted samples.
pub trait EvaluationMonitor {
    fn correctly_classified(&mut self, _reference: &Sample, _prediction: &Sample) {}
    fn misclassified(&mut self, _reference: &Sample, _prediction: &Sample) {}
}

/// Writes each misclassified sentence as the gold segmentation followed by
/// the predicted one prefixed with `[*]`.
pub struct ErrorPrinter<W: Write> {
    out: W,
}

impl<W: Write> ErrorPrinter<W> {
    pub fn new(out: W) -> Self {
        Self { out }
    }

    pub fn into_inner(self) -> W {
        self.out
    }
}

impl<W: Write> EvaluationMonitor for ErrorPrinter<W> {
    fn misclassified(&mut self, reference: &Sample, prediction: &Sample) {
        let written = writeln!(self.out, "{}", reference.to_sentence())
            .and_then(|_| writeln!(self.out, "[*]{}", prediction.to_sentence()));
        if let Err(e) = written {
            log::warn!("failed to write misclassified sample: {e}");
        }
    }
}

/// Runs a segmenter over gold samples and accumulates a [`Measure`].
pub struct Evaluator<'a> {
    segmenter: &'a Segmenter<'a>,
    dictionary: Option<&'a Dictionary>,
    listeners: Vec<&'a mut dyn EvaluationMonitor>,
    measure: Measure,
}

impl<'a> Evaluator<'a> {
    pub fn new(segmenter: &'a Segmenter<'a>) -> Self {
        Self { segmenter, dictionary: None, listeners: Vec::new(), measure: Measure::default() }
    }

    pub fn with_dictionary(mut self, dictionary: &'a Dictionary) -> Self {
        self.dictionary = Some(dictionary);
        self
    }

    pub fn with_listener(mut self, listener: &'a mut dyn EvaluationMonitor) -> Self {
        self.listeners.push(listener);
        self
    }

    /// Tags one gold sample, scores it and notifies the listeners.
    pub fn evaluate_sample(&mut self, reference: &Sample) -> Result<Sample> {
        let prediction = self.segmenter.predict(reference)?;
        self.measure.update(reference, &prediction, self.dictionary);
        for listener in self.listeners.iter_mut() {
            if *reference == prediction {
                listener.correctly_classified(reference, &prediction);
            } else {
                listener.misclassified(reference, &prediction);
            }
        }
        Ok(prediction)
    }

    /// Empty samples (e.g. broken corpus lines) are skipped.
    pub fn evaluate<'s, I>(&mut self, samples: I) -> Result<&Measure>
    where
        I: IntoIterator<Item = &'s Sample>,
    {
        for sample in samples {
            if sample.is_empty() {
                continue;
            }
            self.evaluate_sample(sample)?;
        }
        Ok(&self.measure)
    }

    pub fn measure(&self) -> &Measure {
        &self.measure
    }

    pub fn into_measure(self) -> Measure {
        self.measure
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(line: &str) -> Sample {
        Sample::parse(line).unwrap()
    }

    #[test]
    fn duplicates_are_consumed() {
        assert_eq!(count_true_positives(&["a", "a", "b"], &["a", "b", "b"]), 2);
        assert_eq!(count_true_positives(&["a", "b"], &["b", "a"]), 2);
        assert_eq!(count_true_positives::<&str>(&[], &["a"]), 0);
    }

    #[test]
    fn static_helpers_are_nan() {
        assert!(precision::<&str>(&["a"], &[]).is_nan());
        assert!(recall::<&str>(&[], &["a"]).is_nan());
        assert_eq!(precision(&["a", "b"], &["a", "c"]), 0.5);
        assert_eq!(recall(&["a", "b", "c", "d"], &["a"]), 0.25);
    }

    #[test]
    fn empty_measure() {
        let m = Measure::new();
        assert_eq!(m.precision(), 0.0);
        assert_eq!(m.recall(), 0.0);
        assert_eq!(m.fmeasure(), -1.0);
        assert_eq!(m.sentence_accuracy(), 0.0);
    }

    #[test]
    fn update_scores() {
        let mut m = Measure::new();
        m.update(&sample("我 喜欢 你"), &sample("我 喜 欢 你"), None);
        m.update(&sample("他 来"), &sample("他 来"), None);
        assert_eq!(m.true_positives(), 4);
        assert_eq!(m.precision(), 4.0 / 6.0);
        assert_eq!(m.recall(), 4.0 / 5.0);
        let f = 2.0 * (4.0 / 6.0) * (4.0 / 5.0) / (4.0 / 6.0 + 4.0 / 5.0);
        assert!((m.fmeasure() - f).abs() < 1e-12);
        assert_eq!(m.sentence_accuracy(), 0.5);
        assert_eq!(m.recall_iv(), 0.0);
    }

    #[test]
    fn in_and_out_of_vocabulary() {
        let dict: Dictionary = ["我", "喜欢"].into_iter().collect();
        let mut m = Measure::new();
        m.update(&sample("我 喜欢 自然语言 。"), &sample("我 喜欢 自然 语言 。"), Some(&dict));
        // IV: 我 喜欢 (both found); OOV: 自然语言 (missed), 。 (found)
        assert_eq!(m.recall_iv(), 1.0);
        assert_eq!(m.recall_oov(), 0.5);
    }

    #[test]
    fn merge_is_associative_and_commutative() {
        let mut a = Measure::new();
        a.update(&sample("我 喜欢 你"), &sample("我 喜欢 你"), None);
        let mut b = Measure::new();
        b.update(&sample("自然 语言"), &sample("自然语言"), None);
        let mut c = Measure::new();
        c.update(&sample("a b c"), &sample("ab c"), None);
        assert_eq!((a + b) + c, a + (b + c));
        assert_eq!(a + b, b + a);
        assert_eq!([a, b, c].into_iter().sum::<Measure>(), a.merge(b).merge(c));
    }

    #[test]
    fn one_accumulator_matches_summed_sentences() {
        let dict: Dictionary = ["a", "我"].into_iter().collect();
        let pairs = [("a a b", "a b b"), ("我 喜欢 你", "我 喜 欢 你"), ("他 来", "他 来"), ("ab c", "a b c")];
        let mut whole = Measure::new();
        let mut parts = Vec::new();
        for (gold, predicted) in pairs {
            whole.update(&sample(gold), &sample(predicted), Some(&dict));
            let mut part = Measure::new();
            part.update(&sample(gold), &sample(predicted), Some(&dict));
            parts.push(part);
        }
        assert_eq!(parts[0].true_positives(), 2);
        // the second gold "a" finds no predicted "a" left
        assert_eq!(parts[0].recall_iv(), 0.5);
        assert_eq!(parts[0].recall_oov(), 1.0);
        assert_eq!(whole, parts.iter().rev().copied().sum::<Measure>());
        assert_eq!(whole.sentences(), 4);
        assert_eq!(whole.true_positives(), 2 + 2 + 2 + 1);
    }

    #[test]
    fn report() {
        let mut m = Measure::new();
        m.update(&sample("他 来"), &sample("他 来"), None);
        let report = m.to_string();
        assert!(report.starts_with("Precision: 1\nRecall: 1\nF-Measure: 1\n"));
        assert!(report.ends_with("SentenceAccuracy: 1"));
    }

    #[test]
    fn error_printer() {
        let mut printer = ErrorPrinter::new(Vec::new());
        printer.misclassified(&sample("我 喜欢"), &sample("我 喜 欢"));
        let out = String::from_utf8(printer.into_inner()).unwrap();
        assert_eq!(out, "我 喜欢 \n[*]我 喜 欢 \n");
    }
}
