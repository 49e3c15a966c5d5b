//! Chinese word segmentation as BMES sequence labeling.
//!
//! Every character is tagged as the Begin, Middle or End of a word, or as a
//! Single-character word. A maximum entropy model scores the tags of each
//! position and a beam search picks the best legal tag sequence.

pub mod cross_validation;
pub mod dictionary;
mod error;
pub mod evaluation;
pub mod maxent;
pub mod params;
pub mod quark;
pub mod sample;
pub mod segmenter;

pub use cross_validation::CrossValidator;
pub use dictionary::Dictionary;
pub use error::{Error, Result};
pub use evaluation::{ErrorPrinter, EvaluationMonitor, Evaluator, Measure};
pub use maxent::{
    beam::{BeamSearch, Sequence},
    context::{
        ClosedContextGenerator, ConfigurableContextGenerator, ContextGenerator,
        DefaultContextGenerator, FeatureTemplates, GeneratorKind,
    },
    event::Event,
    model::{MaxentModel, Model},
    trainer::{train, Algorithm, Trainer},
    validator::{BmesValidator, SequenceValidator},
};
pub use params::TrainingParams;
pub use sample::{Dataset, Sample, SampleStream, Tag};
pub use segmenter::{Segmenter, WordSegmenter};
