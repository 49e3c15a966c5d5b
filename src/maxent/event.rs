use crate::sample::{Sample, Tag};

use super::context::ContextGenerator;

/// One training instance: the gold tag of a position and its features.
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub outcome: Tag,
    pub context: Vec<String>,
}

impl Event {
    pub fn new(outcome: Tag, context: Vec<String>) -> Self {
        Self { outcome, context }
    }
}

/// Builds one event per character.
///
/// The gold tags are passed as prior tags; the generator never looks at or
/// past the current index, so this matches what the decoder sees.
pub fn generate_events(sample: &Sample, generator: &dyn ContextGenerator) -> Vec<Event> {
    let chars = sample.chars();
    let tags = sample.tags();
    (0..sample.len())
        .map(|i| Event::new(tags[i], generator.context(i, chars, tags, sample.additional_context())))
        .collect()
}

/// Events of a whole corpus, in sample order.
pub fn event_stream<'a, I>(samples: I, generator: &'a dyn ContextGenerator) -> impl Iterator<Item = Event> + 'a
where
    I: IntoIterator<Item = &'a Sample>,
    I::IntoIter: 'a,
{
    samples.into_iter().flat_map(move |s| generate_events(s, generator))
}
