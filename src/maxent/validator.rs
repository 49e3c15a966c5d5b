use crate::sample::Tag;

/// Decides whether `outcome` may follow `prior_tags` at position `index`.
pub trait SequenceValidator: Send + Sync {
    fn valid(&self, index: usize, prior_tags: &[Tag], outcome: Tag) -> bool;
}

/// The BMES automaton: a word opens with S or B, and B/M must be followed by
/// M or E.
#[derive(Debug, Default, Clone, Copy)]
pub struct BmesValidator;

impl SequenceValidator for BmesValidator {
    fn valid(&self, index: usize, prior_tags: &[Tag], outcome: Tag) -> bool {
        let prev = if index == 0 { None } else { prior_tags.get(index - 1) };
        match (prev, outcome) {
            (None | Some(Tag::S | Tag::E), Tag::S | Tag::B) => true,
            (Some(Tag::B | Tag::M), Tag::M | Tag::E) => true,
            _ => false,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use Tag::*;

    #[test]
    fn valid_sequence() {
        let tags = [S, B, E, S, S];
        for i in 0..tags.len() {
            assert!(BmesValidator.valid(i, &tags, tags[i]), "position {i}");
        }
    }

    #[test]
    fn invalid_transitions() {
        // B directly after B
        assert!(!BmesValidator.valid(2, &[S, B], B));
        // M directly after S
        assert!(!BmesValidator.valid(4, &[S, B, E, S], M));
        assert!(!BmesValidator.valid(0, &[], M));
        assert!(!BmesValidator.valid(0, &[], E));
        assert!(!BmesValidator.valid(1, &[M], S));
    }

    #[test]
    fn transition_table() {
        let allowed = |prev: Tag| -> Vec<Tag> {
            Tag::ALL.into_iter().filter(|&t| BmesValidator.valid(1, &[prev], t)).collect()
        };
        assert_eq!(allowed(S), vec![S, B]);
        assert_eq!(allowed(E), vec![S, B]);
        assert_eq!(allowed(B), vec![M, E]);
        assert_eq!(allowed(M), vec![M, E]);
    }
}
