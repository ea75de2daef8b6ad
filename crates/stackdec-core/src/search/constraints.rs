//! Lexical phrase constraints and target-side (reference / prefix)
//! constraints. A rejected candidate is simply never inserted anywhere.

use std::collections::HashSet;
use std::sync::Arc;

use super::coverage::Span;
use super::hypothesis::{HypArena, HypId, Hypothesis};
use super::options::{OptionGenerator, OptionOrigin, TranslationOption};

const ANNOT_OPEN: &str = "<phr_pair_annot>";
const ANNOT_CLOSE: &str = "</phr_pair_annot>";
const SRC_OPEN: &str = "<src_segm>";
const SRC_CLOSE: &str = "</src_segm>";
const TRG_OPEN: &str = "<trg_segm>";
const TRG_CLOSE: &str = "</trg_segm>";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ConstraintError {
    #[error("missing {tag} in phrase annotation")]
    MissingTag { tag: &'static str },
    #[error("empty {segment} segment in phrase annotation")]
    EmptySegment { segment: &'static str },
    #[error("phrase annotation at word {0} overlaps another one")]
    Overlap(usize),
}

/// Source span that must be translated as exactly `target`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LexicalConstraint {
    pub span: Span,
    pub target: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LexicalConstraints {
    items: Vec<LexicalConstraint>,
}

impl LexicalConstraints {
    pub fn new(mut items: Vec<LexicalConstraint>) -> Result<Self, ConstraintError> {
        items.sort_by_key(|c| c.span);
        for pair in items.windows(2) {
            if pair[0].span.overlaps(&pair[1].span) {
                return Err(ConstraintError::Overlap(pair[1].span.start));
            }
        }
        Ok(Self { items })
    }

    /// Split an annotated sentence into plain source words and constraints:
    ///
    /// ```text
    /// my <phr_pair_annot><src_segm> casa </src_segm><trg_segm> house </trg_segm></phr_pair_annot> .
    /// ```
    pub fn parse_annotated(text: &str) -> Result<(Vec<String>, Self), ConstraintError> {
        let mut words: Vec<String> = Vec::new();
        let mut items = Vec::new();
        let mut rest = text;
        while let Some(open) = rest.find(ANNOT_OPEN) {
            words.extend(rest[..open].split_whitespace().map(str::to_string));
            let body_start = open + ANNOT_OPEN.len();
            let close = rest[body_start..]
                .find(ANNOT_CLOSE)
                .ok_or(ConstraintError::MissingTag { tag: ANNOT_CLOSE })?;
            let body = &rest[body_start..body_start + close];

            let src = between(body, SRC_OPEN, SRC_CLOSE)?;
            let trg = between(body, TRG_OPEN, TRG_CLOSE)?;
            let src: Vec<String> = src.split_whitespace().map(str::to_string).collect();
            let trg: Vec<String> = trg.split_whitespace().map(str::to_string).collect();
            if src.is_empty() {
                return Err(ConstraintError::EmptySegment { segment: "source" });
            }
            if trg.is_empty() {
                return Err(ConstraintError::EmptySegment { segment: "target" });
            }
            let start = words.len() + 1;
            items.push(LexicalConstraint {
                span: Span::new(start, start + src.len() - 1),
                target: trg,
            });
            words.extend(src);
            rest = &rest[body_start + close + ANNOT_CLOSE.len()..];
        }
        words.extend(rest.split_whitespace().map(str::to_string));
        Ok((words, Self::new(items)?))
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &LexicalConstraint> {
        self.items.iter()
    }

    pub fn max_span_len(&self) -> usize {
        self.items.iter().map(|c| c.span.len()).max().unwrap_or(0)
    }

    /// Constraint whose span is exactly `span`.
    pub fn exact(&self, span: Span) -> Option<&LexicalConstraint> {
        self.items.iter().find(|c| c.span == span)
    }

    /// True when `span` overlaps a constraint without matching its span.
    pub fn blocks(&self, span: Span) -> bool {
        self.items
            .iter()
            .any(|c| c.span.overlaps(&span) && c.span != span)
    }

    /// Whether translating `span` as `target` respects every constraint.
    pub fn permits_step(&self, span: Span, target: &[String]) -> bool {
        self.items
            .iter()
            .filter(|c| c.span.overlaps(&span))
            .all(|c| c.span == span && c.target == target)
    }
}

fn between<'t>(text: &'t str, open: &'static str, close: &'static str) -> Result<&'t str, ConstraintError> {
    let start = text
        .find(open)
        .ok_or(ConstraintError::MissingTag { tag: open })?
        + open.len();
    let len = text[start..]
        .find(close)
        .ok_or(ConstraintError::MissingTag { tag: close })?;
    Ok(&text[start..start + len])
}

/// User-confirmed target prefix for interactive decoding.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PrefixRequest {
    pub words: Vec<String>,
    /// The last prefix word may still be extended (no trailing blank).
    pub last_word_partial: bool,
    /// Words the user refused in the slot right after the prefix.
    pub rejected: HashSet<String>,
}

impl PrefixRequest {
    pub fn new(words: Vec<String>, last_word_partial: bool) -> Self {
        Self {
            words,
            last_word_partial,
            rejected: HashSet::new(),
        }
    }

    pub fn with_rejected<I, S>(mut self, rejected: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rejected.extend(rejected.into_iter().map(Into::into));
        self
    }

    /// Target position rejected words apply to: the word completing a
    /// partial last token, or else the first word after the prefix.
    pub fn rejected_slot(&self) -> usize {
        if self.last_word_partial && !self.words.is_empty() {
            self.words.len() - 1
        } else {
            self.words.len()
        }
    }

    /// Whether `word` may appear at target position `pos` (0-based).
    pub fn accepts_word(&self, pos: usize, word: &str) -> bool {
        let p = self.words.len();
        if pos < p {
            let expected = self.words[pos].as_str();
            let ok = if pos + 1 == p && self.last_word_partial {
                word.starts_with(expected)
            } else {
                word == expected
            };
            if !ok {
                return false;
            }
        }
        !(pos == self.rejected_slot() && self.rejected.contains(word))
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum TargetConstraint {
    #[default]
    Free,
    /// Output must be exactly this sentence.
    Reference(Vec<String>),
    /// Output must start with this prefix.
    Prefix(PrefixRequest),
}

impl TargetConstraint {
    /// Whether appending `words` after `target_len` output words is
    /// consistent; `completes` marks the step that finishes the coverage.
    pub fn permits(&self, target_len: usize, words: &[String], completes: bool) -> bool {
        match self {
            TargetConstraint::Free => true,
            TargetConstraint::Reference(reference) => {
                let end = target_len + words.len();
                end <= reference.len()
                    && reference[target_len..end] == *words
                    && (!completes || end == reference.len())
            }
            TargetConstraint::Prefix(prefix) => {
                words
                    .iter()
                    .enumerate()
                    .all(|(i, w)| prefix.accepts_word(target_len + i, w))
                    && (!completes || target_len + words.len() >= prefix.words.len())
            }
        }
    }

    pub fn is_free(&self) -> bool {
        matches!(self, TargetConstraint::Free)
    }
}

/// Both constraint sources, combined with a logical AND.
pub struct ConstraintFilter<'a> {
    lexical: &'a LexicalConstraints,
    target: &'a TargetConstraint,
    length_slack: usize,
}

impl<'a> ConstraintFilter<'a> {
    pub fn new(lexical: &'a LexicalConstraints, target: &'a TargetConstraint, length_slack: usize) -> Self {
        Self {
            lexical,
            target,
            length_slack,
        }
    }

    pub fn target(&self) -> &TargetConstraint {
        self.target
    }

    pub fn permits(&self, pred: &Hypothesis, option: &TranslationOption, completes: bool) -> bool {
        self.lexical.permits_step(option.span, &option.target)
            && self.target.permits(pred.target_len, &option.target, completes)
    }

    /// Re-validate a complete derivation end to end.
    pub fn permits_complete(&self, arena: &HypArena, id: HypId) -> bool {
        let (words, alignment) = arena.reconstruct(id);
        let lexical_ok = self.lexical.iter().all(|c| {
            alignment
                .iter()
                .any(|a| a.source == c.span && words[a.target.clone()] == c.target[..])
        });
        lexical_ok && self.target.permits(0, &words, true)
    }

    /// Extra options that keep a prefix reachable while it is not yet fully
    /// generated: chunks of the remaining prefix sized like the source span
    /// (within the length slack), or the whole remainder when `span`
    /// finishes the sentence.
    pub fn prefix_options(
        &self,
        pred: &Hypothesis,
        span: Span,
        completes: bool,
        generator: &OptionGenerator<'_>,
    ) -> Vec<TranslationOption> {
        let TargetConstraint::Prefix(prefix) = self.target else {
            return Vec::new();
        };
        if pred.target_len >= prefix.words.len() || self.lexical.exact(span).is_some() {
            return Vec::new();
        }
        let remaining = &prefix.words[pred.target_len..];
        let lengths = if completes {
            remaining.len()..=remaining.len()
        } else {
            let lo = span.len().saturating_sub(self.length_slack).max(1);
            let hi = (span.len() + self.length_slack).min(remaining.len());
            lo..=hi
        };
        let existing = generator.options_for(span).ok();
        lengths
            .filter_map(|k| {
                let target: Arc<[String]> = remaining[..k].to_vec().into();
                if existing
                    .as_ref()
                    .is_some_and(|opts| opts.iter().any(|o| o.target == target))
                {
                    return None;
                }
                Some(TranslationOption {
                    span,
                    scores: generator.phrase_scores(span, &target),
                    target,
                    origin: OptionOrigin::PrefixSegment,
                })
            })
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn words(s: &str) -> Vec<String> {
        s.split_whitespace().map(str::to_string).collect()
    }

    #[test]
    fn test_parse_annotated() {
        let (src, lex) = LexicalConstraints::parse_annotated(
            "my <phr_pair_annot><src_segm> casa grande </src_segm><trg_segm> big house </trg_segm></phr_pair_annot> .",
        )
        .unwrap();
        assert_eq!(src, words("my casa grande ."));
        let c = lex.exact(Span::new(2, 3)).unwrap();
        assert_eq!(c.target, words("big house"));
        assert_eq!(lex.max_span_len(), 2);
    }

    #[test]
    fn test_parse_plain() {
        let (src, lex) = LexicalConstraints::parse_annotated("a b c").unwrap();
        assert_eq!(src, words("a b c"));
        assert!(lex.is_empty());
    }

    #[test]
    fn test_parse_errors() {
        assert!(matches!(
            LexicalConstraints::parse_annotated("<phr_pair_annot><src_segm> a </src_segm>"),
            Err(ConstraintError::MissingTag { .. })
        ));
        assert!(matches!(
            LexicalConstraints::parse_annotated(
                "<phr_pair_annot><src_segm> a </src_segm><trg_segm> </trg_segm></phr_pair_annot>"
            ),
            Err(ConstraintError::EmptySegment { segment: "target" })
        ));
    }

    #[test]
    fn test_permits_step() {
        let lex = LexicalConstraints::new(vec![LexicalConstraint {
            span: Span::new(2, 3),
            target: words("X"),
        }])
        .unwrap();
        assert!(lex.permits_step(Span::new(2, 3), &words("X")));
        assert!(!lex.permits_step(Span::new(2, 3), &words("Y")));
        assert!(!lex.permits_step(Span::new(1, 2), &words("X")));
        assert!(lex.permits_step(Span::new(1, 1), &words("anything")));
        assert!(lex.blocks(Span::new(3, 4)));
        assert!(!lex.blocks(Span::new(2, 3)));
    }

    #[test]
    fn test_overlapping_constraints_rejected() {
        let err = LexicalConstraints::new(vec![
            LexicalConstraint { span: Span::new(1, 2), target: words("a") },
            LexicalConstraint { span: Span::new(2, 3), target: words("b") },
        ])
        .unwrap_err();
        assert_eq!(err, ConstraintError::Overlap(2));
    }

    #[test]
    fn test_reference_constraint() {
        let c = TargetConstraint::Reference(words("the big house"));
        assert!(c.permits(0, &words("the"), false));
        assert!(c.permits(1, &words("big house"), true));
        assert!(!c.permits(1, &words("big"), true));
        assert!(!c.permits(2, &words("house ."), false));
        assert!(!c.permits(0, &words("a"), false));
    }

    #[test]
    fn test_prefix_partial_word() {
        let p = PrefixRequest::new(words("the hou"), true).with_rejected(["house"]);
        let c = TargetConstraint::Prefix(p.clone());
        assert_eq!(p.rejected_slot(), 1);
        assert!(c.permits(0, &words("the houses"), false));
        assert!(!c.permits(0, &words("the house"), false));
        assert!(!c.permits(0, &words("the home"), false));
        assert!(c.permits(2, &words("anything"), true));
        assert!(!c.permits(0, &words("the"), true));
    }

    #[test]
    fn test_prefix_rejected_after_full_word() {
        let p = PrefixRequest::new(words("the"), false).with_rejected(["house"]);
        assert!(!p.accepts_word(1, "house"));
        assert!(p.accepts_word(1, "home"));
        assert!(p.accepts_word(2, "house"));
    }
}
