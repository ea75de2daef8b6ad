//! Tokenization around the decoder: raw text in, decoder tokens out, and
//! back again for the translation.

#[cfg(test)]
mod tests;

use std::collections::VecDeque;

use crate::search::PrefixRequest;

/// Placeholder every number is replaced with.
pub const NUMBER_TOKEN: &str = "<number>";

pub trait Preprocessor: Send {
    /// Split `raw` into decoder tokens. With `keep_state`, category
    /// originals are remembered for the next `postprocess` call.
    fn preprocess(&mut self, raw: &str, case_convert: bool, keep_state: bool) -> Vec<String>;

    /// Join decoder tokens into display text, restoring remembered
    /// category originals in order.
    fn postprocess(&mut self, tokens: &[String], case_convert: bool) -> String;

    fn is_category_token(&self, word: &str) -> bool;
}

/// Punctuation that sticks to the preceding word.
fn is_closing_punct(c: char) -> bool {
    matches!(c, '.' | ',' | ';' | ':' | '!' | '?' | ')' | ']' | '}' | '»' | '%')
}

/// Punctuation that sticks to the following word.
fn is_opening_punct(c: char) -> bool {
    matches!(c, '(' | '[' | '{' | '¿' | '¡' | '«')
}

fn is_quote(c: char) -> bool {
    matches!(c, '"' | '\'')
}

fn is_number(token: &str) -> bool {
    token.starts_with(|c: char| c.is_ascii_digit())
        && token
            .chars()
            .all(|c| c.is_ascii_digit() || c == '.' || c == ',')
        && !token.ends_with(&['.', ','][..])
}

fn is_closing_token(token: &str) -> bool {
    token.chars().all(is_closing_punct)
}

fn is_opening_token(token: &str) -> bool {
    token.chars().all(is_opening_punct)
}

/// Whitespace tokenizer that splits punctuation off word boundaries and
/// maps numbers to [`NUMBER_TOKEN`].
#[derive(Debug, Default)]
pub struct BasicPreprocessor {
    pending: VecDeque<String>,
}

impl BasicPreprocessor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Originals waiting to replace category tokens.
    pub fn pending(&self) -> usize {
        self.pending.len()
    }

    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// Peel punctuation off both ends of a whitespace-delimited chunk. A
    /// chunk made only of punctuation stays whole.
    fn split_chunk(chunk: &str, out: &mut Vec<String>) {
        let detachable = |c: char| is_opening_punct(c) || is_closing_punct(c) || is_quote(c);
        let has_word = |s: &str| !s.chars().all(detachable);

        let mut rest = chunk;
        while let Some(c) = rest.chars().next() {
            let stripped = &rest[c.len_utf8()..];
            if (is_opening_punct(c) || is_quote(c)) && has_word(stripped) {
                out.push(c.to_string());
                rest = stripped;
            } else {
                break;
            }
        }
        let mut trailing = Vec::new();
        while let Some(c) = rest.chars().next_back() {
            let stripped = &rest[..rest.len() - c.len_utf8()];
            if (is_closing_punct(c) || is_quote(c)) && has_word(stripped) {
                trailing.push(c.to_string());
                rest = stripped;
            } else {
                break;
            }
        }
        out.push(rest.to_string());
        out.extend(trailing.into_iter().rev());
    }
}

impl Preprocessor for BasicPreprocessor {
    fn preprocess(&mut self, raw: &str, case_convert: bool, keep_state: bool) -> Vec<String> {
        let mut pieces = Vec::new();
        for chunk in raw.split_whitespace() {
            Self::split_chunk(chunk, &mut pieces);
        }
        if keep_state {
            self.pending.clear();
        }
        pieces
            .into_iter()
            .map(|piece| {
                if is_number(&piece) {
                    if keep_state {
                        self.pending.push_back(piece);
                    }
                    NUMBER_TOKEN.to_string()
                } else if case_convert {
                    piece.to_lowercase()
                } else {
                    piece
                }
            })
            .collect()
    }

    fn postprocess(&mut self, tokens: &[String], case_convert: bool) -> String {
        let mut text = String::new();
        let mut glue_next = true;
        let mut capitalize = case_convert;
        for token in tokens {
            let word = if self.is_category_token(token) {
                self.pending.pop_front().unwrap_or_else(|| token.clone())
            } else if capitalize && token.chars().any(char::is_alphabetic) {
                capitalize = false;
                capitalize_first(token)
            } else {
                token.clone()
            };
            if !glue_next && !is_closing_token(token) {
                text.push(' ');
            }
            glue_next = is_opening_token(token);
            text.push_str(&word);
        }
        text
    }

    fn is_category_token(&self, word: &str) -> bool {
        word == NUMBER_TOKEN
    }
}

fn capitalize_first(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

/// A user-typed raw prefix together with its decoder tokens.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PrefixMapping {
    pub tokens: Vec<String>,
    /// The raw prefix does not end in whitespace, so its last token may
    /// still grow.
    pub last_word_partial: bool,
}

impl PrefixMapping {
    pub fn from_raw(raw_prefix: &str, pre: &mut dyn Preprocessor, case_convert: bool) -> Self {
        let tokens = pre.preprocess(raw_prefix, case_convert, false);
        let last_word_partial =
            !tokens.is_empty() && !raw_prefix.ends_with(char::is_whitespace);
        Self {
            tokens,
            last_word_partial,
        }
    }

    pub fn to_request<I, S>(&self, rejected: I) -> PrefixRequest
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        PrefixRequest::new(self.tokens.clone(), self.last_word_partial).with_rejected(rejected)
    }
}

/// Display text for a prefix-constrained translation: `raw_prefix`
/// unchanged, followed by whatever `target` adds after the prefix tokens.
pub fn merge_completion(
    raw_prefix: &str,
    mapping: &PrefixMapping,
    target: &[String],
    post: &mut dyn Preprocessor,
    case_convert: bool,
) -> String {
    let p = mapping.tokens.len();
    if p == 0 {
        return format!("{raw_prefix}{}", post.postprocess(target, case_convert));
    }
    let mut merged = raw_prefix.to_string();
    if mapping.last_word_partial {
        if let (Some(typed), Some(full)) = (mapping.tokens.get(p - 1), target.get(p - 1)) {
            if let Some(tail) = full.strip_prefix(typed.as_str()) {
                merged.push_str(tail);
            }
        }
    }
    let suffix = target.get(p..).unwrap_or(&[]);
    if suffix.is_empty() {
        return merged;
    }
    // Category originals typed in the prefix are already on screen.
    let typed: Vec<String> = mapping
        .tokens
        .iter()
        .filter(|t| post.is_category_token(t))
        .cloned()
        .collect();
    if !typed.is_empty() {
        post.postprocess(&typed, false);
    }
    let rest = post.postprocess(suffix, false);
    let glued = is_closing_token(&suffix[0])
        || merged.ends_with(char::is_whitespace)
        || merged.ends_with(is_opening_punct);
    if !glued {
        merged.push(' ');
    }
    merged.push_str(&rest);
    merged
}
