use super::*;

fn toks(s: &str) -> Vec<String> {
    s.split_whitespace().map(str::to_string).collect()
}

#[test]
fn test_splits_punctuation() {
    let mut pre = BasicPreprocessor::new();
    assert_eq!(
        pre.preprocess("Hello, (small) world!", false, false),
        toks("Hello , ( small ) world !")
    );
    assert_eq!(pre.preprocess("¿Qué?", false, false), toks("¿ Qué ?"));
    assert_eq!(pre.preprocess("...", false, false), toks("..."));
}

#[test]
fn test_lowercase_and_numbers() {
    let mut pre = BasicPreprocessor::new();
    let out = pre.preprocess("La Casa 3,5 pisos y 12.", true, true);
    assert_eq!(out, toks("la casa <number> pisos y <number> ."));
    assert_eq!(pre.pending(), 2);
    assert!(pre.is_category_token("<number>"));
    assert!(!pre.is_category_token("number"));
}

#[test]
fn test_postprocess_restores_numbers_and_case() {
    let mut pre = BasicPreprocessor::new();
    pre.preprocess("la casa tiene 3 pisos .", true, true);
    let text = pre.postprocess(&toks("the house has <number> floors ."), true);
    assert_eq!(text, "The house has 3 floors.");
    assert_eq!(pre.pending(), 0);
}

#[test]
fn test_postprocess_without_state_keeps_placeholder() {
    let mut pre = BasicPreprocessor::new();
    let text = pre.postprocess(&toks("( <number> ) , done"), false);
    assert_eq!(text, "(<number>), done");
}

#[test]
fn test_keep_state_resets_queue() {
    let mut pre = BasicPreprocessor::new();
    pre.preprocess("1 2", false, true);
    pre.preprocess("7", false, true);
    assert_eq!(pre.postprocess(&toks("<number>"), false), "7");
    pre.preprocess("8", false, false);
    assert_eq!(pre.pending(), 0);
}

#[test]
fn test_prefix_mapping_partial() {
    let mut pre = BasicPreprocessor::new();
    let m = PrefixMapping::from_raw("The hou", &mut pre, true);
    assert_eq!(m.tokens, toks("the hou"));
    assert!(m.last_word_partial);

    let m = PrefixMapping::from_raw("The house ", &mut pre, true);
    assert!(!m.last_word_partial);

    let m = PrefixMapping::from_raw("", &mut pre, true);
    assert!(m.tokens.is_empty());
    assert!(!m.last_word_partial);

    let req = PrefixMapping::from_raw("the ", &mut pre, false).to_request(["house"]);
    assert_eq!(req.words, toks("the"));
    assert!(req.rejected.contains("house"));
}

#[test]
fn test_merge_keeps_raw_prefix() {
    let mut pre = BasicPreprocessor::new();
    let raw = "The  HOU";
    let m = PrefixMapping::from_raw(raw, &mut pre, true);
    let merged = merge_completion(raw, &m, &toks("the house is big ."), &mut pre, true);
    assert_eq!(merged, "The  HOUse is big.");
}

#[test]
fn test_merge_after_full_word() {
    let mut pre = BasicPreprocessor::new();
    let raw = "The house ";
    let m = PrefixMapping::from_raw(raw, &mut pre, true);
    let merged = merge_completion(raw, &m, &toks("the house is big"), &mut pre, true);
    assert_eq!(merged, "The house is big");

    let raw = "The house";
    let mut m = PrefixMapping::from_raw(raw, &mut pre, true);
    m.last_word_partial = false;
    let merged = merge_completion(raw, &m, &toks("the house , big"), &mut pre, true);
    assert_eq!(merged, "The house, big");
}

#[test]
fn test_merge_without_prefix() {
    let mut pre = BasicPreprocessor::new();
    let m = PrefixMapping::from_raw("", &mut pre, true);
    let merged = merge_completion("", &m, &toks("the house ."), &mut pre, true);
    assert_eq!(merged, "The house.");
}

#[test]
fn test_merge_prefix_only() {
    let mut pre = BasicPreprocessor::new();
    let raw = "the house";
    let m = PrefixMapping::from_raw(raw, &mut pre, false);
    assert_eq!(merge_completion(raw, &m, &toks("the house"), &mut pre, false), raw);
}

#[test]
fn test_merge_skips_typed_categories() {
    let mut pre = BasicPreprocessor::new();
    pre.preprocess("tiene 3 pisos y 4 ventanas", false, true);
    let raw = "has 3 ";
    let m = PrefixMapping::from_raw(raw, &mut pre, false);
    assert_eq!(m.tokens, toks("has <number>"));
    let merged = merge_completion(
        raw,
        &m,
        &toks("has <number> floors and <number> windows"),
        &mut pre,
        false,
    );
    assert_eq!(merged, "has 3 floors and 4 windows");
}
