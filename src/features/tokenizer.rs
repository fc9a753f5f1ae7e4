//! 英語学術テキストのトークナイズと正規化処理。
use once_cell::sync::Lazy;
use regex::Regex;
use unicode_normalization::UnicodeNormalization;
use unicode_segmentation::UnicodeSegmentation;

static FALLBACK_SPLIT_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"[^\p{L}\p{N}]+").expect("compile fallback pattern"));

fn normalize_text(input: &str) -> String {
    input.nfc().collect::<String>()
}

/// テキストを正規化済みの小文字トークン列に分割する。
#[must_use]
pub fn tokenize(text: &str) -> Vec<String> {
    let normalized = normalize_text(text);
    let tokens: Vec<String> = normalized
        .split_word_bounds()
        .map(|token| token.trim_matches(|c: char| !c.is_ascii_alphanumeric()))
        .filter(|token| !token.is_empty())
        .map(normalize_token)
        .collect();
    if tokens.is_empty() {
        // word-bound 分割が効かない文字種向けのフォールバック
        return FALLBACK_SPLIT_RE
            .split(&normalized)
            .filter(|token| !token.is_empty())
            .map(str::to_lowercase)
            .collect();
    }
    tokens
}

/// トークン列に unigram と bigram を並べた n-gram 列を返す。
/// bigram はスペース区切りで連結する（語彙上は1タームとして扱う）。
#[must_use]
pub fn ngrams(tokens: &[String], max_n: usize) -> Vec<String> {
    let mut terms = Vec::with_capacity(tokens.len() * max_n.max(1));
    terms.extend(tokens.iter().cloned());
    if max_n >= 2 {
        for pair in tokens.windows(2) {
            terms.push(format!("{} {}", pair[0], pair[1]));
        }
    }
    terms
}

fn normalize_token(token: &str) -> String {
    let lower = token.to_lowercase();
    if lower.ends_with("ies") && lower.len() > 3 {
        let stem = lower.trim_end_matches("ies");
        return format!("{stem}y");
    }
    if lower.ends_with("ing") && lower.len() > 4 {
        return lower.trim_end_matches("ing").to_string();
    }
    if lower.ends_with('s') && lower.len() > 3 {
        return lower.trim_end_matches('s').to_string();
    }
    lower
}
