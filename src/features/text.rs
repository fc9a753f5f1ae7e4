//! combined_text を疎な TF-IDF ベクトルに変換するサブ変換。
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::tokenizer::{ngrams, tokenize};

/// n-gram スパン（unigram + bigram）。
pub const NGRAM_MAX: usize = 2;

/// 語彙構築のハイパーパラメータ。すべて Train コーパスにのみ適用される。
#[derive(Debug, Clone, Copy)]
pub struct TfidfOptions {
    /// 語彙の最大サイズ（DF降順で上位を採用）
    pub vocab_size: usize,
    /// この文書数未満にしか現れないタームを除外する
    pub min_doc_freq: usize,
    /// この割合を超える文書に現れるターム（ほぼ全文書に出る低信号ターム）を除外する
    pub max_doc_ratio: f32,
}

/// TF-IDF ベクトライザ。語彙と IDF は Train コーパスからのみ学習される。
///
/// 推論時に未知のタームはゼロ寄与として無視され、エラーにはならない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocab: Vec<String>,
    idf: Vec<f32>,
    #[serde(skip)]
    vocab_index: FxHashMap<String, usize>,
}

impl TfidfVectorizer {
    /// Train コーパスから語彙と IDF を構築する。
    ///
    /// ターム選択は (1) `min_doc_freq` 未満を除外、(2) `max_doc_ratio` 超を除外、
    /// (3) DF 降順（同値はターム昇順）で `vocab_size` 件に切り詰め、の順で行う。
    #[must_use]
    pub fn fit(documents: &[&str], options: &TfidfOptions) -> Self {
        let total_docs = documents.len();
        let mut doc_freq: FxHashMap<String, usize> = FxHashMap::default();
        for doc in documents {
            let tokens = tokenize(doc);
            let seen: FxHashSet<String> = ngrams(&tokens, NGRAM_MAX).into_iter().collect();
            for term in seen {
                *doc_freq.entry(term).or_insert(0) += 1;
            }
        }
        let unique_terms = doc_freq.len();

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let max_df = (options.max_doc_ratio * total_docs as f32).floor() as usize;
        let mut term_df_pairs: Vec<(String, usize)> = doc_freq
            .into_iter()
            .filter(|(_, df)| *df >= options.min_doc_freq && *df <= max_df.max(1))
            .collect();
        // DF降順、同DFはターム昇順で安定させる（決定性のため）
        term_df_pairs.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        term_df_pairs.truncate(options.vocab_size);

        let vocab: Vec<String> = term_df_pairs.iter().map(|(term, _)| term.clone()).collect();
        #[allow(clippy::cast_precision_loss)]
        let idf: Vec<f32> = term_df_pairs
            .iter()
            .map(|(_, df)| {
                // IDF(t) = log((N + 1) / (DF(t) + 1)) + 1
                let n = total_docs as f32;
                let df_val = *df as f32;
                ((n + 1.0) / (df_val + 1.0)).ln() + 1.0
            })
            .collect();

        info!(
            total_docs,
            unique_terms,
            selected_vocab_size = vocab.len(),
            min_doc_freq = options.min_doc_freq,
            max_doc_ratio = options.max_doc_ratio,
            "tfidf vocabulary built"
        );

        let vocab_index = build_index(&vocab);
        Self {
            vocab,
            idf,
            vocab_index,
        }
    }

    /// デシリアライズ後に語彙インデックスを再構築する。
    pub(crate) fn rebuild_index(&mut self) {
        self.vocab_index = build_index(&self.vocab);
    }

    #[must_use]
    pub fn vocab_len(&self) -> usize {
        self.vocab.len()
    }

    #[must_use]
    pub fn vocab(&self) -> &[String] {
        &self.vocab
    }

    #[must_use]
    pub fn idf(&self) -> &[f32] {
        &self.idf
    }

    /// テキストを (語彙インデックス, 重み) の疎な並びに変換する。
    /// 返り値はインデックス昇順。ブロック全体を L2 正規化する。
    #[must_use]
    pub fn transform(&self, text: &str) -> Vec<(usize, f32)> {
        let tokens = tokenize(text);
        let mut raw_counts: FxHashMap<usize, f32> = FxHashMap::default();
        let mut total_hits = 0.0f32;
        for term in ngrams(&tokens, NGRAM_MAX) {
            if let Some(&index) = self.vocab_index.get(&term) {
                *raw_counts.entry(index).or_insert(0.0) += 1.0;
                total_hits += 1.0;
            }
        }
        if total_hits == 0.0 {
            return Vec::new();
        }

        let mut entries: Vec<(usize, f32)> = raw_counts
            .into_iter()
            .map(|(index, raw)| {
                let tf = raw / total_hits;
                (index, tf * self.idf[index])
            })
            .collect();
        entries.sort_unstable_by_key(|(index, _)| *index);

        let norm: f32 = entries
            .iter()
            .map(|(_, value)| value * value)
            .sum::<f32>()
            .sqrt();
        if norm > 0.0 {
            for (_, value) in &mut entries {
                *value /= norm;
            }
        }
        entries
    }
}

fn build_index(vocab: &[String]) -> FxHashMap<String, usize> {
    vocab
        .iter()
        .enumerate()
        .map(|(index, term)| (term.clone(), index))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn options() -> TfidfOptions {
        TfidfOptions {
            vocab_size: 100,
            min_doc_freq: 1,
            max_doc_ratio: 1.0,
        }
    }

    #[test]
    fn fit_selects_terms_by_document_frequency() {
        let docs: Vec<&str> = vec![
            "malaria clinic",
            "malaria vaccine",
            "rural school curriculum",
        ];
        let vectorizer = TfidfVectorizer::fit(
            &docs,
            &TfidfOptions {
                vocab_size: 1,
                min_doc_freq: 1,
                max_doc_ratio: 1.0,
            },
        );
        // "malaria" は DF=2 で最頻、vocab_size=1 ならそれだけが残る
        assert_eq!(vectorizer.vocab(), ["malaria"]);
    }

    #[test]
    fn min_doc_freq_drops_rare_terms() {
        let docs: Vec<&str> = vec!["solar power", "solar grid", "wind turbine"];
        let vectorizer = TfidfVectorizer::fit(
            &docs,
            &TfidfOptions {
                vocab_size: 100,
                min_doc_freq: 2,
                max_doc_ratio: 1.0,
            },
        );
        assert_eq!(vectorizer.vocab(), ["solar"]);
    }

    #[test]
    fn max_doc_ratio_drops_near_universal_terms() {
        // "the" は全4文書に現れる (DF ratio 1.0 > 0.8)
        let docs: Vec<&str> = vec![
            "the malaria clinic",
            "the rural school",
            "the solar grid",
            "the mining site",
        ];
        let vectorizer = TfidfVectorizer::fit(
            &docs,
            &TfidfOptions {
                vocab_size: 100,
                min_doc_freq: 1,
                max_doc_ratio: 0.8,
            },
        );
        assert!(!vectorizer.vocab().iter().any(|t| t == "the"));
        assert!(vectorizer.vocab().iter().any(|t| t == "malaria"));
    }

    #[test]
    fn transform_ignores_unknown_terms() {
        let docs: Vec<&str> = vec!["malaria clinic", "malaria vaccine"];
        let vectorizer = TfidfVectorizer::fit(&docs, &options());
        let entries = vectorizer.transform("completely unseen vocabulary");
        assert!(entries.is_empty());
    }

    #[test]
    fn transform_is_idempotent() {
        let docs: Vec<&str> = vec!["malaria clinic trial", "rural school curriculum"];
        let vectorizer = TfidfVectorizer::fit(&docs, &options());
        let first = vectorizer.transform("malaria clinic in a rural school");
        let second = vectorizer.transform("malaria clinic in a rural school");
        assert_eq!(first, second);
    }

    #[test]
    fn transform_output_is_l2_normalized_and_sorted() {
        let docs: Vec<&str> = vec!["malaria clinic trial", "malaria school trial"];
        let vectorizer = TfidfVectorizer::fit(&docs, &options());
        let entries = vectorizer.transform("malaria clinic");
        assert!(!entries.is_empty());
        assert!(entries.windows(2).all(|w| w[0].0 < w[1].0));
        let norm: f32 = entries.iter().map(|(_, v)| v * v).sum::<f32>().sqrt();
        assert!((norm - 1.0).abs() < 1e-5);
    }

    #[test]
    fn serde_round_trip_preserves_transform() {
        let docs: Vec<&str> = vec!["malaria clinic trial", "rural school curriculum"];
        let vectorizer = TfidfVectorizer::fit(&docs, &options());
        let json = serde_json::to_string(&vectorizer).unwrap();
        let mut restored: TfidfVectorizer = serde_json::from_str(&json).unwrap();
        restored.rebuild_index();
        assert_eq!(
            vectorizer.transform("malaria clinic"),
            restored.transform("malaria clinic")
        );
    }
}
