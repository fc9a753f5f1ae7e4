//! 生レコードを固定幅の疎な特徴ベクトルへ変換する層。
//!
//! テキスト（TF-IDF）・数値（標準化）・カテゴリ（one-hot）の3つの独立した
//! サブ変換を結合する。内部状態はすべて Train からのみ学習され、Test や
//! 推論入力に対しては変換のみを行い、再フィットは決して行わない。
use serde::{Deserialize, Serialize};
use sprs::CsVec;
use tracing::info;

use crate::schema::ArticleRecord;

pub mod categorical;
pub mod numeric;
pub mod text;
pub mod tokenizer;

use categorical::OneHotEncoder;
use numeric::{NUMERIC_DIM, StandardScaler};
use text::{TfidfOptions, TfidfVectorizer};

/// 3つのサブ変換を束ねた特徴トランスフォーマ。
///
/// 特徴ベクトルのレイアウトは `[テキスト | 数値 | カテゴリ]` のブロック順で
/// 固定。疎なテキストブロックを密化することはない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FeatureTransformer {
    text: TfidfVectorizer,
    scaler: StandardScaler,
    encoder: OneHotEncoder,
}

impl FeatureTransformer {
    /// Train レコードのみから全サブ変換をフィットする。
    #[must_use]
    pub fn fit(records: &[&ArticleRecord], options: &TfidfOptions) -> Self {
        let documents: Vec<&str> = records
            .iter()
            .map(|record| record.combined_text.as_str())
            .collect();
        let text = TfidfVectorizer::fit(&documents, options);
        let scaler = StandardScaler::fit(records);
        let encoder = OneHotEncoder::fit(records);

        let transformer = Self {
            text,
            scaler,
            encoder,
        };
        info!(
            text_dim = transformer.text.vocab_len(),
            numeric_dim = NUMERIC_DIM,
            categorical_dim = transformer.encoder.width(),
            width = transformer.width(),
            "feature transformer fitted"
        );
        transformer
    }

    /// デシリアライズ後に内部インデックスを再構築する。
    pub(crate) fn rebuild_indexes(&mut self) {
        self.text.rebuild_index();
        self.encoder.rebuild_index();
    }

    /// 結合後の特徴ベクトルの全幅。
    #[must_use]
    pub fn width(&self) -> usize {
        self.text.vocab_len() + NUMERIC_DIM + self.encoder.width()
    }

    #[must_use]
    pub fn text(&self) -> &TfidfVectorizer {
        &self.text
    }

    #[must_use]
    pub fn encoder(&self) -> &OneHotEncoder {
        &self.encoder
    }

    /// 1レコードを疎な特徴ベクトルへ変換する。
    ///
    /// 同一のフィット済み状態と同一の入力に対して出力はビット単位で一致する。
    /// Train に無い語・カテゴリはゼロ寄与として無視され、エラーにはならない。
    #[must_use]
    pub fn transform(&self, record: &ArticleRecord) -> CsVec<f32> {
        let text_dim = self.text.vocab_len();
        let numeric_base = text_dim;
        let categorical_base = text_dim + NUMERIC_DIM;

        let text_entries = self.text.transform(&record.combined_text);
        let numeric_row = self.scaler.transform(record);
        let categorical_entries = self.encoder.transform(record);

        let capacity = text_entries.len() + NUMERIC_DIM + categorical_entries.len();
        let mut indices = Vec::with_capacity(capacity);
        let mut values = Vec::with_capacity(capacity);

        for (index, value) in text_entries {
            indices.push(index);
            values.push(value);
        }
        for (offset, value) in numeric_row.into_iter().enumerate() {
            indices.push(numeric_base + offset);
            values.push(value);
        }
        for (offset, value) in categorical_entries {
            indices.push(categorical_base + offset);
            values.push(value);
        }

        // 各ブロック内は昇順、ブロック基底も昇順なので全体が昇順
        CsVec::new(self.width(), indices, values)
    }

    /// 複数レコードをまとめて変換する。
    #[must_use]
    pub fn transform_batch(&self, records: &[&ArticleRecord]) -> Vec<CsVec<f32>> {
        records.iter().map(|record| self.transform(record)).collect()
    }
}
