//! 名義カラムの one-hot エンコード。
use rustc_hash::{FxHashMap, FxHashSet};
use serde::{Deserialize, Serialize};

use crate::schema::ArticleRecord;

/// one-hot 対象カラムの並び。特徴ベクトル内のオフセットはこの順で固定される。
pub const CATEGORICAL_COLUMNS: [&str; 4] = ["source", "journal", "provenance_sources", "main_topic"];

fn categorical_row(record: &ArticleRecord) -> [&str; CATEGORICAL_COLUMNS.len()] {
    [
        record.source.as_str(),
        record.journal.as_str(),
        record.provenance_sources.as_str(),
        record.main_topic.as_str(),
    ]
}

/// one-hot エンコーダ。カテゴリ集合は Train で観測された値のみから作られる。
///
/// 推論時に Train で未観測の値が来たカラムは全ゼロのインジケータになる。
/// エラーにはせず、語彙を後から書き換えることもしない。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OneHotEncoder {
    /// カラムごとのカテゴリ一覧（ソート済み、インデックスが one-hot 位置）
    categories: Vec<Vec<String>>,
    #[serde(skip)]
    index: Vec<FxHashMap<String, usize>>,
}

impl OneHotEncoder {
    /// Train レコードからカラムごとのカテゴリ集合を構築する。
    #[must_use]
    pub fn fit(records: &[&ArticleRecord]) -> Self {
        let mut categories: Vec<Vec<String>> = Vec::with_capacity(CATEGORICAL_COLUMNS.len());
        for column in 0..CATEGORICAL_COLUMNS.len() {
            let values: FxHashSet<&str> = records
                .iter()
                .map(|record| categorical_row(record)[column])
                .collect();
            let mut sorted: Vec<String> = values.into_iter().map(str::to_string).collect();
            sorted.sort_unstable();
            categories.push(sorted);
        }
        let index = build_index(&categories);
        Self { categories, index }
    }

    /// デシリアライズ後にカテゴリインデックスを再構築する。
    pub(crate) fn rebuild_index(&mut self) {
        self.index = build_index(&self.categories);
    }

    /// one-hot ブロック全体の幅（全カラムのカテゴリ数合計）。
    #[must_use]
    pub fn width(&self) -> usize {
        self.categories.iter().map(Vec::len).sum()
    }

    #[must_use]
    pub fn categories(&self) -> &[Vec<String>] {
        &self.categories
    }

    /// レコードを (ブロック内オフセット, 1.0) の疎な並びに変換する。
    /// 返り値はオフセット昇順。未知カテゴリのカラムは何も寄与しない。
    #[must_use]
    pub fn transform(&self, record: &ArticleRecord) -> Vec<(usize, f32)> {
        let row = categorical_row(record);
        let mut entries = Vec::with_capacity(CATEGORICAL_COLUMNS.len());
        let mut base = 0;
        for (column, value) in row.iter().enumerate() {
            if let Some(&position) = self.index[column].get(*value) {
                entries.push((base + position, 1.0));
            }
            base += self.categories[column].len();
        }
        entries
    }
}

fn build_index(categories: &[Vec<String>]) -> Vec<FxHashMap<String, usize>> {
    categories
        .iter()
        .map(|column| {
            column
                .iter()
                .enumerate()
                .map(|(position, value)| (value.clone(), position))
                .collect()
        })
        .collect()
}
