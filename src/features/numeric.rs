//! 数値カラムの標準化（Train 統計のみ使用）。
use serde::{Deserialize, Serialize};

use crate::schema::ArticleRecord;

/// 数値カラムの並び。特徴ベクトル内のオフセットはこの順で固定される。
pub const NUMERIC_COLUMNS: [&str; 7] = [
    "title_length",
    "abstract_length",
    "total_text_length",
    "published_year",
    "publication_decade",
    "has_doi",
    "has_pdf",
];

/// 数値カラム数。
pub const NUMERIC_DIM: usize = NUMERIC_COLUMNS.len();

#[must_use]
fn numeric_row(record: &ArticleRecord) -> [f32; NUMERIC_DIM] {
    [
        record.title_length,
        record.abstract_length,
        record.total_text_length,
        record.published_year,
        record.publication_decade,
        f32::from(u8::from(record.has_doi)),
        f32::from(u8::from(record.has_pdf)),
    ]
}

/// 各数値カラムを平均0・分散1に標準化するスケーラ。
///
/// 統計は Train からのみ計算する。疎なテキストブロックには一切触れないため、
/// 結合後の特徴ベクトルは疎なまま保たれる。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StandardScaler {
    mean: Vec<f32>,
    std: Vec<f32>,
}

impl StandardScaler {
    /// Train レコードから各カラムの平均と標準偏差を計算する。
    #[must_use]
    pub fn fit(records: &[&ArticleRecord]) -> Self {
        if records.is_empty() {
            return Self {
                mean: vec![0.0; NUMERIC_DIM],
                std: vec![1.0; NUMERIC_DIM],
            };
        }

        #[allow(clippy::cast_precision_loss)]
        let n = records.len() as f32;

        let mut mean = vec![0.0f32; NUMERIC_DIM];
        for record in records {
            for (slot, value) in mean.iter_mut().zip(numeric_row(record)) {
                *slot += value;
            }
        }
        for m in &mut mean {
            *m /= n;
        }

        let mut std = vec![0.0f32; NUMERIC_DIM];
        for record in records {
            for (i, value) in numeric_row(record).into_iter().enumerate() {
                let diff = value - mean[i];
                std[i] += diff * diff;
            }
        }
        for s in &mut std {
            *s = (*s / n).sqrt();
            // 定数カラムでのゼロ除算を防ぐ
            if *s < 1e-6 {
                *s = 1e-6;
            }
        }

        Self { mean, std }
    }

    /// レコードの数値カラムを標準化した固定長ベクトルを返す。
    #[must_use]
    pub fn transform(&self, record: &ArticleRecord) -> [f32; NUMERIC_DIM] {
        let mut row = numeric_row(record);
        for (i, value) in row.iter_mut().enumerate() {
            *value = (*value - self.mean[i]) / self.std[i];
        }
        row
    }

    #[must_use]
    pub fn mean(&self) -> &[f32] {
        &self.mean
    }

    #[must_use]
    pub fn std(&self) -> &[f32] {
        &self.std
    }
}
