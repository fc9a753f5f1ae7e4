//! 学術論文メタデータの入力スキーマ。
use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// 1件の論文メタデータレコード。取り込み後は不変として扱う。
///
/// `combined_text` はハーベスタ側で title / abstract / keywords を連結した
/// 自由テキスト。数値・真偽値カラムはハーベスタが導出済みの値をそのまま持つ。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ArticleRecord {
    pub combined_text: String,
    pub title_length: f32,
    pub abstract_length: f32,
    pub total_text_length: f32,
    pub published_year: f32,
    pub publication_decade: f32,
    pub has_doi: bool,
    pub has_pdf: bool,
    pub source: String,
    pub journal: String,
    pub provenance_sources: String,
    pub main_topic: String,
}

/// ラベル付きレコード。`query_sector` が教師ラベル（1レコードにつき1セクター）。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabeledRecord {
    #[serde(flatten)]
    pub article: ArticleRecord,
    pub query_sector: String,
}

/// データ検証エラー。学習開始前に必ず検出する（fail fast）。
#[derive(Debug, Error)]
pub enum DataError {
    #[error("dataset is empty")]
    EmptyDataset,
    #[error("record {index} has sector '{label}' which is not in the configured vocabulary")]
    UnknownSector { index: usize, label: String },
    #[error(
        "sector '{sector}' has only {count} example(s); at least 2 are required for stratification"
    )]
    SectorTooSmall { sector: String, count: usize },
    #[error("test fraction {0} must be in (0.0, 1.0)")]
    InvalidTestFraction(f32),
}

/// ラベル付きデータセットをJSONファイルから読み込む。
///
/// # Errors
/// ファイルの読み込み、またはJSONのデシリアライズに失敗した場合はエラーを返す。
/// 必須カラムの欠落はここでデシリアライズエラーとして検出される。
pub fn load_labeled_dataset(path: &Path) -> Result<Vec<LabeledRecord>> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read dataset from {}", path.display()))?;
    let records: Vec<LabeledRecord> = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse labeled dataset {}", path.display()))?;
    Ok(records)
}

/// 1件の推論対象レコードをJSONファイルから読み込む。
///
/// # Errors
/// ファイルの読み込み、またはJSONのデシリアライズに失敗した場合はエラーを返す。
pub fn load_article(path: &Path) -> Result<ArticleRecord> {
    let raw = fs::read_to_string(path)
        .with_context(|| format!("failed to read record from {}", path.display()))?;
    let record: ArticleRecord = serde_json::from_str(&raw)
        .with_context(|| format!("failed to parse article record {}", path.display()))?;
    Ok(record)
}

/// ラベルが設定済みセクター語彙に含まれるか検証する。
///
/// # Errors
/// 空データセット、または語彙外のラベルを持つレコードがあれば [`DataError`] を返す。
pub fn validate_labels(records: &[LabeledRecord], sectors: &[String]) -> Result<(), DataError> {
    if records.is_empty() {
        return Err(DataError::EmptyDataset);
    }
    for (index, record) in records.iter().enumerate() {
        if !sectors.iter().any(|s| s == &record.query_sector) {
            return Err(DataError::UnknownSector {
                index,
                label: record.query_sector.clone(),
            });
        }
    }
    Ok(())
}
