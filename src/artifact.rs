//! 学習済みパイプラインの永続化と推論。
//!
//! 特徴トランスフォーマと学習済み分類器は必ず1つのバンドルとして
//! 直列化する。別々に保存することはなく、前処理とモデルパラメータが
//! 食い違った状態でロードされることは構造上起こらない。
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result, ensure};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sprs::CsVec;
use tracing::info;

use crate::features::FeatureTransformer;
use crate::model::{ClassifierKind, FittedClassifier};
use crate::schema::ArticleRecord;

/// バンドルの内部スキーマ版数。ロード時に一致しなければ致命的エラー。
pub const ARTIFACT_SCHEMA_VERSION: u32 = 1;

/// 1件の推論結果。
#[derive(Debug, Clone, Serialize)]
pub struct Prediction {
    /// 予測されたセクターラベル
    pub sector: String,
    /// 全セクターの決定スコア（降順）。ランキングには使えるが確率ではない。
    pub scores: Vec<(String, f32)>,
    /// 確率型戦略のときのみ：全セクターにわたる較正された確率分布
    pub probabilities: Option<Vec<(String, f32)>>,
}

/// 学習で作られ、一度永続化され、何度もロードされる不変のバンドル。
///
/// 部分更新は存在しない。再学習は常に新しいバンドルを丸ごと作る。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineArtifact {
    schema_version: u32,
    strategy: ClassifierKind,
    trained_at: DateTime<Utc>,
    sectors: Vec<String>,
    transformer: FeatureTransformer,
    classifier: FittedClassifier,
}

impl PipelineArtifact {
    /// 学習直後のトランスフォーマと分類器からバンドルを組み立てる。
    #[must_use]
    pub fn new(
        transformer: FeatureTransformer,
        classifier: FittedClassifier,
        sectors: Vec<String>,
    ) -> Self {
        Self {
            schema_version: ARTIFACT_SCHEMA_VERSION,
            strategy: classifier.kind(),
            trained_at: Utc::now(),
            sectors,
            transformer,
            classifier,
        }
    }

    #[must_use]
    pub fn strategy(&self) -> ClassifierKind {
        self.strategy
    }

    #[must_use]
    pub fn sectors(&self) -> &[String] {
        &self.sectors
    }

    #[must_use]
    pub fn trained_at(&self) -> DateTime<Utc> {
        self.trained_at
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.classifier.converged()
    }

    /// 戦略を識別できるバンドルファイル名。
    #[must_use]
    pub fn file_name(&self) -> String {
        format!("sector_model_{}.json", self.strategy)
    }

    /// 生レコード1件からラベル1件を返す。凍結済みの学習時状態のみを使い、
    /// 推論中に再フィットは一切行わない。未知の語・カテゴリはゼロ寄与。
    #[must_use]
    pub fn predict(&self, record: &ArticleRecord) -> Prediction {
        let features: CsVec<f32> = self.transformer.transform(record);
        let scores = self.classifier.decision_scores(&features);
        let predicted = self.classifier.predict(&features);

        let mut ranking: Vec<(String, f32)> = self
            .sectors
            .iter()
            .cloned()
            .zip(scores.iter().copied())
            .collect();
        ranking.sort_by(|a, b| b.1.partial_cmp(&a.1).unwrap_or(std::cmp::Ordering::Equal));

        let probabilities = self.classifier.predict_proba(&features).map(|probs| {
            self.sectors
                .iter()
                .cloned()
                .zip(probs)
                .collect::<Vec<(String, f32)>>()
        });

        Prediction {
            sector: self.sectors[predicted].clone(),
            scores: ranking,
            probabilities,
        }
    }

    /// バンドルを1ファイルとしてアトミックに保存し、そのパスを返す。
    ///
    /// 同一ディレクトリ内の一時ファイルに書いてから rename する。
    ///
    /// # Errors
    /// ディレクトリ作成、直列化、書き込み、rename のいずれかに失敗した場合。
    pub fn save(&self, dir: &Path) -> Result<PathBuf> {
        fs::create_dir_all(dir)
            .with_context(|| format!("failed to create artifact dir {}", dir.display()))?;
        let path = dir.join(self.file_name());
        let tmp_path = dir.join(format!("{}.tmp", self.file_name()));

        let raw = serde_json::to_string(self).context("failed to serialize pipeline artifact")?;
        fs::write(&tmp_path, raw)
            .with_context(|| format!("failed to write artifact to {}", tmp_path.display()))?;
        fs::rename(&tmp_path, &path)
            .with_context(|| format!("failed to move artifact into place at {}", path.display()))?;

        info!(
            path = %path.display(),
            strategy = %self.strategy,
            sectors = self.sectors.len(),
            "pipeline artifact saved"
        );
        Ok(path)
    }

    /// バンドルをロードし、整合性を検証する。
    ///
    /// # Errors
    /// 読み込み・デシリアライズの失敗に加え、スキーマ版数の不一致や
    /// 内部次元の不整合は致命的エラーとして返す。検証を通らないバンドルが
    /// 「正常にロードできたが黙って誤予測する」状態は起こさない。
    pub fn load(path: &Path) -> Result<Self> {
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read artifact from {}", path.display()))?;
        let mut artifact: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse pipeline artifact {}", path.display()))?;
        artifact.transformer.rebuild_indexes();
        artifact.validate()?;

        info!(
            path = %path.display(),
            strategy = %artifact.strategy,
            trained_at = %artifact.trained_at,
            "pipeline artifact loaded"
        );
        Ok(artifact)
    }

    fn validate(&self) -> Result<()> {
        ensure!(
            self.schema_version == ARTIFACT_SCHEMA_VERSION,
            "artifact schema version mismatch: expected {ARTIFACT_SCHEMA_VERSION}, got {}",
            self.schema_version
        );
        ensure!(
            self.strategy == self.classifier.kind(),
            "artifact strategy tag does not match the embedded classifier"
        );
        ensure!(
            !self.sectors.is_empty(),
            "artifact has an empty sector vocabulary"
        );
        ensure!(
            self.classifier.classes() == self.sectors.as_slice(),
            "classifier class list does not match the sector vocabulary"
        );
        ensure!(
            self.classifier.feature_dim() == self.transformer.width(),
            "feature transformer width {} does not match classifier dimension {}",
            self.transformer.width(),
            self.classifier.feature_dim()
        );
        Ok(())
    }
}
