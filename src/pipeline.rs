//! 学習・評価パイプラインのオーケストレーション。
//!
//! ステージは split → transform-fit → train → evaluate → persist の
//! 一方向に流れる。特徴量のフィットと分類器の学習は分割より後に、
//! Train 側のデータだけを見て行われる。この順序がリーク防止の
//! 不変条件であり、本モジュールがそれを保証する。
use anyhow::{Context, Result};
use sprs::CsVec;
use tracing::info;

use crate::artifact::PipelineArtifact;
use crate::config::Config;
use crate::evaluation::metrics::{ConfusionMatrix, EvaluationReport};
use crate::features::text::TfidfOptions;
use crate::features::FeatureTransformer;
use crate::model::{FittedClassifier, TrainOptions};
use crate::schema::{validate_labels, LabeledRecord};
use crate::split::{stratified_split, DatasetSplit};

/// 1回の学習の成果物。
#[derive(Debug)]
pub struct TrainingOutcome {
    pub artifact: PipelineArtifact,
    pub report: EvaluationReport,
    pub split: DatasetSplit,
}

/// ラベル付きデータセットから学習済みバンドルと評価レポートを作る。
///
/// # Errors
/// データ検証エラー（語彙外ラベル、2例未満のセクターなど）は
/// フィッティングに入る前に返す。学習・評価段階の失敗もエラーとして返す。
#[allow(clippy::missing_panics_doc)] // 検証済みラベルの索引は必ず成功する
pub fn run_training(config: &Config, records: &[LabeledRecord]) -> Result<TrainingOutcome> {
    validate_labels(records, config.sectors()).context("dataset validation failed")?;

    // データセットに実際に現れるセクターを、設定語彙の順序で採用する
    let sectors: Vec<String> = config
        .sectors()
        .iter()
        .filter(|sector| records.iter().any(|r| &r.query_sector == *sector))
        .cloned()
        .collect();
    let label_index = |record: &LabeledRecord| -> usize {
        sectors
            .iter()
            .position(|s| s == &record.query_sector)
            .expect("validated label must be in the sector list")
    };

    let split = stratified_split(records, config.test_fraction(), config.split_seed())?;
    info!(
        train = split.train_len(),
        test = split.test_len(),
        sectors = sectors.len(),
        "dataset split"
    );

    // 特徴量の状態は Train のみから学習する
    let train_articles: Vec<&crate::schema::ArticleRecord> = split
        .train
        .iter()
        .map(|&index| &records[index].article)
        .collect();
    let tfidf_options = TfidfOptions {
        vocab_size: config.vocab_size(),
        min_doc_freq: config.min_doc_freq(),
        max_doc_ratio: config.max_doc_ratio(),
    };
    let transformer = FeatureTransformer::fit(&train_articles, &tfidf_options);

    let train_features = transformer.transform_batch(&train_articles);
    info!(
        rows = train_features.len(),
        width = transformer.width(),
        density = sparse_density(&train_features),
        "train features transformed"
    );
    let train_labels: Vec<usize> = split
        .train
        .iter()
        .map(|&index| label_index(&records[index]))
        .collect();

    let train_options = TrainOptions {
        regularization: config.regularization(),
        max_iterations: config.max_iterations(),
        tolerance: config.tolerance(),
        class_weighting: config.class_weighting(),
        seed: config.split_seed(),
    };
    let classifier = FittedClassifier::fit(
        config.classifier(),
        &train_features,
        &train_labels,
        sectors.clone(),
        &train_options,
    )
    .context("classifier training failed")?;

    let artifact = PipelineArtifact::new(transformer, classifier, sectors);

    // Test 側は凍結済みの状態で変換・予測されるだけ
    let test_records: Vec<&LabeledRecord> = split.test.iter().map(|&i| &records[i]).collect();
    let report = evaluate(&artifact, &test_records)?;
    info!(
        accuracy = report.accuracy,
        macro_f1 = report.macro_f1,
        "held-out evaluation finished"
    );

    Ok(TrainingOutcome {
        artifact,
        report,
        split,
    })
}

/// 学習済みバンドルをラベル付きレコード群に対して評価する。
///
/// # Errors
/// バンドルのセクター語彙に無いラベルを持つレコードがある場合はエラー。
#[allow(clippy::missing_panics_doc)] // 予測ラベルはバンドル自身の語彙から出る
pub fn evaluate(
    artifact: &PipelineArtifact,
    records: &[&LabeledRecord],
) -> Result<EvaluationReport> {
    let sectors = artifact.sectors();
    let mut pairs = Vec::with_capacity(records.len());
    for record in records {
        let truth = sectors
            .iter()
            .position(|s| s == &record.query_sector)
            .with_context(|| {
                format!(
                    "record sector '{}' is not part of the trained artifact",
                    record.query_sector
                )
            })?;
        let prediction = artifact.predict(&record.article);
        let predicted = sectors
            .iter()
            .position(|s| s == &prediction.sector)
            .expect("predicted sector always comes from the artifact's own list");
        pairs.push((truth, predicted));
    }

    let confusion = ConfusionMatrix::from_pairs(sectors, &pairs);
    Ok(EvaluationReport::from_confusion(confusion))
}

/// 疎な特徴行列の非ゼロ率（ログ用）。
#[allow(clippy::cast_precision_loss)]
fn sparse_density(rows: &[CsVec<f32>]) -> f32 {
    if rows.is_empty() {
        return 0.0;
    }
    let nnz: usize = rows.iter().fold(0, |acc, row| acc + row.nnz());
    let cells = rows.len() * rows[0].dim();
    if cells == 0 {
        0.0
    } else {
        nnz as f32 / cells as f32
    }
}
