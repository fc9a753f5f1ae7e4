//! 単一ラベル多クラス分類のメトリクス集計。
use serde::{Deserialize, Serialize};

/// 混同行列。行 = 正解セクター、列 = 予測セクター、セル = 件数。
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConfusionMatrix {
    labels: Vec<String>,
    counts: Vec<Vec<usize>>,
}

impl ConfusionMatrix {
    /// (正解, 予測) のクラスインデックス対から混同行列を構築する。
    ///
    /// # Panics
    /// クラスインデックスが `labels` の範囲外の場合はパニックする
    /// （呼び出し側の分類器がクラス集合を保証している）。
    #[must_use]
    pub fn from_pairs(labels: &[String], pairs: &[(usize, usize)]) -> Self {
        let k = labels.len();
        let mut counts = vec![vec![0usize; k]; k];
        for &(truth, predicted) in pairs {
            counts[truth][predicted] += 1;
        }
        Self {
            labels: labels.to_vec(),
            counts,
        }
    }

    #[must_use]
    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    #[must_use]
    pub fn counts(&self) -> &[Vec<usize>] {
        &self.counts
    }

    /// 正解クラスごとの件数（行和）。
    #[must_use]
    pub fn row_sums(&self) -> Vec<usize> {
        self.counts.iter().map(|row| row.iter().sum()).collect()
    }

    /// 予測クラスごとの件数（列和）。
    #[must_use]
    pub fn column_sums(&self) -> Vec<usize> {
        let k = self.labels.len();
        (0..k)
            .map(|column| self.counts.iter().map(|row| row[column]).sum())
            .collect()
    }

    #[must_use]
    pub fn total(&self) -> usize {
        self.row_sums().iter().sum()
    }
}

/// 1クラス分の精度指標。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub label: String,
    pub precision: f32,
    pub recall: f32,
    pub f1: f32,
    /// 正解データに含まれるこのクラスの件数
    pub support: usize,
}

/// 評価レポート一式。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub accuracy: f32,
    /// セクターごとの F1 の単純平均。頻度の高いセクターが
    /// 低頻度セクターの失敗を覆い隠さないための主要受け入れ指標。
    pub macro_f1: f32,
    pub per_class: Vec<ClassMetrics>,
    pub confusion: ConfusionMatrix,
}

impl EvaluationReport {
    /// 混同行列から全メトリクスを導出する。
    #[must_use]
    #[allow(clippy::cast_precision_loss)]
    pub fn from_confusion(confusion: ConfusionMatrix) -> Self {
        let k = confusion.labels().len();
        let row_sums = confusion.row_sums();
        let column_sums = confusion.column_sums();
        let total = confusion.total();

        let mut correct = 0usize;
        let mut per_class = Vec::with_capacity(k);
        let mut f1_sum = 0.0f32;

        for class in 0..k {
            let true_positive = confusion.counts()[class][class];
            correct += true_positive;

            let precision = if column_sums[class] > 0 {
                true_positive as f32 / column_sums[class] as f32
            } else {
                0.0
            };
            let recall = if row_sums[class] > 0 {
                true_positive as f32 / row_sums[class] as f32
            } else {
                0.0
            };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            f1_sum += f1;

            per_class.push(ClassMetrics {
                label: confusion.labels()[class].clone(),
                precision,
                recall,
                f1,
                support: row_sums[class],
            });
        }

        let accuracy = if total > 0 {
            correct as f32 / total as f32
        } else {
            0.0
        };
        let macro_f1 = if k > 0 { f1_sum / k as f32 } else { 0.0 };

        Self {
            accuracy,
            macro_f1,
            per_class,
            confusion,
        }
    }
}
