//! 線形分類器（マージン型・確率型）の学習と推論。
//!
//! 2つの戦略は同一の fit / predict 契約を持ち、設定で切り替えられる。
//! どちらも正則化強度とクラス重み付けポリシーを公開する。
use std::fmt;
use std::str::FromStr;

use anyhow::{Result, ensure};
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use sprs::CsVec;
use thiserror::Error;
use tracing::warn;

mod linear_svm;
mod logistic;

/// 分類器の戦略。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassifierKind {
    /// 線形マージン分類器（one-vs-rest ヒンジ損失）。高次元疎特徴に速いが、
    /// 確率は出さない（ランキング用のスコアのみ）。
    Margin,
    /// 多項ロジスティック回帰。反復ソルバが必要で収束は遅いが、
    /// セクター全体にわたる較正された確率分布を返す。
    Logistic,
}

#[derive(Debug, Error)]
#[error("unknown classifier strategy '{0}' (expected 'margin' or 'logistic')")]
pub struct ParseClassifierKindError(String);

impl FromStr for ClassifierKind {
    type Err = ParseClassifierKindError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_lowercase().as_str() {
            "margin" | "svm" => Ok(Self::Margin),
            "logistic" => Ok(Self::Logistic),
            other => Err(ParseClassifierKindError(other.to_string())),
        }
    }
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Margin => write!(f, "margin"),
            Self::Logistic => write!(f, "logistic"),
        }
    }
}

/// クラス重み付けポリシー。セクター間の不均衡への既定の緩和策は逆頻度重み。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ClassWeighting {
    /// `n / (k * n_c)`。頻度の低いセクターほど目的関数上の重みが大きくなる。
    InverseFrequency,
    Uniform,
}

#[derive(Debug, Error)]
#[error("unknown class weighting '{0}' (expected 'inverse_frequency' or 'uniform')")]
pub struct ParseClassWeightingError(String);

impl FromStr for ClassWeighting {
    type Err = ParseClassWeightingError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_lowercase().as_str() {
            "inverse_frequency" | "balanced" => Ok(Self::InverseFrequency),
            "uniform" | "none" => Ok(Self::Uniform),
            other => Err(ParseClassWeightingError(other.to_string())),
        }
    }
}

/// 学習ハイパーパラメータ。
#[derive(Debug, Clone, Copy)]
pub struct TrainOptions {
    /// 正則化強度 C（大きいほど正則化が弱い）
    pub regularization: f32,
    /// ソルバの反復上限
    pub max_iterations: usize,
    /// 収束判定の損失差分しきい値
    pub tolerance: f32,
    pub class_weighting: ClassWeighting,
    /// SGD のシャッフルに使うシード（パイプライン全体の決定性のため）
    pub seed: u64,
}

/// クラスごとのサンプル重みを計算する。
#[must_use]
#[allow(clippy::cast_precision_loss)]
pub fn class_weights(labels: &[usize], n_classes: usize, policy: ClassWeighting) -> Vec<f32> {
    match policy {
        ClassWeighting::Uniform => vec![1.0; n_classes],
        ClassWeighting::InverseFrequency => {
            let mut counts = vec![0usize; n_classes];
            for &label in labels {
                counts[label] += 1;
            }
            counts
                .iter()
                .map(|&count| {
                    if count == 0 {
                        0.0
                    } else {
                        labels.len() as f32 / (n_classes as f32 * count as f32)
                    }
                })
                .collect()
        }
    }
}

/// 学習済み分類器。重み行列は `[クラス数 × 特徴次元]`。
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FittedClassifier {
    kind: ClassifierKind,
    classes: Vec<String>,
    weights: Array2<f32>,
    bias: Array1<f32>,
    /// ソルバが許容誤差内で収束したか。false は警告付きの利用可能なモデル。
    converged: bool,
}

impl FittedClassifier {
    /// 変換済み Train 特徴量とラベルから分類器を学習する。
    ///
    /// 反復上限に達しても収束しなかった場合はエラーではなく、
    /// `converged = false` を立てたうえで警告ログを出す。
    ///
    /// # Errors
    /// 行数とラベル数の不一致、範囲外のラベル、空の入力の場合はエラーを返す。
    pub fn fit(
        kind: ClassifierKind,
        rows: &[CsVec<f32>],
        labels: &[usize],
        classes: Vec<String>,
        options: &TrainOptions,
    ) -> Result<Self> {
        ensure!(!rows.is_empty(), "training set is empty");
        ensure!(
            rows.len() == labels.len(),
            "row count {} does not match label count {}",
            rows.len(),
            labels.len()
        );
        let n_classes = classes.len();
        ensure!(n_classes >= 2, "at least two classes are required");
        for &label in labels {
            ensure!(
                label < n_classes,
                "label index {label} out of range for {n_classes} classes"
            );
        }
        let dim = rows[0].dim();
        for row in rows {
            ensure!(
                row.dim() == dim,
                "feature dimension mismatch: expected {dim}, got {}",
                row.dim()
            );
        }

        let weights = class_weights(labels, n_classes, options.class_weighting);
        let (weight_matrix, bias, converged) = match kind {
            ClassifierKind::Margin => {
                linear_svm::train(rows, labels, n_classes, dim, &weights, options)
            }
            ClassifierKind::Logistic => {
                logistic::train(rows, labels, n_classes, dim, &weights, options)
            }
        };

        if !converged {
            warn!(
                strategy = %kind,
                max_iterations = options.max_iterations,
                tolerance = options.tolerance,
                "solver hit the iteration cap before reaching tolerance; \
                 the partially-optimized model is still usable"
            );
        }

        Ok(Self {
            kind,
            classes,
            weights: weight_matrix,
            bias,
            converged,
        })
    }

    #[must_use]
    pub fn kind(&self) -> ClassifierKind {
        self.kind
    }

    #[must_use]
    pub fn classes(&self) -> &[String] {
        &self.classes
    }

    #[must_use]
    pub fn converged(&self) -> bool {
        self.converged
    }

    #[must_use]
    pub fn feature_dim(&self) -> usize {
        self.weights.ncols()
    }

    /// クラスごとの決定スコア（マージン）を返す。ランキングには使えるが
    /// 確率ではない。
    #[must_use]
    pub fn decision_scores(&self, features: &CsVec<f32>) -> Vec<f32> {
        let mut scores: Vec<f32> = self.bias.to_vec();
        for (index, &value) in features.iter() {
            for (class, score) in scores.iter_mut().enumerate() {
                *score += self.weights[[class, index]] * value;
            }
        }
        scores
    }

    /// 予測クラスのインデックスを返す。
    #[must_use]
    pub fn predict(&self, features: &CsVec<f32>) -> usize {
        let scores = self.decision_scores(features);
        argmax(&scores)
    }

    /// セクター全体の確率分布。確率型戦略のときのみ `Some`。
    #[must_use]
    pub fn predict_proba(&self, features: &CsVec<f32>) -> Option<Vec<f32>> {
        match self.kind {
            ClassifierKind::Margin => None,
            ClassifierKind::Logistic => Some(softmax(&self.decision_scores(features))),
        }
    }

}

pub(crate) fn argmax(scores: &[f32]) -> usize {
    let mut best = 0;
    for (index, &score) in scores.iter().enumerate() {
        if score > scores[best] {
            best = index;
        }
    }
    best
}

pub(crate) fn softmax(scores: &[f32]) -> Vec<f32> {
    let max = scores.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = scores.iter().map(|&s| (s - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    exps.into_iter().map(|e| e / sum).collect()
}

/// 疎ベクトルと密な重み行列の1行の内積。
pub(crate) fn sparse_dot(row: &CsVec<f32>, weights: &Array1<f32>) -> f32 {
    let mut acc = 0.0;
    for (index, &value) in row.iter() {
        acc += weights[index] * value;
    }
    acc
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dense(dim: usize, entries: &[(usize, f32)]) -> CsVec<f32> {
        let indices: Vec<usize> = entries.iter().map(|(i, _)| *i).collect();
        let values: Vec<f32> = entries.iter().map(|(_, v)| *v).collect();
        CsVec::new(dim, indices, values)
    }

    fn toy_training_set() -> (Vec<CsVec<f32>>, Vec<usize>) {
        // クラス0は次元0、クラス1は次元1に信号を持つ線形分離可能なデータ
        let rows = vec![
            dense(3, &[(0, 1.0), (2, 0.2)]),
            dense(3, &[(0, 0.9)]),
            dense(3, &[(0, 1.1), (2, 0.1)]),
            dense(3, &[(1, 1.0)]),
            dense(3, &[(1, 0.8), (2, 0.3)]),
            dense(3, &[(1, 1.2)]),
        ];
        let labels = vec![0, 0, 0, 1, 1, 1];
        (rows, labels)
    }

    fn options() -> TrainOptions {
        TrainOptions {
            regularization: 1.0,
            max_iterations: 200,
            tolerance: 1e-5,
            class_weighting: ClassWeighting::InverseFrequency,
            seed: 42,
        }
    }

    #[test]
    fn classifier_kind_parses_from_config_strings() {
        assert_eq!("margin".parse::<ClassifierKind>().unwrap(), ClassifierKind::Margin);
        assert_eq!(
            "LOGISTIC".parse::<ClassifierKind>().unwrap(),
            ClassifierKind::Logistic
        );
        assert!("perceptron".parse::<ClassifierKind>().is_err());
    }

    #[test]
    fn inverse_frequency_weights_favour_rare_classes() {
        let labels = vec![0, 0, 0, 0, 1];
        let weights = class_weights(&labels, 2, ClassWeighting::InverseFrequency);
        // n=5, k=2: class0 = 5/(2*4) = 0.625, class1 = 5/(2*1) = 2.5
        assert!((weights[0] - 0.625).abs() < 1e-6);
        assert!((weights[1] - 2.5).abs() < 1e-6);
        assert!(weights[1] > weights[0]);
    }

    #[test]
    fn margin_classifier_separates_toy_data() {
        let (rows, labels) = toy_training_set();
        let classifier = FittedClassifier::fit(
            ClassifierKind::Margin,
            &rows,
            &labels,
            vec!["Education".to_string(), "Health".to_string()],
            &options(),
        )
        .unwrap();

        for (row, &label) in rows.iter().zip(&labels) {
            assert_eq!(classifier.predict(row), label);
        }
        assert!(classifier.predict_proba(&rows[0]).is_none());
    }

    #[test]
    fn logistic_classifier_emits_probability_distribution() {
        let (rows, labels) = toy_training_set();
        let classifier = FittedClassifier::fit(
            ClassifierKind::Logistic,
            &rows,
            &labels,
            vec!["Education".to_string(), "Health".to_string()],
            &options(),
        )
        .unwrap();

        let proba = classifier.predict_proba(&rows[0]).unwrap();
        assert_eq!(proba.len(), 2);
        let sum: f32 = proba.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5);
        assert!(proba[0] > proba[1]);
    }

    #[test]
    fn iteration_cap_is_a_warning_not_an_error() {
        let (rows, labels) = toy_training_set();
        let capped = TrainOptions {
            max_iterations: 1,
            tolerance: 1e-12,
            ..options()
        };
        let classifier = FittedClassifier::fit(
            ClassifierKind::Logistic,
            &rows,
            &labels,
            vec!["Education".to_string(), "Health".to_string()],
            &capped,
        )
        .unwrap();
        assert!(!classifier.converged());
        // 収束していなくても予測は可能
        let _ = classifier.predict(&rows[0]);
    }

    #[test]
    fn mismatched_rows_and_labels_are_rejected() {
        let (rows, _) = toy_training_set();
        let err = FittedClassifier::fit(
            ClassifierKind::Margin,
            &rows,
            &[0, 1],
            vec!["A".to_string(), "B".to_string()],
            &options(),
        );
        assert!(err.is_err());
    }

    #[test]
    fn argmax_prefers_first_on_ties() {
        assert_eq!(argmax(&[0.5, 0.5, 0.1]), 0);
        assert_eq!(argmax(&[0.1, 0.9, 0.2]), 1);
    }

    #[test]
    fn softmax_is_a_distribution() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-6);
        assert!(probs[2] > probs[1] && probs[1] > probs[0]);
    }
}
