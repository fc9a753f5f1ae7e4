//! 多項ロジスティック回帰（フルバッチ勾配降下）。
use ndarray::{Array1, Array2};
use sprs::CsVec;

use super::{TrainOptions, softmax};

const LEARNING_RATE: f32 = 0.5;

/// softmax 回帰を勾配降下で学習する。
///
/// 反復は `max_iterations` で打ち切り、損失の改善が `tolerance` を
/// 下回った時点で収束とみなす。返り値の第3要素が収束フラグ。
#[allow(clippy::cast_precision_loss)]
pub(super) fn train(
    rows: &[CsVec<f32>],
    labels: &[usize],
    n_classes: usize,
    dim: usize,
    class_weight: &[f32],
    options: &TrainOptions,
) -> (Array2<f32>, Array1<f32>, bool) {
    let n = rows.len();
    let lambda = 1.0 / (options.regularization * n as f32);
    let total_weight: f32 = labels.iter().map(|&label| class_weight[label]).sum();

    let mut weights = Array2::<f32>::zeros((n_classes, dim));
    let mut bias = Array1::<f32>::zeros(n_classes);
    let mut prev_loss = f32::INFINITY;
    let mut converged = false;

    for _iteration in 0..options.max_iterations {
        let mut grad_w = Array2::<f32>::zeros((n_classes, dim));
        let mut grad_b = Array1::<f32>::zeros(n_classes);
        let mut loss = 0.0f32;

        for (row, &label) in rows.iter().zip(labels) {
            let sample_weight = class_weight[label];
            let mut scores: Vec<f32> = bias.to_vec();
            for (index, &value) in row.iter() {
                for (class, score) in scores.iter_mut().enumerate() {
                    *score += weights[[class, index]] * value;
                }
            }
            let probs = softmax(&scores);
            loss -= sample_weight * probs[label].max(1e-12).ln();

            for class in 0..n_classes {
                let indicator = if class == label { 1.0 } else { 0.0 };
                let residual = sample_weight * (probs[class] - indicator);
                grad_b[class] += residual;
                for (index, &value) in row.iter() {
                    grad_w[[class, index]] += residual * value;
                }
            }
        }

        loss = loss / total_weight + 0.5 * lambda * weights.iter().map(|w| w * w).sum::<f32>();

        grad_w.mapv_inplace(|g| g / total_weight);
        grad_w = grad_w + &weights * lambda;
        grad_b.mapv_inplace(|g| g / total_weight);

        weights = weights - grad_w * LEARNING_RATE;
        bias = bias - grad_b * LEARNING_RATE;

        if (prev_loss - loss).abs() < options.tolerance {
            converged = true;
            break;
        }
        prev_loss = loss;
    }

    (weights, bias, converged)
}
