//! one-vs-rest ヒンジ損失の線形マージン分類器（Pegasos 型 SGD）。
use ndarray::{Array1, Array2};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;

use super::{TrainOptions, sparse_dot};
use sprs::CsVec;

/// クラスごとに binary one-vs-rest 問題を解き、重み行列とバイアスを返す。
///
/// 返り値の第3要素は全クラスのソルバが許容誤差内で収束したかどうか。
pub(super) fn train(
    rows: &[CsVec<f32>],
    labels: &[usize],
    n_classes: usize,
    dim: usize,
    class_weight: &[f32],
    options: &TrainOptions,
) -> (Array2<f32>, Array1<f32>, bool) {
    let mut weight_matrix = Array2::<f32>::zeros((n_classes, dim));
    let mut bias = Array1::<f32>::zeros(n_classes);
    let mut all_converged = true;

    for class in 0..n_classes {
        let (w, b, converged) = train_binary(rows, labels, class, class_weight, options);
        weight_matrix.row_mut(class).assign(&w);
        bias[class] = b;
        all_converged &= converged;
    }

    (weight_matrix, bias, all_converged)
}

#[allow(clippy::cast_precision_loss)]
fn train_binary(
    rows: &[CsVec<f32>],
    labels: &[usize],
    positive_class: usize,
    class_weight: &[f32],
    options: &TrainOptions,
) -> (Array1<f32>, f32, bool) {
    let n = rows.len();
    let dim = rows[0].dim();
    let lambda = 1.0 / (options.regularization * n as f32);

    let mut w = Array1::<f32>::zeros(dim);
    let mut b = 0.0f32;
    let mut t = 0u64;
    let mut prev_loss = f32::INFINITY;
    let mut converged = false;

    let mut order: Vec<usize> = (0..n).collect();
    // クラスごとに独立だが決定的なシャッフル系列を使う
    let mut rng = StdRng::seed_from_u64(options.seed.wrapping_add(positive_class as u64));

    for _epoch in 0..options.max_iterations {
        order.shuffle(&mut rng);
        for &i in &order {
            t += 1;
            let eta = 1.0 / (lambda * t as f32);
            let y = if labels[i] == positive_class { 1.0 } else { -1.0 };
            let sample_weight = class_weight[labels[i]];
            let margin = y * (sparse_dot(&rows[i], &w) + b);

            // w <- (1 - eta*lambda) w [+ eta*y*cw*x if hinge active]
            let decay = 1.0 - eta * lambda;
            w.mapv_inplace(|v| v * decay);
            if margin < 1.0 {
                for (index, &value) in rows[i].iter() {
                    w[index] += eta * y * sample_weight * value;
                }
                // バイアスは正則化しない
                b += eta * y * sample_weight;
            }
        }

        let loss = objective(rows, labels, positive_class, class_weight, &w, b, lambda);
        if (prev_loss - loss).abs() < options.tolerance {
            converged = true;
            break;
        }
        prev_loss = loss;
    }

    (w, b, converged)
}

/// 重み付きヒンジ損失 + L2 正則化項。
#[allow(clippy::cast_precision_loss)]
fn objective(
    rows: &[CsVec<f32>],
    labels: &[usize],
    positive_class: usize,
    class_weight: &[f32],
    w: &Array1<f32>,
    b: f32,
    lambda: f32,
) -> f32 {
    let mut hinge = 0.0f32;
    for (row, &label) in rows.iter().zip(labels) {
        let y = if label == positive_class { 1.0 } else { -1.0 };
        let margin = y * (sparse_dot(row, w) + b);
        hinge += class_weight[label] * (1.0 - margin).max(0.0);
    }
    let reg = 0.5 * lambda * w.dot(w);
    hinge / rows.len() as f32 + reg
}
