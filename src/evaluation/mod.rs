//! 学習済みパイプラインの評価。
pub mod metrics;
pub mod report;

pub use metrics::{ClassMetrics, ConfusionMatrix, EvaluationReport};
