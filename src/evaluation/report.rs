//! 評価レポートのテキスト整形とログ出力。
use std::fmt::Write as _;

use tracing::{info, warn};

use super::metrics::EvaluationReport;

/// 初回リリースの受け入れ下限（全体精度）。
pub const ACCURACY_FLOOR: f32 = 0.60;

/// レポートを人間のレビュー向けテキストに整形する。
///
/// sklearn の `classification_report` に似た per-class 表と混同行列を含む。
#[must_use]
pub fn render(report: &EvaluationReport) -> String {
    let mut out = String::new();
    let _ = writeln!(out, "accuracy: {:.4}", report.accuracy);
    let _ = writeln!(out, "macro F1: {:.4}", report.macro_f1);
    let _ = writeln!(out);
    let _ = writeln!(
        out,
        "{:<24} {:>9} {:>9} {:>9} {:>9}",
        "sector", "precision", "recall", "f1", "support"
    );
    for class in &report.per_class {
        let _ = writeln!(
            out,
            "{:<24} {:>9.4} {:>9.4} {:>9.4} {:>9}",
            class.label, class.precision, class.recall, class.f1, class.support
        );
    }

    let _ = writeln!(out);
    let _ = writeln!(out, "confusion matrix (rows = true, columns = predicted):");
    let labels = report.confusion.labels();
    let header: Vec<String> = labels.iter().map(|l| truncate(l, 12)).collect();
    let _ = writeln!(out, "{:<24} {}", "", header.join(" "));
    for (row_label, row) in labels.iter().zip(report.confusion.counts()) {
        let cells: Vec<String> = row
            .iter()
            .zip(&header)
            .map(|(count, h)| format!("{count:>width$}", width = h.len()))
            .collect();
        let _ = writeln!(out, "{:<24} {}", truncate(row_label, 24), cells.join(" "));
    }
    out
}

/// 受け入れ下限に対する結果を構造化ログに出す。
///
/// macro-F1 は再学習サイクル間の比較用に常に記録する（回帰の判断は
/// 運用側のサインオフ事項であり、ここではエラーにしない）。
pub fn log_acceptance(report: &EvaluationReport) {
    if report.accuracy >= ACCURACY_FLOOR {
        info!(
            accuracy = report.accuracy,
            macro_f1 = report.macro_f1,
            floor = ACCURACY_FLOOR,
            "evaluation meets the documented accuracy floor"
        );
    } else {
        warn!(
            accuracy = report.accuracy,
            macro_f1 = report.macro_f1,
            floor = ACCURACY_FLOOR,
            "evaluation is below the documented accuracy floor"
        );
    }
}

fn truncate(label: &str, max: usize) -> String {
    if label.chars().count() <= max {
        label.to_string()
    } else {
        label.chars().take(max).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::evaluation::metrics::ConfusionMatrix;

    #[test]
    fn render_contains_all_sections() {
        let labels = vec!["Education".to_string(), "Health".to_string()];
        let pairs = vec![(0, 0), (1, 1), (1, 0)];
        let report = EvaluationReport::from_confusion(ConfusionMatrix::from_pairs(&labels, &pairs));
        let text = render(&report);
        assert!(text.contains("accuracy:"));
        assert!(text.contains("macro F1:"));
        assert!(text.contains("Education"));
        assert!(text.contains("confusion matrix"));
    }

    #[test]
    fn truncate_keeps_short_labels_intact() {
        assert_eq!(truncate("Health", 12), "Health");
        assert_eq!(truncate("Water_and_Sanitation", 12), "Water_and_Sa");
    }
}
