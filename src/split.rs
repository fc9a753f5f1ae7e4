//! 決定的な層化 Train/Test 分割。
//!
//! 特徴量フィッティングより前に必ず実行されるのがこのパイプラインの
//! 核となる不変条件（リーク防止）。呼び出し順は `pipeline` が保証する。
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rustc_hash::FxHashMap;
use tracing::info;

use crate::schema::{DataError, LabeledRecord};

/// Train/Test のインデックス分割。両者は互いに素で、和集合は全レコード。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DatasetSplit {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl DatasetSplit {
    #[must_use]
    pub fn train_len(&self) -> usize {
        self.train.len()
    }

    #[must_use]
    pub fn test_len(&self) -> usize {
        self.test.len()
    }
}

/// セクターごとの比率を保ったまま Train/Test に分割する。
///
/// 各セクターのインデックス群をシード付き乱数でシャッフルし、
/// `max(1, round(n_c * test_fraction))` 件を Test に取り分ける。
/// 同一シード・同一入力なら分割は常に同一（決定的）。
///
/// # Errors
/// - `test_fraction` が (0.0, 1.0) の範囲外の場合
/// - データセットが空の場合
/// - 例が2件未満のセクターがある場合（両側に層化できないため、
///   黙って捨てずに設定・データエラーとして報告する）
pub fn stratified_split(
    records: &[LabeledRecord],
    test_fraction: f32,
    seed: u64,
) -> Result<DatasetSplit, DataError> {
    if test_fraction <= 0.0 || test_fraction >= 1.0 {
        return Err(DataError::InvalidTestFraction(test_fraction));
    }
    if records.is_empty() {
        return Err(DataError::EmptyDataset);
    }

    // セクターごとにインデックスをまとめる。挿入順を保つため Vec も持つ。
    let mut groups: FxHashMap<&str, Vec<usize>> = FxHashMap::default();
    let mut group_order: Vec<&str> = Vec::new();
    for (index, record) in records.iter().enumerate() {
        let entry = groups.entry(record.query_sector.as_str()).or_default();
        if entry.is_empty() {
            group_order.push(record.query_sector.as_str());
        }
        entry.push(index);
    }

    for sector in &group_order {
        let count = groups[sector].len();
        if count < 2 {
            return Err(DataError::SectorTooSmall {
                sector: (*sector).to_string(),
                count,
            });
        }
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    // group_order はレコード出現順なので、シャッフルと合わせて分割全体が
    // (records, seed) のみで決まる。
    for sector in &group_order {
        let mut indices = groups[sector].clone();
        indices.shuffle(&mut rng);

        #[allow(
            clippy::cast_precision_loss,
            clippy::cast_possible_truncation,
            clippy::cast_sign_loss
        )]
        let quota = ((indices.len() as f32 * test_fraction).round() as usize)
            .clamp(1, indices.len() - 1);
        test.extend_from_slice(&indices[..quota]);
        train.extend_from_slice(&indices[quota..]);

        info!(
            sector = *sector,
            total = indices.len(),
            train = indices.len() - quota,
            test = quota,
            "stratified split"
        );
    }

    train.sort_unstable();
    test.sort_unstable();
    Ok(DatasetSplit { train, test })
}
