use std::{env, path::PathBuf};

use thiserror::Error;

use crate::model::{ClassWeighting, ClassifierKind};

/// Vision 2030 ハーベスタのセクター語彙（既定値）。
pub const DEFAULT_SECTORS: &str = "Agriculture,Health,Education,Infrastructure,Tourism,Energy,\
Mining,Manufacturing,Environment,ICT/Technology,Governance,Finance/Trade,Transport,\
Water_and_Sanitation";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    sectors: Vec<String>,
    test_fraction: f32,
    split_seed: u64,
    vocab_size: usize,
    min_doc_freq: usize,
    max_doc_ratio: f32,
    classifier: ClassifierKind,
    regularization: f32,
    max_iterations: usize,
    tolerance: f32,
    class_weighting: ClassWeighting,
    artifact_dir: PathBuf,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing environment variable: {0}")]
    Missing(&'static str),
    #[error("invalid value for {name}: {source}")]
    Invalid {
        name: &'static str,
        #[source]
        source: anyhow::Error,
    },
}

impl Config {
    /// 環境変数からパイプラインの設定値を読み込み、検証する。
    ///
    /// すべての項目に既定値があるため、環境変数なしでも動作する。
    ///
    /// # Errors
    /// 数値・列挙値のパースに失敗した場合、または範囲外の値が与えられた場合は
    /// [`ConfigError`] を返す。
    pub fn from_env() -> Result<Self, ConfigError> {
        let sectors = parse_csv("SECTOR_LABELS", DEFAULT_SECTORS);
        let test_fraction = parse_fraction("SECTOR_TEST_FRACTION", 0.2)?;
        let split_seed = parse_u64("SECTOR_SPLIT_SEED", 42)?;

        // Text sub-transform settings
        let vocab_size = parse_usize("SECTOR_VOCAB_SIZE", 5000)?;
        let min_doc_freq = parse_usize("SECTOR_MIN_DOC_FREQ", 2)?;
        let max_doc_ratio = parse_fraction_inclusive("SECTOR_MAX_DOC_RATIO", 0.8)?;

        // Classifier settings
        let classifier = parse_classifier_kind("SECTOR_CLASSIFIER", ClassifierKind::Margin)?;
        let regularization = parse_positive_f32("SECTOR_REGULARIZATION", 1.0)?;
        let max_iterations = parse_usize("SECTOR_MAX_ITERATIONS", 1000)?;
        let tolerance = parse_positive_f32("SECTOR_TOLERANCE", 1e-4)?;
        let class_weighting =
            parse_class_weighting("SECTOR_CLASS_WEIGHTING", ClassWeighting::InverseFrequency)?;

        let artifact_dir = PathBuf::from(
            env::var("SECTOR_ARTIFACT_DIR").unwrap_or_else(|_| "artifacts".to_string()),
        );

        Ok(Self {
            sectors,
            test_fraction,
            split_seed,
            vocab_size,
            min_doc_freq,
            max_doc_ratio,
            classifier,
            regularization,
            max_iterations,
            tolerance,
            class_weighting,
            artifact_dir,
        })
    }

    #[must_use]
    pub fn sectors(&self) -> &[String] {
        &self.sectors
    }

    #[must_use]
    pub fn test_fraction(&self) -> f32 {
        self.test_fraction
    }

    #[must_use]
    pub fn split_seed(&self) -> u64 {
        self.split_seed
    }

    #[must_use]
    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    #[must_use]
    pub fn min_doc_freq(&self) -> usize {
        self.min_doc_freq
    }

    #[must_use]
    pub fn max_doc_ratio(&self) -> f32 {
        self.max_doc_ratio
    }

    #[must_use]
    pub fn classifier(&self) -> ClassifierKind {
        self.classifier
    }

    #[must_use]
    pub fn regularization(&self) -> f32 {
        self.regularization
    }

    #[must_use]
    pub fn max_iterations(&self) -> usize {
        self.max_iterations
    }

    #[must_use]
    pub fn tolerance(&self) -> f32 {
        self.tolerance
    }

    #[must_use]
    pub fn class_weighting(&self) -> ClassWeighting {
        self.class_weighting
    }

    #[must_use]
    pub fn artifact_dir(&self) -> &PathBuf {
        &self.artifact_dir
    }
}

fn parse_usize(name: &'static str, default: usize) -> Result<usize, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<usize>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_u64(name: &'static str, default: u64) -> Result<u64, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<u64>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.parse::<f32>().map_err(|error| ConfigError::Invalid {
        name,
        source: anyhow::Error::new(error),
    })
}

fn parse_positive_f32(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let parsed = parse_f32(name, default)?;
    if parsed <= 0.0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be greater than zero"),
        });
    }
    Ok(parsed)
}

/// (0.0, 1.0) の開区間に収まる割合値。
fn parse_fraction(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let parsed = parse_f32(name, default)?;
    if parsed <= 0.0 || parsed >= 1.0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be strictly between 0.0 and 1.0"),
        });
    }
    Ok(parsed)
}

/// (0.0, 1.0] の割合値。`max_doc_ratio = 1.0` は上限プルーニングなしを意味する。
fn parse_fraction_inclusive(name: &'static str, default: f32) -> Result<f32, ConfigError> {
    let parsed = parse_f32(name, default)?;
    if parsed <= 0.0 || parsed > 1.0 {
        return Err(ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("value must be in (0.0, 1.0]"),
        });
    }
    Ok(parsed)
}

fn parse_classifier_kind(
    name: &'static str,
    default: ClassifierKind,
) -> Result<ClassifierKind, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("{error}"),
        }),
    }
}

fn parse_class_weighting(
    name: &'static str,
    default: ClassWeighting,
) -> Result<ClassWeighting, ConfigError> {
    match env::var(name) {
        Err(_) => Ok(default),
        Ok(raw) => raw.parse().map_err(|error| ConfigError::Invalid {
            name,
            source: anyhow::anyhow!("{error}"),
        }),
    }
}

fn parse_csv(name: &'static str, default: &str) -> Vec<String> {
    let raw = env::var(name).unwrap_or_else(|_| default.to_string());
    raw.split(',')
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
        .collect()
}
