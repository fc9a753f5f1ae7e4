//! 学術論文メタデータを Vision 2030 の開発セクターへ分類するバッチパイプライン。
//!
//! 層化分割 → 特徴量フィット（Train のみ）→ 学習 → 評価 → 永続化、の
//! 一方向の流れで構成される。推論はロード済みバンドルに対してのみ行う。
#![deny(warnings, clippy::all, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)]

pub mod artifact;
pub mod config;
pub mod evaluation;
pub mod features;
pub mod model;
pub mod observability;
pub mod pipeline;
pub mod schema;
pub mod split;
