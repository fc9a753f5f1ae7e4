// トイデータセットでの学習→評価→永続化→推論のエンドツーエンドテスト。
use sector_classifier::artifact::PipelineArtifact;
use sector_classifier::config::Config;
use sector_classifier::pipeline::run_training;
use sector_classifier::schema::{ArticleRecord, LabeledRecord};

fn article(text: &str, journal: &str, year: f32) -> ArticleRecord {
    ArticleRecord {
        combined_text: text.to_string(),
        title_length: 42.0,
        abstract_length: 160.0,
        total_text_length: 202.0,
        published_year: year,
        publication_decade: (year / 10.0).floor() * 10.0,
        has_doi: true,
        has_pdf: false,
        source: "openalex".to_string(),
        journal: journal.to_string(),
        provenance_sources: "openalex".to_string(),
        main_topic: "development".to_string(),
    }
}

/// Education 6件 / Health 4件のトイデータセット。
fn toy_dataset() -> Vec<LabeledRecord> {
    let education = [
        "primary school curriculum reform and teacher training",
        "school enrolment and literacy outcomes for teachers",
        "university curriculum design for teacher education",
        "classroom learning materials and school literacy",
        "teacher training colleges and curriculum standards",
        "school infrastructure and learning outcomes",
    ];
    let health = [
        "malaria clinic immunization coverage in rural districts",
        "hospital capacity and public health surveillance",
        "maternal health clinic and immunization programmes",
        "malaria epidemic response and hospital readiness",
    ];
    let mut records: Vec<LabeledRecord> = education
        .iter()
        .enumerate()
        .map(|(i, text)| LabeledRecord {
            article: article(text, "Journal of Education", 2015.0 + i as f32),
            query_sector: "Education".to_string(),
        })
        .collect();
    records.extend(health.iter().enumerate().map(|(i, text)| LabeledRecord {
        article: article(text, "The Lancet", 2016.0 + i as f32),
        query_sector: "Health".to_string(),
    }));
    records
}

fn toy_config(extra: &[(&str, Option<&str>)]) -> Config {
    let mut vars: Vec<(&str, Option<&str>)> = vec![
        ("SECTOR_TEST_FRACTION", Some("0.2")),
        ("SECTOR_SPLIT_SEED", Some("42")),
        // トイコーパスでは min_doc_freq=2 だと語彙がほぼ空になる
        ("SECTOR_MIN_DOC_FREQ", Some("1")),
        ("SECTOR_MAX_DOC_RATIO", Some("1.0")),
        ("SECTOR_MAX_ITERATIONS", Some("300")),
    ];
    vars.extend_from_slice(extra);
    temp_env::with_vars(vars, || Config::from_env().expect("test config must load"))
}

#[test]
fn margin_training_end_to_end_on_toy_dataset() {
    let config = toy_config(&[("SECTOR_CLASSIFIER", Some("margin"))]);
    let records = toy_dataset();
    let outcome = run_training(&config, &records).expect("training must succeed");

    // 層化: Test 2件（各クラス1件）、Train 8件
    assert_eq!(outcome.split.test_len(), 2);
    assert_eq!(outcome.split.train_len(), 8);

    let report = &outcome.report;
    assert!((0.0..=1.0).contains(&report.accuracy));

    // 混同行列の行和は正解クラス件数、列和は予測クラス件数に一致する
    let row_total: usize = report.confusion.row_sums().iter().sum();
    let column_total: usize = report.confusion.column_sums().iter().sum();
    assert_eq!(row_total, 2);
    assert_eq!(column_total, 2);
    let per_class_support: Vec<usize> = report.per_class.iter().map(|c| c.support).collect();
    assert_eq!(report.confusion.row_sums(), per_class_support);

    // macro-F1 は per-class F1 の単純平均
    let mean_f1: f32 = report.per_class.iter().map(|c| c.f1).sum::<f32>()
        / report.per_class.len() as f32;
    assert!((report.macro_f1 - mean_f1).abs() < 1e-6);

    // マージン型は確率を出さない
    let prediction = outcome.artifact.predict(&records[0].article);
    assert!(prediction.probabilities.is_none());
    assert!(!prediction.scores.is_empty());
}

#[test]
fn split_is_reproducible_across_runs() {
    let config = toy_config(&[]);
    let records = toy_dataset();
    let first = run_training(&config, &records).expect("first run");
    let second = run_training(&config, &records).expect("second run");
    assert_eq!(first.split, second.split);
}

#[test]
fn persisted_artifact_predicts_identically_after_reload() {
    let config = toy_config(&[("SECTOR_CLASSIFIER", Some("margin"))]);
    let records = toy_dataset();
    let outcome = run_training(&config, &records).expect("training must succeed");

    let dir = tempfile::tempdir().expect("temp dir");
    let path = outcome.artifact.save(dir.path()).expect("save must succeed");
    assert!(path.file_name().unwrap().to_str().unwrap().contains("margin"));

    let reloaded = PipelineArtifact::load(&path).expect("load must succeed");
    for record in &records {
        let before = outcome.artifact.predict(&record.article);
        let after = reloaded.predict(&record.article);
        assert_eq!(before.sector, after.sector);
        assert_eq!(before.scores, after.scores);
    }
}

#[test]
fn corrupted_schema_version_fails_at_load_time() {
    let config = toy_config(&[]);
    let records = toy_dataset();
    let outcome = run_training(&config, &records).expect("training must succeed");

    let dir = tempfile::tempdir().expect("temp dir");
    let path = outcome.artifact.save(dir.path()).expect("save must succeed");

    let raw = std::fs::read_to_string(&path).expect("read artifact");
    let tampered = raw.replace("\"schema_version\":1", "\"schema_version\":99");
    assert_ne!(raw, tampered);
    std::fs::write(&path, tampered).expect("write tampered artifact");

    let err = PipelineArtifact::load(&path).unwrap_err();
    assert!(err.to_string().contains("schema version"));
}

#[test]
fn unseen_journal_at_inference_is_not_an_error() {
    let config = toy_config(&[]);
    let records = toy_dataset();
    let outcome = run_training(&config, &records).expect("training must succeed");

    let mut unseen = article(
        "teacher training and school curriculum",
        "Completely Unknown Journal",
        2024.0,
    );
    unseen.source = "never-seen-aggregator".to_string();
    let prediction = outcome.artifact.predict(&unseen);
    assert!(outcome
        .artifact
        .sectors()
        .iter()
        .any(|s| s == &prediction.sector));
}

#[test]
fn logistic_strategy_emits_probability_distribution() {
    let config = toy_config(&[("SECTOR_CLASSIFIER", Some("logistic"))]);
    let records = toy_dataset();
    let outcome = run_training(&config, &records).expect("training must succeed");

    let prediction = outcome.artifact.predict(&records[6].article);
    let probabilities = prediction
        .probabilities
        .expect("logistic strategy must emit probabilities");
    assert_eq!(probabilities.len(), outcome.artifact.sectors().len());
    let sum: f32 = probabilities.iter().map(|(_, p)| p).sum();
    assert!((sum - 1.0).abs() < 1e-4);
}

#[test]
fn singleton_sector_fails_before_any_fitting() {
    let config = toy_config(&[]);
    let mut records = toy_dataset();
    records.push(LabeledRecord {
        article: article("copper ore extraction at the quarry", "Mining Review", 2020.0),
        query_sector: "Mining".to_string(),
    });
    let err = run_training(&config, &records).unwrap_err();
    assert!(err.to_string().contains("Mining"));
}
