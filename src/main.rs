use std::env;
use std::path::PathBuf;
use std::process;

use anyhow::{Context, Result, anyhow, bail};
use tracing::info;

use sector_classifier::artifact::PipelineArtifact;
use sector_classifier::config::Config;
use sector_classifier::evaluation::report;
use sector_classifier::observability;
use sector_classifier::pipeline::{evaluate, run_training};
use sector_classifier::schema::{load_article, load_labeled_dataset};

enum Command {
    Train { dataset: PathBuf },
    Evaluate { artifact: PathBuf, dataset: PathBuf },
    Predict { artifact: PathBuf, record: PathBuf },
}

fn main() -> Result<()> {
    observability::init()?;
    let command = parse_args()?;
    let config = Config::from_env().context("failed to load configuration")?;

    match command {
        Command::Train { dataset } => {
            let records = load_labeled_dataset(&dataset)?;
            info!(records = records.len(), dataset = %dataset.display(), "training started");
            let outcome = run_training(&config, &records)?;
            let path = outcome.artifact.save(config.artifact_dir())?;
            report::log_acceptance(&outcome.report);
            println!("{}", report::render(&outcome.report));
            println!("artifact written to {}", path.display());
        }
        Command::Evaluate { artifact, dataset } => {
            let loaded = PipelineArtifact::load(&artifact)?;
            let records = load_labeled_dataset(&dataset)?;
            let refs: Vec<_> = records.iter().collect();
            let evaluation = evaluate(&loaded, &refs)?;
            report::log_acceptance(&evaluation);
            println!("{}", report::render(&evaluation));
        }
        Command::Predict { artifact, record } => {
            let loaded = PipelineArtifact::load(&artifact)?;
            let article = load_article(&record)?;
            let prediction = loaded.predict(&article);
            println!(
                "{}",
                serde_json::to_string_pretty(&prediction)
                    .context("failed to serialize prediction")?
            );
        }
    }

    Ok(())
}

fn parse_args() -> Result<Command> {
    let mut args = env::args().skip(1);
    let Some(subcommand) = args.next() else {
        print_usage();
        process::exit(2);
    };

    let mut dataset = None;
    let mut artifact = None;
    let mut record = None;

    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--dataset" => {
                let value = args.next().context("--dataset requires a path argument")?;
                dataset = Some(PathBuf::from(value));
            }
            "--artifact" => {
                let value = args.next().context("--artifact requires a path argument")?;
                artifact = Some(PathBuf::from(value));
            }
            "--record" => {
                let value = args.next().context("--record requires a path argument")?;
                record = Some(PathBuf::from(value));
            }
            "--help" => {
                print_usage();
                process::exit(0);
            }
            _ => {
                bail!("unknown argument: {arg}");
            }
        }
    }

    match subcommand.as_str() {
        "train" => {
            let dataset = dataset.ok_or_else(|| anyhow!("train requires --dataset"))?;
            Ok(Command::Train { dataset })
        }
        "evaluate" => {
            let artifact = artifact.ok_or_else(|| anyhow!("evaluate requires --artifact"))?;
            let dataset = dataset.ok_or_else(|| anyhow!("evaluate requires --dataset"))?;
            Ok(Command::Evaluate { artifact, dataset })
        }
        "predict" => {
            let artifact = artifact.ok_or_else(|| anyhow!("predict requires --artifact"))?;
            let record = record.ok_or_else(|| anyhow!("predict requires --record"))?;
            Ok(Command::Predict { artifact, record })
        }
        other => bail!("unknown subcommand: {other}"),
    }
}

fn print_usage() {
    eprintln!(
        "Usage:\n  sector-classifier train --dataset <labeled.json>\n  sector-classifier evaluate --artifact <bundle.json> --dataset <labeled.json>\n  sector-classifier predict --artifact <bundle.json> --record <article.json>"
    );
}
