use anyhow::Context;
use clap::{Parser, Subcommand};
use declmerge_core::config::Settings;
use declmerge_core::logging::init_logging;
use declmerge_core::report::MergeReport;
use merge_engine::{Choice, ConflictKind, Language, MergeOutput, Merger, Resolutions};
use std::path::{Path, PathBuf};
use tokio::fs;

#[derive(Parser)]
#[command(
    name = "declmerge",
    version,
    about = "Declaration-level merge of two C# or Java source files"
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to a settings file
    #[arg(long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Merge two inputs (detect pass, or resolve pass when resolutions are given)
    Merge {
        /// Base input
        first: PathBuf,
        /// Contributing input
        second: PathBuf,
        /// JSON list of {id, choice} records from a previous detect pass
        resolutions: Option<PathBuf>,
        #[command(flatten)]
        sinks: Sinks,
    },
    /// Walk through conflicts interactively, then apply the choices
    Review {
        first: PathBuf,
        second: PathBuf,
        /// Save the collected resolutions as JSON
        #[arg(long)]
        save_resolutions: Option<PathBuf>,
        #[command(flatten)]
        sinks: Sinks,
    },
    /// Write a settings file with default values
    InitConfig {
        #[arg(default_value = "declmerge.json")]
        path: PathBuf,
    },
}

#[derive(clap::Args)]
struct Sinks {
    /// Write merged source here instead of stdout
    #[arg(long, short)]
    output: Option<PathBuf>,
    /// Write the merge report here instead of stderr
    #[arg(long)]
    log: Option<PathBuf>,
    /// Input language (csharp, java); inferred from the extension by default
    #[arg(long, value_parser = parse_language)]
    language: Option<Language>,
}

fn parse_language(raw: &str) -> Result<Language, String> {
    Language::from_name(raw).ok_or_else(|| format!("unsupported language: {}", raw))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let settings = Settings::load_or_default(cli.config.as_deref())?;
    let _guard = init_logging(&settings.logging)?;

    match &cli.command {
        Commands::Merge {
            first,
            second,
            resolutions,
            sinks,
        } => cmd_merge(&settings, first, second, resolutions.as_deref(), sinks).await,
        Commands::Review {
            first,
            second,
            save_resolutions,
            sinks,
        } => cmd_review(&settings, first, second, save_resolutions.as_deref(), sinks).await,
        Commands::InitConfig { path } => cmd_init_config(path).await,
    }
}

#[derive(Clone)]
struct Inputs {
    first: String,
    second: String,
}

async fn read_input(path: &Path) -> anyhow::Result<String> {
    fs::read_to_string(path)
        .await
        .with_context(|| format!("reading {}", path.display()))
}

async fn read_inputs(first: &Path, second: &Path) -> anyhow::Result<Inputs> {
    let (first, second) = tokio::try_join!(read_input(first), read_input(second))?;
    Ok(Inputs { first, second })
}

fn merger_for(settings: &Settings, first: &Path, sinks: &Sinks) -> Merger {
    let language = sinks
        .language
        .unwrap_or_else(|| settings.language_for(first));
    tracing::debug!(%language, "Selected input language");
    Merger::new(settings.merge_config(language))
}

/// Run one pass off the async runtime; the engine is CPU-bound.
async fn run_pass(
    merger: Merger,
    inputs: Inputs,
    resolutions: Option<Resolutions>,
) -> anyhow::Result<MergeOutput> {
    let output = tokio::task::spawn_blocking(move || match resolutions {
        Some(r) => merger.resolve(&inputs.first, &inputs.second, &r),
        None => merger.detect(&inputs.first, &inputs.second),
    })
    .await??;
    Ok(output)
}

async fn cmd_merge(
    settings: &Settings,
    first: &Path,
    second: &Path,
    resolutions: Option<&Path>,
    sinks: &Sinks,
) -> anyhow::Result<()> {
    let inputs = read_inputs(first, second).await?;

    let resolutions = match resolutions {
        Some(path) => {
            let payload = read_input(path).await?;
            let parsed = Resolutions::from_json(&payload)
                .with_context(|| format!("loading resolutions from {}", path.display()))?;
            tracing::info!("Loaded {} resolutions", parsed.len());
            Some(parsed)
        }
        None => None,
    };

    let merger = merger_for(settings, first, sinks);
    let output = run_pass(merger, inputs, resolutions).await?;
    emit(settings, first, second, &output, sinks).await
}

async fn cmd_review(
    settings: &Settings,
    first: &Path,
    second: &Path,
    save_resolutions: Option<&Path>,
    sinks: &Sinks,
) -> anyhow::Result<()> {
    let inputs = read_inputs(first, second).await?;
    let merger = merger_for(settings, first, sinks);

    let detected = run_pass(merger.clone(), inputs.clone(), None).await?;
    let choosable: Vec<_> = detected.ledger.choosable().collect();
    eprintln!(
        "{} ledger entries, {} need a decision",
        detected.ledger.len(),
        choosable.len()
    );

    let options = ["Keep first", "Keep second", "Keep both"];
    let choices = [Choice::KeepFirst, Choice::KeepSecond, Choice::KeepBoth];
    let mut resolutions = Resolutions::new();

    for entry in choosable {
        eprintln!();
        eprintln!(
            "#{} {} {}.{}",
            entry.id, entry.kind, entry.location, entry.name
        );
        match entry.body_diff() {
            Some(diff) if !diff.is_empty() => eprint!("{}", diff),
            _ => eprintln!("(bodies are identical)"),
        }

        let default = match entry.kind {
            ConflictKind::MethodDuplicate => 1,
            _ => 2,
        };
        let idx = dialoguer::Select::new()
            .with_prompt(format!("Resolve #{}", entry.id))
            .items(&options)
            .default(default)
            .interact()?;
        resolutions.insert(entry.id, choices[idx]);
    }

    if let Some(path) = save_resolutions {
        fs::write(path, resolutions.to_json_pretty())
            .await
            .with_context(|| format!("writing resolutions to {}", path.display()))?;
        eprintln!("Resolutions saved to {}", path.display());
    }

    let output = run_pass(merger, inputs, Some(resolutions)).await?;
    emit(settings, first, second, &output, sinks).await
}

/// Write the merged source and the report to their separate channels.
async fn emit(
    settings: &Settings,
    first: &Path,
    second: &Path,
    output: &MergeOutput,
    sinks: &Sinks,
) -> anyhow::Result<()> {
    match &sinks.output {
        Some(path) => {
            fs::write(path, &output.merged)
                .await
                .with_context(|| format!("writing merged source to {}", path.display()))?;
            tracing::info!("Merged source written to {}", path.display());
        }
        None => print!("{}", output.merged),
    }

    let report = MergeReport::new(
        output,
        &first.display().to_string(),
        &second.display().to_string(),
        settings.report.include_bodies,
    );
    match &sinks.log {
        Some(path) => report.save(path, settings.report.pretty).await?,
        None => eprintln!("{}", report.to_json(settings.report.pretty)?),
    }

    tracing::info!(
        pass = %output.pass,
        entries = output.ledger.len(),
        run_id = %report.run_id,
        "Merge finished"
    );
    Ok(())
}

async fn cmd_init_config(path: &Path) -> anyhow::Result<()> {
    if fs::try_exists(path).await.unwrap_or(false)
        && !dialoguer::Confirm::new()
            .with_prompt(format!("{} exists. Overwrite?", path.display()))
            .default(false)
            .interact()?
    {
        println!("Left {} unchanged.", path.display());
        return Ok(());
    }

    Settings::default().save(path)?;
    println!("Default settings written to {}", path.display());
    Ok(())
}
