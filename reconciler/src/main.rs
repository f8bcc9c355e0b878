//! litmerge CLI - reconcile bibliographic submissions
//!
//! # Main Commands
//!
//! ```bash
//! litmerge run                       # Whole pipeline, incremental
//! litmerge run --org FB --full       # One organization, ignore previous fingerprints
//! litmerge claims -o pmids_by_mods   # Build the claim index only
//! ```
//!
//! # Debug Commands
//!
//! ```bash
//! litmerge fingerprint REFERENCE_FB.json   # Fingerprint per entry
//! litmerge validate REFERENCE_FB.json      # Schema-check a payload
//! litmerge split-id ZFIN:ZDB-PUB-020604-2  # Show how an id splits
//! ```

use clap::{Parser, Subcommand};
use litmerge::{
    load_payload, split_identifier, unexpected_properties, validate_submission, ClaimIndex, Fingerprinter,
    Pipeline, PipelineConfig, RawSubmission, RunOptions, XrefSanitizer,
};
use std::path::{Path, PathBuf};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "litmerge")]
#[command(about = "Reconcile multi-organization bibliographic submissions", long_about = None)]
struct Cli {
    /// JSON configuration file (defaults plus LITMERGE_* variables otherwise)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the whole pipeline
    Run {
        /// Only process this organization
        #[arg(long)]
        org: Option<String>,

        /// Ignore previous fingerprints and emit everything
        #[arg(long)]
        full: bool,
    },

    /// Build the claim index (external id -> organizations) as TSV
    Claims {
        /// Output file (default: configured claim index path)
        #[arg(short, long)]
        output: Option<PathBuf>,
    },

    /// Print `primary_id<TAB>fingerprint` for every entry of a payload
    Fingerprint {
        /// Submission payload
        input: PathBuf,

        /// Organization (default: taken from REFERENCE_<ORG>.json)
        #[arg(long)]
        org: Option<String>,

        /// Fingerprint as an authoritative-matched record
        #[arg(long)]
        matched: bool,
    },

    /// Schema-check a submission payload
    Validate {
        /// Submission payload
        input: PathBuf,
    },

    /// Show how a compound identifier splits
    SplitId {
        id: String,
    },
}

#[tokio::main]
async fn main() {
    // Load .env file (if present)
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();

    let result = match cli.command {
        Commands::Run { org, full } => cmd_run(cli.config.as_deref(), org.as_deref(), full).await,
        Commands::Claims { output } => cmd_claims(cli.config.as_deref(), output.as_deref()),
        Commands::Fingerprint { input, org, matched } => {
            cmd_fingerprint(cli.config.as_deref(), &input, org.as_deref(), matched)
        }
        Commands::Validate { input } => cmd_validate(&input),
        Commands::SplitId { id } => cmd_split_id(&id),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}

fn load_config(path: Option<&Path>) -> Result<PipelineConfig, Box<dyn std::error::Error>> {
    let config = match path {
        Some(p) => PipelineConfig::from_file(p)?.with_env_overrides()?,
        None => PipelineConfig::from_env()?,
    };
    Ok(config)
}

async fn cmd_run(config: Option<&Path>, org: Option<&str>, full: bool) -> Result<(), Box<dyn std::error::Error>> {
    let mut config = load_config(config)?;
    if let Some(org) = org {
        config = config.only_organization(org);
    }

    let pipeline = Pipeline::open(config)?;
    let cancel = pipeline.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("Cancelling after the current organization...");
            cancel.store(true, std::sync::atomic::Ordering::SeqCst);
        }
    });

    let manifest = pipeline.run(RunOptions { full }).await?;

    eprintln!("Run {}", manifest.run_id);
    for stats in &manifest.organizations {
        eprintln!(
            "   {:<5} total {:>7}  rejected {:>5}  unchanged {:>7}  matched {:>6}  unmatched {:>6}  multi {:>5}",
            stats.organization,
            stats.total,
            stats.rejected,
            stats.unchanged,
            stats.emitted_matched,
            stats.emitted_unmatched,
            stats.consolidated
        );
    }
    eprintln!(
        "   multi-organization ids: {} ({} emitted, {} conflicts)",
        manifest.consolidation.external_ids, manifest.consolidation.emitted, manifest.consolidation.conflicts
    );
    eprintln!(
        "   {} records in {} partitions; {} warnings, {} flagged, {} rejected",
        manifest.emitted(),
        manifest.partitions.len(),
        manifest.warnings,
        manifest.flagged,
        manifest.rejected
    );
    Ok(())
}

fn cmd_claims(config: Option<&Path>, output: Option<&Path>) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;

    let mut payloads = Vec::new();
    for organization in &config.organizations {
        if let Some(entries) = load_payload(&config.paths.submission_file(organization))? {
            payloads.push((organization.clone(), entries));
        }
    }

    let sanitizer = XrefSanitizer::new(&config);
    let index = ClaimIndex::build(
        payloads.iter().map(|(org, entries)| (org.as_str(), entries.as_slice())),
        &sanitizer,
    );

    let path = output.map(Path::to_path_buf).unwrap_or_else(|| config.paths.claim_index());
    index.write_tsv(&path)?;
    eprintln!(
        "{} external ids ({} claimed by several organizations) written to {}",
        index.len(),
        index.multi_count(),
        path.display()
    );
    Ok(())
}

/// `REFERENCE_FB.json` -> `FB`
fn organization_from_file(path: &Path) -> Option<String> {
    path.file_stem()
        .and_then(|s| s.to_str())
        .and_then(|s| s.strip_prefix("REFERENCE_"))
        .map(str::to_string)
}

fn cmd_fingerprint(
    config: Option<&Path>,
    input: &Path,
    org: Option<&str>,
    matched: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let config = load_config(config)?;
    let organization = org
        .map(str::to_string)
        .or_else(|| organization_from_file(input))
        .ok_or("cannot tell the organization, pass --org")?;

    let entries = load_payload(input)?.ok_or_else(|| format!("{} not found", input.display()))?;
    let fingerprinter = Fingerprinter::new(&config.fingerprint);

    for (i, entry) in entries.into_iter().enumerate() {
        match RawSubmission::from_value(&organization, entry) {
            Ok(submission) => {
                println!("{}\t{}", submission.primary_id, fingerprinter.fingerprint(&submission, matched)?)
            }
            Err(e) => eprintln!("entry {}: {}", i, e),
        }
    }
    Ok(())
}

fn cmd_validate(input: &Path) -> Result<(), Box<dyn std::error::Error>> {
    eprintln!("Validating: {}", input.display());

    let entries = load_payload(input)?.ok_or_else(|| format!("{} not found", input.display()))?;

    let mut valid = 0;
    let mut invalid = 0;
    for (i, entry) in entries.iter().enumerate() {
        let unexpected = unexpected_properties(entry);
        if !unexpected.is_empty() {
            eprintln!("   entry {}: unexpected properties {}", i, unexpected.join(", "));
        }
        let Err(errors) = validate_submission(entry) else {
            valid += 1;
            continue;
        };
        invalid += 1;
        if invalid <= 5 {
            eprintln!("\nEntry {} invalid:", i);
            for err in errors.iter().take(3) {
                eprintln!("   - {}", err);
            }
        }
    }

    eprintln!("\nResults: {} valid, {} invalid", valid, invalid);

    if invalid > 0 {
        std::process::exit(1);
    }
    Ok(())
}

fn cmd_split_id(id: &str) -> Result<(), Box<dyn std::error::Error>> {
    let split = split_identifier(id)?;
    println!("prefix\t{}", split.prefix);
    println!("value\t{}", split.value);
    println!("separator\t{}", split.separator.as_char());
    Ok(())
}
