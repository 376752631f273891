use std::path::PathBuf;
use std::sync::Arc;
use std::time::{Duration, Instant};

use anyhow::{bail, Context};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::warn;

use oj_scraper::extract::extract;
use oj_scraper::platform;
use oj_scraper::review::{outcome_notice, DEFAULT_DESCRIPTION_CHARS};
use oj_scraper::{
    BatchResult, ChangedFile, DocumentSource, FsDocuments, Orchestrator, ReqwestTransport,
    ScrapeConfig, ScrapeOutcome, ScraperFactory, Settings,
};

#[derive(Parser)]
#[command(name = "oj_scraper", about = "Online-judge problem detection and scraping")]
struct Cli {
    /// TOML config file (OJ_SCRAPER_* env vars override it)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show the problem URL and platform found in each file (no network)
    Detect {
        files: Vec<PathBuf>,
    },
    /// Scrape one problem URL and print it as JSON
    Fetch {
        url: String,
    },
    /// Run the full batch pipeline over solution files
    Batch {
        /// Repository-relative solution paths
        files: Vec<String>,
        /// Repository checkout the paths are relative to
        #[arg(short, long, default_value = ".")]
        root: PathBuf,
        /// Print the whole result as JSON
        #[arg(long)]
        json: bool,
    },
    /// Print the review-prompt context block for one problem URL
    Context {
        url: String,
        /// Max description characters before truncation
        #[arg(short = 'n', long, default_value_t = DEFAULT_DESCRIPTION_CHARS)]
        max_chars: usize,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let t0 = Instant::now();
    let cli = Cli::parse();
    let config = Settings::load(cli.config.as_deref())?.validate()?;

    let result = match cli.command {
        Commands::Detect { files } => {
            for path in files {
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("reading {}", path.display()))?;
                let file = ChangedFile::new(path.to_string_lossy(), content);
                if !file.is_source_file() {
                    println!("{}: skipped (not a source file)", file.path);
                    continue;
                }
                match extract(&file.content, &file.path) {
                    Some(url) => match platform::reference(&url) {
                        Some(r) => println!("{}: {} {} ({})", file.path, r.platform, r.problem_id, r.canonical_url),
                        None => println!("{}: Unknown ({})", file.path, url),
                    },
                    None => println!("{}: no problem URL", file.path),
                }
            }
            Ok(())
        }
        Commands::Fetch { url } => {
            let outcome = fetch_one(&config, &url).await?;
            println!("{}", serde_json::to_string_pretty(&outcome)?);
            Ok(())
        }
        Commands::Context { url, max_chars } => {
            let outcome = fetch_one(&config, &url).await?;
            if let Some(notice) = outcome_notice(&outcome) {
                eprintln!("{}", notice);
            }
            if let Some(problem) = outcome.problem() {
                println!("{}", problem.to_prompt_context(max_chars));
            }
            Ok(())
        }
        Commands::Batch { files, root, json } => {
            if files.is_empty() {
                println!("No files given.");
                return Ok(());
            }
            let mut changed = Vec::with_capacity(files.len());
            for path in files {
                let content = std::fs::read_to_string(root.join(&path))
                    .with_context(|| format!("reading {} under {}", path, root.display()))?;
                let file = ChangedFile::new(path, content);
                if file.is_source_file() {
                    changed.push(file);
                } else {
                    warn!(file = %file.path, "skipping non-source file");
                }
            }

            let transport = Arc::new(ReqwestTransport::new(&config)?);
            let documents: Arc<dyn DocumentSource> = Arc::new(FsDocuments::new(&root));
            let orchestrator = Orchestrator::from_config(transport, Some(documents), config);

            let pb = ProgressBar::new_spinner();
            pb.set_style(
                ProgressStyle::default_spinner()
                    .template("{spinner:.green} [{elapsed_precise}] {msg}")?,
            );
            pb.set_message(format!("scraping {} files", changed.len()));
            pb.enable_steady_tick(Duration::from_millis(120));
            let result = orchestrator.run(changed).await;
            pb.finish_and_clear();

            if json {
                println!("{}", serde_json::to_string_pretty(&result)?);
            } else {
                print_summary(&result);
            }
            Ok(())
        }
    };

    let elapsed = t0.elapsed();
    if elapsed.as_secs() >= 1 {
        eprintln!("\nDone in {}", format_duration(elapsed));
    }

    result
}

async fn fetch_one(config: &ScrapeConfig, url: &str) -> anyhow::Result<ScrapeOutcome> {
    let Some(reference) = platform::reference(url) else {
        bail!("{} is not a supported problem URL", url);
    };
    let transport = Arc::new(ReqwestTransport::new(config)?);
    let factory = ScraperFactory::new(transport, config.retry);
    let Some(scraper) = factory.create(reference.platform) else {
        bail!("no scraper for {}", reference.platform);
    };
    Ok(scraper.fetch(&reference).await)
}

fn print_summary(result: &BatchResult) {
    let mut ok = 0usize;
    for entry in result.iter() {
        let status = match &entry.outcome {
            ScrapeOutcome::Success { problem } => {
                ok += 1;
                format!("ok       {}", problem.title)
            }
            ScrapeOutcome::Degraded { problem, note } => {
                ok += 1;
                format!("degraded {} ({})", problem.title, note)
            }
            ScrapeOutcome::Failure { failure } => format!("failed   {}", failure),
        };
        println!("{:<40} {}", truncate(&entry.file.path, 40), status);
    }
    println!("\n{} files ({} with problem data, {} failed)", result.len(), ok, result.len() - ok);
}

fn truncate(s: &str, max: usize) -> String {
    if s.chars().count() <= max {
        s.to_string()
    } else {
        let truncated: String = s.chars().take(max - 3).collect();
        format!("{}...", truncated)
    }
}

fn format_duration(d: Duration) -> String {
    let secs = d.as_secs();
    if secs < 60 {
        format!("{:.1}s", d.as_secs_f64())
    } else {
        format!("{}m {}s", secs / 60, secs % 60)
    }
}
