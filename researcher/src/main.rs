//! `researcher` command line.
//!
//! `run` researches every subject in a JSON list and writes one report per
//! subject plus a batch summary. `missing` shows which actions the oracle
//! keeps asking for that nobody implements. `init` writes a default config.

use std::env;
use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{Context, Result, bail};
use clap::{Parser, Subcommand};
use tracing::info;

use researcher::batch::Batch;
use researcher::exit_codes;
use researcher::handlers::register_defaults;
use researcher::io::config::{DEFAULT_CONFIG_FILE, ResearchConfig, load_config, write_config};
use researcher::io::explorer::CommandExplorer;
use researcher::io::images::{DisabledImageStore, HttpImageStore, ImageStore};
use researcher::io::missing_log::{MISSING_LOG_FILE, MissingActionLog};
use researcher::io::oracle::ChatCompletionsOracle;
use researcher::io::subjects::{load_subjects, select_window};
use researcher::logging;
use researcher::oracle::DecisionEngine;
use researcher::registry::FunctionRegistry;
use researcher::research::ResearchSettings;
use researcher::session::Tools;

#[derive(Parser)]
#[command(
    name = "researcher",
    version,
    about = "Iterative oracle-guided company research"
)]
struct Cli {
    /// Config file (TOML). Defaults apply when it does not exist.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_FILE)]
    config: PathBuf,

    /// Output directory; overrides `output_dir` from the config.
    #[arg(long, global = true)]
    output: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Research every subject in a JSON list.
    Run {
        /// JSON array of subjects.
        #[arg(long)]
        subjects: PathBuf,
        /// Oracle consultations per subject; overrides the config.
        #[arg(long)]
        max_iterations: Option<u32>,
        /// Index of the first subject to research.
        #[arg(long, default_value_t = 0)]
        start: usize,
        /// Research at most this many subjects.
        #[arg(long)]
        limit: Option<usize>,
        /// Record image facts without downloading.
        #[arg(long)]
        no_images: bool,
    },
    /// Show how often the oracle requested unimplemented actions.
    Missing {
        /// Reset the counters.
        #[arg(long)]
        clear: bool,
    },
    /// Write a config file with default values.
    Init {
        /// Overwrite an existing config file.
        #[arg(short, long)]
        force: bool,
    },
}

fn main() -> ExitCode {
    logging::init();
    match run() {
        Ok(code) => ExitCode::from(code as u8),
        Err(err) => {
            eprintln!("{err:#}");
            ExitCode::from(exit_codes::INVALID as u8)
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Missing { clear } => {
            let cfg = load(&cli.config, cli.output)?;
            cmd_missing(&cfg, clear)
        }
        Command::Run {
            subjects,
            max_iterations,
            start,
            limit,
            no_images,
        } => {
            let mut cfg = load(&cli.config, cli.output)?;
            if let Some(max_iterations) = max_iterations {
                cfg.max_iterations = max_iterations;
            }
            if no_images {
                cfg.images.enabled = false;
            }
            cfg.validate()?;
            cmd_run(&cfg, &subjects, start, limit)
        }
    }
}

fn load(path: &Path, output: Option<PathBuf>) -> Result<ResearchConfig> {
    let mut cfg = load_config(path)?;
    if let Some(output) = output {
        cfg.output_dir = output;
    }
    Ok(cfg)
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &ResearchConfig::default())?;
    println!("{}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_missing(cfg: &ResearchConfig, clear: bool) -> Result<i32> {
    let mut log = MissingActionLog::load(&cfg.output_dir.join(MISSING_LOG_FILE));
    if clear {
        log.clear()?;
        println!("cleared");
        return Ok(exit_codes::OK);
    }
    let mut counts: Vec<(&String, &u64)> = log.counts().iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (name, count) in counts {
        println!("{count:>6}  {name}");
    }
    Ok(exit_codes::OK)
}

fn api_key(var: &str) -> Result<String> {
    dotenvy::dotenv().ok();
    let key = env::var(var).with_context(|| format!("read {var} from the environment"))?;
    if key.trim().is_empty() {
        bail!("{var} is empty");
    }
    Ok(key)
}

fn cmd_run(
    cfg: &ResearchConfig,
    subjects_path: &Path,
    start: usize,
    limit: Option<usize>,
) -> Result<i32> {
    let subjects = load_subjects(subjects_path)?;
    let subjects = select_window(&subjects, start, limit);
    let output_dir = cfg.output_dir.as_path();
    std::fs::create_dir_all(output_dir)
        .with_context(|| format!("create directory {}", output_dir.display()))?;

    let oracle = ChatCompletionsOracle::new(&cfg.oracle, api_key(&cfg.oracle.api_key_env)?)?;
    let engine = DecisionEngine::new(oracle, cfg.max_iterations);
    let explorer = CommandExplorer::new(cfg.explorer.clone(), cfg.cache_dir());
    let images: Box<dyn ImageStore> = if cfg.images.enabled {
        Box::new(HttpImageStore::new(&cfg.images, output_dir)?)
    } else {
        Box::new(DisabledImageStore)
    };
    let tools = Tools {
        explorer: &explorer,
        images: &*images,
        excerpt_bytes: cfg.explorer.excerpt_bytes,
    };
    let settings = ResearchSettings {
        max_iterations: cfg.max_iterations,
        record_dir: cfg.record_iterations.then(|| output_dir.to_path_buf()),
    };

    let mut registry =
        FunctionRegistry::new(MissingActionLog::load(&output_dir.join(MISSING_LOG_FILE)));
    register_defaults(&mut registry);

    info!(
        subjects = subjects.len(),
        output = %output_dir.display(),
        model = %cfg.oracle.model,
        "starting batch"
    );
    let mut batch = Batch {
        engine: &engine,
        registry: &mut registry,
        tools,
        settings: &settings,
        output_dir,
    };
    let summary = batch.run(subjects, |subject, report| {
        info!(
            subject,
            iteration = report.iteration,
            max_iterations = report.max_iterations,
            status = ?report.status,
            failed = report.failed,
            "progress"
        );
    })?;

    println!(
        "{} of {} subjects succeeded",
        summary.successful, summary.total_processed
    );
    if summary.failed > 0 {
        Ok(exit_codes::PARTIAL)
    } else {
        Ok(exit_codes::OK)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_run_with_overrides() {
        let cli = Cli::parse_from([
            "researcher",
            "run",
            "--subjects",
            "leads.json",
            "--max-iterations",
            "3",
            "--start",
            "2",
            "--limit",
            "5",
            "--output",
            "out",
        ]);
        assert_eq!(cli.output, Some(PathBuf::from("out")));
        match cli.command {
            Command::Run {
                subjects,
                max_iterations,
                start,
                limit,
                no_images,
            } => {
                assert_eq!(subjects, PathBuf::from("leads.json"));
                assert_eq!(max_iterations, Some(3));
                assert_eq!(start, 2);
                assert_eq!(limit, Some(5));
                assert!(!no_images);
            }
            _ => panic!("expected run"),
        }
    }

    #[test]
    fn parse_missing_clear() {
        let cli = Cli::parse_from(["researcher", "missing", "--clear"]);
        assert!(matches!(cli.command, Command::Missing { clear: true }));
        assert_eq!(cli.config, PathBuf::from(DEFAULT_CONFIG_FILE));
    }

    #[test]
    fn parse_init_force() {
        let cli = Cli::parse_from(["researcher", "init", "--force"]);
        assert!(matches!(cli.command, Command::Init { force: true }));
    }

    #[test]
    fn init_refuses_to_overwrite() {
        let temp = tempfile::tempdir().expect("tempdir");
        let path = temp.path().join("researcher.toml");
        assert_eq!(cmd_init(&path, false).expect("init"), exit_codes::OK);
        assert!(cmd_init(&path, false).is_err());
        assert_eq!(cmd_init(&path, true).expect("force"), exit_codes::OK);
    }
}
