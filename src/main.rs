use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use pkgdeps::hasher::{scan, IgnoreRules, ScanFilters};
use pkgdeps::source::ContentRoot;
use pkgdeps::{CancellationToken, DependencyTracker, TrackerConfig};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "pkgdeps", version, about = "Package dependency hashes and timestamps")]
struct Cli {
    /// JSON config file
    #[arg(long, short, env = "PKGDEPS_CONFIG")]
    config: Option<PathBuf>,

    /// Extra content root as <mount>=<dir>, e.g. /Game=Content
    #[arg(long = "content", value_name = "MOUNT=DIR")]
    content: Vec<String>,

    /// Shader source directory
    #[arg(long)]
    shaders: Option<PathBuf>,

    /// Directory searched for script modules
    #[arg(long = "script-dir")]
    script_dirs: Vec<PathBuf>,

    /// Resolution worker threads (defaults to the config, then the CPU count)
    #[arg(long, short)]
    workers: Option<usize>,

    #[arg(long, short)]
    verbose: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Direct dependencies of a package, sorted
    Deps { name: String },
    /// Dependent hash and full hash of a package
    Hash { name: String },
    /// Earliest timestamp in a package's closure
    Timestamp { name: String },
    /// Every package in the closure with its own hash
    Closure { name: String },
    /// Resolve packages concurrently (all when none are named)
    Resolve { names: Vec<String> },
    /// Scan a directory and print path, timestamp and digest
    Scan {
        dir: PathBuf,
        #[arg(long = "dir-filter")]
        dir_filters: Vec<String>,
        #[arg(long)]
        exclude: Vec<String>,
        #[arg(long = "no-recurse")]
        no_recurse: Vec<String>,
        #[arg(long = "file-filter")]
        file_filters: Vec<String>,
        #[arg(long)]
        ignore: Vec<String>,
        /// Include directories as entries
        #[arg(long)]
        dirs: bool,
        #[arg(long)]
        hash: bool,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    match &cli.command {
        Command::Deps { name } => {
            for dependency in load_tracker(&cli)?.dependencies(name)? {
                println!("{dependency}");
            }
        }
        Command::Hash { name } => {
            let tracker = load_tracker(&cli)?;
            println!("dependent {}", tracker.dependent_hash(name)?);
            println!("full      {}", tracker.full_hash(name)?);
        }
        Command::Timestamp { name } => {
            println!("{}", load_tracker(&cli)?.dependent_timestamp(name)?.to_rfc3339());
        }
        Command::Closure { name } => {
            for (package, digest) in load_tracker(&cli)?.transitive_full_hashes(name)? {
                println!("{digest}  {package}");
            }
        }
        Command::Resolve { names } => {
            let report = load_tracker(&cli)?.resolve_all_concurrently(
                names.as_slice(),
                0,
                &CancellationToken::new(),
            )?;
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
        Command::Scan {
            dir,
            dir_filters,
            exclude,
            no_recurse,
            file_filters,
            ignore,
            dirs,
            hash,
        } => {
            let filters = ScanFilters::new()
                .directory_includes(dir_filters.iter().cloned())
                .directory_excludes(exclude.iter().cloned())
                .no_recurse(no_recurse.iter().cloned())
                .file_includes(file_filters.iter().cloned())
                .ignore(IgnoreRules::from_patterns(ignore))
                .include_directories(*dirs)
                .compute_hashes(*hash);
            for (path, record) in scan(dir, &filters)? {
                let digest = record.hash.map(|d| d.to_hex()).unwrap_or_default();
                println!("{path}\t{}\t{digest}", record.timestamp.to_rfc3339());
            }
        }
    }

    Ok(())
}

fn load_tracker(cli: &Cli) -> Result<DependencyTracker> {
    let config = load_config(cli)?;
    let pre_resolve_all = config.pre_resolve_all;
    let mut tracker = DependencyTracker::from_config(config);
    tracker.initialize(pre_resolve_all)?;
    Ok(tracker)
}

fn load_config(cli: &Cli) -> Result<TrackerConfig> {
    let mut config = match &cli.config {
        Some(path) => TrackerConfig::load(path)?,
        None => TrackerConfig::default(),
    };

    for entry in &cli.content {
        let (mount, dir) = entry
            .split_once('=')
            .with_context(|| format!("Expected <mount>=<dir>, got {entry}"))?;
        config.content_roots.push(ContentRoot::new(mount, dir));
    }
    if let Some(shaders) = &cli.shaders {
        config.shader_dir = Some(shaders.clone());
    }
    config.script_source_dirs.extend(cli.script_dirs.iter().cloned());
    if let Some(workers) = cli.workers {
        config.worker_count = Some(workers);
    }
    Ok(config)
}

fn init_logging(verbose: bool) {
    let filter = if verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
    };
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .try_init();
}
