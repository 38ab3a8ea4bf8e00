//! CLI command definitions, routing, and tracing setup.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use color_eyre::eyre::{Result, eyre};
use feedpublish_core::pipeline::{self, ProgressReporter, PublishRunConfig, PublishRunResult};
use feedpublish_publisher::{DryRunPublisher, HttpPublisher, PublisherOptions};
use feedpublish_shared::{
    AppConfig, DEFAULT_CONFIG_FILE, FeedDescriptor, UnmappedPolicy, init_config, load_config,
};
use indicatif::{ProgressBar, ProgressStyle};
use tracing::{error, info};
use url::Url;

// ---------------------------------------------------------------------------
// CLI structure
// ---------------------------------------------------------------------------

/// feedpublish — route build artifacts to their feeds.
#[derive(Parser)]
#[command(
    name = "feedpublish",
    version,
    about = "Classify build artifacts by category and publish them to the matching feeds.",
    long_about = None,
)]
pub(crate) struct Cli {
    /// Log format: text (default) or json.
    #[arg(long, default_value = "text", global = true)]
    pub log_format: LogFormat,

    /// Verbosity level (-v, -vv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file (defaults to ./feedpublish.toml if present).
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Command,
}

/// Log output format.
#[derive(Clone, Debug, clap::ValueEnum)]
pub(crate) enum LogFormat {
    Text,
    Json,
}

/// Top-level CLI subcommands.
#[derive(Subcommand)]
pub(crate) enum Command {
    /// Classify every manifest and publish each category to its feed.
    Publish {
        /// Directory containing the build manifests.
        #[arg(long)]
        manifests_dir: PathBuf,

        /// Directory blob artifacts are read from.
        #[arg(long)]
        blob_assets_dir: PathBuf,

        /// Directory package artifacts are read from.
        #[arg(long)]
        package_assets_dir: PathBuf,

        /// Numeric id of the build being published.
        #[arg(long)]
        build_id: u64,

        /// Build registry API endpoint.
        #[arg(long)]
        api_endpoint: Url,

        /// Build registry access token.
        #[arg(long, env = "FEEDPUBLISH_API_TOKEN", hide_env_values = true)]
        api_token: String,

        /// Extra feed as CATEGORY=URL|TYPE|TOKEN (repeatable).
        #[arg(long = "feed")]
        feeds: Vec<FeedDescriptor>,

        /// Skip categories with no configured feed instead of failing.
        #[arg(long)]
        skip_unmapped: bool,

        /// Report what would be published without uploading.
        #[arg(long)]
        dry_run: bool,
    },

    /// Print the category groups of a single manifest as JSON.
    Classify {
        /// Manifest file to classify.
        #[arg(long)]
        manifest: PathBuf,
    },

    /// Configuration management.
    Config {
        /// Config subcommand.
        #[command(subcommand)]
        action: ConfigAction,
    },
}

/// Config subcommands.
#[derive(Subcommand)]
pub(crate) enum ConfigAction {
    /// Write a starter config file.
    Init {
        /// Where to write it (defaults to ./feedpublish.toml).
        #[arg(long)]
        path: Option<PathBuf>,
    },
    /// Show resolved configuration (tokens redacted).
    Show,
}

// ---------------------------------------------------------------------------
// Tracing setup
// ---------------------------------------------------------------------------

/// Initialize tracing based on CLI flags.
pub(crate) fn init_tracing(cli: &Cli) {
    use tracing_subscriber::{EnvFilter, fmt};

    let filter = match cli.verbose {
        0 => "feedpublish=info",
        1 => "feedpublish=debug",
        _ => "feedpublish=trace",
    };

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(filter));

    match cli.log_format {
        LogFormat::Text => {
            fmt()
                .with_env_filter(env_filter)
                .with_target(false)
                .with_writer(std::io::stderr)
                .init();
        }
        LogFormat::Json => {
            fmt()
                .json()
                .with_env_filter(env_filter)
                .with_writer(std::io::stderr)
                .init();
        }
    }
}

// ---------------------------------------------------------------------------
// Command dispatch
// ---------------------------------------------------------------------------

/// Run the CLI command. Any error is logged in full and turned into a
/// failing exit code.
pub(crate) async fn run(cli: Cli) -> ExitCode {
    let config_path = cli.config.as_deref();

    let outcome = match cli.command {
        Command::Publish {
            manifests_dir,
            blob_assets_dir,
            package_assets_dir,
            build_id,
            api_endpoint,
            api_token,
            feeds,
            skip_unmapped,
            dry_run,
        } => {
            let args = PublishArgs {
                manifests_dir,
                blob_assets_dir,
                package_assets_dir,
                build_id,
                api_endpoint,
                api_token,
                feeds,
                skip_unmapped,
                dry_run,
            };
            cmd_publish(config_path, args).await
        }
        Command::Classify { manifest } => cmd_classify(&manifest),
        Command::Config { action } => match action {
            ConfigAction::Init { path } => cmd_config_init(path.as_deref()),
            ConfigAction::Show => cmd_config_show(config_path),
        },
    };

    match outcome {
        Ok(()) => ExitCode::SUCCESS,
        Err(report) => {
            error!(error = ?report, "feedpublish failed");
            ExitCode::FAILURE
        }
    }
}

/// Flattened `publish` arguments.
struct PublishArgs {
    manifests_dir: PathBuf,
    blob_assets_dir: PathBuf,
    package_assets_dir: PathBuf,
    build_id: u64,
    api_endpoint: Url,
    api_token: String,
    feeds: Vec<FeedDescriptor>,
    skip_unmapped: bool,
    dry_run: bool,
}

// ---------------------------------------------------------------------------
// Command handlers
// ---------------------------------------------------------------------------

async fn cmd_publish(config_path: Option<&Path>, args: PublishArgs) -> Result<()> {
    let config = load_config(config_path)?;

    let mut feeds = config.feeds.clone();
    feeds.extend(args.feeds);

    let unmapped = if args.skip_unmapped {
        UnmappedPolicy::Skip
    } else {
        config.defaults.unmapped_categories
    };

    let run_config = PublishRunConfig {
        manifests_dir: args.manifests_dir,
        blob_assets_dir: args.blob_assets_dir,
        package_assets_dir: args.package_assets_dir,
        build_id: args.build_id,
        api_endpoint: args.api_endpoint,
        api_token: args.api_token,
        feeds,
        unmapped,
        manifest_extension: config.defaults.manifest_extension.clone(),
    };

    info!(
        build_id = run_config.build_id,
        feeds = run_config.feeds.len(),
        dry_run = args.dry_run,
        "publishing build artifacts"
    );

    let reporter = CliProgress::new();

    let result = if args.dry_run {
        pipeline::publish_all(&run_config, &DryRunPublisher, &reporter).await
    } else {
        let publisher = HttpPublisher::new(&PublisherOptions {
            timeout_secs: config.defaults.timeout_secs,
        })?;
        pipeline::publish_all(&run_config, &publisher, &reporter).await
    };
    reporter.clear();
    let result = result?;

    print_summary(&result, args.dry_run);
    Ok(())
}

fn print_summary(result: &PublishRunResult, dry_run: bool) {
    println!();
    if dry_run {
        println!("  Dry run complete, nothing was uploaded.");
    } else {
        println!("  Artifacts published successfully!");
    }
    println!("  Run:       {}", result.run_id);
    println!("  Started:   {}", result.started_at.to_rfc3339());

    for report in &result.manifests {
        println!();
        println!("  {} ({})", report.name, report.path.display());
        for group in &report.summary.groups {
            println!(
                "    {:<8} {:<14} {:>4} artifact(s) -> {}",
                group.kind, group.category, group.artifacts, group.feed_url
            );
        }
        for category in &report.skipped {
            println!("    skipped  {category} (no feed configured)");
        }
    }

    println!();
    println!("  Artifacts: {}", result.artifact_count());
    println!("  Time:      {:.1}s", result.elapsed.as_secs_f64());
    println!();
}

fn cmd_classify(manifest: &Path) -> Result<()> {
    if !manifest.is_file() {
        return Err(eyre!("manifest '{}' does not exist", manifest.display()));
    }

    let groups = pipeline::classify_manifest_file(manifest)?;
    info!(
        manifest = %manifest.display(),
        categories = groups.categories().len(),
        "manifest classified"
    );
    println!("{}", serde_json::to_string_pretty(&groups)?);
    Ok(())
}

fn cmd_config_init(path: Option<&Path>) -> Result<()> {
    let path = path.unwrap_or(Path::new(DEFAULT_CONFIG_FILE));
    let written = init_config(path)?;
    println!("Config initialized at: {}", written.display());
    Ok(())
}

fn cmd_config_show(config_path: Option<&Path>) -> Result<()> {
    let mut config: AppConfig = load_config(config_path)?;
    for feed in &mut config.feeds {
        if feed.token.is_some() {
            feed.token = Some("<redacted>".into());
        }
    }
    let toml_str = toml::to_string_pretty(&config)?;
    println!("{toml_str}");
    Ok(())
}

// ---------------------------------------------------------------------------
// CLI progress reporter
// ---------------------------------------------------------------------------

/// CLI progress reporter using an indicatif spinner.
struct CliProgress {
    spinner: ProgressBar,
}

impl CliProgress {
    fn new() -> Self {
        let spinner = ProgressBar::new_spinner();
        let style = ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner())
            .tick_strings(&["⠋", "⠙", "⠹", "⠸", "⠼", "⠴", "⠦", "⠧", "⠇", "⠏"]);
        spinner.set_style(style);
        spinner.enable_steady_tick(std::time::Duration::from_millis(80));
        Self { spinner }
    }

    fn clear(&self) {
        self.spinner.finish_and_clear();
    }
}

impl ProgressReporter for CliProgress {
    fn phase(&self, name: &str) {
        self.spinner.set_message(name.to_string());
    }

    fn manifest_published(&self, path: &Path, current: usize, total: usize) {
        self.spinner
            .set_message(format!("Published [{current}/{total}] {}", path.display()));
    }

    fn done(&self, _result: &PublishRunResult) {
        self.spinner.finish_and_clear();
    }
}
