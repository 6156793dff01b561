use annogen_cli::{load_config, run, RunOptions, RunReport};
use annogen_core::LoggingConfig;
use anyhow::Result;
use clap::{Parser, ValueEnum};
use colored::Colorize;
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[derive(Parser)]
#[command(name = "annogen")]
#[command(about = "Annogen - generate Go constructors, builders and mappers from marker comments", long_about = None)]
#[command(version)]
struct Cli {
    /// Root of the Go module to scan
    #[arg(default_value = ".")]
    project_root: PathBuf,

    /// Configuration file (defaults to <PROJECT_ROOT>/.annogen.toml)
    #[arg(short, long, env = "ANNOGEN_CONFIG")]
    config: Option<PathBuf>,

    /// Report what would be generated without writing files
    #[arg(long)]
    dry_run: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Worker threads (0 = one per core)
    #[arg(short = 'j', long)]
    threads: Option<usize>,

    /// Output format (json, pretty)
    #[arg(short, long, default_value = "pretty")]
    output: OutputFormat,
}

#[derive(Clone, ValueEnum)]
enum OutputFormat {
    Json,
    Pretty,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    match execute(&cli) {
        Ok(report) => {
            print_report(&cli.output, &report)?;
            Ok(())
        }
        Err(e) => {
            eprintln!("{} {:#}", "Error:".red().bold(), e);
            std::process::exit(1);
        }
    }
}

fn execute(cli: &Cli) -> Result<RunReport> {
    let options = RunOptions {
        project_root: cli.project_root.clone(),
        config: cli.config.clone(),
        dry_run: cli.dry_run,
        threads: cli.threads,
    };
    let config = load_config(&options)?;
    init_tracing(&config.logging, cli.verbose);

    run(&options.project_root, &config)
}

fn init_tracing(logging: &LoggingConfig, verbose: bool) {
    let level = if verbose { "debug" } else { logging.level.as_str() };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));
    let compact = logging.format == "compact";

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(compact.then(|| {
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr)
        }))
        .with((!compact).then(|| tracing_subscriber::fmt::layer().with_writer(std::io::stderr)))
        .try_init();
}

fn print_report(format: &OutputFormat, report: &RunReport) -> Result<()> {
    match format {
        OutputFormat::Json => {
            println!("{}", serde_json::to_string_pretty(report)?);
        }
        OutputFormat::Pretty => print_pretty(report),
    }
    Ok(())
}

fn print_pretty(report: &RunReport) {
    println!(
        "{}: {} files, {} declarations",
        "Scanned".cyan().bold(),
        report.files_scanned.to_string().yellow(),
        report.declarations.to_string().yellow()
    );

    if report.artifacts.is_empty() {
        println!("{}", "No annotations found; nothing generated".dimmed());
        return;
    }

    for artifact in &report.artifacts {
        let status = if report.dry_run {
            "would write".yellow()
        } else if artifact.written {
            "written".green()
        } else {
            "unchanged".dimmed()
        };
        println!(
            "  {} {} ({} bytes)",
            status,
            artifact.path.display(),
            artifact.bytes
        );
    }

    println!(
        "{} in {}ms",
        "Done".green().bold(),
        report.elapsed_ms.to_string().yellow()
    );
}
