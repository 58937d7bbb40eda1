//! xaml-lint CLI entry point

use clap::Parser;
use log::debug;
use miette::{IntoDiagnostic, Result};
use std::io::IsTerminal;
use std::path::PathBuf;
use std::process::ExitCode;
use xaml_lint::config::parse_override;
use xaml_lint::output;
use xaml_lint::{CheckRegistry, CheckRunner, CliOptions, Config, ProjectLoader, PropertyOverrides};

#[derive(Parser, Debug)]
#[command(name = "xaml-lint")]
#[command(author, version, about = "A linter for XAML automation workflow projects", long_about = None)]
struct Cli {
    /// Project directory or project.json path
    #[arg(default_value = ".")]
    path: PathBuf,

    /// Output format
    #[arg(short, long, value_enum, default_value = "text")]
    format: OutputFormat,

    /// Config file path (default: auto-detect .xamllintrc.json)
    #[arg(short, long, env = "XAML_LINT_CONFIG")]
    config: Option<PathBuf>,

    /// Enable specific rule (can be used multiple times)
    #[arg(short, long = "rule", value_name = "RULE")]
    rules: Vec<String>,

    /// Disable specific rule (can be used multiple times)
    #[arg(short, long = "ignore", value_name = "RULE")]
    ignore: Vec<String>,

    /// Set a rule property for this run (can be used multiple times)
    #[arg(long = "set", value_name = "RULE.PROPERTY=VALUE")]
    set: Vec<String>,

    /// List available rules and exit
    #[arg(long)]
    list_rules: bool,

    /// Disable colored output
    #[arg(long)]
    no_color: bool,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,
}

#[derive(clap::ValueEnum, Clone, Debug, Default)]
enum OutputFormat {
    #[default]
    Text,
    Json,
}

fn main() -> ExitCode {
    match run() {
        Ok(code) => code,
        Err(e) => {
            eprintln!("Error: {e:?}");
            ExitCode::from(2)
        }
    }
}

fn run() -> Result<ExitCode> {
    let cli = Cli::parse();

    let default_filter = if cli.verbose { "debug" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();

    let registry = CheckRegistry::builtin().into_diagnostic()?;

    if cli.list_rules {
        print!("{}", output::format_rules(&registry));
        return Ok(ExitCode::from(0));
    }

    let mut config = load_config(&cli)?;

    let mut properties = PropertyOverrides::new();
    for text in &cli.set {
        let (rule, property, value) = parse_override(text).into_diagnostic()?;
        properties.set(rule, property, value);
    }

    config.merge_cli(CliOptions {
        enabled_rules: if cli.rules.is_empty() { None } else { Some(cli.rules.clone()) },
        disabled_rules: cli.ignore.clone(),
        properties,
    });

    let files = ProjectLoader::new(&cli.path)
        .with_config(&config)
        .load()
        .into_diagnostic()?;

    if cli.verbose {
        eprintln!(
            "Loaded {} workflow file(s) from {}",
            files.workflows.len(),
            files.root.display()
        );
    }

    let mut runner = CheckRunner::new(&registry, config);
    let report = runner
        .run_at(&files.descriptor_identifier, &files.descriptor, files.workflows)
        .into_diagnostic()?;

    match cli.format {
        OutputFormat::Text => {
            let color = !cli.no_color && std::io::stdout().is_terminal();
            output::print_text(&report, color);
        }
        OutputFormat::Json => {
            output::print_json(&report).into_diagnostic()?;
        }
    }

    // Exit codes
    if report.is_clean() {
        Ok(ExitCode::from(0))
    } else {
        Ok(ExitCode::from(1))
    }
}

/// Explicit config file, else the nearest one above the project directory
fn load_config(cli: &Cli) -> Result<Config> {
    if let Some(ref config_path) = cli.config {
        return Config::from_file(config_path).into_diagnostic();
    }

    match Config::discover(&cli.path) {
        Ok(Some((path, cfg))) => {
            debug!("Using config: {}", path.display());
            Ok(cfg)
        }
        Ok(None) => Ok(Config::default()),
        Err(e) => Err(e).into_diagnostic(),
    }
}
