use clap::{Args, Parser, Subcommand};
use reporter::summary::EXIT_OK;
use reporter::{
    open_report, ConfigError, ConfigOverrides, ConfigResult, IdentifierResolver, ReportError,
    ReportFileGuard, ReportFormat, ReportResult, ReporterConfig, RunReporter, SessionSummary,
};
use run_client::HttpRunService;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tool_setup::ToolSetup;
use tracing::{debug, error, info, warn};
use tracing_subscriber::EnvFilter;

static TOOL_SETUP: ToolSetup = ToolSetup::new();

#[derive(Parser)]
#[command(name = "testrun-report")]
#[command(about = "Report local test results to a remote test-management run")]
struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    verbose: bool,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Args)]
struct ConfigArgs {
    /// TOML configuration file
    #[arg(short, long, env = "TESTRUN_REPORT_CONFIG")]
    config: Option<PathBuf>,
    /// API token for the test-management service
    #[arg(long, env = "TESTINY_TOKEN", hide_env_values = true)]
    api_token: Option<String>,
    /// Project the run is created in
    #[arg(long, env = "TESTINY_PROJECT_ID")]
    project_id: Option<String>,
    /// Service base URL
    #[arg(long, env = "TESTINY_BASE_URL")]
    base_url: Option<String>,
}

#[derive(Subcommand)]
enum Commands {
    /// Create a run, submit every resolvable result and close the run
    Report {
        /// Test report written by the test runner
        report: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        /// Report format (detected from the file extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
        /// Run title template; `{timestamp}` is replaced with the local time
        #[arg(short, long)]
        title: Option<String>,
        /// Do not delete the report file afterwards
        #[arg(long)]
        keep_report: bool,
        /// Also write the session summary as JSON
        #[arg(long)]
        summary_json: Option<PathBuf>,
    },
    /// Validate the configuration without contacting the service
    CheckConfig {
        #[command(flatten)]
        config: ConfigArgs,
    },
    /// Show how each test in a report resolves, without contacting the service
    Resolve {
        /// Test report written by the test runner
        report: PathBuf,
        #[command(flatten)]
        config: ConfigArgs,
        /// Report format (detected from the file extension if omitted)
        #[arg(short, long, value_enum)]
        format: Option<ReportFormat>,
    },
}

impl ConfigArgs {
    fn load(self, run_title: Option<String>, keep_report: bool) -> ConfigResult<ReporterConfig> {
        let mut config = ReporterConfig::load_optional(self.config.as_deref())?;
        config.apply_overrides(ConfigOverrides {
            api_token: self.api_token,
            project_id: self.project_id,
            base_url: self.base_url,
            run_title,
            keep_report,
        });
        Ok(config)
    }
}

#[tokio::main]
async fn main() -> ExitCode {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_writer(std::io::stderr)
        .init();

    let result = match cli.command {
        Commands::Report {
            report,
            config,
            format,
            title,
            keep_report,
            summary_json,
        } => {
            run_report(
                &report,
                config,
                format,
                title,
                keep_report,
                summary_json.as_deref(),
            )
            .await
        }
        Commands::CheckConfig { config } => check_config(config),
        Commands::Resolve {
            report,
            config,
            format,
        } => resolve_report(&report, config, format),
    };

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            error!("{}", e);
            ExitCode::from(e.exit_code())
        }
    }
}

async fn run_report(
    report: &Path,
    args: ConfigArgs,
    format: Option<ReportFormat>,
    title: Option<String>,
    keep_report: bool,
    summary_json: Option<&Path>,
) -> ReportResult<u8> {
    // held from the start so the report is removed on every exit path
    let mut guard = ReportFileGuard::new(report, !keep_report);

    let config = args.load(title, keep_report)?;
    if !config.remove_report {
        guard.keep();
    }
    config.validate()?;

    if let Some(tool) = &config.required_tool {
        let status = TOOL_SETUP.ensure_once(tool)?;
        info!(program = %tool.program, status = ?status, "required tool ready");
    }

    let source = open_report(guard.path(), format, config.property_keys());
    let outcomes = source.outcomes().map_err(|e| ReportError::Source {
        origin: source.describe(),
        source: e,
    })?;
    info!(count = outcomes.len(), source = %source.describe(), "loaded test outcomes");

    let service = HttpRunService::new(config.service.clone()).map_err(|e| {
        ReportError::Configuration(ConfigError::Invalid {
            message: e.to_string(),
        })
    })?;
    let fail_on_submission_errors = config.fail_on_submission_errors;
    let mut reporter = RunReporter::new(service, config)?;

    let result = reporter.run_session(&outcomes).await;
    let summary = match &result {
        Ok(summary) => Some(summary),
        Err(e) => e.summary(),
    };
    if let Some(summary) = summary {
        println!("{}", summary);
        if let Some(path) = summary_json {
            write_summary(path, summary);
        }
    }

    let summary = result?;
    Ok(summary.exit_code(fail_on_submission_errors))
}

fn write_summary(path: &Path, summary: &SessionSummary) {
    let written = serde_json::to_string_pretty(summary)
        .map_err(|e| e.to_string())
        .and_then(|json| std::fs::write(path, json).map_err(|e| e.to_string()));
    match written {
        Ok(()) => debug!(path = %path.display(), "wrote session summary"),
        Err(e) => warn!(path = %path.display(), error = %e, "failed to write session summary"),
    }
}

fn check_config(args: ConfigArgs) -> ReportResult<u8> {
    let config = args.load(None, false)?;
    config.validate()?;
    let resolver = IdentifierResolver::from_config(&config)?;

    println!("Configuration OK");
    println!("  service:    {}", config.service.base_url);
    println!("  project:    {}", config.project_id.trim());
    println!("  run title:  {}", config.run_title);
    println!("  mappings:   {}", resolver.map().len());
    if let Some(tool) = &config.required_tool {
        println!("  requires:   {}", tool.program);
    }
    Ok(EXIT_OK)
}

fn resolve_report(
    report: &Path,
    args: ConfigArgs,
    format: Option<ReportFormat>,
) -> ReportResult<u8> {
    let config = args.load(None, true)?;
    config.validate_local()?;
    let resolver = IdentifierResolver::from_config(&config)?;

    let source = open_report(report, format, config.property_keys());
    let outcomes = source.outcomes().map_err(|e| ReportError::Source {
        origin: source.describe(),
        source: e,
    })?;

    let mut unresolved = 0;
    for outcome in &outcomes {
        let resolution = resolver.resolve(outcome);
        match resolution.external_id() {
            Some(id) => println!(
                "{}\t{}\t{}\t{} ({})",
                outcome.name,
                outcome.status,
                config.status_mapping.remote_status(outcome.status),
                id,
                resolution.origin()
            ),
            None => {
                unresolved += 1;
                println!("{}\t{}\t-\tskipped", outcome.name, outcome.status);
            }
        }
    }
    println!(
        "{} tests, {} resolved, {} skipped",
        outcomes.len(),
        outcomes.len() - unresolved,
        unresolved
    );
    Ok(EXIT_OK)
}
