use std::io::IsTerminal;
use std::path::PathBuf;
use std::sync::Arc;

use clap::{CommandFactory, Parser, Subcommand, ValueEnum};
use miette::{Context, IntoDiagnostic, Result};
use tracing_subscriber::EnvFilter;

use warden_core::{JiraConfig, OutputFormat, Severity, WardenConfig, WardenError};
use warden_github::{GithubSession, PullRequestSink, PullRequestSource};
use warden_jira::{IssueTracker, JiraSession};
use warden_pipeline::{run_review, Boundaries, Connector};
use warden_review::{api_key_env_var, ChatModel, LlmClient};

#[derive(Parser)]
#[command(
    name = "warden",
    version,
    about = "AI pull request review that files the tickets it finds",
    long_about = "Warden reviews GitHub pull requests end to end: it fetches the changed\n\
                   files, asks an LLM for real bugs and suggested tests, files a tracker\n\
                   ticket per finding, and writes the results back to the pull request.\n\n\
                   Examples:\n  \
                     warden review https://github.com/octocat/hello-world/pull/42\n  \
                     warden review <pr-url> --dry-run       Analyze without side effects\n  \
                     warden review <pr-url> --fail-on high  Fail CI on serious findings\n  \
                     warden doctor                          Check setup and environment"
)]
struct Cli {
    #[command(subcommand)]
    command: Option<Command>,

    /// Path to configuration file (default: .warden.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Output format
    #[arg(
        long,
        global = true,
        default_value = "text",
        long_help = "Output format for command results.\n\n\
                       Formats:\n  \
                         text      Human-readable run summary (default)\n  \
                         json      Machine-readable JSON with camelCase keys\n  \
                         markdown  GitHub-flavored Markdown"
    )]
    format: OutputFormat,

    /// Enable verbose output
    #[arg(long, short, global = true)]
    verbose: bool,

    /// When to use colors
    #[arg(long, global = true, default_value = "auto")]
    color: ColorChoice,
}

#[derive(Subcommand)]
enum Command {
    /// Review a GitHub pull request end to end
    #[command(
        long_about = "Review a GitHub pull request end to end.\n\n\
        Fetches the changed files, sends the diffs to the configured LLM for\n\
        analysis, files a tracker ticket per bug found, and writes the results\n\
        back to the pull request: a summary comment, generated test files, and\n\
        a review label.\n\n\
        Examples:\n  warden review https://github.com/octocat/hello-world/pull/42\n  warden review <pr-url> --dry-run\n  warden review <pr-url> --fail-on high --format json"
    )]
    Review {
        /// Pull request URL (https://github.com/owner/repo/pull/123)
        pr_url: String,

        /// Analyze only: skip tickets and write-back
        #[arg(
            long,
            long_help = "Analyze the pull request without side effects.\n\nSkips ticket creation and every write-back operation. The report still\nshows what was found and what would have been written."
        )]
        dry_run: bool,

        /// Exit with non-zero code if findings meet severity threshold
        #[arg(
            long,
            long_help = "Exit with non-zero code if findings of this severity or higher are found.\n\nSeverity ranking: critical > high > medium > low.\nUseful in CI pipelines to fail builds on serious issues."
        )]
        fail_on: Option<Severity>,
    },
    /// Create a default .warden.toml configuration file
    #[command(long_about = "Create a default .warden.toml configuration file.\n\n\
        Generates a commented-out template with all available options.\n\
        Fails if .warden.toml already exists.")]
    Init,
    /// Check your Warden setup and environment
    #[command(long_about = "Check your Warden setup and environment.\n\n\
        Runs diagnostics for the config file, LLM API key, GitHub token, and\n\
        Jira credentials. Use --format json for machine-readable output.")]
    Doctor,
    /// Generate shell completion scripts
    #[command(hide = true)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: clap_complete::Shell,
    },
}

#[derive(Clone, PartialEq, Eq, ValueEnum)]
enum ColorChoice {
    /// Auto-detect based on terminal
    Auto,
    /// Always use colors
    Always,
    /// Never use colors
    Never,
}

fn print_welcome(use_color: bool) {
    let version = env!("CARGO_PKG_VERSION");

    if use_color {
        // Bold/bright header
        println!("\x1b[1m\x1b[33m🛡️\x1b[0m \x1b[1mwarden\x1b[0m v{version} — AI pull request review that files the tickets it finds\n");

        println!("Quick start:");
        println!("  \x1b[36mwarden init\x1b[0m                   Create a .warden.toml config file");
        println!("  \x1b[36mwarden review <pr-url>\x1b[0m        Review a pull request end to end");
        println!("  \x1b[36mwarden doctor\x1b[0m                 Check your setup and environment\n");

        println!("All commands:");
        println!("  \x1b[32mreview\x1b[0m    AI-powered PR review (tickets + write-back)");
        println!("  \x1b[32mdoctor\x1b[0m    Check your setup and environment");
        println!("  \x1b[32minit\x1b[0m      Create default configuration\n");
    } else {
        println!("warden v{version} — AI pull request review that files the tickets it finds\n");

        println!("Quick start:");
        println!("  warden init                   Create a .warden.toml config file");
        println!("  warden review <pr-url>        Review a pull request end to end");
        println!("  warden doctor                 Check your setup and environment\n");

        println!("All commands:");
        println!("  review    AI-powered PR review (tickets + write-back)");
        println!("  doctor    Check your setup and environment");
        println!("  init      Create default configuration\n");
    }

    println!("Run 'warden <command> --help' for details.");
}

#[derive(serde::Serialize)]
struct CheckResult {
    name: &'static str,
    status: &'static str,
    detail: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    hint: Option<String>,
}

impl CheckResult {
    fn pass(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "pass",
            detail: detail.into(),
            hint: None,
        }
    }

    fn fail(name: &'static str, detail: impl Into<String>, hint: impl Into<String>) -> Self {
        Self {
            name,
            status: "fail",
            detail: detail.into(),
            hint: Some(hint.into()),
        }
    }

    fn info(name: &'static str, detail: impl Into<String>) -> Self {
        Self {
            name,
            status: "info",
            detail: detail.into(),
            hint: None,
        }
    }

    fn symbol(&self) -> &'static str {
        match self.status {
            "pass" => "\u{2713}",
            "fail" => "\u{2717}",
            _ => "~",
        }
    }

    fn colored_symbol(&self) -> String {
        match self.status {
            "pass" => "\x1b[32m\u{2713}\x1b[0m".into(),
            "fail" => "\x1b[31m\u{2717}\x1b[0m".into(),
            _ => "\x1b[33m~\x1b[0m".into(),
        }
    }
}

fn setting(value: &Option<String>, env_var: &str) -> Option<String> {
    value
        .clone()
        .filter(|v| !v.trim().is_empty())
        .or_else(|| std::env::var(env_var).ok().filter(|v| !v.trim().is_empty()))
}

fn jira_configured(jira: &JiraConfig) -> bool {
    setting(&jira.base_url, "JIRA_BASE_URL").is_some()
        && setting(&jira.project_key, "JIRA_PROJECT_KEY").is_some()
        && setting(&jira.user_email, "JIRA_USER_EMAIL").is_some()
        && setting(&jira.api_token, "JIRA_API_TOKEN").is_some()
}

fn run_doctor(config: &WardenConfig, format: OutputFormat, use_color: bool) -> Result<()> {
    let mut checks: Vec<CheckResult> = Vec::new();

    // 1. Config file
    let config_path = std::path::Path::new(".warden.toml");
    if config_path.exists() {
        let pattern_count = config.review.skip_patterns.len();
        let detail = if pattern_count > 0 {
            format!(".warden.toml found ({pattern_count} skip patterns)")
        } else {
            ".warden.toml found".into()
        };
        checks.push(CheckResult::pass("config_file", detail));
    } else {
        checks.push(CheckResult::fail(
            "config_file",
            ".warden.toml not found",
            "run 'warden init' to create a default config",
        ));
    }

    // 2. LLM provider + API key
    let llm_provider = &config.llm.provider;
    let llm_model = &config.llm.model;
    let llm_env_var = api_key_env_var(llm_provider);
    checks.push(CheckResult::pass(
        "llm_provider",
        format!("{llm_provider} (model: {llm_model})"),
    ));
    if config.llm.api_key.is_some() {
        checks.push(CheckResult::pass("llm_api_key", "api_key set in config"));
    } else if std::env::var(&llm_env_var).is_ok() {
        checks.push(CheckResult::pass(
            "llm_api_key",
            format!("{llm_env_var} set"),
        ));
    } else if config.llm.base_url.is_some() {
        checks.push(CheckResult::info(
            "llm_api_key",
            "no API key (base_url set, assuming a key-less endpoint)",
        ));
    } else {
        checks.push(CheckResult::fail(
            "llm_api_key",
            format!("{llm_env_var} not set"),
            format!("export {llm_env_var}=... or set api_key in .warden.toml [llm]"),
        ));
    }

    // 3. GitHub token
    if config.github.token.is_some() {
        checks.push(CheckResult::pass("github_token", "token set in config"));
    } else if std::env::var("GITHUB_TOKEN").is_ok() {
        checks.push(CheckResult::pass("github_token", "GITHUB_TOKEN set"));
    } else {
        checks.push(CheckResult::fail(
            "github_token",
            "GITHUB_TOKEN not set",
            "export GITHUB_TOKEN=... (needed to fetch pull requests)",
        ));
    }

    // 4. Jira credentials
    if jira_configured(&config.jira) {
        let project = setting(&config.jira.project_key, "JIRA_PROJECT_KEY").unwrap_or_default();
        checks.push(CheckResult::pass(
            "jira_credentials",
            format!("configured (project {project})"),
        ));
    } else {
        checks.push(CheckResult::info(
            "jira_credentials",
            "not configured (tickets will be skipped)",
        ));
    }

    // Output
    match format {
        OutputFormat::Json => {
            let version = env!("CARGO_PKG_VERSION");
            let json = serde_json::json!({
                "version": version,
                "checks": checks,
            });
            println!("{}", serde_json::to_string_pretty(&json).into_diagnostic()?);
        }
        _ => {
            let version = env!("CARGO_PKG_VERSION");
            println!("Warden v{version} — Environment Check\n");

            for check in &checks {
                let sym = if use_color {
                    check.colored_symbol()
                } else {
                    check.symbol().to_string()
                };
                // Pad the name for alignment
                let label = check.name.replace('_', " ");
                println!("  {sym} {label:<20} {}", check.detail);
                if let Some(hint) = &check.hint {
                    println!("    hint: {hint}");
                }
            }

            let passed = checks.iter().filter(|c| c.status == "pass").count();
            let failed = checks.iter().filter(|c| c.status == "fail").count();
            let info = checks.iter().filter(|c| c.status == "info").count();
            println!("\n{passed} checks passed, {failed} failed, {info} info");
        }
    }

    Ok(())
}

fn log_filter(verbose: bool) -> String {
    if !verbose {
        return "warn".into();
    }
    let crates = [
        "warden",
        "warden_core",
        "warden_flow",
        "warden_github",
        "warden_review",
        "warden_jira",
        "warden_pipeline",
    ];
    let directives: Vec<String> = crates.iter().map(|c| format!("{c}=debug")).collect();
    format!("warn,{}", directives.join(","))
}

fn init_tracing(verbose: bool) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_filter(verbose)));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

const DEFAULT_CONFIG: &str = r#"# Warden Configuration
# See: https://github.com/wardenhq/warden

[llm]
# OpenAI-compatible chat completions endpoint
# provider = "openai"
# model = "gpt-4o"
# api_key = "sk-..."
# base_url = "http://localhost:11434"
# timeout_secs = 120

[github]
# Token falls back to the GITHUB_TOKEN environment variable
# token = "ghp_..."
# api_url = "https://api.github.com"
# timeout_secs = 30
# max_retries = 2
# retry_backoff_ms = 500

[jira]
# Credentials fall back to JIRA_* environment variables
# base_url = "https://example.atlassian.net"
# project_key = "OPS"
# user_email = "you@example.com"
# api_token = "..."
# issue_type = "Bug"

[review]
# max_patch_chars = 2000
# skip_patterns = ["*.lock", "*.min.js", "vendor/**"]
# label = "warden-reviewed"
# test_dir = "tests/warden"
"#;

#[tokio::main]
async fn main() -> Result<()> {
    miette::set_hook(Box::new(|_| {
        Box::new(
            miette::MietteHandlerOpts::new()
                .terminal_links(true)
                .build(),
        )
    }))
    .expect("miette handler");
    human_panic::setup_panic!();

    let cli = Cli::parse();

    init_tracing(cli.verbose);

    let config = match &cli.config {
        Some(path) => WardenConfig::from_file(path)
            .into_diagnostic()
            .wrap_err(format!("loading {}", path.display()))?,
        None => {
            let default_path = std::path::Path::new(".warden.toml");
            if default_path.exists() {
                WardenConfig::from_file(default_path)
                    .into_diagnostic()
                    .wrap_err("loading .warden.toml")?
            } else {
                WardenConfig::default()
            }
        }
    };

    let use_color = match cli.color {
        ColorChoice::Always => true,
        ColorChoice::Never => false,
        ColorChoice::Auto => std::io::stdout().is_terminal() && std::env::var("NO_COLOR").is_err(),
    };

    match cli.command {
        None => {
            print_welcome(use_color);
            return Ok(());
        }
        Some(Command::Review {
            ref pr_url,
            dry_run,
            fail_on,
        }) => {
            // Hint: missing GitHub token, checked before opening any session
            if config.github.token.is_none() && std::env::var("GITHUB_TOKEN").is_err() {
                miette::bail!(miette::miette!(
                    help = "export GITHUB_TOKEN=... or set token in your .warden.toml under [github]",
                    "No GitHub token configured"
                ));
            }

            // Hint: missing API key, checked before creating the LLM client
            let llm_env_var = api_key_env_var(&config.llm.provider);
            if config.llm.api_key.is_none()
                && std::env::var(&llm_env_var).is_err()
                && config.llm.base_url.is_none()
            {
                miette::bail!(miette::miette!(
                    help = "Set {llm_env_var} or add api_key in your .warden.toml under [llm]",
                    "No API key configured for LLM provider '{}'",
                    config.llm.provider
                ));
            }

            if !dry_run && !jira_configured(&config.jira) {
                eprintln!("Jira credentials not configured; tickets will be skipped.");
            }

            let model: Arc<dyn ChatModel> =
                Arc::new(LlmClient::new(&config.llm).into_diagnostic()?);

            let source_connect: Connector<Arc<dyn PullRequestSource>> = {
                let github = config.github.clone();
                Arc::new(move || {
                    Ok(Arc::new(GithubSession::new(&github)?) as Arc<dyn PullRequestSource>)
                })
            };

            let tracker_connect: Connector<Arc<dyn IssueTracker>> = if dry_run {
                Arc::new(|| Err(WardenError::Config("dry run, tickets skipped".into())))
            } else {
                let jira = config.jira.clone();
                Arc::new(move || Ok(Arc::new(JiraSession::new(&jira)?) as Arc<dyn IssueTracker>))
            };

            let sink_connect: Connector<Arc<dyn PullRequestSink>> = if dry_run {
                Arc::new(|| Err(WardenError::Config("dry run, write-back skipped".into())))
            } else {
                let github = config.github.clone();
                Arc::new(move || {
                    Ok(Arc::new(GithubSession::new(&github)?) as Arc<dyn PullRequestSink>)
                })
            };

            let boundaries = Boundaries {
                source_connect,
                model,
                tracker_connect,
                sink_connect,
            };

            let is_tty = std::io::stderr().is_terminal();
            let spinner = if is_tty {
                let pb = indicatif::ProgressBar::new_spinner();
                pb.set_style(
                    indicatif::ProgressStyle::with_template("{spinner:.cyan} {msg} ({elapsed})")
                        .unwrap(),
                );
                pb.set_message("Reviewing pull request...");
                pb.enable_steady_tick(std::time::Duration::from_millis(120));
                Some(pb)
            } else {
                None
            };

            let report = run_review(pr_url, boundaries, &config)
                .await
                .inspect_err(|_e| {
                    if let Some(pb) = &spinner {
                        pb.finish_with_message("Failed");
                    }
                })
                .into_diagnostic()?;

            if let Some(pb) = spinner {
                pb.finish_with_message("Done");
            }

            match cli.format {
                OutputFormat::Json => {
                    println!(
                        "{}",
                        serde_json::to_string_pretty(&report).into_diagnostic()?
                    );
                }
                OutputFormat::Markdown => {
                    print!("{}", report.to_markdown());
                }
                OutputFormat::Text => {
                    print!("{report}");
                }
            }

            if let Some(threshold) = fail_on {
                let has_findings = report
                    .findings
                    .iter()
                    .any(|f| f.severity.meets_threshold(threshold));
                if has_findings {
                    std::process::exit(1);
                }
            }
        }
        Some(Command::Init) => {
            let path = std::path::Path::new(".warden.toml");
            if path.exists() {
                miette::bail!(".warden.toml already exists");
            }
            std::fs::write(path, DEFAULT_CONFIG).into_diagnostic()?;
            println!("Created .warden.toml with default configuration");
        }
        Some(Command::Doctor) => {
            run_doctor(&config, cli.format, use_color)?;
        }
        Some(Command::Completions { shell }) => {
            let mut cmd = Cli::command();
            clap_complete::generate(shell, &mut cmd, "warden", &mut std::io::stdout());
        }
    }

    Ok(())
}
