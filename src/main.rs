#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::doc_markdown,
    clippy::missing_errors_doc,
    clippy::module_name_repetitions,
    clippy::too_many_lines,
    clippy::uninlined_format_args
)]

use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use pageforge::codegen;
use pageforge::config::Config;
use pageforge::driver::{DriverAction, PageDriver, WebDriverSession};
use pageforge::extract;
use pageforge::proposal::{build_prompt, parse_proposals, PageAnalysis};
use pageforge::session::{to_proposals, SessionRecorder};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, EnvFilter};

/// `PageForge` - turn web pages into agent-invocable tools.
#[derive(Parser, Debug)]
#[command(name = "pageforge")]
#[command(version)]
#[command(about = "Extract page surfaces, synthesize tool proposals, generate tool code.", long_about = None)]
struct Cli {
    /// Path to pageforge.toml (defaults to ./pageforge.toml).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Open a page, extract its DOM and script surface, and print the
    /// analysis prompt for the reasoning agent
    Analyze {
        /// Page URL to analyze
        url: String,

        /// Scenario text steering the analysis
        #[arg(long, default_value = "")]
        scenario: String,

        /// Write the prompt to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Parse an agent reply (fenced or bare JSON) into normalized proposals
    ParseProposals {
        /// File holding the reply text
        file: PathBuf,

        /// Write normalized proposal JSON to a file instead of stdout
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Generate one executable tool module per proposal
    Generate {
        /// Proposal JSON file (or an agent reply containing one)
        proposals: PathBuf,

        /// Output directory (defaults to [output].tools_dir)
        #[arg(long)]
        out: Option<PathBuf>,
    },

    /// Record an interactive browser session
    Session {
        #[command(subcommand)]
        command: SessionCommands,
    },
}

#[derive(Subcommand, Debug)]
enum SessionCommands {
    /// Open a browser, navigate, and initialize the session directory
    Start {
        /// Session directory
        #[arg(long)]
        dir: PathBuf,

        /// Starting page URL
        url: String,

        /// Goal text recorded with the session
        #[arg(long, default_value = "")]
        goal: String,
    },

    /// Perform exactly one action and append it to the log
    Step {
        /// Session directory
        #[arg(long)]
        dir: PathBuf,

        /// Action kind: click, fill, select, hover, scroll, wait, navigate
        #[arg(long)]
        action: String,

        /// Element locator (CSS, `text=`, or `label=`)
        #[arg(long)]
        locator: Option<String>,

        /// Value for fill/select actions
        #[arg(long)]
        value: Option<String>,

        /// Milliseconds for wait actions
        #[arg(long)]
        ms: Option<u64>,

        /// URL for navigate actions
        #[arg(long)]
        url: Option<String>,

        /// Tool name to tag this action with
        #[arg(long)]
        tag: Option<String>,
    },

    /// Capture the current page image without touching the log
    Screenshot {
        /// Session directory
        #[arg(long)]
        dir: PathBuf,
    },

    /// Terminate the browser and derive tools from the action log
    Close {
        /// Session directory
        #[arg(long)]
        dir: PathBuf,

        /// Also generate executable tool modules from the derived tools
        #[arg(long)]
        generate: bool,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging - respects RUST_LOG env var, defaults to INFO.
    let subscriber = fmt::Subscriber::builder()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .finish();
    tracing::subscriber::set_global_default(subscriber)
        .context("setting default subscriber failed")?;

    let config_path = cli
        .config
        .unwrap_or_else(|| PathBuf::from("pageforge.toml"));
    let config = Config::load(&config_path)?;

    match cli.command {
        Commands::Analyze { url, scenario, out } => analyze(&config, &url, &scenario, out).await,
        Commands::ParseProposals { file, out } => parse_reply_file(&file, out),
        Commands::Generate { proposals, out } => generate(&config, &proposals, out),
        Commands::Session { command } => session(&config, command).await,
    }
}

async fn analyze(
    config: &Config,
    url: &str,
    scenario: &str,
    out: Option<PathBuf>,
) -> Result<()> {
    let session = WebDriverSession::connect(
        &config.driver.webdriver_url,
        config.driver.headless,
        config.driver.chrome_path.as_deref(),
    )
    .await?;

    let snapshot = session.navigate(url).await?;
    let dom = extract::extract(&snapshot, &config.extraction);
    let js = extract::scan(&session).await?;
    info!(
        elements = dom.element_count,
        globals = js.globals.len(),
        "Page surface extracted"
    );
    session.close().await;

    let analysis = PageAnalysis {
        url: snapshot.url.clone(),
        step_index: snapshot.step_index,
        dom,
        js,
    };
    let prompt = build_prompt(scenario, &[analysis]);

    match out {
        Some(path) => {
            std::fs::write(&path, prompt)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(path = %path.display(), "Prompt written");
        }
        None => println!("{prompt}"),
    }
    Ok(())
}

fn parse_reply_file(file: &PathBuf, out: Option<PathBuf>) -> Result<()> {
    let reply = std::fs::read_to_string(file)
        .with_context(|| format!("Failed to read {}", file.display()))?;
    let proposals = parse_proposals(&reply)?;
    let json = serde_json::to_string_pretty(&proposals)?;
    match out {
        Some(path) => {
            std::fs::write(&path, json)
                .with_context(|| format!("Failed to write {}", path.display()))?;
            info!(count = proposals.len(), path = %path.display(), "Proposals written");
        }
        None => println!("{json}"),
    }
    Ok(())
}

fn generate(config: &Config, proposals_file: &PathBuf, out: Option<PathBuf>) -> Result<()> {
    let raw = std::fs::read_to_string(proposals_file)
        .with_context(|| format!("Failed to read {}", proposals_file.display()))?;
    let proposals = parse_proposals(&raw)?;
    if proposals.is_empty() {
        bail!("No proposals found in {}", proposals_file.display());
    }
    let tools = codegen::generate(&proposals);
    let dir = out.unwrap_or_else(|| config.output.tools_dir.clone());
    codegen::write_all(&dir, &tools)?;
    Ok(())
}

async fn session(config: &Config, command: SessionCommands) -> Result<()> {
    match command {
        SessionCommands::Start { dir, url, goal } => {
            let recorder = SessionRecorder::new(dir, config.driver.clone());
            let state = recorder.start(&url, &goal).await?;
            println!("Session started at {}", state.current_url);
        }
        SessionCommands::Step {
            dir,
            action,
            locator,
            value,
            ms,
            url,
            tag,
        } => {
            let action = build_action(&action, locator, value, ms, url)?;
            let recorder = SessionRecorder::new(dir, config.driver.clone());
            let entry = recorder.step(action, tag).await?;
            if entry.success {
                println!("Step {} recorded ({})", entry.index, entry.result_url);
            } else {
                println!(
                    "Step {} failed: {}",
                    entry.index,
                    entry.error.as_deref().unwrap_or("unknown error")
                );
            }
        }
        SessionCommands::Screenshot { dir } => {
            let recorder = SessionRecorder::new(dir, config.driver.clone());
            let path = recorder.screenshot().await?;
            println!("Screenshot written to {}", path.display());
        }
        SessionCommands::Close { dir, generate } => {
            let recorder = SessionRecorder::new(dir, config.driver.clone());
            let tools = recorder.close().await?;
            println!("Derived {} tool(s)", tools.len());
            if generate {
                let proposals = to_proposals(&tools);
                let units = codegen::generate(&proposals);
                codegen::write_all(&config.output.tools_dir, &units)?;
            }
        }
    }
    Ok(())
}

fn build_action(
    kind: &str,
    locator: Option<String>,
    value: Option<String>,
    ms: Option<u64>,
    url: Option<String>,
) -> Result<DriverAction> {
    let need_locator = |locator: Option<String>| -> Result<String> {
        locator.ok_or_else(|| anyhow::anyhow!("--locator is required for '{kind}' actions"))
    };
    let need_value = |value: Option<String>| -> Result<String> {
        value.ok_or_else(|| anyhow::anyhow!("--value is required for '{kind}' actions"))
    };

    Ok(match kind {
        "click" => DriverAction::Click {
            locator: need_locator(locator)?,
        },
        "fill" => DriverAction::Fill {
            locator: need_locator(locator)?,
            value: need_value(value)?,
        },
        "select" => DriverAction::Select {
            locator: need_locator(locator)?,
            value: need_value(value)?,
        },
        "hover" => DriverAction::Hover {
            locator: need_locator(locator)?,
        },
        "scroll" => DriverAction::Scroll {
            locator: need_locator(locator)?,
        },
        "wait" => DriverAction::Wait {
            ms: ms.ok_or_else(|| anyhow::anyhow!("--ms is required for 'wait' actions"))?,
        },
        "navigate" => DriverAction::Navigate {
            url: url.ok_or_else(|| anyhow::anyhow!("--url is required for 'navigate' actions"))?,
        },
        other => bail!("Unknown action '{other}' (expected click, fill, select, hover, scroll, wait, or navigate)"),
    })
}
