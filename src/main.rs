use clap::{Parser, Subcommand};
use tokio_util::sync::CancellationToken;

use holdfast::browser::BrowserSession;
use holdfast::{
    Engine, Healer, HealerConfig, NodeSnapshot, ResolutionOutcome, Strategy, StrategyDescriptor,
    WaitPolicy,
};

/// holdfast: resilient locator resolution for web UI tests
#[derive(Parser)]
#[command(name = "holdfast", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Suggest stable replacements for a broken selector.
    Heal {
        /// Broken selector: css (".btn", "#id") or xpath ("//div[3]")
        selector: String,
        /// Path to a JSON array of element snapshots captured at failure time
        #[arg(long)]
        snapshots: std::path::PathBuf,
        /// Drop suggestions below this confidence
        #[arg(long)]
        min_confidence: Option<f64>,
    },
    /// Resolve a descriptor against a live page and print the diagnostic
    /// report as JSON.
    Resolve {
        /// Page to open
        #[arg(long)]
        url: String,
        /// Test-id strategy value
        #[arg(long)]
        test_id: Option<String>,
        /// ARIA role (used with --name)
        #[arg(long)]
        role: Option<String>,
        /// Accessible name (used with --role)
        #[arg(long)]
        name: Option<String>,
        /// Form label strategy value
        #[arg(long)]
        label: Option<String>,
        /// Text-content strategy value
        #[arg(long)]
        text: Option<String>,
        /// CSS fallback strategy
        #[arg(long)]
        css: Option<String>,
        /// XPath fallback strategy
        #[arg(long)]
        xpath: Option<String>,
        /// Resolution budget in milliseconds
        #[arg(long, default_value_t = 5000)]
        timeout_ms: u64,
        /// Run Chrome with a visible window (default: headless)
        #[arg(long)]
        headed: bool,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Heal {
            selector,
            snapshots,
            min_confidence,
        } => heal(&selector, &snapshots, min_confidence),
        Command::Resolve {
            url,
            test_id,
            role,
            name,
            label,
            text,
            css,
            xpath,
            timeout_ms,
            headed,
        } => {
            let descriptor =
                build_descriptor(test_id, role, name, label, text, css, xpath)?;
            resolve(&url, &descriptor, timeout_ms, !headed).await
        }
    }
}

fn heal(
    selector: &str,
    snapshots_path: &std::path::Path,
    min_confidence: Option<f64>,
) -> anyhow::Result<()> {
    let raw = std::fs::read_to_string(snapshots_path)?;
    let snapshots: Vec<NodeSnapshot> =
        serde_json::from_str(&raw).map_err(|e| anyhow::anyhow!("invalid snapshots JSON: {e}"))?;

    let broken = detect_strategy(selector);
    let healer = match min_confidence {
        Some(min_confidence) => Healer::with_config(HealerConfig {
            min_confidence,
            ..HealerConfig::default()
        }),
        None => Healer::new(),
    };

    let suggestions = healer.suggest(&broken, &snapshots);
    if suggestions.is_empty() {
        println!("No healing suggestions found");
        return Ok(());
    }

    println!("\nHealing Suggestions:\n");
    for (i, suggestion) in suggestions.iter().enumerate() {
        println!("{}. {}", i + 1, suggestion.replacement);
        println!("   Confidence: {:.0}%", suggestion.confidence * 100.0);
        println!("   Reason: {}\n", suggestion.reason);
    }
    Ok(())
}

/// Classify a raw selector string the way test authors write them.
fn detect_strategy(selector: &str) -> Strategy {
    if selector.starts_with("//") {
        Strategy::XPath(selector.to_string())
    } else {
        Strategy::Css(selector.to_string())
    }
}

#[allow(clippy::too_many_arguments)]
fn build_descriptor(
    test_id: Option<String>,
    role: Option<String>,
    name: Option<String>,
    label: Option<String>,
    text: Option<String>,
    css: Option<String>,
    xpath: Option<String>,
) -> anyhow::Result<StrategyDescriptor> {
    let mut strategies = Vec::new();
    if let Some(test_id) = test_id {
        strategies.push(Strategy::TestId(test_id));
    }
    match (role, name) {
        (Some(role), Some(name)) => strategies.push(Strategy::RoleLabel { role, name }),
        (None, None) => {}
        _ => anyhow::bail!("--role and --name must be given together"),
    }
    if let Some(label) = label {
        strategies.push(Strategy::Label(label));
    }
    if let Some(text) = text {
        strategies.push(Strategy::Text(text));
    }
    if let Some(css) = css {
        strategies.push(Strategy::Css(css));
    }
    if let Some(xpath) = xpath {
        strategies.push(Strategy::XPath(xpath));
    }
    StrategyDescriptor::new(strategies).map_err(|e| anyhow::anyhow!("{e}"))
}

async fn resolve(
    url: &str,
    descriptor: &StrategyDescriptor,
    timeout_ms: u64,
    headless: bool,
) -> anyhow::Result<()> {
    let session = BrowserSession::launch(headless).await?;
    session.open(url).await?;

    let engine = Engine::new(std::sync::Arc::new(session.provider()));
    let policy = WaitPolicy::new().with_timeout_ms(timeout_ms);

    // Ctrl-C aborts the wait loop instead of killing the process mid-report.
    let cancel = CancellationToken::new();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            signal_cancel.cancel();
        }
    });

    let outcome = engine.resolve(descriptor, &policy, &cancel).await;
    let report = engine.diagnose(&outcome).await;
    println!("{}", serde_json::to_string_pretty(&report)?);

    let found = matches!(outcome, ResolutionOutcome::Found { .. });
    match &outcome {
        ResolutionOutcome::Found {
            element,
            strategy_index,
        } => tracing::info!(
            element = %element,
            strategy_index,
            "resolved"
        ),
        ResolutionOutcome::Ambiguous { count, .. } => {
            tracing::warn!(count, "ambiguous match, refusing to guess")
        }
        ResolutionOutcome::NotFound(attempts) if attempts.cancelled => {
            tracing::warn!("cancelled")
        }
        ResolutionOutcome::NotFound(_) => tracing::warn!("not found"),
    }

    session.close().await?;
    if !found {
        std::process::exit(1);
    }
    Ok(())
}
