use anyhow::{Result, anyhow};
use clap::Parser;
use dotenvy::dotenv;
use std::io::Write;
use std::path::PathBuf;
use std::sync::atomic::Ordering;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use webpilot::executor::ExecutorConfig;
use webpilot::hands;
use webpilot::{
    Agent, AgentConfig, Brain, BrainConfig, Browser, ChromeSession, LaunchConfig, Model, Provider,
    session_lost,
};

#[derive(Parser, Debug)]
#[command(name = "agent", version, about = "Drive Chrome with natural-language commands")]
struct Cli {
    /// Model provider used for planning
    #[arg(long, value_enum, env = "WEBPILOT_PROVIDER", default_value = "openai")]
    provider: Provider,

    /// Model name (defaults to a small model of the chosen provider)
    #[arg(long, env = "WEBPILOT_MODEL")]
    model: Option<String>,

    /// API key; falls back to OPENAI_API_KEY or GEMINI_API_KEY
    #[arg(long)]
    api_key: Option<String>,

    /// Override the provider's API base URL
    #[arg(long, env = "WEBPILOT_API_BASE")]
    api_base: Option<String>,

    #[arg(long, default_value_t = 60)]
    request_timeout_secs: u64,

    #[arg(long, default_value_t = 20)]
    navigation_timeout_secs: u64,

    /// How long to wait for the page after click, back and refresh
    #[arg(long, default_value_t = 10)]
    settle_timeout_secs: u64,

    /// How long the browser connection may sit unused between commands
    #[arg(long, default_value_t = 3600)]
    idle_timeout_secs: u64,

    #[arg(long, env = "WEBPILOT_SCREENSHOT_DIR", default_value = ".")]
    screenshot_dir: PathBuf,

    #[arg(long)]
    headless: bool,

    #[arg(long, env = "CHROME_PATH")]
    chrome_path: Option<PathBuf>,

    #[arg(long)]
    user_data_dir: Option<PathBuf>,

    /// DevTools endpoint of a running Chrome to attach to before launching one
    #[arg(long, default_value = "http://127.0.0.1:9222")]
    attach_url: String,

    /// Always launch a fresh Chrome
    #[arg(long)]
    no_attach: bool,

    /// Run a single command and exit instead of starting the prompt
    #[arg(short, long)]
    command: Option<String>,

    #[arg(short, long)]
    verbose: bool,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv().ok();
    let cli = Cli::parse();

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(if cli.verbose {
            "webpilot=debug,agent=debug,warn"
        } else {
            "webpilot=info,agent=info,warn"
        })
    });
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();

    let key_var = cli.provider.api_key_var();
    let api_key = cli
        .api_key
        .clone()
        .or_else(|| std::env::var(key_var).ok())
        .ok_or_else(|| anyhow!("{key_var} not set in environment"))?;

    let attach_ws_url = if cli.no_attach {
        None
    } else {
        match hands::debugger_ws_url(&cli.attach_url).await {
            Ok(url) => Some(url),
            Err(e) => {
                info!("no running Chrome to attach to: {e:#}");
                None
            }
        }
    };

    let launch = LaunchConfig {
        headless: cli.headless,
        chrome_path: cli.chrome_path.clone(),
        user_data_dir: cli.user_data_dir.clone(),
        attach_ws_url,
        navigation_timeout: Duration::from_secs(cli.navigation_timeout_secs),
        idle_timeout: Duration::from_secs(cli.idle_timeout_secs),
    };

    info!("launching Chrome");
    let session = tokio::task::spawn_blocking(move || ChromeSession::launch(&launch))
        .await
        .map_err(|e| anyhow!("Browser launch panicked: {e}"))??;

    let brain = Brain::new(BrainConfig {
        provider: cli.provider,
        model: cli
            .model
            .clone()
            .unwrap_or_else(|| cli.provider.default_model().to_string()),
        api_key,
        api_base: cli.api_base.clone(),
    });

    let config = AgentConfig {
        executor: ExecutorConfig {
            screenshot_dir: cli.screenshot_dir.clone(),
            settle_timeout: Duration::from_secs(cli.settle_timeout_secs),
        },
        request_timeout: Duration::from_secs(cli.request_timeout_secs),
    };

    // The session is dropped, and Chrome closed, on every path out of here.
    let mut agent = Agent::new(session, brain, config);

    match cli.command {
        Some(command) => {
            if run_command(&mut agent, &command).await {
                Ok(())
            } else {
                Err(anyhow!("browser session lost"))
            }
        }
        None => repl(&mut agent).await,
    }
}

async fn repl<B, M>(agent: &mut Agent<B, M>) -> Result<()>
where
    B: Browser + 'static,
    M: Model,
{
    println!("Browser agent started!");
    println!("Type 'quit' to exit, 'help' for example commands");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("\nYou: ");
        std::io::stdout().flush()?;

        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!("\nGoodbye!");
            break;
        };

        let command = line.trim();
        match command.to_lowercase().as_str() {
            "" => continue,
            "quit" => {
                println!("Goodbye!");
                break;
            }
            "help" => {
                print_help();
                continue;
            }
            _ => {
                if !run_command(agent, command).await {
                    println!("\nThe browser session was lost. Restart the agent to continue.");
                    break;
                }
            }
        }
    }
    Ok(())
}

/// Plan and run one command, printing a line per action. Ctrl-C skips the
/// actions that have not started yet. Returns false once the browser session
/// is gone.
async fn run_command<B, M>(agent: &mut Agent<B, M>, command: &str) -> bool
where
    B: Browser + 'static,
    M: Model,
{
    println!("\nProcessing...");
    let interrupt = agent.interrupt_handle();
    let work = agent.process_command(command);
    tokio::pin!(work);

    let result = tokio::select! {
        result = &mut work => result,
        _ = tokio::signal::ctrl_c() => {
            warn!("interrupted, stopping after the current action");
            interrupt.store(true, Ordering::SeqCst);
            work.await
        }
    };

    let alive = !session_lost(&result);
    match result {
        Ok(trace) => {
            println!("\nResult:");
            for line in &trace {
                println!("{line}");
            }
        }
        Err(e) => println!("Error processing command: {e}"),
    }
    alive
}

fn print_help() {
    println!("\nAvailable natural language commands:");
    println!("- Navigate to [website]");
    println!("- Click on [element]");
    println!("- Type [text] in [field]");
    println!("- Search for [query]");
    println!("- Take a screenshot");
    println!("- Scroll down/up");
    println!("- Get page information");
}
