mod configuration;
mod error;
mod session;

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use baize::agent::Agent;
use baize::bridge::{Browser, CommandBridge};
use baize::page::HtmlPage;
use baize::providers::factory::get_provider;
use baize::tools::PageTools;
use clap::{Args, Parser, Subcommand};
use configuration::Settings;
use session::Session;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file (defaults to ~/.config/baize/config.toml)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Chat about a page
    Chat {
        #[command(flatten)]
        page: PageArgs,
    },
    /// Send one message and print the reply
    Run {
        #[command(flatten)]
        page: PageArgs,

        /// Message to send
        message: String,
    },
}

#[derive(Args)]
struct PageArgs {
    /// HTML file to open in the active tab
    #[arg(long)]
    page: PathBuf,

    /// Address the page is served from
    #[arg(long)]
    url: Option<String>,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())?;

    match cli.command {
        Command::Chat { page } => {
            let mut session = build_session(&settings, &page)?;
            session.start().await
        }
        Command::Run { page, message } => {
            let mut session = build_session(&settings, &page)?;
            session.headless_start(&message).await
        }
    }
}

fn build_session(settings: &Settings, args: &PageArgs) -> Result<Session> {
    let url = args.url.as_deref().or(settings.page.url.as_deref());
    let page = load_page(&args.page, url)?;

    let browser = Arc::new(Browser::new());
    browser.open_tab(page);
    let bridge = CommandBridge::new(browser).with_timeout(settings.page.timeout());

    let mut tools = PageTools::new(bridge)?;
    if settings.agent.expose_html {
        tools = tools.with_html_tool()?;
    }

    let provider = get_provider(&settings.provider)?;
    let agent = Agent::new(provider, tools).with_config(settings.agent.turn_config());
    Ok(Session::new(agent, settings.provider.clone()))
}

fn load_page(path: &Path, url: Option<&str>) -> Result<HtmlPage> {
    let source = fs::read_to_string(path)
        .with_context(|| format!("Failed to read page {}", path.display()))?;
    let page = HtmlPage::new(source);
    match url {
        Some(url) => page
            .with_url(url)
            .with_context(|| format!("Invalid page URL {}", url)),
        None => Ok(page),
    }
}
