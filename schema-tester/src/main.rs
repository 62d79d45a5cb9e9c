use std::path::PathBuf;

use clap::{Parser, Subcommand};
use colored::Colorize;
use log::info;
use schema_tester::{
    check::{self, Source},
    ctx::AppContext,
    serve,
    settings::TesterSettings,
};

#[derive(Parser, Debug)]
#[command(version, about = "Test component configuration schemas and their sync actions")]
struct Cli {
    /// Component root, its component_config folder, or any path inside it.
    /// Defaults to searching upward from the working directory.
    path: Option<PathBuf>,

    #[arg(long)]
    port: Option<u16>,

    #[arg(long)]
    host: Option<String>,

    /// Settings file, default `<root>/.schema-tester.toml`.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Print the JSON schema of the settings file and exit.
    #[arg(long)]
    print_config_schema: bool,

    #[command(subcommand)]
    command: Option<Command>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Serve schemas, config and sync actions over HTTP (default).
    Serve,
    /// Build the form headlessly and report on it.
    Check {
        /// Use a running tester server instead of the local component.
        #[arg(long)]
        server: Option<String>,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    if cli.print_config_schema {
        println!("{}", TesterSettings::json_schema()?);
        return Ok(());
    }

    if let Some(Command::Check { server: Some(url) }) = &cli.command {
        let debounce_ms = TesterSettings::default().debounce_ms;
        return check::run(Source::Server(url.clone()), debounce_ms).await;
    }

    let ctx = match AppContext::resolve(cli.path.as_deref(), cli.config.as_deref()) {
        Ok(ctx) => ctx,
        Err(e) => {
            eprintln!("{} {e:#}", "❌".red());
            std::process::exit(1);
        }
    };
    info!("component root: {}", ctx.root);

    match cli.command.unwrap_or(Command::Serve) {
        Command::Serve => {
            let host = cli.host.unwrap_or_else(|| ctx.settings.host.clone());
            let port = cli.port.unwrap_or(ctx.settings.port);
            serve::run(ctx, &host, port).await
        }
        Command::Check { .. } => {
            let debounce_ms = ctx.settings.debounce_ms;
            check::run(Source::Local(ctx), debounce_ms).await
        }
    }
}
