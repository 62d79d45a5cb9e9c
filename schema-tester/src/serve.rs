//! The tester server.

use std::{net::SocketAddr, sync::Arc};

use anyhow::Context;
use colored::Colorize;
use schemaform::{
    dispatch::Dispatcher,
    web::{self, WebState},
};

use crate::{backend::ScriptLoader, ctx::AppContext};

pub async fn run(ctx: AppContext, host: &str, port: u16) -> anyhow::Result<()> {
    let addr: SocketAddr = format!("{host}:{port}")
        .parse()
        .with_context(|| format!("invalid listen address {host}:{port}"))?;

    print_banner(&ctx, addr);

    let loader = ScriptLoader::new(ctx.settings.clone());
    let dispatcher = Dispatcher::new(Some(ctx.root.clone()), loader);
    web::serve(addr, WebState::new(Arc::new(dispatcher))).await
}

fn print_banner(ctx: &AppContext, addr: SocketAddr) {
    let config = ctx
        .root
        .existing_config()
        .map(|p| p.display().to_string())
        .unwrap_or_else(|| "Not found".to_string());

    println!("{}", "🚀 Component Schema Tester".bold().green());
    println!("📁 Project root:     {}", ctx.root.path().display());
    println!("📋 Component config: {}", ctx.root.config_dir().display());
    println!("⚙️  config.json:      {config}");
    println!("🐍 Entry:            {} {}", ctx.settings.interpreter, ctx.entry_path().display());
    println!("🌐 {}", format!("http://{addr}").cyan().underline());
    println!("{}", "Press Ctrl+C to stop".dimmed());
}
