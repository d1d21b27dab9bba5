// ABOUTME: Main entry point for the sat program.
// ABOUTME: Provides the CLI to serve, render and emit assets for a slide folder.

use anyhow::Context;
use clap::{Args, Parser, Subcommand};
use log::{error, info, warn};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::thread;
use tokio_util::sync::CancellationToken;

use showtell::{
    Config, ParserRegistry, Presentation, PresentationServer, RevealAssets, html, utils, watch,
};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Path to the presentation metadata file
    #[arg(short, long, global = true)]
    presentation: Option<PathBuf>,

    /// Folder containing the slides
    #[arg(short, long, global = true)]
    slides: Option<PathBuf>,

    /// Folder containing the reveal.js dist (css/, js/, lib/, plugin/, img/)
    #[arg(long, global = true)]
    reveal_dir: Option<PathBuf>,

    /// Folder with per-project assets overriding the reveal.js ones
    #[arg(long, global = true)]
    assets: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Serve the presentation and reload viewers when slides change
    #[command(alias = "s")]
    Serve(ServeArgs),

    /// Render the presentation into the dist dir
    #[command(aliases = ["build", "r", "b"])]
    Render(RenderArgs),

    /// Write the reveal.js assets to a folder
    EmitAssets(EmitArgs),
}

#[derive(Args)]
struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    addr: Option<String>,
}

#[derive(Args)]
struct RenderArgs {
    /// Output folder
    #[arg(default_value = "./dist")]
    dist: PathBuf,
}

#[derive(Args)]
struct EmitArgs {
    /// Output folder
    #[arg(default_value = "./dist")]
    dest: PathBuf,
}

#[actix_web::main]
async fn main() -> anyhow::Result<()> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    let mut config = Config::from_env();
    if let Some(path) = cli.presentation {
        config.presentation_file = path;
    }
    if let Some(path) = cli.slides {
        config.slide_dir = path;
    }
    if let Some(path) = cli.reveal_dir {
        config.reveal_dir = path;
    }
    if cli.assets.is_some() {
        config.custom_assets_dir = cli.assets;
    }

    match cli.command {
        Some(Commands::Serve(args)) => {
            if let Some(addr) = args.addr {
                config.address = addr;
            }
            serve(config).await
        }
        Some(Commands::Render(args)) => render(&config, &args.dist),
        Some(Commands::EmitAssets(args)) => {
            let assets = load_assets(&config)?;
            assets.emit(&args.dest)?;
            Ok(())
        }
        None => {
            println!("No command specified. Use --help for usage information.");
            Ok(())
        }
    }
}

async fn serve(config: Config) -> anyhow::Result<()> {
    utils::validate_directory_exists(&config.slide_dir)?;
    let presentation = load_presentation(&config.presentation_file)?;
    let assets = load_assets(&config)?;
    let options = config.server_options(ParserRegistry::with_defaults(), assets);

    let cancel = CancellationToken::new();
    let server = Arc::new(
        PresentationServer::create(
            cancel.clone(),
            presentation,
            &config.slide_dir,
            &config.address,
            options,
        )
        .context("Initial render failed")?,
    );
    let running = actix_web::rt::spawn(server.run()?);

    let watch_config = config.watch_config();
    let watch_server = Arc::clone(&server);
    let watch_cancel = cancel.clone();
    let watcher = thread::spawn(move || {
        let result = watch::watch_slides(&watch_config, &watch_cancel, |paths| {
            info!("{} file(s) changed, rerendering...", paths.len());
            if let Err(e) = watch_server.rerender() {
                error!("Failed to rerender presentation: {}", e);
            }
        });
        if let Err(e) = result {
            error!("Watching slides failed: {}", e);
        }
    });

    println!("Serving presentation on {} (Press Ctrl+C to stop)", server.address());
    actix_web::rt::signal::ctrl_c()
        .await
        .context("Failed to listen for Ctrl+C")?;

    server.close().await;
    match running.await {
        Ok(Ok(())) => {}
        Ok(Err(e)) => warn!("Server stopped with an error: {}", e),
        Err(e) => warn!("Server task ended abnormally: {}", e),
    }
    if watcher.join().is_err() {
        warn!("Watcher thread panicked");
    }
    Ok(())
}

fn render(config: &Config, dist: &Path) -> anyhow::Result<()> {
    utils::validate_directory_exists(&config.slide_dir)?;
    let mut presentation = load_presentation(&config.presentation_file)?;
    let registry = ParserRegistry::with_defaults();

    let document = html::render_index(&mut presentation, &registry, &config.slide_dir)?;
    html::write_html_to_file(&document, &dist.join("index.html"))?;

    let assets = load_assets(config)?;
    assets.emit(dist)?;
    println!("Presentation rendered to {:?}", dist);
    Ok(())
}

fn load_presentation(path: &Path) -> anyhow::Result<Presentation> {
    if utils::validate_file_exists(path).is_err() {
        warn!(
            "Presentation file {:?} not found, using the default configuration",
            path
        );
        return Ok(Presentation::default());
    }
    Ok(Presentation::from_file(path)?)
}

fn load_assets(config: &Config) -> anyhow::Result<RevealAssets> {
    let assets = RevealAssets::from_dist_dir(&config.reveal_dir);
    if let Some(dir) = &config.custom_assets_dir {
        let added = assets.add_custom_files(dir)?;
        info!("Added {} custom assets from {:?}", added, dir);
    }
    Ok(assets)
}
