#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! CLI entry point for the Haripur municipal map.
//!
//! Lists the layer catalog, summarizes it, checks API connectivity, and
//! renders a chosen set of layers headlessly to a `GeoJSON` file.
//! Connection settings come from `MAP_API_BASE_URL`,
//! `MAP_API_TIMEOUT_SECS`, `MAP_API_MAX_ATTEMPTS` and `MAP_API_TOKEN`.

mod render;

use std::path::PathBuf;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use haripur_map_api::{LayerApi, MapApiClient, MapApiConfig, StaticToken};
use haripur_map_data::MapData;
use haripur_map_renderer::config::DEFAULT_VIEWPORT_PX;

/// Inspect and render the municipal map layers.
#[derive(Parser)]
#[command(name = "haripur_map")]
#[command(about = "Inspect and render the municipal map layers")]
struct Cli {
    /// Map API base URL (overrides `MAP_API_BASE_URL`).
    #[arg(long)]
    base_url: Option<String>,

    /// Subcommand to execute.
    #[command(subcommand)]
    command: Commands,
}

/// Top-level subcommands.
#[derive(Subcommand)]
enum Commands {
    /// List toggleable layers and the ward boundary status.
    Layers,

    /// Print layer and feature counts as JSON.
    Summary,

    /// Check that the layer catalog is reachable.
    Ping,

    /// Render layers headlessly and write the drawn scene as `GeoJSON`.
    Render {
        /// Comma-separated layer names to switch on (e.g. "`bdpt_v2`,Villages").
        #[arg(long, value_delimiter = ',')]
        layers: Vec<String>,

        /// Leave ward boundaries out of the scene.
        #[arg(long)]
        hide_wards: bool,

        /// Viewport width in pixels, for layout-dependent settings.
        #[arg(long, default_value_t = DEFAULT_VIEWPORT_PX)]
        width: u32,

        /// Output file.
        #[arg(long)]
        out: PathBuf,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    pretty_env_logger::init();
    let cli = Cli::parse();

    let mut config = MapApiConfig::from_env();
    if let Some(base_url) = cli.base_url {
        config.base_url = base_url.trim_end_matches('/').to_string();
    }
    let client =
        MapApiClient::new(config)?.with_token_provider(Arc::new(StaticToken::from_env()));
    let api: Arc<dyn LayerApi> = Arc::new(client);

    match cli.command {
        Commands::Layers => cmd_layers(api).await,
        Commands::Summary => cmd_summary(api.as_ref()).await,
        Commands::Ping => cmd_ping(api.as_ref()).await,
        Commands::Render {
            layers,
            hide_wards,
            width,
            out,
        } => {
            render::run(
                api,
                &render::RenderArgs {
                    layers,
                    show_wards: !hide_wards,
                    width,
                    out,
                },
            )
            .await
        }
    }
}

async fn cmd_layers(api: Arc<dyn LayerApi>) -> Result<(), Box<dyn std::error::Error>> {
    let data = MapData::new(api);
    data.load_layers().await;
    if let Some(error) = data.error() {
        return Err(error.into());
    }

    println!("{:>4}  {:<22} {:<28} {:<8} ICON", "ID", "NAME", "DISPLAY NAME", "COLOR");
    for layer in data.layers() {
        println!(
            "{:>4}  {:<22} {:<28} {:<8} {}",
            layer.id, layer.name, layer.display_name, layer.color, layer.icon
        );
    }

    let summary = data.panel_summary();
    println!();
    println!("{} layers, ward boundaries: {}", summary.total, summary.ward_status);
    Ok(())
}

async fn cmd_summary(api: &dyn LayerApi) -> Result<(), Box<dyn std::error::Error>> {
    let summary = haripur_map_api::map_summary(api).await;
    println!("{}", serde_json::to_string_pretty(&summary)?);
    Ok(())
}

async fn cmd_ping(api: &dyn LayerApi) -> Result<(), Box<dyn std::error::Error>> {
    if haripur_map_api::test_connection(api).await {
        println!("Map API reachable");
        Ok(())
    } else {
        Err("Map API unreachable".into())
    }
}
