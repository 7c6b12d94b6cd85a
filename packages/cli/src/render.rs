//! Headless render: load, activate, reconcile, export.

use std::path::PathBuf;
use std::sync::Arc;

use haripur_map_api::LayerApi;
use haripur_map_data::MapData;
use haripur_map_renderer::{MapProps, MapRenderer, MapViewConfig, SceneEngine};

pub struct RenderArgs {
    pub layers: Vec<String>,
    pub show_wards: bool,
    pub width: u32,
    pub out: PathBuf,
}

pub async fn run(
    api: Arc<dyn LayerApi>,
    args: &RenderArgs,
) -> Result<(), Box<dyn std::error::Error>> {
    let data = MapData::new(api);
    data.load_layers().await;
    if let Some(error) = data.error() {
        return Err(error.into());
    }

    let catalog = data.layers();
    for name in &args.layers {
        let Some(layer) = catalog.iter().find(|layer| &layer.name == name) else {
            log::warn!("Unknown layer {name}, skipping");
            continue;
        };
        data.toggle_layer(layer.id).await;
        if let Some(error) = data.layer(layer.id).and_then(|state| state.error) {
            log::warn!("{error}");
        }
    }

    let mut renderer = MapRenderer::new(MapViewConfig::for_viewport_width(args.width));
    renderer.initialize(SceneEngine::new);
    renderer.set_ward_visibility(args.show_wards);

    let active_layers = data.get_active_layers();
    renderer.update(&MapProps {
        active_layers: &active_layers,
        layer_data: &data,
        ward_boundaries_loaded: data.ward_boundaries_loaded(),
    })?;

    let engine = renderer.engine().ok_or("Map engine missing after initialize")?;
    let collection = engine.to_feature_collection()?;
    std::fs::write(&args.out, serde_json::to_string_pretty(&collection)?)?;

    let drawn: Vec<String> = engine.layer_keys().map(ToString::to_string).collect();
    println!(
        "Wrote {} features from [{}] to {}",
        collection.features.len(),
        drawn.join(", "),
        args.out.display()
    );

    renderer.destroy();
    data.unmount();
    Ok(())
}
