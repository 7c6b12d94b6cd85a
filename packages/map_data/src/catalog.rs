//! Splits the raw layer catalog into the ward layer and the toggleable
//! layer list.

use haripur_map_layer_models::{ApiLayer, LayerUiState, WARD_LAYER_NAME};

use crate::PresentationRegistry;

/// Result of [`split_catalog`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogSplit {
    /// The ward boundary layer, if the catalog has one.
    pub ward_layer: Option<ApiLayer>,
    /// Every other layer, in catalog order, inactive.
    pub layers: Vec<LayerUiState>,
}

/// Separates the ward layer from the toggleable layers and attaches
/// presentation metadata to the rest.
///
/// Every entry named [`WARD_LAYER_NAME`] is excluded from the list; the
/// first one is returned as the ward layer.
#[must_use]
pub fn split_catalog(catalog: Vec<ApiLayer>, registry: &PresentationRegistry) -> CatalogSplit {
    let mut ward_layer = None;
    let mut layers = Vec::with_capacity(catalog.len());

    for layer in catalog {
        if layer.name == WARD_LAYER_NAME {
            if ward_layer.is_none() {
                ward_layer = Some(layer);
            } else {
                log::warn!("Ignoring duplicate {WARD_LAYER_NAME} layer (id {})", layer.id);
            }
            continue;
        }
        let presentation = registry.resolve(&layer.name);
        layers.push(LayerUiState::new(layer, presentation));
    }

    CatalogSplit { ward_layer, layers }
}
