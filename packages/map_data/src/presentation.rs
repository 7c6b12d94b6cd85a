//! Compile-time registry of layer presentation metadata.
//!
//! Display names, colors, icons and marker sizes live in
//! `presentation/layers.toml`, embedded via `include_str!`. Layer names are
//! resolved to a [`LayerKind`] first, so unknown names never reach a
//! lookup table and simply get [`LayerPresentation::fallback`].

use std::collections::BTreeMap;

use haripur_map_layer_models::{LayerKind, LayerPresentation};
use serde::Deserialize;

/// Embedded presentation definitions.
const PRESENTATION_TOML: &str = include_str!("../presentation/layers.toml");

/// Number of registered presentations. Enforced by a test.
#[cfg(test)]
const EXPECTED_ENTRY_COUNT: usize = 8;

#[derive(Debug, Deserialize)]
struct RegistryFile {
    layers: Vec<PresentationEntry>,
}

#[derive(Debug, Deserialize)]
struct PresentationEntry {
    kind: LayerKind,
    #[serde(flatten)]
    presentation: LayerPresentation,
}

/// Presentation lookup keyed by [`LayerKind`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PresentationRegistry {
    entries: BTreeMap<LayerKind, LayerPresentation>,
}

impl Default for PresentationRegistry {
    fn default() -> Self {
        Self::embedded()
    }
}

impl PresentationRegistry {
    /// Returns the registry compiled into this crate.
    ///
    /// # Panics
    ///
    /// Panics if the embedded TOML fails to parse. Since it is a
    /// compile-time constant, a parse failure is a development error
    /// caught by the tests below.
    #[must_use]
    pub fn embedded() -> Self {
        Self::from_toml(PRESENTATION_TOML)
            .unwrap_or_else(|e| panic!("Failed to parse layer presentation registry: {e}"))
    }

    /// Parses a registry from TOML. Later entries for the same kind
    /// replace earlier ones.
    ///
    /// # Errors
    ///
    /// Returns the TOML error if the document does not match the schema.
    pub fn from_toml(toml_str: &str) -> Result<Self, toml::de::Error> {
        let file: RegistryFile = toml::de::from_str(toml_str)?;
        Ok(Self {
            entries: file
                .layers
                .into_iter()
                .map(|entry| (entry.kind, entry.presentation))
                .collect(),
        })
    }

    /// Returns the registered presentation for `kind`.
    #[must_use]
    pub fn get(&self, kind: LayerKind) -> Option<&LayerPresentation> {
        self.entries.get(&kind)
    }

    /// Resolves a server-side layer name to its presentation, falling back
    /// to the raw name in neutral gray.
    #[must_use]
    pub fn resolve(&self, layer_name: &str) -> LayerPresentation {
        LayerKind::from_name(layer_name)
            .and_then(|kind| self.get(kind))
            .cloned()
            .unwrap_or_else(|| LayerPresentation::fallback(layer_name))
    }

    /// Number of registered kinds.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Whether the registry is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}
