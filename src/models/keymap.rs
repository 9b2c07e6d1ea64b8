//! Keymap and metadata data structures.

use crate::constants::KEYMAP_SCHEMA_VERSION;
use crate::models::layer::{find_layer_ref, Action, KeyEntry, Layer, LayerId, Position};
use anyhow::Result;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Keycode names the engine claims for itself; base selectors cannot reuse them.
const RESERVED_NAMES: &[&str] = &["LOWER", "RAISE", "ADJUST", "KC_NO", "KC_TRNS", "XXXXXXX"];

/// Lower/Raise/Adjust layer assignment.
///
/// Adjust is derived: active if and only if both Lower and Raise are engaged.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriLayer {
    /// Layer engaged by the LOWER key
    pub lower: LayerId,
    /// Layer engaged by the RAISE key
    pub raise: LayerId,
    /// Combination layer engaged while both are held
    pub adjust: LayerId,
}

/// Keymap metadata embedded in YAML frontmatter.
///
/// # Validation
///
/// - name must be non-empty, max 100 characters
/// - version must match the supported schema version
/// - at least one base layer must be declared
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeymapMetadata {
    /// Keymap name (e.g., "Adoah orthsplit")
    pub name: String,
    /// Long description
    #[serde(default)]
    pub description: String,
    /// Schema version (e.g., "1.0")
    pub version: String,
    /// Base layer selectors by keycode name (e.g., QWERTY: 0, DVORAK: 1)
    pub base_layers: BTreeMap<String, LayerId>,
    /// Selector name used when nothing has been persisted yet
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub default_base: Option<String>,
    /// Tri-layer configuration, if the keymap uses LOWER/RAISE
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tri_layer: Option<TriLayer>,
}

impl KeymapMetadata {
    /// Validates metadata fields that do not depend on the layer tables.
    pub fn validate(&self) -> Result<()> {
        if self.name.is_empty() {
            anyhow::bail!("Keymap name cannot be empty");
        }

        if self.name.len() > 100 {
            anyhow::bail!(
                "Keymap name exceeds maximum length of 100 characters (got {})",
                self.name.len()
            );
        }

        if self.version != KEYMAP_SCHEMA_VERSION {
            anyhow::bail!(
                "Unsupported schema version '{}'. Only version '{}' is supported.",
                self.version,
                KEYMAP_SCHEMA_VERSION
            );
        }

        if self.base_layers.is_empty() {
            anyhow::bail!("Keymap must declare at least one base layer in 'base_layers'");
        }

        let name_regex = Regex::new(r"^[A-Z][A-Z0-9_]*$").unwrap();
        for name in self.base_layers.keys() {
            if !name_regex.is_match(name) {
                anyhow::bail!(
                    "Invalid base layer name '{name}'. Names must be uppercase keycode identifiers (e.g. QWERTY)"
                );
            }
            if RESERVED_NAMES.contains(&name.as_str()) {
                anyhow::bail!("Base layer name '{name}' is reserved");
            }
        }

        if let Some(default) = &self.default_base {
            if !self.base_layers.contains_key(default) {
                anyhow::bail!("default_base '{default}' is not one of the declared base_layers");
            }
        }

        if let Some(tri) = &self.tri_layer {
            if tri.lower == tri.raise {
                anyhow::bail!("tri_layer lower and raise must be different layers");
            }
            if tri.adjust <= tri.lower || tri.adjust <= tri.raise {
                anyhow::bail!(
                    "tri_layer adjust ({}) must rank above lower ({}) and raise ({})",
                    tri.adjust,
                    tri.lower,
                    tri.raise
                );
            }
        }

        Ok(())
    }
}

/// A complete keymap: metadata plus layer tables ordered by layer id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Keymap {
    /// Frontmatter metadata
    pub metadata: KeymapMetadata,
    /// Layers sorted by id
    pub layers: Vec<Layer>,
}

impl Keymap {
    /// Builds a keymap and validates it.
    pub fn new(metadata: KeymapMetadata, mut layers: Vec<Layer>) -> Result<Self> {
        layers.sort_by_key(|layer| layer.id);
        let keymap = Self { metadata, layers };
        keymap.validate()?;
        Ok(keymap)
    }

    /// Layer with the given id.
    #[must_use]
    pub fn layer(&self, id: LayerId) -> Option<&Layer> {
        self.layers.iter().find(|layer| layer.id == id)
    }

    /// Entry of layer `id` at `position` (transparent for gaps and unknown layers).
    #[must_use]
    pub fn entry(&self, id: LayerId, position: Position) -> &KeyEntry {
        static MISSING: KeyEntry = KeyEntry::Transparent;
        self.layer(id).map_or(&MISSING, |layer| layer.entry(position))
    }

    /// Layer id selected by a base selector name (case-insensitive).
    #[must_use]
    pub fn base_selector(&self, name: &str) -> Option<LayerId> {
        let wanted = name.to_ascii_uppercase();
        self.metadata.base_layers.get(&wanted).copied()
    }

    /// Returns true if `id` is one of the declared base layers.
    #[must_use]
    pub fn is_base_layer(&self, id: LayerId) -> bool {
        self.metadata.base_layers.values().any(|layer| *layer == id)
    }

    /// Selector name for a base layer id.
    #[must_use]
    pub fn base_name(&self, id: LayerId) -> Option<&str> {
        self.metadata
            .base_layers
            .iter()
            .find(|(_, layer)| **layer == id)
            .map(|(name, _)| name.as_str())
    }

    /// Base layer used before anything has been persisted.
    ///
    /// The explicit `default_base`, otherwise the lowest declared base layer.
    #[must_use]
    pub fn default_base(&self) -> LayerId {
        self.metadata
            .default_base
            .as_deref()
            .and_then(|name| self.base_selector(name))
            .or_else(|| self.metadata.base_layers.values().min().copied())
            .unwrap_or_else(|| self.layers[0].id)
    }

    /// Resolves a layer reference: a number, a layer name, or a `_NAME` define.
    #[must_use]
    pub fn layer_by_ref(&self, reference: &str) -> Option<LayerId> {
        find_layer_ref(
            reference,
            self.layers.iter().map(|layer| (layer.id, layer.name.as_str())),
        )
    }

    /// Every position that appears in any layer, sorted.
    #[must_use]
    pub fn positions(&self) -> Vec<Position> {
        let mut positions: Vec<Position> = self
            .layers
            .iter()
            .flat_map(|layer| layer.keys.iter().map(|key| key.position))
            .collect();
        positions.sort_unstable();
        positions.dedup();
        positions
    }

    /// Validates cross-references between metadata and layer tables.
    ///
    /// Checks:
    /// - at least one layer, ids unique
    /// - base layers and tri-layer ids name existing layers
    /// - base layers contain no transparent entries
    /// - layer-switching keycodes target existing layers other than adjust
    pub fn validate(&self) -> Result<()> {
        self.metadata.validate()?;

        if self.layers.is_empty() {
            anyhow::bail!("Keymap must have at least one layer");
        }

        for pair in self.layers.windows(2) {
            if pair[0].id == pair[1].id {
                anyhow::bail!("Layer {} is defined more than once", pair[0].id);
            }
        }

        for (name, id) in &self.metadata.base_layers {
            let Some(layer) = self.layer(*id) else {
                anyhow::bail!("Base layer {name} refers to layer {id}, which is not defined");
            };
            if let Some(key) = layer.keys.iter().find(|key| key.entry.is_transparent()) {
                anyhow::bail!(
                    "Base layer {} ({}) has a transparent entry at {}; base layers must define every key",
                    id,
                    layer.name,
                    key.position
                );
            }
        }

        if let Some(tri) = &self.metadata.tri_layer {
            for (role, id) in [("lower", tri.lower), ("raise", tri.raise), ("adjust", tri.adjust)] {
                if self.layer(id).is_none() {
                    anyhow::bail!("tri_layer {role} refers to layer {id}, which is not defined");
                }
            }
        }

        for layer in &self.layers {
            for key in &layer.keys {
                let Some(action) = key.entry.action() else {
                    continue;
                };
                match action {
                    Action::Lower | Action::Raise if self.metadata.tri_layer.is_none() => {
                        anyhow::bail!(
                            "Layer {} uses {} at {} but the keymap has no tri_layer section",
                            layer.id,
                            key.keycode,
                            key.position
                        );
                    }
                    Action::Momentary { layer: target }
                    | Action::Toggle { layer: target }
                    | Action::LayerTap { layer: target, .. }
                    | Action::DefaultLayer { layer: target }
                    | Action::SelectBase { layer: target } => {
                        if self.layer(*target).is_none() {
                            anyhow::bail!(
                                "Layer {} key {} at {} targets undefined layer {}",
                                layer.id,
                                key.keycode,
                                key.position,
                                target
                            );
                        }
                        if self
                            .metadata
                            .tri_layer
                            .is_some_and(|tri| tri.adjust == *target)
                        {
                            anyhow::bail!(
                                "Layer {} key {} at {} targets the adjust layer, which is only reachable through LOWER and RAISE",
                                layer.id,
                                key.keycode,
                                key.position
                            );
                        }
                    }
                    _ => {}
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::layer::KeyDefinition;

    fn id(n: u8) -> LayerId {
        LayerId::new(n).unwrap()
    }

    fn metadata() -> KeymapMetadata {
        KeymapMetadata {
            name: "Test".to_string(),
            description: String::new(),
            version: "1.0".to_string(),
            base_layers: BTreeMap::from([("QWERTY".to_string(), id(0)), ("DVORAK".to_string(), id(1))]),
            default_base: None,
            tri_layer: None,
        }
    }

    fn layer(n: u8, name: &str, codes: &[&str]) -> Layer {
        let mut layer = Layer::new(id(n), name).unwrap();
        for (col, code) in codes.iter().enumerate() {
            let entry = if *code == "_______" {
                KeyEntry::Transparent
            } else {
                KeyEntry::Action(Action::key(*code))
            };
            layer
                .add_key(KeyDefinition::new(Position::new(0, col as u8), *code, entry))
                .unwrap();
        }
        layer
    }

    #[test]
    fn test_keymap_sorts_layers() {
        let keymap = Keymap::new(
            metadata(),
            vec![layer(1, "Dvorak", &["KC_SCLN"]), layer(0, "Qwerty", &["KC_Q"])],
        )
        .unwrap();
        assert_eq!(keymap.layers[0].id, id(0));
        assert_eq!(keymap.default_base(), id(0));
        assert_eq!(keymap.base_selector("dvorak"), Some(id(1)));
        assert_eq!(keymap.base_name(id(1)), Some("DVORAK"));
    }

    #[test]
    fn test_explicit_default_base() {
        let mut meta = metadata();
        meta.default_base = Some("DVORAK".to_string());
        let keymap = Keymap::new(
            meta,
            vec![layer(0, "Qwerty", &["KC_Q"]), layer(1, "Dvorak", &["KC_SCLN"])],
        )
        .unwrap();
        assert_eq!(keymap.default_base(), id(1));
    }

    #[test]
    fn test_base_layer_must_not_be_transparent() {
        let result = Keymap::new(
            metadata(),
            vec![layer(0, "Qwerty", &["KC_Q", "_______"]), layer(1, "Dvorak", &["KC_SCLN"])],
        );
        let err = result.unwrap_err().to_string();
        assert!(err.contains("transparent"), "unexpected error: {err}");
    }

    #[test]
    fn test_base_layer_must_exist() {
        let result = Keymap::new(metadata(), vec![layer(0, "Qwerty", &["KC_Q"])]);
        assert!(result.is_err());
    }

    #[test]
    fn test_tri_layer_adjust_must_rank_highest() {
        let mut meta = metadata();
        meta.tri_layer = Some(TriLayer {
            lower: id(3),
            raise: id(2),
            adjust: id(2),
        });
        assert!(meta.validate().is_err());

        meta.tri_layer = Some(TriLayer {
            lower: id(3),
            raise: id(2),
            adjust: id(16),
        });
        assert!(meta.validate().is_ok());
    }

    #[test]
    fn test_reserved_base_name_rejected() {
        let mut meta = metadata();
        meta.base_layers.insert("LOWER".to_string(), id(2));
        assert!(meta.validate().is_err());
    }

    #[test]
    fn test_layer_by_ref() {
        let keymap = Keymap::new(
            metadata(),
            vec![layer(0, "Qwerty", &["KC_Q"]), layer(1, "Dvorak", &["KC_SCLN"])],
        )
        .unwrap();
        assert_eq!(keymap.layer_by_ref("1"), Some(id(1)));
        assert_eq!(keymap.layer_by_ref("_DVORAK"), Some(id(1)));
        assert_eq!(keymap.layer_by_ref("qwerty"), Some(id(0)));
        assert_eq!(keymap.layer_by_ref("7"), None);
        assert_eq!(keymap.layer_by_ref("Colemak"), None);
    }
}
