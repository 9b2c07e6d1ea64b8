//! Keycode decoding for keymap table cells.
//!
//! Turns the keycode text of a table cell into a [`KeyEntry`]. Only the
//! keycodes that drive layer state are interpreted; everything else is kept
//! verbatim as [`Action::Key`] and forwarded to the host untouched.

use crate::models::layer::find_layer_ref;
use crate::models::{Action, KeyEntry, LayerId};
use anyhow::{Context, Result};
use std::collections::BTreeMap;

/// Spellings of the transparent entry.
const TRANSPARENT: &[&str] = &["_______", "KC_TRNS", "KC_TRANSPARENT"];

/// Spellings of the no-op entry.
const NO_OP: &[&str] = &["XXXXXXX", "KC_NO"];

/// Prefixes of the keycodes [`split_layer_keycode`] understands.
const LAYER_KEYCODE_PREFIXES: &[&str] = &["MO(", "TG(", "DF(", "LT("];

/// Kind of layer-switching keycode with a layer argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerKeycodeKind {
    /// Momentary layer switch while held - MO(n)
    Momentary,
    /// Toggle layer on/off - TG(n)
    Toggle,
    /// Set default layer - DF(n)
    DefaultSet,
    /// Layer tap - tap for key, hold for layer - LT(n, key)
    TapHold,
}

/// Splits a layer keycode into its kind, layer argument and (for LT) tap keycode.
///
/// Returns `None` for keycodes that are not layer keycodes or are malformed.
///
/// # Examples
/// ```
/// use layerstack::services::keycodes::{split_layer_keycode, LayerKeycodeKind};
///
/// assert_eq!(
///     split_layer_keycode("TG(_DVORAK)"),
///     Some((LayerKeycodeKind::Toggle, "_DVORAK", None))
/// );
/// assert_eq!(
///     split_layer_keycode("LT(3, KC_TAB)"),
///     Some((LayerKeycodeKind::TapHold, "3", Some("KC_TAB")))
/// );
/// assert_eq!(split_layer_keycode("KC_A"), None);
/// ```
#[must_use]
pub fn split_layer_keycode(keycode: &str) -> Option<(LayerKeycodeKind, &str, Option<&str>)> {
    if let Some(inner) = keycode.strip_prefix("MO(") {
        Some((LayerKeycodeKind::Momentary, inner.strip_suffix(')')?.trim(), None))
    } else if let Some(inner) = keycode.strip_prefix("TG(") {
        Some((LayerKeycodeKind::Toggle, inner.strip_suffix(')')?.trim(), None))
    } else if let Some(inner) = keycode.strip_prefix("DF(") {
        Some((LayerKeycodeKind::DefaultSet, inner.strip_suffix(')')?.trim(), None))
    } else if let Some(inner) = keycode.strip_prefix("LT(") {
        let inner = inner.strip_suffix(')')?;
        let (layer_part, tap) = inner.split_once(',')?;
        Some((LayerKeycodeKind::TapHold, layer_part.trim(), Some(tap.trim())))
    } else {
        None
    }
}

/// Decodes keycode text against the layers and base selectors of one keymap.
#[derive(Debug, Clone, Copy)]
pub struct KeycodeDecoder<'a> {
    layers: &'a [(LayerId, String)],
    base_layers: &'a BTreeMap<String, LayerId>,
}

impl<'a> KeycodeDecoder<'a> {
    /// Creates a decoder for the given layer directory and base selectors.
    #[must_use]
    pub const fn new(
        layers: &'a [(LayerId, String)],
        base_layers: &'a BTreeMap<String, LayerId>,
    ) -> Self {
        Self {
            layers,
            base_layers,
        }
    }

    /// Decodes one keycode.
    ///
    /// # Errors
    ///
    /// Fails for `ADJUST` (the combination layer is derived, never bound), for
    /// malformed `MO(`/`TG(`/`DF(`/`LT(` keycodes and for layer keycodes whose
    /// argument names no layer of the keymap.
    pub fn decode(&self, keycode: &str) -> Result<KeyEntry> {
        let keycode = keycode.trim();

        if TRANSPARENT.contains(&keycode) {
            return Ok(KeyEntry::Transparent);
        }
        if NO_OP.contains(&keycode) {
            return Ok(KeyEntry::Action(Action::NoOp));
        }

        let action = match keycode {
            "LOWER" => Action::Lower,
            "RAISE" => Action::Raise,
            "ADJUST" => anyhow::bail!(
                "ADJUST cannot be bound to a key; it is active only while LOWER and RAISE are both held"
            ),
            _ => {
                if let Some(layer) = self.base_layers.get(keycode) {
                    Action::SelectBase { layer: *layer }
                } else if let Some((kind, reference, tap)) = split_layer_keycode(keycode) {
                    let layer = self
                        .layer(reference)
                        .with_context(|| format!("Invalid layer keycode: {keycode}"))?;
                    match kind {
                        LayerKeycodeKind::Momentary => Action::Momentary { layer },
                        LayerKeycodeKind::Toggle => Action::Toggle { layer },
                        LayerKeycodeKind::DefaultSet => Action::DefaultLayer { layer },
                        LayerKeycodeKind::TapHold => Action::LayerTap {
                            layer,
                            tap: tap.unwrap_or_default().to_string(),
                        },
                    }
                } else if LAYER_KEYCODE_PREFIXES
                    .iter()
                    .any(|prefix| keycode.starts_with(prefix))
                {
                    anyhow::bail!("Malformed layer keycode: {keycode}");
                } else {
                    Action::key(keycode)
                }
            }
        };

        Ok(KeyEntry::Action(action))
    }

    fn layer(&self, reference: &str) -> Result<LayerId> {
        find_layer_ref(
            reference,
            self.layers.iter().map(|(id, name)| (*id, name.as_str())),
        )
        .ok_or_else(|| anyhow::anyhow!("Unknown layer '{reference}'"))
    }
}
