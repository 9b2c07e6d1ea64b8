//! Layer activation state and keycode resolution.

use crate::engine::persistence::BaseLayerStore;
use crate::models::{Action, Keymap, LayerId, LayerSet, Position};
use serde::Serialize;
use tracing::{debug, warn};

/// Result of resolving a position: the action and the layer that supplied it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolved {
    /// Effective action
    pub action: Action,
    /// Layer whose entry was used
    pub layer: LayerId,
}

/// Authoritative store of the layer activation set and the base layer.
///
/// Owns the keymap tables so it can answer [`LayerStack::resolve`], and the
/// persistence collaborator that [`LayerStack::select_base_layer`] notifies.
#[derive(Debug)]
pub struct LayerStack<S> {
    keymap: Keymap,
    active: LayerSet,
    base: LayerId,
    store: S,
}

impl<S: BaseLayerStore> LayerStack<S> {
    /// Creates the stack with every layer inactive.
    ///
    /// The base layer is the persisted selection when it names a declared
    /// base layer, otherwise the keymap default. Load failures are logged and
    /// fall back to the default.
    pub fn new(keymap: Keymap, mut store: S) -> Self {
        let default = keymap.default_base();
        let base = match store.load_base_layer() {
            Ok(Some(layer)) if keymap.is_base_layer(layer) => layer,
            Ok(Some(layer)) => {
                warn!(
                    layer = %layer,
                    "Persisted base layer is not a base layer of this keymap, using default"
                );
                default
            }
            Ok(None) => default,
            Err(e) => {
                warn!("Failed to load persisted base layer, using default: {e:#}");
                default
            }
        };
        debug!(base = %base, "Layer stack initialised");

        Self {
            keymap,
            active: LayerSet::empty(),
            base,
            store,
        }
    }

    /// Sets a layer's flag. No-op if already active.
    pub fn activate(&mut self, layer: LayerId) {
        if !self.active.contains(layer) {
            self.active.insert(layer);
            debug!(layer = %layer, "layer on");
        }
    }

    /// Clears a layer's flag. No-op if already inactive.
    pub fn deactivate(&mut self, layer: LayerId) {
        if self.active.contains(layer) {
            self.active.remove(layer);
            debug!(layer = %layer, "layer off");
        }
    }

    /// Returns true if the layer's flag is set.
    #[must_use]
    pub fn is_active(&self, layer: LayerId) -> bool {
        self.active.contains(layer)
    }

    /// Current activation set.
    #[must_use]
    pub fn active_layers(&self) -> LayerSet {
        self.active
    }

    /// Currently selected base layer.
    #[must_use]
    pub fn base_layer(&self) -> LayerId {
        self.base
    }

    /// Selects a new base layer and persists it.
    ///
    /// Persisting again with an unchanged layer is intentional: the store
    /// always sees the latest explicit selection. A failed save is logged and
    /// the in-memory selection stays in effect.
    pub fn select_base_layer(&mut self, layer: LayerId) {
        if self.base != layer {
            debug!(from = %self.base, to = %layer, "base layer selected");
            self.base = layer;
        }
        if let Err(e) = self.store.save_base_layer(layer) {
            warn!(layer = %layer, "Failed to persist base layer: {e:#}");
        }
    }

    /// Switches the base layer for this session only (DF).
    pub fn set_default_layer(&mut self, layer: LayerId) {
        if self.base != layer {
            debug!(from = %self.base, to = %layer, "default layer set");
            self.base = layer;
        }
    }

    /// Effective action at `position`.
    ///
    /// Scans active layers from the highest id down and returns the first
    /// non-transparent entry, then falls back to the base layer. A position
    /// the base layer does not define resolves to `KC_NO`.
    #[must_use]
    pub fn resolve(&self, position: Position) -> Resolved {
        for layer in self.active.iter_descending() {
            if let Some(action) = self.keymap.entry(layer, position).action() {
                return Resolved {
                    action: action.clone(),
                    layer,
                };
            }
        }

        let action = self
            .keymap
            .entry(self.base, position)
            .action()
            .cloned()
            .unwrap_or(Action::NoOp);

        Resolved {
            action,
            layer: self.base,
        }
    }

    /// Runs deferred persistence writes; failures are logged, never returned.
    pub fn flush_store(&mut self) {
        if let Err(e) = self.store.flush() {
            warn!("Failed to persist base layer: {e:#}");
        }
    }

    /// Keymap tables.
    #[must_use]
    pub fn keymap(&self) -> &Keymap {
        &self.keymap
    }

    /// Persistence collaborator.
    #[must_use]
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Persistence collaborator, mutably.
    pub fn store_mut(&mut self) -> &mut S {
        &mut self.store
    }
}
