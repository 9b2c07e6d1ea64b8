//! Layer event controller: the Lower/Raise/Adjust state machine.
//!
//! The controller consumes key edges, drives the [`LayerStack`] and reports
//! one [`Resolution`] per event. Three combination modes are supported:
//!
//! - [`CombinationMode::Simple`]: set/clear the modifier layer, then
//!   recompute Adjust as `Lower && Raise`. Lower and Raise stay active
//!   underneath Adjust.
//! - [`CombinationMode::Exclusive`]: entering Adjust clears Lower and Raise;
//!   releasing either modifier while Adjust is active drops Adjust and turns
//!   the *other* modifier back on. Restoration is inferred from the edge
//!   sequence alone.
//! - [`CombinationMode::Tracked`]: the held state of both modifier keys is
//!   tracked and the three flags are recomputed from that pair on every edge.
//!   Matches `Exclusive` for well-formed input, but repeated edges (switch
//!   chatter) cannot knock it out of Adjust.
//!
//! A held `MO(n)` or `LT(n, kc)` whose layer is Lower or Raise counts as a
//! held LOWER or RAISE key in every mode.

use crate::engine::layer_stack::{LayerStack, Resolved};
use crate::engine::persistence::BaseLayerStore;
use crate::models::{Action, LayerId, LayerSet, Position, TriLayer};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::str::FromStr;
use tracing::debug;

/// How Lower and Raise combine into Adjust.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CombinationMode {
    /// Plain tri-layer: Adjust = Lower && Raise, modifiers stay on underneath
    Simple,
    /// Mutual exclusion with restore-on-partial-release. A repeated LOWER or
    /// RAISE press while in Adjust drops back to that modifier's layer.
    Exclusive,
    /// Hold-state tracking, Adjust recomputed from both keys on every edge
    #[default]
    Tracked,
}

impl CombinationMode {
    /// All modes, in display order.
    pub const ALL: [Self; 3] = [Self::Simple, Self::Exclusive, Self::Tracked];

    /// Lowercase name used in config files and on the command line.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Simple => "simple",
            Self::Exclusive => "exclusive",
            Self::Tracked => "tracked",
        }
    }
}

impl fmt::Display for CombinationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CombinationMode {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "simple" => Ok(Self::Simple),
            "exclusive" => Ok(Self::Exclusive),
            "tracked" => Ok(Self::Tracked),
            _ => Err(format!(
                "Invalid combination mode '{s}'. Must be 'simple', 'exclusive', or 'tracked'"
            )),
        }
    }
}

/// Control-key events understood by the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LayerEvent {
    /// LOWER key pressed
    LowerDown,
    /// LOWER key released
    LowerUp,
    /// RAISE key pressed
    RaiseDown,
    /// RAISE key released
    RaiseUp,
    /// Base layer selector pressed
    SelectBase(LayerId),
}

/// Physical key edge from the scan collaborator.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct KeyEvent {
    /// Key position
    pub position: Position,
    /// True on press, false on release
    pub pressed: bool,
}

impl KeyEvent {
    /// Key press at `position`.
    #[must_use]
    pub const fn press(position: Position) -> Self {
        Self {
            position,
            pressed: true,
        }
    }

    /// Key release at `position`.
    #[must_use]
    pub const fn release(position: Position) -> Self {
        Self {
            position,
            pressed: false,
        }
    }
}

/// Keycode edge for the HID report collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HidEvent {
    /// Keycode to press or release
    pub keycode: String,
    /// True on press, false on release
    pub pressed: bool,
}

/// Outcome of one key event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Resolution {
    /// Key position
    pub position: Position,
    /// Edge direction
    pub pressed: bool,
    /// Effective action
    pub action: Action,
    /// Layer that supplied the action
    pub layer: LayerId,
}

impl Resolution {
    /// Keycode edge to forward to the host; layer-control keys emit none.
    #[must_use]
    pub fn hid_event(&self) -> Option<HidEvent> {
        match &self.action {
            Action::Key { code } => Some(HidEvent {
                keycode: code.clone(),
                pressed: self.pressed,
            }),
            _ => None,
        }
    }
}

/// Which of the tri-layer flags are on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum TriLayerState {
    /// S0: none
    Idle,
    /// S1: Lower only
    Lower,
    /// S2: Raise only
    Raise,
    /// S3: Adjust only
    Adjust,
    /// Any other combination (e.g. Lower+Raise+Adjust in simple mode)
    Mixed,
}

/// Physical hold state of the two modifier keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct HoldState {
    /// LOWER currently held
    pub lower: bool,
    /// RAISE currently held
    pub raise: bool,
}

/// Drives a [`LayerStack`] from key events.
#[derive(Debug)]
pub struct LayerController<S> {
    stack: LayerStack<S>,
    mode: CombinationMode,
    held: HoldState,
    // Action each currently-pressed key resolved to when it went down
    pressed: HashMap<Position, Resolved>,
}

impl<S: BaseLayerStore> LayerController<S> {
    /// Creates a controller over `stack`.
    pub fn new(stack: LayerStack<S>, mode: CombinationMode) -> Self {
        Self {
            stack,
            mode,
            held: HoldState::default(),
            pressed: HashMap::new(),
        }
    }

    /// Combination mode in use.
    #[must_use]
    pub const fn mode(&self) -> CombinationMode {
        self.mode
    }

    /// Underlying layer stack.
    #[must_use]
    pub const fn stack(&self) -> &LayerStack<S> {
        &self.stack
    }

    /// Underlying layer stack, mutably.
    pub fn stack_mut(&mut self) -> &mut LayerStack<S> {
        &mut self.stack
    }

    /// Physical hold state of LOWER and RAISE.
    #[must_use]
    pub const fn hold_state(&self) -> HoldState {
        self.held
    }

    fn tri_layer(&self) -> Option<TriLayer> {
        self.stack.keymap().metadata.tri_layer
    }

    /// Current tri-layer state, `None` if the keymap has no tri-layer.
    #[must_use]
    pub fn tri_state(&self) -> Option<TriLayerState> {
        let tri = self.tri_layer()?;
        let flags = (
            self.stack.is_active(tri.lower),
            self.stack.is_active(tri.raise),
            self.stack.is_active(tri.adjust),
        );
        Some(match flags {
            (false, false, false) => TriLayerState::Idle,
            (true, false, false) => TriLayerState::Lower,
            (false, true, false) => TriLayerState::Raise,
            (false, false, true) => TriLayerState::Adjust,
            _ => TriLayerState::Mixed,
        })
    }

    /// Applies a control-key event.
    ///
    /// Total: pairs not covered by the mode's transition table leave the
    /// state unchanged. LOWER/RAISE events are ignored when the keymap has
    /// no tri-layer.
    pub fn handle_layer_event(&mut self, event: LayerEvent) {
        if let LayerEvent::SelectBase(layer) = event {
            self.stack.select_base_layer(layer);
            return;
        }

        let Some(tri) = self.tri_layer() else {
            debug!(?event, "No tri_layer configured, ignoring event");
            return;
        };

        match event {
            LayerEvent::LowerDown => self.held.lower = true,
            LayerEvent::LowerUp => self.held.lower = false,
            LayerEvent::RaiseDown => self.held.raise = true,
            LayerEvent::RaiseUp => self.held.raise = false,
            LayerEvent::SelectBase(_) => {}
        }

        self.apply_mode(tri, event);
        debug!(?event, state = ?self.tri_state(), "tri-layer transition");
    }

    fn apply_mode(&mut self, tri: TriLayer, event: LayerEvent) {
        match self.mode {
            CombinationMode::Simple => self.apply_simple(tri, event),
            CombinationMode::Exclusive => self.apply_exclusive(tri, event),
            CombinationMode::Tracked => self.apply_tracked(tri),
        }
    }

    /// Modifier event equivalent to a momentary hold edge on `layer`, if
    /// `layer` is the Lower or Raise layer.
    fn momentary_event(&self, layer: LayerId, pressed: bool) -> Option<(TriLayer, LayerEvent)> {
        let tri = self.tri_layer()?;
        let event = match (layer == tri.lower, layer == tri.raise, pressed) {
            (true, _, true) => LayerEvent::LowerDown,
            (true, _, false) => LayerEvent::LowerUp,
            (_, true, true) => LayerEvent::RaiseDown,
            (_, true, false) => LayerEvent::RaiseUp,
            _ => return None,
        };
        Some((tri, event))
    }

    /// True while some pressed key holds `layer` through MO or LT.
    fn momentary_held(&self, layer: LayerId) -> bool {
        self.pressed.values().any(|resolved| match resolved.action {
            Action::Momentary { layer: held } | Action::LayerTap { layer: held, .. } => {
                held == layer
            }
            _ => false,
        })
    }

    /// LOWER/RAISE inputs: the physical keys plus MO/LT holds on their layers.
    fn tri_inputs(&self, tri: TriLayer) -> HoldState {
        HoldState {
            lower: self.held.lower || self.momentary_held(tri.lower),
            raise: self.held.raise || self.momentary_held(tri.raise),
        }
    }

    fn apply_simple(&mut self, tri: TriLayer, event: LayerEvent) {
        match event {
            LayerEvent::LowerDown => self.stack.activate(tri.lower),
            LayerEvent::LowerUp => self.stack.deactivate(tri.lower),
            LayerEvent::RaiseDown => self.stack.activate(tri.raise),
            LayerEvent::RaiseUp => self.stack.deactivate(tri.raise),
            LayerEvent::SelectBase(_) => return,
        }
        self.update_tri_layer(tri);
    }

    fn apply_exclusive(&mut self, tri: TriLayer, event: LayerEvent) {
        // (this key's layer, the other modifier's layer)
        let (own, other) = match event {
            LayerEvent::LowerDown | LayerEvent::LowerUp => (tri.lower, tri.raise),
            LayerEvent::RaiseDown | LayerEvent::RaiseUp => (tri.raise, tri.lower),
            LayerEvent::SelectBase(_) => return,
        };

        if matches!(event, LayerEvent::LowerDown | LayerEvent::RaiseDown) {
            self.stack.activate(own);
            self.update_tri_layer(tri);
            if self.stack.is_active(tri.adjust) {
                self.stack.deactivate(own);
                self.stack.deactivate(other);
            }
        } else {
            self.stack.deactivate(own);
            if self.stack.is_active(tri.adjust) {
                self.stack.deactivate(tri.adjust);
                self.stack.activate(other);
            }
        }
    }

    fn apply_tracked(&mut self, tri: TriLayer) {
        let HoldState { lower, raise } = self.tri_inputs(tri);
        let targets = [
            (tri.lower, lower && !raise),
            (tri.raise, raise && !lower),
            (tri.adjust, lower && raise),
        ];
        for (layer, on) in targets {
            if on {
                self.stack.activate(layer);
            } else {
                self.stack.deactivate(layer);
            }
        }
    }

    /// Adjust on iff Lower and Raise are both on.
    fn update_tri_layer(&mut self, tri: TriLayer) {
        if self.stack.is_active(tri.lower) && self.stack.is_active(tri.raise) {
            self.stack.activate(tri.adjust);
        } else {
            self.stack.deactivate(tri.adjust);
        }
    }

    /// Processes one physical key edge and returns its resolution.
    ///
    /// A release reports (and undoes) the action its press resolved to, even
    /// if the active layers changed while the key was held.
    pub fn process(&mut self, event: KeyEvent) -> Resolution {
        let position = event.position;

        let resolved = if event.pressed {
            let resolved = self.stack.resolve(position);
            self.pressed.insert(position, resolved.clone());
            self.apply_press(&resolved.action);
            resolved
        } else {
            let resolved = self
                .pressed
                .remove(&position)
                .unwrap_or_else(|| self.stack.resolve(position));
            self.apply_release(&resolved.action);
            resolved
        };

        debug!(
            position = %position,
            pressed = event.pressed,
            action = %resolved.action,
            layer = %resolved.layer,
            "key resolved"
        );

        Resolution {
            position,
            pressed: event.pressed,
            action: resolved.action,
            layer: resolved.layer,
        }
    }

    fn apply_press(&mut self, action: &Action) {
        match action {
            Action::Lower => self.handle_layer_event(LayerEvent::LowerDown),
            Action::Raise => self.handle_layer_event(LayerEvent::RaiseDown),
            Action::SelectBase { layer } => self.handle_layer_event(LayerEvent::SelectBase(*layer)),
            Action::Momentary { layer } | Action::LayerTap { layer, .. } => {
                match self.momentary_event(*layer, true) {
                    Some((tri, event)) => self.apply_mode(tri, event),
                    None => self.stack.activate(*layer),
                }
            }
            Action::Toggle { layer } => {
                if self.stack.is_active(*layer) {
                    self.stack.deactivate(*layer);
                } else {
                    self.stack.activate(*layer);
                }
            }
            Action::DefaultLayer { layer } => self.stack.set_default_layer(*layer),
            Action::Key { .. } | Action::NoOp => {}
        }
    }

    fn apply_release(&mut self, action: &Action) {
        match action {
            Action::Lower => self.handle_layer_event(LayerEvent::LowerUp),
            Action::Raise => self.handle_layer_event(LayerEvent::RaiseUp),
            Action::Momentary { layer } | Action::LayerTap { layer, .. } => {
                match self.momentary_event(*layer, false) {
                    Some((tri, event)) => self.apply_mode(tri, event),
                    None => self.stack.deactivate(*layer),
                }
            }
            _ => {}
        }
    }

    /// Runs deferred persistence writes. Call after each event has been
    /// resolved and forwarded.
    pub fn flush(&mut self) {
        self.stack.flush_store();
    }

    /// Checks the tri-layer invariants for the current mode.
    ///
    /// A violation means a bug in the controller, not a recoverable state.
    pub fn check_invariants(&self) -> Result<(), String> {
        let Some(tri) = self.tri_layer() else {
            return Ok(());
        };
        let active: LayerSet = self.stack.active_layers();
        let lower = active.contains(tri.lower);
        let raise = active.contains(tri.raise);
        let adjust = active.contains(tri.adjust);
        let inputs = self.tri_inputs(tri);

        if adjust && !inputs.lower && !inputs.raise {
            return Err("Adjust is active while neither LOWER nor RAISE is held".to_string());
        }

        match self.mode {
            CombinationMode::Simple => {
                if adjust && !(lower && raise) {
                    return Err("Adjust is active without both Lower and Raise".to_string());
                }
            }
            CombinationMode::Exclusive => {
                if adjust && (lower || raise) {
                    return Err("Adjust is active together with Lower or Raise".to_string());
                }
            }
            CombinationMode::Tracked => {
                if adjust != (inputs.lower && inputs.raise) {
                    return Err(format!(
                        "Adjust is {} but hold state is {:?}",
                        if adjust { "on" } else { "off" },
                        inputs
                    ));
                }
                if adjust && (lower || raise) {
                    return Err("Adjust is active together with Lower or Raise".to_string());
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_from_str() {
        assert_eq!("simple".parse::<CombinationMode>(), Ok(CombinationMode::Simple));
        assert_eq!(
            "Exclusive".parse::<CombinationMode>(),
            Ok(CombinationMode::Exclusive)
        );
        assert_eq!("tracked".parse::<CombinationMode>(), Ok(CombinationMode::Tracked));
        assert!("both".parse::<CombinationMode>().is_err());
    }

    #[test]
    fn test_mode_round_trips_through_display() {
        for mode in CombinationMode::ALL {
            assert_eq!(mode.to_string().parse::<CombinationMode>(), Ok(mode));
        }
        assert_eq!(CombinationMode::default(), CombinationMode::Tracked);
    }

    #[test]
    fn test_hid_event_only_for_keys() {
        let position = Position::new(0, 0);
        let layer = LayerId::new(0).unwrap();
        let key = Resolution {
            position,
            pressed: true,
            action: Action::key("KC_A"),
            layer,
        };
        assert_eq!(
            key.hid_event(),
            Some(HidEvent {
                keycode: "KC_A".to_string(),
                pressed: true
            })
        );

        let control = Resolution {
            action: Action::Lower,
            ..key
        };
        assert_eq!(control.hid_event(), None);
    }
}
