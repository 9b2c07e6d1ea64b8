//! Layer identifiers, activation sets and per-position key entries.

use crate::constants::MAX_LAYERS;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of a keymap layer.
///
/// Layers are fixed at keymap load time; the valid range is `0..MAX_LAYERS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u8", into = "u8")]
pub struct LayerId(u8);

impl LayerId {
    /// Creates a layer id, rejecting values outside `0..MAX_LAYERS`.
    pub fn new(id: u8) -> Result<Self> {
        if id >= MAX_LAYERS {
            anyhow::bail!(
                "Layer {} is out of range (layers must be 0-{})",
                id,
                MAX_LAYERS - 1
            );
        }
        Ok(Self(id))
    }

    /// Raw layer number.
    #[must_use]
    pub const fn get(self) -> u8 {
        self.0
    }

    const fn mask(self) -> u32 {
        1 << self.0
    }
}

impl TryFrom<u8> for LayerId {
    type Error = anyhow::Error;

    fn try_from(value: u8) -> Result<Self> {
        Self::new(value)
    }
}

impl From<LayerId> for u8 {
    fn from(id: LayerId) -> Self {
        id.0
    }
}

impl fmt::Display for LayerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Layer activation set: one flag per layer id, stored as a bitset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Hash)]
pub struct LayerSet(u32);

impl LayerSet {
    /// Empty set.
    #[must_use]
    pub const fn empty() -> Self {
        Self(0)
    }

    /// Sets the flag for `layer`.
    pub fn insert(&mut self, layer: LayerId) {
        self.0 |= layer.mask();
    }

    /// Clears the flag for `layer`.
    pub fn remove(&mut self, layer: LayerId) {
        self.0 &= !layer.mask();
    }

    /// Returns true if `layer` is set.
    #[must_use]
    pub const fn contains(self, layer: LayerId) -> bool {
        self.0 & layer.mask() != 0
    }

    /// Returns true if no layer is set.
    #[must_use]
    pub const fn is_empty(self) -> bool {
        self.0 == 0
    }

    /// Raw bit representation (bit n = layer n).
    #[must_use]
    pub const fn bits(self) -> u32 {
        self.0
    }

    /// Iterates active layers from the highest id to the lowest.
    pub fn iter_descending(self) -> impl Iterator<Item = LayerId> {
        (0..MAX_LAYERS)
            .rev()
            .map(LayerId)
            .filter(move |layer| self.contains(*layer))
    }
}

impl FromIterator<LayerId> for LayerSet {
    fn from_iter<I: IntoIterator<Item = LayerId>>(iter: I) -> Self {
        let mut set = Self::empty();
        for layer in iter {
            set.insert(layer);
        }
        set
    }
}

/// Position in visual grid coordinates of the keymap tables.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    /// Visual row (0-based)
    pub row: u8,
    /// Visual column (0-based, gaps in split boards keep their column index)
    pub col: u8,
}

impl Position {
    /// Creates a new Position with the given row and column.
    #[must_use]
    pub const fn new(row: u8, col: u8) -> Self {
        Self { row, col }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{},{}]", self.row, self.col)
    }
}

/// Resolves a layer reference against `(id, name)` pairs.
///
/// Accepts a layer number (`"3"`), a layer name (`"Lower"`), or a C-style
/// define (`"_LOWER"`); names compare case-insensitively.
pub fn find_layer_ref<'a, I>(reference: &str, layers: I) -> Option<LayerId>
where
    I: IntoIterator<Item = (LayerId, &'a str)>,
{
    let reference = reference.trim();
    let mut layers = layers.into_iter();

    if let Ok(number) = reference.parse::<u8>() {
        return layers.find(|(id, _)| id.get() == number).map(|(id, _)| id);
    }

    let wanted = reference.trim_start_matches('_');
    if wanted.is_empty() {
        return None;
    }
    layers
        .find(|(_, name)| name.eq_ignore_ascii_case(wanted))
        .map(|(id, _)| id)
}

/// The action a key position resolves to.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Action {
    /// Plain keycode forwarded to the host (e.g. "KC_A", "SFT_T(KC_ESC)")
    Key {
        /// Keycode as written in the keymap
        code: String,
    },
    /// No action (`KC_NO`)
    NoOp,
    /// Lower modifier key of the tri-layer pair
    Lower,
    /// Raise modifier key of the tri-layer pair
    Raise,
    /// Persistent base layer selector (e.g. QWERTY, DVORAK)
    SelectBase {
        /// Layer to select as base
        layer: LayerId,
    },
    /// Momentary layer while held - MO(n)
    Momentary {
        /// Target layer
        layer: LayerId,
    },
    /// Toggle layer on press - TG(n)
    Toggle {
        /// Target layer
        layer: LayerId,
    },
    /// Non-persistent base layer switch - DF(n)
    DefaultLayer {
        /// Target layer
        layer: LayerId,
    },
    /// Layer tap - LT(n, kc); only the hold half is modelled
    LayerTap {
        /// Layer held while the key is down
        layer: LayerId,
        /// Keycode that a tap would send
        tap: String,
    },
}

impl Action {
    /// Shorthand for a plain keycode action.
    pub fn key(code: impl Into<String>) -> Self {
        Self::Key { code: code.into() }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key { code } => write!(f, "{code}"),
            Self::NoOp => write!(f, "KC_NO"),
            Self::Lower => write!(f, "LOWER"),
            Self::Raise => write!(f, "RAISE"),
            Self::SelectBase { layer } => write!(f, "BASE({layer})"),
            Self::Momentary { layer } => write!(f, "MO({layer})"),
            Self::Toggle { layer } => write!(f, "TG({layer})"),
            Self::DefaultLayer { layer } => write!(f, "DF({layer})"),
            Self::LayerTap { layer, tap } => write!(f, "LT({layer}, {tap})"),
        }
    }
}

/// Entry of a layer table at one position.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyEntry {
    /// Defer to the next lower active layer
    Transparent,
    /// Concrete action
    Action(Action),
}

impl KeyEntry {
    /// Checks if this entry is transparent (passes through to lower layer).
    #[must_use]
    pub const fn is_transparent(&self) -> bool {
        matches!(self, Self::Transparent)
    }

    /// The action, unless transparent.
    #[must_use]
    pub const fn action(&self) -> Option<&Action> {
        match self {
            Self::Transparent => None,
            Self::Action(action) => Some(action),
        }
    }
}

/// Individual key assignment: position plus the raw and decoded keycode.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyDefinition {
    /// Visual position (row, col) in the grid
    pub position: Position,
    /// Keycode as written in the keymap (e.g. "KC_A", "_______", "TG(_DVORAK)")
    pub keycode: String,
    /// Decoded entry
    pub entry: KeyEntry,
}

impl KeyDefinition {
    /// Creates a new `KeyDefinition`.
    pub fn new(position: Position, keycode: impl Into<String>, entry: KeyEntry) -> Self {
        Self {
            position,
            keycode: keycode.into(),
            entry,
        }
    }
}

/// A single layer of the keymap.
///
/// # Validation
///
/// - Name must be non-empty, max 50 characters
/// - Number must be unique within the keymap
/// - Positions must be unique within the layer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Layer {
    /// Layer id
    pub id: LayerId,
    /// Human-readable name (e.g., "Qwerty", "Lower", "Adjust")
    pub name: String,
    /// Key assignments; positions not listed are gaps
    pub keys: Vec<KeyDefinition>,
}

impl Layer {
    /// Creates an empty layer.
    ///
    /// # Errors
    ///
    /// Returns an error if the name is empty or exceeds 50 characters.
    pub fn new(id: LayerId, name: impl Into<String>) -> Result<Self> {
        let name = name.into();
        Self::validate_name(&name)?;

        Ok(Self {
            id,
            name,
            keys: Vec::new(),
        })
    }

    fn validate_name(name: &str) -> Result<()> {
        if name.is_empty() {
            anyhow::bail!("Layer name cannot be empty");
        }

        if name.len() > 50 {
            anyhow::bail!(
                "Layer name '{}' exceeds maximum length of 50 characters (got {})",
                name,
                name.len()
            );
        }

        Ok(())
    }

    /// Adds a key definition, rejecting duplicate positions.
    pub fn add_key(&mut self, key: KeyDefinition) -> Result<()> {
        if self.get_key(key.position).is_some() {
            anyhow::bail!(
                "Layer {} ({}) has more than one key at {}",
                self.id,
                self.name,
                key.position
            );
        }
        self.keys.push(key);
        Ok(())
    }

    /// Gets the key at the given position.
    #[must_use]
    pub fn get_key(&self, position: Position) -> Option<&KeyDefinition> {
        self.keys.iter().find(|k| k.position == position)
    }

    /// Entry at `position`; gaps read as transparent.
    #[must_use]
    pub fn entry(&self, position: Position) -> &KeyEntry {
        static GAP: KeyEntry = KeyEntry::Transparent;
        self.get_key(position).map_or(&GAP, |k| &k.entry)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u8) -> LayerId {
        LayerId::new(n).unwrap()
    }

    #[test]
    fn test_layer_id_range() {
        assert!(LayerId::new(0).is_ok());
        assert!(LayerId::new(16).is_ok());
        assert!(LayerId::new(31).is_ok());
        assert!(LayerId::new(32).is_err());
    }

    #[test]
    fn test_layer_set_insert_remove() {
        let mut set = LayerSet::empty();
        assert!(set.is_empty());

        set.insert(id(3));
        set.insert(id(16));
        assert!(set.contains(id(3)));
        assert!(set.contains(id(16)));
        assert!(!set.contains(id(2)));

        // Idempotent
        set.insert(id(3));
        assert_eq!(set.bits(), (1 << 3) | (1 << 16));

        set.remove(id(3));
        set.remove(id(3));
        assert_eq!(set.bits(), 1 << 16);
    }

    #[test]
    fn test_layer_set_descending_order() {
        let set: LayerSet = [id(2), id(16), id(0), id(3)].into_iter().collect();
        let order: Vec<u8> = set.iter_descending().map(LayerId::get).collect();
        assert_eq!(order, vec![16, 3, 2, 0]);
    }

    #[test]
    fn test_layer_gaps_are_transparent() {
        let mut layer = Layer::new(id(2), "Raise").unwrap();
        layer
            .add_key(KeyDefinition::new(
                Position::new(0, 0),
                "KC_1",
                KeyEntry::Action(Action::key("KC_1")),
            ))
            .unwrap();

        assert_eq!(
            layer.entry(Position::new(0, 0)),
            &KeyEntry::Action(Action::key("KC_1"))
        );
        assert!(layer.entry(Position::new(3, 3)).is_transparent());
    }

    #[test]
    fn test_layer_rejects_duplicate_position() {
        let mut layer = Layer::new(id(0), "Qwerty").unwrap();
        let key = KeyDefinition::new(
            Position::new(0, 0),
            "KC_A",
            KeyEntry::Action(Action::key("KC_A")),
        );
        layer.add_key(key.clone()).unwrap();
        assert!(layer.add_key(key).is_err());
    }

    #[test]
    fn test_layer_name_validation() {
        assert!(Layer::new(id(0), "").is_err());
        assert!(Layer::new(id(0), "a".repeat(51)).is_err());
    }

    #[test]
    fn test_action_display() {
        assert_eq!(Action::key("KC_A").to_string(), "KC_A");
        assert_eq!(Action::Toggle { layer: id(1) }.to_string(), "TG(1)");
    }
}
