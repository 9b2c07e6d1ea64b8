//! Layer composition engine.
//!
//! [`LayerStack`] holds the activation set and base layer and resolves key
//! positions; [`LayerController`] turns key edges into stack mutations using
//! the configured [`CombinationMode`]; [`persistence`] provides the stores
//! that keep the base layer selection across restarts.

pub mod controller;
pub mod layer_stack;
pub mod persistence;

// Re-export commonly used types
pub use controller::{
    CombinationMode, HidEvent, HoldState, KeyEvent, LayerController, LayerEvent, Resolution,
    TriLayerState,
};
pub use layer_stack::{LayerStack, Resolved};
pub use persistence::{BaseLayerStore, FileStore, MemoryStore, WriteBehind};
