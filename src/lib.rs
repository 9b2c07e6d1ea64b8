//! LayerStack Library
//!
//! Layer composition for QMK-style keymaps: a layer stack that resolves key
//! positions against the active layers, and a controller that drives the
//! Lower/Raise/Adjust tri-layer state machine and persists the base layer
//! selection.

// Module declarations
pub mod cli;
pub mod config;
pub mod constants;
pub mod engine;
pub mod models;
pub mod parser;
pub mod services;
