//! Shared test fixtures for library and E2E CLI tests.
#![allow(dead_code)] // Not every test binary uses every fixture

use layerstack::models::{Keymap, LayerId, Position};
use layerstack::parser::parse_keymap_str;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::TempDir;

/// Two base layers, Lower/Raise/Adjust and a Nav overlay reached through MO/LT.
///
/// Row 1 of every overlay is transparent so the LOWER/RAISE/Nav keys on the
/// base layers stay reachable from any layer state.
pub const ADOAH_KEYMAP: &str = r#"---
name: "Adoah test"
description: "Split ortho test keymap"
version: "1.0"
base_layers:
  QWERTY: 0
  DVORAK: 1
default_base: QWERTY
tri_layer:
  lower: 3
  raise: 2
  adjust: 16
---

# Adoah

## Layer 0: Qwerty

| 0 | 1 | 2 | 3 | 4 |
|---|---|---|---|---|
| KC_Q | KC_W | KC_E | KC_R | KC_T |
| LOWER | KC_SPC | MO(_NAV) | KC_ENT | RAISE |

## Layer 1: Dvorak

| 0 | 1 | 2 | 3 | 4 |
|---|---|---|---|---|
| KC_SCLN | KC_COMM | KC_DOT | KC_P | KC_Y |
| LOWER | KC_SPC | LT(_NAV, KC_TAB) | KC_ENT | RAISE |

## Layer 2: Raise

| 0 | 1 | 2 | 3 | 4 |
|---|---|---|---|---|
| KC_1 | KC_2 | KC_3 | KC_4 | |
| _______ | _______ | _______ | _______ | _______ |

## Layer 3: Lower

| 0 | 1 | 2 | 3 | 4 |
|---|---|---|---|---|
| KC_EXLM | KC_AT | _______ | KC_DLR | TG(_DVORAK) |
| _______ | _______ | _______ | _______ | _______ |

## Layer 4: Nav

| 0 | 1 | 2 | 3 | 4 |
|---|---|---|---|---|
| KC_HOME | KC_UP | KC_END | XXXXXXX | _______ |
| _______ | _______ | _______ | _______ | _______ |

## Layer 16: Adjust

| 0 | 1 | 2 | 3 | 4 |
|---|---|---|---|---|
| KC_F1 | QWERTY | DVORAK | DF(1) | KC_F5 |
| _______ | _______ | _______ | _______ | _______ |
"#;

/// Keymap without a tri-layer: LOWER/RAISE are not allowed, MO/TG are.
pub const PLAIN_KEYMAP: &str = r#"---
name: "Plain"
version: "1.0"
base_layers:
  BASE: 0
---

## Layer 0: Base

| 0 | 1 |
|---|---|
| KC_A | MO(1) |

## Layer 1: Fn

| 0 | 1 |
|---|---|
| KC_F1 | _______ |
"#;

/// LOWER key position on both base layers.
pub const LOWER_KEY: Position = Position::new(1, 0);
/// RAISE key position on both base layers.
pub const RAISE_KEY: Position = Position::new(1, 4);
/// MO(_NAV) on Qwerty, LT(_NAV, KC_TAB) on Dvorak.
pub const NAV_KEY: Position = Position::new(1, 2);

pub const QWERTY: u8 = 0;
pub const DVORAK: u8 = 1;
pub const RAISE: u8 = 2;
pub const LOWER: u8 = 3;
pub const NAV: u8 = 4;
pub const ADJUST: u8 = 16;

/// Shorthand for a layer id in tests.
pub fn id(n: u8) -> LayerId {
    LayerId::new(n).expect("valid layer id")
}

/// Parsed [`ADOAH_KEYMAP`].
pub fn adoah_keymap() -> Keymap {
    parse_keymap_str(ADOAH_KEYMAP).expect("fixture keymap parses")
}

/// Writes a keymap file into `dir` and returns its path.
pub fn write_keymap(dir: &Path, name: &str, content: &str) -> PathBuf {
    let path = dir.join(name);
    fs::write(&path, content).expect("Failed to write keymap fixture");
    path
}

/// Path to the layerstack binary built for integration tests.
pub fn layerstack_bin() -> &'static str {
    env!("CARGO_BIN_EXE_layerstack")
}

/// Isolated environment for E2E tests: temp dir holding the keymap, the
/// config directory and the state file.
pub struct TestEnv {
    dir: TempDir,
}

impl TestEnv {
    /// Creates an environment with [`ADOAH_KEYMAP`] written to `adoah.md`.
    pub fn new() -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        write_keymap(dir.path(), "adoah.md", ADOAH_KEYMAP);
        fs::create_dir_all(dir.path().join("config")).expect("Failed to create config dir");
        Self { dir }
    }

    /// Root of the temp dir.
    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Path of the fixture keymap.
    pub fn keymap(&self) -> PathBuf {
        self.dir.path().join("adoah.md")
    }

    /// Path of the fixture keymap as a string argument.
    pub fn keymap_arg(&self) -> String {
        self.keymap().display().to_string()
    }

    /// Isolated config directory (`LAYERSTACK_CONFIG_DIR`).
    pub fn config_dir(&self) -> PathBuf {
        self.dir.path().join("config")
    }

    /// Default state file inside the isolated config directory.
    pub fn default_state_file(&self) -> PathBuf {
        self.config_dir().join("state.toml")
    }

    /// Writes a file into the temp dir and returns its path.
    pub fn write(&self, name: &str, content: &str) -> PathBuf {
        let path = self.dir.path().join(name);
        fs::write(&path, content).expect("Failed to write fixture file");
        path
    }

    /// Command with the isolated config directory and `RUST_LOG` cleared.
    pub fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(layerstack_bin());
        cmd.env("LAYERSTACK_CONFIG_DIR", self.config_dir());
        cmd.env_remove("RUST_LOG");
        cmd.args(args);
        cmd
    }
}
