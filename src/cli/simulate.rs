//! Simulate command: replay an event script through the layer controller.
//!
//! Script format, one event per line:
//!
//! ```text
//! # comment
//! down 0 1        # key press at row 0, col 1
//! up 0 1          # key release
//! lower down      # LOWER edge without a key position
//! raise up
//! base DVORAK     # base layer selector
//! ```

use crate::cli::common::{
    load_config, load_keymap, print_json, resolve_base, resolve_mode, CliError, CliResult,
};
use crate::config::Config;
use crate::engine::{
    BaseLayerStore, FileStore, KeyEvent, LayerController, LayerEvent, LayerStack, MemoryStore,
    TriLayerState, WriteBehind,
};
use crate::models::{Action, Keymap, LayerId, Position};
use clap::Args;
use serde::Serialize;
use std::fmt;
use std::io::Read;
use std::path::PathBuf;
use tracing::{info, warn};

/// Replay key events through the layer controller
#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Path to keymap markdown file (defaults to paths.keymap from config)
    #[arg(short, long, value_name = "FILE")]
    pub keymap: Option<PathBuf>,

    /// Event script file, or - for stdin (default: stdin)
    #[arg(short, long, value_name = "FILE")]
    pub events: Option<PathBuf>,

    /// Combination mode: simple, exclusive, or tracked (defaults to engine.mode)
    #[arg(long, value_name = "MODE")]
    pub mode: Option<String>,

    /// Base layer state file (defaults to paths.state_file or the config directory)
    #[arg(long, value_name = "FILE")]
    pub state_file: Option<PathBuf>,

    /// Keep base layer selections in memory only
    #[arg(long)]
    pub no_persist: bool,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

/// One parsed script line.
#[derive(Debug, Clone, PartialEq, Eq)]
enum ScriptEvent {
    Key(KeyEvent),
    Layer(LayerEvent),
}

impl fmt::Display for ScriptEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Key(event) => {
                let edge = if event.pressed { "down" } else { "up" };
                write!(f, "{edge} {}", event.position)
            }
            Self::Layer(LayerEvent::LowerDown) => f.write_str("lower down"),
            Self::Layer(LayerEvent::LowerUp) => f.write_str("lower up"),
            Self::Layer(LayerEvent::RaiseDown) => f.write_str("raise down"),
            Self::Layer(LayerEvent::RaiseUp) => f.write_str("raise up"),
            Self::Layer(LayerEvent::SelectBase(layer)) => write!(f, "base {layer}"),
        }
    }
}

#[derive(Debug, Serialize)]
struct StepOutput {
    line: usize,
    event: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    action: Option<Action>,
    #[serde(skip_serializing_if = "Option::is_none")]
    layer: Option<u8>,
    #[serde(skip_serializing_if = "Option::is_none")]
    hid: Option<String>,
    active_layers: Vec<u8>,
    base_layer: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    tri_state: Option<TriLayerState>,
}

#[derive(Debug, Serialize)]
struct SimulateResponse {
    mode: String,
    steps: Vec<StepOutput>,
    final_base_layer: u8,
    invariant_violations: usize,
}

impl SimulateArgs {
    /// Execute the simulate command
    pub fn execute(&self) -> CliResult<()> {
        let config = load_config()?;
        let keymap = load_keymap(self.keymap.as_deref(), &config)?;
        let mode = resolve_mode(self.mode.as_deref(), &config)?;

        let script = self.read_script()?;
        let events = parse_script(&script, &keymap)?;

        let store = self.open_store(&config)?;
        let stack = LayerStack::new(keymap, store);
        let mut controller = LayerController::new(stack, mode);
        info!(mode = %mode, events = events.len(), "Starting simulation");

        let mut steps = Vec::with_capacity(events.len());
        let mut violations = 0;

        for (line, event) in events {
            let resolution = match event {
                ScriptEvent::Key(key) => Some(controller.process(key)),
                ScriptEvent::Layer(layer_event) => {
                    controller.handle_layer_event(layer_event);
                    None
                }
            };

            // Persistence runs after the event has been resolved
            controller.flush();

            if let Err(violation) = controller.check_invariants() {
                warn!(line, event = %event, "Layer state invariant violated: {violation}");
                violations += 1;
            }

            let stack = controller.stack();
            steps.push(StepOutput {
                line,
                event: event.to_string(),
                hid: resolution
                    .as_ref()
                    .and_then(|r| r.hid_event())
                    .map(|hid| hid.keycode),
                action: resolution.as_ref().map(|r| r.action.clone()),
                layer: resolution.as_ref().map(|r| r.layer.get()),
                active_layers: stack
                    .active_layers()
                    .iter_descending()
                    .map(LayerId::get)
                    .collect(),
                base_layer: stack.base_layer().get(),
                tri_state: controller.tri_state(),
            });
        }

        let response = SimulateResponse {
            mode: mode.to_string(),
            steps,
            final_base_layer: controller.stack().base_layer().get(),
            invariant_violations: violations,
        };

        if self.json {
            print_json(&response)?;
        } else {
            print_steps(&response);
        }

        if violations > 0 {
            return Err(CliError::validation(format!(
                "{violations} layer state invariant violation(s)"
            )));
        }

        Ok(())
    }

    fn read_script(&self) -> CliResult<String> {
        match &self.events {
            Some(path) if path.as_os_str() != "-" => std::fs::read_to_string(path).map_err(|e| {
                CliError::io(format!(
                    "Failed to read event script {}: {e}",
                    path.display()
                ))
            }),
            _ => {
                let mut script = String::new();
                std::io::stdin()
                    .read_to_string(&mut script)
                    .map_err(|e| CliError::io(format!("Failed to read events from stdin: {e}")))?;
                Ok(script)
            }
        }
    }

    fn open_store(&self, config: &Config) -> CliResult<Box<dyn BaseLayerStore>> {
        if self.no_persist {
            return Ok(Box::new(MemoryStore::new()));
        }

        let path = match &self.state_file {
            Some(path) => path.clone(),
            None => config
                .state_file_path()
                .map_err(|e| CliError::io(format!("Failed to locate state file: {e}")))?,
        };

        Ok(Box::new(WriteBehind::new(FileStore::new(path))))
    }
}

fn print_steps(response: &SimulateResponse) {
    println!("Mode: {}", response.mode);
    for step in &response.steps {
        let active = if step.active_layers.is_empty() {
            "-".to_string()
        } else {
            step.active_layers
                .iter()
                .map(u8::to_string)
                .collect::<Vec<_>>()
                .join(",")
        };

        match (&step.action, step.layer) {
            (Some(action), Some(layer)) => println!(
                "{:>4}  {:<14} -> {:<16} layer {:<2}  active [{}]  base {}",
                step.line, step.event, action.to_string(), layer, active, step.base_layer
            ),
            _ => println!(
                "{:>4}  {:<14}    {:<16}           active [{}]  base {}",
                step.line, step.event, "", active, step.base_layer
            ),
        }
    }
    println!("Final base layer: {}", response.final_base_layer);
}

/// Parses an event script into `(line number, event)` pairs.
fn parse_script(script: &str, keymap: &Keymap) -> CliResult<Vec<(usize, ScriptEvent)>> {
    let mut events = Vec::new();

    for (idx, raw) in script.lines().enumerate() {
        let line_number = idx + 1;
        let line = raw.split('#').next().unwrap_or("").trim();
        if line.is_empty() {
            continue;
        }

        let event = parse_line(line, keymap)
            .map_err(|e| CliError::validation(format!("Line {line_number}: {}", e.message)))?;
        events.push((line_number, event));
    }

    Ok(events)
}

fn parse_line(line: &str, keymap: &Keymap) -> CliResult<ScriptEvent> {
    let words: Vec<&str> = line.split_whitespace().collect();

    match words.as_slice() {
        [edge @ ("down" | "up"), row, col] => {
            let position = Position::new(parse_coord(row, "row")?, parse_coord(col, "col")?);
            Ok(ScriptEvent::Key(if *edge == "down" {
                KeyEvent::press(position)
            } else {
                KeyEvent::release(position)
            }))
        }
        [key, edge] if key.eq_ignore_ascii_case("lower") || key.eq_ignore_ascii_case("raise") => {
            let lower = key.eq_ignore_ascii_case("lower");
            let event = match (lower, *edge) {
                (true, "down") => LayerEvent::LowerDown,
                (true, "up") => LayerEvent::LowerUp,
                (false, "down") => LayerEvent::RaiseDown,
                (false, "up") => LayerEvent::RaiseUp,
                _ => {
                    return Err(CliError::validation(format!(
                        "Expected 'down' or 'up' after '{key}', got '{edge}'"
                    )))
                }
            };
            Ok(ScriptEvent::Layer(event))
        }
        ["base", name] => Ok(ScriptEvent::Layer(LayerEvent::SelectBase(resolve_base(
            keymap, name,
        )?))),
        _ => Err(CliError::validation(format!(
            "Unrecognized event '{line}'. Expected 'down R C', 'up R C', \
             'lower down|up', 'raise down|up', or 'base NAME'"
        ))),
    }
}

fn parse_coord(value: &str, what: &str) -> CliResult<u8> {
    value
        .parse()
        .map_err(|_| CliError::validation(format!("Invalid {what} '{value}': expected 0-255")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::parser::parse_keymap_str;

    const KEYMAP: &str = r#"---
name: "Script test"
version: "1.0"
base_layers:
  QWERTY: 0
  DVORAK: 1
tri_layer:
  lower: 3
  raise: 2
  adjust: 4
---

## Layer 0: Qwerty

| 0 | 1 |
|---|---|
| LOWER | RAISE |

## Layer 1: Dvorak

| 0 | 1 |
|---|---|
| LOWER | RAISE |

## Layer 2: Raise

| 0 | 1 |
|---|---|
| _______ | _______ |

## Layer 3: Lower

| 0 | 1 |
|---|---|
| _______ | _______ |

## Layer 4: Adjust

| 0 | 1 |
|---|---|
| QWERTY | DVORAK |
"#;

    fn keymap() -> Keymap {
        parse_keymap_str(KEYMAP).unwrap()
    }

    #[test]
    fn test_parse_script_skips_comments_and_blanks() {
        let script = "# header\n\ndown 0 1   # press\nup 0 1\n";
        let events = parse_script(script, &keymap()).unwrap();

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].0, 3);
        assert_eq!(
            events[0].1,
            ScriptEvent::Key(KeyEvent::press(Position::new(0, 1)))
        );
        assert_eq!(
            events[1].1,
            ScriptEvent::Key(KeyEvent::release(Position::new(0, 1)))
        );
    }

    #[test]
    fn test_parse_named_layer_events() {
        let keymap = keymap();
        assert_eq!(
            parse_line("lower down", &keymap).unwrap(),
            ScriptEvent::Layer(LayerEvent::LowerDown)
        );
        assert_eq!(
            parse_line("RAISE up", &keymap).unwrap(),
            ScriptEvent::Layer(LayerEvent::RaiseUp)
        );
        assert_eq!(
            parse_line("base dvorak", &keymap).unwrap(),
            ScriptEvent::Layer(LayerEvent::SelectBase(LayerId::new(1).unwrap()))
        );
    }

    #[test]
    fn test_parse_rejects_bad_lines() {
        let keymap = keymap();
        assert!(parse_line("press 0 1", &keymap).is_err());
        assert!(parse_line("down 0", &keymap).is_err());
        assert!(parse_line("down 0 999", &keymap).is_err());
        assert!(parse_line("lower sideways", &keymap).is_err());
        // Lower is not a base layer
        assert!(parse_line("base 3", &keymap).is_err());
    }

    #[test]
    fn test_parse_script_reports_line_number() {
        let err = parse_script("down 0 0\nbogus\n", &keymap()).unwrap_err();
        assert!(err.message.starts_with("Line 2:"), "{}", err.message);
    }

    #[test]
    fn test_event_display() {
        let event = ScriptEvent::Key(KeyEvent::press(Position::new(2, 3)));
        assert_eq!(event.to_string(), "down [2,3]");
        assert_eq!(
            ScriptEvent::Layer(LayerEvent::RaiseDown).to_string(),
            "raise down"
        );
    }
}
