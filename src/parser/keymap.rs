//! Markdown keymap file parsing.
//!
//! A keymap file uses YAML frontmatter for metadata and one Markdown table
//! per layer for the key assignments.

// Table coordinates are bounded by the u8 position type
#![allow(clippy::cast_possible_truncation)]

use crate::constants::APP_BINARY_NAME;
use crate::models::{KeyDefinition, Keymap, KeymapMetadata, Layer, LayerId, Position};
use crate::services::keycodes::KeycodeDecoder;
use anyhow::{Context, Result};
use regex::Regex;
use std::path::Path;

/// Layer table as read from the file, before keycodes are decoded.
#[derive(Debug)]
struct RawLayer {
    id: LayerId,
    name: String,
    cells: Vec<(Position, String)>,
}

/// Parses a Markdown keymap file into a validated [`Keymap`].
///
/// # File Format
///
/// ```markdown
/// ---
/// name: "Adoah orthsplit"
/// version: "1.0"
/// base_layers:
///   QWERTY: 0
///   DVORAK: 1
/// default_base: QWERTY
/// tri_layer:
///   lower: 3
///   raise: 2
///   adjust: 16
/// ---
///
/// # Adoah
///
/// ## Layer 0: Qwerty
///
/// | 0      | 1    | 2      |
/// |--------|------|--------|
/// | KC_TAB | KC_Q | KC_W   |
/// | LOWER  | KC_SPC | RAISE |
/// ```
///
/// The first table row is a column header and is skipped. Empty cells are
/// gaps (split boards) and keep their column index.
///
/// # Errors
///
/// Returns errors for a missing file, invalid YAML frontmatter, malformed
/// layer headers, invalid keycode syntax, and keymap validation failures.
pub fn parse_keymap(path: &Path) -> Result<Keymap> {
    if !path.exists() {
        anyhow::bail!(
            "Keymap file not found: {}\n\n\
             Please check the file path and try again.\n\
             To inspect a keymap, run: {} inspect --keymap FILE",
            path.display(),
            APP_BINARY_NAME
        );
    }

    if !path.is_file() {
        anyhow::bail!(
            "Path is not a file: {}\n\n\
            Please provide a path to a Markdown (.md) keymap file.",
            path.display()
        );
    }

    let content = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read keymap file: {}", path.display()))?;

    parse_keymap_str(&content)
        .with_context(|| format!("Failed to parse keymap file: {}", path.display()))
}

/// Parses a Markdown keymap from a string.
pub fn parse_keymap_str(content: &str) -> Result<Keymap> {
    let lines: Vec<&str> = content.lines().collect();

    let (metadata, content_start) = parse_frontmatter(&lines)?;
    let raw_layers = parse_content(&lines[content_start..])?;

    // Decode once every layer is known so keycodes may reference later layers
    let directory: Vec<(LayerId, String)> = raw_layers
        .iter()
        .map(|raw| (raw.id, raw.name.clone()))
        .collect();
    let decoder = KeycodeDecoder::new(&directory, &metadata.base_layers);

    let mut layers = Vec::with_capacity(raw_layers.len());
    for raw in raw_layers {
        let mut layer = Layer::new(raw.id, raw.name)?;
        for (position, keycode) in raw.cells {
            let entry = decoder.decode(&keycode).with_context(|| {
                format!("Error in layer {} ({}) at {}", layer.id, layer.name, position)
            })?;
            layer.add_key(KeyDefinition::new(position, keycode, entry))?;
        }
        layers.push(layer);
    }

    Keymap::new(metadata, layers)
}

/// Parses YAML frontmatter from the beginning of the file.
///
/// Returns the parsed metadata and the line index where content starts.
fn parse_frontmatter(lines: &[&str]) -> Result<(KeymapMetadata, usize)> {
    let mut start_idx = None;
    let mut end_idx = None;

    for (idx, line) in lines.iter().enumerate() {
        if line.trim() == "---" {
            if start_idx.is_none() {
                start_idx = Some(idx);
            } else {
                end_idx = Some(idx);
                break;
            }
        }
    }

    let start =
        start_idx.ok_or_else(|| anyhow::anyhow!("Missing frontmatter start marker (---)"))?;
    let end = end_idx.ok_or_else(|| anyhow::anyhow!("Missing frontmatter end marker (---)"))?;

    let yaml_content = lines[start + 1..end].join("\n");

    let metadata: KeymapMetadata =
        serde_yml::from_str(&yaml_content).context("Failed to parse YAML frontmatter")?;

    metadata.validate()?;

    Ok((metadata, end + 1))
}

/// Parses the content section into raw layer tables.
fn parse_content(lines: &[&str]) -> Result<Vec<RawLayer>> {
    let mut layers = Vec::new();
    let mut line_num = 0;

    while line_num < lines.len() {
        let line = lines[line_num].trim();

        if line.starts_with("## Layer ") {
            let (layer, next) = parse_layer(lines, line_num)
                .with_context(|| format!("Error parsing layer at line {}", line_num + 1))?;
            layers.push(layer);
            line_num = next;
            continue;
        }

        line_num += 1;
    }

    Ok(layers)
}

/// Parses a single layer section: header line followed by its table.
fn parse_layer(lines: &[&str], start_line: usize) -> Result<(RawLayer, usize)> {
    let header_line = lines[start_line].trim();

    let layer_regex = Regex::new(r"^##\s+Layer\s+(\d+):\s+(.+)$").unwrap();
    let captures = layer_regex
        .captures(header_line)
        .ok_or_else(|| anyhow::anyhow!("Invalid layer header format: {header_line}"))?;

    let number: u8 = captures[1]
        .parse()
        .context("Failed to parse layer number")?;
    let id = LayerId::new(number)?;
    let name = captures[2].trim().to_string();

    // Skip blank lines and prose between the header and the table
    let mut line_num = start_line + 1;
    while line_num < lines.len() {
        let line = lines[line_num].trim();
        if line.starts_with('|') || line.starts_with("##") {
            break;
        }
        line_num += 1;
    }

    let mut layer = RawLayer {
        id,
        name,
        cells: Vec::new(),
    };
    let next = parse_layer_table(lines, line_num, &mut layer)?;

    Ok((layer, next))
}

/// Parses a layer's key table.
fn parse_layer_table(lines: &[&str], start_line: usize, layer: &mut RawLayer) -> Result<usize> {
    let mut line_num = start_line;
    let mut row: u8 = 0;

    // Skip table header row
    if line_num < lines.len() && lines[line_num].trim().starts_with('|') {
        line_num += 1;
    }

    // Skip separator row (|---|---|)
    if line_num < lines.len() && lines[line_num].contains("---") {
        line_num += 1;
    }

    while line_num < lines.len() {
        let line = lines[line_num].trim();

        // Stop at empty line or next section
        if line.is_empty() || line.starts_with("##") {
            break;
        }

        if line.starts_with('|') {
            parse_table_row(line, row, layer).with_context(|| {
                format!("Error parsing table row {} at line {}", row, line_num + 1)
            })?;
            row = row
                .checked_add(1)
                .ok_or_else(|| anyhow::anyhow!("Layer {} has too many rows", layer.id))?;
        }

        line_num += 1;
    }

    Ok(line_num)
}

/// Parses a single table row into raw cells.
fn parse_table_row(line: &str, row: u8, layer: &mut RawLayer) -> Result<()> {
    // Keep empty cells so column indices survive split-board gaps
    let cells: Vec<&str> = line.split('|').map(str::trim).collect();

    // Drop the leading and trailing empty elements produced by the outer pipes
    let cells = if cells.len() >= 2 {
        &cells[1..cells.len() - 1]
    } else {
        &cells[..]
    };

    let keycode_regex = Regex::new(r"^[A-Z_][A-Z_0-9]*(?:\(.*\))?$").unwrap();

    for (col, cell) in cells.iter().enumerate() {
        if cell.is_empty() {
            continue;
        }

        if col > usize::from(u8::MAX) {
            anyhow::bail!("Row {row} has too many columns");
        }

        if !keycode_regex.is_match(cell) {
            anyhow::bail!("Invalid keycode syntax at row {row}, col {col}: {cell}");
        }

        layer
            .cells
            .push((Position::new(row, col as u8), (*cell).to_string()));
    }

    Ok(())
}
