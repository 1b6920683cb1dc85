//! Command input: JSON from `--input <file>` or piped stdin.

use serde::de::DeserializeOwned;
use std::io::{self, Read};
use std::path::Path;

/// Resolve a command's input: an explicit file wins, otherwise piped stdin.
pub fn read_input<T: DeserializeOwned>(
    path: &Option<String>,
) -> Result<T, Box<dyn std::error::Error>> {
    if let Some(path) = path {
        return read_json_file(path);
    }
    match read_stdin()? {
        Some(contents) => Ok(serde_json::from_str(&contents)?),
        None => Err("--input <file.json> or piped stdin required".into()),
    }
}

fn read_json_file<T: DeserializeOwned>(path: &str) -> Result<T, Box<dyn std::error::Error>> {
    let file = Path::new(path);
    if !file.is_file() {
        return Err(format!("File not found: {path}").into());
    }
    let contents = std::fs::read_to_string(file)
        .map_err(|e| format!("Failed to read '{path}': {e}"))?;
    serde_json::from_str(&contents)
        .map_err(|e| format!("Failed to parse '{path}': {e}").into())
}

/// Read stdin when data is being piped; `None` on an interactive terminal.
fn read_stdin() -> Result<Option<String>, Box<dyn std::error::Error>> {
    if atty::is(atty::Stream::Stdin) {
        return Ok(None);
    }

    let mut buffer = String::new();
    io::stdin().read_to_string(&mut buffer)?;
    let trimmed = buffer.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    Ok(Some(trimmed.to_string()))
}
