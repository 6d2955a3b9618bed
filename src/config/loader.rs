//! Configuration loading: defaults, then `config.json` in the working
//! directory, then `CARD_DUEL__`-prefixed environment overrides with `__`
//! as the nesting separator (e.g. `CARD_DUEL__SERVER__TURN_DURATION=10`).

use serde_json::Value;
use std::path::Path;

use super::Config;

/// Load the effective configuration. Read or parse failures are reported to
/// stderr and the affected layer is skipped; `load` always returns a config.
#[must_use]
pub fn load() -> Config {
    let defaults = Config::default();
    let mut merged = match serde_json::to_value(&defaults) {
        Ok(value) => value,
        Err(err) => {
            eprintln!("Failed to serialize default config: {err}");
            return defaults;
        }
    };

    merge_file(&mut merged, Path::new("config.json"));
    apply_env_overrides(&mut merged);

    match serde_json::from_value(merged) {
        Ok(config) => config,
        Err(err) => {
            eprintln!("Invalid configuration, using defaults: {err}");
            defaults
        }
    }
}

fn merge_file(target: &mut Value, path: &Path) {
    if !path.exists() {
        return;
    }
    match std::fs::read_to_string(path) {
        Ok(raw) => match serde_json::from_str::<Value>(&raw) {
            Ok(value) => merge(target, value),
            Err(err) => eprintln!("Failed to parse {}: {err}", path.display()),
        },
        Err(err) => eprintln!("Failed to read {}: {err}", path.display()),
    }
}

fn merge(target: &mut Value, source: Value) {
    match (target, source) {
        (Value::Object(target_map), Value::Object(source_map)) => {
            for (key, value) in source_map {
                match target_map.get_mut(&key) {
                    Some(slot) => merge(slot, value),
                    None => {
                        target_map.insert(key, value);
                    }
                }
            }
        }
        (slot, value) => *slot = value,
    }
}

fn apply_env_overrides(root: &mut Value) {
    for (key, raw) in std::env::vars() {
        let Some(path) = key.strip_prefix("CARD_DUEL__") else {
            continue;
        };
        let segments: Vec<String> = path
            .split("__")
            .filter(|s| !s.is_empty())
            .map(str::to_ascii_lowercase)
            .collect();
        if segments.is_empty() {
            continue;
        }
        set_path(root, &segments, parse_scalar(&raw));
    }
}

fn parse_scalar(raw: &str) -> Value {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Value::String(String::new());
    }
    serde_json::from_str(trimmed).unwrap_or_else(|_| Value::String(trimmed.to_owned()))
}

fn set_path(target: &mut Value, segments: &[String], value: Value) {
    let Some((head, rest)) = segments.split_first() else {
        *target = value;
        return;
    };
    let map = match target {
        Value::Object(map) => map,
        slot => {
            *slot = Value::Object(serde_json::Map::new());
            match slot {
                Value::Object(map) => map,
                _ => return,
            }
        }
    };
    if rest.is_empty() {
        map.insert(head.clone(), value);
    } else {
        let entry = map
            .entry(head.clone())
            .or_insert_with(|| Value::Object(serde_json::Map::new()));
        set_path(entry, rest, value);
    }
}
