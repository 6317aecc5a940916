use std::collections::HashSet;
use std::fs;
use std::path::{Path, PathBuf};

use serde::de::DeserializeOwned;
use toml::Value;
use tracing::debug;

use crate::backend::BackendSpec;
use crate::error::{Error, Result};
use crate::globals::GlobalConfig;

pub const BACKEND_TABLE: &str = "backend";
pub const GLOBALS_TABLE: &str = "globals";

/// A loaded backend document with its `extends` chain already merged.
#[derive(Debug, Clone)]
pub struct ConfigDoc {
    pub path: PathBuf,
    pub value: Value,
}

impl ConfigDoc {
    pub fn value_path(&self, path: &str) -> Option<&Value> {
        let path = path.trim();
        if path.is_empty() {
            return Some(&self.value);
        }
        path.split('.')
            .try_fold(&self.value, |cur, seg| cur.as_table()?.get(seg))
    }

    pub fn deserialize_path<T: DeserializeOwned>(&self, path: &str) -> Result<Option<T>> {
        let Some(v) = self.value_path(path) else {
            return Ok(None);
        };
        let parsed = v.clone().try_into().map_err(|e| {
            Error::msg(format!(
                "invalid '{}' section in {}: {e}",
                path,
                self.path.display()
            ))
        })?;
        Ok(Some(parsed))
    }

    /// The `[backend]` section; an absent section is an empty spec.
    pub fn backend(&self) -> Result<BackendSpec> {
        Ok(self.deserialize_path(BACKEND_TABLE)?.unwrap_or_default())
    }

    /// The `[globals]` section; an absent section is all defaults.
    pub fn globals(&self) -> Result<GlobalConfig> {
        Ok(self.deserialize_path(GLOBALS_TABLE)?.unwrap_or_default())
    }
}

/// Deep-merges `overlay` into `base`; tables merge key by key, anything else
/// replaces.
pub fn merge(base: &mut Value, overlay: Value) {
    match (base, overlay) {
        (Value::Table(base_tbl), Value::Table(overlay_tbl)) => {
            for (k, v) in overlay_tbl {
                match base_tbl.get_mut(&k) {
                    Some(existing) => merge(existing, v),
                    None => {
                        base_tbl.insert(k, v);
                    }
                }
            }
        }
        (slot, v) => *slot = v,
    }
}

// TOML has no null; a null key is an unset attribute, so drop it.
fn strip_nulls(value: &mut serde_json::Value) {
    match value {
        serde_json::Value::Object(map) => {
            map.retain(|_, v| !v.is_null());
            map.values_mut().for_each(strip_nulls);
        }
        serde_json::Value::Array(items) => {
            items.retain(|v| !v.is_null());
            items.iter_mut().for_each(strip_nulls);
        }
        _ => {}
    }
}

fn parse_document(path: &Path, data: &str) -> Result<Value> {
    let is_json = path
        .extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("json"));
    if is_json {
        let mut json: serde_json::Value = serde_json::from_str(data)
            .map_err(|e| Error::msg(format!("JSON parse error in {}: {e}", path.display())))?;
        strip_nulls(&mut json);
        serde_json::from_value::<Value>(json)
            .map_err(|e| Error::msg(format!("unsupported JSON value in {}: {e}", path.display())))
    } else {
        toml::from_str::<Value>(data)
            .map_err(|e| Error::msg(format!("TOML parse error in {}: {e}", path.display())))
    }
}

fn resolve_ref_path(from_file: &Path, reference: &str) -> PathBuf {
    let p = PathBuf::from(reference);
    if p.is_absolute() {
        p
    } else {
        from_file.parent().unwrap_or_else(|| Path::new(".")).join(p)
    }
}

fn load_value_inner(path: &Path, stack: &mut HashSet<PathBuf>) -> Result<Value> {
    let canonical = path.canonicalize().unwrap_or_else(|_| path.to_path_buf());
    if !stack.insert(canonical.clone()) {
        return Err(Error::msg(format!(
            "config extends cycle detected at {}",
            canonical.display()
        )));
    }

    let data = fs::read_to_string(path)
        .map_err(|e| Error::msg(format!("failed to read config {}: {e}", path.display())))?;
    let mut value = parse_document(path, &data)?;
    let Some(tbl) = value.as_table_mut() else {
        return Err(Error::msg(format!(
            "config {} must be a table at the top level",
            path.display()
        )));
    };

    let mut out = Value::Table(Default::default());
    match tbl.remove("extends") {
        Some(Value::String(parent)) => {
            let parent_path = resolve_ref_path(path, parent.trim());
            debug!(
                child = %path.display(),
                parent = %parent_path.display(),
                "loading parent config"
            );
            out = load_value_inner(&parent_path, stack)?;
        }
        Some(_) => {
            return Err(Error::msg(format!(
                "invalid extends in {} (expected string)",
                path.display()
            )));
        }
        None => {}
    }
    merge(&mut out, value);

    stack.remove(&canonical);
    Ok(out)
}

/// The `[globals]` both documents agree on; comparing two backends under
/// different operator defaults is rejected.
pub fn shared_globals(a: &ConfigDoc, b: &ConfigDoc) -> Result<GlobalConfig> {
    let globals = a.globals()?;
    if globals != b.globals()? {
        return Err(Error::msg(format!(
            "{} and {} have different [globals]",
            a.path.display(),
            b.path.display()
        )));
    }
    Ok(globals)
}

pub fn load(path: &Path) -> Result<ConfigDoc> {
    let mut stack = HashSet::<PathBuf>::new();
    let value = load_value_inner(path, &mut stack)?;
    Ok(ConfigDoc {
        path: path.to_path_buf(),
        value,
    })
}
