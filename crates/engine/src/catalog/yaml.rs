//! YAML catalog loader.
//!
//! Loads listing type definitions from a directory of YAML files, one
//! file per listing type (`{name}.yml`). Loading happens once at startup;
//! the returned [`FieldCatalog`] is frozen afterwards.

use std::collections::HashSet;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, info, warn};

use super::{FieldCatalog, ListingType};
use crate::error::{EngineError, EngineResult};

/// Maximum catalog file size (1 MB). Larger files are skipped to prevent
/// unbounded memory allocation from accidental large files.
const MAX_CATALOG_FILE_SIZE: u64 = 1024 * 1024;

/// Load every `*.yml` / `*.yaml` file in `dir` into a fresh catalog.
///
/// Files that fail to parse are skipped with a warning; a listing type
/// with duplicate field names is a hard error (the `name` uniqueness
/// invariant would otherwise make predicate building ambiguous).
pub fn load_catalog_dir(dir: &Path) -> EngineResult<FieldCatalog> {
    let catalog = FieldCatalog::new();

    let entries = std::fs::read_dir(dir)
        .with_context(|| format!("failed to read catalog directory {}", dir.display()))?;

    let mut loaded = 0usize;

    for entry in entries {
        let entry = entry.context("failed to read catalog directory entry")?;
        let path = entry.path();

        let is_yaml = path
            .extension()
            .and_then(|e| e.to_str())
            .is_some_and(|e| e == "yml" || e == "yaml");
        if !is_yaml {
            continue;
        }

        let metadata = entry.metadata().context("failed to stat catalog file")?;
        if metadata.len() > MAX_CATALOG_FILE_SIZE {
            warn!(
                file = %path.display(),
                size = metadata.len(),
                "catalog file exceeds size limit; skipping"
            );
            continue;
        }

        let listing_type = match read_listing_type(&path) {
            Ok(lt) => lt,
            Err(e) => {
                warn!(file = %path.display(), error = %e, "failed to parse catalog file; skipping");
                continue;
            }
        };

        validate_listing_type(&listing_type)?;

        // The filename stem and the declared name should agree; the
        // declared name wins, matching import behavior elsewhere.
        let stem = path.file_stem().and_then(|s| s.to_str()).unwrap_or("");
        if stem != listing_type.name {
            warn!(
                file = %path.display(),
                declared = %listing_type.name,
                "catalog filename does not match declared listing type name"
            );
        }

        debug!(listing_type = %listing_type.name, table = %listing_type.table, "catalog entry loaded");
        catalog.insert(listing_type);
        loaded += 1;
    }

    info!(count = loaded, dir = %dir.display(), "field catalog loaded");
    Ok(catalog)
}

fn read_listing_type(path: &Path) -> Result<ListingType> {
    let raw = std::fs::read_to_string(path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let listing_type: ListingType = serde_yml::from_str(&raw)
        .with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(listing_type)
}

fn validate_listing_type(listing_type: &ListingType) -> EngineResult<()> {
    if listing_type.name.is_empty() {
        return Err(EngineError::Catalog(
            "listing type name must not be empty".to_string(),
        ));
    }
    if listing_type.table.is_empty() {
        return Err(EngineError::Catalog(format!(
            "listing type '{}' has no detail table",
            listing_type.name
        )));
    }

    let mut seen = HashSet::new();
    for field in &listing_type.fields {
        if !seen.insert(field.name.as_str()) {
            return Err(EngineError::Catalog(format!(
                "listing type '{}' declares field '{}' more than once",
                listing_type.name, field.name
            )));
        }
    }

    let defaults = listing_type
        .sort_fields
        .iter()
        .filter(|s| s.is_default)
        .count();
    if defaults > 1 {
        return Err(EngineError::Catalog(format!(
            "listing type '{}' marks {} sort fields as default",
            listing_type.name, defaults
        )));
    }

    Ok(())
}
