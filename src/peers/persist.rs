//! Atomic CBOR persistence: write-to-temp-then-rename, shared by every
//! peer-registry store (spec.md §3, §6, §9).

use std::path::Path;

use serde::{de::DeserializeOwned, Serialize};
use tracing::warn;

use crate::error::{HsknsError, Result};

pub fn load<T: DeserializeOwned + Default>(path: &Path) -> T {
    match std::fs::File::open(path) {
        Ok(file) => match ciborium::de::from_reader(file) {
            Ok(value) => value,
            Err(err) => {
                warn!(path = %path.display(), error = %err, "failed to parse persisted state, starting fresh");
                T::default()
            }
        },
        Err(_) => T::default(),
    }
}

/// Persists `value` via write-to-temp-then-rename. Failures are logged and
/// surfaced as `PersistenceFailure` — in-memory state remains authoritative
/// and the next mutation will attempt the write again (spec.md §7).
pub fn save<T: Serialize>(path: &Path, what: &'static str, value: &T) -> Result<()> {
    let tmp_path = path.with_extension("cbor.tmp");

    let mut buf = Vec::new();
    ciborium::ser::into_writer(value, &mut buf)
        .map_err(|err| HsknsError::PersistenceFailure {
            what,
            source: std::sync::Arc::new(std::io::Error::other(err.to_string())),
        })?;

    std::fs::write(&tmp_path, &buf).map_err(|err| {
        warn!(what, error = %err, "failed to write temp file for persistence");
        HsknsError::PersistenceFailure {
            what,
            source: std::sync::Arc::new(err),
        }
    })?;

    std::fs::rename(&tmp_path, path).map_err(|err| {
        warn!(what, error = %err, "failed to rename temp file into place");
        HsknsError::PersistenceFailure {
            what,
            source: std::sync::Arc::new(err),
        }
    })?;

    Ok(())
}
