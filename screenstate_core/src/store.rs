//! Ordered signature store with lenient loading and atomic persistence.
//!
//! - Registration order is preserved; it breaks classification ties.
//! - `load` never fails: missing or unreadable files fall back to
//!   [`SignatureStore::builtin`], malformed entries are skipped with a warning.
//! - `save` writes temporary files next to the targets and renames them over.
//! - [`StoreHandle`] swaps whole snapshots so readers never see a partial update.

use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::{Arc, RwLock};

use eyre::WrapErr;
use screenstate_config::{ProbeToml, SignatureFile, SignatureToml, parse_signatures, render_signatures};
use screenstate_traits::Rect;
use tempfile::NamedTempFile;

use crate::error::{Result, ScreenError};
use crate::probe::{Color, Probe};
use crate::signature::Signature;
use crate::template::Template;

#[derive(Debug, Clone, PartialEq, Default)]
pub struct SignatureStore {
    entries: Vec<Signature>,
}

impl SignatureStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Minimal built-in set used when no usable store file exists.
    ///
    /// - `loaded`: bright banner pixel of the game's loaded screen.
    /// - `city_view` / `map_view`: UI accents of the two main views.
    pub fn builtin() -> Self {
        let point = |state: &str, id: &str, x, y, rgb: [u8; 3], tolerance| {
            Signature::new(
                state,
                vec![Probe::Point {
                    id: id.to_string(),
                    x,
                    y,
                    color: Color::from_array(rgb),
                    tolerance,
                }],
            )
        };
        let mut store = Self::new();
        for sig in [
            point("loaded", "banner", 171, 947, [255, 255, 248], 10),
            point("city_view", "accent", 50, 100, [200, 40, 40], 25),
            point("map_view", "accent", 1200, 100, [40, 200, 80], 38),
        ]
        .into_iter()
        .flatten()
        {
            store.upsert(sig);
        }
        store
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Signatures in registration order.
    pub fn iter(&self) -> impl Iterator<Item = &Signature> {
        self.entries.iter()
    }

    pub fn get(&self, state: &str) -> Option<&Signature> {
        self.entries.iter().find(|s| s.state() == state)
    }

    pub fn states(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(Signature::state)
    }

    /// Replace the signature for its state, keeping its position, or append it.
    /// Returns `true` when an existing entry was replaced.
    pub fn upsert(&mut self, signature: Signature) -> bool {
        match self
            .entries
            .iter_mut()
            .find(|s| s.state() == signature.state())
        {
            Some(slot) => {
                *slot = signature;
                true
            }
            None => {
                self.entries.push(signature);
                false
            }
        }
    }

    pub fn remove(&mut self, state: &str) -> Option<Signature> {
        let idx = self.entries.iter().position(|s| s.state() == state)?;
        Some(self.entries.remove(idx))
    }

    /// Load from `path`, falling back to the built-in set on any failure.
    pub fn load(path: &Path) -> Self {
        match Self::try_load(path) {
            Ok(Some(store)) if !store.is_empty() => {
                tracing::info!(path = %path.display(), signatures = store.len(), "signature store loaded");
                store
            }
            Ok(Some(_)) => {
                let e = ScreenError::StoreCorrupt("no usable signatures".into());
                tracing::warn!(path = %path.display(), error = %e, "falling back to built-in signatures");
                Self::builtin()
            }
            Ok(None) => {
                tracing::info!(path = %path.display(), "no signature store; using built-in signatures");
                Self::builtin()
            }
            Err(e) => {
                let e = ScreenError::StoreCorrupt(format!("{e:#}"));
                tracing::warn!(path = %path.display(), error = %e, "falling back to built-in signatures");
                Self::builtin()
            }
        }
    }

    /// Strict variant of [`SignatureStore::load`]: `Ok(None)` when the file is
    /// missing, `Err` when it cannot be read or is not valid TOML. Malformed
    /// entries are still skipped with a warning.
    pub fn try_load(path: &Path) -> Result<Option<Self>> {
        let text = match std::fs::read_to_string(path) {
            Ok(t) => t,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => {
                return Err(eyre::Report::new(e).wrap_err(format!("read {}", path.display())));
            }
        };
        let parsed = parse_signatures(&text).wrap_err_with(|| format!("parse {}", path.display()))?;
        for reason in &parsed.skipped {
            tracing::warn!(path = %path.display(), reason = %reason, "skipping malformed signature entry");
        }

        let base = base_dir(path);
        let mut store = Self::new();
        for entry in &parsed.signatures {
            match signature_from_toml(entry, &base) {
                Ok(sig) => {
                    if store.upsert(sig) {
                        tracing::warn!(state = %entry.state, "duplicate state in store file; later entry wins");
                    }
                }
                Err(reason) => {
                    tracing::warn!(state = %entry.state, reason = %reason, "skipping malformed signature");
                }
            }
        }
        Ok(Some(store))
    }

    /// Persist atomically. Template images (grayscale PNGs next to the store
    /// file) and the store file itself are all staged as temporary files
    /// before any of them replaces its previous version.
    ///
    /// An empty store is refused: loading it back would yield the built-in set.
    pub fn save(&self, path: &Path) -> Result<()> {
        if self.is_empty() {
            eyre::bail!("refusing to save an empty signature store to {}", path.display());
        }
        let base = base_dir(path);

        let mut staged = Vec::new();
        for sig in &self.entries {
            for probe in sig.probes() {
                if let Probe::Template { template, .. } = probe {
                    let target = base.join(template.source());
                    let bytes = template.encode_png()?;
                    staged.push((stage(&target, &bytes)?, target));
                }
            }
        }

        let file = SignatureFile {
            signatures: self.entries.iter().map(SignatureToml::from).collect(),
        };
        let text = render_signatures(&file).wrap_err("serialize signature store")?;
        let store_tmp = stage(path, text.as_bytes())?;

        for (tmp, target) in staged {
            replace(tmp, &target)?;
        }
        replace(store_tmp, path)?;
        tracing::info!(path = %path.display(), signatures = self.len(), "signature store saved");
        Ok(())
    }
}

fn base_dir(path: &Path) -> PathBuf {
    match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p.to_path_buf(),
        _ => PathBuf::from("."),
    }
}

/// Write `bytes` to a synced temporary file in the directory of `target`.
fn stage(target: &Path, bytes: &[u8]) -> Result<NamedTempFile> {
    let dir = base_dir(target);
    std::fs::create_dir_all(&dir).wrap_err_with(|| format!("create {}", dir.display()))?;
    let mut tmp = NamedTempFile::new_in(&dir)
        .wrap_err_with(|| format!("create temp file in {}", dir.display()))?;
    tmp.write_all(bytes)
        .wrap_err_with(|| format!("write {}", target.display()))?;
    tmp.as_file()
        .sync_all()
        .wrap_err_with(|| format!("sync {}", target.display()))?;
    Ok(tmp)
}

fn replace(tmp: NamedTempFile, target: &Path) -> Result<()> {
    tmp.persist(target)
        .map_err(|e| e.error)
        .wrap_err_with(|| format!("replace {}", target.display()))?;
    Ok(())
}

/// Convert one file entry, loading templates relative to `base`.
pub fn signature_from_toml(entry: &SignatureToml, base: &Path) -> std::result::Result<Signature, String> {
    let probes = entry
        .probes
        .iter()
        .map(|p| probe_from_toml(p, base))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    let sig = Signature::new(entry.state.clone(), probes).map_err(|e| e.to_string())?;
    match entry.min_ratio {
        Some(r) => sig.with_min_ratio(r).map_err(|e| e.to_string()),
        None => Ok(sig),
    }
}

pub fn probe_from_toml(p: &ProbeToml, base: &Path) -> std::result::Result<Probe, String> {
    let id = p.id.clone();
    let zone = p.zone.map(Rect::from_corners);
    if let Some(source) = &p.template {
        let template = Template::load(base, source).map_err(|e| format!("probe '{id}': {e:#}"))?;
        let threshold = p
            .threshold
            .ok_or_else(|| format!("probe '{id}': template probe needs a threshold"))?;
        return Ok(Probe::Template {
            id,
            zone,
            template,
            threshold,
        });
    }
    let color = p
        .color
        .map(Color::from_array)
        .ok_or_else(|| format!("probe '{id}': missing color"))?;
    let tolerance = p.tolerance.unwrap_or(0);
    match (p.x, p.y, zone) {
        (Some(x), Some(y), None) => Ok(Probe::Point {
            id,
            x,
            y,
            color,
            tolerance,
        }),
        (None, None, Some(zone)) => Ok(Probe::AverageRegion {
            id,
            zone,
            color,
            tolerance,
        }),
        _ => Err(format!(
            "probe '{id}': needs either x and y, or zone (not both)"
        )),
    }
}

/// Shared, swappable store. Readers take a snapshot; writers replace it whole.
#[derive(Debug, Clone, Default)]
pub struct StoreHandle {
    inner: Arc<RwLock<Arc<SignatureStore>>>,
}

impl StoreHandle {
    pub fn new(store: SignatureStore) -> Self {
        Self {
            inner: Arc::new(RwLock::new(Arc::new(store))),
        }
    }

    /// Current snapshot; unaffected by later updates.
    pub fn snapshot(&self) -> Arc<SignatureStore> {
        match self.inner.read() {
            Ok(g) => Arc::clone(&g),
            Err(poisoned) => Arc::clone(&poisoned.into_inner()),
        }
    }

    pub fn replace(&self, store: SignatureStore) {
        let next = Arc::new(store);
        match self.inner.write() {
            Ok(mut g) => *g = next,
            Err(poisoned) => *poisoned.into_inner() = next,
        }
    }

    /// Clone the current snapshot, apply `f`, and publish the result.
    pub fn update<R>(&self, f: impl FnOnce(&mut SignatureStore) -> R) -> R {
        let mut guard = match self.inner.write() {
            Ok(g) => g,
            Err(poisoned) => poisoned.into_inner(),
        };
        let mut next = SignatureStore::clone(&guard);
        let out = f(&mut next);
        *guard = Arc::new(next);
        out
    }
}
