#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
//! Config schemas for the screen-state tooling.
//!
//! - `Config` and its sections are deserialized from TOML and validated.
//! - `signatures` holds the on-disk signature store schema and a lenient
//!   parser that skips malformed entries instead of rejecting the file.
//! - Probe CSV import enforces headers, like a calibration sheet would.
use serde::{Deserialize, Serialize};

pub mod signatures;

pub use signatures::{
    ParsedSignatures, ProbeToml, SignatureFile, SignatureToml, parse_signatures, render_signatures,
};

/// Package launched by the default "unknown screen" recovery rule.
pub const DEFAULT_PACKAGE: &str = "com.lilithgame.roc.gp";

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct DeviceCfg {
    /// ADB serial (`adb -s <serial>`); first attached device when absent.
    pub serial: Option<String>,
    /// adb executable name or path.
    pub adb_path: String,
    /// Upper bound for one screen capture (ms).
    pub capture_timeout_ms: u64,
    /// Upper bound for one input/launch command (ms).
    pub command_timeout_ms: u64,
}

impl Default for DeviceCfg {
    fn default() -> Self {
        Self {
            serial: None,
            adb_path: "adb".to_string(),
            capture_timeout_ms: 10_000,
            command_timeout_ms: 10_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct ClassifierCfg {
    /// Default minimum match ratio for signatures without their own `min_ratio`.
    pub min_ratio: f32,
}

impl Default for ClassifierCfg {
    fn default() -> Self {
        Self { min_ratio: 0.75 }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct WaitCfg {
    /// Passive polls before a corrective action is considered.
    pub max_pre_attempts: u32,
    /// Polls after the corrective action.
    pub max_post_attempts: u32,
    /// Sleep between polls (ms).
    pub poll_interval_ms: u64,
}

impl Default for WaitCfg {
    fn default() -> Self {
        Self {
            max_pre_attempts: 5,
            max_post_attempts: 10,
            poll_interval_ms: 1_000,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(default)]
pub struct StoreCfg {
    /// Signature store file (TOML). Template paths inside it are relative to this file.
    pub path: String,
}

impl Default for StoreCfg {
    fn default() -> Self {
        Self {
            path: "signatures.toml".to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct ProgressCfg {
    /// Zone holding the "NN%" loading text, `[x1, y1, x2, y2]`.
    pub zone: [u32; 4],
    /// tesseract executable name or path.
    #[serde(default = "default_tesseract")]
    pub tesseract_path: String,
    /// Pixels with R, G and B all above this are kept as text.
    #[serde(default = "default_text_threshold")]
    pub text_threshold: u8,
}

fn default_tesseract() -> String {
    "tesseract".to_string()
}

fn default_text_threshold() -> u8 {
    180
}

#[derive(Debug, Deserialize, Default)]
#[serde(default)]
pub struct Logging {
    pub file: Option<String>,  // path to .log (JSON lines)
    pub level: Option<String>, // "info","debug"
    /// Log rotation policy: "never" | "daily" | "hourly" (default: never)
    pub rotation: Option<String>,
}

/// One device command inside a corrective action.
///
/// TOML form: `{ tap = [x, y] }`, `{ swipe = [x1, y1, x2, y2, ms] }`,
/// `{ key = 224 }`, `{ launch = "com.example" }`.
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum StepToml {
    Tap([u32; 2]),
    Swipe([u32; 5]),
    Key(u32),
    Launch(String),
}

/// Row of the corrective-action policy table.
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ActionRule {
    /// State name, `"unknown"`, or `"any"`.
    pub when: String,
    /// Label used in logs.
    pub name: String,
    #[serde(default)]
    pub steps: Vec<StepToml>,
}

pub fn default_actions() -> Vec<ActionRule> {
    vec![
        ActionRule {
            when: "locked".to_string(),
            name: "unlock".to_string(),
            steps: vec![
                StepToml::Key(224), // KEYCODE_WAKEUP
                StepToml::Swipe([540, 1600, 540, 400, 300]),
            ],
        },
        ActionRule {
            when: "unknown".to_string(),
            name: "launch-game".to_string(),
            steps: vec![StepToml::Launch(DEFAULT_PACKAGE.to_string())],
        },
    ]
}

#[derive(Debug, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub device: DeviceCfg,
    #[serde(default)]
    pub classifier: ClassifierCfg,
    #[serde(default)]
    pub wait: WaitCfg,
    #[serde(default)]
    pub store: StoreCfg,
    /// Optional OCR loading-percentage signal.
    #[serde(default)]
    pub progress: Option<ProgressCfg>,
    #[serde(default)]
    pub logging: Logging,
    /// Corrective-action policy table; first matching rule wins.
    #[serde(default = "default_actions", rename = "action")]
    pub actions: Vec<ActionRule>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            device: DeviceCfg::default(),
            classifier: ClassifierCfg::default(),
            wait: WaitCfg::default(),
            store: StoreCfg::default(),
            progress: None,
            logging: Logging::default(),
            actions: default_actions(),
        }
    }
}

pub fn load_toml(s: &str) -> Result<Config, toml::de::Error> {
    toml::from_str::<Config>(s)
}

/// Point probe row from a calibration sheet.
///
/// Expected headers:
/// state,id,x,y,r,g,b,tolerance
#[derive(Debug, Deserialize, Clone, PartialEq, Eq)]
pub struct ProbeCsvRow {
    pub state: String,
    pub id: String,
    pub x: u32,
    pub y: u32,
    pub r: u8,
    pub g: u8,
    pub b: u8,
    pub tolerance: u8,
}

pub fn load_probe_csv(path: &std::path::Path) -> eyre::Result<Vec<ProbeCsvRow>> {
    let mut rdr = csv::ReaderBuilder::new()
        .has_headers(true)
        .trim(csv::Trim::All)
        .from_path(path)
        .map_err(|e| eyre::eyre!("open probe CSV {:?}: {}", path, e))?;

    let headers = rdr
        .headers()
        .map_err(|e| eyre::eyre!("read CSV headers {:?}: {}", path, e))?
        .clone();
    let expected = ["state", "id", "x", "y", "r", "g", "b", "tolerance"];
    let actual: Vec<String> = headers.iter().map(|s| s.to_string()).collect();
    if actual != expected {
        eyre::bail!(
            "probe CSV must have headers '{}', got: {}",
            expected.join(","),
            actual.join(",")
        );
    }

    let mut rows = Vec::new();
    for (idx, rec) in rdr.deserialize::<ProbeCsvRow>().enumerate() {
        match rec {
            Ok(row) => rows.push(row),
            Err(e) => eyre::bail!("invalid CSV row {}: {}", idx + 2, e),
        }
    }
    if rows.is_empty() {
        eyre::bail!("probe CSV {:?} has no rows", path);
    }
    Ok(rows)
}

impl Config {
    pub fn validate(&self) -> eyre::Result<()> {
        // Device
        if self.device.adb_path.trim().is_empty() {
            eyre::bail!("device.adb_path must not be empty");
        }
        if self.device.capture_timeout_ms == 0 {
            eyre::bail!("device.capture_timeout_ms must be >= 1");
        }
        if self.device.command_timeout_ms == 0 {
            eyre::bail!("device.command_timeout_ms must be >= 1");
        }

        // Classifier
        let r = self.classifier.min_ratio;
        if !(r > 0.0 && r <= 1.0) {
            eyre::bail!("classifier.min_ratio must be in (0.0, 1.0]");
        }

        // Wait
        if self.wait.max_pre_attempts == 0 {
            eyre::bail!("wait.max_pre_attempts must be >= 1");
        }
        if self.wait.poll_interval_ms > 10 * 60 * 1000 {
            eyre::bail!("wait.poll_interval_ms is unreasonably large (>10min)");
        }

        // Store
        if self.store.path.trim().is_empty() {
            eyre::bail!("store.path must not be empty");
        }

        // Progress
        if let Some(p) = &self.progress {
            let [x1, y1, x2, y2] = p.zone;
            if x2 <= x1 || y2 <= y1 {
                eyre::bail!("progress.zone must satisfy x1 < x2 and y1 < y2");
            }
        }

        // Logging
        if let Some(rot) = self.logging.rotation.as_deref()
            && !matches!(rot, "never" | "daily" | "hourly")
        {
            eyre::bail!("logging.rotation must be one of never|daily|hourly, got '{rot}'");
        }

        // Actions
        for (i, rule) in self.actions.iter().enumerate() {
            if rule.when.trim().is_empty() {
                eyre::bail!("action[{i}].when must not be empty");
            }
            if rule.name.trim().is_empty() {
                eyre::bail!("action[{i}].name must not be empty");
            }
            for step in &rule.steps {
                if let StepToml::Launch(pkg) = step
                    && pkg.trim().is_empty()
                {
                    eyre::bail!("action[{i}] launch step needs a package id");
                }
            }
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_document_uses_defaults() {
        let cfg = load_toml("").expect("parse");
        cfg.validate().expect("defaults are valid");
        assert_eq!(cfg.wait.max_pre_attempts, 5);
        assert_eq!(cfg.actions, default_actions());
        assert!(cfg.progress.is_none());
    }

    #[test]
    fn action_steps_parse_from_inline_tables() {
        let cfg = load_toml(
            r#"
[[action]]
when = "not_foreground"
name = "relaunch"
steps = [{ key = 3 }, { tap = [10, 20] }, { launch = "com.example" }]
"#,
        )
        .expect("parse");
        assert_eq!(cfg.actions.len(), 1);
        assert_eq!(
            cfg.actions[0].steps,
            vec![
                StepToml::Key(3),
                StepToml::Tap([10, 20]),
                StepToml::Launch("com.example".into())
            ]
        );
    }
}
