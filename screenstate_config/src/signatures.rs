//! On-disk schema for the signature store.
//!
//! ```toml
//! [[signature]]
//! state = "loaded"
//! min_ratio = 0.8
//!
//! [[signature.probe]]
//! id = "banner"
//! x = 171
//! y = 947
//! color = [255, 255, 248]
//! tolerance = 10
//! ```
//!
//! Parsing is per entry: a signature or probe that does not deserialize is
//! reported in [`ParsedSignatures::skipped`] and the rest still loads. Only a
//! TOML syntax error fails the whole document.
use serde::{Deserialize, Serialize};

/// One probe as written in the store file.
///
/// The shape decides the kind: `x`/`y` make a point probe, `zone` with
/// `color` an average-region probe, `template` a template probe.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ProbeToml {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub x: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub y: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub zone: Option<[u32; 4]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub color: Option<[u8; 3]>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tolerance: Option<u8>,
    /// Template image path, relative to the store file.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub template: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub threshold: Option<f32>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SignatureToml {
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_ratio: Option<f32>,
    #[serde(default, rename = "probe")]
    pub probes: Vec<ProbeToml>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct SignatureFile {
    #[serde(default, rename = "signature")]
    pub signatures: Vec<SignatureToml>,
}

/// Result of a lenient parse.
#[derive(Debug, Default)]
pub struct ParsedSignatures {
    pub signatures: Vec<SignatureToml>,
    /// Human-readable reasons for every entry that was dropped.
    pub skipped: Vec<String>,
}

#[derive(Deserialize)]
struct RawSignature {
    state: String,
    #[serde(default)]
    min_ratio: Option<f32>,
    #[serde(default)]
    probe: Vec<toml::Value>,
}

/// Parse a signature document, skipping entries that do not deserialize.
pub fn parse_signatures(text: &str) -> Result<ParsedSignatures, toml::de::Error> {
    let doc: toml::Table = toml::from_str(text)?;
    let mut out = ParsedSignatures::default();

    let entries = match doc.get("signature") {
        None => return Ok(out),
        Some(toml::Value::Array(items)) => items.clone(),
        Some(other) => {
            out.skipped.push(format!(
                "`signature` must be an array of tables, got {}",
                other.type_str()
            ));
            return Ok(out);
        }
    };

    for (idx, entry) in entries.into_iter().enumerate() {
        let raw: RawSignature = match entry.try_into() {
            Ok(r) => r,
            Err(e) => {
                out.skipped.push(format!("signature[{idx}]: {e}"));
                continue;
            }
        };
        let mut probes = Vec::with_capacity(raw.probe.len());
        for (pidx, value) in raw.probe.into_iter().enumerate() {
            match value.try_into::<ProbeToml>() {
                Ok(p) => probes.push(p),
                Err(e) => out
                    .skipped
                    .push(format!("signature '{}' probe[{pidx}]: {e}", raw.state)),
            }
        }
        out.signatures.push(SignatureToml {
            state: raw.state,
            min_ratio: raw.min_ratio,
            probes,
        });
    }
    Ok(out)
}

pub fn render_signatures(file: &SignatureFile) -> Result<String, toml::ser::Error> {
    toml::to_string_pretty(file)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"
[[signature]]
state = "loaded"
min_ratio = 0.8

[[signature.probe]]
id = "banner"
x = 171
y = 947
color = [255, 255, 248]
tolerance = 10

[[signature.probe]]
id = "bad"
x = "nope"

[[signature]]
min_ratio = 0.5
"#;

    #[test]
    fn bad_entries_are_skipped_not_fatal() {
        let parsed = parse_signatures(DOC).expect("syntax ok");
        assert_eq!(parsed.signatures.len(), 1);
        assert_eq!(parsed.signatures[0].probes.len(), 1);
        assert_eq!(parsed.signatures[0].probes[0].x, Some(171));
        assert_eq!(parsed.skipped.len(), 2, "{:?}", parsed.skipped);
    }

    #[test]
    fn syntax_error_fails_document() {
        assert!(parse_signatures("[[signature]\nstate=").is_err());
    }

    #[test]
    fn render_then_parse_keeps_order() {
        let file = SignatureFile {
            signatures: vec![
                SignatureToml {
                    state: "b".into(),
                    min_ratio: None,
                    probes: vec![ProbeToml {
                        id: "t".into(),
                        template: Some("templates/b_t.png".into()),
                        threshold: Some(0.9),
                        ..ProbeToml::default()
                    }],
                },
                SignatureToml {
                    state: "a".into(),
                    min_ratio: Some(0.5),
                    probes: vec![ProbeToml {
                        id: "z".into(),
                        zone: Some([0, 0, 4, 4]),
                        color: Some([1, 2, 3]),
                        tolerance: Some(5),
                        ..ProbeToml::default()
                    }],
                },
            ],
        };
        let text = render_signatures(&file).expect("render");
        let parsed = parse_signatures(&text).expect("parse");
        assert!(parsed.skipped.is_empty());
        assert_eq!(parsed.signatures, file.signatures);
    }
}
