use std::collections::HashSet;

use crate::actions::RESERVED_STATES;
use crate::error::BuildError;
use crate::probe::Probe;

/// A named set of probes identifying one screen state.
#[derive(Debug, Clone, PartialEq)]
pub struct Signature {
    state: String,
    min_ratio: Option<f32>,
    probes: Vec<Probe>,
}

impl Signature {
    /// Build a signature, checking that it is well formed:
    /// a non-empty state name that is not reserved by action triggers, at
    /// least one probe, unique probe ids, and probe geometry that is not
    /// inverted.
    pub fn new(state: impl Into<String>, probes: Vec<Probe>) -> Result<Self, BuildError> {
        let state = state.into();
        let invalid = |reason: String| BuildError::InvalidSignature {
            state: state.clone(),
            reason,
        };
        if state.trim().is_empty() {
            return Err(invalid("state name must not be empty".into()));
        }
        if RESERVED_STATES.contains(&state.trim()) {
            return Err(invalid(format!(
                "state name '{}' is reserved for action triggers",
                state.trim()
            )));
        }
        if probes.is_empty() {
            return Err(invalid("at least one probe is required".into()));
        }
        let mut seen = HashSet::with_capacity(probes.len());
        for p in &probes {
            p.check().map_err(invalid)?;
            if !seen.insert(p.id()) {
                return Err(invalid(format!("duplicate probe id '{}'", p.id())));
            }
        }
        Ok(Self {
            state,
            min_ratio: None,
            probes,
        })
    }

    /// Per-signature acceptance ratio, in (0, 1].
    pub fn with_min_ratio(mut self, ratio: f32) -> Result<Self, BuildError> {
        if !(ratio > 0.0 && ratio <= 1.0) {
            return Err(BuildError::InvalidSignature {
                state: self.state,
                reason: "min_ratio must be in (0.0, 1.0]".into(),
            });
        }
        self.min_ratio = Some(ratio);
        Ok(self)
    }

    pub fn state(&self) -> &str {
        &self.state
    }

    pub fn min_ratio(&self) -> Option<f32> {
        self.min_ratio
    }

    pub fn probes(&self) -> &[Probe] {
        &self.probes
    }

    /// Copy of this signature with `probe` replacing the one sharing its id,
    /// or appended when the id is new.
    pub fn with_probe(&self, probe: Probe) -> Result<Self, BuildError> {
        let mut probes = self.probes.clone();
        match probes.iter_mut().find(|p| p.id() == probe.id()) {
            Some(slot) => *slot = probe,
            None => probes.push(probe),
        }
        let sig = Signature::new(self.state.clone(), probes)?;
        match self.min_ratio {
            Some(r) => sig.with_min_ratio(r),
            None => Ok(sig),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::probe::Color;

    fn point(id: &str) -> Probe {
        Probe::Point {
            id: id.into(),
            x: 1,
            y: 1,
            color: Color::new(0, 0, 0),
            tolerance: 0,
        }
    }

    #[test]
    fn rejects_empty_and_duplicate_probes() {
        assert!(matches!(
            Signature::new("home", vec![]),
            Err(BuildError::InvalidSignature { .. })
        ));
        let err = Signature::new("home", vec![point("a"), point("a")]).unwrap_err();
        assert!(err.to_string().contains("duplicate probe id 'a'"));
    }

    #[test]
    fn rejects_trigger_names() {
        for name in ["unknown", "any", " any "] {
            let err = Signature::new(name, vec![point("a")]).unwrap_err();
            assert!(err.to_string().contains("reserved"), "{name}: {err}");
        }
        assert!(Signature::new("unknown_dialog", vec![point("a")]).is_ok());
    }

    #[test]
    fn rejects_out_of_range_ratio() {
        let sig = Signature::new("home", vec![point("a")]).unwrap();
        assert!(sig.clone().with_min_ratio(0.0).is_err());
        assert!(sig.clone().with_min_ratio(1.01).is_err());
        assert_eq!(sig.with_min_ratio(1.0).unwrap().min_ratio(), Some(1.0));
    }

    #[test]
    fn with_probe_replaces_in_place() {
        let sig = Signature::new("home", vec![point("a"), point("b")])
            .unwrap()
            .with_min_ratio(0.5)
            .unwrap();
        let moved = Probe::Point {
            id: "a".into(),
            x: 9,
            y: 9,
            color: Color::new(1, 2, 3),
            tolerance: 4,
        };
        let next = sig.with_probe(moved.clone()).unwrap();
        assert_eq!(next.probes()[0], moved);
        assert_eq!(next.probes().len(), 2);
        assert_eq!(next.min_ratio(), Some(0.5));
        let grown = next.with_probe(point("c")).unwrap();
        assert_eq!(grown.probes()[2].id(), "c");
    }
}
