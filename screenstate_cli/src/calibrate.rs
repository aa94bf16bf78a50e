//! `calibrate` command: sample the current screen into signature probes.

use std::path::Path;

use eyre::WrapErr;
use screenstate_core::{Color, Probe, Signature, SignatureStore, Template, probe::mean_color};
use screenstate_traits::{DeviceChannel, Frame, Rect};

use crate::cli::{CalibrateCmd, Cli};
use crate::device::{Loaded, open_device};

/// Insert `probe` into the signature for `state`, replacing a probe with the
/// same id, or create the signature.
pub fn upsert_probe(store: &mut SignatureStore, state: &str, probe: Probe) -> eyre::Result<()> {
    let sig = match store.get(state) {
        Some(existing) => existing.with_probe(probe),
        None => Signature::new(state, vec![probe]),
    }
    .map_err(eyre::Report::new)?;
    store.upsert(sig);
    Ok(())
}

/// Strict load for editing: a missing file starts empty, an unreadable one is
/// an error so it is never silently overwritten.
fn load_for_edit(path: &Path) -> eyre::Result<SignatureStore> {
    Ok(SignatureStore::try_load(path)?.unwrap_or_default())
}

fn capture(cli: &Cli, loaded: &Loaded) -> eyre::Result<Frame> {
    let mut device = open_device(cli, &loaded.cfg)?;
    let timeout = std::time::Duration::from_millis(loaded.cfg.device.capture_timeout_ms);
    device
        .capture_frame(timeout)
        .map_err(|e| eyre::eyre!("capture frame: {e}"))
}

fn outside(frame: &Frame, what: &str) -> eyre::Report {
    eyre::eyre!("{what} lies outside the {}x{} frame", frame.width(), frame.height())
}

/// Probe sampled from `frame` for one interactive calibrate command.
pub fn sample_probe(frame: &Frame, cmd: &CalibrateCmd) -> eyre::Result<(String, Probe)> {
    match cmd {
        CalibrateCmd::Point {
            state,
            id,
            x,
            y,
            tolerance,
        } => {
            let px = frame
                .pixel(*x, *y)
                .ok_or_else(|| outside(frame, &format!("point ({x},{y})")))?;
            Ok((
                state.clone(),
                Probe::Point {
                    id: id.clone(),
                    x: *x,
                    y: *y,
                    color: Color::from_array(px),
                    tolerance: *tolerance,
                },
            ))
        }
        CalibrateCmd::Region {
            state,
            id,
            zone,
            tolerance,
        } => {
            let mean = mean_color(frame, zone)
                .ok_or_else(|| outside(frame, &format!("zone {:?}", zone.corners())))?;
            let [r, g, b] = mean.map(|c| c.round().clamp(0.0, 255.0) as u8);
            Ok((
                state.clone(),
                Probe::AverageRegion {
                    id: id.clone(),
                    zone: *zone,
                    color: Color::new(r, g, b),
                    tolerance: *tolerance,
                },
            ))
        }
        CalibrateCmd::Template {
            state,
            id,
            zone,
            threshold,
            search,
        } => {
            file_name_part("state", state)?;
            file_name_part("id", id)?;
            let crop = frame
                .crop(zone)
                .ok_or_else(|| outside(frame, &format!("zone {:?}", zone.corners())))?;
            let source = format!("templates/{state}_{id}.png");
            let template = Template::from_frame(source, &crop)
                .ok_or_else(|| eyre::eyre!("zone {:?} is empty", zone.corners()))?;
            if let Some(area) = search
                && !contains(area, zone)
            {
                eyre::bail!("search area {:?} must contain the template zone", area.corners());
            }
            Ok((
                state.clone(),
                Probe::Template {
                    id: id.clone(),
                    zone: *search,
                    template,
                    threshold: *threshold,
                },
            ))
        }
        CalibrateCmd::ImportCsv { .. } => eyre::bail!("import-csv does not sample the screen"),
    }
}

/// `value` becomes part of a template file name under `templates/`.
fn file_name_part(what: &str, value: &str) -> eyre::Result<()> {
    if value.is_empty() || value.contains(['/', '\\']) || value.contains("..") {
        eyre::bail!("template {what} '{value}' must not be empty or contain '/', '\\' or '..'");
    }
    Ok(())
}

fn contains(outer: &Rect, inner: &Rect) -> bool {
    outer.x1 <= inner.x1 && outer.y1 <= inner.y1 && inner.x2 <= outer.x2 && inner.y2 <= outer.y2
}

pub fn run_calibrate(cli: &Cli, loaded: &Loaded, cmd: &CalibrateCmd) -> eyre::Result<()> {
    let path = loaded.store_path();
    let mut store = load_for_edit(&path)?;

    if let CalibrateCmd::ImportCsv { file } = cmd {
        let rows = screenstate_config::load_probe_csv(file)?;
        for row in &rows {
            let probe = Probe::Point {
                id: row.id.clone(),
                x: row.x,
                y: row.y,
                color: Color::new(row.r, row.g, row.b),
                tolerance: row.tolerance,
            };
            upsert_probe(&mut store, &row.state, probe)
                .wrap_err_with(|| format!("row for {}/{}", row.state, row.id))?;
        }
        store.save(&path)?;
        tracing::info!(rows = rows.len(), path = %path.display(), "probes imported");
        println!("imported {} probes into {}", rows.len(), path.display());
        return Ok(());
    }

    let frame = capture(cli, loaded)?;
    let (state, probe) = sample_probe(&frame, cmd)?;
    let summary = format!("{} probe '{}' for state '{}'", probe.kind(), probe.id(), state);
    upsert_probe(&mut store, &state, probe)?;
    store.save(&path)?;
    tracing::info!(state = %state, path = %path.display(), "probe calibrated");
    println!("saved {summary} to {}", path.display());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn frame() -> Frame {
        Frame::from_fn(10, 10, |x, y| if x < 5 { [200, 0, 0] } else { [0, 0, (y * 20) as u8] })
    }

    #[test]
    fn point_samples_the_pixel() {
        let cmd = CalibrateCmd::Point {
            state: "home".into(),
            id: "red".into(),
            x: 1,
            y: 1,
            tolerance: 4,
        };
        let (state, probe) = sample_probe(&frame(), &cmd).unwrap();
        assert_eq!(state, "home");
        assert!(matches!(probe, Probe::Point { color, tolerance: 4, .. } if color == Color::new(200, 0, 0)));
    }

    #[test]
    fn region_averages_the_zone() {
        let cmd = CalibrateCmd::Region {
            state: "home".into(),
            id: "band".into(),
            zone: Rect::new(5, 0, 10, 2),
            tolerance: 4,
        };
        let (_, probe) = sample_probe(&frame(), &cmd).unwrap();
        assert!(matches!(probe, Probe::AverageRegion { color, .. } if color == Color::new(0, 0, 10)));
    }

    #[test]
    fn point_outside_frame_is_an_error() {
        let cmd = CalibrateCmd::Point {
            state: "home".into(),
            id: "far".into(),
            x: 10,
            y: 0,
            tolerance: 4,
        };
        let err = sample_probe(&frame(), &cmd).unwrap_err();
        assert!(err.to_string().contains("outside the 10x10 frame"));
    }

    #[test]
    fn template_names_cannot_leave_the_templates_dir() {
        for (state, id) in [("../x", "logo"), ("home", "a/b"), ("home", "a\\b"), ("", "logo")] {
            let cmd = CalibrateCmd::Template {
                state: state.into(),
                id: id.into(),
                zone: Rect::new(0, 0, 3, 3),
                threshold: 0.9,
                search: None,
            };
            let err = sample_probe(&frame(), &cmd).unwrap_err();
            assert!(err.to_string().contains("must not be empty"), "{state}/{id}: {err}");
        }
    }

    #[test]
    fn upsert_replaces_probe_with_same_id() {
        let mut store = SignatureStore::new();
        let p = |tol| Probe::Point {
            id: "a".into(),
            x: 0,
            y: 0,
            color: Color::new(1, 2, 3),
            tolerance: tol,
        };
        upsert_probe(&mut store, "home", p(1)).unwrap();
        upsert_probe(&mut store, "home", p(9)).unwrap();
        let probes = store.get("home").unwrap().probes();
        assert_eq!(probes, &[p(9)]);
    }
}
