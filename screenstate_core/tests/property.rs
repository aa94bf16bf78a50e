use std::time::Duration;

use proptest::prelude::*;
use screenstate_core::{
    Action, ActionTable, ClassifierCfg, Color, Outcome, Probe, Signature, SignatureStore,
    StateWaiter, Trigger, WaitCfg, classify,
};
use screenstate_device::{SimStep, SimulatedDevice};
use screenstate_traits::clock::test_clock::TestClock;
use screenstate_traits::{CommandSpec, Frame, Rect};

const W: u32 = 12;
const H: u32 = 10;

fn arb_frame() -> impl Strategy<Value = Frame> {
    prop::collection::vec(any::<u8>(), (W * H * 3) as usize)
        .prop_map(|px| Frame::from_rgb(W, H, px).expect("sized buffer"))
}

/// Probes whose geometry may fall partly or wholly outside a WxH frame.
fn arb_probe(id: usize) -> impl Strategy<Value = Probe> {
    let point = (0u32..W * 2, 0u32..H * 2, any::<[u8; 3]>(), any::<u8>()).prop_map(
        move |(x, y, rgb, tolerance)| Probe::Point {
            id: format!("p{id}"),
            x,
            y,
            color: Color::from_array(rgb),
            tolerance,
        },
    );
    let region = (0u32..W * 2, 0u32..H * 2, 1u32..6, 1u32..6, any::<[u8; 3]>(), any::<u8>())
        .prop_map(move |(x, y, w, h, rgb, tolerance)| Probe::AverageRegion {
            id: format!("p{id}"),
            zone: Rect::new(x, y, x + w, y + h),
            color: Color::from_array(rgb),
            tolerance,
        });
    prop_oneof![point, region]
}

fn arb_signature(state: String) -> impl Strategy<Value = Signature> {
    (1usize..5)
        .prop_flat_map(|n| (0..n).map(arb_probe).collect::<Vec<_>>())
        .prop_map(move |probes| Signature::new(state.clone(), probes).expect("valid signature"))
}

fn arb_store() -> impl Strategy<Value = SignatureStore> {
    prop::collection::vec(arb_signature("s".to_string()), 1..5).prop_map(|sigs| {
        let mut store = SignatureStore::new();
        for (i, sig) in sigs.into_iter().enumerate() {
            let renamed = Signature::new(format!("s{i}"), sig.probes().to_vec()).expect("valid");
            store.upsert(renamed);
        }
        store
    })
}

fn in_frame(p: &Probe) -> bool {
    match p {
        Probe::Point { x, y, .. } => *x < W && *y < H,
        Probe::AverageRegion { zone, .. } => zone.x2 <= W && zone.y2 <= H,
        Probe::Template { .. } => true,
    }
}

fn with_tolerance(p: &Probe, tol: u8) -> Probe {
    match p.clone() {
        Probe::Point {
            id, x, y, color, ..
        } => Probe::Point {
            id,
            x,
            y,
            color,
            tolerance: tol,
        },
        Probe::AverageRegion { id, zone, color, .. } => Probe::AverageRegion {
            id,
            zone,
            color,
            tolerance: tol,
        },
        other => other,
    }
}

proptest! {
    #[test]
    fn classification_is_deterministic(frame in arb_frame(), store in arb_store(), ratio in 0.05f32..=1.0) {
        let cfg = ClassifierCfg { min_ratio: ratio };
        let a = classify(&frame, &store, &cfg);
        let b = classify(&frame, &store, &cfg);
        prop_assert_eq!(a, b);
    }

    #[test]
    fn result_is_unknown_or_an_accepted_state(frame in arb_frame(), store in arb_store(), ratio in 0.05f32..=1.0) {
        let r = classify(&frame, &store, &ClassifierCfg { min_ratio: ratio });
        prop_assert!((0.0..=1.0).contains(&r.confidence()));
        match r.state() {
            Some(s) => {
                let score = r.scores().iter().find(|sc| sc.state == s).expect("winner has a score");
                prop_assert!(score.accepted());
                prop_assert!(r.scores().iter().filter(|sc| sc.accepted()).all(|sc| sc.ratio <= score.ratio));
            }
            None => prop_assert!(r.scores().iter().all(|sc| !sc.accepted())),
        }
    }

    #[test]
    fn raising_tolerance_never_loses_matches(frame in arb_frame(), sig in arb_signature("s".into()), extra in 0u8..=255) {
        let mut loose = SignatureStore::new();
        let probes = sig
            .probes()
            .iter()
            .map(|p| {
                let tol = match p {
                    Probe::Point { tolerance, .. } | Probe::AverageRegion { tolerance, .. } => *tolerance,
                    Probe::Template { .. } => 0,
                };
                with_tolerance(p, tol.saturating_add(extra))
            })
            .collect();
        loose.upsert(Signature::new("s", probes).expect("valid"));
        let mut tight = SignatureStore::new();
        tight.upsert(sig);

        let cfg = ClassifierCfg::default();
        let t = classify(&frame, &tight, &cfg);
        let l = classify(&frame, &loose, &cfg);
        prop_assert!(l.scores()[0].matched >= t.scores()[0].matched);
        prop_assert_eq!(l.scores()[0].evaluated, t.scores()[0].evaluated);
    }

    #[test]
    fn out_of_frame_probes_are_exactly_the_skipped_ones(frame in arb_frame(), sig in arb_signature("s".into())) {
        let expected_skipped = sig.probes().iter().filter(|p| !in_frame(p)).count() as u32;
        let total = sig.probes().len() as u32;
        let mut store = SignatureStore::new();
        store.upsert(sig);
        let r = classify(&frame, &store, &ClassifierCfg::default());
        prop_assert_eq!(r.scores()[0].skipped, expected_skipped);
        prop_assert_eq!(r.scores()[0].evaluated, total - expected_skipped);
    }

    #[test]
    fn store_survives_save_and_load(store in arb_store()) {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("signatures.toml");
        store.save(&path).expect("save");
        let loaded = SignatureStore::try_load(&path).expect("load").expect("present");
        prop_assert_eq!(loaded, store);
    }

    #[test]
    fn waits_stay_within_budget(
        script in prop::collection::vec(0u8..4, 1..30),
        pre in 1u32..6,
        post in 0u32..8,
    ) {
        // 0 = target, 1 = trigger state, 2 = other state, 3 = capture error
        let marker = |s: u8| Frame::from_fn(4, 4, |x, y| if x == 0 && y == 0 { [s * 60, 0, 0] } else { [0, 0, 0] });
        let mut dev = SimulatedDevice::new();
        for &s in &script {
            match s {
                3 => dev.push(SimStep::CaptureError("flaky".into())),
                s => dev.push(SimStep::Frame(marker(s + 1))),
            };
        }
        let log = dev.log();

        let mut store = SignatureStore::new();
        for (name, s) in [("target", 1u8), ("trigger", 2), ("other", 3)] {
            store.upsert(Signature::new(name, vec![Probe::Point {
                id: "m".into(), x: 0, y: 0, color: Color::new(s * 60, 0, 0), tolerance: 0,
            }]).expect("valid"));
        }
        let actions = ActionTable::default().with_rule(
            Trigger::State("trigger".into()),
            Action::new("fix", vec![CommandSpec::KeyEvent(4)]),
        );
        let clock = TestClock::new();
        let mut w = StateWaiter::builder()
            .with_device(dev)
            .with_store(store)
            .with_actions(actions)
            .with_clock(Box::new(clock.clone()))
            .build()
            .expect("builds");

        let report = w.wait_for_state_with("target", WaitCfg {
            max_pre_attempts: pre,
            max_post_attempts: post,
            poll_interval: Duration::from_millis(100),
        });
        let s = &report.session;
        prop_assert!(s.pre_attempts <= pre);
        prop_assert!(s.post_attempts <= post);
        prop_assert_eq!(log.captures() as u32, s.polls());
        prop_assert!(s.dispatches <= 1 + post / 2);
        prop_assert_eq!(log.commands().len() as u32, s.dispatches);
        prop_assert_eq!(report.cause.is_some(), report.outcome == Outcome::Fatal);
        if report.outcome == Outcome::Success {
            prop_assert_eq!(report.session.last_seen.as_ref().and_then(|o| o.state.as_deref()), Some("target"));
        }
    }
}
