use std::time::Duration;

use rstest::rstest;
use screenstate_core::error::BuildError;
use screenstate_core::{ClassifierCfg, StateWaiter, Timeouts, WaitCfg};
use screenstate_device::SimulatedDevice;
use screenstate_traits::{Frame, PercentageReader, Rect};

#[rstest]
fn builder_missing_device_yields_typed_build_error() {
    let err = StateWaiter::<SimulatedDevice>::builder()
        .build()
        .expect_err("should fail with MissingDevice");

    match err.downcast_ref::<BuildError>() {
        Some(BuildError::MissingDevice) => {}
        other => panic!("expected MissingDevice, got: {other:?}"),
    }
}

#[rstest]
#[case::zero_ratio(ClassifierCfg { min_ratio: 0.0 }, WaitCfg::default(), Timeouts::default())]
#[case::nan_ratio(ClassifierCfg { min_ratio: f32::NAN }, WaitCfg::default(), Timeouts::default())]
#[case::no_polls(
    ClassifierCfg::default(),
    WaitCfg { max_pre_attempts: 0, max_post_attempts: 0, poll_interval: Duration::ZERO },
    Timeouts::default()
)]
#[case::no_pre_polls(
    ClassifierCfg::default(),
    WaitCfg { max_pre_attempts: 0, max_post_attempts: 10, poll_interval: Duration::from_secs(1) },
    Timeouts::default()
)]
#[case::zero_capture_timeout(
    ClassifierCfg::default(),
    WaitCfg::default(),
    Timeouts { capture: Duration::ZERO, command: Duration::from_secs(1) }
)]
fn builder_rejects_invalid_config(
    #[case] classifier: ClassifierCfg,
    #[case] wait: WaitCfg,
    #[case] timeouts: Timeouts,
) {
    let err = StateWaiter::builder()
        .with_device(SimulatedDevice::new())
        .with_classifier(classifier)
        .with_wait(wait)
        .with_timeouts(timeouts)
        .build()
        .expect_err("should reject config");
    assert!(matches!(
        err.downcast_ref::<BuildError>(),
        Some(BuildError::InvalidConfig(_))
    ));
}

struct NeverReads;
impl PercentageReader for NeverReads {
    fn extract_percentage(&mut self, _frame: &Frame, _zone: Rect) -> Option<u8> {
        None
    }
}

#[rstest]
fn builder_rejects_empty_progress_zone() {
    let err = StateWaiter::builder()
        .with_device(SimulatedDevice::new())
        .with_progress(NeverReads, Rect::new(10, 10, 10, 20))
        .build()
        .expect_err("empty zone");
    assert!(format!("{err}").contains("progress zone"));
}

#[rstest]
fn builder_defaults_are_valid() {
    let waiter = StateWaiter::builder()
        .with_device(SimulatedDevice::new())
        .build()
        .expect("defaults build");
    assert_eq!(*waiter.wait_cfg(), WaitCfg::default());
    assert!(waiter.store().snapshot().get("loaded").is_some());
}
