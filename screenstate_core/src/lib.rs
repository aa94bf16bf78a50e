#![cfg_attr(all(not(debug_assertions), not(test)), deny(warnings))]
#![cfg_attr(
    all(not(debug_assertions), not(test)),
    deny(clippy::all, clippy::pedantic, clippy::nursery)
)]
#![allow(clippy::module_name_repetitions, clippy::missing_errors_doc)]
#![cfg_attr(not(test), deny(clippy::unwrap_used, clippy::expect_used))]
//! Screen-state classification and wait-for-state control (device-agnostic).
//!
//! All device interaction goes through `screenstate_traits::DeviceChannel`;
//! OCR goes through `screenstate_traits::PercentageReader`.
//!
//! ## Architecture
//!
//! - **Probes**: point, average-region and template checks (`probe`, `template`)
//! - **Signatures**: named probe sets, one per state (`signature`)
//! - **Store**: ordered signatures with lenient load and atomic save (`store`)
//! - **Classifier**: pure frame → state decision with a score table (`classifier`)
//! - **Actions**: ordered trigger → command-sequence policy (`actions`)
//! - **Waiter**: three-phase poll loop with escalation (`waiter`)

pub mod actions;
pub mod classifier;
pub mod config;
pub mod conversions;
pub mod device_error;
pub mod error;
pub mod probe;
pub mod session;
pub mod signature;
pub mod status;
pub mod store;
pub mod template;
pub mod waiter;

pub use actions::{Action, ActionTable, Rule, Trigger};
pub use classifier::{ClassificationResult, Classifier, StateScore, UNKNOWN, classify};
pub use config::{ClassifierCfg, Timeouts, WaitCfg};
pub use error::{BuildError, Result, ScreenError};
pub use probe::{Color, Probe, ProbeOutcome};
pub use session::{Observation, Session};
pub use signature::Signature;
pub use status::{FatalCause, Outcome, WaitReport};
pub use store::{SignatureStore, StoreHandle};
pub use template::Template;
pub use waiter::{StateWaiter, StateWaiterBuilder};
