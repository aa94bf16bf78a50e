//! Maps `Box<dyn Error>` from the device trait boundary to typed `ScreenError`.
//!
//! `screenstate_traits::DeviceChannel` returns `Box<dyn Error + Send + Sync>`;
//! this module turns those into either a transient capture failure or a
//! disconnection, with an optional feature-gated path for
//! `screenstate_device::DeviceError` downcasting.

use crate::error::ScreenError;

const DISCONNECT_MARKERS: [&str; 4] = ["disconnect", "device not found", "offline", "no devices"];

/// Map a capture-side trait-boundary error to a typed `ScreenError`.
///
/// Attempts to downcast known device error types first, then falls back
/// to string-based heuristics.
pub fn map_device_error(e: &(dyn std::error::Error + 'static)) -> ScreenError {
    #[cfg(feature = "device-errors")]
    {
        use screenstate_device::error::DeviceError;
        if let Some(dev) = e.downcast_ref::<DeviceError>() {
            return match dev {
                DeviceError::Disconnected(msg) => ScreenError::ChannelDisconnected(msg.clone()),
                other => ScreenError::Capture(other.to_string()),
            };
        }
    }

    let s = e.to_string();
    let lower = s.to_lowercase();
    if DISCONNECT_MARKERS.iter().any(|m| lower.contains(m)) {
        ScreenError::ChannelDisconnected(s)
    } else {
        ScreenError::Capture(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[derive(Debug)]
    struct Plain(&'static str);
    impl std::fmt::Display for Plain {
        fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
            f.write_str(self.0)
        }
    }
    impl std::error::Error for Plain {}

    #[test]
    fn heuristics_detect_disconnect() {
        let e = Plain("error: device 'emulator-5554' not found; device not found");
        assert!(matches!(
            map_device_error(&e),
            ScreenError::ChannelDisconnected(_)
        ));
        let e = Plain("screencap returned garbage");
        assert!(matches!(map_device_error(&e), ScreenError::Capture(_)));
    }

    #[cfg(feature = "device-errors")]
    #[test]
    fn typed_device_errors_downcast() {
        use screenstate_device::error::DeviceError;
        let e = DeviceError::Disconnected("usb unplugged".into());
        assert_eq!(
            map_device_error(&e),
            ScreenError::ChannelDisconnected("usb unplugged".into())
        );
        let e = DeviceError::Timeout;
        assert!(matches!(map_device_error(&e), ScreenError::Capture(_)));
    }
}
