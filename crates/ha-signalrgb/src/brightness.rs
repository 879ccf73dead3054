//! Brightness scale conversion
//!
//! SignalRGB uses 0..=100, the light platform 0..=255. The cache keeps the
//! SignalRGB value; conversion happens at the edges.

/// Highest SignalRGB brightness
pub const NATIVE_MAX: u8 = 100;

/// SignalRGB brightness (0..=100) to light brightness (0..=255)
pub fn to_host(native: u8) -> u8 {
    let native = f64::from(native.min(NATIVE_MAX));
    (native * 255.0 / 100.0).round() as u8
}

/// Light brightness (0..=255) to SignalRGB brightness (0..=100)
pub fn to_native(host: u8) -> u8 {
    (f64::from(host) * 100.0 / 255.0).round() as u8
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_known_values() {
        assert_eq!(to_host(0), 0);
        assert_eq!(to_host(50), 128);
        assert_eq!(to_host(100), 255);
        assert_eq!(to_native(128), 50);
        assert_eq!(to_native(255), 100);
        assert_eq!(to_native(1), 0);
    }

    #[test]
    fn test_round_trip_and_monotonic() {
        let mut previous = None;
        for native in 0..=NATIVE_MAX {
            let host = to_host(native);
            let back = to_native(host);
            assert!(back.abs_diff(native) <= 1, "{native} -> {host} -> {back}");
            if let Some(previous) = previous {
                assert!(host > previous, "not monotonic at {native}");
            }
            previous = Some(host);
        }
    }

    #[test]
    fn test_native_is_clamped() {
        assert_eq!(to_host(180), 255);
    }
}
