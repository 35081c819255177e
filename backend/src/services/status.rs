use crate::models::{DeviceStatus, TelemetrySample};

// Noise floor: readings under any of these are sensor jitter, not load.
pub const MIN_ON_WATT: f64 = 0.1;
pub const MIN_ON_CURRENT: f64 = 0.01;
pub const MIN_ON_VOLTAGE: f64 = 1.0;

/// Voltage above which every sample raises an alert
pub const HIGH_VOLTAGE_THRESHOLD: f64 = 250.0;

/// Map a sample to an operating status.
pub fn derive_status(sample: &TelemetrySample) -> DeviceStatus {
    if sample.power < MIN_ON_WATT
        || sample.current < MIN_ON_CURRENT
        || sample.voltage < MIN_ON_VOLTAGE
    {
        DeviceStatus::Off
    } else {
        DeviceStatus::On
    }
}

pub fn is_high_voltage(sample: &TelemetrySample) -> bool {
    sample.voltage > HIGH_VOLTAGE_THRESHOLD
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(current: f64, power: f64, voltage: f64) -> TelemetrySample {
        TelemetrySample::new(current, power, voltage)
    }

    #[test]
    fn test_normal_load_is_on() {
        assert_eq!(derive_status(&sample(0.5, 120.0, 230.0)), DeviceStatus::On);
    }

    #[test]
    fn test_all_zero_is_off() {
        assert_eq!(derive_status(&sample(0.0, 0.0, 0.0)), DeviceStatus::Off);
    }

    #[test]
    fn test_each_threshold_alone_forces_off() {
        assert_eq!(derive_status(&sample(0.5, 0.05, 230.0)), DeviceStatus::Off);
        assert_eq!(derive_status(&sample(0.005, 120.0, 230.0)), DeviceStatus::Off);
        assert_eq!(derive_status(&sample(0.5, 120.0, 0.9)), DeviceStatus::Off);
    }

    #[test]
    fn test_threshold_boundaries_are_on() {
        assert_eq!(derive_status(&sample(0.01, 0.1, 1.0)), DeviceStatus::On);
    }

    #[test]
    fn test_sub_threshold_watt_never_flaps() {
        let first = derive_status(&sample(0.5, 0.05, 230.0));
        let second = derive_status(&sample(0.6, 0.05, 231.0));
        assert_eq!(first, DeviceStatus::Off);
        assert_eq!(first, second);
    }

    #[test]
    fn test_deterministic_over_grid() {
        let values = [0.0, 0.005, 0.01, 0.05, 0.1, 0.9, 1.0, 5.0, 230.0, 260.0];
        for &c in &values {
            for &p in &values {
                for &v in &values {
                    let s = sample(c, p, v);
                    let expected = if p < 0.1 || c < 0.01 || v < 1.0 {
                        DeviceStatus::Off
                    } else {
                        DeviceStatus::On
                    };
                    assert_eq!(derive_status(&s), expected);
                    assert_eq!(derive_status(&s), derive_status(&s));
                }
            }
        }
    }

    #[test]
    fn test_high_voltage() {
        assert!(is_high_voltage(&sample(1.0, 230.0, 255.0)));
        assert!(!is_high_voltage(&sample(1.0, 230.0, 250.0)));
    }
}
