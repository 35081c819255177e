use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// One reading of the shared electrical sensor
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq)]
pub struct TelemetrySample {
    /// Amperes
    pub current: f64,
    /// Watts
    pub power: f64,
    /// Volts
    pub voltage: f64,
}

impl TelemetrySample {
    pub fn new(current: f64, power: f64, voltage: f64) -> Self {
        Self {
            current,
            power,
            voltage,
        }
    }

    /// Readings must be finite and non-negative to be usable.
    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [
            ("current", self.current),
            ("power", self.power),
            ("voltage", self.voltage),
        ] {
            if !value.is_finite() {
                return Err(format!("{} is not a finite number", name));
            }
            if value < 0.0 {
                return Err(format!("{} is negative ({})", name, value));
            }
        }
        Ok(())
    }
}

/// Operating status of a monitored device.
///
/// A previous status that is absent or unreadable is represented as
/// `Option::<DeviceStatus>::None` (UNKNOWN); a written record always carries
/// `On` or `Off`.
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "UPPERCASE")]
pub enum DeviceStatus {
    On,
    Off,
}

impl DeviceStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            DeviceStatus::On => "ON",
            DeviceStatus::Off => "OFF",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "ON" => Some(DeviceStatus::On),
            "OFF" => Some(DeviceStatus::Off),
            _ => None,
        }
    }
}

impl std::fmt::Display for DeviceStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Label for an optional previous status, as it appears in logs.
pub fn status_label(status: Option<DeviceStatus>) -> &'static str {
    status.map(|s| s.as_str()).unwrap_or("UNKNOWN")
}

/// Durable "last known status" per (user, device).
///
/// Field names on the wire follow the vocabulary the mobile clients read
/// (`device_name`, `voltase`, `ampere`).
#[derive(Serialize, Deserialize, Debug, Clone, PartialEq)]
pub struct DeviceStatusRecord {
    pub user_id: i32,
    #[serde(rename = "device_name")]
    pub device_label: String,
    #[serde(rename = "voltase")]
    pub voltage: f64,
    #[serde(rename = "ampere")]
    pub current: f64,
    pub watt: f64,
    pub status: DeviceStatus,
    /// Assigned by the store on write; `None` on records not yet persisted.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_update: Option<DateTime<Utc>>,
}

impl DeviceStatusRecord {
    pub fn from_sample(
        user_id: i32,
        device_label: &str,
        sample: &TelemetrySample,
        status: DeviceStatus,
    ) -> Self {
        Self {
            user_id,
            device_label: device_label.to_string(),
            voltage: sample.voltage,
            current: sample.current,
            watt: sample.power,
            status,
            last_update: None,
        }
    }

    pub fn key(&self) -> String {
        live_state_key(self.user_id, &self.device_label)
    }
}

/// Storage key of a live-state record: `user<ID>_<label with spaces as _>`.
pub fn live_state_key(user_id: i32, device_label: &str) -> String {
    format!("user{}_{}", user_id, device_label.replace(' ', "_"))
}

/// Why a push notification is sent
#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AlertCategory {
    HighVoltage,
    TurnedOff,
    TurnedOn,
}

impl AlertCategory {
    pub fn title(&self) -> &'static str {
        match self {
            AlertCategory::HighVoltage => "High Voltage Alert",
            AlertCategory::TurnedOff => "Device Turned OFF",
            AlertCategory::TurnedOn => "Device Turned ON",
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            AlertCategory::HighVoltage => "high_voltage",
            AlertCategory::TurnedOff => "turned_off",
            AlertCategory::TurnedOn => "turned_on",
        }
    }
}

/// A push message decided by the reconciler
#[derive(Debug, Clone, PartialEq)]
pub struct Notification {
    pub category: AlertCategory,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(category: AlertCategory, device_label: &str, sample: &TelemetrySample) -> Self {
        let body = match category {
            AlertCategory::HighVoltage => format!(
                "Device {} detected {:.1} V. Check immediately!",
                device_label, sample.voltage
            ),
            AlertCategory::TurnedOff => format!(
                "Device {} is now inactive (0 Watt/Amp/Volt).",
                device_label
            ),
            AlertCategory::TurnedOn => format!("Device {} is now active.", device_label),
        };

        Self {
            category,
            title: category.title().to_string(),
            body,
        }
    }
}
