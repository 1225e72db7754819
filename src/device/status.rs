// Status du device - partagé entre le dispatcher et le lecteur d'acquittements

use std::sync::Arc;
use std::sync::atomic::{AtomicU8, Ordering};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeviceStatus {
    Disconnected = 0,
    Connected = 1,
    Error = 2,
}

impl From<u8> for DeviceStatus {
    fn from(value: u8) -> Self {
        match value {
            1 => DeviceStatus::Connected,
            2 => DeviceStatus::Error,
            _ => DeviceStatus::Disconnected,
        }
    }
}

impl DeviceStatus {
    /// Only a connected device accepts commands
    pub fn is_connected(&self) -> bool {
        matches!(self, DeviceStatus::Connected)
    }
}

/// Atomic wrapper pour partager le status entre threads
#[derive(Debug, Clone)]
pub struct AtomicDeviceStatus {
    inner: Arc<AtomicU8>,
}

impl AtomicDeviceStatus {
    pub fn new(status: DeviceStatus) -> Self {
        Self {
            inner: Arc::new(AtomicU8::new(status as u8)),
        }
    }

    pub fn get(&self) -> DeviceStatus {
        DeviceStatus::from(self.inner.load(Ordering::Relaxed))
    }

    pub fn set(&self, status: DeviceStatus) {
        self.inner.store(status as u8, Ordering::Relaxed);
    }
}

impl Default for AtomicDeviceStatus {
    fn default() -> Self {
        Self::new(DeviceStatus::Disconnected)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip_through_u8() {
        for status in [
            DeviceStatus::Disconnected,
            DeviceStatus::Connected,
            DeviceStatus::Error,
        ] {
            assert_eq!(DeviceStatus::from(status as u8), status);
        }
        assert_eq!(DeviceStatus::from(42), DeviceStatus::Disconnected);
    }

    #[test]
    fn test_clones_share_state() {
        let status = AtomicDeviceStatus::default();
        let shared = status.clone();
        assert!(!status.get().is_connected());

        shared.set(DeviceStatus::Connected);
        assert!(status.get().is_connected());
    }
}
