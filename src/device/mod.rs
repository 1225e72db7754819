// Device module - outbound command stream and acknowledgement drain

pub mod ack;
pub mod dispatcher;
pub mod status;

pub use ack::AckReader;
pub use dispatcher::{DeviceDispatcher, DeviceProtocol, SharedDevice, lock_device};
pub use status::{AtomicDeviceStatus, DeviceStatus};
