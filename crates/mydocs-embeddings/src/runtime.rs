//! Process-wide inference runtime.
//!
//! Both the embedder and the cross-encoder run on the same device, created
//! once on first use and never torn down.

use std::sync::OnceLock;

use candle_core::Device;
use tracing::debug;

static DEVICE: OnceLock<Device> = OnceLock::new();

/// The shared inference device.
pub fn device() -> &'static Device {
    DEVICE.get_or_init(|| {
        debug!("Initializing CPU inference device");
        Device::Cpu
    })
}
