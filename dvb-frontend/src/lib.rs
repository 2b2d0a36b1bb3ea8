//! dvb-frontend library - read-only access to Linux DVB frontends
//!
//! This library exposes the signal-quality queries of a DVB frontend
//! character device (`/dev/dvb/adapterN/frontendM`) through the
//! [`FrontendDevice`] capability, and enumerates the frontends present
//! on the machine.

pub mod device;
pub mod discovery;

mod error;

// Re-export commonly used types
pub use device::{
    open_frontend, DeliverySystem, Frontend, FrontendDevice, FrontendStatus, StatSample,
    StatScale, Statistics, TunerId,
};
pub use discovery::{discover, discover_frontends, DiscoveredFrontend, DEFAULT_DVB_ROOT};
pub use error::{DeviceError, DiscoveryError};
