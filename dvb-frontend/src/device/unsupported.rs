use std::path::Path;

use crate::device::{DeliverySystem, FrontendDevice, FrontendStatus, Statistics};
use crate::error::DeviceError;

pub struct Frontend {
    _private: (),
}

impl Frontend {
    pub fn open_ro(_path: &Path) -> Result<Self, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    pub fn path(&self) -> &Path {
        Path::new("")
    }
}

impl FrontendDevice for Frontend {
    fn read_status(&self) -> Result<FrontendStatus, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    fn delivery_system(&self) -> Result<DeliverySystem, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    fn signal_strength(&self) -> Result<i16, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    fn snr(&self) -> Result<u16, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    fn ber(&self) -> Result<u32, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    fn statistics(&self) -> Result<Statistics, DeviceError> {
        Err(DeviceError::Unsupported)
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        Ok(())
    }
}
