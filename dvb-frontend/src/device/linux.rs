//! Linux DVB frontend binding over `FE_*` ioctls.

use std::fs::{File, OpenOptions};
use std::os::fd::{AsRawFd, IntoRawFd};
use std::path::{Path, PathBuf};

use log::trace;

use crate::device::{DeliverySystem, FrontendDevice, FrontendStatus, StatSample, StatScale, Statistics};
use crate::error::DeviceError;

const DTV_DELIVERY_SYSTEM: u32 = 17;
const DTV_STAT_SIGNAL_STRENGTH: u32 = 62;
const DTV_STAT_CNR: u32 = 63;
const DTV_STAT_PRE_ERROR_BIT_COUNT: u32 = 64;
const DTV_STAT_PRE_TOTAL_BIT_COUNT: u32 = 65;
const DTV_STAT_POST_ERROR_BIT_COUNT: u32 = 66;
const DTV_STAT_POST_TOTAL_BIT_COUNT: u32 = 67;
const DTV_STAT_ERROR_BLOCK_COUNT: u32 = 68;
const DTV_STAT_TOTAL_BLOCK_COUNT: u32 = 69;

const MAX_DTV_STATS: usize = 4;

// Layouts of <linux/dvb/frontend.h>; the kernel declares these packed.
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct DtvStats {
    scale: u8,
    value: u64,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
struct DtvFeStats {
    len: u8,
    stat: [DtvStats; MAX_DTV_STATS],
}

#[allow(dead_code)]
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct DtvBuffer {
    data: [u8; 32],
    len: u32,
    reserved1: [u32; 3],
    reserved2: *mut std::ffi::c_void,
}

#[repr(C, packed)]
#[derive(Clone, Copy)]
union DtvPropertyData {
    data: u32,
    st: DtvFeStats,
    buffer: DtvBuffer,
}

#[allow(dead_code)]
#[repr(C, packed)]
#[derive(Clone, Copy)]
struct DtvProperty {
    cmd: u32,
    reserved: [u32; 3],
    u: DtvPropertyData,
    result: i32,
}

impl DtvProperty {
    fn request(cmd: u32) -> Self {
        Self {
            cmd,
            reserved: [0; 3],
            u: DtvPropertyData {
                buffer: DtvBuffer {
                    data: [0; 32],
                    len: 0,
                    reserved1: [0; 3],
                    reserved2: std::ptr::null_mut(),
                },
            },
            result: 0,
        }
    }

    fn samples(&self) -> Vec<StatSample> {
        // SAFETY: the kernel fills `st` for every DTV_STAT_* command.
        let st = unsafe { self.u.st };
        let stats = st.stat;
        let len = (st.len as usize).min(MAX_DTV_STATS);
        stats[..len]
            .iter()
            .map(|s| StatSample::new(StatScale::from_raw(s.scale), s.value))
            .collect()
    }
}

#[repr(C)]
pub struct DtvProperties {
    num: u32,
    props: *mut DtvProperty,
}

mod ioctl {
    use super::DtvProperties;

    nix::ioctl_read!(fe_read_status, b'o', 69, u32);
    nix::ioctl_read!(fe_read_ber, b'o', 70, u32);
    nix::ioctl_read!(fe_read_signal_strength, b'o', 71, u16);
    nix::ioctl_read!(fe_read_snr, b'o', 72, u16);
    nix::ioctl_read!(fe_get_property, b'o', 83, DtvProperties);
}

/// An open, read-only `/dev/dvb/adapterN/frontendM`.
pub struct Frontend {
    file: File,
    path: PathBuf,
}

impl Frontend {
    pub fn open_ro(path: &Path) -> Result<Self, DeviceError> {
        let file = OpenOptions::new()
            .read(true)
            .open(path)
            .map_err(|source| DeviceError::Open {
                path: path.to_path_buf(),
                source,
            })?;
        Ok(Self {
            file,
            path: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn get_properties(&self, query: &'static str, cmds: &[u32]) -> Result<Vec<DtvProperty>, DeviceError> {
        let mut props: Vec<DtvProperty> = cmds.iter().map(|&cmd| DtvProperty::request(cmd)).collect();
        let mut request = DtvProperties {
            num: props.len() as u32,
            props: props.as_mut_ptr(),
        };
        // SAFETY: `request` points at `props`, which outlives the call.
        unsafe { ioctl::fe_get_property(self.file.as_raw_fd(), &mut request) }
            .map_err(|e| DeviceError::query(query, e))?;
        Ok(props)
    }
}

impl FrontendDevice for Frontend {
    fn read_status(&self) -> Result<FrontendStatus, DeviceError> {
        let mut status: u32 = 0;
        // SAFETY: FE_READ_STATUS writes one fe_status_t.
        unsafe { ioctl::fe_read_status(self.file.as_raw_fd(), &mut status) }
            .map_err(|e| DeviceError::query("FE_READ_STATUS", e))?;
        Ok(FrontendStatus::from_bits(status))
    }

    fn delivery_system(&self) -> Result<DeliverySystem, DeviceError> {
        let props = self.get_properties("DTV_DELIVERY_SYSTEM", &[DTV_DELIVERY_SYSTEM])?;
        // SAFETY: DTV_DELIVERY_SYSTEM answers in `data`.
        let raw = unsafe { props[0].u.data };
        Ok(DeliverySystem::from_raw(raw))
    }

    fn signal_strength(&self) -> Result<i16, DeviceError> {
        let mut raw: u16 = 0;
        // SAFETY: FE_READ_SIGNAL_STRENGTH writes one __u16.
        unsafe { ioctl::fe_read_signal_strength(self.file.as_raw_fd(), &mut raw) }
            .map_err(|e| DeviceError::query("FE_READ_SIGNAL_STRENGTH", e))?;
        Ok(raw as i16)
    }

    fn snr(&self) -> Result<u16, DeviceError> {
        let mut raw: u16 = 0;
        // SAFETY: FE_READ_SNR writes one __u16.
        unsafe { ioctl::fe_read_snr(self.file.as_raw_fd(), &mut raw) }
            .map_err(|e| DeviceError::query("FE_READ_SNR", e))?;
        Ok(raw)
    }

    fn ber(&self) -> Result<u32, DeviceError> {
        let mut raw: u32 = 0;
        // SAFETY: FE_READ_BER writes one __u32.
        unsafe { ioctl::fe_read_ber(self.file.as_raw_fd(), &mut raw) }
            .map_err(|e| DeviceError::query("FE_READ_BER", e))?;
        Ok(raw)
    }

    fn statistics(&self) -> Result<Statistics, DeviceError> {
        let props = self.get_properties(
            "DTV_STAT",
            &[
                DTV_STAT_SIGNAL_STRENGTH,
                DTV_STAT_CNR,
                DTV_STAT_PRE_ERROR_BIT_COUNT,
                DTV_STAT_PRE_TOTAL_BIT_COUNT,
                DTV_STAT_POST_ERROR_BIT_COUNT,
                DTV_STAT_POST_TOTAL_BIT_COUNT,
                DTV_STAT_ERROR_BLOCK_COUNT,
                DTV_STAT_TOTAL_BLOCK_COUNT,
            ],
        )?;
        let mut stats = Statistics::default();
        for prop in &props {
            let samples = prop.samples();
            match { prop.cmd } {
                DTV_STAT_SIGNAL_STRENGTH => stats.signal = samples,
                DTV_STAT_CNR => stats.cnr = samples,
                DTV_STAT_PRE_ERROR_BIT_COUNT => stats.pre_error_bit = samples,
                DTV_STAT_PRE_TOTAL_BIT_COUNT => stats.pre_total_bit = samples,
                DTV_STAT_POST_ERROR_BIT_COUNT => stats.post_error_bit = samples,
                DTV_STAT_POST_TOTAL_BIT_COUNT => stats.post_total_bit = samples,
                DTV_STAT_ERROR_BLOCK_COUNT => stats.error_block = samples,
                DTV_STAT_TOTAL_BLOCK_COUNT => stats.total_block = samples,
                _ => {}
            }
        }
        trace!("{}: {:?}", self.path.display(), stats);
        Ok(stats)
    }

    fn close(self: Box<Self>) -> Result<(), DeviceError> {
        let fd = self.file.into_raw_fd();
        nix::unistd::close(fd).map_err(|e| DeviceError::Close(e.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_kernel_struct_sizes() {
        assert_eq!(std::mem::size_of::<DtvStats>(), 9);
        assert_eq!(std::mem::size_of::<DtvFeStats>(), 37);
        #[cfg(target_pointer_width = "64")]
        assert_eq!(std::mem::size_of::<DtvProperty>(), 76);
    }

    #[test]
    fn test_samples_respect_len() {
        let mut prop = DtvProperty::request(DTV_STAT_CNR);
        let sample = DtvStats { scale: 2, value: 0x8000 };
        prop.u = DtvPropertyData {
            st: DtvFeStats {
                len: 1,
                stat: [sample, DtvStats { scale: 0, value: 0 }, DtvStats { scale: 0, value: 0 }, DtvStats { scale: 0, value: 0 }],
            },
        };
        let samples = prop.samples();
        assert_eq!(samples, vec![StatSample::relative(0x8000)]);
    }

    #[test]
    fn test_open_missing_frontend() {
        let err = Frontend::open_ro(Path::new("/nonexistent/dvb/adapter0/frontend0"))
            .err()
            .expect("open must fail");
        assert!(matches!(err, DeviceError::Open { .. }));
    }
}
