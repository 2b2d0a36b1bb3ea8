//! The frontend capability and the values it reports.

use std::fmt;
use std::path::Path;

use serde::Serialize;

use crate::error::DeviceError;

#[cfg(target_os = "linux")]
pub use self::linux::Frontend;
#[cfg(not(target_os = "linux"))]
pub use self::unsupported::Frontend;

#[cfg(target_os = "linux")]
mod linux;
#[cfg(not(target_os = "linux"))]
mod unsupported;

/// Full scale of the 16-bit signal and SNR readings.
pub const RAW_FULL_SCALE: u32 = 65535;

/// Stable identity of a frontend: `/dev/dvb/adapter{adapter}/frontend{frontend}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
pub struct TunerId {
    pub adapter: u32,
    pub frontend: u32,
}

impl TunerId {
    pub fn new(adapter: u32, frontend: u32) -> Self {
        Self { adapter, frontend }
    }
}

impl fmt::Display for TunerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "adapter{}/frontend{}", self.adapter, self.frontend)
    }
}

/// Status bits returned by `FE_READ_STATUS`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FrontendStatus(u32);

impl FrontendStatus {
    pub const HAS_SIGNAL: u32 = 0x01;
    pub const HAS_CARRIER: u32 = 0x02;
    pub const HAS_VITERBI: u32 = 0x04;
    pub const HAS_SYNC: u32 = 0x08;
    pub const HAS_LOCK: u32 = 0x10;
    pub const TIMEDOUT: u32 = 0x20;
    pub const REINIT: u32 = 0x40;

    const NAMES: [(u32, &'static str); 7] = [
        (Self::HAS_SIGNAL, "signal"),
        (Self::HAS_CARRIER, "carrier"),
        (Self::HAS_VITERBI, "viterbi"),
        (Self::HAS_SYNC, "sync"),
        (Self::HAS_LOCK, "lock"),
        (Self::TIMEDOUT, "timedout"),
        (Self::REINIT, "reinit"),
    ];

    pub fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub fn bits(self) -> u32 {
        self.0
    }

    pub fn contains(self, flag: u32) -> bool {
        self.0 & flag == flag
    }
}

/// Renders the set bits as `+signal+carrier+viterbi+sync+lock`.
impl fmt::Display for FrontendStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0 == 0 {
            return f.write_str("none");
        }
        for (flag, name) in Self::NAMES {
            if self.contains(flag) {
                write!(f, "+{}", name)?;
            }
        }
        let unknown = self.0 & !Self::NAMES.iter().fold(0u32, |acc, (flag, _)| acc | flag);
        if unknown != 0 {
            write!(f, "+0x{:x}", unknown)?;
        }
        Ok(())
    }
}

/// Delivery system reported by the `DTV_DELIVERY_SYSTEM` property.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliverySystem {
    Undefined,
    DvbcAnnexA,
    DvbcAnnexB,
    Dvbt,
    Dss,
    Dvbs,
    Dvbs2,
    Dvbh,
    Isdbt,
    Isdbs,
    Isdbc,
    Atsc,
    AtscMh,
    Dtmb,
    Cmmb,
    Dab,
    Dvbt2,
    Turbo,
    DvbcAnnexC,
    Dvbc2,
    Unknown(u32),
}

impl DeliverySystem {
    pub fn from_raw(raw: u32) -> Self {
        match raw {
            0 => Self::Undefined,
            1 => Self::DvbcAnnexA,
            2 => Self::DvbcAnnexB,
            3 => Self::Dvbt,
            4 => Self::Dss,
            5 => Self::Dvbs,
            6 => Self::Dvbs2,
            7 => Self::Dvbh,
            8 => Self::Isdbt,
            9 => Self::Isdbs,
            10 => Self::Isdbc,
            11 => Self::Atsc,
            12 => Self::AtscMh,
            13 => Self::Dtmb,
            14 => Self::Cmmb,
            15 => Self::Dab,
            16 => Self::Dvbt2,
            17 => Self::Turbo,
            18 => Self::DvbcAnnexC,
            19 => Self::Dvbc2,
            other => Self::Unknown(other),
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Undefined => "undefined",
            Self::DvbcAnnexA => "DVB-C/A",
            Self::DvbcAnnexB => "DVB-C/B",
            Self::Dvbt => "DVB-T",
            Self::Dss => "DSS",
            Self::Dvbs => "DVB-S",
            Self::Dvbs2 => "DVB-S2",
            Self::Dvbh => "DVB-H",
            Self::Isdbt => "ISDB-T",
            Self::Isdbs => "ISDB-S",
            Self::Isdbc => "ISDB-C",
            Self::Atsc => "ATSC",
            Self::AtscMh => "ATSC-M/H",
            Self::Dtmb => "DTMB",
            Self::Cmmb => "CMMB",
            Self::Dab => "DAB",
            Self::Dvbt2 => "DVB-T2",
            Self::Turbo => "TURBO",
            Self::DvbcAnnexC => "DVB-C/C",
            Self::Dvbc2 => "DVB-C2",
            Self::Unknown(_) => "unknown",
        }
    }
}

impl fmt::Display for DeliverySystem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// `fe_stat.scale`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StatScale {
    NotAvailable,
    /// 0.001 dB steps, signed.
    Decibel,
    /// 0..=65535 maps to 0..=100%.
    Relative,
    Counter,
}

impl StatScale {
    pub fn from_raw(raw: u8) -> Self {
        match raw {
            1 => Self::Decibel,
            2 => Self::Relative,
            3 => Self::Counter,
            _ => Self::NotAvailable,
        }
    }
}

/// One layer of a V5 statistic.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StatSample {
    pub scale: StatScale,
    /// Raw union bits; signed for [`StatScale::Decibel`], unsigned otherwise.
    pub value: u64,
}

impl StatSample {
    pub fn new(scale: StatScale, value: u64) -> Self {
        Self { scale, value }
    }

    pub fn relative(value: u16) -> Self {
        Self::new(StatScale::Relative, value as u64)
    }

    pub fn decibel(millis: i64) -> Self {
        Self::new(StatScale::Decibel, millis as u64)
    }

    pub fn counter(value: u64) -> Self {
        Self::new(StatScale::Counter, value)
    }

    /// Value as a coarse human-scale number: percent for relative samples,
    /// whole dB for decibel samples, 0 when the scale does not apply.
    pub fn relative_value(&self) -> i64 {
        match self.scale {
            StatScale::Relative => (self.value & 0xffff) as i64 * 100 / RAW_FULL_SCALE as i64,
            StatScale::Decibel => self.value as i64 / 1000,
            StatScale::Counter | StatScale::NotAvailable => 0,
        }
    }

    /// Counter value, or 0 when the sample is not a counter.
    pub fn counter_value(&self) -> u64 {
        match self.scale {
            StatScale::Counter => self.value,
            _ => 0,
        }
    }
}

/// The V5 statistics bundle (`DTV_STAT_*` properties).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Statistics {
    pub signal: Vec<StatSample>,
    pub cnr: Vec<StatSample>,
    pub pre_error_bit: Vec<StatSample>,
    pub pre_total_bit: Vec<StatSample>,
    pub post_error_bit: Vec<StatSample>,
    pub post_total_bit: Vec<StatSample>,
    pub error_block: Vec<StatSample>,
    pub total_block: Vec<StatSample>,
}

/// Read-only queries against one open frontend.
///
/// Every query is a blocking driver call. Implementations are owned by a
/// single poll task at a time, hence `Send` but not `Sync`.
pub trait FrontendDevice: Send {
    /// `FE_READ_STATUS`
    fn read_status(&self) -> Result<FrontendStatus, DeviceError>;

    /// `DTV_DELIVERY_SYSTEM`
    fn delivery_system(&self) -> Result<DeliverySystem, DeviceError>;

    /// `FE_READ_SIGNAL_STRENGTH`, reinterpreted as signed.
    fn signal_strength(&self) -> Result<i16, DeviceError>;

    /// `FE_READ_SNR`
    fn snr(&self) -> Result<u16, DeviceError>;

    /// `FE_READ_BER`
    fn ber(&self) -> Result<u32, DeviceError>;

    /// `DTV_STAT_*` via `FE_GET_PROPERTY`.
    fn statistics(&self) -> Result<Statistics, DeviceError>;

    /// Release the device. Called once, at shutdown.
    fn close(self: Box<Self>) -> Result<(), DeviceError>;
}

/// Open a frontend read-only and box it behind the capability trait.
pub fn open_frontend(path: &Path) -> Result<Box<dyn FrontendDevice>, DeviceError> {
    Frontend::open_ro(path).map(|fe| Box::new(fe) as Box<dyn FrontendDevice>)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_renders_tokens() {
        let status = FrontendStatus::from_bits(
            FrontendStatus::HAS_SIGNAL | FrontendStatus::HAS_CARRIER | FrontendStatus::HAS_LOCK,
        );
        assert_eq!(status.to_string(), "+signal+carrier+lock");
        assert!(status.contains(FrontendStatus::HAS_LOCK));
        assert_eq!(FrontendStatus::default().to_string(), "none");
        assert_eq!(FrontendStatus::from_bits(0x81).to_string(), "+signal+0x80");
    }

    #[test]
    fn test_delivery_system_names() {
        assert_eq!(DeliverySystem::from_raw(16).name(), "DVB-T2");
        assert_eq!(DeliverySystem::from_raw(5).to_string(), "DVB-S");
        assert_eq!(DeliverySystem::from_raw(99), DeliverySystem::Unknown(99));
        assert_eq!(DeliverySystem::from_raw(99).name(), "unknown");
    }

    #[test]
    fn test_stat_sample_scales() {
        assert_eq!(StatSample::relative(0xffff).relative_value(), 100);
        assert_eq!(StatSample::relative(0x8000).relative_value(), 50);
        assert_eq!(StatSample::decibel(12_345).relative_value(), 12);
        assert_eq!(StatSample::decibel(-3_500).relative_value(), -3);
        assert_eq!(StatSample::counter(42).relative_value(), 0);
        assert_eq!(StatSample::counter(42).counter_value(), 42);
        assert_eq!(StatSample::relative(10).counter_value(), 0);
        assert_eq!(StatScale::from_raw(0), StatScale::NotAvailable);
    }

    #[test]
    fn test_tuner_id_order_and_display() {
        let mut ids = vec![TunerId::new(1, 0), TunerId::new(0, 1), TunerId::new(0, 0)];
        ids.sort();
        assert_eq!(ids, vec![TunerId::new(0, 0), TunerId::new(0, 1), TunerId::new(1, 0)]);
        assert_eq!(TunerId::new(2, 1).to_string(), "adapter2/frontend1");
    }
}
