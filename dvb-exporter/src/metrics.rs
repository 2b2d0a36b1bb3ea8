//! Prometheus metrics exporter.
//!
//! Renders the latest [`Snapshot`] in the Prometheus text format.

use std::fmt::Write;

use crate::collector::{Reading, Snapshot};

/// Content type of the text exposition format.
pub const CONTENT_TYPE: &str = "text/plain; version=0.0.4";

const DEFAULT_NAMESPACE: &str = "dvb";

/// Per-frontend gauge families: name, help, value.
const FAMILIES: [(&str, &str, fn(&Reading) -> f64); 4] = [
    ("signal", "Signal strength in percent", signal_value),
    ("snr", "Signal to noise ratio in percent", snr_value),
    ("ber", "Bit error rate counter", ber_value),
    ("lock", "Carrier lock (1 = locked)", lock_value),
];

fn signal_value(reading: &Reading) -> f64 {
    reading.signal_percent as f64
}

fn snr_value(reading: &Reading) -> f64 {
    reading.snr_percent as f64
}

fn ber_value(reading: &Reading) -> f64 {
    reading.ber_count as f64
}

fn lock_value(reading: &Reading) -> f64 {
    if reading.lock_acquired {
        1.0
    } else {
        0.0
    }
}

/// Prometheus metrics exporter.
pub struct PrometheusExporter {
    namespace: String,
    version: String,
}

impl PrometheusExporter {
    pub fn new() -> Self {
        Self::with_namespace(DEFAULT_NAMESPACE)
    }

    pub fn with_namespace(namespace: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            version: env!("CARGO_PKG_VERSION").to_string(),
        }
    }

    /// Export a snapshot in Prometheus text format.
    ///
    /// Frontends missing from the snapshot produce no samples.
    pub fn export(&self, snapshot: &Snapshot) -> String {
        let mut output = String::new();

        self.write_header(&mut output, "up", "DVB exporter version");
        self.write_sample(&mut output, "up", &[("version", &self.version)], 1.0);

        if snapshot.readings.is_empty() {
            return output;
        }

        for (name, help, value) in FAMILIES {
            self.write_header(&mut output, name, help);
            for (id, reading) in &snapshot.readings {
                let adapter = id.adapter.to_string();
                let frontend = id.frontend.to_string();
                self.write_sample(
                    &mut output,
                    name,
                    &[("adapter", &adapter), ("frontend", &frontend)],
                    value(reading),
                );
            }
        }

        output
    }

    fn write_header(&self, output: &mut String, name: &str, help: &str) {
        let _ = writeln!(output, "# HELP {}_{} {}", self.namespace, name, help);
        let _ = writeln!(output, "# TYPE {}_{} gauge", self.namespace, name);
    }

    fn write_sample(&self, output: &mut String, name: &str, labels: &[(&str, &str)], value: f64) {
        let labels_str = labels
            .iter()
            .map(|(k, v)| format!("{}=\"{}\"", k, escape_label(v)))
            .collect::<Vec<_>>()
            .join(",");
        let _ = writeln!(output, "{}_{}{{{}}} {}", self.namespace, name, labels_str, value);
    }
}

impl Default for PrometheusExporter {
    fn default() -> Self {
        Self::new()
    }
}

fn escape_label(value: &str) -> String {
    value
        .replace('\\', "\\\\")
        .replace('"', "\\\"")
        .replace('\n', "\\n")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    use dvb_frontend::TunerId;

    fn snapshot() -> Snapshot {
        let mut readings = BTreeMap::new();
        readings.insert(
            TunerId::new(0, 0),
            Reading {
                lock_acquired: true,
                signal_percent: 71,
                snr_percent: 42,
                ber_count: 3,
                delivery_mode: "DVB-S2".to_string(),
            },
        );
        readings.insert(TunerId::new(1, 2), Reading::default());
        Snapshot {
            cycle: 1,
            collected_at: None,
            readings,
        }
    }

    #[test]
    fn test_export_empty_snapshot() {
        let output = PrometheusExporter::new().export(&Snapshot::default());
        assert!(output.contains("# TYPE dvb_up gauge"));
        assert!(output.contains(&format!("dvb_up{{version=\"{}\"}} 1", env!("CARGO_PKG_VERSION"))));
        assert!(!output.contains("dvb_signal"));
    }

    #[test]
    fn test_export_with_readings() {
        let output = PrometheusExporter::new().export(&snapshot());
        assert!(output.contains("dvb_signal{adapter=\"0\",frontend=\"0\"} 71"));
        assert!(output.contains("dvb_snr{adapter=\"0\",frontend=\"0\"} 42"));
        assert!(output.contains("dvb_ber{adapter=\"0\",frontend=\"0\"} 3"));
        assert!(output.contains("dvb_lock{adapter=\"0\",frontend=\"0\"} 1"));
        assert!(output.contains("dvb_lock{adapter=\"1\",frontend=\"2\"} 0"));
        assert!(output.contains("dvb_signal{adapter=\"1\",frontend=\"2\"} 0"));
    }

    #[test]
    fn test_help_and_type_written_once_per_family() {
        let output = PrometheusExporter::new().export(&snapshot());
        for family in ["up", "signal", "snr", "ber", "lock"] {
            let help = format!("# HELP dvb_{} ", family);
            let kind = format!("# TYPE dvb_{} gauge", family);
            assert_eq!(output.matches(&help).count(), 1, "{}", family);
            assert_eq!(output.matches(&kind).count(), 1, "{}", family);
        }
    }

    #[test]
    fn test_custom_namespace() {
        let output = PrometheusExporter::with_namespace("tuner").export(&snapshot());
        assert!(output.contains("tuner_signal{adapter=\"0\",frontend=\"0\"} 71"));
        assert!(!output.contains("dvb_"));
    }

    #[test]
    fn test_escape_label() {
        assert_eq!(escape_label("a\"b\\c\nd"), "a\\\"b\\\\c\\nd");
    }
}
