//! Frontend discovery under `/dev/dvb`.
//!
//! The DVB root holds one `adapterN` directory per card, each carrying
//! `frontendM` character devices next to demux/dvr nodes. Discovery runs once
//! at startup; every frontend found is opened read-only and handed back with
//! its [`TunerId`].

use std::collections::BTreeSet;
use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, error, info, warn};

use crate::device::{open_frontend, FrontendDevice, TunerId};
use crate::error::{DeviceError, DiscoveryError};

/// Default location of the DVB device tree.
pub const DEFAULT_DVB_ROOT: &str = "/dev/dvb";

const ADAPTER_PREFIX: &str = "adapter";
const FRONTEND_PREFIX: &str = "frontend";

/// A frontend that was found and opened.
pub struct DiscoveredFrontend<D> {
    pub id: TunerId,
    pub path: PathBuf,
    pub device: D,
}

/// Discover and open every frontend under `root` with the platform binding.
pub fn discover_frontends(
    root: &Path,
    excluded: &BTreeSet<u32>,
) -> Result<Vec<DiscoveredFrontend<Box<dyn FrontendDevice>>>, DiscoveryError> {
    discover(root, excluded, open_frontend)
}

/// Discover frontends under `root`, opening each one with `open`.
///
/// Adapters listed in `excluded` are dropped before anything is opened.
/// Unparsable names, unlistable adapters and frontends that fail to open are
/// logged and skipped. Only an unreadable root or an empty result is an error.
pub fn discover<D, F>(
    root: &Path,
    excluded: &BTreeSet<u32>,
    mut open: F,
) -> Result<Vec<DiscoveredFrontend<D>>, DiscoveryError>
where
    F: FnMut(&Path) -> Result<D, DeviceError>,
{
    let adapters = list_indexed(root, ADAPTER_PREFIX).map_err(|source| DiscoveryError::ReadRoot {
        path: root.to_path_buf(),
        source,
    })?;

    let mut found = Vec::new();
    for (adapter, adapter_path) in adapters {
        if excluded.contains(&adapter) {
            debug!("excluding {} adapter from adapter list", adapter_path.display());
            continue;
        }

        let frontends = match list_indexed(&adapter_path, FRONTEND_PREFIX) {
            Ok(frontends) => frontends,
            Err(e) => {
                error!("Failed to list frontends of adapter {}: {}", adapter_path.display(), e);
                continue;
            }
        };

        for (frontend, path) in frontends {
            debug!("adding frontend {}", path.display());
            match open(&path) {
                Ok(device) => found.push(DiscoveredFrontend {
                    id: TunerId::new(adapter, frontend),
                    path,
                    device,
                }),
                Err(e) => error!("{}", e),
            }
        }
    }

    if found.is_empty() {
        return Err(DiscoveryError::NoDevices(root.to_path_buf()));
    }

    found.sort_by_key(|f| f.id);
    info!("Discovered {} frontend(s) in {}", found.len(), root.display());
    Ok(found)
}

/// List `<prefix><N>` entries of `dir`, sorted by `N`.
fn list_indexed(dir: &Path, prefix: &str) -> std::io::Result<Vec<(u32, PathBuf)>> {
    let mut out = Vec::new();
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let name = entry.file_name();
        let name = name.to_string_lossy();
        if !name.starts_with(prefix) {
            continue;
        }
        match parse_index(&name, prefix) {
            Some(index) => out.push((index, entry.path())),
            None => warn!("skipping {}: cannot parse {} number", entry.path().display(), prefix),
        }
    }
    out.sort();
    Ok(out)
}

fn parse_index(name: &str, prefix: &str) -> Option<u32> {
    name.strip_prefix(prefix)?.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    fn make_tree(entries: &[&str]) -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        for entry in entries {
            let path = dir.path().join(entry);
            fs::create_dir_all(path.parent().unwrap()).unwrap();
            fs::write(&path, b"").unwrap();
        }
        dir
    }

    fn open_path(path: &Path) -> Result<PathBuf, DeviceError> {
        Ok(path.to_path_buf())
    }

    #[test]
    fn test_parse_index() {
        assert_eq!(parse_index("adapter12", ADAPTER_PREFIX), Some(12));
        assert_eq!(parse_index("frontend0", FRONTEND_PREFIX), Some(0));
        assert_eq!(parse_index("adapterX", ADAPTER_PREFIX), None);
        assert_eq!(parse_index("adapter", ADAPTER_PREFIX), None);
    }

    #[test]
    fn test_discover_sorted_and_filtered() {
        let tree = make_tree(&[
            "adapter1/frontend0",
            "adapter0/frontend1",
            "adapter0/frontend0",
            "adapter0/demux0",
            "adapter0/dvr0",
            "adapterX/frontend0",
            "adapter0/frontendY",
        ]);

        let found = discover(tree.path(), &BTreeSet::new(), open_path).unwrap();
        let ids: Vec<TunerId> = found.iter().map(|f| f.id).collect();
        assert_eq!(
            ids,
            vec![TunerId::new(0, 0), TunerId::new(0, 1), TunerId::new(1, 0)]
        );
        assert_eq!(found[0].device, tree.path().join("adapter0/frontend0"));
    }

    #[test]
    fn test_discover_excludes_adapters() {
        let tree = make_tree(&["adapter0/frontend0", "adapter7/frontend0", "adapter8/frontend0"]);
        let excluded: BTreeSet<u32> = [7, 8].into_iter().collect();

        let mut opened = Vec::new();
        let found = discover(tree.path(), &excluded, |p| {
            opened.push(p.to_path_buf());
            open_path(p)
        })
        .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, TunerId::new(0, 0));
        assert_eq!(opened, vec![tree.path().join("adapter0/frontend0")]);
    }

    #[test]
    fn test_open_failure_is_skipped() {
        let tree = make_tree(&["adapter0/frontend0", "adapter1/frontend0"]);
        let broken = tree.path().join("adapter0/frontend0");

        let found = discover(tree.path(), &BTreeSet::new(), |p| {
            if p == broken {
                Err(DeviceError::Open {
                    path: p.to_path_buf(),
                    source: io::Error::from(io::ErrorKind::PermissionDenied),
                })
            } else {
                open_path(p)
            }
        })
        .unwrap();

        assert_eq!(found.len(), 1);
        assert_eq!(found[0].id, TunerId::new(1, 0));
    }

    #[test]
    fn test_no_devices_is_fatal() {
        let tree = make_tree(&["adapter0/demux0"]);
        let err = discover(tree.path(), &BTreeSet::new(), open_path).err().unwrap();
        assert!(matches!(err, DiscoveryError::NoDevices(_)));

        let excluded: BTreeSet<u32> = [0].into_iter().collect();
        let tree = make_tree(&["adapter0/frontend0"]);
        let err = discover(tree.path(), &excluded, open_path).err().unwrap();
        assert!(matches!(err, DiscoveryError::NoDevices(_)));
    }

    #[test]
    fn test_missing_root_is_fatal() {
        let tree = tempfile::tempdir().unwrap();
        let err = discover(&tree.path().join("dvb"), &BTreeSet::new(), open_path)
            .err()
            .unwrap();
        assert!(matches!(err, DiscoveryError::ReadRoot { .. }));
    }
}
