//! Signal collection for the exporter.
//!
//! This module provides:
//! - [`Normalizer`]: converts raw frontend readings into a [`Reading`]
//! - [`Adapter`]: one frontend and its last reading, polled once per cycle
//! - [`CollectionScheduler`]: fans polls out per cycle and publishes the result
//! - [`ReadingStore`]: the published snapshot read by the web server

pub mod normalizer;
pub mod reading;
pub mod scheduler;
pub mod store;

#[cfg(test)]
pub(crate) mod testing;

pub use normalizer::{Normalizer, Strategy};
pub use reading::Reading;
pub use scheduler::{Adapter, CollectionScheduler, DEFAULT_INTERVAL};
pub use store::{ReadingStore, Snapshot};
