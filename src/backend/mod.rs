//! Object-storage backend: descriptor configuration, the storage
//! capability consumed by the purge engine, and repository discovery.

pub mod config;
pub mod enumerate;
pub mod remote;
pub mod store;

pub use config::{BackendConfig, Provider};
pub use enumerate::list_candidates;
pub use remote::RemoteStore;
pub use store::ObjectStore;
