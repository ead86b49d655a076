// Library exports for the ABI fetcher
pub mod backoff;
pub mod config;
pub mod export;
pub mod persist;
pub mod rpc;

pub use backoff::{ExponentialBackoff, RetryPolicy};
pub use config::{ConfigError, ConfigFile, Network, Overrides, Settings};
pub use export::{AbiExporter, ExportKind, PackageReport};
pub use persist::PersistError;
pub use rpc::{RpcError, SuiRpcClient, GET_NORMALIZED_MODULES};
