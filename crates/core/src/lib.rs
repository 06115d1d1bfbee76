pub mod config;
pub mod error;
pub mod frame;
pub mod table;
pub mod types;

pub use config::SyncConfig;
pub use error::*;
pub use frame::Frame;
pub use table::TableName;
pub use types::*;
