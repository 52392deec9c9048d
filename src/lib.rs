pub mod api;
pub mod args;
pub mod commands;
mod config;
mod error;
mod fs;
pub mod loadable;
pub mod model;
pub mod period;
pub mod queue;
pub mod storage;
pub mod store;
pub mod sync;
mod utils;


pub use api::Mode;
pub use config::Config;
pub use error::Error;
pub use error::Result;
pub use loadable::Loadable;
pub use store::Store;
