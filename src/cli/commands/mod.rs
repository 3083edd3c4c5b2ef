//! CLI command implementations

pub mod activate;
pub mod config;
pub mod fetch;
pub mod import;
pub mod install;
pub mod list;
pub mod manifest;
pub mod message;
pub mod report;
pub mod verify;

pub use activate::execute as activate;
pub use config::execute as config;
pub use fetch::execute as fetch;
pub use import::execute as import;
pub use install::execute as install;
pub use list::execute as list;
pub use manifest::execute as manifest;
pub use message::execute as message;
pub use report::execute as report;
pub use verify::execute as verify;
