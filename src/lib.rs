pub mod cli;
pub mod config;
pub mod feed;
pub mod history;
pub mod ledger;
pub mod lookup;
pub mod messages;
pub mod playback;
pub mod search;

pub use config::{AppConfig, ConfigLoader, ConfigPaths};
