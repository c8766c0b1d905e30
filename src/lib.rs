pub mod client;
pub mod config;
pub mod error;

pub use client::{
    Category, Record, SearchEngine, SearchSession, SourceOutcome, SourceProvider, SourceRegistry,
    TorrentId,
};
pub use config::Config;
pub use error::{Error, Result};
