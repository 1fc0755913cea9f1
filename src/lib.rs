//! Structured field encoding and a `tracing` backend that ships every entry
//! as a flat string-keyed record to a remote log store.

pub mod error;
pub mod level;
pub mod entry;
pub mod config;
pub mod env;

pub mod marshal;
pub mod field;
pub mod json;
pub mod encoder;

pub mod core;
pub mod adapter;
pub mod record;
pub mod producer;
pub mod sink;
pub mod noop_sink;

#[cfg(feature = "http")]
pub mod http;

pub mod layer;
pub mod init;

pub use adapter::LogStoreCore;
pub use config::{EncoderConfig, ProducerConfig};
pub use encoder::{FieldEncoder, FlatMap};
pub use error::{Error, ProducerError, Result};
pub use field::Field;
pub use level::Level;
