//! Ship `tracing` events to [elmah.io](https://elmah.io).
//!
//! [`ElmahIoExporter`] turns batches of [`LogRecord`]s into elmah.io
//! messages and submits them through a [`MessagesClient`]. The
//! [`ElmahIoLayer`] plugs it into a `tracing_subscriber` registry.
//!
//! ```no_run
//! use elmahio_log_exporter::init::{init_elmahio, LayerConfig};
//! use elmahio_log_exporter::options::ElmahIoExporterOptions;
//!
//! # #[tokio::main] async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let options = ElmahIoExporterOptions::new("API_KEY", "9d6bc7bd-ef0c-4ba7-8ab8-3a9ab5e1dcf2".parse()?)
//!     .application("shop");
//! let _handle = init_elmahio(options, LayerConfig::default())?;
//!
//! tracing::error!(statuscode = 500, url = "/cart", "checkout failed");
//! # Ok(()) }
//! ```

pub mod attributes;
pub mod client;
pub mod env;
pub mod error;
pub mod exporter;
pub mod message;
pub mod options;
pub mod record;
pub mod sink;
pub mod layer;

#[cfg(feature = "http")]
pub mod http;

pub mod init;

pub use client::{ClientFactory, MessagesClient};
pub use exporter::ElmahIoExporter;
pub use layer::ElmahIoLayer;
pub use message::{CreateMessage, Item, Severity};
pub use options::ElmahIoExporterOptions;
pub use record::LogRecord;
pub use sink::{ExportResult, LogExporter};
