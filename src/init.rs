use crate::error::InitError;
use crate::layer::ElmahIoLayer;
use crate::record::Resource;
use crate::sink::LogExporter;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tokio::time::Duration;
use tracing::Level;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::Registry;

/// Configuration of the logging layer.
///
/// Controls the size of the internal buffer, the maximum batch handed to
/// the exporter, how often a partial batch is flushed, which events are
/// captured, and whether events are also printed through a `fmt` layer.
///
/// **Fields**
/// - `channel_buffer`: maximum number of queued [`LogRecord`]s before new
///   records are dropped.
/// - `batch_size`: number of records per `export` call.
/// - `flush_interval`: maximum time between exports even when the batch is
///   not full.
/// - `enable_stdout`: if `true`, a `tracing_subscriber::fmt::Layer` is added
///   next to [`ElmahIoLayer`].
/// - `min_level`: least severe level that is exported.
/// - `resource`: service attributes attached to every message.
///
/// [`LogRecord`]: crate::record::LogRecord
#[derive(Clone, Debug)]
pub struct LayerConfig {
    pub channel_buffer: usize,
    pub batch_size: usize,
    pub flush_interval: Duration,
    pub enable_stdout: bool,
    pub min_level: Level,
    pub resource: Resource,
}

impl Default for LayerConfig {
    fn default() -> Self {
        Self {
            channel_buffer: 1024,
            batch_size: 128,
            flush_interval: Duration::from_secs(1),
            enable_stdout: true,
            min_level: Level::INFO,
            resource: Resource::empty(),
        }
    }
}

/// Handle to an installed exporter pipeline.
pub struct LayerHandle {
    pub exporter: Arc<dyn LogExporter>,
    pub task: JoinHandle<()>,
}

impl LayerHandle {
    /// Shut the exporter down; events still queued in the layer are
    /// rejected from then on.
    pub fn shutdown(&self) {
        self.exporter.shutdown();
    }
}

/// Install the global `tracing` subscriber exporting through `exporter`.
///
/// **Parameters**
/// - `exporter`: [`LogExporter`] that receives batches of records.
/// - `config`: [`LayerConfig`] controlling buffering, batching and
///   filtering.
///
/// **Effects**
///
/// Installs a [`Registry`] combined with [`ElmahIoLayer`] (and optionally a
/// `fmt` layer) as the global default subscriber.
///
/// **Errors**
/// - [`InitError::NoRuntime`] when called outside a tokio runtime; nothing
///   is installed in that case.
/// - [`InitError::SetGlobalDefault`] when a global subscriber already exists.
pub fn init_tracing_with_config(exporter: Arc<dyn LogExporter>, config: LayerConfig) -> Result<LayerHandle, InitError> {
    Handle::try_current().map_err(|_| InitError::NoRuntime)?;
    let (layer, task) = ElmahIoLayer::new(Arc::clone(&exporter), &config);

    // Two branches because the subscriber type differs with and without the
    // `fmt` layer.
    if config.enable_stdout {
        let fmt_layer = tracing_subscriber::fmt::layer();
        let subscriber = Registry::default().with(layer).with(fmt_layer);
        tracing::subscriber::set_global_default(subscriber)?;
    } else {
        let subscriber = Registry::default().with(layer);
        tracing::subscriber::set_global_default(subscriber)?;
    }

    Ok(LayerHandle { exporter, task })
}

/// Install the global subscriber with [`LayerConfig::default`].
pub fn init_tracing(exporter: Arc<dyn LogExporter>) -> Result<LayerHandle, InitError> {
    init_tracing_with_config(exporter, LayerConfig::default())
}

/// Create an [`ElmahIoExporter`](crate::exporter::ElmahIoExporter) from
/// `options` and install it as the global subscriber.
#[cfg(feature = "http")]
pub fn init_elmahio(
    options: crate::options::ElmahIoExporterOptions,
    config: LayerConfig,
) -> Result<LayerHandle, InitError> {
    let exporter = Arc::new(crate::exporter::ElmahIoExporter::new(options));
    init_tracing_with_config(exporter, config)
}

/// Like [`init_elmahio`], reading options and resource from the environment.
///
/// See [`crate::env`] for the variables involved.
#[cfg(feature = "http")]
pub fn init_elmahio_from_env() -> Result<LayerHandle, InitError> {
    let options = crate::options::ElmahIoExporterOptions::from_env()?;
    let config = LayerConfig { resource: Resource::from_env(), ..LayerConfig::default() };
    init_elmahio(options, config)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::LogRecord;
    use crate::sink::ExportResult;

    struct Discard;

    impl LogExporter for Discard {
        fn export(&self, _batch: &[LogRecord]) -> ExportResult {
            ExportResult::Success
        }
    }

    #[test]
    fn init_outside_runtime_is_an_error() {
        let result = init_tracing_with_config(Arc::new(Discard), LayerConfig::default());
        assert!(matches!(result, Err(InitError::NoRuntime)));
    }
}
