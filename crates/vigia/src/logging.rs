//! Diagnostic output.
//!
//! Every component reports through `tracing`. Native hosts (tests, tools)
//! call [`init_tracing`] once; a browser host installs its own subscriber.

/// Environment variable holding the filter directives
pub const LOG_ENV: &str = "VIGIA_LOG";

/// Directive used when [`LOG_ENV`] is unset or invalid
pub const DEFAULT_DIRECTIVE: &str = "info";

/// Output format of the native subscriber
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    /// Human-readable lines
    #[default]
    Text,
    /// One JSON object per event
    Json,
}

/// Install the global fmt subscriber filtered by `VIGIA_LOG`
///
/// Returns `false` when a global subscriber is already installed.
#[cfg(not(target_arch = "wasm32"))]
pub fn init_tracing() -> bool {
    init_tracing_with(LogFormat::Text)
}

/// Install the global fmt subscriber in the given format
#[cfg(not(target_arch = "wasm32"))]
pub fn init_tracing_with(format: LogFormat) -> bool {
    use tracing_subscriber::EnvFilter;

    let filter =
        EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new(DEFAULT_DIRECTIVE));
    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false);

    let installed = match format {
        LogFormat::Text => builder.try_init().is_ok(),
        LogFormat::Json => builder.json().try_init().is_ok(),
    };
    if installed {
        tracing::debug!(?format, "tracing initialized");
    }
    installed
}

/// Run `body` under a scoped text subscriber at `info` and return what it
/// printed
#[cfg(all(test, not(target_arch = "wasm32")))]
pub(crate) fn capture_logs(body: impl FnOnce()) -> String {
    use std::io;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

    impl io::Write for SharedBuffer {
        fn write(&mut self, bytes: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(bytes);
            Ok(bytes.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    let buffer = SharedBuffer::default();
    let writer = buffer.clone();
    let subscriber = tracing_subscriber::fmt()
        .with_max_level(tracing::Level::INFO)
        .with_ansi(false)
        .with_target(false)
        .with_writer(move || writer.clone())
        .finish();
    tracing::subscriber::with_default(subscriber, body);
    let bytes = buffer.0.lock().unwrap().clone();
    String::from_utf8_lossy(&bytes).into_owned()
}
