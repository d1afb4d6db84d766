use std::fmt;

use log::{Level, Log, Metadata, Record};

const TARGET: &str = "orchestrator::training";

#[derive(Clone, Copy)]
enum Sink {
    /// Resolved on every call, so a logger installed later is still honored.
    Global,
    Custom(&'static dyn Log),
}

struct Silent;

impl Log for Silent {
    fn enabled(&self, _: &Metadata) -> bool {
        false
    }

    fn log(&self, _: &Record) {}

    fn flush(&self) {}
}

static SILENT: Silent = Silent;

/// The logger epoch level reports are written to, handed explicitly to training.
#[derive(Clone, Copy)]
pub struct TrainLogger {
    sink: Sink,
}

impl TrainLogger {
    /// Creates a new `TrainLogger` writing to `sink`.
    pub fn new(sink: &'static dyn Log) -> Self {
        Self {
            sink: Sink::Custom(sink),
        }
    }

    /// A logger forwarding to whatever logger the process installs.
    pub fn global() -> Self {
        Self { sink: Sink::Global }
    }

    /// A logger that drops everything.
    pub fn silent() -> Self {
        Self::new(&SILENT)
    }

    fn sink(&self) -> &'static dyn Log {
        match self.sink {
            Sink::Global => log::logger(),
            Sink::Custom(sink) => sink,
        }
    }

    /// Writes one record at `level`.
    pub fn log(&self, level: Level, args: fmt::Arguments<'_>) {
        let sink = self.sink();
        let metadata = Metadata::builder().level(level).target(TARGET).build();

        if sink.enabled(&metadata) {
            sink.log(
                &Record::builder()
                    .metadata(metadata)
                    .args(args)
                    .module_path_static(Some(module_path!()))
                    .build(),
            );
        }
    }

    pub fn info(&self, args: fmt::Arguments<'_>) {
        self.log(Level::Info, args);
    }
}

impl Default for TrainLogger {
    fn default() -> Self {
        Self::global()
    }
}

impl fmt::Debug for TrainLogger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let sink = match self.sink {
            Sink::Global => "global",
            Sink::Custom(_) => "custom",
        };

        f.debug_struct("TrainLogger").field("sink", &sink).finish()
    }
}

#[cfg(test)]
pub(crate) mod capture {
    use std::sync::Mutex;

    use log::{Log, Metadata, Record};

    /// Collects every message logged to it, for assertions.
    pub struct Capture {
        lines: Mutex<Vec<String>>,
    }

    impl Capture {
        pub const fn new() -> Self {
            Self {
                lines: Mutex::new(Vec::new()),
            }
        }

        pub fn lines(&self) -> Vec<String> {
            self.lines.lock().map(|l| l.clone()).unwrap_or_default()
        }
    }

    impl Log for Capture {
        fn enabled(&self, _: &Metadata) -> bool {
            true
        }

        fn log(&self, record: &Record) {
            if let Ok(mut lines) = self.lines.lock() {
                lines.push(record.args().to_string());
            }
        }

        fn flush(&self) {}
    }
}

#[cfg(test)]
mod tests {
    use super::{capture::Capture, *};

    static CAPTURE: Capture = Capture::new();

    #[test]
    fn custom_sink_receives_records() {
        let logger = TrainLogger::new(&CAPTURE);
        logger.info(format_args!("Epoch[{}] Train-accuracy={}", 3, 0.5));

        assert!(
            CAPTURE
                .lines()
                .contains(&"Epoch[3] Train-accuracy=0.5".to_string())
        );
    }

    #[test]
    fn silent_sink_is_disabled() {
        let metadata = Metadata::builder().level(Level::Error).build();
        assert!(!SILENT.enabled(&metadata));
        TrainLogger::silent().info(format_args!("dropped"));
    }
}
