use std::{fs::OpenOptions, sync::Mutex};

use eyre::{Result, WrapErr, eyre};
use tracing_subscriber::{
    EnvFilter, Registry,
    fmt::writer::{BoxMakeWriter, MakeWriterExt},
    layer::SubscriberExt,
    util::SubscriberInitExt,
};

use crate::config::settings::{LogFormat, Settings};

/// Initialize logging from the runtime settings.
///
/// `RUST_LOG` wins over `settings.log_level` when it is set. When
/// `settings.log_file` names a file, every line also goes to that file; a file
/// that cannot be opened is reported and logging continues on stdout.
pub fn init_tracing(settings: &Settings) -> Result<()> {
    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&settings.log_level)
            .wrap_err_with(|| format!("Invalid log level: {}", settings.log_level))?,
    };

    let (writer, file_error) = make_writer(settings.log_file());
    let to_file = settings.log_file().is_some() && file_error.is_none();

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(writer)
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);

    let init = match settings.log_format {
        LogFormat::Json => Registry::default()
            .with(env_filter)
            .with(fmt_layer.json().with_current_span(true).with_span_list(false))
            .try_init(),
        LogFormat::Pretty => Registry::default()
            .with(env_filter)
            .with(fmt_layer.pretty().with_ansi(!to_file))
            .try_init(),
    };
    init.map_err(|e| eyre!("Failed to install tracing subscriber: {e}"))?;

    if let Some(e) = file_error {
        tracing::warn!("Logging to stdout only: {}", e);
    }
    tracing::info!(
        format = ?settings.log_format,
        file = settings.log_file().unwrap_or("-"),
        "Service bus logging initialized"
    );
    Ok(())
}

/// Stdout, teed into `log_file` when it can be opened for appending.
fn make_writer(log_file: Option<&str>) -> (BoxMakeWriter, Option<String>) {
    let Some(path) = log_file else {
        return (BoxMakeWriter::new(std::io::stdout), None);
    };

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(file) => (
            BoxMakeWriter::new(std::io::stdout.and(Mutex::new(file))),
            None,
        ),
        Err(e) => (
            BoxMakeWriter::new(std::io::stdout),
            Some(format!("cannot open log file {path}: {e}")),
        ),
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use tracing_subscriber::fmt::MakeWriter;

    use super::*;

    #[test]
    fn test_log_file_receives_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("service-bus.log");

        let (writer, error) = make_writer(path.to_str());
        assert!(error.is_none());
        writer.make_writer().write_all(b"line one\n").unwrap();
        writer.make_writer().write_all(b"line two\n").unwrap();

        let written = std::fs::read_to_string(&path).unwrap();
        assert_eq!(written, "line one\nline two\n");
    }

    #[test]
    fn test_unopenable_log_file_falls_back_to_stdout() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("missing-dir").join("service-bus.log");

        let (_, error) = make_writer(path.to_str());
        assert!(error.unwrap().contains("cannot open log file"));
    }
}
