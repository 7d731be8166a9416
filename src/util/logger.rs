use log::SetLoggerError;

/// The environment variable that controls the filter of the built-in logger.
/// It takes the same syntax as `RUST_LOG`, e.g. `GCBRIDGE_LOG=gcbridge::thread=trace`.
pub const LOG_FILTER_ENV: &str = "GCBRIDGE_LOG";

/// Attempt to init a env_logger for gcbridge, writing to `log_file` if it is given and can be
/// opened, and to stderr otherwise.
/// Does nothing if the "builtin_env_logger" feature is disabled.
///
/// A host that installs its own logger before creating a [`crate::Coordinator`] keeps it;
/// the error returned here only means that a logger is already in place.
pub fn try_init(log_file: Option<&str>) -> Result<(), SetLoggerError> {
    cfg_if::cfg_if! {
        if #[cfg(feature = "builtin_env_logger")] {
            // By default, use info level logging.
            let mut builder =
                env_logger::Builder::from_env(env_logger::Env::default().filter_or(LOG_FILTER_ENV, "info"));
            let mut open_error = None;
            if let Some(path) = log_file.filter(|p| !p.is_empty()) {
                match std::fs::OpenOptions::new().create(true).append(true).open(path) {
                    Ok(file) => {
                        builder.target(env_logger::Target::Pipe(Box::new(file)));
                    }
                    Err(e) => open_error = Some((path, e)),
                }
            }
            builder.try_init()?;
            if let Some((path, e)) = open_error {
                warn!("Cannot open log file {}: {}. Logging to stderr.", path, e);
            }
            Ok(())
        } else {
            let _ = log_file;
            Ok(())
        }
    }
}
