use tracing::error;

pub trait CaptureErr {
    /// Logs the error and reports it to Sentry, passing the result through.
    fn capture_err(self) -> Self;
}

impl<T> CaptureErr for anyhow::Result<T> {
    fn capture_err(self) -> Self {
        if let Err(error) = &self {
            error!("{:#}", error);
            sentry::integrations::anyhow::capture_anyhow(error);
        }
        self
    }
}
