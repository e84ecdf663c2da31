use lambda_runtime::tracing;

/// Where the handler sends its finished log lines.
pub trait NotificationLog {
    fn info(&self, message: &str);
    fn error(&self, message: &str);
}

impl<L: NotificationLog + ?Sized> NotificationLog for &L {
    fn info(&self, message: &str) {
        (**self).info(message)
    }

    fn error(&self, message: &str) {
        (**self).error(message)
    }
}

/// Emits through the process-wide `tracing` subscriber.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingLog;

impl NotificationLog for TracingLog {
    fn info(&self, message: &str) {
        tracing::info!("{message}");
    }

    fn error(&self, message: &str) {
        tracing::error!("{message}");
    }
}
