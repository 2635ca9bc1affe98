//! Injected sink for non-fatal errors.
//!
//! Compile failures after startup, subscription failures and dropped
//! events are never returned to a caller; they go here instead.

use crate::error::EngineError;

pub trait ErrorSink: Send + Sync {
    fn report(&self, error: &EngineError);
}

impl<F> ErrorSink for F
where
    F: Fn(&EngineError) + Send + Sync,
{
    fn report(&self, error: &EngineError) {
        self(error)
    }
}

/// Default sink: one `error`-level tracing record per report.
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl ErrorSink for TracingSink {
    fn report(&self, error: &EngineError) {
        tracing::error!("[tplindex] {error}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::sync::Arc;

    #[test]
    fn test_closure_sink_receives_reports() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let sink = {
            let seen = Arc::clone(&seen);
            move |err: &EngineError| seen.lock().push(err.to_string())
        };

        sink.report(&EngineError::NotFound {
            name: "gone".to_string(),
        });

        assert_eq!(*seen.lock(), vec!["Template 'gone' not found".to_string()]);
    }
}
