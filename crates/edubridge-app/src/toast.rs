use tokio::sync::mpsc;
use tracing::{error, info};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ToastLevel {
    Success,
    Info,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Toast {
    pub level: ToastLevel,
    pub text: String,
}

/// Transient user feedback. Every toast is logged as well as queued.
#[derive(Clone)]
pub struct Toaster {
    tx: mpsc::UnboundedSender<Toast>,
}

impl Toaster {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Toast>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }

    pub fn success(&self, text: impl Into<String>) {
        self.push(ToastLevel::Success, text.into());
    }

    pub fn info(&self, text: impl Into<String>) {
        self.push(ToastLevel::Info, text.into());
    }

    pub fn error(&self, text: impl Into<String>) {
        self.push(ToastLevel::Error, text.into());
    }

    fn push(&self, level: ToastLevel, text: String) {
        match level {
            ToastLevel::Error => error!(toast = %text, "Toast"),
            _ => info!(toast = %text, ?level, "Toast"),
        }
        // Nobody draining the queue is fine; the log line remains.
        let _ = self.tx.send(Toast { level, text });
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn toasts_arrive_in_order() {
        let (toaster, mut rx) = Toaster::channel();
        toaster.success("saved");
        toaster.error("failed");

        assert_eq!(rx.try_recv().unwrap(), Toast { level: ToastLevel::Success, text: "saved".into() });
        assert_eq!(rx.try_recv().unwrap().level, ToastLevel::Error);
        assert!(rx.try_recv().is_err());
    }
}
