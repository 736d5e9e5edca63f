use std::fmt;
use std::path::PathBuf;

use tokio::sync::mpsc;

use crate::record::ValidationError;

/// Transient user-facing notification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notice {
    Invalid(ValidationError),
    CategoryLocked,
    Generated { identifier: String },
    ImageNotReady { identifier: String, reason: String },
    Sent { identifier: String },
    SendFailed { identifier: String, reason: String },
    Ready,
    NothingToExport,
    Exported { path: PathBuf, records: usize },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Info,
    Warning,
    Error,
}

impl Notice {
    pub fn severity(&self) -> Severity {
        match self {
            Notice::Generated { .. } | Notice::Sent { .. } | Notice::Ready | Notice::Exported { .. } => {
                Severity::Info
            }
            Notice::Invalid(_) | Notice::CategoryLocked | Notice::NothingToExport => {
                Severity::Warning
            }
            Notice::ImageNotReady { .. } | Notice::SendFailed { .. } => Severity::Error,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Notice::Invalid(reason) => write!(f, "Please fill all fields correctly ({reason})."),
            Notice::CategoryLocked => f.write_str("Category is locked until reset."),
            Notice::Generated { identifier } => write!(f, "QR Code {identifier} generated!"),
            Notice::ImageNotReady { identifier, reason } => {
                write!(f, "QR code for {identifier} not ready: {reason}")
            }
            Notice::Sent { identifier } => write!(f, "{identifier}: data sent to sheet"),
            Notice::SendFailed { identifier, reason } => {
                write!(f, "{identifier}: failed to send to sheet ({reason})")
            }
            Notice::Ready => f.write_str("Ready for new entry."),
            Notice::NothingToExport => f.write_str("No data to export yet."),
            Notice::Exported { path, records } => {
                write!(f, "Exported {records} record(s) to {}", path.display())
            }
        }
    }
}

/// Sending half of the notice channel. Cheap to clone.
#[derive(Debug, Clone, Default)]
pub struct Notifier {
    tx: Option<mpsc::UnboundedSender<Notice>>,
}

impl Notifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notice>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx: Some(tx) }, rx)
    }

    /// Notices are only logged.
    pub fn silent() -> Self {
        Self::default()
    }

    pub fn notify(&self, notice: Notice) {
        match notice.severity() {
            Severity::Info => tracing::info!("{notice}"),
            Severity::Warning => tracing::warn!("{notice}"),
            Severity::Error => tracing::error!("{notice}"),
        }
        if let Some(tx) = &self.tx {
            // Receiver gone means nobody is displaying notices anymore.
            let _ = tx.send(notice);
        }
    }
}
