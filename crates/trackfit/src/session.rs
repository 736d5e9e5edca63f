//! The record builder behind the form.
//!
//! A session owns the category selector state, the record log and the
//! submission dispatcher. Selecting a category only previews the next
//! identifier; the counter moves on a validated submit and never moves back.

use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::category::Category;
use crate::clock::{Clock, SystemClock};
use crate::code::{CodeImage, CodePayload, CodeRenderer, DEFAULT_CODE_SIZE, QrRenderer};
use crate::counter::{CounterStore, StoreError};
use crate::export::{ExportError, RecordLog, export_workbook};
use crate::identifier::{commit_identifier, next_identifier};
use crate::notice::{Notice, Notifier};
use crate::record::{FormFields, Record, Status, ValidationError, assess, validate};
use crate::submit::{Dispatcher, RecordSink, SubmitFormat, Submission};

pub const DEFAULT_UNVERIFIED_VENDOR: &str = "Other";

#[derive(Error, Debug)]
pub enum SessionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error("category is locked until reset")]
    CategoryLocked,

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Export(#[from] ExportError),
}

/// Behaviour knobs, usually filled from the settings file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub payload: CodePayload,
    pub code_size: u32,
    pub unverified_vendor: String,
    pub format: SubmitFormat,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            payload: CodePayload::Record,
            code_size: DEFAULT_CODE_SIZE,
            unverified_vendor: DEFAULT_UNVERIFIED_VENDOR.to_string(),
            format: SubmitFormat::Json,
        }
    }
}

/// Outcome of a successful submit.
#[derive(Debug, Clone)]
pub struct SubmitReceipt {
    pub record: Record,
    pub image: Option<CodeImage>,
    /// False when the image-carrying submission was skipped for lack of an image.
    pub dispatched: bool,
}

pub struct SessionBuilder<S: RecordSink> {
    store: Arc<dyn CounterStore>,
    sink: S,
    renderer: Box<dyn CodeRenderer>,
    clock: Box<dyn Clock>,
    notifier: Notifier,
    log: RecordLog,
    config: SessionConfig,
}

impl<S: RecordSink> SessionBuilder<S> {
    pub fn renderer(mut self, renderer: impl CodeRenderer + 'static) -> Self {
        self.renderer = Box::new(renderer);
        self
    }

    pub fn clock(mut self, clock: impl Clock + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    pub fn notifier(mut self, notifier: Notifier) -> Self {
        self.notifier = notifier;
        self
    }

    /// Share an existing log (e.g. with an exporter held elsewhere).
    pub fn log(mut self, log: RecordLog) -> Self {
        self.log = log;
        self
    }

    pub fn config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> FormSession<S> {
        FormSession {
            store: self.store,
            renderer: self.renderer,
            clock: self.clock,
            dispatcher: Dispatcher::new(self.sink, self.notifier.clone()),
            notifier: self.notifier,
            log: self.log,
            config: self.config,
            selected: None,
            locked: false,
            displayed_id: None,
            code: None,
            status: None,
        }
    }
}

pub struct FormSession<S: RecordSink> {
    store: Arc<dyn CounterStore>,
    renderer: Box<dyn CodeRenderer>,
    clock: Box<dyn Clock>,
    dispatcher: Dispatcher<S>,
    notifier: Notifier,
    log: RecordLog,
    config: SessionConfig,
    selected: Option<Category>,
    locked: bool,
    displayed_id: Option<String>,
    code: Option<CodeImage>,
    status: Option<Status>,
}

impl<S: RecordSink> FormSession<S> {
    pub fn builder(store: Arc<dyn CounterStore>, sink: S) -> SessionBuilder<S> {
        SessionBuilder {
            store,
            sink,
            renderer: Box::new(QrRenderer),
            clock: Box::new(SystemClock),
            notifier: Notifier::silent(),
            log: RecordLog::new(),
            config: SessionConfig::default(),
        }
    }

    /// Category selector change. Returns the previewed identifier, or `None`
    /// when the input is not in the category table (the field is cleared and
    /// the store is not touched).
    pub fn select_category(&mut self, input: &str) -> Result<Option<&str>, SessionError> {
        if self.locked {
            self.notifier.notify(Notice::CategoryLocked);
            return Err(SessionError::CategoryLocked);
        }

        let Some(category) = Category::lookup(input) else {
            self.selected = None;
            self.displayed_id = None;
            return Ok(None);
        };

        let lease = next_identifier(self.store.as_ref(), category)?;
        self.selected = Some(category);
        self.displayed_id = Some(lease.identifier);
        Ok(self.displayed_id.as_deref())
    }

    /// Validates, takes the next identifier, builds the record and hands it
    /// off. Validation failures leave every piece of state untouched.
    pub fn submit(&mut self, fields: &FormFields) -> Result<SubmitReceipt, SessionError> {
        let form = match validate(self.selected, fields) {
            Ok(form) => form,
            Err(err) => {
                self.notifier.notify(Notice::Invalid(err.clone()));
                return Err(err.into());
            }
        };

        let lease = commit_identifier(self.store.as_ref(), form.category)?;
        let identifier = lease.identifier;
        self.locked = true;
        self.displayed_id = Some(identifier.clone());

        let now = self.clock.now();
        let status = assess(&form, now.date(), &self.config.unverified_vendor);
        self.status = Some(status);

        let record = Record::build(identifier.clone(), form, status, now);
        self.log.append(record.clone());

        let payload = self.config.payload.encode(&record);
        let image = match self.renderer.render(&payload, self.config.code_size) {
            Ok(image) => {
                self.notifier.notify(Notice::Generated {
                    identifier: identifier.clone(),
                });
                Some(image)
            }
            Err(err) => {
                self.notifier.notify(Notice::ImageNotReady {
                    identifier: identifier.clone(),
                    reason: err.to_string(),
                });
                None
            }
        };
        self.code = image.clone();

        let needs_image = self.config.format.needs_image();
        let dispatched = !(needs_image && image.is_none());
        if dispatched {
            self.dispatcher.dispatch(Submission {
                record: record.clone(),
                image: image.clone().filter(|_| needs_image),
            });
        } else {
            tracing::warn!(%identifier, "submission skipped, code image unavailable");
        }

        Ok(SubmitReceipt {
            record,
            image,
            dispatched,
        })
    }

    /// Prepares the form for the next record. Counters are kept.
    pub fn reset(&mut self) {
        self.locked = false;
        self.selected = None;
        self.displayed_id = None;
        self.code = None;
        self.status = None;
        self.notifier.notify(Notice::Ready);
    }

    /// Writes every record of this session to a workbook at `path`.
    pub fn export(&self, path: &Path) -> Result<usize, SessionError> {
        let records = self.log.snapshot();
        if records.is_empty() {
            self.notifier.notify(Notice::NothingToExport);
            return Err(ExportError::Empty.into());
        }
        export_workbook(&records, path)?;
        self.notifier.notify(Notice::Exported {
            path: path.to_path_buf(),
            records: records.len(),
        });
        Ok(records.len())
    }

    /// Waits until every dispatched submission has reported back.
    pub async fn flush(&self) {
        self.dispatcher.drain().await;
    }

    pub fn pending_submissions(&self) -> usize {
        self.dispatcher.pending()
    }

    pub fn selected(&self) -> Option<Category> {
        self.selected
    }

    pub fn is_locked(&self) -> bool {
        self.locked
    }

    pub fn displayed_identifier(&self) -> Option<&str> {
        self.displayed_id.as_deref()
    }

    pub fn code(&self) -> Option<&CodeImage> {
        self.code.as_ref()
    }

    pub fn status(&self) -> Option<Status> {
        self.status
    }

    pub fn log(&self) -> &RecordLog {
        &self.log
    }

    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    pub fn store(&self) -> &dyn CounterStore {
        self.store.as_ref()
    }

    pub fn sink(&self) -> &S {
        self.dispatcher.sink()
    }
}
