//! Best-effort forwarding of records to the spreadsheet endpoint.
//!
//! Submissions are at-most-once: each record is posted once on a background
//! task and the outcome is only reported as a [`Notice`]. Nothing is retried,
//! queued or rolled back.

use std::future::Future;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::task::TaskTracker;

use crate::code::CodeImage;
use crate::notice::{Notice, Notifier};
use crate::record::Record;

#[derive(Error, Debug)]
pub enum SubmitError {
    #[error("request failed: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("no submission endpoint configured")]
    NoEndpoint,
}

/// Body encoding for the endpoint.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SubmitFormat {
    /// `application/json` record, no image.
    #[default]
    Json,
    /// `application/x-www-form-urlencoded` record plus an `Image` data URI.
    Form,
}

impl SubmitFormat {
    /// Whether a submission in this format carries the rendered code.
    pub fn needs_image(self) -> bool {
        matches!(self, SubmitFormat::Form)
    }
}

/// One record on its way to the endpoint.
#[derive(Debug, Clone)]
pub struct Submission {
    pub record: Record,
    pub image: Option<CodeImage>,
}

/// Remote record storage.
pub trait RecordSink: Send + Sync + 'static {
    /// Delivers one submission and yields the raw response body.
    fn submit(
        &self,
        submission: Submission,
    ) -> impl Future<Output = Result<String, SubmitError>> + Send;
}

/// HTTP client for a spreadsheet-backed endpoint (e.g. a sheet web app).
#[derive(Debug, Clone)]
pub struct SheetsClient {
    client: reqwest::Client,
    endpoint: String,
    format: SubmitFormat,
}

impl SheetsClient {
    pub fn new(endpoint: impl Into<String>, format: SubmitFormat) -> Result<Self, SubmitError> {
        let endpoint = endpoint.into();
        if endpoint.trim().is_empty() {
            return Err(SubmitError::NoEndpoint);
        }
        Ok(Self {
            client: reqwest::Client::builder().build()?,
            endpoint,
            format,
        })
    }

    pub fn format(&self) -> SubmitFormat {
        self.format
    }

    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }
}

impl RecordSink for SheetsClient {
    fn submit(
        &self,
        submission: Submission,
    ) -> impl Future<Output = Result<String, SubmitError>> + Send {
        let request = self.client.post(self.endpoint.as_str());
        let request = match self.format {
            SubmitFormat::Json => request.json(&submission.record),
            SubmitFormat::Form => {
                let mut pairs = submission.record.pairs();
                if let Some(image) = &submission.image {
                    pairs.push(("Image", image.to_data_uri()));
                }
                request.form(&pairs)
            }
        };

        async move {
            // Status and body are not interpreted; reaching the endpoint is success.
            let response = request.send().await?;
            Ok(response.text().await?)
        }
    }
}

/// Sink that accepts and drops everything (no endpoint configured).
#[derive(Debug, Default, Clone, Copy)]
pub struct DiscardSink;

impl RecordSink for DiscardSink {
    fn submit(
        &self,
        submission: Submission,
    ) -> impl Future<Output = Result<String, SubmitError>> + Send {
        tracing::debug!(identifier = %submission.record.identifier, "submission discarded");
        std::future::ready(Ok(String::new()))
    }
}

/// Spawns submissions in the background and reports their outcome.
pub struct Dispatcher<S: RecordSink> {
    sink: Arc<S>,
    notifier: Notifier,
    tracker: TaskTracker,
}

impl<S: RecordSink> Dispatcher<S> {
    pub fn new(sink: S, notifier: Notifier) -> Self {
        Self {
            sink: Arc::new(sink),
            notifier,
            tracker: TaskTracker::new(),
        }
    }

    pub fn sink(&self) -> &S {
        &self.sink
    }

    /// Fire-and-forget. Must be called from within a tokio runtime.
    pub fn dispatch(&self, submission: Submission) {
        let sink = Arc::clone(&self.sink);
        let notifier = self.notifier.clone();
        let identifier = submission.record.identifier.clone();

        self.tracker.spawn(async move {
            match sink.submit(submission).await {
                Ok(body) => {
                    tracing::debug!(%identifier, response = %body, "submission delivered");
                    notifier.notify(Notice::Sent { identifier });
                }
                Err(err) => {
                    notifier.notify(Notice::SendFailed {
                        identifier,
                        reason: err.to_string(),
                    });
                }
            }
        });
    }

    /// Submissions still in flight.
    pub fn pending(&self) -> usize {
        self.tracker.len()
    }

    /// Waits for every submission spawned so far.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
