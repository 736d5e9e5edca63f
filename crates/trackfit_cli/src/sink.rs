use std::future::Future;

use trackfit::submit::{DiscardSink, RecordSink, SheetsClient, SubmitError, Submission};
use trackfit_config::Sheets;

/// The configured submission target.
pub enum EndpointSink {
    Sheets(SheetsClient),
    Discard(DiscardSink),
}

impl EndpointSink {
    pub fn from_settings(sheets: &Sheets) -> Result<Self, SubmitError> {
        match sheets.endpoint() {
            Some(endpoint) => Ok(Self::Sheets(SheetsClient::new(endpoint, sheets.format)?)),
            None => {
                tracing::warn!("no sheet endpoint configured, records stay local");
                Ok(Self::Discard(DiscardSink))
            }
        }
    }
}

impl RecordSink for EndpointSink {
    fn submit(
        &self,
        submission: Submission,
    ) -> impl Future<Output = Result<String, SubmitError>> + Send {
        async move {
            match self {
                EndpointSink::Sheets(client) => client.submit(submission).await,
                EndpointSink::Discard(discard) => discard.submit(submission).await,
            }
        }
    }
}
