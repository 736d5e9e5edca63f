//! Track fitting inventory: sequential identifiers per fitting category,
//! scannable codes for each record, best-effort forwarding to a spreadsheet
//! endpoint and bulk `.xlsx` export of the session's records.

pub mod category;
pub mod clock;
pub mod code;
pub mod counter;
pub mod export;
pub mod identifier;
pub mod notice;
pub mod record;
pub mod session;
pub mod submit;

pub use category::Category;
pub use clock::{Clock, FixedClock, SystemClock};
pub use code::{CodeImage, CodePayload, CodeRenderer, QrRenderer, RenderError};
pub use counter::{CounterStore, FileCounterStore, MemoryCounterStore, StoreError};
pub use export::{ExportError, RecordLog};
pub use identifier::{IdentifierLease, commit_identifier, next_identifier};
pub use notice::{Notice, Notifier, Severity};
pub use record::{FormFields, Record, Status, ValidationError};
pub use session::{FormSession, SessionConfig, SessionError, SubmitReceipt};
pub use submit::{DiscardSink, Dispatcher, RecordSink, SheetsClient, SubmitError, SubmitFormat};
