//! Data models shared by probes, the gateway and the API

mod details;
mod output;
mod status;
mod summary;

pub use details::{Details, DetailsStatus};
pub use output::CommandOutput;
pub use status::{truncate_detail, BackendKind, BackendStatus, StatusSnapshot, DETAIL_MAX_CHARS};
pub use summary::{metric_key, Summary, SummaryStatus, UNKNOWN_METRIC};
