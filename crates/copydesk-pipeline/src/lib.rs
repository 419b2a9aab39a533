//! The copydesk content pipeline: source normalization, outbound rate
//! limiting, the wizard state machine, and the research → write → export
//! orchestration over the service clients.

mod error;
pub mod rate_limit;
pub mod run;
pub mod sources;
pub mod wizard;

pub use error::PipelineError;
pub use run::{ExportOptions, ExportReceipt, Pipeline};
