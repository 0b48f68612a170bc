pub mod cancel;
pub mod config;
pub mod ledger;
pub mod metrics;
pub mod orchestrator;
pub mod pending;
pub mod postprocess;
pub mod task;
pub mod testing;

pub use cancel::CancellationController;
pub use config::{
    load_config, load_config_from_str, validate_config, Config, ConfigError, LedgerConfig,
    MetricsConfig, PostProcessConfig, TaskConfig,
};
pub use ledger::{Ledger, LedgerError};
pub use orchestrator::{
    format_duration, Aggregator, JobOutcome, JobResult, Orchestrator, OutcomeClass, RunError,
    RunOptions, RunSummary,
};
pub use pending::{PendingGuard, PendingTracker};
pub use postprocess::{PostProcessError, PostProcessReport, PostProcessor, ThumbnailEmbedder};
pub use task::{CommandRunner, TaskArgs, TaskError, TaskReport, TaskRunner};
