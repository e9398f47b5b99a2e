//! CLI commands for the market pulse pipeline.

pub mod aggregate;
pub mod collect_posts;
pub mod context;
pub mod ingest;
pub mod run_all;
pub mod status;

pub use aggregate::run_aggregate;
pub use collect_posts::run_collect_posts;
pub use context::{shutdown_on_ctrl_c, AppContext};
pub use ingest::run_ingest;
pub use run_all::run_pipeline;
pub use status::{run_status, StatusArgs};
