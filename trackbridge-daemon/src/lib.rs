//! trackbridge daemon: poll scheduler + sync processor + socket server.

mod error;
pub mod paths;
pub mod protocol;
mod runtime;

pub use error::DaemonError;
pub use protocol::{
    request_status, request_stop, request_sync, send_request, DaemonRequest, DaemonResponse,
};
pub use runtime::{pipeline_runner, run, start_blocking, DaemonState, RunRecord, SyncRunner};
