mod job_poller;
mod state;
mod timer;

pub use job_poller::{DEFAULT_POLL_PERIOD, JobPoller, PollerSettings, PollerSnapshot};
pub use state::PollerState;
