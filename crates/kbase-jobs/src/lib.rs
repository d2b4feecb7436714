//! # kbase-jobs
//!
//! Client-side handling of long-running backend jobs for kbase.
//!
//! - [`subscription`]: one event stream connection per job, closed right
//!   after the terminal event
//! - [`progress`]: per-kind phase machine with exactly-once completion
//! - [`tracker`]: wires a subscription to the machine and a [`JobObserver`]
//! - [`delete_flow`]: confirmation and result handling for single and bulk
//!   deletes

pub mod delete_flow;
pub mod progress;
pub mod subscription;
pub mod tracker;

pub use delete_flow::{DeleteFlow, PendingBulk, PendingConfirmation};
pub use progress::{JobProgress, KindProfile, Phase, RecoveryAction, Transition};
pub use subscription::{JobStreamClient, JobSubscription, JOB_UPDATE_EVENT};
pub use tracker::{JobObserver, JobTracker};
