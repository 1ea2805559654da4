//! # ww-services
//!
//! Business logic over the `ww-core` ports: the bin registry and live map
//! feed, community reports and moderation, the add-bin submission flow, and
//! waste identification.

pub mod identify;
pub mod moderation;
pub mod registry;
pub mod reports;
pub mod submission;

pub use identify::{identify, Identification, Material, WasteIdentifier};
pub use moderation::{evaluate, ModerationEngine, ReportState, VoteResult};
pub use registry::{is_duplicate, BinRegistry, NearestBin, Unsubscribe};
pub use reports::{ReportStore, VoteOutcome};
pub use submission::{BinSubmission, SubmissionFlow, SubmissionOutcome};
