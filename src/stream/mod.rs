//! Producer/consumer plumbing around the merge engine.

pub mod driver;
pub mod report;
pub mod ring;
pub mod session;

pub use driver::{DriverHandle, MergeDriver};
pub use report::{ErrorReporter, LogReporter, MergeEvent};
pub use ring::UpdateRing;
pub use session::{InferenceFeedback, InferenceGoal, InferenceOutcome, InferenceSession, SessionEnd};
