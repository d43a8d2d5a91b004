//! Session orchestration: delivery, session state and the backend driver.

pub mod controller;
pub mod delivery;
pub mod session;
pub mod sinks;

pub use controller::SessionController;
pub use delivery::{BlockRenderer, DeliveryQueue, DrainHandle};
pub use session::{PendingRun, RunOutcome, Session, SessionConfig, SessionState, Submission};
pub use sinks::{ErrorReporter, NoopUsageSink, TracingErrorReporter, UsageSink};
