pub mod clock;
pub mod domain;
pub mod error;
pub mod notebooks;
pub mod password_reset;
pub mod ports;
pub mod streak;
pub mod tracker;
pub mod verification;

#[cfg(test)]
mod testing;

pub use clock::{Clock, ManualClock, SystemClock};
pub use domain::{
    AuthMethod, AuthSession, ContactKey, NewAccount, NewNotebook, Notebook, NotebookUpdate,
    PendingUserData, PendingVerification, SourceType, StatsSnapshot, SummaryLength, UsageRecord,
    User, UserCredentials, UserStats, UserType,
};
pub use error::{CoreError, CoreResult};
pub use notebooks::{Listing, NotebookService};
pub use password_reset::PasswordResetService;
pub use ports::{CodeDispatcher, NotebookStore, PortError, PortResult, UserStore};
pub use tracker::{ActivityCounter, TrackedTime, UsageTracker};
pub use verification::{PendingVerificationStore, VerificationService};
