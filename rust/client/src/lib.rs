pub mod config;
pub mod errors;
pub mod events;
pub mod logging;
pub mod protocol;
pub mod remote;
pub mod scheduler;
pub mod session;
pub mod sync;

pub use config::{ClientConfig, ConfigError, ConfigResolved, ConfigSources, ValueSource};
pub use errors::{ErrorSeverity, IntoUserNotice, UserNotice};
pub use events::{EventBus, EventSubscription, RoundEvent};
pub use logging::{init_logging, init_test_logging, LogEntry, TestLogSubscriber};
pub use protocol::{interpret, request_body, AuthorityResponse};
pub use remote::{RemoteActionClient, RemoteError};
pub use scheduler::{ReplayEnd, ReplayHandle, ReplayHooks, ReplayScheduler};
pub use session::{SessionError, SessionRegistry};
pub use sync::{
    BalanceSync, SyncError, TransactionFilter, TransactionStats, DEFAULT_STARTING_BALANCE,
};
