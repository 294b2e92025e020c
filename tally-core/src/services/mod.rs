//! Service layer - business logic orchestration
//!
//! Services coordinate domain logic and port interactions. Each service
//! focuses on a specific use case or feature area.

mod apply;
pub mod logging;
pub mod matcher;
pub mod migration;
mod rules;
mod user_lock;

pub use apply::{ApplyOptions, ApplyResult, CategorizationService, PreviewEntry};
pub use logging::{EntryPoint, EventSink, LogEntry, LogEvent, LogFilter, LoggingService};
pub use matcher::{test_patterns, SearchText};
pub use migration::{MigrationResult, MigrationService};
pub use rules::{MoveDirection, RuleService};
