pub mod parser;
pub mod store;
pub mod types;

pub use parser::{parse_session, parse_session_summary};
pub use store::SessionStore;
pub use types::{
    CycleRecord, DayCount, ProviderStats, Session, SessionEnd, SessionFilter, SessionLine,
    SessionStart, SessionStats, SessionSummary,
};
