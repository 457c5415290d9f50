mod config;
mod cycle;
mod error;
mod history;
mod session;
mod status;

pub use config::{RoleSettings, SessionConfig, TEMPERATURE_RANGE};
pub use cycle::{Cycle, CycleKind, ModelsUsed};
pub use error::SessionError;
pub use history::History;
pub use session::RefinementSession;
pub use status::{SessionAction, SessionStatus};
