pub mod session;

pub use session::{EngineLine, EngineSession, LineScore, SearchFlags, SessionConfig, SessionError};
