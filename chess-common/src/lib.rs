//! Shared square/file/rank/piece conversions and the long-coordinate move
//! codec, used by both the `chess` and `engine` crates so the two never
//! disagree on how a square or move is spelled on the wire.

pub mod converters;
pub mod uci;

// Re-export commonly used items
pub use converters::*;
pub use uci::*;
