//! Integration test common infrastructure.
//!
//! Provides a mock LAPI and an in-process agent wired against it.

pub mod gate;
pub mod lapi;

#[allow(unused_imports)]
pub use gate::TestGate;
#[allow(unused_imports)]
pub use lapi::{API_KEY, MockLapi};
