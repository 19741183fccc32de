//! Broker implementations for the position service.
//!
//! `PaperBroker` fills every order immediately against the last published
//! quote. `ScriptedBroker` is a test double that records submissions, fails
//! on demand and emits only the fills it is told to.

pub mod paper;
pub mod scripted;

pub use paper::PaperBroker;
pub use scripted::ScriptedBroker;
