//! Behavior tests for pool bookkeeping and the supervisor state machine.
//!
//! Everything here runs against [`mocks::MockBackend`]; scenarios that
//! need real processes live in `tests/fork.rs`.

pub mod mocks;
