//! Integration tests for the WakeGate pipeline
//!
//! This test suite validates:
//! - Scenarios A through E from resolved context to action outcome
//! - Full triggers against a simulated network monitor and remote host
//! - Identity provisioning and authorized-key export round trips
//! - The trust gate and router agreeing on which contexts are routable

pub mod test_utils;

#[cfg(test)]
mod property_tests;

#[cfg(test)]
mod scenario_tests;
