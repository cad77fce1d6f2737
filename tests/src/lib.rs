//! # Relay-Bus Test Suite
//!
//! Unified test crate for cross-module behaviour of the bus.
//!
//! ## Structure
//!
//! ```text
//! tests/
//! ├── benches/
//! │   └── dispatch_benchmarks.rs  # Publish fan-out and history throughput
//! └── src/
//!     ├── fixtures.rs             # Recording handlers shared by flows
//!     └── integration/
//!         ├── dispatch_flows.rs   # Priority, once, namespaces, isolation
//!         ├── replay_flows.rs     # Bounded history and replay
//!         ├── async_fanout.rs     # Async emission and event streams
//!         └── bridge_flows.rs     # Boundary bridges and config loading
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! # All tests
//! cargo test -p relay-tests
//!
//! # By category
//! cargo test -p relay-tests integration::dispatch_flows
//! cargo test -p relay-tests integration::replay_flows
//!
//! # Benchmarks
//! cargo bench -p relay-tests
//! ```

#![allow(unused_variables)]
#![allow(unused_imports)]
#![allow(dead_code)]

pub mod fixtures;
