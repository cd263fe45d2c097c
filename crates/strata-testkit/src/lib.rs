//! Strata Testing Infrastructure
//!
//! Fixtures shared by the Strata test suites: deterministic signing nodes, a
//! ledger whose signatures commit to the bytes it hands out, and doubles for
//! both directions of the host channel.
//!
//! # Usage
//!
//! ```rust,no_run
//! use strata_historical::StateCache;
//! use strata_testkit::*;
//!
//! let mut ledger = LedgerFixture::new();
//! ledger.sign_range(7, 5, 6);
//!
//! let writer = RecordingHostWriter::new();
//! let mut cache = StateCache::new(ledger.live(), writer.clone());
//! cache.get_state_at(5);
//! HostSimulator::new().serve(&ledger, &writer, &mut cache);
//! assert!(cache.get_state_at(5).is_some());
//! ```

#![allow(clippy::unwrap_used)]
#![allow(clippy::expect_used)]

pub mod keys;
pub mod ledger;
pub mod logging;
pub mod transport;

pub use keys::KeyTestFixture;
pub use ledger::*;
pub use logging::init_test_tracing;
pub use transport::*;
