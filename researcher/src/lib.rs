//! Iterative, oracle-guided company research.
//!
//! For every subject (a company) a language-model oracle is shown everything
//! collected so far and answers with actions to take. The actions record
//! facts, explore pages, or download images; the loop repeats until the
//! oracle declares the profile complete or the iteration budget runs out.
//! Every fact carries provenance, and the final markdown report cites each
//! distinct source exactly once.
//!
//! - **[`core`]**: pure, deterministic logic (facts, citations, decisions, validation).
//! - **[`io`]**: side effects (HTTP, child processes, filesystem).
//!
//! [`registry`], [`handlers`], [`research`], and [`batch`] wire the two together.

pub mod batch;
pub mod core;
pub mod exit_codes;
pub mod handlers;
pub mod io;
pub mod logging;
pub mod oracle;
pub mod registry;
pub mod research;
pub mod session;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
