//! Deterministic, pure logic shared by the research loop.
//!
//! Core modules must be free of I/O side effects. They operate on in-memory
//! data structures and return deterministic outputs suitable for tests.

pub mod actions;
pub mod citations;
pub mod decision;
pub mod facts;
pub mod locator;
pub mod subject;
pub mod text;
pub mod validation;
