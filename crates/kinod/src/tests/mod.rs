//! Test suites for the server lifecycle.

pub(crate) mod support;
