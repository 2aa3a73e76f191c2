//! Test suites for application bootstrap.

mod support;
mod unit;
