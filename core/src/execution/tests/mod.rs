//! Tests for the execution engine
//!
//! Organized by feature area

mod helpers;

mod function_tests;
mod limits_tests;
mod ordering_tests;
