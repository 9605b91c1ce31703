//! Engine-level test suites.

mod stress_tests;
