//! Unit test modules.

mod completion_test;
mod derivation_test;
mod migration_test;
