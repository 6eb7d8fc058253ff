//! Integration test modules.

mod cloud_sync_test;
mod realtime_test;
