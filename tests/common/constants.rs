//! Shared constants for end-to-end tests
//!
//! This module contains all constants used across the test suite.
//! When test data changes (model catalog, timeouts), update only this file.

// ============================================================================
// Test Model Catalog
// ============================================================================

/// Key of the scripted model every test server serves
pub const TEST_MODEL_KEY: &str = "scripted";

/// Display name of the scripted model
pub const TEST_MODEL_NAME: &str = "Scripted Model";

/// Model ID of the scripted model
pub const TEST_MODEL_ID: &str = "scripted-model-v1";

// ============================================================================
// Test Timeouts and Configuration
// ============================================================================

/// Maximum time to wait for server to become ready (milliseconds)
pub const SERVER_READY_TIMEOUT_MS: u64 = 5000;

/// Timeout for individual HTTP requests (seconds)
pub const REQUEST_TIMEOUT_SECS: u64 = 10;

/// Polling interval when waiting for server ready (milliseconds)
pub const SERVER_READY_POLL_INTERVAL_MS: u64 = 50;
