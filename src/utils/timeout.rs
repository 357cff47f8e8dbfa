//! Default durations used across the client and server configuration.

use std::time::Duration;

/// Default timeout for connection attempts
pub const DEFAULT_TIMEOUT: Duration = Duration::from_secs(5);

/// Default timeout for waiting for a correlated response.
///
/// Effectively unbounded, inherited from the wire protocol's historical
/// behavior. Deployments wanting real timeouts configure
/// `ClientConfig::response_timeout`.
pub const RESPONSE_TIMEOUT: Duration = Duration::from_secs(1_000_000);

/// Default grace period for server shutdown
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);
