/// Tolerance used when comparing traffic, capacity and splitting ratio sums.
pub const PRECISION_FACTOR: f64 = 1e-3;

/// Version tag written to, and the newest version accepted from, persisted network files.
pub const FILE_FORMAT_VERSION: u32 = 5;

/// Propagation speed assumed for links created without an explicit speed (fiber, km/s).
pub const DEFAULT_PROPAGATION_SPEED_KM_PER_SECOND: f64 = 200_000.0;

/// Environment variable that overrides the directory the binary writes its log file to.
pub const LOG_DIR_ENV: &str = "NETWORK_KERNEL_LOG_DIR";
