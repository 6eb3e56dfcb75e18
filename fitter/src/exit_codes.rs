//! Stable exit codes for fitter CLI commands.

/// Command succeeded (for `fitter fit`: converged or soft-exhausted).
pub const OK: i32 = 0;
/// Command failed due to an invalid document/config/plan or other errors.
pub const INVALID: i32 = 1;
/// `fitter fit` failed on its final permitted iteration.
pub const FIT_FAILED: i32 = 2;
