//! Next Release Core - Side-Effect-Free Version Resolution
//!
//! # Guarantees
//! 1. Inputs are validated before the record is touched
//! 2. Bump, final and explicit versions never write to the record
//! 3. Major/minor/patch arithmetic belongs to the external calculator
//! 4. The record's bytes are restored after every delegated increment
//! 5. Errors are returned, never turned into a process exit

pub mod format;
pub mod transition;
pub mod record;
pub mod hashing;
pub mod snapshot;
pub mod calculator;
pub mod increment;
pub mod resolver;
pub mod error;
pub mod logging;

pub use format::{FormatError, Numeric, Version};
pub use transition::{bump, finalize};
pub use record::{current_version, RecordError};
pub use snapshot::{RecordSnapshot, RestoreError};
pub use calculator::{
    CalculatorError, IncrementKind, NpmCalculator, SemverCalculator, VersionCalculator,
};
pub use resolver::{resolve, Command, ResolutionRequest, ResolutionResult, Resolver};
pub use error::{CalculationError, ResolveError};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
pub const DEFAULT_RECORD: &str = "package.json";
