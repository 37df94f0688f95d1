// ============================================================================
// Strict linting - Dangerous or non-idiomatic practices are forbidden
// ============================================================================

#![deny(warnings)]                    // All warnings are treated as errors
#![forbid(unsafe_code)]               // Unsafe code is forbidden
#![deny(missing_docs)]                // All public items must be documented
#![deny(dead_code)]                   // Unused code is forbidden
#![deny(non_camel_case_types)]        // Types must follow CamelCase convention

// Additional strictness - Leave nothing unchecked
#![deny(unused_imports)]              // Unused imports are forbidden
#![deny(unused_variables)]            // Unused variables are forbidden
#![deny(unused_must_use)]             // Must handle Result and Option explicitly
#![deny(non_snake_case)]              // Variables and functions must be snake_case
#![deny(non_upper_case_globals)]      // Constants must be UPPER_CASE
#![deny(nonstandard_style)]           // Non-standard code style is forbidden
#![forbid(unsafe_op_in_unsafe_fn)]    // Unsafe ops in unsafe fns are forbidden

// Clippy lints (warnings only)
#![warn(clippy::all)]                 // All standard Clippy lints
#![warn(clippy::pedantic)]            // Very strict Clippy lints
#![warn(clippy::unwrap_used)]         // unwrap() warning
#![warn(clippy::expect_used)]         // expect() warning
#![warn(clippy::panic)]               // panic!() warning
#![warn(clippy::print_stdout)]        // println!() warning
#![warn(clippy::redundant_clone)]     // Useless clones warning
#![warn(clippy::too_many_arguments)]  // Limit function arguments

// ============================================================================
// Crate Documentation
// ============================================================================

//! # Stagehand
//!
//! A deployment orchestrator that promotes versioned compute-function
//! artifacts through named deployment stages while keeping an
//! infrastructure-as-code stack, a secret/parameter namespace, and an
//! API-routing layer mutually consistent.
//!
//! ## Architecture
//!
//! Two sibling pipelines do all the work:
//!
//! 1. **Stack lifecycle**: [`stack::StackLifecycleManager`] drives
//!    create/update/recreate against the declarative infrastructure stack,
//!    with a change-set-based dry-run preview and a polling
//!    [`stack::StackWaiter`] for the long-running transitions.
//! 2. **Release orchestration**: [`release::ReleaseOrchestrator`] allocates
//!    the next immutable version, snapshots the configuration namespace at
//!    that version, publishes code and configuration, promotes the stage
//!    alias, and reconciles API base-path mappings.
//!
//! Remote control planes are reached through the capability contracts in
//! [`provider`]; AWS-backed adapters live in [`aws`].
//!
//! ## Modules
//!
//! - [`cli`]: command-line interface
//! - [`config`]: configuration parsing and validation
//! - [`context`]: immutable per-invocation deployment context
//! - [`diff`]: unified diffs for dry-run previews
//! - [`provider`]: capability contracts and in-memory test backends
//! - [`aws`]: AWS adapters for the contracts
//! - [`stack`]: stack lifecycle management
//! - [`release`]: release orchestration

// ============================================================================
// Modules
// ============================================================================

pub mod aws;
pub mod cli;
pub mod config;
pub mod context;
pub mod diff;
pub mod error;
pub mod provider;
pub mod release;
pub mod stack;

// ============================================================================
// Re-exports
// ============================================================================

pub use cli::{Cli, Commands, OutputFormatter};
pub use config::{ConfigParser, DeployConfig, ServiceKind};
pub use context::{ContextScope, DeploymentContext};
pub use error::{Result, StagehandError};
pub use release::{ReleaseOrchestrator, ReleaseReport, ReleaseRequest, RouteOutcome};
pub use stack::{ApplyMode, CancelFlag, StackLevel, StackLifecycleManager, StackOutcome};
