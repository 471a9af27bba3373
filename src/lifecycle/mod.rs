//! Lifecycle management.
//!
//! # Data Flow
//! ```text
//! Startup (main.rs):
//!     Load config → Validate → Build registry and pipeline → Bind listener
//!
//! Shutdown (shutdown.rs):
//!     SIGINT/SIGTERM → broadcast → stop accepting → drain in-flight → exit
//! ```

pub mod shutdown;

pub use shutdown::Shutdown;
