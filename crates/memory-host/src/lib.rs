//! # memory-host
//!
//! An in-memory incremental host for `pipeline` generators.
//!
//! [`MemoryHost`] implements the host side of the pipeline ports: it
//! initializes a generator once, then runs generation passes over successive
//! [`Compilation`] snapshots. Transforms run on every pass; an output action
//! runs only when its model changed structurally since the previous pass, and
//! otherwise its cached artifacts and diagnostics are replayed.
//!
//! ```rust,ignore
//! let mut host = MemoryHost::new(&built);
//! let report = host.run(&compilation, &CancellationToken::new())?;
//! for (name, content) in &report.artifacts {
//!     println!("{name}: {} bytes", content.len());
//! }
//! ```

mod context;
mod errors;
mod host;
mod reactions;
mod syntax;

pub use context::{DeclarationContext, MemoryInit, NodeProvider, ValueProvider};
pub use errors::HostError;
pub use host::{MemoryHost, SessionReport};
pub use reactions::{FailureSource, GenerationFailure, PassStats};
pub use syntax::{Compilation, Declaration, SideInput};
