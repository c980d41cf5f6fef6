//! Shared configuration types for bqsync services.

mod destination;
mod lookup;
mod pipeline;
mod replicator;
mod rules;

pub use destination::*;
pub use lookup::*;
pub use pipeline::*;
pub use replicator::*;
pub use rules::*;
