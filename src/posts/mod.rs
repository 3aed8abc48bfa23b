pub mod identity;
pub mod index;
mod locks;
mod model;
pub mod store;

pub use identity::IdAllocator;
pub use index::IndexEvictor;
pub use locks::KeyedLocks;
pub use model::*;
pub use store::PostStore;

/// Default table that post records are stored under.
pub const DEFAULT_TABLE: &str = "post";
