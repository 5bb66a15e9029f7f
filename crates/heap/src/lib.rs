//! In-memory heap for txlog
//!
//! This crate provides a reference implementation of the collaborator traits
//! from `txlog-core`:
//! - InMemoryHeap: object model with image and movable spaces
//! - HashStringTables: strong/weak interning tiers
//! - MovingCollector: relocates every movable object and updates root holders

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod collector;
pub mod heap;
pub mod object;
pub mod strings;

pub use collector::{CollectionResult, Forwarding, MovingCollector, RootTypeKey};
pub use heap::{HeapStats, InMemoryHeap};
pub use object::Space;
pub use strings::HashStringTables;
