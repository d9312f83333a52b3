//! Garbage collector module
//!
//! A tracing mark-sweep collector over an index-addressed heap. Objects never
//! move, so an `ObjectRef` stays valid for as long as something roots it.
//! Collection only happens when no script is running; see `Isolate::exit`.

mod collector;
mod heap;
mod persistent;

pub use collector::{Garbage, GcStats};
pub use heap::{Heap, ObjectRef};
pub use persistent::{Persistent, PersistentRegistry};
