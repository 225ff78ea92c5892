//! Domain model: catalog and cart aggregates, value objects and events.
pub mod aggregates;
pub mod events;
pub mod value_objects;
