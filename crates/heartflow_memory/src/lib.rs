pub mod manager;
pub mod relationship;
pub mod store;

pub use manager::RelationshipManager;
pub use relationship::{relationship_delta, HIGH_VALUE_THRESHOLD};
pub use store::{InMemoryRelationshipStore, SqliteRelationshipStore};
