//! mapguard — a domain persistence layer over pluggable storage records.
//!
//! The crate separates the domain model from storage: entities never talk
//! to a storage engine directly. Each entity family wires four
//! collaborators together through a caller-owned [`DomainContext`]:
//!
//! - a [`Record`](record::Record), the storage-bound half supplied by an
//!   engine adapter,
//! - a [`DataMapper`], routing attribute traffic and resolving relations
//!   into entities,
//! - an [`EntitiesRepository`], running the gated, transactional
//!   save/delete state machine,
//! - a [`Finder`], the fluent search interface converting query rows into
//!   entities.
//!
//! Collaborators resolve by naming convention (`UserRepository` finds
//! `UserEntity`, `UserRecord`, `UserQuery`, `UserFinder` in the registry)
//! with explicit factory overrides winning over the convention.
//!
//! ```
//! use mapguard::test_helpers::StubRecord;
//! use mapguard::{DomainContext, EntitiesRepository, Entity};
//!
//! let context = DomainContext::new();
//! context.register_record("UserRecord", || {
//!     StubRecord::builder("UserRecord").is_new(true).build_shared()
//! });
//! context.register_entity("UserEntity", Entity::shared);
//! context.register_repository("UserRepository", |ctx| {
//!     EntitiesRepository::builder("UserRepository", ctx.clone())
//!         .use_transactions(false)
//!         .build()
//! });
//!
//! let repository = context.repository("UserRepository")?;
//! let user = repository.create_new_entity()?;
//! assert!(user.borrow().is_new());
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! The crate is single-threaded by design: handles are `Rc`-based and a
//! context with its repositories lives on one thread.

pub mod condition;
pub mod context;
pub mod entity;
pub mod events;
pub mod finder;
pub mod mapper;
pub mod provider;
pub mod query;
pub mod record;
pub mod repository;
pub mod search_result;
pub mod settings;
pub mod test_helpers;
pub mod transaction;
pub mod value;

pub use condition::QueryConditionBuilder;
pub use context::{
    build_model_element_name, ComponentRole, ConfigurationError, DomainContext,
};
pub use entity::{DomainEntity, Entity, EntityRef};
pub use events::{EntityEvent, GateOutcome, LifecycleHook};
pub use finder::{Finder, FoundValue};
pub use mapper::{DataMapper, MappedValue};
pub use provider::EntitiesProvider;
pub use query::{
    CursorItem, IterationMode, QueryCursor, QueryError, QueryRef, QueryResult, RecordQuery,
};
pub use record::{ChangeSet, Record, RecordError, RecordRef, RecordValue};
pub use repository::{
    EntitiesRepository, RepositoryBuilder, RepositoryError, UnableToSaveEntity,
};
pub use search_result::{SearchItem, SearchResult};
pub use settings::RepositorySettings;
pub use transaction::{TransactionError, TransactionHandle, TransactionProvider};
pub use value::{loosely_equal, AttrMap, AttrValue};
