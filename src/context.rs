//! Domain context and component registry
//!
//! The context is the caller-owned registry that wires entity families
//! together: it maps component names to factories and repository names to
//! repository builders. There is no process-wide or static state; whoever
//! creates the context decides its lifetime, and everything resolved from it
//! stays inside that context.
//!
//! Naming-convention resolution is a *default provider* over this registry,
//! never an ad-hoc string lookup at call time: a repository named
//! `WidgetRepository` derives the component names `WidgetEntity`,
//! `WidgetRecord`, `WidgetQuery`, and `WidgetFinder` by substituting the
//! role word, then resolves them against the registry. Explicit factory
//! overrides on the repository always win over the convention.
//!
//! The context also caches one repository instance per registered name, so a
//! relation resolved deep inside a [`DataMapper`](crate::mapper::DataMapper)
//! reuses the same repository the application already holds. The cache is
//! `Rc`-based and single-threaded by design; it must not be shared across
//! threads.

use crate::entity::EntityRef;
use crate::finder::Finder;
use crate::mapper::DataMapper;
use crate::query::QueryRef;
use crate::record::RecordRef;
use crate::repository::EntitiesRepository;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// Builds a fresh record for an entity family.
pub type RecordFactory = Rc<dyn Fn() -> RecordRef>;

/// Wraps a mapper into that family's entity type.
pub type EntityFactory = Rc<dyn Fn(DataMapper) -> EntityRef>;

/// Builds a fresh query for an entity family.
pub type QueryFactory = Rc<dyn Fn() -> QueryRef>;

/// Builds a finder over a query and its owning repository.
pub type FinderFactory = Rc<dyn Fn(QueryRef, Rc<EntitiesRepository>) -> Finder>;

/// Builds a repository bound to the given context.
pub type RepositoryFactory = Rc<dyn Fn(&Rc<DomainContext>) -> EntitiesRepository>;

/// A required collaborator could not be resolved.
///
/// Raised when neither an explicit override nor the naming convention yields
/// a registered component. Fatal: configuration errors are never retried.
#[derive(Debug, Clone)]
pub struct ConfigurationError {
    message: String,
}

impl ConfigurationError {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl fmt::Display for ConfigurationError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "configuration error: {}", self.message)
    }
}

impl std::error::Error for ConfigurationError {}

/// The role a component plays inside an entity family.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ComponentRole {
    Entity,
    Record,
    Query,
    Finder,
}

impl ComponentRole {
    /// The role word substituted into the repository name.
    pub fn word(&self) -> &'static str {
        match self {
            ComponentRole::Entity => "Entity",
            ComponentRole::Record => "Record",
            ComponentRole::Query => "Query",
            ComponentRole::Finder => "Finder",
        }
    }
}

/// Derive a collaborator name from a repository name by role-word
/// substitution: `WidgetRepository` becomes `WidgetEntity`, `WidgetRecord`,
/// and so on.
///
/// A name without the word `Repository` comes back unchanged, which then
/// simply fails the registry lookup and falls through to the configured
/// default (or a [`ConfigurationError`]).
pub fn build_model_element_name(repository_name: &str, role: ComponentRole) -> String {
    repository_name.replace("Repository", role.word())
}

enum ComponentFactory {
    Record(RecordFactory),
    Entity(EntityFactory),
    Query(QueryFactory),
    Finder(FinderFactory),
}

/// Caller-owned registry of components and repositories.
///
/// Create one per application (or per test), register the entity families,
/// then hand `Rc<DomainContext>` to whatever needs to resolve repositories.
#[derive(Default)]
pub struct DomainContext {
    components: RefCell<HashMap<String, ComponentFactory>>,
    repository_factories: RefCell<HashMap<String, RepositoryFactory>>,
    repository_instances: RefCell<HashMap<String, Rc<EntitiesRepository>>>,
}

impl DomainContext {
    pub fn new() -> Rc<Self> {
        Rc::new(Self::default())
    }

    /// Register a record factory under a component name such as
    /// `WidgetRecord`.
    pub fn register_record<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> RecordRef + 'static,
    {
        self.components
            .borrow_mut()
            .insert(name.into(), ComponentFactory::Record(Rc::new(factory)));
    }

    /// Register an entity factory under a component name such as
    /// `WidgetEntity`.
    pub fn register_entity<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(DataMapper) -> EntityRef + 'static,
    {
        self.components
            .borrow_mut()
            .insert(name.into(), ComponentFactory::Entity(Rc::new(factory)));
    }

    /// Register a query factory under a component name such as
    /// `WidgetQuery`.
    pub fn register_query<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn() -> QueryRef + 'static,
    {
        self.components
            .borrow_mut()
            .insert(name.into(), ComponentFactory::Query(Rc::new(factory)));
    }

    /// Register a finder factory under a component name such as
    /// `WidgetFinder`.
    pub fn register_finder<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(QueryRef, Rc<EntitiesRepository>) -> Finder + 'static,
    {
        self.components
            .borrow_mut()
            .insert(name.into(), ComponentFactory::Finder(Rc::new(factory)));
    }

    /// Register a repository factory under its repository name.
    pub fn register_repository<F>(&self, name: impl Into<String>, factory: F)
    where
        F: Fn(&Rc<DomainContext>) -> EntitiesRepository + 'static,
    {
        self.repository_factories
            .borrow_mut()
            .insert(name.into(), Rc::new(factory));
    }

    /// Whether any component is registered under the given name.
    pub fn has_component(&self, name: &str) -> bool {
        self.components.borrow().contains_key(name)
    }

    pub fn record_factory(&self, name: &str) -> Option<RecordFactory> {
        match self.components.borrow().get(name) {
            Some(ComponentFactory::Record(f)) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn entity_factory(&self, name: &str) -> Option<EntityFactory> {
        match self.components.borrow().get(name) {
            Some(ComponentFactory::Entity(f)) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn query_factory(&self, name: &str) -> Option<QueryFactory> {
        match self.components.borrow().get(name) {
            Some(ComponentFactory::Query(f)) => Some(f.clone()),
            _ => None,
        }
    }

    pub fn finder_factory(&self, name: &str) -> Option<FinderFactory> {
        match self.components.borrow().get(name) {
            Some(ComponentFactory::Finder(f)) => Some(f.clone()),
            _ => None,
        }
    }

    /// Resolve a repository by name, building and caching it on first use.
    ///
    /// Every later call for the same name returns the identical instance.
    pub fn repository(
        self: &Rc<Self>,
        name: &str,
    ) -> Result<Rc<EntitiesRepository>, ConfigurationError> {
        if let Some(existing) = self.repository_instances.borrow().get(name) {
            return Ok(existing.clone());
        }
        let factory = self
            .repository_factories
            .borrow()
            .get(name)
            .cloned()
            .ok_or_else(|| {
                ConfigurationError::new(format!("repository '{name}' is not registered"))
            })?;
        let instance = Rc::new(factory(self));
        self.repository_instances
            .borrow_mut()
            .insert(name.to_string(), instance.clone());
        Ok(instance)
    }

    /// Resolve the repository responsible for a record type, by convention.
    ///
    /// `WidgetRecord` maps to the repository registered as
    /// `WidgetRepository`. A type without the word `Record`, or a derived
    /// name with no registration, resolves to `None`; callers treat that as
    /// "not resolvable", never as an error.
    pub fn repository_for_record_type(
        self: &Rc<Self>,
        record_type: &str,
    ) -> Option<Rc<EntitiesRepository>> {
        if !record_type.contains("Record") {
            return None;
        }
        let repository_name = record_type.replace("Record", "Repository");
        self.repository(&repository_name).ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_helpers::StubRecord;

    #[test]
    fn test_build_model_element_name() {
        assert_eq!(
            build_model_element_name("WidgetRepository", ComponentRole::Entity),
            "WidgetEntity"
        );
        assert_eq!(
            build_model_element_name("WidgetRepository", ComponentRole::Record),
            "WidgetRecord"
        );
        assert_eq!(
            build_model_element_name("WidgetRepository", ComponentRole::Query),
            "WidgetQuery"
        );
        assert_eq!(
            build_model_element_name("WidgetRepository", ComponentRole::Finder),
            "WidgetFinder"
        );
        // No role word to substitute: name passes through and fails lookup.
        assert_eq!(
            build_model_element_name("Oddball", ComponentRole::Entity),
            "Oddball"
        );
    }

    #[test]
    fn test_repository_instances_are_cached() {
        let context = DomainContext::new();
        context.register_repository("WidgetRepository", |ctx| {
            EntitiesRepository::builder("WidgetRepository", ctx.clone()).build()
        });

        let first = context.repository("WidgetRepository").unwrap();
        let second = context.repository("WidgetRepository").unwrap();
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_unregistered_repository_is_a_configuration_error() {
        let context = DomainContext::new();
        assert!(context.repository("GhostRepository").is_err());
    }

    #[test]
    fn test_record_type_convention() {
        let context = DomainContext::new();
        context.register_repository("WidgetRepository", |ctx| {
            EntitiesRepository::builder("WidgetRepository", ctx.clone()).build()
        });

        assert!(context.repository_for_record_type("WidgetRecord").is_some());
        // Type token without "Record" never resolves.
        assert!(context.repository_for_record_type("Widget").is_none());
        assert!(context.repository_for_record_type("GhostRecord").is_none());
    }

    #[test]
    fn test_typed_component_lookup() {
        let context = DomainContext::new();
        context.register_record("WidgetRecord", || StubRecord::shared("WidgetRecord"));

        assert!(context.has_component("WidgetRecord"));
        assert!(context.record_factory("WidgetRecord").is_some());
        // A record registration is not visible as another role.
        assert!(context.entity_factory("WidgetRecord").is_none());
        assert!(context.query_factory("WidgetRecord").is_none());
    }
}
