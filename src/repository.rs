//! Entities repository
//!
//! The repository orchestrates persistence for one entity family: it
//! resolves its collaborators (entity, record, query, finder) from the
//! domain context by naming convention or explicit override, runs the gated
//! save/delete state machine under an optional transaction, proxies change
//! tracking to the record, and manufactures entities, finders, and list
//! providers.
//!
//! Save state machine: clear errors, begin transaction (when enabled), gate
//! `before-add`/`before-update`, gate `before-save`, physical save, then on
//! success `after-add`/`after-update` and `after-save` plus commit, or on
//! failure rollback and an unable-to-save signal carrying the record's
//! validation errors. Delete and recover run the analogous single-gate
//! machine. Whether a failure is propagated or recorded into the error
//! accumulator is decided by the `throw_exceptions` flag, uniformly for the
//! transactional and non-transactional paths.

use crate::context::{
    build_model_element_name, ComponentRole, ConfigurationError, DomainContext, EntityFactory,
    FinderFactory, QueryFactory, RecordFactory,
};
use crate::entity::EntityRef;
use crate::events::{EntityEvent, GateOutcome, LifecycleHook};
use crate::finder::{Finder, FoundValue};
use crate::mapper::DataMapper;
use crate::provider::EntitiesProvider;
use crate::query::{QueryError, QueryRef};
use crate::record::{ChangeSet, RecordError, RecordRef};
use crate::search_result::SearchResult;
use crate::settings::RepositorySettings;
use crate::transaction::{TransactionError, TransactionHandle, TransactionProvider};
use crate::value::{loosely_equal, AttrMap, AttrValue};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Signal that a save, delete, or recover operation failed.
///
/// Carries the record's validation errors when the failure came from
/// validation; an empty list with a message when the storage layer errored
/// or a gate aborted.
#[derive(Debug, Clone)]
pub struct UnableToSaveEntity {
    pub message: String,
    pub errors_list: Vec<String>,
}

impl UnableToSaveEntity {
    fn from_record_error(error: RecordError) -> Self {
        Self {
            message: error.to_string(),
            errors_list: Vec::new(),
        }
    }

    fn save_failure(record: &RecordRef) -> Self {
        let record_type = record.borrow().record_type().to_string();
        Self {
            message: format!("failed to save entity backed by {record_type}"),
            errors_list: record.borrow().validation_errors(),
        }
    }

    fn delete_failure(record: &RecordRef) -> Self {
        let record_type = record.borrow().record_type().to_string();
        Self {
            message: format!("failed to delete entity backed by {record_type}"),
            errors_list: Vec::new(),
        }
    }

    fn recover_failure(record: &RecordRef) -> Self {
        let record_type = record.borrow().record_type().to_string();
        Self {
            message: format!("failed to recover entity backed by {record_type}"),
            errors_list: Vec::new(),
        }
    }
}

impl fmt::Display for UnableToSaveEntity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.errors_list.is_empty() {
            write!(f, "{}", self.message)
        } else {
            write!(f, "{}: {}", self.message, self.errors_list.join("; "))
        }
    }
}

impl std::error::Error for UnableToSaveEntity {}

/// Repository operation error.
///
/// Only [`RepositoryError::UnableToSave`] participates in the
/// strict/lenient policy; configuration and transaction-misuse errors are
/// fatal and always propagate.
#[derive(Debug)]
pub enum RepositoryError {
    /// A gated save/delete/recover failed.
    UnableToSave(UnableToSaveEntity),
    /// Transaction misuse or provider failure.
    Transaction(TransactionError),
    /// A required collaborator could not be resolved.
    Config(ConfigurationError),
    /// The underlying query failed.
    Query(QueryError),
    /// The record failed outside the gated state machine.
    Record(RecordError),
}

impl fmt::Display for RepositoryError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RepositoryError::UnableToSave(e) => write!(f, "{e}"),
            RepositoryError::Transaction(e) => write!(f, "{e}"),
            RepositoryError::Config(e) => write!(f, "{e}"),
            RepositoryError::Query(e) => write!(f, "{e}"),
            RepositoryError::Record(e) => write!(f, "{e}"),
        }
    }
}

impl std::error::Error for RepositoryError {}

impl From<UnableToSaveEntity> for RepositoryError {
    fn from(err: UnableToSaveEntity) -> Self {
        RepositoryError::UnableToSave(err)
    }
}

impl From<TransactionError> for RepositoryError {
    fn from(err: TransactionError) -> Self {
        RepositoryError::Transaction(err)
    }
}

impl From<ConfigurationError> for RepositoryError {
    fn from(err: ConfigurationError) -> Self {
        RepositoryError::Config(err)
    }
}

impl From<QueryError> for RepositoryError {
    fn from(err: QueryError) -> Self {
        RepositoryError::Query(err)
    }
}

impl From<RecordError> for RepositoryError {
    fn from(err: RecordError) -> Self {
        RepositoryError::Record(err)
    }
}

/// Repository of one entity family.
///
/// Stateless per invocation apart from the error accumulator, the open
/// transaction guard, and the collaborator factories resolved once and
/// cached for the repository's lifetime. Single-threaded by design.
pub struct EntitiesRepository {
    context: Rc<DomainContext>,
    class_name: String,
    use_transactions: bool,
    throw_exceptions: bool,
    default_batch_size: usize,
    transaction_provider: Option<Rc<dyn TransactionProvider>>,
    hooks: RefCell<Vec<Rc<dyn LifecycleHook>>>,
    errors: RefCell<Vec<String>>,
    transaction: RefCell<Option<Box<dyn TransactionHandle>>>,
    entity_factory: RefCell<Option<EntityFactory>>,
    record_factory: RefCell<Option<RecordFactory>>,
    query_factory: RefCell<Option<QueryFactory>>,
    finder_factory: RefCell<Option<FinderFactory>>,
    default_query_factory: Option<QueryFactory>,
    default_finder_factory: FinderFactory,
}

impl EntitiesRepository {
    /// Start configuring a repository named `class_name` (for example
    /// `WidgetRepository`) against the given context.
    pub fn builder(class_name: impl Into<String>, context: Rc<DomainContext>) -> RepositoryBuilder {
        RepositoryBuilder::new(class_name, context)
    }

    pub fn class_name(&self) -> &str {
        &self.class_name
    }

    pub fn context(&self) -> &Rc<DomainContext> {
        &self.context
    }

    /// The configured batch size for streamed iteration.
    pub fn default_batch_size(&self) -> usize {
        self.default_batch_size
    }

    /// Attach a lifecycle hook. Hooks run in attachment order.
    pub fn on(&self, hook: impl LifecycleHook + 'static) {
        self.hooks.borrow_mut().push(Rc::new(hook));
    }

    //region ------------------- entity manipulation -------------------

    /// Validate and save, under the gated, transactional state machine.
    ///
    /// Returns `Ok(true)` on success. On failure, lenient mode records the
    /// failure into the error accumulator and returns `Ok(false)`; strict
    /// mode (`throw_exceptions`) propagates it as
    /// [`RepositoryError::UnableToSave`]. `attributes` restricts the save
    /// to the listed attribute names.
    pub fn validate_and_save(
        &self,
        entity: &EntityRef,
        attributes: Option<&[String]>,
    ) -> Result<bool, RepositoryError> {
        self.clear_errors();
        self.run_gated(|repo| repo.save_entity_internal(entity, true, attributes))
    }

    /// Save skipping the record's validation. Same machine otherwise.
    pub fn save_without_validation(
        &self,
        entity: &EntityRef,
        attributes: Option<&[String]>,
    ) -> Result<bool, RepositoryError> {
        self.clear_errors();
        self.run_gated(|repo| repo.save_entity_internal(entity, false, attributes))
    }

    /// Delete under the single-gate state machine.
    ///
    /// `after-delete` fires only when the physical delete removed at least
    /// one row.
    pub fn delete(&self, entity: &EntityRef) -> Result<bool, RepositoryError> {
        self.clear_errors();
        self.run_gated(|repo| repo.delete_internal(entity))
    }

    /// Restore a soft-deleted entity through the record's recovery
    /// capability, re-using the delete gates.
    pub fn recover(&self, entity: &EntityRef) -> Result<bool, RepositoryError> {
        self.clear_errors();
        self.run_gated(|repo| repo.recover_internal(entity))
    }

    /// Run the record's validation without saving.
    pub fn validate(&self, entity: &EntityRef) -> Result<bool, RecordError> {
        let data_source = Self::data_source_of(entity);
        let result = data_source.borrow_mut().validate();
        result
    }

    /// Re-read the entity's record from storage, dropping cached relations.
    pub fn refresh(&self, entity: &EntityRef) -> Result<bool, RecordError> {
        entity.borrow_mut().data_mapper_mut().refresh()
    }

    fn run_gated<F>(&self, op: F) -> Result<bool, RepositoryError>
    where
        F: FnOnce(&Self) -> Result<bool, UnableToSaveEntity>,
    {
        let outcome = if self.uses_transactions() {
            self.begin_transaction()?;
            let outcome = op(self);
            match &outcome {
                Ok(_) => self.commit_transaction()?,
                Err(failure) => {
                    log::warn!("rolling back transaction in {}: {failure}", self.class_name);
                    self.rollback_transaction()?;
                }
            }
            outcome
        } else {
            op(self)
        };

        match outcome {
            Ok(result) => Ok(result),
            Err(failure) => self.settle_failure(failure),
        }
    }

    fn settle_failure(&self, failure: UnableToSaveEntity) -> Result<bool, RepositoryError> {
        if failure.errors_list.is_empty() {
            self.add_error(failure.message.clone());
        } else {
            for error in &failure.errors_list {
                self.add_error(error.clone());
            }
        }
        if self.throw_exceptions {
            Err(RepositoryError::UnableToSave(failure))
        } else {
            log::warn!("{}: {failure}", self.class_name);
            Ok(false)
        }
    }

    fn save_entity_internal(
        &self,
        entity: &EntityRef,
        run_validation: bool,
        attributes: Option<&[String]>,
    ) -> Result<bool, UnableToSaveEntity> {
        let is_entity_new = entity.borrow().is_new();
        let data_source = Self::data_source_of(entity);

        let first_gate = if is_entity_new {
            EntityEvent::BeforeAdd
        } else {
            EntityEvent::BeforeUpdate
        };
        // before-save never fires once the first gate aborted.
        let gates_passed = self.trigger_model_event(first_gate, entity)
            && self.trigger_model_event(EntityEvent::BeforeSave, entity);

        let saved = if gates_passed {
            let result = if run_validation {
                data_source.borrow_mut().validate_and_save(attributes)
            } else {
                data_source.borrow_mut().save_without_validation(attributes)
            };
            match result {
                Ok(saved) => saved,
                Err(error) => return Err(UnableToSaveEntity::from_record_error(error)),
            }
        } else {
            false
        };

        if saved {
            let after = if is_entity_new {
                EntityEvent::AfterAdd
            } else {
                EntityEvent::AfterUpdate
            };
            self.trigger_model_event(after, entity);
            self.trigger_model_event(EntityEvent::AfterSave, entity);
            log::debug!("{} saved entity {:?}", self.class_name, entity.borrow().get_id());
            Ok(true)
        } else {
            Err(UnableToSaveEntity::save_failure(&data_source))
        }
    }

    fn delete_internal(&self, entity: &EntityRef) -> Result<bool, UnableToSaveEntity> {
        let data_source = Self::data_source_of(entity);

        let deleted = if self.trigger_model_event(EntityEvent::BeforeDelete, entity) {
            let result = data_source.borrow_mut().delete_record();
            match result {
                Ok(rows) => rows > 0,
                Err(error) => return Err(UnableToSaveEntity::from_record_error(error)),
            }
        } else {
            false
        };

        if deleted {
            self.trigger_model_event(EntityEvent::AfterDelete, entity);
            Ok(true)
        } else {
            Err(UnableToSaveEntity::delete_failure(&data_source))
        }
    }

    fn recover_internal(&self, entity: &EntityRef) -> Result<bool, UnableToSaveEntity> {
        let data_source = Self::data_source_of(entity);

        let recovered = if self.trigger_model_event(EntityEvent::BeforeDelete, entity) {
            let supports = data_source.borrow().supports_recovery();
            if supports {
                let result = data_source.borrow_mut().restore();
                match result {
                    Ok(restored) => restored,
                    Err(error) => return Err(UnableToSaveEntity::from_record_error(error)),
                }
            } else {
                false
            }
        } else {
            false
        };

        if recovered {
            self.trigger_model_event(EntityEvent::AfterDelete, entity);
            Ok(true)
        } else {
            Err(UnableToSaveEntity::recover_failure(&data_source))
        }
    }

    /// Fire a lifecycle event at every attached hook, in order.
    ///
    /// Every hook sees the event even after an earlier abort; for gate
    /// events any single abort wins. The outcome of `after-*` events is
    /// ignored.
    fn trigger_model_event(&self, event: EntityEvent, entity: &EntityRef) -> bool {
        let hooks: Vec<_> = self.hooks.borrow().clone();
        let mut aborted = false;
        for hook in &hooks {
            if hook.handle(event, entity) == GateOutcome::Abort {
                aborted = true;
            }
        }
        let valid = !(aborted && event.is_gate());
        if !valid {
            log::debug!("{} aborted at {}", self.class_name, event.name());
        }
        valid
    }

    fn data_source_of(entity: &EntityRef) -> RecordRef {
        let data_source = entity.borrow().data_mapper().data_source();
        data_source
    }

    //endregion

    //region ------------------- transactions -------------------

    /// Whether saves and deletes run inside a transaction.
    ///
    /// True once transactions are enabled *and* a provider is configured;
    /// without a provider the repository runs non-transactionally.
    pub fn uses_transactions(&self) -> bool {
        self.use_transactions && self.transaction_provider.is_some()
    }

    fn begin_transaction(&self) -> Result<(), TransactionError> {
        let mut transaction = self.transaction.borrow_mut();
        if transaction.is_some() {
            return Err(TransactionError::AlreadyStarted(self.class_name.clone()));
        }
        let provider = self
            .transaction_provider
            .as_ref()
            .ok_or_else(|| TransactionError::NoProvider(self.class_name.clone()))?;
        *transaction = Some(provider.begin()?);
        Ok(())
    }

    fn commit_transaction(&self) -> Result<(), TransactionError> {
        let mut handle = self
            .transaction
            .borrow_mut()
            .take()
            .ok_or_else(|| TransactionError::NotStarted(self.class_name.clone()))?;
        handle.commit()
    }

    fn rollback_transaction(&self) -> Result<(), TransactionError> {
        let mut handle = self
            .transaction
            .borrow_mut()
            .take()
            .ok_or_else(|| TransactionError::NotStarted(self.class_name.clone()))?;
        handle.rollback()
    }

    /// Wrap an arbitrary operation in this repository's transaction guard:
    /// commit on `Ok`, roll back on `Err`.
    ///
    /// Calling a transactional save or delete from inside the callback is a
    /// programming error and fails with
    /// [`TransactionError::AlreadyStarted`].
    pub fn call_in_transaction<T>(
        &self,
        callback: impl FnOnce() -> Result<T, RepositoryError>,
    ) -> Result<T, RepositoryError> {
        self.begin_transaction()?;
        match callback() {
            Ok(value) => {
                self.commit_transaction()?;
                Ok(value)
            }
            Err(error) => {
                log::warn!("rolling back transaction in {}: {error}", self.class_name);
                self.rollback_transaction()?;
                Err(error)
            }
        }
    }

    //endregion

    //region ------------------- entity data -------------------

    pub fn is_just_added(&self, entity: &EntityRef) -> bool {
        Self::data_source_of(entity).borrow().is_just_added()
    }

    pub fn is_just_updated(&self, entity: &EntityRef) -> bool {
        !self.is_just_added(entity)
    }

    pub fn is_new_or_just_added(&self, entity: &EntityRef) -> bool {
        entity.borrow().is_new() || self.is_just_added(entity)
    }

    /// Attributes modified since load (pre-save dirty set).
    pub fn get_dirty_attributes(
        &self,
        entity: &EntityRef,
        names: Option<&[String]>,
    ) -> AttrMap {
        Self::data_source_of(entity).borrow().get_dirty_attributes(names)
    }

    pub fn get_old_attributes(&self, entity: &EntityRef) -> AttrMap {
        Self::data_source_of(entity).borrow().get_old_attributes()
    }

    pub fn get_old_attribute(&self, entity: &EntityRef, name: &str) -> Option<AttrValue> {
        Self::data_source_of(entity).borrow().get_old_attribute(name)
    }

    pub fn set_changed_attributes(&self, entity: &EntityRef, changed: ChangeSet) {
        Self::data_source_of(entity).borrow_mut().set_change_set(changed);
    }

    pub fn get_changed_attributes(&self, entity: &EntityRef) -> ChangeSet {
        Self::data_source_of(entity).borrow().change_set()
    }

    /// The pre-save value of an attribute changed by the last save.
    pub fn get_changed_attribute(&self, entity: &EntityRef, name: &str) -> Option<AttrValue> {
        Self::data_source_of(entity)
            .borrow()
            .change_set()
            .get_changed_attribute(name)
            .cloned()
    }

    /// Whether the last successful save touched the attribute.
    ///
    /// Presence check against the change set only; the written value may
    /// equal the old one.
    pub fn was_attribute_changed(&self, entity: &EntityRef, name: &str) -> bool {
        Self::data_source_of(entity)
            .borrow()
            .change_set()
            .was_attribute_changed(name)
    }

    /// Whether the attribute's *value* differs from what the last save
    /// recorded, compared under the crate's loose-numeric policy
    /// ([`loosely_equal`]).
    ///
    /// `false` when the attribute is not in the change set at all. A
    /// current value that is no longer a scalar counts as changed.
    pub fn was_attribute_value_changed(&self, entity: &EntityRef, name: &str) -> bool {
        let Some(old_value) = self.get_changed_attribute(entity, name) else {
            return false;
        };
        let current = entity.borrow_mut().get_attribute(name);
        match current.as_value() {
            Some(value) => !loosely_equal(&old_value, value),
            None => true,
        }
    }

    //endregion

    //region ------------------- instantiation -------------------

    /// Build a brand-new entity: fresh record, fresh mapper, resolved
    /// entity type.
    pub fn create_new_entity(&self) -> Result<EntityRef, ConfigurationError> {
        let record_factory = self.resolved_record_factory()?;
        self.create_entity_from_source(record_factory())
    }

    /// Wrap an already-populated record into an entity of this family.
    pub fn create_entity_from_source(
        &self,
        record: RecordRef,
    ) -> Result<EntityRef, ConfigurationError> {
        let entity_factory = self.resolved_entity_factory()?;
        let mapper = DataMapper::new(record, self.context.clone());
        Ok(entity_factory(mapper))
    }

    /// Build the finder for this family over a fresh query.
    pub fn find(self: &Rc<Self>) -> Result<Finder, RepositoryError> {
        let query = self.create_query()?;
        let finder_factory = self.resolved_finder_factory();
        Ok(finder_factory(query, self.clone()))
    }

    /// Build a fresh query through the resolved query factory.
    pub fn create_query(&self) -> Result<QueryRef, ConfigurationError> {
        Ok((self.resolved_query_factory()?)())
    }

    /// Build a paged list provider over a fresh query.
    pub fn entities_provider(self: &Rc<Self>) -> Result<EntitiesProvider, RepositoryError> {
        Ok(EntitiesProvider::new(self.create_query()?, self.clone()))
    }

    pub fn find_one_with_pk(
        self: &Rc<Self>,
        pk: &AttrValue,
    ) -> Result<Option<FoundValue>, RepositoryError> {
        self.find()?.one_with_pk(pk)
    }

    pub fn find_all(self: &Rc<Self>) -> Result<Vec<FoundValue>, RepositoryError> {
        self.find()?.all()
    }

    /// Streamed iteration over the whole family, one entity per step.
    pub fn each(self: &Rc<Self>, batch_size: usize) -> Result<SearchResult, RepositoryError> {
        Ok(self.find()?.each(batch_size))
    }

    /// Batched iteration over the whole family, one page per step.
    pub fn batch(self: &Rc<Self>, batch_size: usize) -> Result<SearchResult, RepositoryError> {
        Ok(self.find()?.batch(batch_size))
    }

    //endregion

    //region ------------------- component resolution -------------------

    /// Resolve the component name for a role, without building anything.
    ///
    /// Returns the convention-derived name when the registry knows it.
    /// Unregistered query/finder roles fall back to the built-in defaults,
    /// reported under their conventional names (`RecordQuery`, `Finder`);
    /// an unregistered entity or record role is a configuration error.
    pub fn component_name(&self, role: ComponentRole) -> Result<String, ConfigurationError> {
        let derived = build_model_element_name(&self.class_name, role);
        if self.context.has_component(&derived) {
            return Ok(derived);
        }
        match role {
            ComponentRole::Finder => Ok("Finder".to_string()),
            ComponentRole::Query if self.default_query_factory.is_some() => {
                Ok("RecordQuery".to_string())
            }
            _ => Err(ConfigurationError::new(format!(
                "{} component '{derived}' should be registered for repository '{}'",
                role.word(),
                self.class_name
            ))),
        }
    }

    fn resolved_entity_factory(&self) -> Result<EntityFactory, ConfigurationError> {
        if let Some(factory) = self.entity_factory.borrow().as_ref() {
            return Ok(factory.clone());
        }
        let name = build_model_element_name(&self.class_name, ComponentRole::Entity);
        let factory = self.context.entity_factory(&name).ok_or_else(|| {
            ConfigurationError::new(format!(
                "Entity component '{name}' should be registered for repository '{}'",
                self.class_name
            ))
        })?;
        *self.entity_factory.borrow_mut() = Some(factory.clone());
        Ok(factory)
    }

    fn resolved_record_factory(&self) -> Result<RecordFactory, ConfigurationError> {
        if let Some(factory) = self.record_factory.borrow().as_ref() {
            return Ok(factory.clone());
        }
        let name = build_model_element_name(&self.class_name, ComponentRole::Record);
        let factory = self.context.record_factory(&name).ok_or_else(|| {
            ConfigurationError::new(format!(
                "Record component '{name}' should be registered for repository '{}'",
                self.class_name
            ))
        })?;
        *self.record_factory.borrow_mut() = Some(factory.clone());
        Ok(factory)
    }

    fn resolved_query_factory(&self) -> Result<QueryFactory, ConfigurationError> {
        if let Some(factory) = self.query_factory.borrow().as_ref() {
            return Ok(factory.clone());
        }
        let name = build_model_element_name(&self.class_name, ComponentRole::Query);
        let factory = match self.context.query_factory(&name) {
            Some(factory) => factory,
            None => self.default_query_factory.clone().ok_or_else(|| {
                ConfigurationError::new(format!(
                    "Query component '{name}' is not registered and no default query \
                     factory is configured for repository '{}'",
                    self.class_name
                ))
            })?,
        };
        *self.query_factory.borrow_mut() = Some(factory.clone());
        Ok(factory)
    }

    fn resolved_finder_factory(&self) -> FinderFactory {
        if let Some(factory) = self.finder_factory.borrow().as_ref() {
            return factory.clone();
        }
        let name = build_model_element_name(&self.class_name, ComponentRole::Finder);
        let factory = self
            .context
            .finder_factory(&name)
            .unwrap_or_else(|| self.default_finder_factory.clone());
        *self.finder_factory.borrow_mut() = Some(factory.clone());
        factory
    }

    //endregion

    //region ------------------- errors -------------------

    /// Errors accumulated by the last lenient-mode operation.
    pub fn get_errors(&self) -> Vec<String> {
        self.errors.borrow().clone()
    }

    pub fn set_errors(&self, errors: Vec<String>) {
        *self.errors.borrow_mut() = errors;
    }

    pub fn add_error(&self, error: impl Into<String>) {
        self.errors.borrow_mut().push(error.into());
    }

    pub fn clear_errors(&self) {
        self.errors.borrow_mut().clear();
    }

    //endregion
}

/// Configures and builds an [`EntitiesRepository`].
///
/// Every factory setter is an explicit override that wins over the naming
/// convention for its role.
pub struct RepositoryBuilder {
    context: Rc<DomainContext>,
    class_name: String,
    use_transactions: bool,
    throw_exceptions: bool,
    default_batch_size: usize,
    transaction_provider: Option<Rc<dyn TransactionProvider>>,
    hooks: Vec<Rc<dyn LifecycleHook>>,
    entity_factory: Option<EntityFactory>,
    record_factory: Option<RecordFactory>,
    query_factory: Option<QueryFactory>,
    finder_factory: Option<FinderFactory>,
    default_query_factory: Option<QueryFactory>,
    default_finder_factory: FinderFactory,
}

impl RepositoryBuilder {
    pub fn new(class_name: impl Into<String>, context: Rc<DomainContext>) -> Self {
        Self {
            context,
            class_name: class_name.into(),
            use_transactions: true,
            throw_exceptions: false,
            default_batch_size: 100,
            transaction_provider: None,
            hooks: Vec::new(),
            entity_factory: None,
            record_factory: None,
            query_factory: None,
            finder_factory: None,
            default_query_factory: None,
            default_finder_factory: Rc::new(Finder::new),
        }
    }

    /// Apply loaded settings (transactions, strictness, batch size).
    pub fn settings(mut self, settings: &RepositorySettings) -> Self {
        self.use_transactions = settings.use_transactions;
        self.throw_exceptions = settings.throw_exceptions;
        self.default_batch_size = settings.default_batch_size;
        self
    }

    pub fn use_transactions(mut self, use_transactions: bool) -> Self {
        self.use_transactions = use_transactions;
        self
    }

    /// Strict mode: propagate unable-to-save failures instead of recording
    /// them.
    pub fn throw_exceptions(mut self, throw_exceptions: bool) -> Self {
        self.throw_exceptions = throw_exceptions;
        self
    }

    pub fn default_batch_size(mut self, batch_size: usize) -> Self {
        self.default_batch_size = batch_size;
        self
    }

    pub fn transaction_provider(mut self, provider: Rc<dyn TransactionProvider>) -> Self {
        self.transaction_provider = Some(provider);
        self
    }

    pub fn hook(mut self, hook: impl LifecycleHook + 'static) -> Self {
        self.hooks.push(Rc::new(hook));
        self
    }

    /// Override the entity factory, short-circuiting the convention.
    pub fn entity_factory(mut self, factory: impl Fn(DataMapper) -> EntityRef + 'static) -> Self {
        self.entity_factory = Some(Rc::new(factory));
        self
    }

    /// Override the record factory, short-circuiting the convention.
    pub fn record_factory(mut self, factory: impl Fn() -> RecordRef + 'static) -> Self {
        self.record_factory = Some(Rc::new(factory));
        self
    }

    /// Override the query factory, short-circuiting the convention.
    pub fn query_factory(mut self, factory: impl Fn() -> QueryRef + 'static) -> Self {
        self.query_factory = Some(Rc::new(factory));
        self
    }

    /// Override the finder factory, short-circuiting the convention.
    pub fn finder_factory(
        mut self,
        factory: impl Fn(QueryRef, Rc<EntitiesRepository>) -> Finder + 'static,
    ) -> Self {
        self.finder_factory = Some(Rc::new(factory));
        self
    }

    /// Fallback query factory used when the convention resolves nothing.
    pub fn default_query_factory(mut self, factory: impl Fn() -> QueryRef + 'static) -> Self {
        self.default_query_factory = Some(Rc::new(factory));
        self
    }

    /// Fallback finder factory. Defaults to the crate's [`Finder`].
    pub fn default_finder_factory(
        mut self,
        factory: impl Fn(QueryRef, Rc<EntitiesRepository>) -> Finder + 'static,
    ) -> Self {
        self.default_finder_factory = Rc::new(factory);
        self
    }

    pub fn build(self) -> EntitiesRepository {
        EntitiesRepository {
            context: self.context,
            class_name: self.class_name,
            use_transactions: self.use_transactions,
            throw_exceptions: self.throw_exceptions,
            default_batch_size: self.default_batch_size,
            transaction_provider: self.transaction_provider,
            hooks: RefCell::new(self.hooks),
            errors: RefCell::new(Vec::new()),
            transaction: RefCell::new(None),
            entity_factory: RefCell::new(self.entity_factory),
            record_factory: RefCell::new(self.record_factory),
            query_factory: RefCell::new(self.query_factory),
            finder_factory: RefCell::new(self.finder_factory),
            default_query_factory: self.default_query_factory,
            default_finder_factory: self.default_finder_factory,
        }
    }
}
