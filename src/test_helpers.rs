//! Test doubles
//!
//! In-memory stand-ins for the storage-engine contracts: a scriptable
//! record, a query serving canned results, a journaling transaction
//! provider, and an event-recording hook. Used by the crate's own tests and
//! available to downstream crates for testing their domain wiring without a
//! storage engine.

use crate::condition::QueryConditionBuilder;
use crate::entity::{Entity, EntityRef};
use crate::events::{EntityEvent, GateOutcome, LifecycleHook};
use crate::query::{
    CursorItem, IterationMode, QueryCursor, QueryError, QueryResult, RecordQuery,
};
use crate::record::{ChangeSet, Record, RecordError, RecordRef, RecordValue};
use crate::repository::EntitiesRepository;
use crate::transaction::{TransactionError, TransactionHandle, TransactionProvider};
use crate::value::{AttrMap, AttrValue};
use crate::DomainContext;
use std::cell::RefCell;
use std::collections::HashMap;
use std::rc::Rc;

/// What a scripted save attempt should do.
#[derive(Clone)]
pub enum SaveOutcome {
    /// Save succeeds and the record captures its change set.
    Success,
    /// Validation rejects the record with these errors. A save skipping
    /// validation still succeeds.
    Invalid(Vec<String>),
    /// The storage engine fails.
    Fail(String),
}

/// What a scripted delete attempt should do.
#[derive(Clone)]
pub enum DeleteOutcome {
    /// One row removed.
    Deleted,
    /// No row removed (`Ok(0)`).
    Noop,
    /// The storage engine fails.
    Fail(String),
}

/// Scriptable in-memory record.
///
/// Attributes and relations are fixed at build time; save, delete, and
/// restore follow the scripted outcomes. Every storage-facing call is
/// appended to the shared journal, so tests can assert what the repository
/// actually invoked.
pub struct StubRecord {
    record_type: String,
    attributes: AttrMap,
    old_attributes: AttrMap,
    relations: HashMap<String, RecordValue>,
    is_new: bool,
    just_added: bool,
    save_outcome: SaveOutcome,
    delete_outcome: DeleteOutcome,
    supports_recovery: bool,
    validation_errors: Vec<String>,
    change_set: ChangeSet,
    journal: Rc<RefCell<Vec<String>>>,
}

impl StubRecord {
    pub fn builder(record_type: impl Into<String>) -> StubRecordBuilder {
        StubRecordBuilder::new(record_type)
    }

    /// A minimal shared record of the given type, with no attributes.
    pub fn shared(record_type: impl Into<String>) -> RecordRef {
        Self::builder(record_type).build_shared()
    }

    fn perform_save(&mut self) {
        let mut changed = AttrMap::new();
        for (name, value) in &self.attributes {
            match self.old_attributes.get(name) {
                Some(old) if old == value => {}
                Some(old) => {
                    changed.insert(name.clone(), old.clone());
                }
                None => {
                    changed.insert(name.clone(), AttrValue::Null);
                }
            }
        }
        self.change_set = ChangeSet::from_map(changed);
        self.just_added = self.is_new;
        self.is_new = false;
        self.old_attributes = self.attributes.clone();
    }
}

impl Record for StubRecord {
    fn record_type(&self) -> &str {
        &self.record_type
    }

    fn attributes(&self) -> AttrMap {
        self.attributes.clone()
    }

    fn get_attribute(&self, name: &str) -> Option<AttrValue> {
        self.attributes.get(name).cloned()
    }

    fn get_property(&self, name: &str) -> Option<RecordValue> {
        if let Some(relation) = self.relations.get(name) {
            return Some(relation.clone());
        }
        self.attributes.get(name).cloned().map(RecordValue::Value)
    }

    fn set_property(&mut self, name: &str, value: AttrValue) -> bool {
        self.attributes.insert(name.to_string(), value);
        true
    }

    fn can_get_property(&self, name: &str) -> bool {
        self.attributes.contains_key(name) || self.relations.contains_key(name)
    }

    fn can_set_property(&self, name: &str) -> bool {
        self.attributes.contains_key(name)
    }

    fn primary_key(&self) -> AttrValue {
        self.attributes
            .get("id")
            .cloned()
            .unwrap_or(AttrValue::Null)
    }

    fn is_new(&self) -> bool {
        self.is_new
    }

    fn validate(&mut self) -> Result<bool, RecordError> {
        self.journal.borrow_mut().push("validate".to_string());
        match &self.save_outcome {
            SaveOutcome::Invalid(errors) => {
                self.validation_errors = errors.clone();
                Ok(false)
            }
            _ => {
                self.validation_errors.clear();
                Ok(true)
            }
        }
    }

    fn validate_and_save(
        &mut self,
        _attribute_names: Option<&[String]>,
    ) -> Result<bool, RecordError> {
        self.journal
            .borrow_mut()
            .push("validate_and_save".to_string());
        match self.save_outcome.clone() {
            SaveOutcome::Success => {
                self.perform_save();
                Ok(true)
            }
            SaveOutcome::Invalid(errors) => {
                self.validation_errors = errors;
                Ok(false)
            }
            SaveOutcome::Fail(message) => Err(RecordError::Storage(message)),
        }
    }

    fn save_without_validation(
        &mut self,
        _attribute_names: Option<&[String]>,
    ) -> Result<bool, RecordError> {
        self.journal
            .borrow_mut()
            .push("save_without_validation".to_string());
        match self.save_outcome.clone() {
            // Skipping validation saves even an invalid record.
            SaveOutcome::Success | SaveOutcome::Invalid(_) => {
                self.perform_save();
                Ok(true)
            }
            SaveOutcome::Fail(message) => Err(RecordError::Storage(message)),
        }
    }

    fn delete_record(&mut self) -> Result<u64, RecordError> {
        self.journal.borrow_mut().push("delete".to_string());
        match self.delete_outcome.clone() {
            DeleteOutcome::Deleted => Ok(1),
            DeleteOutcome::Noop => Ok(0),
            DeleteOutcome::Fail(message) => Err(RecordError::Storage(message)),
        }
    }

    fn validation_errors(&self) -> Vec<String> {
        self.validation_errors.clone()
    }

    fn get_dirty_attributes(&self, names: Option<&[String]>) -> AttrMap {
        self.attributes
            .iter()
            .filter(|(name, value)| self.old_attributes.get(*name) != Some(*value))
            .filter(|(name, _)| names.map_or(true, |list| list.contains(*name)))
            .map(|(name, value)| (name.clone(), value.clone()))
            .collect()
    }

    fn get_old_attributes(&self) -> AttrMap {
        self.old_attributes.clone()
    }

    fn get_old_attribute(&self, name: &str) -> Option<AttrValue> {
        self.old_attributes.get(name).cloned()
    }

    fn is_just_added(&self) -> bool {
        self.just_added
    }

    fn change_set(&self) -> ChangeSet {
        self.change_set.clone()
    }

    fn set_change_set(&mut self, change_set: ChangeSet) {
        self.change_set = change_set;
    }

    fn refresh(&mut self) -> Result<bool, RecordError> {
        self.journal.borrow_mut().push("refresh".to_string());
        Ok(true)
    }

    fn load(&mut self, data: &AttrMap) -> bool {
        for (name, value) in data {
            self.attributes.insert(name.clone(), value.clone());
        }
        !data.is_empty()
    }

    fn supports_recovery(&self) -> bool {
        self.supports_recovery
    }

    fn restore(&mut self) -> Result<bool, RecordError> {
        self.journal.borrow_mut().push("restore".to_string());
        if self.supports_recovery {
            Ok(true)
        } else {
            Err(RecordError::Unsupported(format!(
                "record '{}' does not support recovery",
                self.record_type
            )))
        }
    }
}

pub struct StubRecordBuilder {
    record: StubRecord,
}

impl StubRecordBuilder {
    fn new(record_type: impl Into<String>) -> Self {
        Self {
            record: StubRecord {
                record_type: record_type.into(),
                attributes: AttrMap::new(),
                old_attributes: AttrMap::new(),
                relations: HashMap::new(),
                is_new: false,
                just_added: false,
                save_outcome: SaveOutcome::Success,
                delete_outcome: DeleteOutcome::Deleted,
                supports_recovery: false,
                validation_errors: Vec::new(),
                change_set: ChangeSet::new(),
                journal: Rc::new(RefCell::new(Vec::new())),
            },
        }
    }

    pub fn attribute(mut self, name: impl Into<String>, value: AttrValue) -> Self {
        let name = name.into();
        self.record.old_attributes.insert(name.clone(), value.clone());
        self.record.attributes.insert(name, value);
        self
    }

    /// A to-one relation property.
    pub fn relation(mut self, name: impl Into<String>, record: RecordRef) -> Self {
        self.record
            .relations
            .insert(name.into(), RecordValue::Record(record));
        self
    }

    /// A to-many relation property.
    pub fn relation_many(mut self, name: impl Into<String>, records: Vec<RecordRef>) -> Self {
        self.record
            .relations
            .insert(name.into(), RecordValue::Records(records));
        self
    }

    pub fn is_new(mut self, is_new: bool) -> Self {
        self.record.is_new = is_new;
        self
    }

    pub fn save_outcome(mut self, outcome: SaveOutcome) -> Self {
        self.record.save_outcome = outcome;
        self
    }

    pub fn delete_outcome(mut self, outcome: DeleteOutcome) -> Self {
        self.record.delete_outcome = outcome;
        self
    }

    pub fn supports_recovery(mut self, supports: bool) -> Self {
        self.record.supports_recovery = supports;
        self
    }

    /// Share a journal so the test can assert which storage calls ran.
    pub fn journal(mut self, journal: Rc<RefCell<Vec<String>>>) -> Self {
        self.record.journal = journal;
        self
    }

    pub fn build(self) -> StubRecord {
        self.record
    }

    pub fn build_shared(self) -> RecordRef {
        Rc::new(RefCell::new(self.record))
    }
}

/// In-memory query serving canned results.
///
/// Records every condition string for assertions, honors the primary-key
/// shortcut by filtering on any bound parameter named `*_pk*`, and applies
/// limit/offset and projection mode the way an engine query would.
pub struct StubQuery {
    table: String,
    alias: String,
    builder: QueryConditionBuilder,
    results: Vec<QueryResult>,
    conditions: Vec<String>,
    params: Vec<(String, AttrValue)>,
    as_array: bool,
    limit: Option<u64>,
    offset: Option<u64>,
    order: Vec<String>,
}

impl StubQuery {
    pub fn new(table: impl Into<String>, results: Vec<QueryResult>) -> Self {
        let table = table.into();
        let builder = QueryConditionBuilder::new(table.clone());
        Self {
            alias: table.clone(),
            table,
            builder,
            results,
            conditions: Vec::new(),
            params: Vec::new(),
            as_array: false,
            limit: None,
            offset: None,
            order: Vec::new(),
        }
    }

    /// Convenience: a query over record results.
    pub fn with_records(table: impl Into<String>, records: Vec<RecordRef>) -> Self {
        Self::new(
            table,
            records.into_iter().map(QueryResult::Record).collect(),
        )
    }

    /// Every condition string accumulated so far.
    pub fn conditions(&self) -> Vec<String> {
        self.conditions.clone()
    }

    /// Every bound parameter accumulated so far.
    pub fn params(&self) -> Vec<(String, AttrValue)> {
        self.params.clone()
    }

    pub fn order(&self) -> Vec<String> {
        self.order.clone()
    }

    fn filtered(&self) -> Vec<QueryResult> {
        let pk_filter = self
            .params
            .iter()
            .rev()
            .find(|(name, _)| name.contains("_pk"))
            .map(|(_, value)| value.clone());

        let mut rows: Vec<QueryResult> = self
            .results
            .iter()
            .filter(|result| match (&pk_filter, result) {
                (Some(pk), QueryResult::Record(record)) => record.borrow().primary_key() == *pk,
                _ => true,
            })
            .cloned()
            .collect();

        if let Some(offset) = self.offset {
            rows = rows.split_off((offset as usize).min(rows.len()));
        }
        if let Some(limit) = self.limit {
            rows.truncate(limit as usize);
        }
        if self.as_array {
            rows = rows
                .into_iter()
                .map(|result| match result {
                    QueryResult::Record(record) => {
                        let attrs = record.borrow().attributes();
                        QueryResult::Row(AttrValue::Object(attrs.into_iter().collect()))
                    }
                    row => row,
                })
                .collect();
        }
        rows
    }
}

impl RecordQuery for StubQuery {
    fn alias(&self) -> String {
        self.alias.clone()
    }

    fn set_alias(&mut self, alias: &str) {
        self.alias = alias.to_string();
        self.builder.set_default_alias(alias);
    }

    fn main_table_name(&self) -> String {
        self.table.clone()
    }

    fn condition_builder(&mut self) -> &mut QueryConditionBuilder {
        &mut self.builder
    }

    fn and_where(&mut self, condition: &str, params: Vec<(String, AttrValue)>) {
        self.conditions.push(condition.to_string());
        self.params.extend(params);
    }

    fn or_where(&mut self, condition: &str, params: Vec<(String, AttrValue)>) {
        self.conditions.push(format!("OR {condition}"));
        self.params.extend(params);
    }

    fn order_by(&mut self, field: &str, descending: bool) {
        let direction = if descending { "DESC" } else { "ASC" };
        self.order.push(format!("{field} {direction}"));
    }

    fn limit(&mut self, limit: u64) {
        self.limit = Some(limit);
    }

    fn offset(&mut self, offset: u64) {
        self.offset = Some(offset);
    }

    fn as_array(&mut self, as_array: bool) {
        self.as_array = as_array;
    }

    fn count(&mut self) -> Result<u64, QueryError> {
        Ok(self.filtered().len() as u64)
    }

    fn all(&mut self) -> Result<Vec<QueryResult>, QueryError> {
        Ok(self.filtered())
    }

    fn one(&mut self) -> Result<Option<QueryResult>, QueryError> {
        Ok(self.filtered().into_iter().next())
    }

    fn each(&mut self, _batch_size: usize) -> Box<dyn QueryCursor> {
        let items = self
            .filtered()
            .into_iter()
            .map(CursorItem::One)
            .collect();
        Box::new(StubCursor::new(IterationMode::Streamed, items))
    }

    fn batch(&mut self, batch_size: usize) -> Box<dyn QueryCursor> {
        let rows = self.filtered();
        let items = rows
            .chunks(batch_size.max(1))
            .map(|chunk| CursorItem::Page(chunk.to_vec()))
            .collect();
        Box::new(StubCursor::new(IterationMode::Batched, items))
    }
}

/// In-memory cursor over pre-materialized items.
pub struct StubCursor {
    mode: IterationMode,
    items: Vec<CursorItem>,
    position: usize,
}

impl StubCursor {
    pub fn new(mode: IterationMode, items: Vec<CursorItem>) -> Self {
        Self {
            mode,
            items,
            position: 0,
        }
    }
}

impl QueryCursor for StubCursor {
    fn mode(&self) -> IterationMode {
        self.mode
    }

    fn rewind(&mut self) {
        self.position = 0;
    }

    fn valid(&self) -> bool {
        self.position < self.items.len()
    }

    fn current(&self) -> Option<CursorItem> {
        self.items.get(self.position).cloned()
    }

    fn next(&mut self) {
        self.position += 1;
    }

    fn key(&self) -> usize {
        self.position
    }
}

/// Journaling transaction provider.
///
/// Appends `begin`, `commit`, and `rollback` to a shared journal so tests
/// can assert the exact transaction choreography of an operation.
#[derive(Default)]
pub struct StubTransactionProvider {
    journal: Rc<RefCell<Vec<String>>>,
    fail_begin: bool,
}

impl StubTransactionProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn failing_to_begin() -> Self {
        Self {
            journal: Rc::new(RefCell::new(Vec::new())),
            fail_begin: true,
        }
    }

    pub fn journal(&self) -> Vec<String> {
        self.journal.borrow().clone()
    }
}

impl TransactionProvider for StubTransactionProvider {
    fn begin(&self) -> Result<Box<dyn TransactionHandle>, TransactionError> {
        if self.fail_begin {
            return Err(TransactionError::Provider("begin refused".to_string()));
        }
        self.journal.borrow_mut().push("begin".to_string());
        Ok(Box::new(StubTransactionHandle {
            journal: self.journal.clone(),
            closed: false,
        }))
    }
}

struct StubTransactionHandle {
    journal: Rc<RefCell<Vec<String>>>,
    closed: bool,
}

impl TransactionHandle for StubTransactionHandle {
    fn commit(&mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        self.closed = true;
        self.journal.borrow_mut().push("commit".to_string());
        Ok(())
    }

    fn rollback(&mut self) -> Result<(), TransactionError> {
        if self.closed {
            return Err(TransactionError::TransactionClosed);
        }
        self.closed = true;
        self.journal.borrow_mut().push("rollback".to_string());
        Ok(())
    }
}

/// Hook recording every event name it sees, optionally aborting one gate.
pub struct RecordingHook {
    log: Rc<RefCell<Vec<String>>>,
    abort_on: Option<EntityEvent>,
}

impl RecordingHook {
    pub fn new(log: Rc<RefCell<Vec<String>>>) -> Self {
        Self {
            log,
            abort_on: None,
        }
    }

    pub fn aborting_on(log: Rc<RefCell<Vec<String>>>, event: EntityEvent) -> Self {
        Self {
            log,
            abort_on: Some(event),
        }
    }
}

impl LifecycleHook for RecordingHook {
    fn handle(&self, event: EntityEvent, _entity: &EntityRef) -> GateOutcome {
        self.log.borrow_mut().push(event.name().to_string());
        if self.abort_on == Some(event) {
            GateOutcome::Abort
        } else {
            GateOutcome::Continue
        }
    }
}

/// A context with the `Widget` family registered: default entity, stub
/// record, and a plain repository under `WidgetRepository`.
pub fn widget_context() -> Rc<DomainContext> {
    let context = DomainContext::new();
    context.register_record("WidgetRecord", || StubRecord::shared("WidgetRecord"));
    context.register_entity("WidgetEntity", Entity::shared);
    context.register_repository("WidgetRepository", |ctx| {
        EntitiesRepository::builder("WidgetRepository", ctx.clone())
            .use_transactions(false)
            .build()
    });
    context
}
