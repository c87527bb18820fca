//! Data mapper
//!
//! The mapper is the indirection layer between exactly one entity and
//! exactly one record. Attribute reads and writes pass straight through;
//! record-valued reads (relations) are resolved into entities through the
//! repository registered for the related record's type, and the resolution
//! is cached per mapper instance so repeated reads of the same relation hand
//! back the identical entity objects until [`DataMapper::refresh`] clears
//! the cache.

use crate::context::DomainContext;
use crate::entity::EntityRef;
use crate::record::{RecordError, RecordRef, RecordValue};
use crate::repository::EntitiesRepository;
use crate::value::{AttrMap, AttrValue};
use std::collections::HashMap;
use std::fmt;
use std::rc::Rc;

/// A value read through a mapper.
///
/// Relation properties whose record type resolves to a registered
/// repository come back as entities; unresolvable relations keep their raw
/// record shape instead of erroring, so optional relation resolution never
/// breaks plain attribute access.
#[derive(Clone)]
pub enum MappedValue {
    /// A scalar or document value. Unreadable properties read as `Null`.
    Value(AttrValue),
    /// A resolved to-one relation.
    Entity(EntityRef),
    /// A resolved to-many relation.
    Entities(Vec<EntityRef>),
    /// An unresolvable to-one relation, left as the raw record.
    Record(RecordRef),
    /// An unresolvable to-many relation, left as the raw records.
    Records(Vec<RecordRef>),
}

impl MappedValue {
    /// The scalar value, when this is the scalar shape.
    pub fn as_value(&self) -> Option<&AttrValue> {
        match self {
            MappedValue::Value(v) => Some(v),
            _ => None,
        }
    }

    /// The resolved entity, when this is a to-one relation.
    pub fn as_entity(&self) -> Option<&EntityRef> {
        match self {
            MappedValue::Entity(e) => Some(e),
            _ => None,
        }
    }

    pub fn is_null(&self) -> bool {
        matches!(self, MappedValue::Value(AttrValue::Null))
    }
}

impl fmt::Debug for MappedValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MappedValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            MappedValue::Entity(_) => f.write_str("Entity(..)"),
            MappedValue::Entities(list) => write!(f, "Entities(len={})", list.len()),
            MappedValue::Record(_) => f.write_str("Record(..)"),
            MappedValue::Records(list) => write!(f, "Records(len={})", list.len()),
        }
    }
}

#[derive(Clone)]
enum ResolvedRelation {
    One(EntityRef),
    Many(Vec<EntityRef>),
}

impl ResolvedRelation {
    fn to_mapped(&self) -> MappedValue {
        match self {
            ResolvedRelation::One(entity) => MappedValue::Entity(entity.clone()),
            ResolvedRelation::Many(entities) => MappedValue::Entities(entities.clone()),
        }
    }
}

/// Routes attribute access between one entity and one record.
///
/// The record is shared, not copied; the mapper's relation cache is
/// instance-local and populated at most once per property until
/// [`DataMapper::refresh`].
pub struct DataMapper {
    data_source: RecordRef,
    context: Rc<DomainContext>,
    related_entities: HashMap<String, ResolvedRelation>,
}

impl DataMapper {
    pub fn new(data_source: RecordRef, context: Rc<DomainContext>) -> Self {
        Self {
            data_source,
            context,
            related_entities: HashMap::new(),
        }
    }

    /// Whether the wrapped record can answer a read for `name`.
    pub fn can_get(&self, name: &str) -> bool {
        self.data_source.borrow().can_get_property(name)
    }

    /// Whether the wrapped record accepts a write for `name`.
    pub fn can_set(&self, name: &str) -> bool {
        self.data_source.borrow().can_set_property(name)
    }

    /// The wrapped record.
    pub fn data_source(&self) -> RecordRef {
        self.data_source.clone()
    }

    pub fn context(&self) -> &Rc<DomainContext> {
        &self.context
    }

    /// Read a property, resolving relations through the context.
    ///
    /// Cached resolutions win; otherwise the raw record value is read and,
    /// when it is a record or a non-empty list of records whose type maps to
    /// a registered repository, converted to entities and cached. Anything
    /// else passes through unmodified. Unreadable names read as `Null`.
    pub fn get(&mut self, name: &str) -> MappedValue {
        if let Some(resolved) = self.related_entities.get(name) {
            return resolved.to_mapped();
        }
        self.property_from_data_source(name)
    }

    fn property_from_data_source(&mut self, name: &str) -> MappedValue {
        let raw = if self.can_get(name) {
            self.data_source.borrow().get_property(name)
        } else {
            None
        };

        match raw {
            None => MappedValue::Value(AttrValue::Null),
            Some(RecordValue::Value(value)) => MappedValue::Value(value),
            Some(RecordValue::Record(record)) => match self.resolve_one(&record) {
                Some(entity) => {
                    self.related_entities
                        .insert(name.to_string(), ResolvedRelation::One(entity.clone()));
                    MappedValue::Entity(entity)
                }
                None => MappedValue::Record(record),
            },
            Some(RecordValue::Records(records)) if !records.is_empty() => {
                match self.resolve_many(&records) {
                    Some(entities) => {
                        self.related_entities
                            .insert(name.to_string(), ResolvedRelation::Many(entities.clone()));
                        MappedValue::Entities(entities)
                    }
                    None => MappedValue::Records(records),
                }
            }
            Some(RecordValue::Records(records)) => MappedValue::Records(records),
        }
    }

    fn resolve_one(&self, record: &RecordRef) -> Option<EntityRef> {
        let repository = self.find_repository_for_record(record)?;
        match repository.create_entity_from_source(record.clone()) {
            Ok(entity) => Some(entity),
            Err(err) => {
                log::debug!("relation left unresolved: {err}");
                None
            }
        }
    }

    fn resolve_many(&self, records: &[RecordRef]) -> Option<Vec<EntityRef>> {
        let repository = self.find_repository_for_record(&records[0])?;
        let mut entities = Vec::with_capacity(records.len());
        for record in records {
            match repository.create_entity_from_source(record.clone()) {
                Ok(entity) => entities.push(entity),
                Err(err) => {
                    log::debug!("relation left unresolved: {err}");
                    return None;
                }
            }
        }
        Some(entities)
    }

    fn find_repository_for_record(&self, record: &RecordRef) -> Option<Rc<EntitiesRepository>> {
        let record_type = record.borrow().record_type().to_string();
        self.context.repository_for_record_type(&record_type)
    }

    /// Write through to the record.
    ///
    /// Deliberately lenient: a write the record rejects is a no-op returning
    /// `false`, not an error.
    pub fn set(&mut self, name: &str, value: AttrValue) -> bool {
        if self.can_set(name) {
            self.data_source.borrow_mut().set_property(name, value)
        } else {
            false
        }
    }

    /// Whether the property currently holds a non-null value.
    pub fn is_property_set(&self, name: &str) -> bool {
        match self.data_source.borrow().get_property(name) {
            Some(RecordValue::Value(AttrValue::Null)) | None => false,
            Some(_) => true,
        }
    }

    /// Clear the relation cache, then refresh the record from storage.
    pub fn refresh(&mut self) -> Result<bool, RecordError> {
        self.related_entities.clear();
        self.data_source.borrow_mut().refresh()
    }

    /// Bulk-populate the record's safe attributes.
    pub fn load(&mut self, data: &AttrMap) -> bool {
        self.data_source.borrow_mut().load(data)
    }

    pub fn primary_key(&self) -> AttrValue {
        self.data_source.borrow().primary_key()
    }

    pub fn attributes(&self) -> AttrMap {
        self.data_source.borrow().attributes()
    }

    pub fn is_record_new(&self) -> bool {
        self.data_source.borrow().is_new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::EntitiesRepository;
    use crate::test_helpers::{widget_context, StubRecord};
    use serde_json::json;

    fn mapper_with_relation() -> DataMapper {
        let context = widget_context();
        let record = StubRecord::builder("WidgetRecord")
            .attribute("id", json!(1))
            .relation("owner", StubRecord::shared("WidgetRecord"))
            .relation_many(
                "parts",
                vec![
                    StubRecord::shared("WidgetRecord"),
                    StubRecord::shared("WidgetRecord"),
                ],
            )
            .build_shared();
        DataMapper::new(record, context)
    }

    #[test]
    fn test_scalar_read_passes_through() {
        let mut mapper = mapper_with_relation();
        assert_eq!(mapper.get("id").as_value(), Some(&json!(1)));
    }

    #[test]
    fn test_unreadable_property_reads_as_null() {
        let mut mapper = mapper_with_relation();
        assert!(mapper.get("no_such_attribute").is_null());
    }

    #[test]
    fn test_relation_resolves_to_entity_and_is_cached() {
        let mut mapper = mapper_with_relation();

        let first = match mapper.get("owner") {
            MappedValue::Entity(e) => e,
            other => panic!("expected entity, got {other:?}"),
        };
        let second = match mapper.get("owner") {
            MappedValue::Entity(e) => e,
            other => panic!("expected entity, got {other:?}"),
        };
        // Identical object both times, not merely an equal one.
        assert!(Rc::ptr_eq(&first, &second));
    }

    #[test]
    fn test_relation_list_resolves_element_wise() {
        let mut mapper = mapper_with_relation();

        let first = match mapper.get("parts") {
            MappedValue::Entities(list) => list,
            other => panic!("expected entities, got {other:?}"),
        };
        assert_eq!(first.len(), 2);

        let second = match mapper.get("parts") {
            MappedValue::Entities(list) => list,
            other => panic!("expected entities, got {other:?}"),
        };
        for (a, b) in first.iter().zip(second.iter()) {
            assert!(Rc::ptr_eq(a, b));
        }
    }

    #[test]
    fn test_refresh_invalidates_relation_cache() {
        let mut mapper = mapper_with_relation();

        let before = match mapper.get("owner") {
            MappedValue::Entity(e) => e,
            other => panic!("expected entity, got {other:?}"),
        };
        mapper.refresh().unwrap();
        let after = match mapper.get("owner") {
            MappedValue::Entity(e) => e,
            other => panic!("expected entity, got {other:?}"),
        };
        // A fresh resolution happened: different object, same data.
        assert!(!Rc::ptr_eq(&before, &after));
    }

    #[test]
    fn test_unresolvable_relation_stays_raw() {
        // No repository is registered for OrphanRecord: resolution degrades
        // to the raw record value, never an error.
        let context = DomainContext::new();
        let record = StubRecord::builder("WidgetRecord")
            .relation("orphan", StubRecord::shared("OrphanRecord"))
            .build_shared();
        let mut mapper = DataMapper::new(record, context);

        assert!(matches!(mapper.get("orphan"), MappedValue::Record(_)));
    }

    #[test]
    fn test_empty_relation_list_passes_raw() {
        let context = widget_context();
        let record = StubRecord::builder("WidgetRecord")
            .relation_many("parts", vec![])
            .build_shared();
        let mut mapper = DataMapper::new(record, context);

        match mapper.get("parts") {
            MappedValue::Records(list) => assert!(list.is_empty()),
            other => panic!("expected raw records, got {other:?}"),
        }
    }

    #[test]
    fn test_set_is_lenient() {
        let mut mapper = mapper_with_relation();
        assert!(mapper.set("id", json!(2)));
        // Unknown property: silent no-op, not an error.
        assert!(!mapper.set("no_such_attribute", json!(1)));
        assert_eq!(mapper.get("id").as_value(), Some(&json!(2)));
    }

    #[test]
    fn test_relation_resolution_reuses_context_repository() {
        let context = widget_context();
        let repository = context.repository("WidgetRepository").unwrap();
        let record = StubRecord::builder("WidgetRecord")
            .relation("owner", StubRecord::shared("WidgetRecord"))
            .build_shared();
        let mut mapper = DataMapper::new(record, context.clone());
        mapper.get("owner");

        // The mapper resolved through the cached instance, not a new one.
        let again = context.repository("WidgetRepository").unwrap();
        assert!(Rc::ptr_eq(&repository, &again));
        let _ = repository as Rc<EntitiesRepository>;
    }
}
