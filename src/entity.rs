//! Domain entity
//!
//! An entity is the storage-agnostic face of a record. It owns exactly one
//! [`DataMapper`], assigned at construction and never reassigned, and
//! forwards attribute traffic through it.
//!
//! Attribute resolution is two-tier: the entity's own declared schema is
//! consulted first, and only unrecognized names fall back to the mapper's
//! capability queries. Declared fields are therefore never shadowed by
//! record attributes of the same name.

use crate::mapper::{DataMapper, MappedValue};
use crate::value::{AttrMap, AttrValue};
use std::cell::RefCell;
use std::rc::Rc;

/// Shared handle to a domain entity.
pub type EntityRef = Rc<RefCell<dyn DomainEntity>>;

/// The domain entity contract.
///
/// Implementors provide mapper access and, optionally, a declared schema of
/// their own attributes plus a data-shape conversion hook for
/// [`DomainEntity::load`]. Everything else is provided behavior.
pub trait DomainEntity {
    fn data_mapper(&self) -> &DataMapper;

    fn data_mapper_mut(&mut self) -> &mut DataMapper;

    /// Whether the entity's own declared schema recognizes `name`.
    ///
    /// Default: nothing declared, every name falls through to the mapper.
    fn has_own_attribute(&self, _name: &str) -> bool {
        false
    }

    /// Read a declared attribute. Only consulted when
    /// [`DomainEntity::has_own_attribute`] answered `true`.
    fn get_own_attribute(&self, _name: &str) -> Option<AttrValue> {
        None
    }

    /// Write a declared attribute. Only consulted when
    /// [`DomainEntity::has_own_attribute`] answered `true`.
    fn set_own_attribute(&mut self, _name: &str, _value: &AttrValue) -> bool {
        false
    }

    /// Convert externally-shaped data into record attributes before a
    /// [`DomainEntity::load`]. Default: pass the data through unchanged.
    fn convert_data_to_source_attributes(&self, data: AttrMap) -> AttrMap {
        data
    }

    /// The entity identity: the mapper's record primary key.
    fn get_id(&self) -> AttrValue {
        self.data_mapper().primary_key()
    }

    fn is_new(&self) -> bool {
        self.data_mapper().is_record_new()
    }

    fn is_not_new(&self) -> bool {
        !self.is_new()
    }

    /// Whether the mapper can read the named attribute.
    fn has_attribute(&self, name: &str) -> bool {
        self.data_mapper().can_get(name)
    }

    /// Two-tier attribute read: own schema first, then the mapper.
    fn get_attribute(&mut self, name: &str) -> MappedValue {
        if self.has_own_attribute(name) {
            let value = self.get_own_attribute(name).unwrap_or(AttrValue::Null);
            return MappedValue::Value(value);
        }
        self.data_mapper_mut().get(name)
    }

    /// Two-tier attribute write: own schema first, then the mapper.
    ///
    /// Inherits the mapper's lenient write contract: an unrecognized,
    /// unwritable name is a no-op returning `false`.
    fn set_attribute(&mut self, name: &str, value: AttrValue) -> bool {
        if self.has_own_attribute(name) {
            return self.set_own_attribute(name, &value);
        }
        self.data_mapper_mut().set(name, value)
    }

    fn has_property(&self, name: &str) -> bool {
        self.has_own_attribute(name)
            || self.data_mapper().can_get(name)
            || self.data_mapper().can_set(name)
    }

    fn can_get_property(&self, name: &str) -> bool {
        self.has_own_attribute(name) || self.data_mapper().can_get(name)
    }

    fn can_set_property(&self, name: &str) -> bool {
        self.has_own_attribute(name) || self.data_mapper().can_set(name)
    }

    /// Populate the record through the conversion hook.
    fn load(&mut self, data: AttrMap) -> bool {
        let converted = self.convert_data_to_source_attributes(data);
        self.data_mapper_mut().load(&converted)
    }
}

/// Default entity: no declared schema, everything delegated to the mapper.
///
/// Entity families that need declared fields or load conversion implement
/// [`DomainEntity`] themselves and register their own entity factory.
pub struct Entity {
    mapper: DataMapper,
}

impl Entity {
    pub fn new(mapper: DataMapper) -> Self {
        Self { mapper }
    }

    /// Convenience constructor producing a shared handle.
    pub fn shared(mapper: DataMapper) -> EntityRef {
        Rc::new(RefCell::new(Self::new(mapper)))
    }
}

impl DomainEntity for Entity {
    fn data_mapper(&self) -> &DataMapper {
        &self.mapper
    }

    fn data_mapper_mut(&mut self) -> &mut DataMapper {
        &mut self.mapper
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::DomainContext;
    use crate::test_helpers::StubRecord;
    use serde_json::json;

    fn stub_mapper() -> DataMapper {
        let record = StubRecord::builder("WidgetRecord")
            .attribute("id", json!(5))
            .attribute("name", json!("widget"))
            .build_shared();
        DataMapper::new(record, DomainContext::new())
    }

    // Entity with one declared field that shadows a record attribute.
    struct TaggedEntity {
        mapper: DataMapper,
        tag: AttrValue,
    }

    impl DomainEntity for TaggedEntity {
        fn data_mapper(&self) -> &DataMapper {
            &self.mapper
        }

        fn data_mapper_mut(&mut self) -> &mut DataMapper {
            &mut self.mapper
        }

        fn has_own_attribute(&self, name: &str) -> bool {
            name == "name"
        }

        fn get_own_attribute(&self, name: &str) -> Option<AttrValue> {
            (name == "name").then(|| self.tag.clone())
        }

        fn set_own_attribute(&mut self, name: &str, value: &AttrValue) -> bool {
            if name == "name" {
                self.tag = value.clone();
                true
            } else {
                false
            }
        }

        fn convert_data_to_source_attributes(&self, data: AttrMap) -> AttrMap {
            // Accept externally-shaped keys prefixed with "form_".
            data.into_iter()
                .map(|(k, v)| (k.trim_start_matches("form_").to_string(), v))
                .collect()
        }
    }

    #[test]
    fn test_default_entity_delegates_to_mapper() {
        let mut entity = Entity::new(stub_mapper());
        assert_eq!(entity.get_id(), json!(5));
        assert!(entity.is_not_new() || entity.is_new());
        assert_eq!(entity.get_attribute("name").as_value(), Some(&json!("widget")));
        assert!(entity.set_attribute("name", json!("renamed")));
        assert_eq!(
            entity.get_attribute("name").as_value(),
            Some(&json!("renamed"))
        );
    }

    #[test]
    fn test_declared_field_is_never_shadowed_by_mapper() {
        let mut entity = TaggedEntity {
            mapper: stub_mapper(),
            tag: json!("declared"),
        };
        // The record also has a "name" attribute; the declared field wins.
        assert_eq!(
            entity.get_attribute("name").as_value(),
            Some(&json!("declared"))
        );
        assert!(entity.set_attribute("name", json!("updated")));
        assert_eq!(entity.tag, json!("updated"));
        // The record's attribute stayed untouched.
        assert_eq!(
            entity.data_mapper().attributes().get("name"),
            Some(&json!("widget"))
        );
    }

    #[test]
    fn test_property_checks_fall_back_to_mapper() {
        let entity = TaggedEntity {
            mapper: stub_mapper(),
            tag: json!(null),
        };
        assert!(entity.has_property("name"));
        assert!(entity.has_property("id"));
        assert!(!entity.has_property("ghost"));
        assert!(entity.can_get_property("id"));
        assert!(entity.can_set_property("id"));
        assert!(!entity.can_get_property("ghost"));
    }

    #[test]
    fn test_load_runs_conversion_hook() {
        let mut entity = TaggedEntity {
            mapper: stub_mapper(),
            tag: json!(null),
        };
        let mut data = AttrMap::new();
        data.insert("form_name".to_string(), json!("from form"));
        assert!(entity.load(data));
        assert_eq!(
            entity.data_mapper().attributes().get("name"),
            Some(&json!("from form"))
        );
    }

    #[test]
    fn test_unknown_attribute_write_is_lenient() {
        let mut entity = Entity::new(stub_mapper());
        assert!(!entity.set_attribute("ghost", json!(1)));
    }
}
