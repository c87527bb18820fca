//! Record contract
//!
//! A record is the storage-bound half of the mapping: it knows how to
//! validate, save, delete, and refresh itself against whatever engine backs
//! it. This crate never implements a record; it consumes one through the
//! [`Record`] trait and routes all entity attribute traffic through it.
//!
//! Records are shared, not copied. A [`DataMapper`](crate::mapper::DataMapper)
//! holds an `Rc` to the record it wraps, and relation accessors may hand out
//! further records that get wrapped by other mappers.

use crate::value::{AttrMap, AttrValue};
use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Shared handle to a storage-bound record.
pub type RecordRef = Rc<RefCell<dyn Record>>;

/// Error reported by a record while talking to its storage engine.
///
/// Validation failures are not errors: they surface as `Ok(false)` from the
/// save methods, with the details available through
/// [`Record::validation_errors`].
#[derive(Debug, Clone)]
pub enum RecordError {
    /// The storage engine failed to execute the operation.
    Storage(String),
    /// The row was modified concurrently (optimistic-lock conflict).
    Stale(String),
    /// The record does not implement the requested optional capability.
    Unsupported(String),
}

impl fmt::Display for RecordError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordError::Storage(s) => write!(f, "storage error: {s}"),
            RecordError::Stale(s) => write!(f, "stale record: {s}"),
            RecordError::Unsupported(s) => write!(f, "unsupported operation: {s}"),
        }
    }
}

impl std::error::Error for RecordError {}

/// A raw value read from a record property.
///
/// Relation accessors return whole records rather than scalar values, so a
/// property read distinguishes the three shapes the mapper needs to route:
/// a plain value, a single related record, or a homogeneous list of related
/// records. A heterogeneous or empty list never takes the record shapes; it
/// stays a plain [`RecordValue::Value`] and passes through unconverted.
#[derive(Clone)]
pub enum RecordValue {
    /// A scalar or document value.
    Value(AttrValue),
    /// A single related record (has-one / belongs-to style relation).
    Record(RecordRef),
    /// A non-empty homogeneous list of related records (has-many relation).
    Records(Vec<RecordRef>),
}

impl fmt::Debug for RecordValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordValue::Value(v) => f.debug_tuple("Value").field(v).finish(),
            RecordValue::Record(_) => f.write_str("Record(..)"),
            RecordValue::Records(list) => write!(f, "Records(len={})", list.len()),
        }
    }
}

/// Attribute changes captured by the most recent successful save.
///
/// Maps attribute name to the value it held *before* the save. The set is
/// valid only until the next save replaces it wholesale.
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    changed: AttrMap,
}

impl ChangeSet {
    /// An empty change set (no save happened yet).
    pub fn new() -> Self {
        Self::default()
    }

    /// Build a change set from an attribute-name to old-value map.
    pub fn from_map(changed: AttrMap) -> Self {
        Self { changed }
    }

    /// Whether the named attribute was touched by the last save.
    ///
    /// Presence check only; the old value may equal the current one.
    pub fn was_attribute_changed(&self, name: &str) -> bool {
        self.changed.contains_key(name)
    }

    /// The pre-save value of the named attribute, if it was changed.
    pub fn get_changed_attribute(&self, name: &str) -> Option<&AttrValue> {
        self.changed.get(name)
    }

    /// All changed attributes with their pre-save values.
    pub fn attributes(&self) -> &AttrMap {
        &self.changed
    }

    pub fn is_empty(&self) -> bool {
        self.changed.is_empty()
    }
}

/// The persistence contract a storage engine must satisfy.
///
/// Everything the repository and mapper layers do ultimately lands on one of
/// these methods. The contract mirrors an active-record style object:
/// attribute get/set with capability queries, dirty tracking before a save,
/// a change set after a save, and validate/save/delete/refresh operations.
pub trait Record {
    /// Stable type token for this record, used by naming-convention lookup.
    ///
    /// For a record named `WidgetRecord` the convention derives the
    /// repository registered as `WidgetRepository`.
    fn record_type(&self) -> &str;

    /// All scalar attributes as a name to value map.
    fn attributes(&self) -> AttrMap;

    /// Read a scalar attribute. `None` when the record has no such attribute.
    fn get_attribute(&self, name: &str) -> Option<AttrValue>;

    /// Read a raw property, which may be a scalar or a relation.
    fn get_property(&self, name: &str) -> Option<RecordValue>;

    /// Write an attribute. Returns `false` when the property is not writable.
    fn set_property(&mut self, name: &str, value: AttrValue) -> bool;

    fn can_get_property(&self, name: &str) -> bool;

    fn can_set_property(&self, name: &str) -> bool;

    /// Primary key value. `Null` while the record was never saved.
    fn primary_key(&self) -> AttrValue;

    /// Whether the record was never persisted.
    fn is_new(&self) -> bool;

    fn is_not_new(&self) -> bool {
        !self.is_new()
    }

    /// Run validation without saving. `Ok(false)` means invalid.
    fn validate(&mut self) -> Result<bool, RecordError>;

    /// Validate, then insert or update depending on [`Record::is_new`].
    ///
    /// `Ok(false)` means validation rejected the record; the reasons are
    /// available via [`Record::validation_errors`]. `attribute_names`
    /// restricts the save to the listed attributes when given.
    fn validate_and_save(&mut self, attribute_names: Option<&[String]>)
        -> Result<bool, RecordError>;

    /// Insert or update without running validation first.
    fn save_without_validation(
        &mut self,
        attribute_names: Option<&[String]>,
    ) -> Result<bool, RecordError>;

    /// Delete the backing row. `Ok(0)` is a failed delete: no row was
    /// removed, and the repository will not fire `after-delete` for it.
    fn delete_record(&mut self) -> Result<u64, RecordError>;

    /// Validation errors gathered by the last validate/save attempt.
    fn validation_errors(&self) -> Vec<String>;

    /// Attributes modified since load, as name to *current* value.
    fn get_dirty_attributes(&self, names: Option<&[String]>) -> AttrMap;

    /// Attribute values as loaded from storage.
    fn get_old_attributes(&self) -> AttrMap;

    fn get_old_attribute(&self, name: &str) -> Option<AttrValue>;

    /// Whether the last successful save was an insert.
    fn is_just_added(&self) -> bool;

    /// The change set captured by the last successful save.
    fn change_set(&self) -> ChangeSet;

    /// Replace the captured change set.
    fn set_change_set(&mut self, change_set: ChangeSet);

    /// Re-read the record from storage. `Ok(false)` when the row is gone.
    fn refresh(&mut self) -> Result<bool, RecordError>;

    /// Bulk-populate safe attributes. Returns whether anything was loaded.
    fn load(&mut self, data: &AttrMap) -> bool;

    /// Whether the record can restore a soft-deleted row.
    fn supports_recovery(&self) -> bool {
        false
    }

    /// Restore a soft-deleted row. Only meaningful when
    /// [`Record::supports_recovery`] is `true`.
    fn restore(&mut self) -> Result<bool, RecordError> {
        Err(RecordError::Unsupported(format!(
            "record '{}' does not support recovery",
            self.record_type()
        )))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_change_set_presence_vs_value() {
        let mut map = AttrMap::new();
        map.insert("name".to_string(), json!("old"));
        map.insert("age".to_string(), json!(null));
        let set = ChangeSet::from_map(map);

        assert!(set.was_attribute_changed("name"));
        // Presence check holds even when the old value was null.
        assert!(set.was_attribute_changed("age"));
        assert!(!set.was_attribute_changed("email"));
        assert_eq!(set.get_changed_attribute("name"), Some(&json!("old")));
        assert_eq!(set.get_changed_attribute("email"), None);
    }

    #[test]
    fn test_empty_change_set() {
        let set = ChangeSet::new();
        assert!(set.is_empty());
        assert!(!set.was_attribute_changed("anything"));
    }
}
