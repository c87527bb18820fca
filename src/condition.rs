//! Collision-free condition naming
//!
//! Composable condition helpers all pull their field references and bind
//! parameter names from one [`QueryConditionBuilder`] owned by the query, so
//! the same helper can run any number of times (an `OR` chain over one field,
//! a self-join, a repeated scope) without two bind parameters colliding.

use std::collections::HashMap;

/// Generates table-alias-qualified field names and unique bind parameter
/// names for one query.
///
/// Field references come out as `[[alias]].[[field]]`, leaving the final
/// quoting to the storage engine. Parameter names are scoped by alias: the
/// first request for a scope yields `:{alias}_{param}` unsuffixed, and every
/// later request for the same scope appends a strictly increasing `_1`,
/// `_2`, ... suffix.
#[derive(Debug, Default)]
pub struct QueryConditionBuilder {
    default_alias: String,
    param_name_counters: HashMap<String, u32>,
}

impl QueryConditionBuilder {
    /// Create a builder whose default alias is the owning query's alias.
    pub fn new(default_alias: impl Into<String>) -> Self {
        Self {
            default_alias: default_alias.into(),
            param_name_counters: HashMap::new(),
        }
    }

    /// Keep the default alias in sync when the owning query is re-aliased.
    pub fn set_default_alias(&mut self, alias: impl Into<String>) {
        self.default_alias = alias.into();
    }

    pub fn default_alias(&self) -> &str {
        &self.default_alias
    }

    /// Build an alias-qualified field reference.
    ///
    /// Uses the builder's default alias unless an explicit one is given.
    pub fn build_aliased_name_of_field(&self, field: &str, alias: Option<&str>) -> String {
        let alias = alias.unwrap_or(&self.default_alias);
        format!("[[{alias}]].[[{field}]]")
    }

    /// Build a unique bind parameter name scoped to `{alias}_{param}`.
    pub fn build_aliased_name_of_param(&mut self, param: &str, alias: Option<&str>) -> String {
        let alias = alias.unwrap_or(&self.default_alias);
        let param_name = format!(":{alias}_{param}");
        match self.param_name_counters.get_mut(&param_name) {
            Some(counter) => {
                *counter += 1;
                format!("{param_name}_{counter}")
            }
            None => {
                self.param_name_counters.insert(param_name.clone(), 0);
                param_name
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_field_uses_default_alias() {
        let builder = QueryConditionBuilder::new("users");
        assert_eq!(
            builder.build_aliased_name_of_field("name", None),
            "[[users]].[[name]]"
        );
    }

    #[test]
    fn test_field_explicit_alias_wins() {
        let builder = QueryConditionBuilder::new("users");
        assert_eq!(
            builder.build_aliased_name_of_field("name", Some("u2")),
            "[[u2]].[[name]]"
        );
    }

    #[test]
    fn test_param_names_never_collide() {
        // First request is unsuffixed, the i-th gets suffix i-1.
        let mut builder = QueryConditionBuilder::new("t");
        assert_eq!(builder.build_aliased_name_of_param("status", None), ":t_status");
        assert_eq!(builder.build_aliased_name_of_param("status", None), ":t_status_1");
        assert_eq!(builder.build_aliased_name_of_param("status", None), ":t_status_2");
        assert_eq!(builder.build_aliased_name_of_param("status", None), ":t_status_3");
    }

    #[test]
    fn test_param_scopes_are_independent() {
        let mut builder = QueryConditionBuilder::new("t");
        assert_eq!(builder.build_aliased_name_of_param("a", None), ":t_a");
        assert_eq!(builder.build_aliased_name_of_param("a", Some("other")), ":other_a");
        // The explicit-alias request did not advance the default scope.
        assert_eq!(builder.build_aliased_name_of_param("a", None), ":t_a_1");
    }
}
