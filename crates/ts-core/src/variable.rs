use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::TaskScriptError;

/// Recognized property keys per variant. Anything else falls through to the
/// variant's default access, which is not an error.
pub const BASIC_KEYS: &[&str] = &["type"];
pub const TABLE_KEYS: &[&str] = &["rows", "cols", "columns", "type"];
pub const DICTIONARY_KEYS: &[&str] = &["count", "type"];
pub const LIST_KEYS: &[&str] = &[
    "count", "index", "tojson", "topipe", "first", "last", "type",
];

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataTable {
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl DataTable {
    pub fn new(columns: Vec<String>) -> Self {
        Self {
            columns,
            rows: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum VariableValue {
    Basic(String),
    Table(DataTable),
    Dictionary(IndexMap<String, String>),
    List(Vec<String>),
}

impl VariableValue {
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Basic(_) => "BASIC",
            Self::Table(_) => "DATATABLE",
            Self::Dictionary(_) => "DICTIONARY",
            Self::List(_) => "LIST",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScriptVariable {
    pub name: String,
    pub value: VariableValue,
    /// Iteration position for table/dictionary/list values. Never persisted.
    #[serde(skip)]
    pub cursor: usize,
}

impl ScriptVariable {
    pub fn new(name: impl Into<String>, value: VariableValue) -> Self {
        Self {
            name: name.into(),
            value,
            cursor: 0,
        }
    }

    pub fn query(&self, key: &str) -> Result<String, TaskScriptError> {
        self.query_at(key, None)
    }

    /// Property query with an optional caller-provided cursor overriding the
    /// stored one.
    pub fn query_at(
        &self,
        key: &str,
        cursor: Option<usize>,
    ) -> Result<String, TaskScriptError> {
        let cursor = cursor.unwrap_or(self.cursor);
        let normalized = key.to_ascii_lowercase();

        match &self.value {
            VariableValue::Basic(value) => match normalized.as_str() {
                "type" => Ok("BASIC".to_string()),
                _ => Ok(value.clone()),
            },
            VariableValue::Table(table) => match normalized.as_str() {
                "rows" => Ok(table.rows.len().to_string()),
                "cols" | "columns" => Ok(table.columns.len().to_string()),
                "type" => Ok("DATATABLE".to_string()),
                _ => {
                    let row = table.rows.get(cursor).ok_or_else(|| {
                        self.cursor_error(cursor, table.rows.len())
                    })?;
                    encode_json(row)
                }
            },
            VariableValue::Dictionary(entries) => match normalized.as_str() {
                "count" => Ok(entries.len().to_string()),
                "type" => Ok("DICTIONARY".to_string()),
                _ => entries
                    .get_index(cursor)
                    .map(|(_, value)| value.clone())
                    .ok_or_else(|| self.cursor_error(cursor, entries.len())),
            },
            VariableValue::List(items) => match normalized.as_str() {
                "count" => Ok(items.len().to_string()),
                "index" => Ok(cursor.to_string()),
                "tojson" => encode_json(items),
                "topipe" => Ok(items.join("|")),
                "first" => Ok(items.first().cloned().unwrap_or_default()),
                "last" => items
                    .last()
                    .cloned()
                    .ok_or_else(|| self.cursor_error(0, 0)),
                "type" => Ok("LIST".to_string()),
                _ => items
                    .get(cursor)
                    .cloned()
                    .ok_or_else(|| self.cursor_error(cursor, items.len())),
            },
        }
    }

    fn cursor_error(&self, cursor: usize, len: usize) -> TaskScriptError {
        TaskScriptError::new(
            "VAR_CURSOR_RANGE",
            format!(
                "Cursor {} is out of range for variable \"{}\" with {} element(s).",
                cursor, self.name, len
            ),
        )
    }
}

fn encode_json<T: Serialize>(value: &T) -> Result<String, TaskScriptError> {
    serde_json::to_string(value)
        .map_err(|error| TaskScriptError::new("VAR_JSON_ENCODE", error.to_string()))
}

/// Named, insertion-ordered variable container owned by one execution
/// context. Entries are created on first write and live until the session
/// ends; there is no deletion primitive.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct VariableStore {
    entries: IndexMap<String, ScriptVariable>,
}

impl VariableStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, name: impl Into<String>, value: VariableValue) {
        let name = name.into();
        match self.entries.get_mut(&name) {
            Some(existing) => existing.value = value,
            None => {
                let variable = ScriptVariable::new(name.clone(), value);
                self.entries.insert(name, variable);
            }
        }
    }

    pub fn get(&self, name: &str) -> Option<&ScriptVariable> {
        self.entries.get(name)
    }

    pub fn get_mut(&mut self, name: &str) -> Option<&mut ScriptVariable> {
        self.entries.get_mut(name)
    }

    pub fn set_cursor(&mut self, name: &str, cursor: usize) -> Result<(), TaskScriptError> {
        let variable = self.entries.get_mut(name).ok_or_else(|| missing(name))?;
        variable.cursor = cursor;
        Ok(())
    }

    pub fn query(&self, name: &str, key: &str) -> Result<String, TaskScriptError> {
        self.entries
            .get(name)
            .ok_or_else(|| missing(name))?
            .query(key)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ScriptVariable> {
        self.entries.values()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn missing(name: &str) -> TaskScriptError {
    TaskScriptError::new(
        "VAR_NOT_FOUND",
        format!("Variable \"{}\" is not defined.", name),
    )
}

#[cfg(test)]
mod variable_tests {
    use super::*;

    fn list_variable() -> ScriptVariable {
        ScriptVariable::new(
            "letters",
            VariableValue::List(vec![
                "x".to_string(),
                "y".to_string(),
                "z".to_string(),
            ]),
        )
    }

    #[test]
    fn basic_value_answers_type_and_falls_back_to_its_value() {
        let variable =
            ScriptVariable::new("greeting", VariableValue::Basic("hello".to_string()));
        assert_eq!(variable.query("type").expect("type"), "BASIC");
        assert_eq!(variable.query("TYPE").expect("upper type"), "BASIC");
        assert_eq!(variable.query("anything").expect("default"), "hello");
        assert_eq!(variable.query("").expect("empty key"), "hello");
    }

    #[test]
    fn list_properties_cover_count_first_last_and_json_forms() {
        let variable = list_variable();
        assert_eq!(variable.query("count").expect("count"), "3");
        assert_eq!(variable.query("first").expect("first"), "x");
        assert_eq!(variable.query("last").expect("last"), "z");
        assert_eq!(variable.query("Last").expect("mixed case last"), "z");
        assert_eq!(variable.query("index").expect("index"), "0");
        assert_eq!(
            variable.query("tojson").expect("tojson"),
            r#"["x","y","z"]"#
        );
        assert_eq!(variable.query("topipe").expect("topipe"), "x|y|z");
        assert_eq!(variable.query("type").expect("type"), "LIST");
    }

    #[test]
    fn list_default_access_honors_cursor_and_rejects_out_of_range() {
        let mut variable = list_variable();
        assert_eq!(variable.query("current").expect("cursor 0"), "x");

        variable.cursor = 2;
        assert_eq!(variable.query("current").expect("cursor 2"), "z");

        let error = variable
            .query_at("current", Some(5))
            .expect_err("cursor 5 should fail");
        assert_eq!(error.code, "VAR_CURSOR_RANGE");
    }

    #[test]
    fn table_properties_report_shape_and_encode_current_row() {
        let mut table = DataTable::new(vec!["name".to_string(), "age".to_string()]);
        table.rows.push(vec!["ada".to_string(), "36".to_string()]);
        table.rows.push(vec!["alan".to_string(), "41".to_string()]);
        let mut variable = ScriptVariable::new("people", VariableValue::Table(table));

        assert_eq!(variable.query("rows").expect("rows"), "2");
        assert_eq!(variable.query("cols").expect("cols"), "2");
        assert_eq!(variable.query("Columns").expect("columns alias"), "2");
        assert_eq!(variable.query("type").expect("type"), "DATATABLE");
        assert_eq!(variable.query("row").expect("default"), r#"["ada","36"]"#);

        variable.cursor = 1;
        assert_eq!(variable.query("row").expect("cursor row"), r#"["alan","41"]"#);

        variable.cursor = 9;
        let error = variable.query("row").expect_err("row 9 should fail");
        assert_eq!(error.code, "VAR_CURSOR_RANGE");
    }

    #[test]
    fn dictionary_properties_use_insertion_order_for_default_access() {
        let mut entries = IndexMap::new();
        entries.insert("first".to_string(), "1".to_string());
        entries.insert("second".to_string(), "2".to_string());
        let mut variable =
            ScriptVariable::new("pairs", VariableValue::Dictionary(entries));

        assert_eq!(variable.query("count").expect("count"), "2");
        assert_eq!(variable.query("type").expect("type"), "DICTIONARY");
        assert_eq!(variable.query("value").expect("position 0"), "1");

        variable.cursor = 1;
        assert_eq!(variable.query("value").expect("position 1"), "2");
    }

    #[test]
    fn every_recognized_key_answers_without_a_cursor() {
        // The key tables are the contract: each listed key must resolve even
        // when the cursor would be out of range for default access.
        let basic = ScriptVariable::new("b", VariableValue::Basic("v".to_string()));
        for key in BASIC_KEYS {
            basic.query(key).expect("basic key should resolve");
        }

        let table = ScriptVariable::new(
            "t",
            VariableValue::Table(DataTable::new(vec!["c".to_string()])),
        );
        for key in TABLE_KEYS {
            table.query(key).expect("table key should resolve");
        }

        let mut entries = IndexMap::new();
        entries.insert("k".to_string(), "v".to_string());
        let dictionary = ScriptVariable::new("d", VariableValue::Dictionary(entries));
        for key in DICTIONARY_KEYS {
            dictionary.query(key).expect("dictionary key should resolve");
        }

        let list = list_variable();
        for key in LIST_KEYS {
            list.query_at(key, Some(99))
                .expect("list key should resolve regardless of cursor");
        }
    }

    #[test]
    fn store_creates_on_first_write_and_preserves_insertion_order() {
        let mut store = VariableStore::new();
        store.set("b", VariableValue::Basic("2".to_string()));
        store.set("a", VariableValue::Basic("1".to_string()));
        store.set("b", VariableValue::Basic("3".to_string()));

        assert_eq!(store.len(), 2);
        assert_eq!(store.names().collect::<Vec<_>>(), vec!["b", "a"]);
        assert_eq!(store.query("b", "value").expect("query b"), "3");

        let error = store.query("missing", "value").expect_err("missing var");
        assert_eq!(error.code, "VAR_NOT_FOUND");
    }

    #[test]
    fn store_cursor_updates_apply_to_later_queries() {
        let mut store = VariableStore::new();
        store.set(
            "letters",
            VariableValue::List(vec!["x".to_string(), "y".to_string()]),
        );
        store.set_cursor("letters", 1).expect("cursor update");
        assert_eq!(store.query("letters", "current").expect("query"), "y");

        let error = store.set_cursor("missing", 0).expect_err("missing var");
        assert_eq!(error.code, "VAR_NOT_FOUND");
    }
}
