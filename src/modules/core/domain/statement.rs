//! Statement descriptions rendered to SQL by the database layer

use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::HashMap;
use wakalib_types::{FetchMethod, Join, Operator};

/// Named parameter values for `%(KEY)s` placeholders
pub type Params = HashMap<String, Value>;

/// A single WHERE condition
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Where {
    pub field: String,
    pub value: Value,
    pub operator: Operator,
}

impl Where {
    pub fn new(field: impl Into<String>, operator: Operator, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
            operator,
        }
    }

    /// `field = value`
    pub fn eq(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self::new(field, Operator::Eq, value)
    }
}

/// A `field = value` assignment for INSERT and UPDATE
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Set {
    pub field: String,
    pub value: Value,
}

impl Set {
    pub fn new(field: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            field: field.into(),
            value: value.into(),
        }
    }
}

/// Selected columns
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Fields {
    /// `*`
    #[default]
    All,
    /// Column names, quoted as identifiers
    Columns(Vec<String>),
    /// A raw select-list expression such as `count(*)`, inserted as written
    Raw(String),
}

/// SELECT description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectQuery {
    pub table: String,
    #[serde(default)]
    pub fields: Fields,
    #[serde(default)]
    pub wheres: Vec<Where>,
    #[serde(default)]
    pub join: Join,
    #[serde(default)]
    pub method: FetchMethod,
}

impl SelectQuery {
    /// `SELECT * FROM table`, first row only
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            fields: Fields::All,
            wheres: Vec::new(),
            join: Join::And,
            method: FetchMethod::One,
        }
    }

    pub fn columns<I, S>(mut self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.fields = Fields::Columns(columns.into_iter().map(Into::into).collect());
        self
    }

    pub fn raw_fields(mut self, expression: impl Into<String>) -> Self {
        self.fields = Fields::Raw(expression.into());
        self
    }

    pub fn filter(mut self, condition: Where) -> Self {
        self.wheres.push(condition);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = join;
        self
    }

    pub fn method(mut self, method: FetchMethod) -> Self {
        self.method = method;
        self
    }
}

/// INSERT description
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct InsertQuery {
    pub table: String,
    pub sets: Vec<Set>,
}

impl InsertQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push(Set::new(field, value));
        self
    }
}

/// UPDATE description; no conditions updates every row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateQuery {
    pub table: String,
    pub sets: Vec<Set>,
    #[serde(default)]
    pub wheres: Vec<Where>,
    #[serde(default)]
    pub join: Join,
}

impl UpdateQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            sets: Vec::new(),
            wheres: Vec::new(),
            join: Join::And,
        }
    }

    pub fn set(mut self, field: impl Into<String>, value: impl Into<Value>) -> Self {
        self.sets.push(Set::new(field, value));
        self
    }

    pub fn filter(mut self, condition: Where) -> Self {
        self.wheres.push(condition);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = join;
        self
    }
}

/// DELETE description; no conditions deletes every row
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteQuery {
    pub table: String,
    #[serde(default)]
    pub wheres: Vec<Where>,
    #[serde(default)]
    pub join: Join,
}

impl DeleteQuery {
    pub fn new(table: impl Into<String>) -> Self {
        Self {
            table: table.into(),
            wheres: Vec::new(),
            join: Join::And,
        }
    }

    pub fn filter(mut self, condition: Where) -> Self {
        self.wheres.push(condition);
        self
    }

    pub fn join(mut self, join: Join) -> Self {
        self.join = join;
        self
    }
}

/// Any described statement
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum Statement {
    Insert(InsertQuery),
    Select(SelectQuery),
    Update(UpdateQuery),
    Delete(DeleteQuery),
}

impl Statement {
    /// Target table
    pub fn table(&self) -> &str {
        match self {
            Statement::Insert(q) => &q.table,
            Statement::Select(q) => &q.table,
            Statement::Update(q) => &q.table,
            Statement::Delete(q) => &q.table,
        }
    }
}

impl From<InsertQuery> for Statement {
    fn from(q: InsertQuery) -> Self {
        Statement::Insert(q)
    }
}

impl From<SelectQuery> for Statement {
    fn from(q: SelectQuery) -> Self {
        Statement::Select(q)
    }
}

impl From<UpdateQuery> for Statement {
    fn from(q: UpdateQuery) -> Self {
        Statement::Update(q)
    }
}

impl From<DeleteQuery> for Statement {
    fn from(q: DeleteQuery) -> Self {
        Statement::Delete(q)
    }
}

/// One column and the values it may equal, for existence checks
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExistsCondition {
    pub column: String,
    pub values: Vec<Value>,
}

impl ExistsCondition {
    /// `column = value`
    pub fn new(column: impl Into<String>, value: impl Into<Value>) -> Self {
        Self {
            column: column.into(),
            values: vec![value.into()],
        }
    }

    /// `column = v1 OR column = v2 ...`
    pub fn any_of<I, V>(column: impl Into<String>, values: I) -> Self
    where
        I: IntoIterator<Item = V>,
        V: Into<Value>,
    {
        Self {
            column: column.into(),
            values: values.into_iter().map(Into::into).collect(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_select_builder() {
        let query = SelectQuery::new("users")
            .columns(["id", "name"])
            .filter(Where::eq("status", "active"))
            .filter(Where::new("age", Operator::GtEq, 18))
            .join(Join::Or)
            .method(FetchMethod::All);

        assert_eq!(query.fields, Fields::Columns(vec!["id".into(), "name".into()]));
        assert_eq!(query.wheres.len(), 2);
        assert_eq!(query.wheres[1].value, json!(18));
        assert_eq!(query.join, Join::Or);
        assert_eq!(query.method, FetchMethod::All);
    }

    #[test]
    fn test_statement_from_and_table() {
        let statement: Statement = InsertQuery::new("logs").set("msg", "hi").into();
        assert_eq!(statement.table(), "logs");
        assert!(matches!(statement, Statement::Insert(_)));

        let statement: Statement = SelectQuery::new("logs").into();
        assert_eq!(statement.table(), "logs");
    }

    #[test]
    fn test_statement_serde() {
        let json = r#"{
            "kind": "select",
            "table": "users",
            "fields": {"columns": ["id"]},
            "wheres": [{"field": "id", "value": 1, "operator": "="}],
            "method": "fetchall"
        }"#;
        let statement: Statement = serde_json::from_str(json).unwrap();
        match statement {
            Statement::Select(q) => {
                assert_eq!(q.fields, Fields::Columns(vec!["id".into()]));
                assert_eq!(q.join, Join::And);
                assert_eq!(q.method, FetchMethod::All);
            }
            other => panic!("unexpected statement: {:?}", other),
        }
    }

    #[test]
    fn test_exists_condition_any_of() {
        let condition = ExistsCondition::any_of("id", [1, 2, 3]);
        assert_eq!(condition.values, vec![json!(1), json!(2), json!(3)]);
        assert_eq!(ExistsCondition::new("name", "x").values, vec![json!("x")]);
    }
}
