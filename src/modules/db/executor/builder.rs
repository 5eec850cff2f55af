//! Rendering of described statements to SQL

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use wakalib_core::{
    DeleteQuery, ExistsCondition, Fields, InsertQuery, SelectQuery, Set, Statement,
    UpdateQuery, WakalibError, Where,
};
use wakalib_types::{Join, Operator};

use super::BoundStatement;

/// Plain identifier characters, the only ones accepted by existence checks
static WORD_PATTERN: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\w+$").unwrap());

/// Render a described statement to positional SQL
pub fn render(statement: &Statement) -> Result<BoundStatement, WakalibError> {
    match statement {
        Statement::Select(q) => render_select(q),
        Statement::Insert(q) => render_insert(q),
        Statement::Update(q) => render_update(q),
        Statement::Delete(q) => render_delete(q),
    }
}

/// Render `SELECT EXISTS (SELECT * FROM table WHERE ...)`
///
/// Several values for one column are OR-ed inside parentheses; conditions are
/// combined with `join`, which is required once there is more than one.
pub fn render_exists(
    table: &str,
    conditions: &[ExistsCondition],
    join: Option<Join>,
) -> Result<BoundStatement, WakalibError> {
    check_word("table", table)?;
    if conditions.is_empty() {
        return Err(WakalibError::InvalidArgument(
            "at least one condition is required".to_string(),
        ));
    }
    let join = match join {
        Some(join) => join,
        None if conditions.len() == 1 => Join::And,
        None => {
            return Err(WakalibError::InvalidArgument(
                "join must be set when more than one condition is given".to_string(),
            ))
        }
    };

    let mut b = SqlBuilder::new();
    b.push("SELECT EXISTS (SELECT * FROM ");
    b.push(table);
    b.push(" WHERE ");
    for (i, condition) in conditions.iter().enumerate() {
        check_word("column", &condition.column)?;
        if condition.values.is_empty() {
            return Err(WakalibError::InvalidArgument(format!(
                "condition on '{}' has no values",
                condition.column
            )));
        }
        if i > 0 {
            b.push_join(join);
        }
        let grouped = condition.values.len() > 1;
        if grouped {
            b.push("(");
        }
        for (j, value) in condition.values.iter().enumerate() {
            if j > 0 {
                b.push(" OR ");
            }
            b.push(&condition.column);
            b.push(" = ");
            b.push_arg(value.clone());
        }
        if grouped {
            b.push(")");
        }
    }
    b.push(")");
    Ok(b.finish())
}

fn render_select(q: &SelectQuery) -> Result<BoundStatement, WakalibError> {
    let mut b = SqlBuilder::new();
    b.push("SELECT ");
    match &q.fields {
        Fields::All => b.push("*"),
        Fields::Columns(columns) => {
            if columns.is_empty() {
                return Err(WakalibError::InvalidArgument(
                    "select needs at least one column".to_string(),
                ));
            }
            for (i, column) in columns.iter().enumerate() {
                if i > 0 {
                    b.push(", ");
                }
                b.push_ident(column)?;
            }
        }
        Fields::Raw(expression) => {
            if expression.trim().is_empty() {
                return Err(WakalibError::InvalidArgument(
                    "select expression cannot be empty".to_string(),
                ));
            }
            b.push(expression);
        }
    }
    b.push(" FROM ");
    b.push_table(&q.table)?;
    b.push_wheres(&q.wheres, q.join)?;
    Ok(b.finish())
}

fn render_insert(q: &InsertQuery) -> Result<BoundStatement, WakalibError> {
    require_sets("insert", &q.sets)?;

    let mut b = SqlBuilder::new();
    b.push("INSERT INTO ");
    b.push_table(&q.table)?;
    b.push(" (");
    for (i, set) in q.sets.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_ident(&set.field)?;
    }
    b.push(") VALUES (");
    for (i, set) in q.sets.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_arg(set.value.clone());
    }
    b.push(")");
    Ok(b.finish())
}

fn render_update(q: &UpdateQuery) -> Result<BoundStatement, WakalibError> {
    require_sets("update", &q.sets)?;

    let mut b = SqlBuilder::new();
    b.push("UPDATE ");
    b.push_table(&q.table)?;
    b.push(" SET ");
    for (i, set) in q.sets.iter().enumerate() {
        if i > 0 {
            b.push(", ");
        }
        b.push_ident(&set.field)?;
        b.push(" = ");
        b.push_arg(set.value.clone());
    }
    b.push_wheres(&q.wheres, q.join)?;
    Ok(b.finish())
}

fn render_delete(q: &DeleteQuery) -> Result<BoundStatement, WakalibError> {
    let mut b = SqlBuilder::new();
    b.push("DELETE FROM ");
    b.push_table(&q.table)?;
    b.push_wheres(&q.wheres, q.join)?;
    Ok(b.finish())
}

fn require_sets(kind: &str, sets: &[Set]) -> Result<(), WakalibError> {
    if sets.is_empty() {
        return Err(WakalibError::InvalidArgument(format!(
            "{} needs at least one field",
            kind
        )));
    }
    Ok(())
}

fn check_word(what: &str, name: &str) -> Result<(), WakalibError> {
    if !WORD_PATTERN.is_match(name) {
        return Err(WakalibError::InvalidArgument(format!(
            "{} name '{}' contains unauthorized characters",
            what, name
        )));
    }
    Ok(())
}

/// Accumulates SQL text and positional arguments
struct SqlBuilder {
    sql: String,
    args: Vec<Value>,
}

impl SqlBuilder {
    fn new() -> Self {
        Self {
            sql: String::new(),
            args: Vec::new(),
        }
    }

    fn push(&mut self, text: &str) {
        self.sql.push_str(text);
    }

    /// Double-quoted identifier with embedded quotes doubled
    fn push_ident(&mut self, ident: &str) -> Result<(), WakalibError> {
        if ident.is_empty() || ident.contains('\0') {
            return Err(WakalibError::InvalidArgument(format!(
                "invalid identifier {:?}",
                ident
            )));
        }
        self.sql.push('"');
        self.sql.push_str(&ident.replace('"', "\"\""));
        self.sql.push('"');
        Ok(())
    }

    /// Table name, schema-qualified when it contains `.`
    fn push_table(&mut self, table: &str) -> Result<(), WakalibError> {
        for (i, part) in table.split('.').enumerate() {
            if i > 0 {
                self.sql.push('.');
            }
            self.push_ident(part)?;
        }
        Ok(())
    }

    fn push_arg(&mut self, value: Value) {
        self.args.push(value);
        self.sql.push('$');
        self.sql.push_str(&self.args.len().to_string());
    }

    fn push_join(&mut self, join: Join) {
        self.sql.push(' ');
        self.sql.push_str(&join.to_string());
        self.sql.push(' ');
    }

    fn push_wheres(&mut self, wheres: &[Where], join: Join) -> Result<(), WakalibError> {
        if wheres.is_empty() {
            return Ok(());
        }
        self.push(" WHERE ");
        for (i, condition) in wheres.iter().enumerate() {
            if i > 0 {
                self.push_join(join);
            }
            self.push_where(condition)?;
        }
        Ok(())
    }

    fn push_where(&mut self, condition: &Where) -> Result<(), WakalibError> {
        match condition.operator {
            op if op.takes_list() => {
                let items = condition.value.as_array().ok_or_else(|| {
                    WakalibError::InvalidArgument(format!(
                        "'{}' condition on '{}' needs a list value",
                        op, condition.field
                    ))
                })?;
                if items.is_empty() {
                    // x = ANY('{}') is never true
                    self.push("FALSE");
                    return Ok(());
                }
                self.push_ident(&condition.field)?;
                self.push(" = ANY(");
                self.push_arg(condition.value.clone());
                self.push(")");
            }
            Operator::Like => {
                self.push_ident(&condition.field)?;
                self.push(" LIKE ");
                self.push_arg(condition.value.clone());
            }
            op => {
                self.push_ident(&condition.field)?;
                self.push(" ");
                self.push(op.as_str());
                self.push(" ");
                self.push_arg(condition.value.clone());
            }
        }
        Ok(())
    }

    fn finish(self) -> BoundStatement {
        BoundStatement::new(self.sql, self.args)
    }
}
