//! Credential-scoped PostgreSQL connector
//!
//! Typical usage:
//!
//! ```no_run
//! # async fn demo() -> wakalib_core::Result<()> {
//! use std::collections::HashMap;
//! use wakalib_db::DbHandling;
//!
//! let mut db = DbHandling::new("hoge/fuga.json", "piyo/piyon")?;
//! let params: wakalib_core::Params =
//!     HashMap::from([("ANY_KEY".to_string(), "VALUE".into())]);
//! let row = db
//!     .select_fetchone(
//!         "SELECT my_column FROM my_table WHERE my_column=%(ANY_KEY)s;",
//!         Some(&params),
//!     )
//!     .await?;
//! # let _ = row;
//! # Ok(())
//! # }
//! ```

use sqlx::postgres::{PgConnectOptions, PgConnection, PgTypeInfo};
use sqlx::{Column, Connection, Either, Executor, Row};
use std::path::Path;
use tracing::{debug, info, warn};
use wakalib_core::{
    CredentialStore, ExistsCondition, Outcome, Params, Profile, Record, RowSet, Statement,
    WakalibError,
};
use wakalib_parser::ProfileValidator;
use wakalib_types::{FetchMethod, Join};

use super::row::{row_to_record, row_to_values};
use crate::executor::{bind_params, compile, render, render_exists, to_params, BoundStatement};

/// PostgreSQL access scoped to one role of a credential file
///
/// The connection is opened by the first operation that needs it and reused
/// afterwards. Operations take `&mut self`, so one connector serves one caller
/// at a time; build one connector per concurrent user.
pub struct DbHandling {
    role: String,
    db_config: Profile,
    conn: Option<PgConnection>,
}

impl DbHandling {
    /// Load `credentials_path` and select the profile stored under `role`
    ///
    /// No connection is opened here.
    pub fn new(
        credentials_path: impl AsRef<Path>,
        role: impl Into<String>,
    ) -> Result<Self, WakalibError> {
        let store = wakalib_parser::parse_file(credentials_path)?;
        Self::from_store(&store, role)
    }

    /// Select the profile stored under `role` from an already loaded store
    pub fn from_store(store: &CredentialStore, role: impl Into<String>) -> Result<Self, WakalibError> {
        let role = role.into();
        let db_config = store.resolve(&role)?.clone();
        ProfileValidator::new().validate_profile(&role, &db_config)?;

        info!(role = %role, host = %db_config.host, database = %db_config.name, "Resolved database profile");
        Ok(Self {
            role,
            db_config,
            conn: None,
        })
    }

    /// The role key this connector was built for
    pub fn role(&self) -> &str {
        &self.role
    }

    /// The resolved connection profile
    pub fn db_config(&self) -> &Profile {
        &self.db_config
    }

    /// Returns true once a connection is open
    pub fn is_connected(&self) -> bool {
        self.conn.is_some()
    }

    fn connect_options(&self) -> Result<PgConnectOptions, WakalibError> {
        let port = self.db_config.port_number().ok_or_else(|| {
            WakalibError::Configuration(format!(
                "Role '{}' has an invalid port '{}'",
                self.role, self.db_config.port
            ))
        })?;

        Ok(PgConnectOptions::new()
            .host(&self.db_config.host)
            .port(port)
            .username(&self.db_config.user)
            .password(&self.db_config.password)
            .database(&self.db_config.name)
            .application_name("wakalib"))
    }

    /// Open the connection if needed and hand it out
    async fn connection(&mut self) -> Result<&mut PgConnection, WakalibError> {
        let conn = match self.conn.take() {
            Some(conn) => conn,
            None => {
                let options = self.connect_options()?;
                debug!(role = %self.role, "Opening PostgreSQL connection");
                PgConnection::connect_with(&options).await.map_err(|e| {
                    WakalibError::Connection(format!("PostgreSQL connection failed: {}", e))
                })?
            }
        };
        Ok(self.conn.insert(conn))
    }

    /// Map a driver error, dropping the connection if it is no longer usable
    fn on_error(&mut self, error: sqlx::Error) -> WakalibError {
        if is_broken(&error) {
            warn!(role = %self.role, "Dropping broken PostgreSQL connection: {}", error);
            self.conn = None;
            return WakalibError::Connection(format!("PostgreSQL connection lost: {}", error));
        }
        WakalibError::Query(format!("PostgreSQL query failed: {}", error))
    }

    /// Run a read statement and return its first row, or `None` for no rows
    ///
    /// `sql` uses `%(KEY)s` placeholders; every key in `params` must be
    /// referenced and every placeholder must have a key. Mismatches fail
    /// before any network I/O.
    pub async fn select_fetchone(
        &mut self,
        sql: &str,
        params: Option<&Params>,
    ) -> Result<Option<Record>, WakalibError> {
        let bound = compile(sql, params)?;
        self.fetch_optional(&bound).await
    }

    /// Run a read statement and return every row with its column names
    pub async fn select_fetchall(
        &mut self,
        sql: &str,
        params: Option<&Params>,
    ) -> Result<RowSet, WakalibError> {
        let bound = compile(sql, params)?;
        self.fetch_all(&bound).await
    }

    /// Run a write statement and return the number of affected rows
    pub async fn upsert(&mut self, sql: &str, params: Option<&Params>) -> Result<u64, WakalibError> {
        let bound = compile(sql, params)?;
        self.execute_bound(&bound).await
    }

    /// Render and run a described statement
    pub async fn execute(&mut self, statement: &Statement) -> Result<Outcome, WakalibError> {
        let bound = render(statement)?;
        match statement {
            Statement::Select(q) => match q.method {
                FetchMethod::One => Ok(Outcome::Row(self.fetch_optional(&bound).await?)),
                FetchMethod::All => Ok(Outcome::Rows(self.fetch_all(&bound).await?)),
            },
            _ => Ok(Outcome::Affected(self.execute_bound(&bound).await?)),
        }
    }

    /// Run statements in order, stopping at the first failure
    pub async fn execute_many(
        &mut self,
        statements: &[Statement],
    ) -> Result<Vec<Outcome>, WakalibError> {
        let mut outcomes = Vec::with_capacity(statements.len());
        for (i, statement) in statements.iter().enumerate() {
            match self.execute(statement).await {
                Ok(outcome) => outcomes.push(outcome),
                Err(e) => {
                    warn!(role = %self.role, index = i, table = statement.table(), "Statement failed: {}", e);
                    return Err(e);
                }
            }
        }
        Ok(outcomes)
    }

    /// Returns true if `table` has a row matching the conditions
    pub async fn is_exists(
        &mut self,
        table: &str,
        conditions: &[ExistsCondition],
        join: Option<Join>,
    ) -> Result<bool, WakalibError> {
        let bound = render_exists(table, conditions, join)?;
        let row = self.fetch_optional(&bound).await?;
        Ok(row
            .and_then(|r| r.get(0).and_then(serde_json::Value::as_bool))
            .unwrap_or(false))
    }

    /// Check that the database answers, connecting first if needed
    pub async fn ping(&mut self) -> Result<(), WakalibError> {
        let conn = self.connection().await?;
        let result = conn.ping().await;
        result.map_err(|e| self.on_error(e))
    }

    /// Close the connection gracefully
    pub async fn close(mut self) -> Result<(), WakalibError> {
        if let Some(conn) = self.conn.take() {
            debug!(role = %self.role, "Closing PostgreSQL connection");
            conn.close().await.map_err(|e| {
                WakalibError::Connection(format!("PostgreSQL close failed: {}", e))
            })?;
        }
        Ok(())
    }

    /// Parameter types the server infers for the statement
    ///
    /// Skipped for statements without arguments. An unknown table or a syntax
    /// error surfaces here as the statement's own error.
    async fn param_types(&mut self, bound: &BoundStatement) -> Result<Vec<PgTypeInfo>, WakalibError> {
        if bound.args.is_empty() {
            return Ok(Vec::new());
        }
        let conn = self.connection().await?;
        let result = (&mut *conn).describe(&bound.sql).await;
        let described = result.map_err(|e| self.on_error(e))?;
        Ok(match described.parameters() {
            Some(Either::Left(types)) => types.to_vec(),
            _ => Vec::new(),
        })
    }

    async fn fetch_optional(&mut self, bound: &BoundStatement) -> Result<Option<Record>, WakalibError> {
        debug!(role = %self.role, sql = %bound.sql, args = bound.args.len(), "Fetching one row");
        let types = self.param_types(bound).await?;
        let params = to_params(&bound.args, &types)?;
        let conn = self.connection().await?;
        let result = bind_params(sqlx::query(&bound.sql), params)
            .persistent(false)
            .fetch_optional(&mut *conn)
            .await;
        let row = result.map_err(|e| self.on_error(e))?;
        row.as_ref().map(row_to_record).transpose()
    }

    async fn fetch_all(&mut self, bound: &BoundStatement) -> Result<RowSet, WakalibError> {
        debug!(role = %self.role, sql = %bound.sql, args = bound.args.len(), "Fetching all rows");
        let types = self.param_types(bound).await?;
        let params = to_params(&bound.args, &types)?;
        let conn = self.connection().await?;
        let result = async {
            let rows = bind_params(sqlx::query(&bound.sql), params)
                .persistent(false)
                .fetch_all(&mut *conn)
                .await?;
            let columns: Vec<String> = match rows.first() {
                Some(row) => row.columns().iter().map(|c| c.name().to_string()).collect(),
                // Column names are still reported when nothing matched
                None => (&mut *conn)
                    .describe(&bound.sql)
                    .await?
                    .columns()
                    .iter()
                    .map(|c| c.name().to_string())
                    .collect(),
            };
            Ok::<_, sqlx::Error>((columns, rows))
        }
        .await;
        let (columns, rows) = result.map_err(|e| self.on_error(e))?;
        let rows = rows.iter().map(row_to_values).collect::<Result<_, _>>()?;
        Ok(RowSet::new(columns, rows))
    }

    /// Statements without arguments go over the simple protocol, so a
    /// `;`-separated script runs as a whole; the count is summed across it.
    async fn execute_bound(&mut self, bound: &BoundStatement) -> Result<u64, WakalibError> {
        debug!(role = %self.role, sql = %bound.sql, args = bound.args.len(), "Executing statement");
        if bound.args.is_empty() {
            let conn = self.connection().await?;
            let result = (&mut *conn).execute(bound.sql.as_str()).await;
            let done = result.map_err(|e| self.on_error(e))?;
            return Ok(done.rows_affected());
        }

        let types = self.param_types(bound).await?;
        let params = to_params(&bound.args, &types)?;
        let conn = self.connection().await?;
        let result = bind_params(sqlx::query(&bound.sql), params)
            .persistent(false)
            .execute(&mut *conn)
            .await;
        let done = result.map_err(|e| self.on_error(e))?;
        Ok(done.rows_affected())
    }
}

/// Errors after which the connection cannot be trusted
///
/// SQLSTATE class 08 is a connection exception and 57P covers an
/// administrator or crash shutdown of the backend.
fn is_broken(error: &sqlx::Error) -> bool {
    match error {
        sqlx::Error::Io(_)
        | sqlx::Error::Tls(_)
        | sqlx::Error::Protocol(_)
        | sqlx::Error::WorkerCrashed => true,
        sqlx::Error::Database(e) => e
            .code()
            .map(|code| code.starts_with("08") || code.starts_with("57P"))
            .unwrap_or(false),
        _ => false,
    }
}

impl std::fmt::Debug for DbHandling {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DbHandling")
            .field("role", &self.role)
            .field("db_config", &self.db_config)
            .field("connected", &self.is_connected())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::io::Write;
    use wakalib_core::{InsertQuery, SelectQuery, Where};

    /// Credential file pointing at a port nothing listens on
    fn credentials_file() -> tempfile::NamedTempFile {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{
                "fuga_role": {{
                    "name": "my_db",
                    "user": "reader",
                    "password": "s3cret",
                    "host": "127.0.0.1",
                    "port": "1"
                }}
            }}"#
        )
        .unwrap();
        file
    }

    fn params(pairs: &[(&str, serde_json::Value)]) -> Params {
        pairs.iter().map(|(k, v)| (k.to_string(), v.clone())).collect()
    }

    #[test]
    fn test_new_resolves_role() {
        let file = credentials_file();
        let db = DbHandling::new(file.path(), "fuga_role").unwrap();
        assert_eq!(db.role(), "fuga_role");
        assert_eq!(db.db_config().name, "my_db");
        assert!(!db.is_connected());
    }

    #[test]
    fn test_new_missing_role() {
        let file = credentials_file();
        let err = DbHandling::new(file.path(), "hoge_role").unwrap_err();
        assert!(matches!(err, WakalibError::Configuration(_)));
    }

    #[test]
    fn test_new_missing_file() {
        let err = DbHandling::new("/nonexistent/credentials.json", "fuga_role").unwrap_err();
        assert!(matches!(err, WakalibError::Configuration(_)));
    }

    #[test]
    fn test_debug_hides_password() {
        let file = credentials_file();
        let db = DbHandling::new(file.path(), "fuga_role").unwrap();
        assert!(!format!("{:?}", db).contains("s3cret"));
    }

    #[tokio::test]
    async fn test_param_mismatch_fails_before_connecting() {
        let file = credentials_file();
        let mut db = DbHandling::new(file.path(), "fuga_role").unwrap();

        let extra = params(&[("ANY_KEY", json!("VALUE")), ("OTHER", json!(1))]);
        let err = db
            .select_fetchone(
                "SELECT my_column FROM my_table WHERE my_column=%(ANY_KEY)s;",
                Some(&extra),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, WakalibError::InvalidArgument(_)));

        let err = db
            .select_fetchone("SELECT * FROM t WHERE id = %(id)s", None)
            .await
            .unwrap_err();
        assert!(matches!(err, WakalibError::InvalidArgument(_)));

        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_builder_errors_fail_before_connecting() {
        let file = credentials_file();
        let mut db = DbHandling::new(file.path(), "fuga_role").unwrap();

        let err = db.execute(&InsertQuery::new("t").into()).await.unwrap_err();
        assert!(matches!(err, WakalibError::InvalidArgument(_)));

        let conditions = [ExistsCondition::new("id", 1), ExistsCondition::new("n", 2)];
        let err = db.is_exists("t", &conditions, None).await.unwrap_err();
        assert!(matches!(err, WakalibError::InvalidArgument(_)));

        assert!(!db.is_connected());
    }

    #[tokio::test]
    async fn test_unreachable_database_is_connection_error() {
        let file = credentials_file();
        let mut db = DbHandling::new(file.path(), "fuga_role").unwrap();

        let err = db.select_fetchone("SELECT 1", None).await.unwrap_err();
        assert!(matches!(err, WakalibError::Connection(_)));
        assert!(!db.is_connected());
    }

    #[test]
    fn test_transport_errors_are_broken() {
        let io = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "reset");
        assert!(is_broken(&sqlx::Error::Io(io)));
        assert!(is_broken(&sqlx::Error::Protocol("unexpected message".into())));
        assert!(is_broken(&sqlx::Error::WorkerCrashed));
        assert!(!is_broken(&sqlx::Error::RowNotFound));
        assert!(!is_broken(&sqlx::Error::ColumnNotFound("x".into())));
    }

    /// Connector for a live database named by WAKALIB_TEST_CREDENTIALS / WAKALIB_TEST_ROLE
    fn live() -> DbHandling {
        let path = std::env::var("WAKALIB_TEST_CREDENTIALS").expect("WAKALIB_TEST_CREDENTIALS");
        let role = std::env::var("WAKALIB_TEST_ROLE").expect("WAKALIB_TEST_ROLE");
        DbHandling::new(path, role).unwrap()
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_fetchone_preserves_column_order() {
        let mut db = live();
        let p = params(&[("ANY_KEY", json!("my_value"))]);
        let row = db
            .select_fetchone("SELECT %(ANY_KEY)s::text AS a, 2::int4 AS b", Some(&p))
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.columns(), ["a".to_string(), "b".to_string()]);
        assert_eq!(row.values(), [json!("my_value"), json!(2)]);
        assert!(db.is_connected());
        db.close().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_fetchone_no_rows() {
        let mut db = live();
        let row = db.select_fetchone("SELECT 1 WHERE false", None).await.unwrap();
        assert!(row.is_none());

        let rows = db
            .select_fetchall("SELECT 1 AS one WHERE false", None)
            .await
            .unwrap();
        assert_eq!(rows.columns, vec!["one".to_string()]);
        assert!(rows.is_empty());
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_fetchone_first_row_only() {
        let mut db = live();
        let row = db
            .select_fetchone("SELECT n FROM generate_series(1, 3) AS n ORDER BY n", None)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get(0), Some(&json!(1)));
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_query_error_keeps_connection() {
        let mut db = live();
        let err = db
            .select_fetchone("SELECT * FROM wakalib_no_such_table", None)
            .await
            .unwrap_err();
        assert!(matches!(err, WakalibError::Query(_)));
        assert!(db.is_connected());
        db.ping().await.unwrap();
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_described_statements() {
        let mut db = live();
        db.upsert(
            "CREATE TEMP TABLE wakalib_items (id int8, name text, tags text[])",
            None,
        )
        .await
        .unwrap();

        let inserted = db
            .execute_many(&[
                InsertQuery::new("wakalib_items")
                    .set("id", 1)
                    .set("name", "alpha")
                    .set("tags", json!(["x", "y"]))
                    .into(),
                InsertQuery::new("wakalib_items").set("id", 2).set("name", "beta").into(),
            ])
            .await
            .unwrap();
        assert_eq!(inserted, vec![Outcome::Affected(1), Outcome::Affected(1)]);

        let outcome = db
            .execute(
                &SelectQuery::new("wakalib_items")
                    .columns(["name", "tags"])
                    .filter(Where::new("id", wakalib_types::Operator::In, json!([1, 3])))
                    .into(),
            )
            .await
            .unwrap();
        let row = outcome.into_row().unwrap();
        assert_eq!(row.values(), [json!("alpha"), json!(["x", "y"])]);

        assert!(db
            .is_exists("wakalib_items", &[ExistsCondition::any_of("name", ["beta", "gamma"])], None)
            .await
            .unwrap());
        assert!(!db
            .is_exists("wakalib_items", &[ExistsCondition::new("id", 99)], None)
            .await
            .unwrap());
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_null_binds_to_typed_columns() {
        let mut db = live();
        db.upsert(
            "CREATE TEMP TABLE wakalib_nullable (id int4, qty int4, born date)",
            None,
        )
        .await
        .unwrap();

        let p = params(&[("ID", json!(1)), ("QTY", json!(null)), ("BORN", json!(null))]);
        let affected = db
            .upsert(
                "INSERT INTO wakalib_nullable VALUES (%(ID)s, %(QTY)s, %(BORN)s)",
                Some(&p),
            )
            .await
            .unwrap();
        assert_eq!(affected, 1);

        let outcome = db
            .execute(
                &InsertQuery::new("wakalib_nullable")
                    .set("id", 2)
                    .set("qty", json!(null))
                    .into(),
            )
            .await
            .unwrap();
        assert_eq!(outcome, Outcome::Affected(1));

        let rows = db
            .select_fetchall("SELECT id, qty, born FROM wakalib_nullable ORDER BY id", None)
            .await
            .unwrap();
        assert_eq!(
            rows.rows,
            vec![
                vec![json!(1), json!(null), json!(null)],
                vec![json!(2), json!(null), json!(null)],
            ]
        );
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_strings_compare_with_typed_columns() {
        let mut db = live();
        db.upsert(
            "CREATE TEMP TABLE wakalib_events (id int8, day date, at timestamptz)",
            None,
        )
        .await
        .unwrap();
        db.upsert(
            "INSERT INTO wakalib_events VALUES (1, '2024-01-01', '2024-01-01T09:00:00Z')",
            None,
        )
        .await
        .unwrap();

        let p = params(&[("DAY", json!("2024-01-01")), ("ID", json!("1"))]);
        let row = db
            .select_fetchone(
                "SELECT day, at FROM wakalib_events WHERE day = %(DAY)s AND id = %(ID)s",
                Some(&p),
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(row.get(0), Some(&json!("2024-01-01")));
        assert_eq!(row.get(1), Some(&json!("2024-01-01T09:00:00+00:00")));

        let p = params(&[("DAY", json!("not a date"))]);
        let err = db
            .select_fetchone("SELECT 1 FROM wakalib_events WHERE day = %(DAY)s", Some(&p))
            .await
            .unwrap_err();
        assert!(matches!(err, WakalibError::InvalidArgument(_)));
        assert!(db.is_connected());
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_decodes_numeric_bytea_interval_and_small_arrays() {
        let mut db = live();
        let row = db
            .select_fetchone(
                "SELECT 12.50::numeric AS amount, 'abc'::bytea AS b, interval '1 day' AS i, \
                 3::int2 AS s, ARRAY[1,2]::int2[] AS a, ARRAY[1.5]::float4[] AS f",
                None,
            )
            .await
            .unwrap()
            .unwrap();
        assert_eq!(
            row.values(),
            [
                json!("12.50"),
                json!("\\x616263"),
                json!("1 day"),
                json!(3),
                json!([1, 2]),
                json!([1.5]),
            ]
        );
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_unsupported_column_type_names_column() {
        let mut db = live();
        let err = db
            .select_fetchone("SELECT point(1, 2) AS location", None)
            .await
            .unwrap_err();
        match err {
            WakalibError::Query(msg) => assert!(msg.contains("'location'"), "{}", msg),
            other => panic!("expected a query error, got {:?}", other),
        }
        assert!(db.is_connected());
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_terminated_backend_reconnects() {
        let mut db = live();
        let pid = db
            .select_fetchone("SELECT pg_backend_pid() AS pid", None)
            .await
            .unwrap()
            .and_then(|row| row.get(0).cloned())
            .unwrap();

        let mut admin = live();
        let p = params(&[("pid", pid)]);
        admin
            .select_fetchone("SELECT pg_terminate_backend(%(pid)s)", Some(&p))
            .await
            .unwrap();
        admin.close().await.unwrap();

        let err = db.select_fetchone("SELECT 1", None).await.unwrap_err();
        assert!(matches!(err, WakalibError::Connection(_)), "{:?}", err);
        assert!(!db.is_connected());

        let row = db.select_fetchone("SELECT 1 AS one", None).await.unwrap();
        assert_eq!(row.and_then(|r| r.get(0).cloned()), Some(json!(1)));
        assert!(db.is_connected());
    }

    #[tokio::test]
    #[ignore] // Requires a running PostgreSQL instance
    async fn test_upsert_runs_script_without_params() {
        let mut db = live();
        let affected = db
            .upsert(
                "CREATE TEMP TABLE wakalib_script (n int4); \
                 INSERT INTO wakalib_script VALUES (1), (2)",
                None,
            )
            .await
            .unwrap();
        assert_eq!(affected, 2);

        let rows = db
            .select_fetchall("SELECT n FROM wakalib_script ORDER BY n", None)
            .await
            .unwrap();
        assert_eq!(rows.len(), 2);
    }
}
