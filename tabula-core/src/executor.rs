//! Statement execution and the connection collaborator interface

use std::future::Future;

use serde::de::DeserializeOwned;

use crate::builder::{
    DeleteBuilder, InsertBuilderComplete, LinkBuilder, QueryBuilder, SelectBuilder, Statement,
    UpdateBuilder,
};
use crate::{Error, Result, Value};

/// Something that runs finalized statements: a pool, a connection or a
/// transaction owned by the caller.
///
/// Every call carries a caller-supplied [`Context`](Connection::Context)
/// (deadline, cancellation token, tracing span...). The builders pass it
/// through untouched and never inspect it. Errors from the connection are
/// returned unmodified.
pub trait Connection: Send + Sync {
    type Context: Send + Sync;

    /// Execute a statement that returns no rows, yielding the affected row count
    fn execute(
        &self,
        ctx: &Self::Context,
        statement: &Statement,
    ) -> impl Future<Output = Result<u64>> + Send;

    /// Fetch every row, each decoded from a JSON object keyed by
    /// [`Statement::columns`]
    fn fetch_all<T>(
        &self,
        ctx: &Self::Context,
        statement: &Statement,
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Fetch the first row, if any
    fn fetch_optional<T>(
        &self,
        ctx: &Self::Context,
        statement: &Statement,
    ) -> impl Future<Output = Result<Option<T>>> + Send
    where
        T: DeserializeOwned + Send;

    /// Fetch the first column of the first row
    fn fetch_value(
        &self,
        ctx: &Self::Context,
        statement: &Statement,
    ) -> impl Future<Output = Result<Option<Value>>> + Send;

    /// Fetch exactly one row; zero rows is [`Error::NotFound`]
    fn fetch_one<T>(
        &self,
        ctx: &Self::Context,
        statement: &Statement,
    ) -> impl Future<Output = Result<T>> + Send
    where
        T: DeserializeOwned + Send,
    {
        async move {
            self.fetch_optional(ctx, statement)
                .await?
                .ok_or(Error::NotFound)
        }
    }
}

/// Result of running an INSERT, UPDATE or DELETE
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Execution {
    pub rows_affected: u64,
    /// Keys produced by the database, one per inserted row, when the
    /// statement returns its generated key
    pub generated_keys: Vec<Value>,
}

impl Execution {
    /// Key of the last inserted row
    pub fn last_insert_id(&self) -> Option<&Value> {
        self.generated_keys.last()
    }
}

/// Finalize a builder, logging the SQL text when the database asks for it
fn prepare<B: QueryBuilder>(builder: &mut B) -> Result<Statement> {
    let statement = builder.finalize()?;
    if builder.database().config().log_query {
        log::info!("{}", statement.sql);
    }
    Ok(statement)
}

/// Extension trait for select builders to add execution methods
pub trait ExecutableQuery: QueryBuilder {
    /// Execute the query and return all results
    fn fetch_all<C, T>(
        self,
        conn: &C,
        ctx: &C::Context,
    ) -> impl Future<Output = Result<Vec<T>>> + Send
    where
        C: Connection,
        T: DeserializeOwned + Send;

    /// Execute the query and return the first result; no rows is [`Error::NotFound`]
    fn fetch_one<C, T>(self, conn: &C, ctx: &C::Context) -> impl Future<Output = Result<T>> + Send
    where
        C: Connection,
        T: DeserializeOwned + Send;

    /// Execute the query and return an optional result
    fn fetch_optional<C, T>(
        self,
        conn: &C,
        ctx: &C::Context,
    ) -> impl Future<Output = Result<Option<T>>> + Send
    where
        C: Connection,
        T: DeserializeOwned + Send;

    /// Execute the query and return a single scalar, such as a `count`
    fn fetch_value<C>(
        self,
        conn: &C,
        ctx: &C::Context,
    ) -> impl Future<Output = Result<Option<Value>>> + Send
    where
        C: Connection;
}

impl ExecutableQuery for SelectBuilder<'_> {
    async fn fetch_all<C, T>(mut self, conn: &C, ctx: &C::Context) -> Result<Vec<T>>
    where
        C: Connection,
        T: DeserializeOwned + Send,
    {
        let statement = prepare(&mut self)?;
        conn.fetch_all(ctx, &statement).await
    }

    async fn fetch_one<C, T>(mut self, conn: &C, ctx: &C::Context) -> Result<T>
    where
        C: Connection,
        T: DeserializeOwned + Send,
    {
        let statement = prepare(&mut self)?;
        conn.fetch_one(ctx, &statement).await
    }

    async fn fetch_optional<C, T>(mut self, conn: &C, ctx: &C::Context) -> Result<Option<T>>
    where
        C: Connection,
        T: DeserializeOwned + Send,
    {
        let statement = prepare(&mut self)?;
        conn.fetch_optional(ctx, &statement).await
    }

    async fn fetch_value<C>(mut self, conn: &C, ctx: &C::Context) -> Result<Option<Value>>
    where
        C: Connection,
    {
        let statement = prepare(&mut self)?;
        conn.fetch_value(ctx, &statement).await
    }
}

/// Extension trait for modification queries (INSERT, UPDATE, DELETE)
pub trait ExecutableModification: QueryBuilder {
    /// Execute the statement; inserts returning a generated key collect it
    fn execute<C>(self, conn: &C, ctx: &C::Context) -> impl Future<Output = Result<Execution>> + Send
    where
        C: Connection;
}

async fn run<C: Connection>(conn: &C, ctx: &C::Context, statement: Statement) -> Result<Execution> {
    let Some(key) = statement.returning.as_ref() else {
        let rows_affected = conn.execute(ctx, &statement).await?;
        return Ok(Execution {
            rows_affected,
            generated_keys: Vec::new(),
        });
    };
    let rows: Vec<serde_json::Map<String, serde_json::Value>> =
        conn.fetch_all(ctx, &statement).await?;
    let generated_keys: Vec<Value> = rows
        .into_iter()
        .map(|mut row| row.remove(key.field()).map(Value::from_json).unwrap_or(Value::Null))
        .collect();
    Ok(Execution {
        rows_affected: generated_keys.len() as u64,
        generated_keys,
    })
}

macro_rules! impl_executable_modification {
    ($($builder:ident),*) => {
        $(
            impl ExecutableModification for $builder<'_> {
                async fn execute<C>(mut self, conn: &C, ctx: &C::Context) -> Result<Execution>
                where
                    C: Connection,
                {
                    let statement = prepare(&mut self)?;
                    run(conn, ctx, statement).await
                }
            }
        )*
    };
}

impl_executable_modification!(InsertBuilderComplete, LinkBuilder, UpdateBuilder, DeleteBuilder);

/// Transaction isolation levels
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IsolationLevel {
    ReadUncommitted,
    ReadCommitted,
    RepeatableRead,
    Serializable,
}

impl IsolationLevel {
    pub fn to_sql(&self) -> &'static str {
        match self {
            IsolationLevel::ReadUncommitted => "READ UNCOMMITTED",
            IsolationLevel::ReadCommitted => "READ COMMITTED",
            IsolationLevel::RepeatableRead => "REPEATABLE READ",
            IsolationLevel::Serializable => "SERIALIZABLE",
        }
    }
}

/// sqlx PostgreSQL connection collaborator
#[cfg(feature = "postgres")]
pub mod postgres {
    use super::*;
    use sqlx::postgres::{PgArguments, PgRow};
    use sqlx::{Column, PgPool, Row, TypeInfo};
    use tokio::sync::Mutex;

    type PgQuery<'q> = sqlx::query::Query<'q, sqlx::Postgres, PgArguments>;

    /// PostgreSQL connection pool wrapper
    #[derive(Debug, Clone)]
    pub struct PostgresPool {
        inner: PgPool,
    }

    impl PostgresPool {
        /// Create a new PostgreSQL pool from a connection string
        pub async fn new(database_url: &str) -> Result<Self> {
            let pool = PgPool::connect(database_url).await?;
            Ok(Self { inner: pool })
        }

        /// Create from an existing PgPool
        pub fn from_pool(pool: PgPool) -> Self {
            Self { inner: pool }
        }

        /// Start a new transaction with the server's default isolation level
        pub async fn begin(&self) -> Result<PostgresTransaction> {
            let txn = self.inner.begin().await?;
            Ok(PostgresTransaction {
                inner: Mutex::new(txn),
            })
        }

        /// Start a new transaction with the given isolation level
        pub async fn begin_with_isolation(
            &self,
            isolation: IsolationLevel,
        ) -> Result<PostgresTransaction> {
            let mut txn = self.inner.begin().await?;
            let sql = format!("SET TRANSACTION ISOLATION LEVEL {}", isolation.to_sql());
            sqlx::query(&sql).execute(&mut *txn).await?;
            Ok(PostgresTransaction {
                inner: Mutex::new(txn),
            })
        }
    }

    impl Connection for PostgresPool {
        type Context = ();

        async fn execute(&self, _ctx: &(), statement: &Statement) -> Result<u64> {
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            let result = query.execute(&self.inner).await?;
            Ok(result.rows_affected())
        }

        async fn fetch_all<T>(&self, _ctx: &(), statement: &Statement) -> Result<Vec<T>>
        where
            T: DeserializeOwned + Send,
        {
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            let rows = query.fetch_all(&self.inner).await?;
            decode_rows(&rows, &statement.columns)
        }

        async fn fetch_optional<T>(&self, _ctx: &(), statement: &Statement) -> Result<Option<T>>
        where
            T: DeserializeOwned + Send,
        {
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            match query.fetch_optional(&self.inner).await? {
                Some(row) => Ok(Some(decode_row(&row, &statement.columns)?)),
                None => Ok(None),
            }
        }

        async fn fetch_value(&self, _ctx: &(), statement: &Statement) -> Result<Option<Value>> {
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            match query.fetch_optional(&self.inner).await? {
                Some(row) if !row.is_empty() => Ok(Some(decode_column(&row, 0)?)),
                _ => Ok(None),
            }
        }
    }

    /// PostgreSQL transaction wrapper
    ///
    /// Dropping it without [`commit`](Self::commit) rolls the work back.
    pub struct PostgresTransaction {
        inner: Mutex<sqlx::Transaction<'static, sqlx::Postgres>>,
    }

    impl PostgresTransaction {
        /// Commit the transaction
        pub async fn commit(self) -> Result<()> {
            self.inner.into_inner().commit().await?;
            Ok(())
        }

        /// Rollback the transaction
        pub async fn rollback(self) -> Result<()> {
            self.inner.into_inner().rollback().await?;
            Ok(())
        }
    }

    impl Connection for PostgresTransaction {
        type Context = ();

        async fn execute(&self, _ctx: &(), statement: &Statement) -> Result<u64> {
            let mut txn = self.inner.lock().await;
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            let result = query.execute(&mut **txn).await?;
            Ok(result.rows_affected())
        }

        async fn fetch_all<T>(&self, _ctx: &(), statement: &Statement) -> Result<Vec<T>>
        where
            T: DeserializeOwned + Send,
        {
            let mut txn = self.inner.lock().await;
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            let rows = query.fetch_all(&mut **txn).await?;
            decode_rows(&rows, &statement.columns)
        }

        async fn fetch_optional<T>(&self, _ctx: &(), statement: &Statement) -> Result<Option<T>>
        where
            T: DeserializeOwned + Send,
        {
            let mut txn = self.inner.lock().await;
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            match query.fetch_optional(&mut **txn).await? {
                Some(row) => Ok(Some(decode_row(&row, &statement.columns)?)),
                None => Ok(None),
            }
        }

        async fn fetch_value(&self, _ctx: &(), statement: &Statement) -> Result<Option<Value>> {
            let mut txn = self.inner.lock().await;
            let query = bind_values_to_query(sqlx::query(&statement.sql), &statement.arguments);
            match query.fetch_optional(&mut **txn).await? {
                Some(row) if !row.is_empty() => Ok(Some(decode_column(&row, 0)?)),
                _ => Ok(None),
            }
        }
    }

    /// Bind Tabula values to a sqlx query in placeholder order
    fn bind_values_to_query<'q>(mut query: PgQuery<'q>, params: &'q [Value]) -> PgQuery<'q> {
        for param in params {
            query = match param {
                Value::Null => query.bind(None::<i32>),
                Value::Bool(b) => query.bind(*b),
                Value::I32(i) => query.bind(*i),
                Value::I64(i) => query.bind(*i),
                Value::F32(f) => query.bind(*f),
                Value::F64(f) => query.bind(*f),
                Value::String(s) => query.bind(s.as_str()),
                Value::Bytes(b) => query.bind(b.as_slice()),
                Value::Json(j) => query.bind(j),
                #[cfg(feature = "uuid-support")]
                Value::Uuid(u) => query.bind(*u),
                #[cfg(feature = "datetime-support")]
                Value::DateTime(d) => query.bind(*d),
                #[cfg(feature = "decimal-support")]
                Value::Decimal(d) => query.bind(*d),
            };
        }
        query
    }

    fn decode_rows<T: DeserializeOwned>(rows: &[PgRow], columns: &[String]) -> Result<Vec<T>> {
        let mut results = Vec::with_capacity(rows.len());
        for row in rows {
            results.push(decode_row(row, columns)?);
        }
        Ok(results)
    }

    /// Decode a row through a JSON object keyed by the statement's column names
    fn decode_row<T: DeserializeOwned>(row: &PgRow, columns: &[String]) -> Result<T> {
        let mut object = serde_json::Map::with_capacity(row.len());
        for (index, column) in row.columns().iter().enumerate() {
            let key = columns
                .get(index)
                .cloned()
                .unwrap_or_else(|| column.name().to_string());
            object.insert(key, decode_column(row, index)?.to_json());
        }
        Ok(serde_json::from_value(serde_json::Value::Object(object))?)
    }

    fn decode_column(row: &PgRow, index: usize) -> Result<Value> {
        let type_name = row.column(index).type_info().name().to_string();
        let value = match type_name.as_str() {
            "BOOL" => row.try_get::<Option<bool>, _>(index)?.into(),
            "INT2" => row.try_get::<Option<i16>, _>(index)?.map(i32::from).into(),
            "INT4" => row.try_get::<Option<i32>, _>(index)?.into(),
            "INT8" => row.try_get::<Option<i64>, _>(index)?.into(),
            "FLOAT4" => row.try_get::<Option<f32>, _>(index)?.into(),
            "FLOAT8" => row.try_get::<Option<f64>, _>(index)?.into(),
            "BYTEA" => row.try_get::<Option<Vec<u8>>, _>(index)?.into(),
            "JSON" | "JSONB" => row.try_get::<Option<serde_json::Value>, _>(index)?.into(),
            #[cfg(feature = "uuid-support")]
            "UUID" => row.try_get::<Option<uuid::Uuid>, _>(index)?.into(),
            #[cfg(feature = "datetime-support")]
            "TIMESTAMPTZ" => row
                .try_get::<Option<chrono::DateTime<chrono::Utc>>, _>(index)?
                .into(),
            #[cfg(feature = "decimal-support")]
            "NUMERIC" => row.try_get::<Option<rust_decimal::Decimal>, _>(index)?.into(),
            _ => row.try_get::<Option<String>, _>(index)?.into(),
        };
        Ok(value)
    }

}
