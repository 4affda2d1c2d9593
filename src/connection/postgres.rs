//! PostgreSQL implementation of [`QueryExecutor`] on top of `tokio-postgres`.
//!
//! The executor owns a current-thread tokio runtime and blocks on every
//! statement, so callers see a plain synchronous session. Do not create or
//! drop it from inside another tokio runtime.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use tokio::runtime::{Builder, Runtime};
use tokio::task::JoinHandle;
use tokio_postgres::types::Type;
use tokio_postgres::{Client, NoTls};
use tracing::{debug, error, info};

use super::config::ConnectionConfig;
use super::{QueryExecutor, is_read_statement};
use crate::core::{DateShiftError, Result, Row, Value};
use crate::result::QueryResult;

pub struct PostgresExecutor {
    runtime: Runtime,
    client: Option<Client>,
    connection_task: Option<JoinHandle<()>>,
}

impl PostgresExecutor {
    pub fn connect(config: &ConnectionConfig) -> Result<Self> {
        config.validate()?;

        let runtime = Builder::new_current_thread()
            .enable_all()
            .build()
            .map_err(|e| DateShiftError::Connection(e.to_string()))?;

        let (client, connection) = runtime
            .block_on(config.to_pg_config().connect(NoTls))
            .map_err(|e| {
                error!(url = %config.to_url(), error = %e, "couldn't establish connection");
                DateShiftError::Connection(e.to_string())
            })?;

        let connection_task = runtime.spawn(async move {
            if let Err(e) = connection.await {
                error!(error = %e, "connection error");
            }
        });

        info!(url = %config.to_url(), "connected to database");

        Ok(Self {
            runtime,
            client: Some(client),
            connection_task: Some(connection_task),
        })
    }

    /// Close the session. Idempotent; also invoked on drop.
    pub fn close(&mut self) -> Result<()> {
        let Some(client) = self.client.take() else {
            return Ok(());
        };
        // The connection future resolves once its last client is gone.
        drop(client);

        if let Some(task) = self.connection_task.take() {
            self.runtime.block_on(task).map_err(|e| {
                error!(error = %e, "couldn't close the connection");
                DateShiftError::Connection(e.to_string())
            })?;
        }

        info!("closed connection");
        Ok(())
    }

    fn query(&self, client: &Client, sql: &str) -> Result<QueryResult> {
        self.runtime.block_on(async {
            let statement = client
                .prepare(sql)
                .await
                .map_err(|e| DateShiftError::query(sql, e))?;

            let columns = statement
                .columns()
                .iter()
                .map(|column| column.name().to_string())
                .collect();

            let rows = client
                .query(&statement, &[])
                .await
                .map_err(|e| DateShiftError::query(sql, e))?;

            let rows = rows
                .iter()
                .map(convert_row)
                .collect::<Result<Vec<Row>>>()?;

            Ok::<_, DateShiftError>(QueryResult::new(columns, rows))
        })
    }

    fn write(&self, client: &Client, sql: &str) -> Result<QueryResult> {
        // Outside an explicit transaction every statement commits on its own.
        let affected = self
            .runtime
            .block_on(client.execute(sql, &[]))
            .map_err(|e| DateShiftError::query(sql, e))?;
        debug!(affected, "statement committed");
        Ok(QueryResult::empty())
    }
}

impl QueryExecutor for PostgresExecutor {
    fn execute(&mut self, sql: &str) -> Result<QueryResult> {
        let client = self.client.as_ref().ok_or(DateShiftError::ConnectionClosed)?;

        let result = if is_read_statement(sql) {
            self.query(client, sql)
        } else {
            self.write(client, sql)
        };

        match &result {
            Ok(_) => debug!(statement = sql, "executed query"),
            Err(e) => error!(statement = sql, error = %e, "error executing query"),
        }
        result
    }
}

impl Drop for PostgresExecutor {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

fn convert_row(row: &tokio_postgres::Row) -> Result<Row> {
    row.columns()
        .iter()
        .enumerate()
        .map(|(idx, column)| convert_cell(row, idx, column.type_()))
        .collect()
}

fn convert_cell(row: &tokio_postgres::Row, idx: usize, ty: &Type) -> Result<Value> {
    let cell = if *ty == Type::DATE {
        row.try_get::<_, Option<NaiveDate>>(idx).map(Value::from)
    } else if *ty == Type::TIMESTAMP {
        row.try_get::<_, Option<NaiveDateTime>>(idx).map(Value::from)
    } else if *ty == Type::TIMESTAMPTZ {
        row.try_get::<_, Option<DateTime<Utc>>>(idx)
            .map(|v| Value::from(v.map(|dt| dt.naive_utc())))
    } else if *ty == Type::TEXT || *ty == Type::VARCHAR || *ty == Type::BPCHAR || *ty == Type::NAME
    {
        row.try_get::<_, Option<String>>(idx).map(Value::from)
    } else if *ty == Type::BOOL {
        row.try_get::<_, Option<bool>>(idx).map(Value::from)
    } else if *ty == Type::INT2 {
        row.try_get::<_, Option<i16>>(idx)
            .map(|v| Value::from(v.map(i64::from)))
    } else if *ty == Type::INT4 {
        row.try_get::<_, Option<i32>>(idx)
            .map(|v| Value::from(v.map(i64::from)))
    } else if *ty == Type::INT8 {
        row.try_get::<_, Option<i64>>(idx).map(Value::from)
    } else if *ty == Type::FLOAT4 {
        row.try_get::<_, Option<f32>>(idx)
            .map(|v| Value::from(v.map(f64::from)))
    } else if *ty == Type::FLOAT8 {
        row.try_get::<_, Option<f64>>(idx).map(Value::from)
    } else {
        return Err(DateShiftError::UnsupportedType(ty.name().to_string()));
    };

    cell.map_err(|e| DateShiftError::TypeMismatch(e.to_string()))
}
