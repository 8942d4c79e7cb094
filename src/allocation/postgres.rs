//! PostgreSQL allocation backend.
//!
//! Workers are plain threads, so the async client is driven with
//! `Handle::block_on` on the runtime the worker belongs to. Each connection's
//! I/O task is spawned on that same runtime.

use log::{debug, warn};
use thiserror::Error;
use tokio::runtime::{Handle, TryCurrentError};
use tokio_postgres::types::{ToSql, Type};
use tokio_postgres::{Client, NoTls, Row as PgRow};
use serde_json::Value;

use crate::allocation::backend::{AllocationBackend, AllocationRequest, BackendError, Row};
use crate::pool::{ConnectionPool, DirectConnector, ManageConnection, PoolConfig};

/// The allocation procedure call. All inputs are bound parameters.
pub const ALLOCATION_QUERY: &str = "SELECT * FROM process_id_allocation($1::text[], $2::text, $3::bigint)";

#[derive(Debug, Error)]
pub enum PgError {
    #[error("postgres error: {0}")]
    Postgres(#[from] tokio_postgres::Error),

    #[error("backend calls must run inside the server runtime: {0}")]
    NoRuntime(#[from] TryCurrentError),

    #[error("failed to decode column: {0}")]
    Decode(String),
}

/// Opens PostgreSQL connections for a DSN.
#[derive(Debug, Clone)]
pub struct PgManager {
    dsn: String,
}

impl PgManager {
    pub fn new(dsn: impl Into<String>) -> Self {
        Self { dsn: dsn.into() }
    }
}

/// An open PostgreSQL session.
pub struct PgConnection {
    client: Client,
    handle: Handle,
}

impl PgConnection {
    pub fn is_closed(&self) -> bool {
        self.client.is_closed()
    }

    /// Run a query to completion and decode every row.
    pub fn query(&self, sql: &str, params: &[&(dyn ToSql + Sync)]) -> Result<Vec<Row>, PgError> {
        let rows = self.handle.block_on(self.client.query(sql, params))?;
        rows.iter().map(decode_row).collect()
    }

    /// Call the allocation procedure.
    pub fn allocate(&self, request: &AllocationRequest) -> Result<Vec<Row>, PgError> {
        self.query(
            ALLOCATION_QUERY,
            &[&request.vids, &request.graph_id, &request.updated_nanosecond],
        )
    }
}

impl ManageConnection for PgManager {
    type Connection = PgConnection;
    type Error = PgError;

    fn connect(&self) -> Result<PgConnection, PgError> {
        let handle = Handle::try_current()?;
        let (client, connection) = handle.block_on(tokio_postgres::connect(&self.dsn, NoTls))?;

        handle.spawn(async move {
            if let Err(e) = connection.await {
                warn!("Backend connection closed with error: {e}");
            }
        });

        Ok(PgConnection { client, handle })
    }

    fn has_broken(&self, conn: &mut PgConnection) -> bool {
        conn.is_closed()
    }
}

fn decode_row(row: &PgRow) -> Result<Row, PgError> {
    let mut decoded = Row::new();
    for (idx, column) in row.columns().iter().enumerate() {
        decoded.insert(column.name().to_string(), decode_value(row, idx, column.type_())?);
    }
    Ok(decoded)
}

fn decode_value(row: &PgRow, idx: usize, ty: &Type) -> Result<Value, PgError> {
    let value = match *ty {
        Type::BOOL => row.try_get::<_, Option<bool>>(idx).map(|v| v.map(Value::from)),
        Type::INT2 => row.try_get::<_, Option<i16>>(idx).map(|v| v.map(Value::from)),
        Type::INT4 => row.try_get::<_, Option<i32>>(idx).map(|v| v.map(Value::from)),
        Type::INT8 => row.try_get::<_, Option<i64>>(idx).map(|v| v.map(Value::from)),
        Type::FLOAT4 => row.try_get::<_, Option<f32>>(idx).map(|v| v.map(Value::from)),
        Type::FLOAT8 => row.try_get::<_, Option<f64>>(idx).map(|v| v.map(Value::from)),
        Type::JSON | Type::JSONB => row.try_get::<_, Option<Value>>(idx),
        Type::TEXT_ARRAY | Type::VARCHAR_ARRAY => row
            .try_get::<_, Option<Vec<String>>>(idx)
            .map(|v| v.map(Value::from)),
        _ => row.try_get::<_, Option<String>>(idx).map(|v| v.map(Value::from)),
    };

    value
        .map(|v| v.unwrap_or(Value::Null))
        .map_err(|e| PgError::Decode(format!("column {idx} of type {ty}: {e}")))
}

/// Where the allocator gets its connection from.
enum ConnectionSource {
    /// A new autocommit connection per call, closed right after.
    Direct(DirectConnector<PgManager>),
    /// A bounded shared pool.
    Pooled(ConnectionPool<PgManager>),
}

/// [`AllocationBackend`] backed by the `process_id_allocation` procedure.
pub struct PgAllocator {
    source: ConnectionSource,
}

impl PgAllocator {
    /// Open a fresh connection for every allocation.
    pub fn direct(dsn: impl Into<String>) -> Self {
        Self {
            source: ConnectionSource::Direct(DirectConnector::new(PgManager::new(dsn))),
        }
    }

    /// Borrow connections from a pool.
    pub fn pooled(dsn: impl Into<String>, config: PoolConfig) -> Self {
        Self {
            source: ConnectionSource::Pooled(ConnectionPool::new(PgManager::new(dsn), config)),
        }
    }

    /// Open the pool's minimum connections. A no-op in direct mode.
    pub fn warm_up(&self) -> Result<(), BackendError> {
        match &self.source {
            ConnectionSource::Direct(_) => Ok(()),
            ConnectionSource::Pooled(pool) => Ok(pool.initialize()?),
        }
    }
}

impl AllocationBackend for PgAllocator {
    fn allocate(&self, request: &AllocationRequest) -> Result<Vec<Row>, BackendError> {
        let rows = match &self.source {
            ConnectionSource::Direct(connector) => {
                // Dropped at the end of the arm, closing the session.
                let conn = connector.connect()?;
                conn.allocate(request)?
            }
            ConnectionSource::Pooled(pool) => allocate_pooled(pool, |conn| conn.allocate(request))?,
        };

        debug!("process_id_allocation returned {count} rows", count = rows.len());
        Ok(rows)
    }
}

/// Run `call` on a pooled connection. A connection the manager reports broken
/// after a failed call is discarded instead of going back to the idle set.
fn allocate_pooled<M, F>(pool: &ConnectionPool<M>, call: F) -> Result<Vec<Row>, BackendError>
where
    M: ManageConnection<Error = PgError>,
    F: FnOnce(&M::Connection) -> Result<Vec<Row>, PgError>,
{
    let mut conn = pool.acquire()?;
    match call(&*conn) {
        Ok(rows) => Ok(rows),
        Err(e) => {
            if pool.manager().has_broken(&mut conn) {
                debug!("Connection broken after failed call: {e}");
                conn.mark_broken();
            }
            Err(e.into())
        }
    }
}
