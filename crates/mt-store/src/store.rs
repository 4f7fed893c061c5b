use std::path::Path;

use rusqlite::types::Value;
use rusqlite::{Connection, OptionalExtension, params, params_from_iter};
use serde::Serialize;
use uuid::Uuid;

use mt_core::config::is_identifier;
use mt_core::{Column, Row, Scalar, ScalarType, TableSink, WriterConfig, muon_columns};

use crate::error::{Result, StoreError};
use crate::schema::{self, quote_ident, slot_column};

/// Declared layout of one dataset table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DatasetInfo {
    pub name: String,
    pub columns: Vec<Column>,
    pub shape: Vec<usize>,
}

impl DatasetInfo {
    pub fn rows_per_event(&self) -> usize {
        self.shape.iter().product()
    }
}

/// One writer session against a dataset.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RunInfo {
    pub id: String,
    pub dataset: String,
    pub first_event: i64,
    pub events: i64,
    pub rows: i64,
    pub started_at: String,
    pub closed_at: Option<String>,
}

#[derive(Debug)]
pub struct Store {
    conn: Connection,
}

impl Store {
    pub fn open(path: &Path) -> Result<Self> {
        let conn = Connection::open(path)?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self { conn })
    }

    pub fn conn(&self) -> &Connection {
        &self.conn
    }

    // --- Metadata ---

    pub fn get_metadata(&self, key: &str) -> Result<Option<String>> {
        let mut stmt = self
            .conn
            .prepare("SELECT value FROM metadata WHERE key = ?1")?;
        let result = stmt.query_row([key], |row| row.get(0)).ok();
        Ok(result)
    }

    pub fn set_metadata(&self, key: &str, value: &str) -> Result<()> {
        self.conn.execute(
            "INSERT OR REPLACE INTO metadata (key, value) VALUES (?1, ?2)",
            params![key, value],
        )?;
        Ok(())
    }

    // --- Datasets ---

    /// Register a dataset and create its row table. Re-registering with
    /// the same columns and shape is a no-op; anything else is rejected.
    pub fn create_dataset(&self, name: &str, columns: &[Column], shape: &[usize]) -> Result<()> {
        if !is_identifier(name) {
            return Err(StoreError::InvalidData(format!(
                "dataset name '{name}' is not an identifier"
            )));
        }
        if shape.is_empty() || shape.contains(&0) {
            return Err(StoreError::InvalidData(format!(
                "dataset shape {shape:?} must be non-empty with positive extents"
            )));
        }
        if columns.is_empty() {
            return Err(StoreError::InvalidData("dataset has no columns".into()));
        }

        if let Some(existing) = self.dataset_schema(name)? {
            if existing.columns != columns || existing.shape != shape {
                return Err(StoreError::SchemaMismatch(format!(
                    "dataset '{name}' already exists with {} columns and shape {:?}",
                    existing.columns.len(),
                    existing.shape
                )));
            }
            return Ok(());
        }

        let columns_json = serde_json::to_string(columns)
            .map_err(|e| StoreError::InvalidData(e.to_string()))?;
        let shape_json =
            serde_json::to_string(shape).map_err(|e| StoreError::InvalidData(e.to_string()))?;

        let tx = self.conn.unchecked_transaction()?;
        tx.execute(
            "INSERT INTO datasets (name, columns, shape) VALUES (?1, ?2, ?3)",
            params![name, columns_json, shape_json],
        )?;
        schema::create_dataset_table(&tx, name, columns, shape.len())?;
        tx.commit()?;

        tracing::info!(dataset = name, columns = columns.len(), ?shape, "created dataset");
        Ok(())
    }

    pub fn dataset_schema(&self, name: &str) -> Result<Option<DatasetInfo>> {
        let raw: Option<(String, String)> = self
            .conn
            .query_row(
                "SELECT columns, shape FROM datasets WHERE name = ?1",
                [name],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        let Some((columns_json, shape_json)) = raw else {
            return Ok(None);
        };
        let columns: Vec<Column> = serde_json::from_str(&columns_json)
            .map_err(|e| StoreError::InvalidData(format!("columns of '{name}': {e}")))?;
        let shape: Vec<usize> = serde_json::from_str(&shape_json)
            .map_err(|e| StoreError::InvalidData(format!("shape of '{name}': {e}")))?;
        Ok(Some(DatasetInfo {
            name: name.to_string(),
            columns,
            shape,
        }))
    }

    pub fn list_datasets(&self) -> Result<Vec<String>> {
        let mut stmt = self.conn.prepare("SELECT name FROM datasets ORDER BY name")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn require_dataset(&self, name: &str) -> Result<DatasetInfo> {
        self.dataset_schema(name)?
            .ok_or_else(|| StoreError::InvalidData(format!("unknown dataset '{name}'")))
    }

    /// Number of distinct events stored in a dataset.
    pub fn event_count(&self, dataset: &str) -> Result<u64> {
        let info = self.require_dataset(dataset)?;
        let count: i64 = self.conn.query_row(
            &format!(
                "SELECT COUNT(DISTINCT event) FROM {}",
                quote_ident(&info.name)
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(count as u64)
    }

    fn next_event(&self, dataset: &str) -> Result<i64> {
        let next: i64 = self.conn.query_row(
            &format!(
                "SELECT COALESCE(MAX(event) + 1, 0) FROM {}",
                quote_ident(dataset)
            ),
            [],
            |row| row.get(0),
        )?;
        Ok(next)
    }

    // --- Read-back ---

    /// All rows of a dataset in write order. Stored NULLs read back as NaN.
    pub fn load_rows(&self, dataset: &str) -> Result<Vec<Row>> {
        let info = self.require_dataset(dataset)?;
        self.query_rows(&info, None)
    }

    /// The rows of one event, in slot order.
    pub fn load_event(&self, dataset: &str, event: u64) -> Result<Vec<Row>> {
        let info = self.require_dataset(dataset)?;
        self.query_rows(&info, Some(event as i64))
    }

    fn query_rows(&self, info: &DatasetInfo, event: Option<i64>) -> Result<Vec<Row>> {
        let select = info
            .columns
            .iter()
            .map(|c| quote_ident(&c.name))
            .collect::<Vec<_>>()
            .join(", ");
        let table = quote_ident(&info.name);
        let sql = match event {
            Some(_) => format!("SELECT {select} FROM {table} WHERE event = ?1 ORDER BY row_id"),
            None => format!("SELECT {select} FROM {table} ORDER BY row_id"),
        };

        let width = info.columns.len();
        let mut stmt = self.conn.prepare(&sql)?;
        let read = |row: &rusqlite::Row<'_>| {
            (0..width)
                .map(|i| row.get::<_, Value>(i))
                .collect::<std::result::Result<Vec<Value>, _>>()
        };
        let raw = match event {
            Some(e) => stmt
                .query_map([e], read)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
            None => stmt
                .query_map([], read)?
                .collect::<std::result::Result<Vec<_>, _>>()?,
        };

        raw.into_iter()
            .map(|values| {
                values
                    .into_iter()
                    .zip(&info.columns)
                    .map(|(v, c)| scalar_from_sql(v, c))
                    .collect()
            })
            .collect()
    }

    pub fn runs(&self, dataset: &str) -> Result<Vec<RunInfo>> {
        let mut stmt = self.conn.prepare(
            "SELECT id, dataset, first_event, events, rows, started_at, closed_at
             FROM runs WHERE dataset = ?1 ORDER BY first_event, started_at",
        )?;
        let runs = stmt
            .query_map([dataset], |row| {
                Ok(RunInfo {
                    id: row.get(0)?,
                    dataset: row.get(1)?,
                    first_event: row.get(2)?,
                    events: row.get(3)?,
                    rows: row.get(4)?,
                    started_at: row.get(5)?,
                    closed_at: row.get(6)?,
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;
        Ok(runs)
    }

    // --- Sinks ---

    /// Turn this store into a sink appending to `dataset`. The dataset is
    /// created on first use; event numbering continues after existing rows.
    pub fn into_sink(self, dataset: &str, columns: Vec<Column>, shape: Vec<usize>) -> Result<SqliteSink> {
        self.create_dataset(dataset, &columns, &shape)?;
        let first_event = self.next_event(dataset)?;
        let run_id = Uuid::new_v4().to_string();

        self.conn.execute(
            "INSERT INTO runs (id, dataset, first_event) VALUES (?1, ?2, ?3)",
            params![run_id, dataset, first_event],
        )?;

        let placeholders = (1..=3 + shape.len() + columns.len())
            .map(|i| format!("?{i}"))
            .collect::<Vec<_>>()
            .join(", ");
        let names = ["run_id".to_string(), "event".to_string()]
            .into_iter()
            .chain((0..shape.len()).map(slot_column))
            .chain(columns.iter().map(|c| quote_ident(&c.name)))
            .collect::<Vec<_>>()
            .join(", ");
        let insert_sql = format!(
            "INSERT INTO {} ({names}) VALUES ({placeholders})",
            quote_ident(dataset)
        );

        tracing::info!(dataset, run_id = %run_id, first_event, "opened sqlite sink");
        Ok(SqliteSink {
            store: self,
            dataset: dataset.to_string(),
            columns,
            shape,
            run_id,
            first_event,
            rows_written: 0,
            closed: false,
            insert_sql,
        })
    }

    /// Sink laid out for the muon column set and `config.max_slots` slots.
    pub fn muon_sink(self, config: &WriterConfig) -> Result<SqliteSink> {
        let dataset = config.dataset.clone();
        self.into_sink(&dataset, muon_columns(), vec![config.max_slots])
    }
}

fn scalar_from_sql(value: Value, column: &Column) -> Result<Scalar> {
    let bad = |v: &Value| {
        StoreError::InvalidData(format!(
            "column '{}' ({}) holds {v:?}",
            column.name, column.ty
        ))
    };
    let scalar = match (column.ty, value) {
        (ScalarType::I32, Value::Integer(v)) => {
            Scalar::I32(i32::try_from(v).map_err(|_| bad(&Value::Integer(v)))?)
        }
        (ScalarType::I64, Value::Integer(v)) => Scalar::I64(v),
        (ScalarType::F32, Value::Real(v)) => Scalar::F32(v as f32),
        (ScalarType::F32, Value::Integer(v)) => Scalar::F32(v as f32),
        (ScalarType::F32, Value::Null) => Scalar::F32(f32::NAN),
        (ScalarType::F64, Value::Real(v)) => Scalar::F64(v),
        (ScalarType::F64, Value::Integer(v)) => Scalar::F64(v as f64),
        (ScalarType::F64, Value::Null) => Scalar::F64(f64::NAN),
        (_, other) => return Err(bad(&other)),
    };
    Ok(scalar)
}

fn scalar_to_sql(scalar: &Scalar) -> Value {
    match *scalar {
        Scalar::I32(v) => Value::Integer(v.into()),
        Scalar::I64(v) => Value::Integer(v),
        Scalar::F32(v) if v.is_nan() => Value::Null,
        Scalar::F32(v) => Value::Real(v.into()),
        Scalar::F64(v) if v.is_nan() => Value::Null,
        Scalar::F64(v) => Value::Real(v),
    }
}

/// Appends rows of one run to a dataset table.
#[derive(Debug)]
pub struct SqliteSink {
    store: Store,
    dataset: String,
    columns: Vec<Column>,
    shape: Vec<usize>,
    run_id: String,
    first_event: i64,
    rows_written: u64,
    closed: bool,
    insert_sql: String,
}

impl SqliteSink {
    pub fn dataset(&self) -> &str {
        &self.dataset
    }

    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    pub fn first_event(&self) -> i64 {
        self.first_event
    }

    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    pub fn into_store(self) -> Store {
        self.store
    }

    fn rows_per_event(&self) -> u64 {
        self.shape.iter().product::<usize>() as u64
    }

    fn events_complete(&self) -> u64 {
        self.rows_written / self.rows_per_event()
    }

    /// Event number and slot coordinates of the `index`-th row of this run.
    fn coordinates(&self, index: u64) -> (i64, Vec<i64>) {
        let per_event = self.rows_per_event();
        let event = self.first_event + (index / per_event) as i64;
        let mut offset = (index % per_event) as usize;
        let mut slots = vec![0i64; self.shape.len()];
        for (dim, extent) in self.shape.iter().enumerate().rev() {
            slots[dim] = (offset % extent) as i64;
            offset /= extent;
        }
        (event, slots)
    }
}

impl TableSink for SqliteSink {
    type Error = StoreError;

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn write_rows(&mut self, rows: &[Row]) -> Result<()> {
        if self.closed {
            return Err(StoreError::Closed);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(StoreError::InvalidData(format!(
                "row has {} cells, dataset '{}' has {} columns",
                bad.len(),
                self.dataset,
                self.columns.len()
            )));
        }

        let tx = self.store.conn.unchecked_transaction()?;
        {
            let mut stmt = tx.prepare_cached(&self.insert_sql)?;
            for (i, row) in rows.iter().enumerate() {
                let (event, slots) = self.coordinates(self.rows_written + i as u64);
                let values = [Value::Text(self.run_id.clone()), Value::Integer(event)]
                    .into_iter()
                    .chain(slots.into_iter().map(Value::Integer))
                    .chain(row.iter().map(scalar_to_sql));
                stmt.execute(params_from_iter(values))?;
            }
        }
        let rows_total = self.rows_written + rows.len() as u64;
        tx.execute(
            "UPDATE runs SET events = ?1, rows = ?2 WHERE id = ?3",
            params![
                (rows_total / self.rows_per_event()) as i64,
                rows_total as i64,
                self.run_id
            ],
        )?;
        tx.commit()?;

        self.rows_written = rows_total;
        tracing::debug!(dataset = %self.dataset, rows = rows.len(), "inserted rows");
        Ok(())
    }

    fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        if self.rows_written % self.rows_per_event() != 0 {
            tracing::warn!(
                dataset = %self.dataset,
                rows = self.rows_written,
                "closing sink with a partial event"
            );
        }
        self.store.conn.execute(
            "UPDATE runs SET closed_at = datetime('now'), events = ?1, rows = ?2 WHERE id = ?3",
            params![
                self.events_complete() as i64,
                self.rows_written as i64,
                self.run_id
            ],
        )?;
        self.closed = true;

        if let Err(e) = self
            .store
            .conn
            .execute_batch("PRAGMA wal_checkpoint(TRUNCATE);")
        {
            tracing::debug!("WAL checkpoint after close skipped: {e}");
        }
        tracing::info!(
            dataset = %self.dataset,
            run_id = %self.run_id,
            events = self.events_complete(),
            rows = self.rows_written,
            "closed sqlite sink"
        );
        Ok(())
    }
}
