//! Fixed-shape buffered writer and the storage interface behind it.
//!
//! [`WriterXd`] evaluates a [`VariableFillers`] registry at every coordinate
//! of a fixed output shape, buffers the resulting rows, and hands them to a
//! [`TableSink`] in batches. Storage layout is entirely the sink's business.

use std::fmt;

use crate::cursor::SlotCursor;
use crate::error::{Result, WriterError};
use crate::fillers::{SlotContext, VariableFillers};
use crate::scalar::{Column, Row, Scalar};

/// Storage engine for fixed-shape tables.
///
/// A sink is configured with its schema and per-event shape when it is
/// created; the writer checks both against its fillers before writing.
/// Rows arrive in event order, each event contributing exactly
/// `shape.iter().product()` rows in row-major cursor order.
pub trait TableSink {
    type Error: std::error::Error + Send + Sync + 'static;

    fn columns(&self) -> &[Column];

    fn shape(&self) -> &[usize];

    fn write_rows(&mut self, rows: &[Row]) -> std::result::Result<(), Self::Error>;

    /// Flush anything the sink holds and release it. Writing afterwards is an error.
    fn close(&mut self) -> std::result::Result<(), Self::Error>;
}

/// Rows waiting to be handed to a sink.
#[derive(Debug)]
pub struct RowBuffer {
    rows: Vec<Row>,
    capacity: usize,
}

impl RowBuffer {
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        Self {
            rows: Vec::with_capacity(capacity),
            capacity,
        }
    }

    pub fn push(&mut self, row: Row) {
        self.rows.push(row);
    }

    pub fn is_full(&self) -> bool {
        self.rows.len() >= self.capacity
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn clear(&mut self) {
        self.rows.clear();
    }
}

/// Buffered writer for an N-dimensional slot table.
pub struct WriterXd<T, S: TableSink> {
    fillers: VariableFillers<T>,
    shape: Vec<usize>,
    sink: Option<S>,
    buffer: RowBuffer,
    events_written: u64,
    rows_written: u64,
}

impl<T, S: TableSink> WriterXd<T, S> {
    /// Fails if `shape` has a zero dimension or the sink's schema or shape
    /// differs from what the fillers declare.
    pub fn new(
        fillers: VariableFillers<T>,
        shape: Vec<usize>,
        sink: S,
        buffer_rows: usize,
    ) -> Result<Self> {
        if shape.contains(&0) {
            return Err(WriterError::InvalidShape(shape));
        }
        if sink.shape() != shape.as_slice() {
            return Err(WriterError::ShapeMismatch {
                expected: shape,
                found: sink.shape().to_vec(),
            });
        }
        let expected = fillers.columns();
        if sink.columns() != expected.as_slice() {
            return Err(WriterError::SchemaMismatch {
                expected,
                found: sink.columns().to_vec(),
            });
        }

        Ok(Self {
            fillers,
            shape,
            sink: Some(sink),
            buffer: RowBuffer::new(buffer_rows),
            events_written: 0,
            rows_written: 0,
        })
    }

    pub fn shape(&self) -> &[usize] {
        &self.shape
    }

    pub fn columns(&self) -> Vec<Column> {
        self.fillers.columns()
    }

    /// Rows emitted per event.
    pub fn rows_per_event(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn events_written(&self) -> u64 {
        self.events_written
    }

    /// Rows emitted so far, buffered or not.
    pub fn rows_written(&self) -> u64 {
        self.rows_written
    }

    pub fn buffered_rows(&self) -> usize {
        self.buffer.len()
    }

    pub fn is_closed(&self) -> bool {
        self.sink.is_none()
    }

    /// Walk `cursor` over every coordinate of the shape, evaluate all fillers
    /// at each one, and buffer the rows. Returns the number of rows emitted.
    pub fn fill_while_incrementing(
        &mut self,
        cursor: &mut SlotCursor,
        objects: &[&T],
        context: &[f32],
    ) -> Result<usize> {
        if self.sink.is_none() {
            return Err(WriterError::Closed);
        }
        if cursor.rank() != self.shape.len() {
            return Err(WriterError::CursorRank {
                expected: self.shape.len(),
                found: cursor.rank(),
            });
        }

        cursor.reset();
        let mut emitted = 0;
        loop {
            let row = self
                .fillers
                .fill_row(&SlotContext::new(objects, context, &*cursor));
            self.buffer.push(row);
            emitted += 1;
            if !cursor.advance(&self.shape) {
                break;
            }
        }

        self.events_written += 1;
        self.rows_written += emitted as u64;

        if self.buffer.is_full() {
            self.flush()?;
        }
        Ok(emitted)
    }

    /// Hand buffered rows to the sink. A no-op when nothing is buffered.
    pub fn flush(&mut self) -> Result<()> {
        let sink = self.sink.as_mut().ok_or(WriterError::Closed)?;
        if self.buffer.is_empty() {
            return Ok(());
        }
        sink.write_rows(self.buffer.rows())
            .map_err(WriterError::sink)?;
        tracing::debug!(rows = self.buffer.len(), "flushed row buffer");
        self.buffer.clear();
        Ok(())
    }

    /// Flush, close the sink, and give it back.
    pub fn close(mut self) -> Result<S> {
        self.flush()?;
        let mut sink = self.sink.take().ok_or(WriterError::Closed)?;
        sink.close().map_err(WriterError::sink)?;
        tracing::info!(
            events = self.events_written,
            rows = self.rows_written,
            "closed table writer"
        );
        Ok(sink)
    }
}

impl<T, S: TableSink> Drop for WriterXd<T, S> {
    fn drop(&mut self) {
        let Some(sink) = self.sink.as_mut() else {
            return;
        };
        if !self.buffer.is_empty() {
            if let Err(e) = sink.write_rows(self.buffer.rows()) {
                tracing::error!("failed to flush {} rows on drop: {e}", self.buffer.len());
            }
            self.buffer.clear();
        }
        if let Err(e) = sink.close() {
            tracing::error!("failed to close sink on drop: {e}");
        }
    }
}

impl<T, S: TableSink> fmt::Debug for WriterXd<T, S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("WriterXd")
            .field("columns", &self.fillers.columns())
            .field("shape", &self.shape)
            .field("buffered_rows", &self.buffer.len())
            .field("events_written", &self.events_written)
            .field("closed", &self.sink.is_none())
            .finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MemorySinkError {
    Closed,
    RowWidth { expected: usize, found: usize },
}

impl fmt::Display for MemorySinkError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            MemorySinkError::Closed => write!(f, "memory sink is closed"),
            MemorySinkError::RowWidth { expected, found } => {
                write!(f, "row has {found} cells, schema has {expected} columns")
            }
        }
    }
}

impl std::error::Error for MemorySinkError {}

/// Sink that keeps every row in memory. Useful for tests and for callers
/// that post-process the table themselves.
#[derive(Debug, Clone)]
pub struct MemorySink {
    columns: Vec<Column>,
    shape: Vec<usize>,
    rows: Vec<Row>,
    closed: bool,
    batches: usize,
}

impl MemorySink {
    pub fn new(columns: Vec<Column>, shape: Vec<usize>) -> Self {
        Self {
            columns,
            shape,
            rows: Vec::new(),
            closed: false,
            batches: 0,
        }
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn rows_per_event(&self) -> usize {
        self.shape.iter().product()
    }

    pub fn event_count(&self) -> usize {
        self.rows.len() / self.rows_per_event().max(1)
    }

    /// Rows belonging to event `i`, or an empty slice if it was never written.
    pub fn event(&self, i: usize) -> &[Row] {
        let n = self.rows_per_event();
        let Some(start) = i.checked_mul(n) else {
            return &[];
        };
        let Some(end) = start.checked_add(n) else {
            return &[];
        };
        self.rows.get(start..end).unwrap_or(&[])
    }

    /// All values of one column, by name.
    pub fn column(&self, name: &str) -> Option<Vec<Scalar>> {
        let idx = self.columns.iter().position(|c| c.name == name)?;
        Some(self.rows.iter().map(|row| row[idx]).collect())
    }

    /// Number of `write_rows` calls received.
    pub fn batches(&self) -> usize {
        self.batches
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }
}

impl TableSink for MemorySink {
    type Error = MemorySinkError;

    fn columns(&self) -> &[Column] {
        &self.columns
    }

    fn shape(&self) -> &[usize] {
        &self.shape
    }

    fn write_rows(&mut self, rows: &[Row]) -> std::result::Result<(), MemorySinkError> {
        if self.closed {
            return Err(MemorySinkError::Closed);
        }
        if let Some(bad) = rows.iter().find(|r| r.len() != self.columns.len()) {
            return Err(MemorySinkError::RowWidth {
                expected: self.columns.len(),
                found: bad.len(),
            });
        }
        self.rows.extend_from_slice(rows);
        self.batches += 1;
        Ok(())
    }

    fn close(&mut self) -> std::result::Result<(), MemorySinkError> {
        self.closed = true;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scalar::ScalarType;

    fn fillers() -> VariableFillers<i64> {
        let mut fillers = VariableFillers::new();
        fillers.add_object("value", |v: &i64, _ctx| *v).unwrap();
        fillers
            .add("slot", |ctx| ctx.cursor().indices().iter().sum::<usize>() as i32)
            .unwrap();
        fillers
    }

    fn sink(shape: Vec<usize>) -> MemorySink {
        MemorySink::new(
            vec![
                Column::new("value", ScalarType::I64),
                Column::new("slot", ScalarType::I32),
            ],
            shape,
        )
    }

    #[test]
    fn test_schema_mismatch_rejected() {
        let bad = MemorySink::new(vec![Column::new("value", ScalarType::F64)], vec![3]);
        let err = WriterXd::new(fillers(), vec![3], bad, 16).unwrap_err();
        assert!(matches!(err, WriterError::SchemaMismatch { .. }), "got {err}");
    }

    #[test]
    fn test_shape_mismatch_rejected() {
        let err = WriterXd::new(fillers(), vec![3], sink(vec![4]), 16).unwrap_err();
        assert!(matches!(err, WriterError::ShapeMismatch { .. }), "got {err}");
    }

    #[test]
    fn test_zero_dimension_rejected() {
        let err = WriterXd::new(fillers(), vec![0], sink(vec![0]), 16).unwrap_err();
        assert!(matches!(err, WriterError::InvalidShape(_)));
    }

    #[test]
    fn test_fill_pads_to_shape() {
        let mut writer = WriterXd::new(fillers(), vec![4], sink(vec![4]), 1024).unwrap();
        let mut cursor = SlotCursor::new(1);
        let values = [10i64, 20];
        let refs: Vec<&i64> = values.iter().collect();

        assert_eq!(writer.fill_while_incrementing(&mut cursor, &refs, &[]).unwrap(), 4);
        assert_eq!(writer.buffered_rows(), 4);

        let sink = writer.close().unwrap();
        assert!(sink.is_closed());
        let rows = sink.event(0);
        assert_eq!(rows.len(), 4);
        assert_eq!(rows[0], vec![Scalar::I64(10), Scalar::I32(0)]);
        assert_eq!(rows[1], vec![Scalar::I64(20), Scalar::I32(1)]);
        assert_eq!(rows[2], vec![Scalar::I64(-1), Scalar::I32(2)]);
        assert_eq!(rows[3], vec![Scalar::I64(-1), Scalar::I32(3)]);
    }

    #[test]
    fn test_two_dimensional_shape() {
        let mut writer = WriterXd::new(fillers(), vec![2, 3], sink(vec![2, 3]), 1024).unwrap();
        let mut cursor = SlotCursor::new(2);
        assert_eq!(writer.fill_while_incrementing(&mut cursor, &[], &[]).unwrap(), 6);
        let sink = writer.close().unwrap();
        let slots: Vec<i64> = sink
            .column("slot")
            .unwrap()
            .iter()
            .map(|s| s.as_i64().unwrap())
            .collect();
        assert_eq!(slots, vec![0, 1, 2, 1, 2, 3]);
    }

    #[test]
    fn test_cursor_rank_must_match() {
        let mut writer = WriterXd::new(fillers(), vec![4], sink(vec![4]), 1024).unwrap();
        let mut cursor = SlotCursor::new(2);
        let err = writer.fill_while_incrementing(&mut cursor, &[], &[]).unwrap_err();
        assert!(matches!(err, WriterError::CursorRank { expected: 1, found: 2 }));
    }

    #[test]
    fn test_flushes_when_buffer_full() {
        let mut writer = WriterXd::new(fillers(), vec![3], sink(vec![3]), 5).unwrap();
        let mut cursor = SlotCursor::new(1);

        writer.fill_while_incrementing(&mut cursor, &[], &[]).unwrap();
        assert_eq!(writer.buffered_rows(), 3);
        writer.fill_while_incrementing(&mut cursor, &[], &[]).unwrap();
        assert_eq!(writer.buffered_rows(), 0, "6 rows >= capacity 5 triggers a flush");
        writer.fill_while_incrementing(&mut cursor, &[], &[]).unwrap();

        assert_eq!(writer.events_written(), 3);
        assert_eq!(writer.rows_written(), 9);
        let sink = writer.close().unwrap();
        assert_eq!(sink.batches(), 2);
        assert_eq!(sink.event_count(), 3);
    }

    #[test]
    fn test_flush_is_repeatable() {
        let mut writer = WriterXd::new(fillers(), vec![2], sink(vec![2]), 1024).unwrap();
        let mut cursor = SlotCursor::new(1);
        writer.fill_while_incrementing(&mut cursor, &[], &[]).unwrap();
        writer.flush().unwrap();
        writer.flush().unwrap();
        let sink = writer.close().unwrap();
        assert_eq!(sink.batches(), 1);
        assert_eq!(sink.rows().len(), 2);
    }

    #[test]
    fn test_memory_sink_rejects_after_close() {
        let mut sink = sink(vec![1]);
        sink.close().unwrap();
        assert_eq!(sink.write_rows(&[]), Err(MemorySinkError::Closed));
    }

    #[test]
    fn test_memory_sink_checks_row_width() {
        let mut sink = sink(vec![1]);
        let err = sink.write_rows(&[vec![Scalar::I64(1)]]).unwrap_err();
        assert_eq!(err, MemorySinkError::RowWidth { expected: 2, found: 1 });
    }

    #[test]
    fn test_event_out_of_range_is_empty() {
        let sink = sink(vec![2]);
        assert!(sink.event(3).is_empty());
        assert!(sink.event(usize::MAX).is_empty());
        assert!(sink.event(usize::MAX / 2).is_empty());
    }
}
