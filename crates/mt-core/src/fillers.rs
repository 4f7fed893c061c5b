//! Named, typed per-slot column accessors.
//!
//! A [`VariableFillers`] registry holds one closure per output column. At
//! every cursor position the writer builds a [`SlotContext`] and evaluates
//! each closure against it, in registration order, to produce one row.
//! Closures see the event data only through that immutable context.

use std::collections::HashSet;
use std::fmt;

use crate::cursor::SlotCursor;
use crate::scalar::{Column, FillValue, Row, Scalar, ScalarType};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FillerError {
    EmptyName,
    DuplicateName(String),
}

impl fmt::Display for FillerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FillerError::EmptyName => write!(f, "filler name must not be empty"),
            FillerError::DuplicateName(name) => write!(f, "duplicate filler name: {name}"),
        }
    }
}

impl std::error::Error for FillerError {}

/// Read-only view handed to every filler call: the event's working set, its
/// auxiliary context, and the slot cursor.
pub struct SlotContext<'a, T> {
    objects: &'a [&'a T],
    context: &'a [f32],
    cursor: &'a SlotCursor,
}

impl<'a, T> SlotContext<'a, T> {
    pub fn new(objects: &'a [&'a T], context: &'a [f32], cursor: &'a SlotCursor) -> Self {
        Self {
            objects,
            context,
            cursor,
        }
    }

    /// Slot index along the primary dimension.
    pub fn index(&self) -> usize {
        self.cursor.primary()
    }

    pub fn cursor(&self) -> &'a SlotCursor {
        self.cursor
    }

    /// Number of objects in the working set.
    pub fn len(&self) -> usize {
        self.objects.len()
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty()
    }

    /// Object at the current slot, or `None` for a padding slot.
    pub fn current(&self) -> Option<&'a T> {
        self.objects.get(self.index()).copied()
    }

    /// Auxiliary context entry at the same positional index as the slot.
    pub fn context_at_current(&self) -> Option<f32> {
        self.context.get(self.index()).copied()
    }
}

type FillFn<T> = Box<dyn Fn(&SlotContext<'_, T>) -> Scalar>;

struct Filler<T> {
    column: Column,
    fill: FillFn<T>,
}

/// Ordered registry of column fillers over objects of type `T`.
pub struct VariableFillers<T> {
    fillers: Vec<Filler<T>>,
    names: HashSet<String>,
}

impl<T> VariableFillers<T> {
    pub fn new() -> Self {
        Self {
            fillers: Vec::new(),
            names: HashSet::new(),
        }
    }

    /// Register a raw filler. The closure decides what to do for padding
    /// slots itself; use [`add_object`](Self::add_object) for the usual
    /// "sentinel when empty" behaviour.
    pub fn add<V, F>(&mut self, name: &str, fill: F) -> Result<(), FillerError>
    where
        V: FillValue,
        F: Fn(&SlotContext<'_, T>) -> V + 'static,
    {
        self.check_name(name)?;
        self.push(
            name,
            V::TYPE,
            Box::new(move |ctx: &SlotContext<'_, T>| fill(ctx).into_scalar()),
        );
        Ok(())
    }

    /// Register a filler that only runs on occupied slots. Padding slots get
    /// the type's missing sentinel (NaN for floats, `MISSING_INT` for ints).
    pub fn add_object<V, F>(&mut self, name: &str, fill: F) -> Result<(), FillerError>
    where
        V: FillValue,
        F: Fn(&T, &SlotContext<'_, T>) -> V + 'static,
    {
        self.check_name(name)?;
        self.push(
            name,
            V::TYPE,
            Box::new(move |ctx: &SlotContext<'_, T>| match ctx.current() {
                Some(object) => fill(object, ctx).into_scalar(),
                None => V::MISSING.into_scalar(),
            }),
        );
        Ok(())
    }

    fn check_name(&self, name: &str) -> Result<(), FillerError> {
        if name.is_empty() {
            return Err(FillerError::EmptyName);
        }
        if self.names.contains(name) {
            return Err(FillerError::DuplicateName(name.to_string()));
        }
        Ok(())
    }

    fn push(&mut self, name: &str, ty: ScalarType, fill: FillFn<T>) {
        self.names.insert(name.to_string());
        self.fillers.push(Filler {
            column: Column::new(name, ty),
            fill,
        });
    }

    pub fn len(&self) -> usize {
        self.fillers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.fillers.is_empty()
    }

    /// Declared schema, in registration order.
    pub fn columns(&self) -> Vec<Column> {
        self.fillers.iter().map(|f| f.column.clone()).collect()
    }

    /// Evaluate every filler at the context's cursor position.
    pub fn fill_row(&self, ctx: &SlotContext<'_, T>) -> Row {
        self.fillers.iter().map(|f| (f.fill)(ctx)).collect()
    }
}

impl<T> Default for VariableFillers<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> fmt::Debug for VariableFillers<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("VariableFillers")
            .field("columns", &self.columns())
            .finish()
    }
}
