//! The muon table: its column set and the per-event driver.
//!
//! Each call to [`MuonWriter::write`] runs selection, sorts the survivors by
//! descending pt, collects primary-vertex z positions, then emits exactly
//! `max_slots` rows. Slots past the last selected muon are padding.

use std::fmt;

use crate::config::WriterConfig;
use crate::constants::{MISSING_INT, PDG_ID_MUON, PROMPT_LEPTON_VETO};
use crate::cursor::SlotCursor;
use crate::error::Result;
use crate::event::{Event, IsolationType, Muon, Vertex};
use crate::fillers::{FillerError, SlotContext, VariableFillers};
use crate::quality::{CutBasedSelector, QualitySelector};
use crate::scalar::Column;
use crate::selection::{SelectionStats, extract_vertex_z, select_muons, sort_by_pt_desc};
use crate::writer::{TableSink, WriterXd};

/// Column fillers for the muon table, in output order.
pub fn muon_fillers() -> std::result::Result<VariableFillers<Muon>, FillerError> {
    let mut fillers = VariableFillers::new();

    fillers.add("pdgID", |_ctx| PDG_ID_MUON)?;
    fillers.add_object("pT", |m: &Muon, _ctx| m.pt)?;
    fillers.add_object("eta", |m: &Muon, _ctx| m.eta)?;
    fillers.add_object("phi", |m: &Muon, _ctx| m.phi)?;
    fillers.add_object("d0", |m: &Muon, _ctx| m.track().map_or(f32::NAN, |t| t.d0))?;
    fillers.add_object("d0_over_sigd0", |m: &Muon, _ctx| {
        m.track().map_or(f32::NAN, |t| t.d0_significance())
    })?;
    fillers.add_object("z0", |m: &Muon, _ctx| m.track().map_or(f32::NAN, |t| t.z0))?;
    // Vertex z is looked up at the muon's slot index, not matched to its
    // production vertex.
    fillers.add_object("dz0", |m: &Muon, ctx: &SlotContext<'_, Muon>| {
        match (m.track(), ctx.context_at_current()) {
            (Some(track), Some(vertex_z)) => track.z0 - vertex_z,
            _ => f32::NAN,
        }
    })?;
    for kind in IsolationType::ALL {
        fillers.add_object(kind.name(), move |m: &Muon, _ctx| {
            m.isolation(kind).unwrap_or(0.0)
        })?;
    }
    fillers.add_object("truth_type", |m: &Muon, _ctx| {
        m.track().map_or(MISSING_INT, |t| t.truth_type)
    })?;
    fillers.add_object("PLT", |m: &Muon, _ctx| {
        m.decoration(PROMPT_LEPTON_VETO).unwrap_or(f32::NAN)
    })?;

    Ok(fillers)
}

/// Schema of the muon table, for configuring sinks.
pub fn muon_columns() -> Vec<Column> {
    muon_fillers()
        .map(|f| f.columns())
        .unwrap_or_default()
}

/// Writes one fixed-width block of muon rows per event.
pub struct MuonWriter<S: TableSink> {
    config: WriterConfig,
    selector: Box<dyn QualitySelector>,
    cursor: SlotCursor,
    writer: WriterXd<Muon, S>,
    last_selection: SelectionStats,
}

impl<S: TableSink> MuonWriter<S> {
    /// Initializes the selector and checks the sink's schema and shape.
    /// Any failure here happens before a single event is processed.
    pub fn new(config: WriterConfig, mut selector: Box<dyn QualitySelector>, sink: S) -> Result<Self> {
        config.validate()?;
        selector.initialize()?;

        let writer = WriterXd::new(
            muon_fillers()?,
            vec![config.max_slots],
            sink,
            config.buffer_rows,
        )?;

        tracing::info!(
            dataset = %config.dataset,
            max_slots = config.max_slots,
            min_quality = %config.min_quality,
            "muon writer ready"
        );

        Ok(Self {
            config,
            selector,
            cursor: SlotCursor::new(1),
            writer,
            last_selection: SelectionStats::default(),
        })
    }

    /// Writer whose selector is a [`CutBasedSelector`] built from
    /// `config.selector`.
    pub fn from_config(config: WriterConfig, sink: S) -> Result<Self> {
        let selector = CutBasedSelector::new(config.selector.clone());
        Self::new(config, Box::new(selector), sink)
    }

    pub fn write(&mut self, event: &Event) -> Result<usize> {
        self.write_parts(&event.muons, &event.primary_vertices)
    }

    /// Select, order, and emit one event. Returns the number of rows
    /// emitted, which is always `max_slots`.
    pub fn write_parts(&mut self, muons: &[Option<Muon>], vertices: &[Vertex]) -> Result<usize> {
        let (mut selected, stats) =
            select_muons(muons, &*self.selector, self.config.min_quality);
        sort_by_pt_desc(&mut selected);
        let vertex_z = extract_vertex_z(vertices);

        let rows = self
            .writer
            .fill_while_incrementing(&mut self.cursor, &selected, &vertex_z)?;

        if stats.selected > self.config.max_slots {
            tracing::debug!(
                selected = stats.selected,
                max_slots = self.config.max_slots,
                "event has more selected muons than slots; lowest-pt muons dropped"
            );
        }
        tracing::debug!(
            event = self.writer.events_written(),
            candidates = stats.candidates,
            selected = stats.selected,
            dangling = stats.dangling,
            no_track = stats.no_track,
            bad_pt = stats.bad_pt,
            below_quality = stats.below_quality,
            "wrote muon event"
        );
        self.last_selection = stats;
        Ok(rows)
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()
    }

    /// Flush and close the sink, returning it. The writer cannot be used
    /// afterwards.
    pub fn finish(self) -> Result<S> {
        self.writer.close()
    }

    pub fn config(&self) -> &WriterConfig {
        &self.config
    }

    pub fn columns(&self) -> Vec<Column> {
        self.writer.columns()
    }

    pub fn events_written(&self) -> u64 {
        self.writer.events_written()
    }

    pub fn rows_written(&self) -> u64 {
        self.writer.rows_written()
    }

    /// Selection breakdown of the most recent event.
    pub fn last_selection(&self) -> SelectionStats {
        self.last_selection
    }
}

impl<S: TableSink> fmt::Debug for MuonWriter<S> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MuonWriter")
            .field("config", &self.config)
            .field("cursor", &self.cursor)
            .field("writer", &self.writer)
            .field("last_selection", &self.last_selection)
            .finish()
    }
}
