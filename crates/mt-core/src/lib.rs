//! Fixed-slot muon tables.
//!
//! Turns each event's variable-length muon container into exactly N rows of
//! typed columns: select muons passing a quality tier, sort them by
//! descending pt, then evaluate a registry of per-slot column fillers while a
//! slot cursor walks 0..N. Slots without a muon are padded with sentinels.
//!
//! Zero I/O. Storage engines plug in through [`TableSink`].

pub mod config;
pub mod constants;
pub mod cursor;
pub mod error;
pub mod event;
pub mod fillers;
pub mod muon;
pub mod quality;
pub mod scalar;
pub mod selection;
pub mod writer;

pub use config::WriterConfig;
pub use constants::{
    DEFAULT_BUFFER_ROWS, DEFAULT_DATASET, DEFAULT_MAX_SLOTS, MISSING_INT, PDG_ID_MUON,
    PROMPT_LEPTON_VETO,
};
pub use cursor::SlotCursor;
pub use error::{Result, WriterError};
pub use event::{Event, IsolationType, Muon, TrackParticle, Vertex};
pub use fillers::{FillerError, SlotContext, VariableFillers};
pub use muon::{MuonWriter, muon_columns, muon_fillers};
pub use quality::{
    CutBasedSelector, FixedQuality, Quality, QualitySelector, SelectorCuts, SelectorError, TierCut,
};
pub use scalar::{Column, FillValue, Row, Scalar, ScalarType};
pub use selection::{SelectionStats, extract_vertex_z, select_muons, sort_by_pt_desc};
pub use writer::{MemorySink, MemorySinkError, RowBuffer, TableSink, WriterXd};
