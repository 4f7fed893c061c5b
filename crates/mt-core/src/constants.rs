/// PDG Monte Carlo particle code for the muon
pub const PDG_ID_MUON: i32 = 13;

/// Sentinel written to integer columns at slots with no selected muon.
/// Truth-classifier tags are non-negative, so -1 never collides with data.
pub const MISSING_INT: i32 = -1;

/// Slots per event in the muon table
pub const DEFAULT_MAX_SLOTS: usize = 20;

/// Rows held in memory before the writer pushes them to the sink
pub const DEFAULT_BUFFER_ROWS: usize = 1024;

/// Default dataset (table) name for the muon columns
pub const DEFAULT_DATASET: &str = "muons";

/// Decoration name carrying the prompt-lepton-veto score
pub const PROMPT_LEPTON_VETO: &str = "PromptLeptonVeto";
