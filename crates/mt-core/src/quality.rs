//! Muon quality tiers and the selector capability that assigns them.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::event::Muon;

/// Reconstruction-confidence tier. Ordered loosest to tightest, so
/// `quality >= Quality::Medium` reads as "at least Medium".
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Quality {
    VeryLoose,
    Loose,
    #[default]
    Medium,
    Tight,
}

impl fmt::Display for Quality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Quality::VeryLoose => "VeryLoose",
            Quality::Loose => "Loose",
            Quality::Medium => "Medium",
            Quality::Tight => "Tight",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum SelectorError {
    InvalidCut(String),
}

impl fmt::Display for SelectorError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SelectorError::InvalidCut(msg) => write!(f, "invalid selector cut: {msg}"),
        }
    }
}

impl std::error::Error for SelectorError {}

/// Assigns a quality tier to a muon.
///
/// `initialize` runs once before the first event. A failure there aborts the
/// writer before anything is written.
pub trait QualitySelector {
    fn initialize(&mut self) -> Result<(), SelectorError> {
        Ok(())
    }

    fn quality(&self, muon: &Muon) -> Quality;
}

/// Every muon gets the same tier.
#[derive(Debug, Clone, Copy)]
pub struct FixedQuality(pub Quality);

impl QualitySelector for FixedQuality {
    fn quality(&self, _muon: &Muon) -> Quality {
        self.0
    }
}

/// Kinematic acceptance for one tier.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TierCut {
    /// Minimum transverse momentum (MeV)
    pub min_pt: f32,
    pub max_abs_eta: f32,
}

/// Cut thresholds for [`CutBasedSelector`]. Anything failing `loose` is VeryLoose.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SelectorCuts {
    pub tight: TierCut,
    pub medium: TierCut,
    pub loose: TierCut,
}

impl Default for SelectorCuts {
    fn default() -> Self {
        Self {
            tight: TierCut {
                min_pt: 10_000.0,
                max_abs_eta: 2.5,
            },
            medium: TierCut {
                min_pt: 5_000.0,
                max_abs_eta: 2.5,
            },
            loose: TierCut {
                min_pt: 3_000.0,
                max_abs_eta: 2.7,
            },
        }
    }
}

/// Simple pt/|eta| tiering. Muons without an inner-detector track never
/// rise above VeryLoose.
#[derive(Debug, Clone)]
pub struct CutBasedSelector {
    cuts: SelectorCuts,
}

impl CutBasedSelector {
    pub fn new(cuts: SelectorCuts) -> Self {
        Self { cuts }
    }

    pub fn cuts(&self) -> &SelectorCuts {
        &self.cuts
    }

    fn passes(cut: &TierCut, muon: &Muon) -> bool {
        muon.pt >= cut.min_pt && muon.eta.abs() <= cut.max_abs_eta
    }
}

impl Default for CutBasedSelector {
    fn default() -> Self {
        Self::new(SelectorCuts::default())
    }
}

impl QualitySelector for CutBasedSelector {
    fn initialize(&mut self) -> Result<(), SelectorError> {
        let tiers = [
            ("loose", &self.cuts.loose),
            ("medium", &self.cuts.medium),
            ("tight", &self.cuts.tight),
        ];
        for (name, cut) in tiers {
            if !cut.min_pt.is_finite() || cut.min_pt < 0.0 {
                return Err(SelectorError::InvalidCut(format!(
                    "{name}.min_pt must be finite and >= 0, got {}",
                    cut.min_pt
                )));
            }
            if !cut.max_abs_eta.is_finite() || cut.max_abs_eta <= 0.0 {
                return Err(SelectorError::InvalidCut(format!(
                    "{name}.max_abs_eta must be finite and > 0, got {}",
                    cut.max_abs_eta
                )));
            }
        }
        // A tighter tier must not accept anything a looser one rejects.
        for pair in tiers.windows(2) {
            let (loose_name, looser) = pair[0];
            let (tight_name, tighter) = pair[1];
            if tighter.min_pt < looser.min_pt || tighter.max_abs_eta > looser.max_abs_eta {
                return Err(SelectorError::InvalidCut(format!(
                    "{tight_name} cuts are looser than {loose_name} cuts"
                )));
            }
        }
        tracing::debug!(cuts = ?self.cuts, "cut-based muon selector initialized");
        Ok(())
    }

    fn quality(&self, muon: &Muon) -> Quality {
        if muon.track().is_none() {
            return Quality::VeryLoose;
        }
        if Self::passes(&self.cuts.tight, muon) {
            Quality::Tight
        } else if Self::passes(&self.cuts.medium, muon) {
            Quality::Medium
        } else if Self::passes(&self.cuts.loose, muon) {
            Quality::Loose
        } else {
            Quality::VeryLoose
        }
    }
}
