//! Upstream event model: muons, their inner-detector tracks, and primary vertices.
//!
//! These types stand in for the reconstruction framework's containers. The
//! writer only ever borrows them for the duration of one event.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Track-isolation cone configurations available on a muon.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IsolationType {
    Ptcone20,
    Ptcone30,
    Ptcone40,
    Ptvarcone20,
    Ptvarcone30,
    Ptvarcone40,
}

impl IsolationType {
    pub const ALL: [IsolationType; 6] = [
        IsolationType::Ptcone20,
        IsolationType::Ptcone30,
        IsolationType::Ptcone40,
        IsolationType::Ptvarcone20,
        IsolationType::Ptvarcone30,
        IsolationType::Ptvarcone40,
    ];

    /// Column name used for this isolation variable.
    pub fn name(self) -> &'static str {
        match self {
            IsolationType::Ptcone20 => "ptcone20",
            IsolationType::Ptcone30 => "ptcone30",
            IsolationType::Ptcone40 => "ptcone40",
            IsolationType::Ptvarcone20 => "ptvarcone20",
            IsolationType::Ptvarcone30 => "ptvarcone30",
            IsolationType::Ptvarcone40 => "ptvarcone40",
        }
    }
}

/// Inner-detector track attached to a muon.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct TrackParticle {
    /// Transverse impact parameter (mm)
    pub d0: f32,
    /// Longitudinal impact parameter (mm)
    pub z0: f32,
    /// d0-d0 entry of the track covariance matrix (mm²)
    pub d0_variance: f32,
    /// Truth-classifier particle type; 0 when unclassified
    #[serde(default)]
    pub truth_type: i32,
}

impl TrackParticle {
    pub fn new(d0: f32, z0: f32, d0_variance: f32) -> Self {
        Self {
            d0,
            z0,
            d0_variance,
            truth_type: 0,
        }
    }

    pub fn with_truth_type(mut self, truth_type: i32) -> Self {
        self.truth_type = truth_type;
        self
    }

    /// d0 / σ(d0). NaN when the variance is not a positive finite number.
    pub fn d0_significance(&self) -> f32 {
        if !(self.d0_variance.is_finite() && self.d0_variance > 0.0) {
            return f32::NAN;
        }
        self.d0 / self.d0_variance.sqrt()
    }
}

/// A reconstructed muon candidate.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Muon {
    /// Transverse momentum (MeV)
    pub pt: f32,
    pub eta: f32,
    pub phi: f32,
    #[serde(default, rename = "track")]
    pub id_track: Option<TrackParticle>,
    #[serde(default)]
    pub isolation: BTreeMap<IsolationType, f32>,
    /// Named float decorations added by upstream tools.
    #[serde(default)]
    pub decorations: BTreeMap<String, f32>,
}

impl Muon {
    pub fn new(pt: f32, eta: f32, phi: f32) -> Self {
        Self {
            pt,
            eta,
            phi,
            id_track: None,
            isolation: BTreeMap::new(),
            decorations: BTreeMap::new(),
        }
    }

    pub fn with_track(mut self, track: TrackParticle) -> Self {
        self.id_track = Some(track);
        self
    }

    pub fn with_isolation(mut self, kind: IsolationType, value: f32) -> Self {
        self.isolation.insert(kind, value);
        self
    }

    pub fn with_decoration(mut self, name: &str, value: f32) -> Self {
        self.decorations.insert(name.to_string(), value);
        self
    }

    pub fn track(&self) -> Option<&TrackParticle> {
        self.id_track.as_ref()
    }

    pub fn isolation(&self, kind: IsolationType) -> Option<f32> {
        self.isolation.get(&kind).copied()
    }

    pub fn decoration(&self, name: &str) -> Option<f32> {
        self.decorations.get(name).copied()
    }
}

/// A reconstructed collision point. Only the longitudinal position is used.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Vertex {
    pub z: f32,
}

impl Vertex {
    pub fn new(z: f32) -> Self {
        Self { z }
    }
}

/// One recorded collision: the muon container and the primary-vertex container.
///
/// A `None` entry in `muons` is a dangling element link in the upstream
/// container; the selection stage skips it.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Event {
    #[serde(default)]
    pub muons: Vec<Option<Muon>>,
    #[serde(default)]
    pub primary_vertices: Vec<Vertex>,
}

impl Event {
    pub fn new(muons: Vec<Muon>, primary_vertices: Vec<Vertex>) -> Self {
        Self {
            muons: muons.into_iter().map(Some).collect(),
            primary_vertices,
        }
    }

    /// Parse a JSON array of events.
    pub fn list_from_json(json: &str) -> serde_json::Result<Vec<Event>> {
        serde_json::from_str(json)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_d0_significance() {
        let track = TrackParticle::new(0.3, 1.0, 0.01);
        assert!((track.d0_significance() - 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_d0_significance_bad_variance() {
        assert!(TrackParticle::new(0.3, 1.0, 0.0).d0_significance().is_nan());
        assert!(TrackParticle::new(0.3, 1.0, -1.0).d0_significance().is_nan());
        assert!(
            TrackParticle::new(0.3, 1.0, f32::INFINITY)
                .d0_significance()
                .is_nan()
        );
    }

    #[test]
    fn test_muon_lookups() {
        let muon = Muon::new(25_000.0, 0.5, 1.0)
            .with_isolation(IsolationType::Ptcone20, 120.0)
            .with_decoration("PromptLeptonVeto", -0.8);

        assert_eq!(muon.isolation(IsolationType::Ptcone20), Some(120.0));
        assert_eq!(muon.isolation(IsolationType::Ptvarcone40), None);
        assert_eq!(muon.decoration("PromptLeptonVeto"), Some(-0.8));
        assert_eq!(muon.decoration("missing"), None);
        assert!(muon.track().is_none());
    }

    #[test]
    fn test_isolation_names_unique() {
        let mut names: Vec<&str> = IsolationType::ALL.iter().map(|k| k.name()).collect();
        names.sort_unstable();
        names.dedup();
        assert_eq!(names.len(), IsolationType::ALL.len());
    }

    #[test]
    fn test_events_from_json() {
        let json = r#"[
            {
                "muons": [
                    {
                        "pt": 30000.0, "eta": 0.1, "phi": -2.0,
                        "track": {"d0": 0.01, "z0": 3.0, "d0_variance": 0.0004, "truth_type": 6},
                        "isolation": {"ptcone20": 55.0},
                        "decorations": {"PromptLeptonVeto": -0.9}
                    },
                    null
                ],
                "primary_vertices": [{"z": 2.5}]
            },
            {}
        ]"#;

        let events = Event::list_from_json(json).unwrap();
        assert_eq!(events.len(), 2);
        assert_eq!(events[0].muons.len(), 2);
        assert!(events[0].muons[1].is_none());

        let muon = events[0].muons[0].as_ref().unwrap();
        assert_eq!(muon.track().unwrap().truth_type, 6);
        assert_eq!(muon.isolation(IsolationType::Ptcone20), Some(55.0));
        assert_eq!(events[0].primary_vertices, vec![Vertex::new(2.5)]);
        assert!(events[1].muons.is_empty());
    }
}
