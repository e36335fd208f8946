//! Quality presets and the fixed quality ladder.
//!
//! The ladder is an ordered, immutable list of presets from highest
//! to lowest quality; position defines "one step lower". It is fixed
//! at runtime so every preset transition is deterministic and
//! replayable. String lookup happens only at the UI boundary — the
//! rest of the crate passes [`PresetId`] tags.

use serde::{Deserialize, Serialize};

// ── PresetId ─────────────────────────────────────────────────────

/// Stable identifier for a ladder member.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PresetId {
    /// Native resolution, maximum bit rate.
    Ultra,
    /// Capped at 1920 px.
    High,
    /// Capped at 1080 px.
    Balanced,
    /// Capped at 720 px, reduced frame rate.
    Low,
}

impl PresetId {
    /// The boundary name used for UI selection and display.
    pub const fn name(self) -> &'static str {
        match self {
            Self::Ultra => "ultra",
            Self::High => "high",
            Self::Balanced => "balanced",
            Self::Low => "low",
        }
    }
}

impl std::fmt::Display for PresetId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

// ── QualityPreset ────────────────────────────────────────────────

/// An immutable quality preset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityPreset {
    /// Stable tag.
    pub id: PresetId,
    /// Longest-side resolution cap in pixels. `0` = native resolution.
    pub max_dimension: u32,
    /// Video bit rate in bits/second.
    pub bit_rate: u32,
    /// Frame-rate cap.
    pub max_frame_rate: u32,
}

// ── QualityLadder ────────────────────────────────────────────────

/// The fixed, strictly descending quality ladder.
#[derive(Debug, Clone)]
pub struct QualityLadder {
    rungs: &'static [QualityPreset],
}

const LADDER: &[QualityPreset] = &[
    QualityPreset {
        id: PresetId::Ultra,
        max_dimension: 0,
        bit_rate: 20_000_000,
        max_frame_rate: 60,
    },
    QualityPreset {
        id: PresetId::High,
        max_dimension: 1920,
        bit_rate: 12_000_000,
        max_frame_rate: 60,
    },
    QualityPreset {
        id: PresetId::Balanced,
        max_dimension: 1080,
        bit_rate: 8_000_000,
        max_frame_rate: 60,
    },
    QualityPreset {
        id: PresetId::Low,
        max_dimension: 720,
        bit_rate: 4_000_000,
        max_frame_rate: 30,
    },
];

impl Default for QualityLadder {
    fn default() -> Self {
        Self { rungs: LADDER }
    }
}

impl QualityLadder {
    /// The highest-quality preset (ladder index 0).
    pub fn default_preset(&self) -> &QualityPreset {
        &self.rungs[0]
    }

    /// The preset one step below `id`, or `None` at the floor.
    pub fn next_lower(&self, id: PresetId) -> Option<&QualityPreset> {
        let idx = self.index_of(id)?;
        self.rungs.get(idx + 1)
    }

    /// Exact lookup by tag.
    pub fn get(&self, id: PresetId) -> &QualityPreset {
        // Every PresetId is a ladder member by construction.
        &self.rungs[self.index_of(id).unwrap_or(0)]
    }

    /// Exact lookup by boundary name. Callers treat `None` as a
    /// request to fall back to [`default_preset`](Self::default_preset).
    pub fn by_name(&self, name: &str) -> Option<&QualityPreset> {
        self.rungs.iter().find(|p| p.id.name() == name)
    }

    /// Resolve an optional boundary name, falling back to the default
    /// preset for `None` or unknown names.
    pub fn resolve(&self, name: Option<&str>) -> &QualityPreset {
        name.and_then(|n| self.by_name(n))
            .unwrap_or_else(|| self.default_preset())
    }

    /// All rungs, best first (for UI listing).
    pub fn presets(&self) -> impl Iterator<Item = &QualityPreset> {
        self.rungs.iter()
    }

    /// Number of rungs.
    pub fn len(&self) -> usize {
        self.rungs.len()
    }

    /// The built-in ladder always has at least one rung.
    pub fn is_empty(&self) -> bool {
        self.rungs.is_empty()
    }

    fn index_of(&self, id: PresetId) -> Option<usize> {
        self.rungs.iter().position(|p| p.id == id)
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ladder_is_strictly_descending() {
        let ladder = QualityLadder::default();
        let rates: Vec<u32> = ladder.presets().map(|p| p.bit_rate).collect();
        for pair in rates.windows(2) {
            assert!(pair[0] > pair[1], "bit rates must strictly descend");
        }
    }

    #[test]
    fn next_lower_walks_one_step() {
        let ladder = QualityLadder::default();
        let ids: Vec<PresetId> = ladder.presets().map(|p| p.id).collect();
        for pair in ids.windows(2) {
            assert_eq!(ladder.next_lower(pair[0]).unwrap().id, pair[1]);
        }
    }

    #[test]
    fn next_lower_absent_at_floor() {
        let ladder = QualityLadder::default();
        let last = ladder.presets().last().unwrap().id;
        assert!(ladder.next_lower(last).is_none());
    }

    #[test]
    fn by_name_exact_lookup() {
        let ladder = QualityLadder::default();
        assert_eq!(ladder.by_name("high").unwrap().id, PresetId::High);
        assert!(ladder.by_name("4k").is_none());
    }

    #[test]
    fn resolve_falls_back_to_default() {
        let ladder = QualityLadder::default();
        assert_eq!(ladder.resolve(None).id, PresetId::Ultra);
        assert_eq!(ladder.resolve(Some("no-such")).id, PresetId::Ultra);
        assert_eq!(ladder.resolve(Some("low")).id, PresetId::Low);
    }

    #[test]
    fn default_preset_is_native_resolution() {
        let ladder = QualityLadder::default();
        assert_eq!(ladder.default_preset().max_dimension, 0);
    }
}
