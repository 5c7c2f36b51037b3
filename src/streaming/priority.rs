//! Load priority classes and the classifier that assigns them

use std::fmt;

use serde::{Deserialize, Serialize};

/// Load priority class. Ordered `Critical < High < Medium < Low`; smaller loads first.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum LoadPriority {
    /// Structural geometry that defines the building's shape
    Critical,
    /// Envelope: facades, panels, walls
    High,
    /// Decoration and fixtures
    Medium,
    /// Everything else small enough not to matter early
    Low,
}

/// Name fragments per class, matched case-insensitively as substrings
const CRITICAL_KEYWORDS: &[&str] = &["structur", "foundation", "column", "beam", "slab"];
const HIGH_KEYWORDS: &[&str] = &["facade", "panel", "wall", "window", "curtain", "cladding"];
const MEDIUM_KEYWORDS: &[&str] = &[
    "decor", "ornament", "trim", "fixture", "detail", "railing", "furniture",
];

/// Triangle counts above which unnamed objects are promoted
pub const HIGH_TRIANGLE_THRESHOLD: usize = 10_000;
pub const MEDIUM_TRIANGLE_THRESHOLD: usize = 1_000;

impl LoadPriority {
    pub const ALL: [LoadPriority; 4] = [
        LoadPriority::Critical,
        LoadPriority::High,
        LoadPriority::Medium,
        LoadPriority::Low,
    ];

    /// Rank used to scale the stagger delay (Critical = 0)
    pub fn index(self) -> u32 {
        match self {
            LoadPriority::Critical => 0,
            LoadPriority::High => 1,
            LoadPriority::Medium => 2,
            LoadPriority::Low => 3,
        }
    }

    /// Classify an object by name, falling back to its triangle count.
    pub fn classify(name: &str, triangle_count: usize) -> Self {
        Self::from_name(name).unwrap_or_else(|| Self::from_complexity(triangle_count))
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let name = name.to_lowercase();
        let matches = |keywords: &[&str]| keywords.iter().any(|k| name.contains(k));

        if matches(CRITICAL_KEYWORDS) {
            Some(LoadPriority::Critical)
        } else if matches(HIGH_KEYWORDS) {
            Some(LoadPriority::High)
        } else if matches(MEDIUM_KEYWORDS) {
            Some(LoadPriority::Medium)
        } else {
            None
        }
    }

    pub fn from_complexity(triangle_count: usize) -> Self {
        if triangle_count > HIGH_TRIANGLE_THRESHOLD {
            LoadPriority::High
        } else if triangle_count > MEDIUM_TRIANGLE_THRESHOLD {
            LoadPriority::Medium
        } else {
            LoadPriority::Low
        }
    }
}

impl fmt::Display for LoadPriority {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            LoadPriority::Critical => "critical",
            LoadPriority::High => "high",
            LoadPriority::Medium => "medium",
            LoadPriority::Low => "low",
        };
        f.write_str(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ordering() {
        assert!(LoadPriority::Critical < LoadPriority::High);
        assert!(LoadPriority::High < LoadPriority::Medium);
        assert!(LoadPriority::Medium < LoadPriority::Low);
        let indices: Vec<u32> = LoadPriority::ALL.iter().map(|p| p.index()).collect();
        assert_eq!(indices, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_name_classification() {
        assert_eq!(LoadPriority::classify("foundation-a", 0), LoadPriority::Critical);
        assert_eq!(LoadPriority::classify("Structural_Core", 0), LoadPriority::Critical);
        assert_eq!(LoadPriority::classify("panel-wall-1", 0), LoadPriority::High);
        assert_eq!(LoadPriority::classify("CurtainWall_North", 0), LoadPriority::High);
        assert_eq!(LoadPriority::classify("trim-fixture-2", 0), LoadPriority::Medium);
        assert_eq!(LoadPriority::classify("lobby_furniture", 0), LoadPriority::Medium);
    }

    #[test]
    fn test_name_beats_complexity() {
        // Tiny but structural
        assert_eq!(LoadPriority::classify("beam_07", 12), LoadPriority::Critical);
        // Huge but decorative
        assert_eq!(LoadPriority::classify("ornament", 50_000), LoadPriority::Medium);
    }

    #[test]
    fn test_complexity_fallback() {
        assert_eq!(LoadPriority::classify("object_1", 10_001), LoadPriority::High);
        assert_eq!(LoadPriority::classify("object_2", 10_000), LoadPriority::Medium);
        assert_eq!(LoadPriority::classify("object_3", 1_001), LoadPriority::Medium);
        assert_eq!(LoadPriority::classify("object_4", 1_000), LoadPriority::Low);
        assert_eq!(LoadPriority::classify("", 0), LoadPriority::Low);
    }
}
