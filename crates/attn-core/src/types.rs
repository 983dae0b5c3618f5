//! Subject, observer and attention-label types.

use crate::error::CoreError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::Arc;

/// Monitored subject identifier.
///
/// The set of subjects is fixed at startup; ids come from configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubjectId(pub u32);

impl SubjectId {
    pub fn new(id: u32) -> Self {
        Self(id)
    }

    pub fn index(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for SubjectId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Observer connection identifier, unique for the process lifetime.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClientId(pub u64);

impl ClientId {
    pub fn new(id: u64) -> Self {
        Self(id)
    }
}

impl fmt::Display for ClientId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "client-{}", self.0)
    }
}

/// Discrete attention classification of one window.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum AttentionLevel {
    Low,
    /// Reported for a subject before its first window is computed.
    #[default]
    Mid,
    High,
}

impl AttentionLevel {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Low => "Low",
            Self::Mid => "Mid",
            Self::High => "High",
        }
    }
}

impl fmt::Display for AttentionLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AttentionLevel {
    type Err = CoreError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "Low" | "low" => Ok(Self::Low),
            "Mid" | "mid" => Ok(Self::Mid),
            "High" | "high" => Ok(Self::High),
            other => Err(CoreError::InvalidAttentionLevel(other.to_string())),
        }
    }
}

/// Immutable, ordered attention labels for one subject, one per window.
///
/// Produced once by the classifier at startup. Cloning is cheap (shared slice).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WindowSequence {
    labels: Arc<[AttentionLevel]>,
}

impl WindowSequence {
    pub fn new(labels: Vec<AttentionLevel>) -> Self {
        Self {
            labels: labels.into(),
        }
    }

    /// Total number of windows.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Label of the 0-based window `index`, if in range.
    pub fn get(&self, index: usize) -> Option<AttentionLevel> {
        self.labels.get(index).copied()
    }

    pub fn iter(&self) -> impl Iterator<Item = AttentionLevel> + '_ {
        self.labels.iter().copied()
    }

    pub fn as_slice(&self) -> &[AttentionLevel] {
        &self.labels
    }
}

impl From<Vec<AttentionLevel>> for WindowSequence {
    fn from(labels: Vec<AttentionLevel>) -> Self {
        Self::new(labels)
    }
}

impl FromIterator<AttentionLevel> for WindowSequence {
    fn from_iter<I: IntoIterator<Item = AttentionLevel>>(iter: I) -> Self {
        Self::new(iter.into_iter().collect())
    }
}
