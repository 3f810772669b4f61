//! Explicit "value or insufficient signal" result type.
//!
//! Degraded input is not an error in this crate: an empty frame, a window that
//! is too short or a missing finger all produce a defined empty state. Stages
//! return [`Outcome`] so callers have to decide what the degraded case means
//! for them instead of receiving a silently zeroed value.

use serde::{Deserialize, Serialize};

/// Why a stage could not produce a value this cycle.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Insufficiency {
    /// No samples at all (empty or null frame data).
    EmptyWindow,
    /// Fewer samples than the stage needs.
    TooFewSamples { needed: usize, got: usize },
    /// Intensity outside the range where a fingertip can be present.
    NoFinger,
    /// An internal computation failed and was contained at the component boundary.
    Failed(String),
}

/// Result of a stage that may legitimately have nothing to report.
#[derive(Debug, Clone, PartialEq)]
pub enum Outcome<T> {
    Ready(T),
    Insufficient(Insufficiency),
}

/// Types that have a defined "nothing measured" value.
pub trait Empty {
    fn empty() -> Self;
}

impl<T> Outcome<T> {
    pub fn is_ready(&self) -> bool {
        matches!(self, Outcome::Ready(_))
    }

    pub fn ready(self) -> Option<T> {
        match self {
            Outcome::Ready(v) => Some(v),
            Outcome::Insufficient(_) => None,
        }
    }

    pub fn insufficiency(&self) -> Option<&Insufficiency> {
        match self {
            Outcome::Ready(_) => None,
            Outcome::Insufficient(reason) => Some(reason),
        }
    }

    pub fn map<U, F: FnOnce(T) -> U>(self, f: F) -> Outcome<U> {
        match self {
            Outcome::Ready(v) => Outcome::Ready(f(v)),
            Outcome::Insufficient(reason) => Outcome::Insufficient(reason),
        }
    }
}

impl<T: Empty> Outcome<T> {
    /// Collapse to the stage's defined empty value when insufficient.
    pub fn or_empty(self) -> T {
        match self {
            Outcome::Ready(v) => v,
            Outcome::Insufficient(_) => T::empty(),
        }
    }
}

impl Empty for f32 {
    fn empty() -> Self {
        0.0
    }
}

impl<T> Empty for Vec<T> {
    fn empty() -> Self {
        Vec::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_or_empty_collapses_insufficient() {
        let o: Outcome<f32> = Outcome::Insufficient(Insufficiency::EmptyWindow);
        assert_eq!(o.or_empty(), 0.0);

        let o = Outcome::Ready(0.7f32);
        assert_eq!(o.or_empty(), 0.7);
    }

    #[test]
    fn test_map_preserves_reason() {
        let o: Outcome<f32> =
            Outcome::Insufficient(Insufficiency::TooFewSamples { needed: 5, got: 2 });
        let mapped = o.map(|v| v * 2.0);
        assert_eq!(
            mapped.insufficiency(),
            Some(&Insufficiency::TooFewSamples { needed: 5, got: 2 })
        );
    }
}
