use std::fmt;

/// Result of a data-dependent step that may legitimately have nothing to give.
/// `Skipped` is not a failure and must not be read as a zero-valued record;
/// transport and parse failures travel separately as `Err`.
#[derive(Debug, Clone, PartialEq)]
pub enum Extraction<T> {
    Ready(T),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SkipReason {
    /// Statistics payload did not cover exactly two teams.
    TeamCount(usize),
    MissingCorners { home: bool, away: bool },
}

impl fmt::Display for SkipReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SkipReason::TeamCount(n) => write!(f, "statistics cover {n} team(s), expected 2"),
            SkipReason::MissingCorners { home, away } => {
                let side = match (home, away) {
                    (true, true) => "home and away",
                    (true, false) => "home",
                    _ => "away",
                };
                write!(f, "missing {side} corner count")
            }
        }
    }
}

impl<T> Extraction<T> {
    pub fn ready(self) -> Option<T> {
        match self {
            Extraction::Ready(v) => Some(v),
            Extraction::Skipped(_) => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self, Extraction::Ready(_))
    }
}
