use std::fmt;
use std::str::FromStr;

use thiserror::Error;

/// Keys are drawn from a fixed dense range `[0, num_keys)` chosen at storage
/// construction.
pub type Key = u64;

/// Values are opaque to the engine; nothing ever inspects them.
pub type Value = u64;

/// Unique transaction identifier, assigned at admission. Strictly increasing
/// over the lifetime of a processor instance; a re-admitted transaction gets a
/// fresh, larger id.
pub type TxnId = u64;

/// The concurrency-control protocol a processor instance runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum CCMode {
    /// Serial execution on the scheduler thread, no concurrency.
    Serial,
    /// Strict 2PL where every lock is exclusive.
    LockingA,
    /// Strict 2PL with shared/exclusive locks.
    LockingB,
    /// OCC, validation on the scheduler thread, forward rule.
    OccSerialForward,
    /// OCC, validation on the scheduler thread, backward rule.
    OccSerialBackward,
    /// OCC, execution and validation on workers, forward rule.
    OccParallelForward,
    /// OCC, execution and validation on workers, backward rule.
    OccParallelBackward,
    /// Multi-version timestamp ordering.
    MvccTo,
    /// Strict 2PL over multi-version storage.
    Mvcc2pl,
}

impl CCMode {
    pub const ALL: [CCMode; 9] = [
        CCMode::Serial,
        CCMode::LockingA,
        CCMode::LockingB,
        CCMode::OccSerialForward,
        CCMode::OccSerialBackward,
        CCMode::OccParallelForward,
        CCMode::OccParallelBackward,
        CCMode::MvccTo,
        CCMode::Mvcc2pl,
    ];

    /// True for the modes that run over multi-version storage.
    pub fn is_multi_version(self) -> bool {
        matches!(self, CCMode::MvccTo | CCMode::Mvcc2pl)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            CCMode::Serial => "serial",
            CCMode::LockingA => "locking-a",
            CCMode::LockingB => "locking-b",
            CCMode::OccSerialForward => "occ-serial-forward",
            CCMode::OccSerialBackward => "occ-serial-backward",
            CCMode::OccParallelForward => "occ-parallel-forward",
            CCMode::OccParallelBackward => "occ-parallel-backward",
            CCMode::MvccTo => "mvcc-to",
            CCMode::Mvcc2pl => "mvcc-2pl",
        }
    }
}

impl fmt::Display for CCMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown mode name.
#[derive(Debug, Error)]
#[error("unknown concurrency-control mode: {0:?}")]
pub struct ModeParseError(pub String);

impl FromStr for CCMode {
    type Err = ModeParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        CCMode::ALL
            .iter()
            .copied()
            .find(|m| m.as_str() == s)
            .ok_or_else(|| ModeParseError(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mode_names_round_trip() {
        for mode in CCMode::ALL {
            assert_eq!(mode.as_str().parse::<CCMode>().unwrap(), mode);
        }
    }

    #[test]
    fn unknown_mode_is_rejected() {
        let err = "three-phase-locking".parse::<CCMode>().unwrap_err();
        assert!(err.to_string().contains("three-phase-locking"));
    }
}
