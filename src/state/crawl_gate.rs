/// Gate ensuring at most one ingest cycle runs at a time
///
/// Acquisition is a single compare-and-swap from Idle to Running. There is
/// no queue: a caller that finds the gate Running is turned away.
use std::fmt;
use std::sync::atomic::{AtomicU8, Ordering};

/// Phase of the crawl gate
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum GatePhase {
    Idle = 0,
    Running = 1,
}

impl GatePhase {
    fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Running,
            _ => Self::Idle,
        }
    }
}

impl fmt::Display for GatePhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Idle => write!(f, "idle"),
            Self::Running => write!(f, "running"),
        }
    }
}

/// Shared busy flag for ingest cycles
#[derive(Debug, Default)]
pub struct CrawlGate {
    phase: AtomicU8,
}

impl CrawlGate {
    pub fn new() -> Self {
        Self {
            phase: AtomicU8::new(GatePhase::Idle as u8),
        }
    }

    pub fn phase(&self) -> GatePhase {
        GatePhase::from_u8(self.phase.load(Ordering::Acquire))
    }

    /// Whether a cycle currently holds the gate
    pub fn is_busy(&self) -> bool {
        self.phase() == GatePhase::Running
    }

    /// Moves the gate from Idle to Running
    ///
    /// Returns `None` when another holder is running. The gate returns to
    /// Idle when the permit is dropped, on success and error paths alike.
    pub fn try_acquire(&self) -> Option<CrawlPermit<'_>> {
        self.phase
            .compare_exchange(
                GatePhase::Idle as u8,
                GatePhase::Running as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            )
            .ok()
            .map(|_| CrawlPermit { gate: self })
    }
}

/// Held while a cycle runs
#[derive(Debug)]
pub struct CrawlPermit<'a> {
    gate: &'a CrawlGate,
}

impl Drop for CrawlPermit<'_> {
    fn drop(&mut self) {
        self.gate
            .phase
            .store(GatePhase::Idle as u8, Ordering::Release);
    }
}
