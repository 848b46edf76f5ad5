//! Structured log of what the passes did.
//!
//! Every transformation a pass applies is recorded as an [`Event`] in an
//! [`EventLog`]. The log is append-only and lock-free (backed by
//! `boxcar::Vec`), so worker threads running function passes in parallel can
//! record into it through a shared reference. Events can be inspected for
//! debugging and testing, or ignored.
//!
//! # Architecture
//!
//! - [`Event`] - A single recorded event
//! - [`EventLog`] - Collection of events with query and summary capabilities
//! - [`EventBuilder`] - Fluent API for creating events; the event is pushed when
//!   the builder is dropped
//! - [`RunStats`] - Counters derived from a log, reported with every run
//!
//! # Example
//!
//! ```rust
//! use pilopt::passmgr::{EventKind, EventLog};
//!
//! let log = EventLog::new();
//! log.record(EventKind::InstructionRemoved)
//!     .function("main")
//!     .message("removed dead integer_literal");
//! log.record(EventKind::AnalysisComputed).function("main");
//!
//! assert_eq!(log.count_kind(EventKind::InstructionRemoved), 1);
//! assert_eq!(log.summary(), "1 instruction removed");
//! ```

use std::{
    collections::{BTreeSet, HashMap},
    fmt,
};

/// The kind of an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    // Transformations
    /// A dead instruction was erased.
    InstructionRemoved,
    /// An unreachable or empty block was erased.
    BlockRemoved,
    /// A block was merged into its single predecessor.
    BlocksMerged,
    /// A conditional branch or switch on a constant was folded.
    BranchFolded,
    /// A dead closure was deleted and its captures released.
    ClosureDeleted,
    /// A peephole rewrite replaced an instruction.
    InstructionCombined,
    /// A foreign call had its error convention lowered to explicit checks.
    ForeignCallLowered,
    /// An adjacent retain and release of the same value were removed.
    RetainReleasePairRemoved,
    /// Ownership instructions were rewritten to unqualified reference counting.
    OwnershipLowered,
    /// Unreachable user code was removed.
    UnreachableCodeRemoved,
    /// A function without remaining uses was removed from the module.
    FunctionRemoved,

    // Analysis
    /// An analysis was computed.
    AnalysisComputed,
    /// Instruction statistics were recorded.
    StatisticsRecorded,
}

impl EventKind {
    /// Returns a human-readable description of this event kind.
    #[must_use]
    pub fn description(&self) -> &'static str {
        match self {
            // Transformations
            Self::InstructionRemoved => "instruction removed",
            Self::BlockRemoved => "block removed",
            Self::BlocksMerged => "blocks merged",
            Self::BranchFolded => "branch folded",
            Self::ClosureDeleted => "closure deleted",
            Self::InstructionCombined => "instruction combined",
            Self::ForeignCallLowered => "foreign call lowered",
            Self::RetainReleasePairRemoved => "retain/release pair removed",
            Self::OwnershipLowered => "ownership lowered",
            Self::UnreachableCodeRemoved => "unreachable code removed",
            Self::FunctionRemoved => "function removed",
            // Analysis
            Self::AnalysisComputed => "analysis computed",
            Self::StatisticsRecorded => "statistics recorded",
        }
    }

    /// Returns `true` if this event kind represents a change to the IR.
    #[must_use]
    pub fn is_transformation(&self) -> bool {
        matches!(
            self,
            Self::InstructionRemoved
                | Self::BlockRemoved
                | Self::BlocksMerged
                | Self::BranchFolded
                | Self::ClosureDeleted
                | Self::InstructionCombined
                | Self::ForeignCallLowered
                | Self::RetainReleasePairRemoved
                | Self::OwnershipLowered
                | Self::UnreachableCodeRemoved
                | Self::FunctionRemoved
        )
    }
}

impl fmt::Display for EventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.description())
    }
}

/// A single recorded event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Event {
    /// What happened.
    pub kind: EventKind,
    /// Function the event applies to, if any.
    pub function: Option<String>,
    /// Human-readable details.
    pub message: String,
    /// Tag of the pass that produced the event.
    pub pass: Option<&'static str>,
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}]", self.kind)?;
        if let Some(function) = &self.function {
            write!(f, " {function}:")?;
        }
        write!(f, " {}", self.message)
    }
}

/// Fluent builder for an event, pushed into its log on drop.
///
/// ```rust
/// use pilopt::passmgr::{EventKind, EventLog};
///
/// let log = EventLog::new();
/// log.record(EventKind::BlockRemoved)
///     .function("f")
///     .pass("simplify-cfg")
///     .message("removed bb3");
/// assert_eq!(log.iter().next().map(|e| e.pass), Some(Some("simplify-cfg")));
/// ```
pub struct EventBuilder<'a> {
    log: &'a EventLog,
    kind: EventKind,
    function: Option<String>,
    message: Option<String>,
    pass: Option<&'static str>,
}

impl<'a> EventBuilder<'a> {
    fn new(log: &'a EventLog, kind: EventKind) -> Self {
        Self {
            log,
            kind,
            function: None,
            message: None,
            pass: None,
        }
    }

    /// Sets the function the event applies to.
    pub fn function(mut self, name: impl Into<String>) -> Self {
        self.function = Some(name.into());
        self
    }

    /// Sets the message.
    pub fn message(mut self, msg: impl Into<String>) -> Self {
        self.message = Some(msg.into());
        self
    }

    /// Sets the tag of the pass producing the event.
    pub fn pass(mut self, tag: &'static str) -> Self {
        self.pass = Some(tag);
        self
    }
}

impl Drop for EventBuilder<'_> {
    fn drop(&mut self) {
        let message = self
            .message
            .take()
            .unwrap_or_else(|| self.kind.description().to_string());
        self.log.events.push(Event {
            kind: self.kind,
            function: self.function.take(),
            message,
            pass: self.pass.take(),
        });
    }
}

/// Append-only collection of events.
#[derive(Debug, Default)]
pub struct EventLog {
    events: boxcar::Vec<Event>,
}

impl Clone for EventLog {
    fn clone(&self) -> Self {
        let new_log = Self::new();
        new_log.merge(self);
        new_log
    }
}

impl EventLog {
    /// Creates an empty log.
    #[must_use]
    pub fn new() -> Self {
        Self {
            events: boxcar::Vec::new(),
        }
    }

    /// Returns `true` if no events were recorded.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.events.count() == 0
    }

    /// Number of recorded events.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.count()
    }

    /// Starts recording an event of `kind`.
    pub fn record(&self, kind: EventKind) -> EventBuilder<'_> {
        EventBuilder::new(self, kind)
    }

    /// Appends a copy of every event of `other`.
    pub fn merge(&self, other: &EventLog) {
        for (_, event) in &other.events {
            self.events.push(event.clone());
        }
    }

    /// Number of events of `kind`.
    #[must_use]
    pub fn count_kind(&self, kind: EventKind) -> usize {
        self.events.iter().filter(|(_, e)| e.kind == kind).count()
    }

    /// Iterates over events in record order.
    pub fn iter(&self) -> impl Iterator<Item = &Event> {
        self.events.iter().map(|(_, e)| e)
    }

    /// Events of `kind`.
    pub fn filter_kind(&self, kind: EventKind) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(move |e| e.kind == kind)
    }

    /// Transformation events.
    pub fn transformations(&self) -> impl Iterator<Item = &Event> + '_ {
        self.iter().filter(|e| e.kind.is_transformation())
    }

    /// Counts events by kind.
    #[must_use]
    pub fn count_by_kind(&self) -> HashMap<EventKind, usize> {
        let mut counts = HashMap::new();
        for (_, event) in &self.events {
            *counts.entry(event.kind).or_insert(0) += 1;
        }
        counts
    }

    /// Names of the functions with at least one transformation, sorted.
    #[must_use]
    pub fn functions_affected(&self) -> BTreeSet<String> {
        self.transformations()
            .filter_map(|e| e.function.clone())
            .collect()
    }

    /// One-line summary of the transformation counts.
    #[must_use]
    pub fn summary(&self) -> String {
        if self.is_empty() {
            return "no events".to_string();
        }

        let counts = self.count_by_kind();
        let mut parts: Vec<String> = counts
            .iter()
            .filter(|(k, _)| k.is_transformation())
            .map(|(kind, count)| format!("{} {}", count, kind.description()))
            .collect();

        if parts.is_empty() {
            return format!("{} events", self.len());
        }

        parts.sort();
        parts.join(", ")
    }
}

/// Counters derived from an event log.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunStats {
    /// Functions with at least one transformation.
    pub functions_transformed: usize,
    /// Instructions removed.
    pub instructions_removed: usize,
    /// Blocks removed or merged away.
    pub blocks_removed: usize,
    /// Branches folded.
    pub branches_folded: usize,
    /// Dead closures deleted.
    pub closures_deleted: usize,
    /// Foreign calls lowered.
    pub foreign_calls_lowered: usize,
    /// Retain/release pairs removed.
    pub retain_release_pairs_removed: usize,
    /// Functions removed from the module.
    pub functions_removed: usize,
    /// Ownership-form functions lowered to plain reference counting.
    pub functions_lowered: usize,
}

impl RunStats {
    /// Computes the counters of `log`.
    #[must_use]
    pub fn from_log(log: &EventLog) -> Self {
        let counts = log.count_by_kind();
        let get = |kind: EventKind| counts.get(&kind).copied().unwrap_or(0);

        Self {
            functions_transformed: log.functions_affected().len(),
            instructions_removed: get(EventKind::InstructionRemoved),
            blocks_removed: get(EventKind::BlockRemoved) + get(EventKind::BlocksMerged),
            branches_folded: get(EventKind::BranchFolded),
            closures_deleted: get(EventKind::ClosureDeleted),
            foreign_calls_lowered: get(EventKind::ForeignCallLowered),
            retain_release_pairs_removed: get(EventKind::RetainReleasePairRemoved),
            functions_removed: get(EventKind::FunctionRemoved),
            functions_lowered: get(EventKind::OwnershipLowered),
        }
    }
}
