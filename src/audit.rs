//! Audit events emitted by the coercion, reconciliation and normalization
//! steps.
//!
//! Every correction the pipeline makes to extracted figures is reported to an
//! [`AuditSink`] handed to the component at construction time. [`LogSink`]
//! forwards to the `log` facade; [`MemorySink`] keeps the events so callers
//! can show or persist an audit trail.

use crate::period::PeriodSlot;
use crate::schema::LineItem;
use log::Level;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::sync::Mutex;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum AuditEvent {
    /// A field was missing or not numeric and was replaced with 0.
    FieldSubstituted { field: LineItem, reason: String },
    /// Revenue line items were multiplied to match the reported total.
    UnitMismatchCorrected {
        calculated: f64,
        reported: f64,
        multiplier: f64,
    },
    /// No revenue total was extracted, so the itemized sum was used.
    RevenueTotalFilled { calculated: f64 },
    /// Reported revenue total disagrees with the items and was kept.
    RevenueDiscrepancyKept { calculated: f64, reported: f64 },
    /// Reported expense total was replaced by the itemized sum.
    ExpenseTotalOverwritten { calculated: f64, reported: f64 },
    /// Itemized expenses overflowed, so the reported total was kept.
    ExpenseDiscrepancyKept { calculated: f64, reported: f64 },
    /// No NOI was extracted, so revenue minus expenses was used.
    NoiFilled { calculated: f64 },
    /// Reported NOI disagrees with revenue minus expenses and was kept.
    NoiDiscrepancyKept { calculated: f64, reported: f64 },
    /// Summary NOI was recomputed from revenue and expense.
    NoiRecomputed { slot: PeriodSlot, noi: f64 },
    /// A second document was offered for an already filled slot.
    DuplicateSlotIgnored { slot: PeriodSlot, document: String },
    /// The extraction collaborator failed for a document.
    ExtractionFailed { document: String, reason: String },
}

impl AuditEvent {
    pub fn level(&self) -> Level {
        match self {
            AuditEvent::FieldSubstituted { .. }
            | AuditEvent::RevenueDiscrepancyKept { .. }
            | AuditEvent::ExpenseTotalOverwritten { .. }
            | AuditEvent::ExpenseDiscrepancyKept { .. }
            | AuditEvent::NoiDiscrepancyKept { .. }
            | AuditEvent::DuplicateSlotIgnored { .. } => Level::Warn,
            AuditEvent::ExtractionFailed { .. } => Level::Error,
            AuditEvent::UnitMismatchCorrected { .. }
            | AuditEvent::RevenueTotalFilled { .. }
            | AuditEvent::NoiFilled { .. } => Level::Info,
            AuditEvent::NoiRecomputed { .. } => Level::Debug,
        }
    }
}

impl fmt::Display for AuditEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AuditEvent::FieldSubstituted { field, reason } => {
                write!(f, "Substituted 0 for {}: {}", field.key(), reason)
            }
            AuditEvent::UnitMismatchCorrected {
                calculated,
                reported,
                multiplier,
            } => write!(
                f,
                "Revenue mismatch: calculated={}, reported={}. Possible unit mismatch detected (multiplier: {})",
                calculated, reported, multiplier
            ),
            AuditEvent::RevenueTotalFilled { calculated } => {
                write!(f, "Using calculated revenue: {}", calculated)
            }
            AuditEvent::RevenueDiscrepancyKept {
                calculated,
                reported,
            } => write!(
                f,
                "Revenue mismatch: calculated={}, reported={}; keeping reported total",
                calculated, reported
            ),
            AuditEvent::ExpenseTotalOverwritten {
                calculated,
                reported,
            } => write!(
                f,
                "Total expenses discrepancy: calculated {}, reported {}; using calculated",
                calculated, reported
            ),
            AuditEvent::ExpenseDiscrepancyKept {
                calculated,
                reported,
            } => write!(
                f,
                "Itemized expenses are not a finite sum ({}); keeping reported total {}",
                calculated, reported
            ),
            AuditEvent::NoiFilled { calculated } => {
                write!(f, "Using calculated NOI: {}", calculated)
            }
            AuditEvent::NoiDiscrepancyKept {
                calculated,
                reported,
            } => write!(
                f,
                "NOI mismatch: calculated={}, reported={}; keeping reported NOI",
                calculated, reported
            ),
            AuditEvent::NoiRecomputed { slot, noi } => {
                write!(f, "Recomputed NOI for {} as {}", slot, noi)
            }
            AuditEvent::DuplicateSlotIgnored { slot, document } => write!(
                f,
                "Slot {} already filled; ignoring document '{}'",
                slot, document
            ),
            AuditEvent::ExtractionFailed { document, reason } => {
                write!(f, "Extraction failed for '{}': {}", document, reason)
            }
        }
    }
}

pub trait AuditSink: Send + Sync {
    fn emit(&self, event: AuditEvent);
}

/// Forwards events to the `log` facade under the `noi_analyzer::audit` target.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogSink;

impl AuditSink for LogSink {
    fn emit(&self, event: AuditEvent) {
        log::log!(target: "noi_analyzer::audit", event.level(), "{}", event);
    }
}

/// Collects events in memory, and also logs them.
#[derive(Debug, Default)]
pub struct MemorySink {
    events: Mutex<Vec<AuditEvent>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn events(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(events) => events.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn take(&self) -> Vec<AuditEvent> {
        match self.events.lock() {
            Ok(mut events) => std::mem::take(&mut *events),
            Err(poisoned) => std::mem::take(&mut *poisoned.into_inner()),
        }
    }
}

impl AuditSink for MemorySink {
    fn emit(&self, event: AuditEvent) {
        LogSink.emit(event.clone());
        match self.events.lock() {
            Ok(mut events) => events.push(event),
            Err(poisoned) => poisoned.into_inner().push(event),
        }
    }
}
