//! Partition the normalized event log into typed views.

use glucose_core::models::{CarbEvent, EventPayload, GlucoseEvent, InsulinEvent, RawEvent};
use tracing::debug;

/// The three disjoint views of an event log. Input order is preserved.
#[derive(Debug, Clone, Default)]
pub struct ClassifiedEvents {
    pub glucose: Vec<GlucoseEvent>,
    pub insulin: Vec<InsulinEvent>,
    pub carbs: Vec<CarbEvent>,
    /// Events of any other type, dropped from every view.
    pub excluded: usize,
}

impl ClassifiedEvents {
    /// Number of events that landed in a view.
    pub fn classified(&self) -> usize {
        self.glucose.len() + self.insulin.len() + self.carbs.len()
    }
}

/// Split `events` by kind, keeping only each kind's operative fields.
///
/// Each event lands in at most one view; unknown kinds are counted and dropped.
pub fn classify(events: &[RawEvent]) -> ClassifiedEvents {
    let mut out = ClassifiedEvents::default();

    for event in events {
        match &event.payload {
            EventPayload::Glucose(reading) => out.glucose.push(GlucoseEvent {
                datetime: event.datetime,
                reading: *reading,
            }),
            EventPayload::Insulin { subtype, units } => out.insulin.push(InsulinEvent {
                datetime: event.datetime,
                subtype: subtype.clone(),
                units: *units,
            }),
            EventPayload::Carb { grams } => out.carbs.push(CarbEvent {
                datetime: event.datetime,
                grams: *grams,
            }),
            EventPayload::Other { .. } => out.excluded += 1,
        }
    }

    debug!(
        "Classified {} glucose, {} insulin, {} carb events ({} excluded)",
        out.glucose.len(),
        out.insulin.len(),
        out.carbs.len(),
        out.excluded
    );

    out
}

// ── Tests ─────────────────────────────────────────────────────────────────────
