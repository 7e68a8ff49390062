//! Classified visit events and the unprocessed/processed queues holding them.

use crate::model::StopId;
use chrono::{DateTime, Utc};
use serde::Serialize;
use std::collections::VecDeque;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventKind {
    Arrival,
    Departure,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct VisitEvent {
    pub stop_id: StopId,
    pub kind: EventKind,
    pub timestamp: DateTime<Utc>,
}

/// Events of one kind at one stop, split into those still awaiting matching and
/// those already consumed.
///
/// Both collections are kept oldest-first and never share an event.
#[derive(Debug, Clone, Default)]
pub struct EventQueue {
    unprocessed: Vec<VisitEvent>,
    processed: VecDeque<VisitEvent>,
}

impl EventQueue {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a newly classified event. Events arrive in chronological order.
    pub fn push(&mut self, event: VisitEvent) {
        self.unprocessed.push(event);
    }

    pub fn unprocessed(&self) -> &[VisitEvent] {
        &self.unprocessed
    }

    pub fn processed(&self) -> &VecDeque<VisitEvent> {
        &self.processed
    }

    /// Every event ever classified, oldest first.
    pub fn all(&self) -> Vec<&VisitEvent> {
        let mut all: Vec<&VisitEvent> = self
            .processed
            .iter()
            .chain(self.unprocessed.iter())
            .collect();
        all.sort_by_key(|e| e.timestamp);
        all
    }

    pub fn cursor(&self) -> EventCursor<'_> {
        EventCursor {
            events: &self.unprocessed,
            position: 0,
        }
    }

    /// Removes the newest unprocessed event and files it at the head of the
    /// processed history.
    pub fn pop_most_recent(&mut self) -> Option<VisitEvent> {
        let event = self.unprocessed.pop()?;
        self.processed.push_front(event.clone());
        Some(event)
    }

    /// Moves the unprocessed events at `positions` into the processed history.
    ///
    /// Positions refer to the unprocessed slice a cursor was taken from; unknown
    /// or repeated positions are ignored.
    pub fn consume(&mut self, positions: &[usize]) -> usize {
        if positions.is_empty() {
            return 0;
        }

        let mut taken = Vec::with_capacity(positions.len());
        let mut kept = Vec::with_capacity(self.unprocessed.len());
        for (i, event) in self.unprocessed.drain(..).enumerate() {
            if positions.contains(&i) {
                taken.push(event);
            } else {
                kept.push(event);
            }
        }
        self.unprocessed = kept;

        let consumed = taken.len();
        self.processed.extend(taken);
        self.processed
            .make_contiguous()
            .sort_by_key(|e| e.timestamp);
        consumed
    }
}

/// Read-only position in an unprocessed event sequence.
///
/// Advancing returns a new cursor; the underlying queue only changes when the
/// consumed positions are committed with [`EventQueue::consume`].
#[derive(Debug, Clone, Copy)]
pub struct EventCursor<'a> {
    events: &'a [VisitEvent],
    position: usize,
}

impl<'a> EventCursor<'a> {
    pub fn peek(&self) -> Option<&'a VisitEvent> {
        self.events.get(self.position)
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn advance(self) -> Self {
        Self {
            position: self.position + 1,
            ..self
        }
    }

    /// Current event and the cursor past it.
    pub fn next(self) -> Option<(&'a VisitEvent, Self)> {
        self.peek().map(|event| (event, self.advance()))
    }

    pub fn remaining(&self) -> usize {
        self.events.len().saturating_sub(self.position)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn event(minute: u32) -> VisitEvent {
        VisitEvent {
            stop_id: StopId::new("S1"),
            kind: EventKind::Arrival,
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 10, minute, 0).unwrap(),
        }
    }

    #[test]
    fn test_pop_most_recent_keeps_processed_chronological() {
        let mut q = EventQueue::new();
        q.push(event(1));
        q.push(event(2));
        q.push(event(3));

        assert_eq!(q.pop_most_recent(), Some(event(3)));
        assert_eq!(q.pop_most_recent(), Some(event(2)));

        let processed: Vec<_> = q.processed().iter().cloned().collect();
        assert_eq!(processed, vec![event(2), event(3)]);
        assert_eq!(q.unprocessed(), &[event(1)]);
    }

    #[test]
    fn test_pop_on_empty_queue() {
        let mut q = EventQueue::new();
        assert_eq!(q.pop_most_recent(), None);
        assert!(q.processed().is_empty());
    }

    #[test]
    fn test_cursor_walks_without_mutation() {
        let mut q = EventQueue::new();
        q.push(event(1));
        q.push(event(2));

        let cursor = q.cursor();
        let (first, cursor) = cursor.next().unwrap();
        let (second, cursor) = cursor.next().unwrap();
        assert_eq!(first, &event(1));
        assert_eq!(second, &event(2));
        assert!(cursor.next().is_none());
        assert_eq!(q.unprocessed().len(), 2);
    }

    #[test]
    fn test_consume_moves_positions_once() {
        let mut q = EventQueue::new();
        for m in 1..=4 {
            q.push(event(m));
        }

        assert_eq!(q.consume(&[1, 3, 3, 9]), 2);
        assert_eq!(q.unprocessed(), &[event(1), event(3)]);
        let processed: Vec<_> = q.processed().iter().cloned().collect();
        assert_eq!(processed, vec![event(2), event(4)]);
        assert_eq!(q.all().len(), 4);
    }
}
