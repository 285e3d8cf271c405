//! Per-slot show/hide decisions with a dead band around the detection threshold.

use crate::settings::CalibrationSettings;

/// Visibility of one face slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Visibility {
    #[default]
    Hidden,
    Shown,
}

impl Visibility {
    pub fn is_shown(self) -> bool {
        self == Visibility::Shown
    }
}

/// Edge produced when a slot changes visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VisibilityChange {
    pub slot: usize,
    pub visible: bool,
}

/// Confidence band: show strictly above `show_above`, hide strictly below `hide_below`.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Hysteresis {
    pub show_above: f64,
    pub hide_below: f64,
}

impl Hysteresis {
    pub fn new(threshold: f64, hysteresis: f64) -> Self {
        Self {
            show_above: threshold + hysteresis,
            hide_below: threshold - hysteresis,
        }
    }

    pub fn from_settings(settings: &CalibrationSettings) -> Self {
        Self::new(settings.detection_threshold, settings.detection_hysteresis)
    }

    /// Next state for one slot. Values on either band edge never transition.
    pub fn next(&self, state: Visibility, confidence: f64) -> Visibility {
        match state {
            Visibility::Shown if confidence < self.hide_below => Visibility::Hidden,
            Visibility::Hidden if confidence > self.show_above => Visibility::Shown,
            _ => state,
        }
    }
}

/// Visibility state for every configured face slot.
#[derive(Debug, Clone)]
pub struct VisibilityTracker {
    band: Hysteresis,
    states: Vec<Visibility>,
}

impl VisibilityTracker {
    pub fn new(band: Hysteresis, slots: usize) -> Self {
        Self {
            band,
            states: vec![Visibility::Hidden; slots],
        }
    }

    pub fn slots(&self) -> usize {
        self.states.len()
    }

    pub fn state(&self, slot: usize) -> Visibility {
        self.states.get(slot).copied().unwrap_or_default()
    }

    /// Compute the edge for `slot` without committing it.
    pub fn peek(&self, slot: usize, confidence: f64) -> Option<VisibilityChange> {
        let current = self.states.get(slot).copied()?;
        let next = self.band.next(current, confidence);
        (next != current).then_some(VisibilityChange {
            slot,
            visible: next.is_shown(),
        })
    }

    /// Commit a change previously returned by [`peek`](Self::peek).
    pub fn commit(&mut self, change: VisibilityChange) {
        if let Some(state) = self.states.get_mut(change.slot) {
            *state = if change.visible {
                Visibility::Shown
            } else {
                Visibility::Hidden
            };
        }
    }

    /// Advance one slot and return the edge, if any.
    pub fn step(&mut self, slot: usize, confidence: f64) -> Option<VisibilityChange> {
        let change = self.peek(slot, confidence)?;
        self.commit(change);
        Some(change)
    }

    /// Advance every slot from one frame of confidences.
    ///
    /// Slots past the end of `confidences` count as confidence 0.
    pub fn step_all(&mut self, confidences: &[f64]) -> Vec<VisibilityChange> {
        (0..self.states.len())
            .filter_map(|slot| {
                let confidence = confidences.get(slot).copied().unwrap_or(0.0);
                self.step(slot, confidence)
            })
            .collect()
    }
}
