///! Selection window: a contiguous frequency span being filled greedily.

use hfdl_common::{Hz, StationId};

use super::RankClass;
use crate::model::FrequencySet;

/// A frequency admitted to a window, with the station that brought it in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Member {
    pub frequency: Hz,
    pub station: StationId,
    pub class: RankClass,
}

/// Members in order of admission plus the current span bounds.
/// Invariant: `high - low` never exceeds the limit the members were admitted under.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SelectionWindow {
    members: Vec<Member>,
    low: Hz,
    high: Hz,
}

impl SelectionWindow {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_empty(&self) -> bool {
        self.members.is_empty()
    }

    pub fn len(&self) -> usize {
        self.members.len()
    }

    pub fn members(&self) -> &[Member] {
        &self.members
    }

    pub fn low(&self) -> Option<Hz> {
        (!self.is_empty()).then_some(self.low)
    }

    pub fn high(&self) -> Option<Hz> {
        (!self.is_empty()).then_some(self.high)
    }

    pub fn span(&self) -> Hz {
        self.high - self.low
    }

    pub fn contains(&self, freq: Hz) -> bool {
        self.members.iter().any(|m| m.frequency == freq)
    }

    /// Span the window would have after admitting `freq`
    pub fn span_with(&self, freq: Hz) -> Hz {
        if self.is_empty() {
            return 0;
        }
        self.high.max(freq) - self.low.min(freq)
    }

    pub fn fits(&self, freq: Hz, limit: Hz) -> bool {
        self.span_with(freq) <= limit
    }

    /// How far the span must grow to reach `freq` (0 when inside)
    pub fn distance(&self, freq: Hz) -> Hz {
        if self.is_empty() {
            0
        } else if freq < self.low {
            self.low - freq
        } else if freq > self.high {
            freq - self.high
        } else {
            0
        }
    }

    pub fn insert(&mut self, member: Member) {
        if self.is_empty() {
            self.low = member.frequency;
            self.high = member.frequency;
        } else {
            self.low = self.low.min(member.frequency);
            self.high = self.high.max(member.frequency);
        }
        self.members.push(member);
    }

    /// Remove the most recently admitted member
    pub fn pop(&mut self) -> Option<Member> {
        let member = self.members.pop()?;
        self.low = self.members.iter().map(|m| m.frequency).min().unwrap_or(0);
        self.high = self.members.iter().map(|m| m.frequency).max().unwrap_or(0);
        Some(member)
    }

    pub fn frequencies(&self) -> FrequencySet {
        self.members.iter().map(|m| m.frequency).collect()
    }

    pub fn count_class(&self, class: RankClass) -> usize {
        self.members.iter().filter(|m| m.class == class).count()
    }
}
