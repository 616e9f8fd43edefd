use chrono::{Duration as ChronoDuration, NaiveDateTime, NaiveTime, Timelike};
use serde::{Deserialize, Serialize};
use std::fmt;

/// An on-air character/voice active for a window of the day.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Persona {
    pub name: String,
}

impl Persona {
    pub fn new(name: &str) -> Self {
        Persona {
            name: name.to_string(),
        }
    }

    /// Filename marker for this persona: lowercase, spaces as underscores.
    pub fn marker(&self) -> String {
        self.name.to_lowercase().replace(' ', "_")
    }
}

impl fmt::Display for Persona {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name)
    }
}

/// Maps wall-clock time to the active persona. Pure and deterministic —
/// the only state is the two configured boundary hours.
///
/// Two boundaries partition the 24-hour clock into exactly two contiguous
/// windows: the morning persona owns `[morning_hour, evening_hour)` and the
/// evening persona owns the overnight wrap, with no special case at
/// midnight. Boundaries are inclusive on the persona that begins there.
#[derive(Debug, Clone)]
pub struct DjScheduler {
    morning_hour: u32,
    evening_hour: u32,
    morning: Persona,
    evening: Persona,
}

pub const DEFAULT_MORNING_HOUR: u32 = 6;
pub const DEFAULT_EVENING_HOUR: u32 = 19;

impl DjScheduler {
    pub fn new(morning_hour: u32, evening_hour: u32, morning: Persona, evening: Persona) -> Self {
        DjScheduler {
            morning_hour,
            evening_hour,
            morning,
            evening,
        }
    }

    /// The persona on air at `when`.
    pub fn current_persona(&self, when: NaiveDateTime) -> &Persona {
        let hour = when.hour();
        if hour >= self.morning_hour && hour < self.evening_hour {
            &self.morning
        } else {
            &self.evening
        }
    }

    /// True for the entire hour of either boundary — used to gate behaviors
    /// like starting a show during a handoff hour.
    pub fn is_transition(&self, when: NaiveDateTime) -> bool {
        let hour = when.hour();
        hour == self.morning_hour || hour == self.evening_hour
    }

    /// The next persona handoff instant, strictly after `when`. Falls to
    /// tomorrow's morning boundary once both of today's have passed.
    pub fn next_transition(&self, when: NaiveDateTime) -> NaiveDateTime {
        let date = when.date();
        let boundaries = [self.morning_hour, self.evening_hour];
        let mut candidates: Vec<NaiveDateTime> = boundaries
            .iter()
            .filter_map(|&h| NaiveTime::from_hms_opt(h, 0, 0))
            .map(|t| date.and_time(t))
            .filter(|&t| t > when)
            .collect();
        candidates.sort();

        match candidates.first() {
            Some(&t) => t,
            None => {
                let tomorrow = date + ChronoDuration::days(1);
                let morning = NaiveTime::from_hms_opt(self.morning_hour, 0, 0)
                    .unwrap_or(NaiveTime::MIN);
                tomorrow.and_time(morning)
            }
        }
    }

    pub fn morning_persona(&self) -> &Persona {
        &self.morning
    }

    pub fn evening_persona(&self) -> &Persona {
        &self.evening
    }
}

impl Default for DjScheduler {
    fn default() -> Self {
        DjScheduler::new(
            DEFAULT_MORNING_HOUR,
            DEFAULT_EVENING_HOUR,
            Persona::new("Persona A"),
            Persona::new("Persona B"),
        )
    }
}
