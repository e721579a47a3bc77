// src/window.rs
//! Date-space generation: which (departure, return) pairs a cycle probes.

use chrono::{Days, NaiveDate};
use serde::{Deserialize, Serialize};

/// Trip-length policy. A zero-day trip never produces a pair, so ranges are
/// clamped to start at one day.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TripLength {
    Fixed(u32),
    Range { min: u32, max: u32 },
}

impl TripLength {
    /// Inclusive bounds, or `None` when the policy yields no lengths.
    fn bounds(self) -> Option<(u32, u32)> {
        let (min, max) = match self {
            Self::Fixed(n) => (n, n),
            Self::Range { min, max } => (min.max(1), max),
        };
        (min >= 1 && min <= max).then_some((min, max))
    }

    /// Shortest stay the policy produces; `None` when it produces none.
    pub fn shortest(self) -> Option<u32> {
        self.bounds().map(|(min, _)| min)
    }

    pub fn describe(self) -> String {
        match self {
            Self::Fixed(n) => format!("{n}-day trip"),
            Self::Range { min, max } => format!("{min}-{max} day trips"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub search_days: u32,
    pub trip_length: TripLength,
}

impl SearchWindow {
    pub fn new(search_days: u32, trip_length: TripLength) -> Self {
        Self {
            search_days,
            trip_length,
        }
    }

    /// Number of pairs [`generate`] yields (ignoring calendar overflow).
    pub fn pair_count(&self) -> usize {
        match self.trip_length.bounds() {
            Some((min, max)) => self.search_days as usize * (max - min + 1) as usize,
            None => 0,
        }
    }
}

/// Lazily enumerate pairs departure-major, trip-length-minor, ascending.
/// Departures cover `today+1 ..= today+search_days`.
pub fn generate(window: &SearchWindow, today: NaiveDate) -> DateSpace {
    let bounds = window.trip_length.bounds().filter(|_| window.search_days >= 1);
    let (min_trip, max_trip) = bounds.unwrap_or((1, 0));
    DateSpace {
        today,
        search_days: if bounds.is_some() { window.search_days } else { 0 },
        min_trip,
        max_trip,
        dep_offset: 1,
        trip: min_trip,
    }
}

/// Iterator returned by [`generate`]. Holds only its inputs and a cursor, so
/// calling `generate` again with the same inputs replays the same sequence.
#[derive(Debug, Clone)]
pub struct DateSpace {
    today: NaiveDate,
    search_days: u32,
    min_trip: u32,
    max_trip: u32,
    dep_offset: u32,
    trip: u32,
}

impl Iterator for DateSpace {
    type Item = (NaiveDate, NaiveDate);

    fn next(&mut self) -> Option<Self::Item> {
        if self.dep_offset > self.search_days {
            return None;
        }
        let departure = self
            .today
            .checked_add_days(Days::new(u64::from(self.dep_offset)));
        let ret = departure.and_then(|d| d.checked_add_days(Days::new(u64::from(self.trip))));

        if self.trip < self.max_trip {
            self.trip += 1;
        } else {
            self.trip = self.min_trip;
            self.dep_offset += 1;
        }

        match (departure, ret) {
            (Some(d), Some(r)) => Some((d, r)),
            // Past the end of the calendar: nothing further can be valid.
            _ => {
                self.dep_offset = self.search_days + 1;
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn today() -> NaiveDate {
        NaiveDate::from_ymd_opt(2025, 1, 1).unwrap()
    }

    #[test]
    fn fixed_policy_one_pair_per_day() {
        let w = SearchWindow::new(3, TripLength::Fixed(14));
        let pairs: Vec<_> = generate(&w, today()).collect();
        assert_eq!(pairs.len(), 3);
        assert_eq!(pairs[0].0, NaiveDate::from_ymd_opt(2025, 1, 2).unwrap());
        assert_eq!(pairs[0].1, NaiveDate::from_ymd_opt(2025, 1, 16).unwrap());
        assert_eq!(pairs[2].0, NaiveDate::from_ymd_opt(2025, 1, 4).unwrap());
    }

    #[test]
    fn range_policy_is_departure_major() {
        let w = SearchWindow::new(2, TripLength::Range { min: 2, max: 4 });
        let trips: Vec<(u32, i64)> = generate(&w, today())
            .map(|(d, r)| (d.signed_duration_since(today()).num_days() as u32, (r - d).num_days()))
            .collect();
        assert_eq!(trips, vec![(1, 2), (1, 3), (1, 4), (2, 2), (2, 3), (2, 4)]);
        assert_eq!(w.pair_count(), 6);
    }

    #[test]
    fn empty_inputs_yield_nothing() {
        let none = [
            SearchWindow::new(0, TripLength::Fixed(7)),
            SearchWindow::new(5, TripLength::Fixed(0)),
            SearchWindow::new(5, TripLength::Range { min: 6, max: 2 }),
        ];
        for w in none {
            assert_eq!(generate(&w, today()).count(), 0, "{w:?}");
            assert_eq!(w.pair_count(), 0);
        }
    }

    #[test]
    fn shortest_stay_follows_the_policy() {
        assert_eq!(TripLength::Fixed(14).shortest(), Some(14));
        assert_eq!(TripLength::Range { min: 3, max: 7 }.shortest(), Some(3));
        assert_eq!(TripLength::Range { min: 0, max: 7 }.shortest(), Some(1));
        assert_eq!(TripLength::Range { min: 6, max: 2 }.shortest(), None);
        assert_eq!(TripLength::Fixed(0).shortest(), None);
    }

    #[test]
    fn zero_min_is_clamped() {
        let w = SearchWindow::new(1, TripLength::Range { min: 0, max: 2 });
        let lens: Vec<i64> = generate(&w, today()).map(|(d, r)| (r - d).num_days()).collect();
        assert_eq!(lens, vec![1, 2]);
    }
}
