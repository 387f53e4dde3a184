use std::fmt;

use crate::preferences::{TravelPreferences, DATE_FORMAT};

/// What a prompt asks the model to search for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskKind {
    Flight,
    Hotel,
}

impl fmt::Display for TaskKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TaskKind::Flight => write!(f, "flight"),
            TaskKind::Hotel => write!(f, "hotel"),
        }
    }
}

/// Interpolate every preference into the fixed template for `task`.
///
/// Values are embedded as typed; nothing is escaped or truncated.
pub fn build_prompt(prefs: &TravelPreferences, task: TaskKind) -> String {
    let departure = prefs.departure_date.format(DATE_FORMAT);
    let ret = prefs.return_date.format(DATE_FORMAT);
    match task {
        TaskKind::Flight => format!(
            "Search for flights to {} departing on {} and returning on {} for {} adults and {} children, \
            within a budget of {}. Consider any preferences: {}. \
            Provide a few options including airline, price, and duration.",
            prefs.destination,
            departure,
            ret,
            prefs.num_adults,
            prefs.num_children,
            prefs.budget,
            prefs.preferences,
        ),
        TaskKind::Hotel => format!(
            "Search for hotels in {} for the dates {} to {} accommodating {} adults and {} children, \
            within a budget of {}. Consider any preferences: {}. \
            Provide a few options including hotel name, price per night, and star rating.",
            prefs.destination,
            departure,
            ret,
            prefs.num_adults,
            prefs.num_children,
            prefs.budget,
            prefs.preferences,
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::NaiveDate;

    fn paris() -> TravelPreferences {
        TravelPreferences {
            destination: "Paris".to_string(),
            departure_date: NaiveDate::from_ymd_opt(2024, 6, 1).unwrap(),
            return_date: NaiveDate::from_ymd_opt(2024, 6, 10).unwrap(),
            num_adults: 2,
            num_children: 0,
            budget: "$3000".to_string(),
            preferences: "direct flights".to_string(),
        }
    }

    #[test]
    fn test_flight_prompt_contains_every_field() {
        let prompt = build_prompt(&paris(), TaskKind::Flight);
        for literal in ["Paris", "2024-06-01", "2024-06-10", "2", "0", "$3000", "direct flights"] {
            assert!(prompt.contains(literal), "missing {literal:?} in {prompt}");
        }
        assert!(prompt.starts_with("Search for flights to Paris departing on 2024-06-01"));
        assert!(prompt.contains("for 2 adults and 0 children"));
        assert!(prompt.ends_with("airline, price, and duration."));
    }

    #[test]
    fn test_hotel_prompt_contains_every_field() {
        let prompt = build_prompt(&paris(), TaskKind::Hotel);
        assert_eq!(
            prompt,
            "Search for hotels in Paris for the dates 2024-06-01 to 2024-06-10 accommodating \
             2 adults and 0 children, within a budget of $3000. Consider any preferences: \
             direct flights. Provide a few options including hotel name, price per night, \
             and star rating."
        );
    }

    #[test]
    fn test_prompt_is_not_escaped() {
        let mut prefs = paris();
        prefs.preferences = "<b>quiet</b> & \"cheap\"\nno layovers".to_string();
        let prompt = build_prompt(&prefs, TaskKind::Flight);
        assert!(prompt.contains("<b>quiet</b> & \"cheap\"\nno layovers"));
    }
}
