use serde::{Deserialize, Serialize};

use crate::preferences::{TravelPreferences, DATE_FORMAT};

/// Free-text picks typed by the user after reading the generated options.
///
/// Neither value is checked against the generated text.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Selections {
    pub selected_flight: String,
    pub selected_hotel: String,
}

impl Selections {
    pub fn is_empty(&self) -> bool {
        self.selected_flight.is_empty() && self.selected_hotel.is_empty()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct BookingConfirmation(String);

impl BookingConfirmation {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for BookingConfirmation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

pub fn assemble_confirmation(
    prefs: &TravelPreferences,
    selections: &Selections,
) -> BookingConfirmation {
    let mut lines = vec![
        "Booking Confirmed:".to_string(),
        format!("- Destination: {}", prefs.destination),
        format!(
            "- Dates: {} to {}",
            prefs.departure_date.format(DATE_FORMAT),
            prefs.return_date.format(DATE_FORMAT)
        ),
        format!(
            "- Passengers: {} adults, {} children",
            prefs.num_adults, prefs.num_children
        ),
    ];
    if !selections.selected_flight.is_empty() {
        lines.push(format!("- Flight: {}", selections.selected_flight));
    }
    if !selections.selected_hotel.is_empty() {
        lines.push(format!("- Hotel: {}", selections.selected_hotel));
    }
    BookingConfirmation(lines.join("\n"))
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
            num_children: 1,
            budget: "$3000".to_string(),
            preferences: String::new(),
        }
    }

    fn picks(flight: &str, hotel: &str) -> Selections {
        Selections {
            selected_flight: flight.to_string(),
            selected_hotel: hotel.to_string(),
        }
    }

    #[test]
    fn test_flight_only() {
        let text = assemble_confirmation(&paris(), &picks("Delta $450", "")).to_string();
        assert!(text.lines().any(|l| l == "- Flight: Delta $450"));
        assert!(!text.contains("Hotel"));
    }

    #[test]
    fn test_hotel_only() {
        let text = assemble_confirmation(&paris(), &picks("", "Hotel Lutetia")).to_string();
        assert!(text.lines().any(|l| l == "- Hotel: Hotel Lutetia"));
        assert!(!text.contains("Flight"));
    }

    #[test]
    fn test_full_layout() {
        let text = assemble_confirmation(&paris(), &picks("Air France 1", "Le Meurice"));
        assert_eq!(
            text.as_str(),
            "Booking Confirmed:\n\
             - Destination: Paris\n\
             - Dates: 2024-06-01 to 2024-06-10\n\
             - Passengers: 2 adults, 1 children\n\
             - Flight: Air France 1\n\
             - Hotel: Le Meurice"
        );
    }

    #[test]
    fn test_assembly_is_idempotent() {
        let prefs = paris();
        let selections = picks("Delta $450", "Ritz");
        assert_eq!(
            assemble_confirmation(&prefs, &selections).as_str().as_bytes(),
            assemble_confirmation(&prefs, &selections).as_str().as_bytes()
        );
    }

    #[test]
    fn test_only_zero_length_selections_are_empty() {
        assert!(picks("", "").is_empty());
        assert!(!picks(" ", "").is_empty());
        assert!(!picks("", "Ritz").is_empty());
    }

    #[test]
    fn test_selection_text_kept_as_typed() {
        let text = assemble_confirmation(&paris(), &picks(" Delta $450 ", "")).to_string();
        assert!(text.lines().any(|l| l == "- Flight:  Delta $450 "));
        assert!(!text.contains("Hotel"));
    }
}
