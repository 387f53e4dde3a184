//! The search → results → booking flow as an explicit state machine.
//!
//! `Session` performs no I/O. The orchestrator in [`crate::agent`] asks it
//! to move between states and feeds it generated text; every guard and
//! warning lives here so it can be exercised without a model.

use serde::Serialize;
use thiserror::Error;
use tracing::info;

use crate::booking::{assemble_confirmation, BookingConfirmation, Selections};
use crate::preferences::{TravelForm, TravelPreferences, ValidationError};
use crate::prompt::TaskKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    Idle,
    Searching,
    ResultsShown,
    Booked,
}

/// Both generated option blocks for one set of preferences.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct SearchResults {
    pub preferences: TravelPreferences,
    pub flight_options: String,
    pub hotel_options: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Session {
    #[default]
    Idle,
    Searching {
        preferences: TravelPreferences,
        flight_options: Option<String>,
    },
    ResultsShown(SearchResults),
    Booked {
        results: SearchResults,
        selections: Selections,
        confirmation: BookingConfirmation,
    },
}

/// Recoverable problems shown to the user; the session is left as it was.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum Warning {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("Please select at least a flight or a hotel to book.")]
    SelectionMissing,
    #[error("Search for flights and hotels before booking.")]
    NothingToBook,
    #[error("{0} options arrived while no search was waiting for them")]
    OutOfSequence(TaskKind),
}

impl Session {
    pub fn phase(&self) -> Phase {
        match self {
            Session::Idle => Phase::Idle,
            Session::Searching { .. } => Phase::Searching,
            Session::ResultsShown(_) => Phase::ResultsShown,
            Session::Booked { .. } => Phase::Booked,
        }
    }

    pub fn preferences(&self) -> Option<&TravelPreferences> {
        match self {
            Session::Idle => None,
            Session::Searching { preferences, .. } => Some(preferences),
            Session::ResultsShown(results) | Session::Booked { results, .. } => {
                Some(&results.preferences)
            }
        }
    }

    pub fn results(&self) -> Option<&SearchResults> {
        match self {
            Session::ResultsShown(results) | Session::Booked { results, .. } => Some(results),
            _ => None,
        }
    }

    pub fn selections(&self) -> Option<&Selections> {
        match self {
            Session::Booked { selections, .. } => Some(selections),
            _ => None,
        }
    }

    pub fn confirmation(&self) -> Option<&BookingConfirmation> {
        match self {
            Session::Booked { confirmation, .. } => Some(confirmation),
            _ => None,
        }
    }

    /// Start a new cycle from any state. An invalid form leaves the session untouched.
    pub fn begin_search(&mut self, form: &TravelForm) -> Result<TravelPreferences, Warning> {
        let preferences = form.validate()?;
        info!(from = ?self.phase(), destination = %preferences.destination, "Starting search");
        *self = Session::Searching {
            preferences: preferences.clone(),
            flight_options: None,
        };
        Ok(preferences)
    }

    pub fn record_flights(&mut self, text: String) -> Result<(), Warning> {
        match self {
            Session::Searching { flight_options, .. } if flight_options.is_none() => {
                *flight_options = Some(text);
                Ok(())
            }
            _ => Err(Warning::OutOfSequence(TaskKind::Flight)),
        }
    }

    pub fn record_hotels(&mut self, text: String) -> Result<(), Warning> {
        match std::mem::take(self) {
            Session::Searching {
                preferences,
                flight_options: Some(flight_options),
            } => {
                info!(destination = %preferences.destination, "Search results ready");
                *self = Session::ResultsShown(SearchResults {
                    preferences,
                    flight_options,
                    hotel_options: text,
                });
                Ok(())
            }
            other => {
                *self = other;
                Err(Warning::OutOfSequence(TaskKind::Hotel))
            }
        }
    }

    /// Drop an unfinished cycle after a failed generation call.
    pub fn abort(&mut self) {
        if let Session::Searching { preferences, .. } = self {
            info!(destination = %preferences.destination, "Search aborted");
            *self = Session::Idle;
        }
    }

    /// Book from the current results. Rebooking from `Booked` replaces the confirmation.
    pub fn book(&mut self, selections: Selections) -> Result<BookingConfirmation, Warning> {
        if self.results().is_none() {
            return Err(Warning::NothingToBook);
        }
        if selections.is_empty() {
            return Err(Warning::SelectionMissing);
        }
        let results = match std::mem::take(self) {
            Session::ResultsShown(results) | Session::Booked { results, .. } => results,
            other => {
                *self = other;
                return Err(Warning::NothingToBook);
            }
        };
        let confirmation = assemble_confirmation(&results.preferences, &selections);
        info!(destination = %results.preferences.destination, "Booking confirmed");
        *self = Session::Booked {
            results,
            selections,
            confirmation: confirmation.clone(),
        };
        Ok(confirmation)
    }
}
