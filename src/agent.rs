use std::sync::Arc;

use thiserror::Error;
use tracing::{debug, error, info};

use crate::booking::{BookingConfirmation, Selections};
use crate::llm_interaction::{GenerationError, TextGenerator};
use crate::preferences::{TravelForm, TravelPreferences};
use crate::prompt::{build_prompt, TaskKind};
use crate::session::{SearchResults, Session, Warning};

#[derive(Debug, Error)]
pub enum FlowError {
    #[error(transparent)]
    Warning(#[from] Warning),

    #[error("Searching for {task} options failed: {source}")]
    Generation {
        task: TaskKind,
        #[source]
        source: GenerationError,
    },
}

/// Drives one user's session: two generation calls per search, then booking.
pub struct TravelAgent {
    generator: Arc<dyn TextGenerator>,
    session: Session,
}

impl TravelAgent {
    pub fn new(generator: Arc<dyn TextGenerator>) -> Self {
        Self {
            generator,
            session: Session::default(),
        }
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Validate the form, then ask for flights and hotels in that order.
    ///
    /// A failed call aborts the whole cycle and leaves the session idle.
    pub async fn search(&mut self, form: &TravelForm) -> Result<SearchResults, FlowError> {
        let preferences = self.session.begin_search(form)?;

        info!("Searching for flights...");
        let flights = self.generate(&preferences, TaskKind::Flight).await?;
        self.session.record_flights(flights)?;

        info!("Searching for hotels...");
        let hotels = self.generate(&preferences, TaskKind::Hotel).await?;
        self.session.record_hotels(hotels)?;

        self.session
            .results()
            .cloned()
            .ok_or(FlowError::Warning(Warning::OutOfSequence(TaskKind::Hotel)))
    }

    pub fn book(&mut self, selections: Selections) -> Result<BookingConfirmation, FlowError> {
        info!("Processing your booking...");
        Ok(self.session.book(selections)?)
    }

    async fn generate(
        &mut self,
        preferences: &TravelPreferences,
        task: TaskKind,
    ) -> Result<String, FlowError> {
        let prompt = build_prompt(preferences, task);
        debug!(%task, %prompt, "Built prompt");
        match self.generator.generate(&prompt).await {
            Ok(text) => Ok(text),
            Err(source) => {
                error!(%task, error = %source, "Generation call failed");
                self.session.abort();
                Err(FlowError::Generation { task, source })
            }
        }
    }
}
