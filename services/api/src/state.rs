//! Shared Application State
//!
//! This module defines the `AppState` struct, which holds all shared,
//! clonable resources like database pools and service clients.

use crate::config::Config;
use improv_core::{
    SessionController, llm_client::LLMClient, persona::PersonaPrompt,
    scenario::{ScenarioPool, ScenarioSource},
};
use std::sync::Arc;

/// The shared application state, created once at startup and passed to all handlers.
/// All fields are public to be accessible from other modules.
#[derive(Clone)]
pub struct AppState {
    pub db: Arc<crate::db::Db>,
    pub scenario_source: Arc<dyn ScenarioSource>,
    pub llm_client: Arc<dyn LLMClient>,
    pub persona: Arc<PersonaPrompt>,
    pub config: Arc<Config>,
}

impl AppState {
    /// Builds a fresh controller for a new game from the configured source.
    ///
    /// A pool that cannot cover `max_rounds` is rejected here, before any
    /// session row exists.
    pub async fn new_game(&self) -> anyhow::Result<SessionController> {
        let scenarios = self
            .scenario_source
            .load_scenarios(self.config.scenario_count)
            .await?;
        let pool = ScenarioPool::new(scenarios, self.config.max_rounds)?;
        Ok(SessionController::new(pool, self.config.scenario_order))
    }
}
