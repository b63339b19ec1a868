use std::path::Path;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::Context;
use tracing::{debug, info};

use crate::config::InsightsConfig;
use crate::ingest::ReportInputs;
use crate::insights::{derive_insights, Insights};

/// Identifies one load request. Only the most recently issued ticket may
/// publish its results.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoadTicket(u64);

pub struct ReportLoader {
    config: InsightsConfig,
    generation: AtomicU64,
}

impl ReportLoader {
    pub fn new(config: InsightsConfig) -> Self {
        Self {
            config,
            generation: AtomicU64::new(0),
        }
    }

    pub fn config(&self) -> &InsightsConfig {
        &self.config
    }

    pub fn begin(&self) -> LoadTicket {
        LoadTicket(self.generation.fetch_add(1, Ordering::SeqCst) + 1)
    }

    pub fn is_current(&self, ticket: LoadTicket) -> bool {
        self.generation.load(Ordering::SeqCst) == ticket.0
    }

    pub async fn load(
        &self,
        path: &Path,
        character: Option<&str>,
    ) -> anyhow::Result<Option<Insights>> {
        let ticket = self.begin();
        self.load_for(ticket, path, character).await
    }

    /// Returns `None` when a newer load was started while this one was in
    /// flight.
    pub async fn load_for(
        &self,
        ticket: LoadTicket,
        path: &Path,
        character: Option<&str>,
    ) -> anyhow::Result<Option<Insights>> {
        let raw = tokio::fs::read_to_string(path)
            .await
            .with_context(|| format!("failed to read report {}", path.display()))?;

        if !self.is_current(ticket) {
            debug!(?ticket, "discarding stale report load");
            return Ok(None);
        }

        let inputs = ReportInputs::from_json_str(&raw)
            .with_context(|| format!("failed to parse report {}", path.display()))?;
        let insights = derive_insights(&inputs, &self.config, character)?;

        if !self.is_current(ticket) {
            debug!(?ticket, "discarding stale report load");
            return Ok(None);
        }

        info!(path = %path.display(), "report loaded");
        Ok(Some(insights))
    }
}
