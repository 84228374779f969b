//! Report ingestion gateway.
//!
//! Validates incoming agent reports and hands them to the store as one
//! logical unit of work. Validation is deliberately thin: only the reporting
//! identity is checked. Metric values pass through exactly as reported, even
//! when out of the nominal 0-100 range - dashboards show what agents said.

use crate::error::{CorralError, Result};
use crate::store::Store;
use crate::types::Report;
use std::sync::Arc;
use tracing::{debug, instrument};

/// Gateway between the transport layer and the store.
#[derive(Clone)]
pub struct Gateway {
    store: Arc<Store>,
}

impl Gateway {
    pub fn new(store: Arc<Store>) -> Self {
        Self { store }
    }

    /// Accept one report. Returns the id of the machine it resolved to.
    #[instrument(skip(self, report), fields(hostname = %report.hostname))]
    pub async fn ingest(&self, report: &Report) -> Result<i64> {
        if report.hostname.is_empty() {
            return Err(CorralError::InvalidReport { reason: "hostname is required".to_string() });
        }

        let machine_id = self.store.save_report(report).await?;
        metrics::counter!("corral_reports_ingested_total").increment(1);
        debug!(machine_id, "report ingested");
        Ok(machine_id)
    }
}
