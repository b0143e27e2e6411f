//! Form series registry

use std::sync::Arc;

use crate::error::ApiError;
use crate::models::{CreateFormSeriesRequest, FormSeries, SeriesStatus};
use crate::store::Store;

#[derive(Clone)]
pub struct FormSeriesService {
    store: Arc<dyn Store>,
}

impl FormSeriesService {
    pub fn new(store: Arc<dyn Store>) -> Self {
        Self { store }
    }

    pub async fn create(&self, request: CreateFormSeriesRequest) -> Result<FormSeries, ApiError> {
        if request.start_number > request.end_number {
            return Err(ApiError::ValidationError(format!(
                "start_number {} is greater than end_number {}",
                request.start_number, request.end_number
            )));
        }

        let prefix = request.prefix.trim().to_uppercase();
        let existing = self.store.list_form_series(Some(request.partner_id)).await?;
        if let Some(clash) = existing
            .iter()
            .find(|s| s.overlaps(&prefix, request.start_number, request.end_number))
        {
            return Err(ApiError::Conflict(format!(
                "Range overlaps series {} ({}..={})",
                clash.id, clash.start_number, clash.end_number
            )));
        }

        let series = self
            .store
            .insert_form_series(
                request.partner_id,
                &prefix,
                request.start_number,
                request.end_number,
                request.status.unwrap_or(SeriesStatus::Active),
            )
            .await?;

        tracing::info!(
            partner_id = series.partner_id,
            prefix = %series.prefix,
            size = series.size(),
            "Form series registered"
        );
        Ok(series)
    }

    pub async fn list(&self, partner_id: Option<i64>) -> Result<Vec<FormSeries>, ApiError> {
        Ok(self.store.list_form_series(partner_id).await?)
    }
}
