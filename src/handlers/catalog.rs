use std::sync::Arc;

use axum::extract::{Query, State};
use axum::Json;
use serde::{Deserialize, Serialize};

use crate::db::queries;
use crate::errors::AppError;
use crate::models::Service;
use crate::state::AppState;

#[derive(Deserialize)]
pub struct CatalogQuery {
    subdomain: Option<String>,
}

#[derive(Serialize)]
pub struct CatalogResponse {
    success: bool,
    services: Vec<Service>,
}

// GET /api/public/services?subdomain=X
pub async fn list_services(
    State(state): State<Arc<AppState>>,
    Query(query): Query<CatalogQuery>,
) -> Result<Json<CatalogResponse>, AppError> {
    let subdomain = query
        .subdomain
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| AppError::BadRequest("Missing required param: subdomain".to_string()))?;

    let db = state.db()?;
    let business = queries::get_business_by_subdomain(&db, subdomain.trim())?
        .ok_or_else(|| AppError::NotFound("Business not found".to_string()))?;
    let services = queries::list_services(&db, business.id)?;

    Ok(Json(CatalogResponse {
        success: true,
        services,
    }))
}
