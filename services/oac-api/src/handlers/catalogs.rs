//! Catalog listing handler.

use axum::{extract::Extension, response::IntoResponse, response::Response, Json};
use std::sync::Arc;

use oac_protocol::{CatalogList, CatalogSnapshot, CatalogSummary, OutputFormat};

use crate::content_negotiation::query_error_response;
use crate::state::AppState;

/// GET /catalogs - Catalogs of the current snapshot in preference order
pub async fn list_catalogs_handler(Extension(state): Extension<Arc<AppState>>) -> Response {
    match state.snapshot().await {
        Ok(snapshot) => Json(catalog_list(&snapshot)).into_response(),
        Err(e) => query_error_response(&e, OutputFormat::Json),
    }
}

/// Summarize a snapshot.
pub fn catalog_list(snapshot: &CatalogSnapshot) -> CatalogList {
    CatalogList {
        version: snapshot.version(),
        loaded_at: snapshot.loaded_at().to_rfc3339(),
        catalogs: snapshot
            .catalogs()
            .iter()
            .map(|c| CatalogSummary {
                id: c.id().to_string(),
                events: c.len(),
                quantities: c.quantity_count(),
            })
            .collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use oac_protocol::{Catalog, Event, Observation};

    #[test]
    fn test_catalog_list() {
        let event = Event::new("SN2014J", "sne")
            .with_quantity("redshift", vec![Observation::new().with("value", "0.0008")])
            .with_quantity("host", vec![Observation::new().with("value", "M82")]);
        let snapshot = CatalogSnapshot::builder()
            .version(4)
            .catalog(Catalog::new("sne", vec![event]))
            .catalog(Catalog::new("tde", vec![]))
            .build();

        let list = catalog_list(&snapshot);
        assert_eq!(list.version, 4);
        assert_eq!(list.catalogs.len(), 2);
        assert_eq!(list.catalogs[0].id, "sne");
        assert_eq!(list.catalogs[0].events, 1);
        assert_eq!(list.catalogs[1].events, 0);
    }
}
