//! Response body types other than query results.

use serde::{Deserialize, Serialize};

/// Prefix of every exception `type` identifier.
pub const EXCEPTION_TYPE_PREFIX: &str = "urn:oac:error:";

/// Exception response for errors.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ExceptionResponse {
    /// Exception type identifier.
    #[serde(rename = "type")]
    pub type_: String,

    /// Human-readable title.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// HTTP status code.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<u16>,

    /// Detailed error message.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl ExceptionResponse {
    /// Create a new exception response.
    pub fn new(kind: &str, status: u16, detail: impl Into<String>) -> Self {
        Self {
            type_: format!("{}{}", EXCEPTION_TYPE_PREFIX, kind),
            title: None,
            status: Some(status),
            detail: Some(detail.into()),
        }
    }

    /// Set the title.
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    /// Create a 400 Bad Request exception.
    pub fn bad_request(kind: &str, detail: impl Into<String>) -> Self {
        Self::new(kind, 400, detail).with_title("Bad Request")
    }

    /// Create a 503 Service Unavailable exception.
    pub fn service_unavailable(detail: impl Into<String>) -> Self {
        Self::new("service-unavailable", 503, detail).with_title("Service Unavailable")
    }

    /// Create a 500 Internal Server Error exception.
    pub fn internal_error(detail: impl Into<String>) -> Self {
        Self::new("server-error", 500, detail).with_title("Internal Server Error")
    }

    /// Plain-text rendering used for delimited (CSV/TSV) requests.
    pub fn to_plain_text(&self) -> String {
        match (&self.title, &self.detail) {
            (Some(title), Some(detail)) => format!("{}: {}", title, detail),
            (None, Some(detail)) => detail.clone(),
            (Some(title), None) => title.clone(),
            (None, None) => self.type_.clone(),
        }
    }
}

/// One entry of the catalog listing.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogSummary {
    /// Catalog id (e.g. `sne`).
    pub id: String,

    /// Number of events in the catalog.
    pub events: usize,

    /// Number of distinct quantity names across the catalog.
    pub quantities: usize,
}

/// Response body of the catalog listing endpoint.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CatalogList {
    /// Snapshot version the listing was taken from.
    pub version: u64,

    /// When the snapshot was built (RFC 3339).
    #[serde(rename = "loadedAt")]
    pub loaded_at: String,

    /// Catalogs in preference order.
    pub catalogs: Vec<CatalogSummary>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exception_serialization() {
        let exc = ExceptionResponse::bad_request("bad-path", "segment 1 is empty");
        let json = serde_json::to_value(&exc).unwrap();

        assert_eq!(json["type"], "urn:oac:error:bad-path");
        assert_eq!(json["status"], 400);
        assert_eq!(json["title"], "Bad Request");
    }

    #[test]
    fn test_exception_plain_text() {
        let exc = ExceptionResponse::service_unavailable("catalogs are loading");
        assert_eq!(
            exc.to_plain_text(),
            "Service Unavailable: catalogs are loading"
        );
    }

    #[test]
    fn test_catalog_list_serialization() {
        let list = CatalogList {
            version: 3,
            loaded_at: "2024-01-01T00:00:00Z".to_string(),
            catalogs: vec![CatalogSummary {
                id: "sne".to_string(),
                events: 2,
                quantities: 10,
            }],
        };
        let json = serde_json::to_value(&list).unwrap();
        assert_eq!(json["loadedAt"], "2024-01-01T00:00:00Z");
        assert_eq!(json["catalogs"][0]["id"], "sne");
    }
}
