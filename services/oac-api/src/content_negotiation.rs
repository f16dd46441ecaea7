//! Content negotiation and response construction for query results.
//!
//! An explicit `format` argument wins over the Accept header. Unsupported
//! formats fall back to JSON rather than failing the request.

use axum::http::{header, HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};
use oac_protocol::{media_types, ExceptionResponse, OutputFormat, QueryArg, QueryError, ResourceLimitExceeded};

/// Header reporting that a resource limit cut the result short.
pub const TRUNCATED_HEADER: &str = "x-result-truncated";

/// Pick the output format from the `format` argument or the Accept header.
pub fn negotiate_format(headers: &HeaderMap, args: &[QueryArg]) -> OutputFormat {
    let explicit = args
        .iter()
        .rev()
        .find(|a| a.key.eq_ignore_ascii_case("format"))
        .and_then(|a| a.value.as_deref())
        .filter(|v| !v.trim().is_empty());
    if let Some(value) = explicit {
        return OutputFormat::from_directive(value);
    }

    let accept = headers
        .get(header::ACCEPT)
        .and_then(|v| v.to_str().ok())
        .unwrap_or("*/*");

    // Parse Accept header with quality values
    let mut accepted_types: Vec<(&str, f32)> = accept
        .split(',')
        .filter_map(|s| {
            let mut parts = s.split(';');
            let media_type = parts.next()?.trim();
            if media_type.is_empty() {
                return None;
            }
            let quality = parts
                .find_map(|p| p.trim().strip_prefix("q=").and_then(|q| q.parse::<f32>().ok()))
                .unwrap_or(1.0);
            Some((media_type, quality))
        })
        .collect();

    // Stable, so equal qualities keep header order
    accepted_types.sort_by(|a, b| b.1.total_cmp(&a.1));

    for (media_type, _) in &accepted_types {
        match *media_type {
            media_types::CSV => return OutputFormat::Csv,
            media_types::TSV => return OutputFormat::Tsv,
            media_types::JSON | "*/*" | "application/*" => return OutputFormat::Json,
            _ => {}
        }
    }
    OutputFormat::Json
}

/// Successful query response.
pub fn query_response(
    body: String,
    format: OutputFormat,
    download: bool,
    download_name: &str,
    truncation: Option<&ResourceLimitExceeded>,
) -> Response {
    let mut response = (StatusCode::OK, body).into_response();
    let headers = response.headers_mut();
    headers.insert(header::CONTENT_TYPE, HeaderValue::from_static(format.content_type()));

    if download {
        let disposition = format!(
            "attachment; filename=\"{}.{}\"",
            sanitize_filename(download_name),
            format.extension()
        );
        if let Ok(value) = HeaderValue::from_str(&disposition) {
            headers.insert(header::CONTENT_DISPOSITION, value);
        }
    }

    if let Some(limit) = truncation {
        if let Ok(value) = HeaderValue::from_str(&format!("{}={}", limit.kind(), limit.limit())) {
            headers.insert(TRUNCATED_HEADER, value);
        }
    }
    response
}

/// Error response for a rejected query, plain text for tabular requests.
pub fn query_error_response(err: &QueryError, format: OutputFormat) -> Response {
    let status = StatusCode::from_u16(err.status_code()).unwrap_or(StatusCode::BAD_REQUEST);
    exception_response(status, &err.to_exception(), format)
}

pub fn exception_response(status: StatusCode, exc: &ExceptionResponse, format: OutputFormat) -> Response {
    let (content_type, body) = if format.is_delimited() {
        (media_types::TEXT, exc.to_plain_text())
    } else {
        (media_types::JSON, serde_json::to_string(exc).unwrap_or_default())
    };
    let mut response = (status, body).into_response();
    response
        .headers_mut()
        .insert(header::CONTENT_TYPE, HeaderValue::from_static(content_type));
    response
}

/// Keep a download name to characters safe inside a quoted header value.
fn sanitize_filename(name: &str) -> String {
    let cleaned: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.' | '+') { c } else { '_' })
        .collect();
    if cleaned.is_empty() {
        "query".to_string()
    } else {
        cleaned
    }
}
