//! HTTP semantics on top of the object store (L2).
//!
//! # Responsibilities
//! - Serve stored responses, honouring `Range`, `If-Range`, `If-Match`,
//!   `If-None-Match`, `If-Modified-Since` and `If-Unmodified-Since`
//! - Rebuild response headers entirely from stored metadata
//! - Store responses with their HTTP metadata, edge directive and version vector
//!
//! # Data Flow
//! ```text
//! lookup: Range? → head → parse (416) → If-Range
//!         If-Match / If-Unmodified-Since   → get(onlyIf) → 412
//!         If-None-Match | If-Modified-Since → get(onlyIf) → 304
//!         get(range) → 200 / 206 with metadata headers
//! store:  response → HttpMetadata + custom metadata → put
//! ```

pub mod range;

use axum::http::{header, HeaderMap, HeaderName, StatusCode};
use bytes::Bytes;
use chrono::{Duration as ChronoDuration, Utc};

use crate::context::ForwardRequest;
use crate::http::date::{format_http_date, parse_http_date};
use crate::http::headers::{CDN_CACHE_CONTROL, X_DEBUG_CACHE_VERSION};
use crate::http::response::{set_header, BufferedResponse};
use crate::storage::{
    BlobStore, CustomMetadata, GetOptions, HttpMetadata, ObjectMeta, ObjectRange, Preconditions,
    PutOptions, StorageError,
};

use range::{content_range, parse_range, to_object_range};

/// Stored when a response carries no edge directive.
const DEFAULT_STORED_DIRECTIVE: &str = "no-store";

/// Look up `key`, applying range and conditional-request semantics.
///
/// `Ok(None)` is a miss; 304, 412 and 416 are returned as responses.
pub async fn lookup(
    store: &dyn BlobStore,
    request: &ForwardRequest,
    key: &str,
) -> Result<Option<BufferedResponse>, StorageError> {
    let mut range: Option<ObjectRange> = None;

    if let Some(range_header) = request.header(&header::RANGE) {
        let Some(meta) = store.head(key).await? else {
            return Ok(None);
        };

        let span = parse_range(meta.size, range_header)
            .ok()
            .and_then(|parsed| parsed.single_bytes());
        let Some(span) = span else {
            tracing::debug!(key = %key, range = %range_header, "Range not satisfiable");
            return Ok(Some(status_only(StatusCode::RANGE_NOT_SATISFIABLE, "Range Not Satisfiable")));
        };
        range = Some(to_object_range(span, meta.size));

        if let Some(if_range) = request.header(&header::IF_RANGE) {
            let date_allows_discard = match parse_http_date(if_range) {
                None => true,
                Some(date) => date > meta.uploaded,
            };
            if date_allows_discard && (if_range.starts_with("W/") || if_range != meta.http_etag()) {
                range = None;
            }
        }
    }

    let if_match = etag_header(request, &header::IF_MATCH);
    let if_unmodified_since = request
        .header(&header::IF_UNMODIFIED_SINCE)
        .and_then(parse_http_date);

    if if_match.is_some() || if_unmodified_since.is_some() {
        let only_if = Preconditions {
            etag_matches: if_match,
            uploaded_before: if_unmodified_since,
            ..Default::default()
        };
        if let Some(object) = store.get(key, guarded(range, only_if)).await? {
            if object.body.is_none() {
                return Ok(Some(status_only(StatusCode::PRECONDITION_FAILED, "Precondition Failed")));
            }
        }
    }

    let if_none_match = etag_header(request, &header::IF_NONE_MATCH);
    let if_modified_since = request
        .header(&header::IF_MODIFIED_SINCE)
        .and_then(parse_http_date);

    let not_modified_guard = match (if_none_match, if_modified_since) {
        (Some(etag), _) => Some(Preconditions {
            etag_does_not_match: Some(etag),
            ..Default::default()
        }),
        (None, Some(date)) => Some(Preconditions {
            uploaded_after: Some(date),
            ..Default::default()
        }),
        (None, None) => None,
    };
    if let Some(only_if) = not_modified_guard {
        if let Some(object) = store.get(key, guarded(range, only_if)).await? {
            if object.body.is_none() {
                return Ok(Some(status_only(StatusCode::NOT_MODIFIED, "")));
            }
        }
    }

    let Some(object) = store.get(key, GetOptions { range, only_if: None }).await? else {
        return Ok(None);
    };
    let body = object.body.unwrap_or_default();
    let headers = object_headers(&object.meta, object.range);
    let status = if object.range.is_some() {
        StatusCode::PARTIAL_CONTENT
    } else {
        StatusCode::OK
    };

    Ok(Some(BufferedResponse::new(status, headers, body)))
}

/// Store a response under `key` with its metadata and version vector.
pub async fn store(
    store: &dyn BlobStore,
    key: &str,
    response: &BufferedResponse,
) -> Result<ObjectMeta, StorageError> {
    let directive = response.header(&CDN_CACHE_CONTROL).unwrap_or_default();
    let cache_expiry = max_age_digits(directive)
        .and_then(ChronoDuration::try_seconds)
        .and_then(|ttl| Utc::now().checked_add_signed(ttl));

    let owned = |name: &HeaderName| response.header(name).map(str::to_string);
    let http_metadata = HttpMetadata {
        content_type: owned(&header::CONTENT_TYPE),
        content_language: owned(&header::CONTENT_LANGUAGE),
        content_disposition: owned(&header::CONTENT_DISPOSITION),
        content_encoding: owned(&header::CONTENT_ENCODING),
        cache_control: owned(&header::CACHE_CONTROL),
        cache_expiry,
    };

    let mut custom_metadata = CustomMetadata::new();
    custom_metadata.insert(
        CDN_CACHE_CONTROL.as_str().to_string(),
        if directive.is_empty() {
            DEFAULT_STORED_DIRECTIVE.to_string()
        } else {
            directive.to_string()
        },
    );
    if let Some(version) = response.header(&X_DEBUG_CACHE_VERSION) {
        custom_metadata.insert(X_DEBUG_CACHE_VERSION.as_str().to_string(), version.to_string());
    }

    store
        .put(
            key,
            response.body.clone(),
            PutOptions {
                http_metadata,
                custom_metadata,
            },
        )
        .await
}

/// Seconds formed by every digit of the directive, e.g. `max-age=600` → 600.
fn max_age_digits(directive: &str) -> Option<i64> {
    let digits: String = directive.chars().filter(char::is_ascii_digit).collect();
    digits.parse().ok()
}

/// ETag from a conditional header, trimmed and without surrounding quotes.
fn etag_header(request: &ForwardRequest, name: &HeaderName) -> Option<String> {
    let value = request.header(name)?.trim();
    let value = value.strip_prefix(['"', '\'']).unwrap_or(value);
    let value = value.strip_suffix(['"', '\'']).unwrap_or(value);
    (!value.is_empty()).then(|| value.to_string())
}

fn guarded(range: Option<ObjectRange>, only_if: Preconditions) -> GetOptions {
    GetOptions {
        range,
        only_if: Some(only_if),
    }
}

fn status_only(status: StatusCode, body: &'static str) -> BufferedResponse {
    BufferedResponse::new(status, HeaderMap::new(), Bytes::from_static(body.as_bytes()))
}

fn object_headers(meta: &ObjectMeta, range: Option<(u64, u64)>) -> HeaderMap {
    let mut headers = HeaderMap::new();
    let http = &meta.http_metadata;

    let optional = [
        (header::CACHE_CONTROL, http.cache_control.as_deref()),
        (header::CONTENT_DISPOSITION, http.content_disposition.as_deref()),
        (header::CONTENT_ENCODING, http.content_encoding.as_deref()),
        (header::CONTENT_LANGUAGE, http.content_language.as_deref()),
        (header::CONTENT_TYPE, http.content_type.as_deref()),
        (CDN_CACHE_CONTROL, meta.custom_metadata.get(CDN_CACHE_CONTROL.as_str()).map(String::as_str)),
        (X_DEBUG_CACHE_VERSION, meta.custom_metadata.get(X_DEBUG_CACHE_VERSION.as_str()).map(String::as_str)),
    ];
    for (name, value) in optional {
        if let Some(value) = value.filter(|v| !v.is_empty()) {
            set_header(&mut headers, name, value);
        }
    }

    let length = match range {
        Some((start, end)) => end - start + 1,
        None => meta.size,
    };
    set_header(&mut headers, header::CONTENT_LENGTH, &length.to_string());
    if let Some(span) = range {
        set_header(&mut headers, header::CONTENT_RANGE, &content_range(span, meta.size));
    }

    set_header(&mut headers, header::ETAG, &meta.http_etag());
    if let Some(expiry) = http.cache_expiry {
        set_header(&mut headers, header::EXPIRES, &format_http_date(expiry));
    }
    let age = (Utc::now() - meta.uploaded).num_seconds().max(0);
    set_header(&mut headers, header::AGE, &age.to_string());
    set_header(&mut headers, header::LAST_MODIFIED, &format_http_date(meta.uploaded));

    headers
}
