use crate::doc_id::{DocIdError, DocUrl};
use crate::doc_type::{DocTypeRegistry, DocTypeTag};
use crate::notify::Notifier;
use thiserror::Error;
use url::form_urlencoded;

const DOC_URL_KEY: &str = "docUrl";
const DOC_TYPE_KEY: &str = "docType";

/// The document a location fragment points at.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UrlHashParams {
    pub doc_url: DocUrl,
    pub doc_type: DocTypeTag,
}

/// A well-formed fragment: either no document or one document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashRoute {
    Empty,
    Doc(UrlHashParams),
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum UrlHashError {
    #[error("Invalid document link {value:?}: {source}")]
    InvalidDocUrl { value: String, source: DocIdError },
    #[error("Unknown document type {0:?} in link")]
    UnknownDocType(String),
}

/// Outcome of decoding after errors have been reported to the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HashDecode {
    Empty,
    Doc(UrlHashParams),
    /// Malformed fragment, already alerted. Selection must not change.
    Rejected,
}

fn strip_delimiter(fragment: &str) -> &str {
    fragment.strip_prefix('#').unwrap_or(fragment)
}

/// Parse a location fragment.
///
/// Accepted forms:
/// - `#<id>` (legacy, always type "tldraw"); checked first so old links keep working
/// - `#docUrl=<id>&docType=<tag>`
///
/// A fragment lacking either key is treated as no document. Values are
/// form-decoded, unknown keys ignored.
pub fn try_decode(fragment: &str, registry: &DocTypeRegistry) -> Result<HashRoute, UrlHashError> {
    let body = strip_delimiter(fragment);
    if body.is_empty() {
        return Ok(HashRoute::Empty);
    }

    if let Ok(doc_url) = DocUrl::new(body) {
        return Ok(HashRoute::Doc(UrlHashParams {
            doc_url,
            doc_type: DocTypeTag::legacy(),
        }));
    }

    let mut raw_url: Option<String> = None;
    let mut raw_type: Option<String> = None;
    for (key, value) in form_urlencoded::parse(body.as_bytes()) {
        match key.as_ref() {
            DOC_URL_KEY => raw_url = Some(value.into_owned()),
            DOC_TYPE_KEY => raw_type = Some(value.into_owned()),
            _ => {}
        }
    }

    let (Some(raw_url), Some(raw_type)) = (raw_url, raw_type) else {
        return Ok(HashRoute::Empty);
    };
    if raw_url.is_empty() || raw_type.is_empty() {
        return Ok(HashRoute::Empty);
    }

    let doc_url = DocUrl::new(raw_url.as_str()).map_err(|source| UrlHashError::InvalidDocUrl {
        value: raw_url.clone(),
        source,
    })?;

    if !registry.contains(&raw_type) {
        return Err(UrlHashError::UnknownDocType(raw_type));
    }
    let doc_type =
        DocTypeTag::new(raw_type.as_str()).map_err(|_| UrlHashError::UnknownDocType(raw_type))?;

    Ok(HashRoute::Doc(UrlHashParams { doc_url, doc_type }))
}

/// Decode a fragment, alerting the user about malformed content.
pub fn decode(fragment: &str, registry: &DocTypeRegistry, notifier: &dyn Notifier) -> HashDecode {
    match try_decode(fragment, registry) {
        Ok(HashRoute::Empty) => HashDecode::Empty,
        Ok(HashRoute::Doc(params)) => HashDecode::Doc(params),
        Err(e) => {
            notifier.alert(&e.to_string());
            HashDecode::Rejected
        }
    }
}

/// Fragment for `params`, always in the structured form.
pub fn encode(params: &UrlHashParams) -> String {
    let query = form_urlencoded::Serializer::new(String::new())
        .append_pair(DOC_URL_KEY, params.doc_url.as_str())
        .append_pair(DOC_TYPE_KEY, params.doc_type.as_str())
        .finish();
    format!("#{}", query)
}

/// Two fragments address the same location when they differ at most in the delimiter.
pub fn same_fragment(a: &str, b: &str) -> bool {
    strip_delimiter(a) == strip_delimiter(b)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
