use crate::build_url::BuildUrlOptions;
use crate::error::{
    fallback_message, read_body_with_limit, ApiError, Error, MAX_ERROR_BODY_BYTES,
};
use reqwest::blocking::Response;
use reqwest::StatusCode;
use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};
use url::Url;

pub(crate) fn build_url(
    base_url: &Url,
    segments: &[&str],
    options: BuildUrlOptions,
) -> Result<Url, Error> {
    let mut url = base_url.clone();
    if options.clear_query {
        url.set_query(None);
    }
    if options.clear_fragment {
        url.set_fragment(None);
    }
    {
        let mut path_segments = url
            .path_segments_mut()
            .map_err(|_| Error::InvalidBaseUrl(base_url.to_string()))?;
        if options.pop_if_empty {
            path_segments.pop_if_empty();
        }
        for segment in segments {
            path_segments.push(segment);
        }
    }
    Ok(url)
}

pub(crate) fn parse_base_url(base_url: &str) -> Result<Url, Error> {
    let url = Url::parse(base_url)?;
    if url.cannot_be_a_base() || !matches!(url.scheme(), "http" | "https") {
        return Err(Error::InvalidBaseUrl(base_url.to_string()));
    }
    Ok(url)
}

/// Reads a bounded error body and hands it to the backend-specific payload parser.
pub(crate) fn read_error<F>(mut resp: Response, parse_payload: F) -> Error
where
    F: FnOnce(StatusCode, &[u8]) -> Option<ApiError>,
{
    let status = resp.status();
    let body = read_body_with_limit(&mut resp, MAX_ERROR_BODY_BYTES);
    let payload = parse_payload(status, &body).unwrap_or_else(|| {
        ApiError::new(status, fallback_message(status, &body))
    });
    classify_status(status, payload)
}

pub(crate) fn classify_status(status: StatusCode, mut payload: ApiError) -> Error {
    if payload.status == 0 {
        payload.status = status.as_u16();
    }
    if payload.message.trim().is_empty() {
        payload.message = fallback_message(status, &[]);
    }
    match status {
        StatusCode::UNAUTHORIZED => Error::Authentication(payload),
        StatusCode::FORBIDDEN => Error::Authorization(payload),
        _ => Error::Authority(payload),
    }
}

/// Key ids with a submission currently on the wire.
#[derive(Default)]
pub(crate) struct InFlight {
    keys: Mutex<HashSet<String>>,
}

impl InFlight {
    fn lock(&self) -> MutexGuard<'_, HashSet<String>> {
        self.keys.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Claims `key_id` for the lifetime of the returned guard.
    pub(crate) fn claim(&self, key_id: &str) -> Result<InFlightGuard<'_>, Error> {
        if !self.lock().insert(key_id.to_string()) {
            return Err(Error::Validation(format!(
                "a request for key id {key_id} is already being submitted"
            )));
        }
        Ok(InFlightGuard {
            owner: self,
            key_id: key_id.to_string(),
        })
    }
}

pub(crate) struct InFlightGuard<'a> {
    owner: &'a InFlight,
    key_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.owner.lock().remove(&self.key_id);
    }
}
