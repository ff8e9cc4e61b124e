//! Shape checks for `POST /api/share`. Nothing here touches the network.

use share_queue::SubmitShare;
use shared::messages::ShareRequest;
use url::Url;

use crate::error::ApiError;

pub fn validate_share(request: ShareRequest, max_limit: u32) -> Result<SubmitShare, ApiError> {
    let cookie = non_blank(request.cookie).ok_or(ApiError::MissingFields)?;
    let link = non_blank(request.link).ok_or(ApiError::MissingFields)?;
    let limit = request
        .limit
        .filter(|v| !v.is_null() && v.as_str().is_none_or(|s| !s.trim().is_empty()))
        .ok_or(ApiError::MissingFields)?;

    let limit = parse_limit(&limit)?;
    if limit > u64::from(max_limit) {
        return Err(ApiError::LimitTooHigh(max_limit));
    }
    validate_link(&link)?;
    validate_cookie(&cookie)?;

    Ok(SubmitShare {
        credential: cookie,
        link,
        limit: limit as u32,
    })
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn parse_limit(value: &serde_json::Value) -> Result<u64, ApiError> {
    let limit = match value {
        serde_json::Value::Number(n) => n.as_u64(),
        serde_json::Value::String(s) => s.trim().parse::<u64>().ok(),
        _ => None,
    };
    limit.filter(|n| *n >= 1).ok_or(ApiError::InvalidLimit)
}

fn validate_link(link: &str) -> Result<(), ApiError> {
    let url = Url::parse(link).map_err(|_| ApiError::InvalidLink)?;
    let scheme_ok = matches!(url.scheme(), "http" | "https");
    let host_ok = url.host_str().is_some_and(|h| !h.is_empty());
    if scheme_ok && host_ok {
        Ok(())
    } else {
        Err(ApiError::InvalidLink)
    }
}

fn validate_cookie(cookie: &str) -> Result<(), ApiError> {
    let mut pairs = 0;
    for part in cookie.split(';').map(str::trim).filter(|p| !p.is_empty()) {
        let (name, _value) = part.split_once('=').ok_or(ApiError::InvalidCookie)?;
        let name = name.trim();
        if name.is_empty() || name.contains(char::is_whitespace) {
            return Err(ApiError::InvalidCookie);
        }
        pairs += 1;
    }
    if pairs == 0 {
        return Err(ApiError::InvalidCookie);
    }
    Ok(())
}
