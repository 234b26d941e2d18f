//! Cookie sync between two pages, using `chromiumoxide`'s cookie APIs
//! (`Page::get_cookies`/`Page::set_cookies`) the way other examples in the
//! pack consume the same driver crate.

use chromiumoxide::page::Page;
use chromiumoxide_cdp::cdp::browser_protocol::network::{CookieParam, GetCookiesParams, SetCookiesParams};

use crate::error::{BrokerError, Result};
use crate::guard::{host_of, DomainGuard};

async fn check_target_domain(target: &Page, guard: &DomainGuard, operation: &str) -> Result<()> {
    let url = target
        .url()
        .await
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
        .unwrap_or_default();
    if let Some(domain) = host_of(&url) {
        guard.check(&domain, operation).await?;
    }
    Ok(())
}

/// Copy cookies from `source` to `target`, optionally restricted to `domain`.
/// Checks `guard` against the target page's own domain before writing —
/// the blocklist gate runs before any cookie mutation.
pub async fn copy(source: &Page, target: &Page, domain: Option<&str>, guard: &DomainGuard) -> Result<usize> {
    check_target_domain(target, guard, "cookie_copy").await?;

    let cookies = source
        .execute(GetCookiesParams::default())
        .await
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
        .result
        .cookies;

    let filtered: Vec<CookieParam> = cookies
        .into_iter()
        .filter(|c| domain.is_none_or(|d| c.domain.trim_start_matches('.') == d))
        .map(cookie_to_param)
        .collect();

    let count = filtered.len();
    if count > 0 {
        target
            .execute(SetCookiesParams::new(filtered))
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))?;
    }
    Ok(count)
}

/// Write only the `source` cookies whose `(name, domain, path)` isn't
/// already present in `target`; existing `target` cookies are never
/// overwritten. Checks `guard` against the target page's own domain first.
pub async fn merge(source: &Page, target: &Page, guard: &DomainGuard) -> Result<usize> {
    check_target_domain(target, guard, "cookie_merge").await?;

    let source_cookies = source
        .execute(GetCookiesParams::default())
        .await
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
        .result
        .cookies;
    let target_cookies = target
        .execute(GetCookiesParams::default())
        .await
        .map_err(|e| BrokerError::ProtocolError(e.to_string()))?
        .result
        .cookies;

    let existing: std::collections::HashSet<(String, String, String)> = target_cookies
        .iter()
        .map(|c| (c.name.clone(), c.domain.clone(), c.path.clone()))
        .collect();

    let new: Vec<CookieParam> = source_cookies
        .into_iter()
        .filter(|c| !existing.contains(&(c.name.clone(), c.domain.clone(), c.path.clone())))
        .map(cookie_to_param)
        .collect();

    let count = new.len();
    if count > 0 {
        target
            .execute(SetCookiesParams::new(new))
            .await
            .map_err(|e| BrokerError::ProtocolError(e.to_string()))?;
    }
    Ok(count)
}

fn cookie_to_param(cookie: chromiumoxide_cdp::cdp::browser_protocol::network::Cookie) -> CookieParam {
    CookieParam::builder()
        .name(cookie.name)
        .value(cookie.value)
        .domain(cookie.domain)
        .path(cookie.path)
        .secure(cookie.secure)
        .http_only(cookie.http_only)
        .build()
        .expect("name and value are always set from a retrieved cookie")
}
