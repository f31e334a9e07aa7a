//! IP address validation and batch normalization.

use std::collections::HashSet;
use std::net::IpAddr;

use crate::DomainError;

/// Validate a single IP for a synchronous lookup.
///
/// Returns the canonical spelling (lowercase, compressed IPv6), which is
/// also the cache key, so `2001:DB8::1` and `2001:db8::1` share one entry.
pub fn normalize_ip(raw: &str) -> Result<String, DomainError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(DomainError::validation("IP address is required."));
    }
    canonical_ip(trimmed).ok_or_else(|| DomainError::validation("Invalid IP address format."))
}

/// `None` unless `ip` parses as an IPv4 or IPv6 address.
fn canonical_ip(ip: &str) -> Option<String> {
    ip.parse::<IpAddr>().ok().map(|parsed| parsed.to_string())
}

/// Trim, drop blanks, and dedupe case-insensitively. First occurrence wins
/// and input order is preserved.
pub fn normalize_ips<I, S>(ips: I) -> Vec<String>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut seen = HashSet::new();
    ips.into_iter()
        .filter_map(|ip| {
            let trimmed = ip.as_ref().trim();
            if trimmed.is_empty() {
                return None;
            }
            seen.insert(trimmed.to_ascii_lowercase())
                .then(|| trimmed.to_string())
        })
        .collect()
}

/// Normalize a submitted batch and reject it if any entry is not an IP.
///
/// Nothing is created for a rejected batch, so validation covers every
/// entry before returning. Accepted IPs come back in canonical form and
/// deduped again on it, matching the keys single lookups cache under.
pub fn validate_batch_ips(ips: &[String]) -> Result<Vec<String>, DomainError> {
    if ips.is_empty() {
        return Err(DomainError::validation("At least one IP is required."));
    }

    let normalized = normalize_ips(ips);
    if normalized.is_empty() {
        return Err(DomainError::validation("At least one valid IP is required."));
    }

    let mut canonical = Vec::with_capacity(normalized.len());
    for ip in &normalized {
        let Some(parsed) = canonical_ip(ip) else {
            return Err(DomainError::validation(format!("Invalid IP format: '{ip}'.")));
        };
        canonical.push(parsed);
    }

    Ok(normalize_ips(canonical))
}
