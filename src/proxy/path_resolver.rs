// Target URL resolution for forwarded requests

/// Build the URL a request is forwarded to.
///
/// `remainder` is the raw sub-path after `/api/{service}`, with or without a
/// leading slash, and may or may not repeat the service name as its first
/// segment. The result always contains the service name exactly once after
/// `base`. Only a leading repetition is removed; `orders/pharmacy/9` is kept
/// as is.
///
/// Callers must pass the unresolved remainder, never a URL produced by this
/// function.
pub fn resolve_target_url(service: &str, base: &str, remainder: &str) -> String {
    let base = base.strip_suffix('/').unwrap_or(base);
    let remainder = remainder.strip_prefix('/').unwrap_or(remainder);

    if remainder.is_empty() || remainder == service {
        return format!("{}/{}", base, service);
    }

    let rest = remainder
        .strip_prefix(service)
        .and_then(|r| r.strip_prefix('/'))
        .unwrap_or(remainder);

    format!("{}/{}/{}", base, service, rest)
}
