//! Shared DNS resolver used to turn a probe target into an address.

use std::net::IpAddr;
use std::sync::LazyLock;

use hickory_resolver::{TokioResolver, config::ResolverConfig, name_server::TokioConnectionProvider};

/// Shared default DNS resolver.
///
/// On Unix/Windows this uses the host system configuration (e.g. `/etc/resolv.conf`).
/// If the system configuration cannot be loaded, it falls back to Hickory's default
/// upstream set (Google Public DNS).
pub(crate) static DEFAULT_RESOLVER: LazyLock<TokioResolver> = LazyLock::new(build_system_resolver);

fn build_system_resolver() -> TokioResolver {
    #[cfg(any(unix, target_os = "windows"))]
    {
        match TokioResolver::builder_tokio() {
            Ok(builder) => return builder.build(),
            Err(e) => {
                log::warn!(
                    "Failed to load system DNS configuration, falling back to defaults: {e}"
                );
            }
        }
    }

    TokioResolver::builder_with_config(
        ResolverConfig::default(),
        TokioConnectionProvider::default(),
    )
    .build()
}

/// Resolve `target` to its first address.
///
/// IP literals are returned as-is without a lookup. The error is the
/// resolver's message, ready to be put into a report.
pub(crate) async fn resolve_first(target: &str) -> Result<IpAddr, String> {
    if let Ok(ip) = target.parse::<IpAddr>() {
        return Ok(ip);
    }

    let lookup = DEFAULT_RESOLVER
        .lookup_ip(target)
        .await
        .map_err(|e| e.to_string())?;
    lookup
        .iter()
        .next()
        .ok_or_else(|| format!("no address records for {target}"))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn ip_literal_skips_lookup() {
        let ip = resolve_first("192.0.2.10").await.unwrap();
        assert_eq!(ip, "192.0.2.10".parse::<IpAddr>().unwrap());
    }

    #[tokio::test]
    async fn ipv6_literal_skips_lookup() {
        let ip = resolve_first("2001:db8::1").await.unwrap();
        assert!(ip.is_ipv6());
    }

    #[test]
    fn default_resolver_accessible() {
        // Accessing the lazy static should not panic
        let _resolver = &*DEFAULT_RESOLVER;
    }

    #[tokio::test]
    #[ignore = "requires network access"]
    async fn invalid_tld_does_not_resolve() {
        assert!(resolve_first("nothing-here.invalid").await.is_err());
    }
}
