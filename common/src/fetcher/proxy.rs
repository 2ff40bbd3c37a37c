//! Proxy resolution

use url::Url;

/// Dedicated proxy for plain HTTP requests. Takes precedence over the
/// standard environment variables when set and non-empty.
pub const ENV_HTTP_PROXY: &str = "CSAF_DL_HTTP_PROXY";
/// Dedicated proxy for HTTPS requests.
pub const ENV_HTTPS_PROXY: &str = "CSAF_DL_HTTPS_PROXY";

/// Resolve the proxy to use for a request.
///
/// The dedicated `CSAF_DL_*` variables win if set and non-empty. An empty
/// value counts as unset. Otherwise, the standard `http_proxy` /
/// `https_proxy` / `no_proxy` variables apply, case-insensitive.
pub fn proxy_from_environment(url: &Url) -> Option<Url> {
    let dedicated = match url.scheme() {
        "http" => non_empty_var(ENV_HTTP_PROXY),
        "https" => non_empty_var(ENV_HTTPS_PROXY),
        _ => None,
    };

    if let Some(proxy) = dedicated {
        return parse_proxy(&proxy);
    }

    standard_proxy(url)
}

fn non_empty_var(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|value| !value.is_empty())
}

fn standard_proxy(url: &Url) -> Option<Url> {
    if no_proxy_matches(url) {
        return None;
    }

    let name = match url.scheme() {
        "http" => "http_proxy",
        "https" => "https_proxy",
        _ => return None,
    };

    let value = non_empty_var(name).or_else(|| non_empty_var(&name.to_uppercase()))?;
    parse_proxy(&value)
}

fn parse_proxy(value: &str) -> Option<Url> {
    if value.contains("://") {
        Url::parse(value).ok()
    } else {
        Url::parse(&format!("http://{value}")).ok()
    }
}

fn no_proxy_matches(url: &Url) -> bool {
    let Some(no_proxy) = non_empty_var("no_proxy").or_else(|| non_empty_var("NO_PROXY")) else {
        return false;
    };
    let Some(host) = url.host_str() else {
        return false;
    };

    no_proxy
        .split(',')
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .any(|entry| {
            let entry = entry.trim_start_matches('.');
            entry == "*" || host == entry || host.ends_with(&format!(".{entry}"))
        })
}

#[cfg(test)]
mod test {
    use super::*;
    use std::sync::Mutex;

    // the environment is process-wide state
    static ENV_LOCK: Mutex<()> = Mutex::new(());

    fn with_env(vars: &[(&str, Option<&str>)], f: impl FnOnce()) {
        let _guard = ENV_LOCK.lock().unwrap_or_else(|e| e.into_inner());

        let saved = vars
            .iter()
            .map(|(name, _)| (*name, std::env::var(name).ok()))
            .collect::<Vec<_>>();

        for (name, value) in vars {
            match value {
                Some(value) => unsafe { std::env::set_var(name, value) },
                None => unsafe { std::env::remove_var(name) },
            }
        }

        f();

        for (name, value) in saved {
            match value {
                Some(value) => unsafe { std::env::set_var(name, value) },
                None => unsafe { std::env::remove_var(name) },
            }
        }
    }

    fn proxy_host(target: &str) -> Option<String> {
        proxy_from_environment(&Url::parse(target).unwrap())
            .and_then(|url| url.host_str().map(ToString::to_string))
    }

    #[test]
    fn dedicated_variables_take_precedence() {
        with_env(
            &[
                ("http_proxy", Some("http://example.com:8080")),
                ("https_proxy", Some("https://example.com:8443")),
                (ENV_HTTP_PROXY, Some("http://custom.com:8080")),
                (ENV_HTTPS_PROXY, Some("https://custom.com:8443")),
                ("no_proxy", None),
            ],
            || {
                assert_eq!(proxy_host("http://target.com"), Some("custom.com".into()));
                assert_eq!(proxy_host("https://target.com"), Some("custom.com".into()));
            },
        );
    }

    #[test]
    fn empty_dedicated_variables_count_as_unset() {
        with_env(
            &[
                ("http_proxy", Some("http://example.com:8080")),
                ("https_proxy", Some("https://example.com:8443")),
                (ENV_HTTP_PROXY, Some("")),
                (ENV_HTTPS_PROXY, Some("")),
                ("no_proxy", None),
            ],
            || {
                assert_eq!(proxy_host("http://target.com"), Some("example.com".into()));
                assert_eq!(proxy_host("https://target.com"), Some("example.com".into()));
            },
        );
    }

    #[test]
    fn falls_back_to_standard_variables() {
        with_env(
            &[
                ("http_proxy", Some("http://example.com:8080")),
                ("https_proxy", Some("https://example.com:8443")),
                (ENV_HTTP_PROXY, None),
                (ENV_HTTPS_PROXY, None),
                ("no_proxy", None),
            ],
            || {
                assert_eq!(proxy_host("http://target.com"), Some("example.com".into()));
                assert_eq!(proxy_host("https://target.com"), Some("example.com".into()));
            },
        );
    }

    #[test]
    fn no_proxy_is_honored() {
        with_env(
            &[
                ("http_proxy", Some("http://example.com:8080")),
                (ENV_HTTP_PROXY, None),
                ("no_proxy", Some("target.com")),
            ],
            || {
                assert_eq!(proxy_host("http://target.com"), None);
                assert_eq!(proxy_host("http://sub.target.com"), None);
                assert_eq!(proxy_host("http://other.com"), Some("example.com".into()));
            },
        );
    }
}
