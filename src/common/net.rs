use url::Url;

pub fn parse_target_url(input: &str) -> Option<Url> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return None;
    }
    if trimmed.contains("://") {
        Url::parse(trimmed).ok()
    } else {
        Url::parse(&format!("https://{trimmed}")).ok()
    }
}

/// Host portion of a probe target. Accepts bare hosts as well as URLs.
pub fn target_host(target: &str) -> Option<String> {
    let url = parse_target_url(target)?;
    let host = url.host_str()?;
    Some(host.trim_start_matches('[').trim_end_matches(']').to_string())
}

/// Host and port of a probe target, falling back to the scheme's default port.
pub fn target_host_port(target: &str) -> Option<(String, u16)> {
    let url = parse_target_url(target)?;
    let port = url.port_or_known_default().unwrap_or(443);
    let host = url.host_str()?;
    Some((
        host.trim_start_matches('[').trim_end_matches(']').to_string(),
        port,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_target_url_defaults_to_https() {
        let url = parse_target_url("example.com").expect("url");
        assert_eq!(url.scheme(), "https");
        assert_eq!(url.host_str(), Some("example.com"));
    }

    #[test]
    fn parse_target_url_rejects_blank() {
        assert!(parse_target_url("   ").is_none());
    }

    #[test]
    fn target_host_strips_scheme_and_path() {
        assert_eq!(
            target_host("https://www.google.com/generate_204").as_deref(),
            Some("www.google.com")
        );
        assert_eq!(target_host("1.1.1.1").as_deref(), Some("1.1.1.1"));
    }

    #[test]
    fn target_host_port_uses_scheme_default() {
        assert_eq!(
            target_host_port("http://example.com"),
            Some(("example.com".to_string(), 80))
        );
        assert_eq!(
            target_host_port("example.com:8443"),
            Some(("example.com".to_string(), 8443))
        );
    }
}
