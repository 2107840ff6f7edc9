//! URL path combination.
//!
//! Joins path segments the way the upstream forwarding path and the
//! transcript URL are built: every segment is trimmed of leading and
//! trailing slashes, empty segments vanish, the rest are joined with a
//! single `/`. Anything that is not an absolute `http(s)://` URL gets one
//! leading `/`.

/// Combine path segments left to right.
///
/// ```
/// use capture_proxy::capture::combine;
///
/// assert_eq!(combine(["/root/", "/something"]), "/root/something");
/// assert_eq!(combine(["http://my.host.com/root/", "/x"]), "http://my.host.com/root/x");
/// assert_eq!(combine(["/", ""]), "/");
/// ```
pub fn combine<I, S>(segments: I) -> String
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut joined = String::new();
    for segment in segments {
        let trimmed = segment.as_ref().trim_matches('/');
        if trimmed.is_empty() {
            continue;
        }
        if !joined.is_empty() {
            joined.push('/');
        }
        joined.push_str(trimmed);
    }

    if is_absolute_url(&joined) {
        joined
    } else {
        joined.insert(0, '/');
        joined
    }
}

/// True if `s` starts with `http://` or `https://`, ignoring case.
pub fn is_absolute_url(s: &str) -> bool {
    let starts_with = |prefix: &str| {
        s.get(..prefix.len())
            .map(|head| head.eq_ignore_ascii_case(prefix))
            .unwrap_or(false)
    };
    starts_with("http://") || starts_with("https://")
}
