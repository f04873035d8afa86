use url::Url;

/// Upstream URL-rewriting filters wrap the real URL in a `urldata` query
/// parameter; wrappers can nest, so the unwrap depth is bounded.
const MAX_UNWRAP_DEPTH: u8 = 4;

/// Extract a canonical video identifier from an arbitrary URL string.
///
/// Recursively unwraps `urldata=` wrappers (the inner URL arrives
/// percent-encoded), then matches the known URL shapes: `youtu.be/{id}`,
/// `watch?v={id}` and `/embed/{id}` on youtube.com or
/// youtube-nocookie.com, tolerating `www.`/`m.` prefixes and a missing
/// scheme. Returns `None` for anything else.
pub fn extract_video_id(raw: &str) -> Option<String> {
    extract_with_depth(raw.trim(), MAX_UNWRAP_DEPTH)
}

fn extract_with_depth(raw: &str, depth: u8) -> Option<String> {
    let url = parse_lenient(raw)?;

    if depth > 0 {
        // query_pairs percent-decodes, so the inner URL comes out readable.
        if let Some((_, inner)) = url.query_pairs().find(|(key, _)| key == "urldata") {
            return extract_with_depth(inner.trim(), depth - 1);
        }
    }

    let host = url.host_str()?;
    let host = host
        .strip_prefix("www.")
        .or_else(|| host.strip_prefix("m."))
        .unwrap_or(host);

    let id = match host {
        "youtu.be" => url.path_segments()?.next().map(str::to_string),
        "youtube.com" | "youtube-nocookie.com" => {
            let mut segments = url.path_segments()?;
            match segments.next() {
                Some("watch") => url
                    .query_pairs()
                    .find(|(key, _)| key == "v")
                    .map(|(_, v)| v.into_owned()),
                Some("embed") => segments.next().map(str::to_string),
                _ => None,
            }
        }
        _ => None,
    }?;

    is_video_id(&id).then_some(id)
}

/// Submitted URLs often arrive without a scheme ("youtube.com/watch?...").
fn parse_lenient(raw: &str) -> Option<Url> {
    match Url::parse(raw) {
        Ok(url) => Some(url),
        Err(url::ParseError::RelativeUrlWithoutBase) => Url::parse(&format!("https://{raw}")).ok(),
        Err(_) => None,
    }
}

fn is_video_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || b == b'-' || b == b'_')
}

/// The privacy-enhanced embed URL for an extracted identifier.
pub fn no_cookie_embed_url(video_id: &str) -> String {
    format!(
        "https://www.youtube-nocookie.com/embed/{video_id}?autoplay=0&rel=0&modestbranding=1&enablejsapi=1"
    )
}
