use crate::domain::HlsManifestType;

/// `#EXT-X-STREAM-INF` marks a master manifest; `#EXTINF` marks a media
/// playlist. A manifest exhibiting neither is treated as malformed by the
/// caller.
pub fn classify(body: &str) -> Option<HlsManifestType> {
    if body.contains("#EXT-X-STREAM-INF") {
        Some(HlsManifestType::Master)
    } else if body.contains("#EXTINF") {
        Some(HlsManifestType::Media)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedVariant {
    pub uri: String,
    pub bandwidth: Option<u64>,
    pub resolution: Option<(u32, u32)>,
    pub codecs: Option<String>,
    pub frame_rate: Option<f64>,
}

/// Parses `#EXT-X-STREAM-INF:<attrs>` / URI pairs out of a master manifest.
pub fn parse_master_variants(body: &str) -> Vec<ParsedVariant> {
    let mut variants = Vec::new();
    let mut lines = body.lines().peekable();
    while let Some(line) = lines.next() {
        let line = line.trim();
        let Some(attrs) = line.strip_prefix("#EXT-X-STREAM-INF:") else {
            continue;
        };
        let mut uri = None;
        while let Some(next) = lines.peek() {
            let next = next.trim();
            if next.is_empty() {
                lines.next();
                continue;
            }
            if next.starts_with('#') {
                break;
            }
            uri = Some(next.to_string());
            lines.next();
            break;
        }
        let Some(uri) = uri else { continue };
        variants.push(ParsedVariant {
            uri,
            bandwidth: attr_u64(attrs, "BANDWIDTH"),
            resolution: attr_resolution(attrs),
            codecs: attr_quoted(attrs, "CODECS"),
            frame_rate: attr_f64(attrs, "FRAME-RATE"),
        });
    }
    variants
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ParsedSegment {
    pub uri: String,
    pub sequence: u64,
    pub duration: f64,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedMediaPlaylist {
    pub segments: Vec<ParsedSegment>,
    pub has_version: bool,
    pub target_duration: Option<f64>,
    pub has_endlist: bool,
}

/// Parses `#EXTINF:<duration>,<title>` / URI pairs, tracking the media
/// sequence counter, target duration, version tag, and endlist marker for
/// the compliance checks.
pub fn parse_media_playlist(body: &str) -> ParsedMediaPlaylist {
    let mut playlist = ParsedMediaPlaylist::default();
    let mut sequence = 0u64;
    let mut pending_duration: Option<f64> = None;
    let mut lines = body.lines().peekable();

    while let Some(raw_line) = lines.next() {
        let line = raw_line.trim();
        if line.is_empty() {
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXT-X-VERSION:") {
            playlist.has_version = !rest.trim().is_empty();
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXT-X-TARGETDURATION:") {
            playlist.target_duration = rest.trim().parse::<f64>().ok();
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXT-X-MEDIA-SEQUENCE:") {
            sequence = rest.trim().parse::<u64>().unwrap_or(0);
            continue;
        }
        if line == "#EXT-X-ENDLIST" {
            playlist.has_endlist = true;
            continue;
        }
        if let Some(rest) = line.strip_prefix("#EXTINF:") {
            let duration_str = rest.split(',').next().unwrap_or("0").trim();
            pending_duration = duration_str.parse::<f64>().ok();
            continue;
        }
        if line.starts_with('#') {
            continue;
        }
        // Bare line: a segment URI.
        let duration = pending_duration.take().unwrap_or(0.0);
        playlist.segments.push(ParsedSegment {
            uri: line.to_string(),
            sequence,
            duration,
        });
        sequence += 1;
    }

    playlist
}

fn attr_u64(attrs: &str, key: &str) -> Option<u64> {
    attr_raw(attrs, key)?.parse::<u64>().ok()
}

fn attr_f64(attrs: &str, key: &str) -> Option<f64> {
    attr_raw(attrs, key)?.parse::<f64>().ok()
}

fn attr_quoted(attrs: &str, key: &str) -> Option<String> {
    let raw = attr_raw(attrs, key)?;
    Some(raw.trim_matches('"').to_string())
}

fn attr_resolution(attrs: &str) -> Option<(u32, u32)> {
    let raw = attr_raw(attrs, "RESOLUTION")?;
    let (w, h) = raw.split_once('x')?;
    Some((w.parse().ok()?, h.parse().ok()?))
}

/// Splits `KEY=value,KEY2="quoted, value",...` respecting quoted commas.
fn attr_raw<'a>(attrs: &'a str, key: &str) -> Option<&'a str> {
    let mut in_quotes = false;
    let mut start = 0usize;
    let mut parts = Vec::new();
    for (i, c) in attrs.char_indices() {
        match c {
            '"' => in_quotes = !in_quotes,
            ',' if !in_quotes => {
                parts.push(&attrs[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&attrs[start..]);

    for part in parts {
        let part = part.trim();
        if let Some((k, v)) = part.split_once('=')
            && k.trim() == key
        {
            return Some(v.trim());
        }
    }
    None
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn classifies_master_manifest() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1000\nvariant.m3u8\n";
        assert_eq!(classify(body), Some(HlsManifestType::Master));
    }

    #[test]
    fn classifies_media_manifest() {
        let body = "#EXTM3U\n#EXTINF:10.0,\nseg0.ts\n";
        assert_eq!(classify(body), Some(HlsManifestType::Media));
    }

    #[test]
    fn parses_master_variant_attributes() {
        let body = "#EXTM3U\n#EXT-X-STREAM-INF:BANDWIDTH=1280000,RESOLUTION=1920x1080,CODECS=\"avc1.640028,mp4a.40.2\",FRAME-RATE=29.97\nhigh.m3u8\n";
        let variants = parse_master_variants(body);
        assert_eq!(variants.len(), 1);
        assert_eq!(variants[0].bandwidth, Some(1280000));
        assert_eq!(variants[0].resolution, Some((1920, 1080)));
        assert_eq!(variants[0].codecs.as_deref(), Some("avc1.640028,mp4a.40.2"));
        assert_eq!(variants[0].frame_rate, Some(29.97));
    }

    #[test]
    fn parses_media_playlist_segments_with_sequence() {
        let body = "#EXTM3U\n#EXT-X-VERSION:3\n#EXT-X-TARGETDURATION:10\n#EXT-X-MEDIA-SEQUENCE:5\n#EXTINF:9.5,\nseg5.ts\n#EXTINF:9.8,\nseg6.ts\n#EXT-X-ENDLIST\n";
        let playlist = parse_media_playlist(body);
        assert!(playlist.has_version);
        assert!(playlist.has_endlist);
        assert_eq!(playlist.target_duration, Some(10.0));
        assert_eq!(playlist.segments.len(), 2);
        assert_eq!(playlist.segments[0].sequence, 5);
        assert_eq!(playlist.segments[1].sequence, 6);
    }
}
