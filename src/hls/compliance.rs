use std::collections::HashSet;

use super::parse::{ParsedMediaPlaylist, ParsedSegment};

/// Runs the documented compliance checks against a parsed media playlist,
/// returning human-readable findings. Never fails the analysis on its own;
/// findings accumulate into `validation_issues`.
pub fn validate_media_playlist(playlist: &ParsedMediaPlaylist, is_vod: bool) -> Vec<String> {
    let mut issues = Vec::new();

    if !playlist.has_version {
        issues.push("missing #EXT-X-VERSION tag".to_string());
    }

    if let Some(target) = playlist.target_duration {
        let max_segment = playlist
            .segments
            .iter()
            .map(|s| s.duration)
            .fold(0.0_f64, f64::max);
        if max_segment > target + 0.01 {
            issues.push(format!(
                "segment duration {max_segment:.3}s exceeds target duration {target:.3}s"
            ));
        }
    } else {
        issues.push("missing #EXT-X-TARGETDURATION tag".to_string());
    }

    if !is_monotone_sequence(&playlist.segments) {
        issues.push("segment sequence numbers are not monotonically increasing".to_string());
    }

    if !has_unique_uris(&playlist.segments) {
        issues.push("duplicate segment URIs present in playlist".to_string());
    }

    if is_vod && !playlist.has_endlist {
        issues.push("VOD playlist is missing #EXT-X-ENDLIST".to_string());
    }

    issues
}

fn is_monotone_sequence(segments: &[ParsedSegment]) -> bool {
    segments.windows(2).all(|pair| pair[1].sequence > pair[0].sequence)
}

fn has_unique_uris(segments: &[ParsedSegment]) -> bool {
    let mut seen = HashSet::new();
    segments.iter().all(|s| seen.insert(s.uri.as_str()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn segment(uri: &str, sequence: u64, duration: f64) -> ParsedSegment {
        ParsedSegment { uri: uri.to_string(), sequence, duration }
    }

    #[test]
    fn flags_missing_endlist_for_vod() {
        let playlist = ParsedMediaPlaylist {
            segments: vec![segment("a.ts", 0, 5.0)],
            has_version: true,
            target_duration: Some(10.0),
            has_endlist: false,
        };
        let issues = validate_media_playlist(&playlist, true);
        assert!(issues.iter().any(|i| i.contains("ENDLIST")));
    }

    #[test]
    fn flags_duplicate_uris() {
        let playlist = ParsedMediaPlaylist {
            segments: vec![segment("a.ts", 0, 5.0), segment("a.ts", 1, 5.0)],
            has_version: true,
            target_duration: Some(10.0),
            has_endlist: true,
        };
        let issues = validate_media_playlist(&playlist, true);
        assert!(issues.iter().any(|i| i.contains("duplicate")));
    }

    #[test]
    fn flags_non_monotone_sequence() {
        let playlist = ParsedMediaPlaylist {
            segments: vec![segment("a.ts", 5, 5.0), segment("b.ts", 3, 5.0)],
            has_version: true,
            target_duration: Some(10.0),
            has_endlist: true,
        };
        let issues = validate_media_playlist(&playlist, true);
        assert!(issues.iter().any(|i| i.contains("monoton")));
    }

    #[test]
    fn clean_vod_playlist_has_no_issues() {
        let playlist = ParsedMediaPlaylist {
            segments: vec![segment("a.ts", 0, 9.5), segment("b.ts", 1, 9.8)],
            has_version: true,
            target_duration: Some(10.0),
            has_endlist: true,
        };
        assert!(validate_media_playlist(&playlist, true).is_empty());
    }
}
