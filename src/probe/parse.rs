use serde_json::Value;

use crate::domain::ProbeData;
use crate::error::AppError;

/// Parses probe stdout (a single JSON object) into the seven optional
/// sections. A section absent from the object is left unset; that is a
/// normal outcome, not an error. Only a malformed top-level document is
/// `probe_output_malformed`.
pub fn parse_probe_output(stdout: &[u8]) -> Result<ProbeData, AppError> {
    let root: Value = serde_json::from_slice(stdout)
        .map_err(|e| AppError::ProbeOutputMalformed(format!("stdout is not valid JSON: {e}")))?;

    let Value::Object(map) = root else {
        return Err(AppError::ProbeOutputMalformed(
            "expected a JSON object at the top level".to_string(),
        ));
    };

    Ok(ProbeData {
        format: map.get("format").cloned(),
        streams: map.get("streams").cloned(),
        frames: map.get("frames").cloned(),
        packets: map.get("packets").cloned(),
        chapters: map.get("chapters").cloned(),
        programs: map.get("programs").cloned(),
        error: map.get("error").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_present_sections_only() {
        let json = br#"{"format":{"duration":"10.5"},"streams":[{"codec_type":"video"}]}"#;
        let data = parse_probe_output(json).unwrap();
        assert!(data.format.is_some());
        assert!(data.streams.is_some());
        assert!(data.frames.is_none());
    }

    #[test]
    fn rejects_non_object_top_level() {
        let err = parse_probe_output(br#"[1,2,3]"#).unwrap_err();
        assert_eq!(err.kind(), "probe_output_malformed");
    }

    #[test]
    fn rejects_invalid_json() {
        let err = parse_probe_output(b"not json at all").unwrap_err();
        assert_eq!(err.kind(), "probe_output_malformed");
    }

    #[test]
    fn empty_object_yields_empty_probe_data() {
        let data = parse_probe_output(b"{}").unwrap();
        assert!(data.is_empty());
    }
}
