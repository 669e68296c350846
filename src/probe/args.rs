use super::options::ProbeOptions;

/// Builds the probe argument vector. Never a shell string: every token is a
/// distinct `OsString`-bound argument, so there is no quoting layer for an
/// attacker to escape.
pub fn build_probe_args(source_ref: &str, options: &ProbeOptions) -> Vec<String> {
    let mut args = vec!["-v".to_string(), "error".to_string(), "-print_format".to_string(), "json".to_string()];

    let mut entries = Vec::new();
    if options.show_format {
        entries.push("format");
    }
    if options.show_streams {
        entries.push("stream");
    }
    if options.show_chapters {
        entries.push("chapter");
    }
    if options.show_programs {
        entries.push("program");
    }
    if options.show_frames {
        entries.push("frame");
    }
    if options.show_packets {
        entries.push("packet");
    }
    if options.show_error {
        entries.push("error");
    }
    for section in entries {
        args.push("-show_entries".to_string());
        args.push(section.to_string());
    }
    if options.show_frames {
        args.push("-show_frames".to_string());
    }
    if options.show_packets {
        args.push("-show_packets".to_string());
    }
    if options.count_frames {
        args.push("-count_frames".to_string());
    }
    if options.count_packets {
        args.push("-count_packets".to_string());
    }
    if options.show_data_hash {
        args.push("-show_data_hash".to_string());
        args.push("sha256".to_string());
    }
    if options.show_private_data {
        args.push("-show_private_data".to_string());
    } else {
        args.push("-noprivate".to_string());
    }
    if let Some(probe_size) = options.probe_size {
        args.push("-probesize".to_string());
        args.push(probe_size.to_string());
    }
    if let Some(analyze_duration) = options.analyze_duration {
        args.push("-analyzeduration".to_string());
        args.push(analyze_duration.to_string());
    }
    args.extend(options.extra_args.iter().cloned());
    args.push(source_ref.to_string());
    args
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn includes_requested_sections_only() {
        let opts = ProbeOptions {
            show_format: true,
            show_frames: true,
            ..Default::default()
        };
        let args = build_probe_args("input.mp4", &opts);
        assert!(args.iter().any(|a| a == "format"));
        assert!(args.iter().any(|a| a == "frame"));
        assert!(!args.iter().any(|a| a == "stream"));
    }

    #[test]
    fn source_ref_is_final_argument() {
        let args = build_probe_args("input.mp4", &ProbeOptions::default_survey());
        assert_eq!(args.last(), Some(&"input.mp4".to_string()));
    }

    #[test]
    fn probe_size_and_analyze_duration_pass_through() {
        let opts = ProbeOptions {
            probe_size: Some(5_000_000),
            analyze_duration: Some(1_000_000),
            ..Default::default()
        };
        let args = build_probe_args("x", &opts);
        let probesize_idx = args.iter().position(|a| a == "-probesize").unwrap();
        assert_eq!(args[probesize_idx + 1], "5000000");
    }
}
