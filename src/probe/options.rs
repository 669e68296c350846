use serde::{Deserialize, Serialize};

/// Configuration accepted by a single [`crate::probe::ProbeDriver::probe`]
/// invocation. Mirrors the recognized probe CLI surface one-to-one so the
/// argument builder never has to guess intent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProbeOptions {
    #[serde(default)]
    pub show_format: bool,
    #[serde(default)]
    pub show_streams: bool,
    #[serde(default)]
    pub show_chapters: bool,
    #[serde(default)]
    pub show_programs: bool,
    #[serde(default)]
    pub show_frames: bool,
    #[serde(default)]
    pub show_packets: bool,
    #[serde(default)]
    pub count_frames: bool,
    #[serde(default)]
    pub count_packets: bool,
    #[serde(default)]
    pub show_data_hash: bool,
    #[serde(default)]
    pub show_private_data: bool,
    #[serde(default)]
    pub show_error: bool,
    pub probe_size: Option<u64>,
    pub analyze_duration: Option<u64>,
    #[serde(default)]
    pub extra_args: Vec<String>,
}

impl ProbeOptions {
    /// The default, minimal survey used by the happy-path file/URL probe
    /// endpoints: format and stream sections only.
    pub fn default_survey() -> Self {
        Self {
            show_format: true,
            show_streams: true,
            ..Default::default()
        }
    }

    /// Rejects any `extra_args` token that could be interpreted as a shell
    /// metacharacter if ever re-quoted; the driver only ever invokes an
    /// argument vector directly, but this keeps the option surface safe even
    /// if a future caller forwards these args elsewhere.
    pub fn validate(&self) -> Result<(), String> {
        for arg in &self.extra_args {
            match arg.chars().next() {
                Some(c) if "|;&$`<>(){}\n".contains(c) => {
                    return Err(format!("extra_args token starts with disallowed character: {arg}"));
                }
                _ => {}
            }
        }
        Ok(())
    }
}
