//! Input Guard: every untrusted string crossing into a path, URL, or
//! filename role flows through one of these checks before use.

mod filename;
mod path;
mod url;

pub use filename::sanitize_filename;
pub use path::validate_path;
pub use url::{UrlGuardConfig, validate_url};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GuardRejection {
    PathTraversal,
    PathOutsideAllowlist,
    PathContainsNul,
    UrlSchemeNotAllowed,
    UrlHostBlocked,
    UrlUnparsable,
}

impl std::fmt::Display for GuardRejection {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let msg = match self {
            GuardRejection::PathTraversal => "path contains a traversal segment",
            GuardRejection::PathOutsideAllowlist => "path resolves outside the allowed root",
            GuardRejection::PathContainsNul => "path contains a NUL byte",
            GuardRejection::UrlSchemeNotAllowed => "URL scheme must be http or https",
            GuardRejection::UrlHostBlocked => "URL host resolves to a blocked network range",
            GuardRejection::UrlUnparsable => "URL could not be parsed",
        };
        f.write_str(msg)
    }
}

pub type GuardResult<T> = Result<T, GuardRejection>;
