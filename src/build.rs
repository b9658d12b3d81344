//! Build-time version information, used by the admin surface's `/version` endpoint and by
//! `--version`.

/// Build configuration information generated by `build.rs` via the `built` crate.
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// Formats a short build information string (`<version> (<commit>)`).
pub fn short() -> String {
    match built_info::GIT_COMMIT_HASH_SHORT {
        Some(commit) => format!("{} ({})", built_info::PKG_VERSION, commit),
        None => built_info::PKG_VERSION.to_owned(),
    }
}

/// A structured snapshot of build information, suitable for serializing as JSON.
#[derive(Debug, Clone, serde::Serialize)]
pub struct BuildInfo {
    /// The crate's semantic version.
    pub version: &'static str,
    /// The short git commit hash this binary was built from, if known.
    pub commit: Option<&'static str>,
    /// The Rust compiler version used to build this binary.
    pub rustc_version: &'static str,
    /// The UTC build timestamp.
    pub built_time_utc: &'static str,
}

/// Collects build information for the `/version` admin endpoint.
pub fn info() -> BuildInfo {
    BuildInfo {
        version: built_info::PKG_VERSION,
        commit: built_info::GIT_COMMIT_HASH_SHORT,
        rustc_version: built_info::RUSTC_VERSION,
        built_time_utc: built_info::BUILT_TIME_UTC,
    }
}
