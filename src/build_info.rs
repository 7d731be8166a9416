mod raw {
    // The full list of constants generated by `built` is documented at https://docs.rs/built/latest/built/index.html
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

/// gcbridge crate version such as 0.4.0
pub const PKG_VERSION: &str = raw::PKG_VERSION;

/// Comma separated features enabled for this build
pub const FEATURES: &str = raw::FEATURES_STR;

lazy_static! {
    /// Git version such as a96e8f991c91a81df51e7975849441f52fdbcdcc, or a96e8f991c91a81df51e7975849441f52fdbcdcc-dirty,
    /// or unknown-git-version if gcbridge is not built from a git repo.
    pub static ref GIT_VERSION: &'static str = &GIT_VERSION_STRING;

    // Owned string
    static ref GIT_VERSION_STRING: String = match raw::GIT_COMMIT_HASH {
        Some(hash) => format!("{}{}", hash, if raw::GIT_DIRTY == Some(true) { "-dirty" } else { "" }),
        None => "unknown-git-version".to_string(),
    };
}
