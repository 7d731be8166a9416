// build.rs

fn main() {
    // Record the package version, enabled features and the git commit for `build_info`.
    built::write_built_file().expect("Failed to acquire build-time information");
}
