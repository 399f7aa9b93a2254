//! Workspace root package for the Quill SDK.
//!
//! This crate carries no functionality; it exists so the workspace root can
//! hold the `cargo-husky` git-hook dev-dependency. The real code lives in the
//! member crates under `crates/*`.
