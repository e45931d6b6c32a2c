//! Workspace root package.
//!
//! Exists to host workspace-wide dev tooling (git hooks via cargo-husky).
//! All functionality lives in the member crates under `crates/`.
