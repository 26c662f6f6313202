use tracing::debug;

use crate::env::{Environment, PATH};

#[cfg(windows)]
pub const SEPARATOR: char = ';';
#[cfg(not(windows))]
pub const SEPARATOR: char = ':';

/// A PATH segment containing all of these belongs to a MinGW-w64 install,
/// whose binaries shadow the MSVC ones.
pub const CONFLICTING: [&str; 2] = ["mingw64", "bin"];

fn conflicts(segment: &str) -> bool {
    CONFLICTING.iter().all(|it| segment.contains(it))
}

/// Drops every conflicting segment from a PATH value.
pub fn sanitize(path: &str) -> String {
    path.split(SEPARATOR)
        .filter(|it| !conflicts(it))
        .collect::<Vec<_>>()
        .join(SEPARATOR.to_string().as_str())
}

/// Applies [`sanitize`] to the PATH of `env`, if any.
pub fn sanitize_env(env: &mut Environment) {
    let Some(path) = env.get(PATH) else {
        return;
    };
    let clean = sanitize(path);
    if clean != path {
        debug!(before = path, after = %clean, "removed conflicting PATH entries");
    }
    env.set(PATH, clean);
}
