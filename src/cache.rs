//! On-disk environment snapshots, one per toolchain and architecture.
//!
//! Files are written in a dotenv dialect that [`dotenvy`] reads back verbatim:
//! every value is double-quoted with `\`, `"` and `$` escaped.

use std::{
    fs::File,
    io::{BufWriter, Write},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use tracing::debug;

use crate::{env::Environment, flags::Arch};

/// Path of the cache file for `toolchain` and `arch` under `home`.
pub fn cache_path(home: impl AsRef<Path>, toolchain: &str, arch: Arch) -> PathBuf {
    home.as_ref().join(format!("withvs-{toolchain}-{arch}.env"))
}

/// Whether `key` survives a dotenv round trip.
fn is_dotenv_key(key: &str) -> bool {
    let mut chars = key.chars();
    chars
        .next()
        .is_some_and(|c| c.is_ascii_alphabetic() || c == '_')
        && chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '.')
}

fn quote(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('"');
    for c in value.chars() {
        match c {
            '\\' | '"' | '$' => {
                out.push('\\');
                out.push(c);
            }
            '\n' => out.push_str("\\n"),
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Writes every representable variable of `env` to `path`, replacing the file.
pub fn save(path: &Path, env: &Environment) -> Result<()> {
    let file = File::create(path)
        .with_context(|| format!("failed to create environment cache file {path:?}"))?;
    let mut out = BufWriter::new(file);
    for (key, value) in env {
        if !is_dotenv_key(key) {
            debug!(key, "skipping variable that cannot be cached");
            continue;
        }
        writeln!(out, "{key}={}", quote(value))
            .with_context(|| format!("failed to write environment cache file {path:?}"))?;
    }
    out.flush()
        .with_context(|| format!("failed to write environment cache file {path:?}"))?;
    Ok(())
}

/// Reads the cache file at `path`. Any I/O or parse error is reported as is;
/// callers treat it as a cache miss.
pub fn load(path: &Path) -> Result<Environment> {
    let iter = dotenvy::from_path_iter(path)
        .with_context(|| format!("failed to open environment cache file {path:?}"))?;
    let mut env = Environment::default();
    for item in iter {
        let (key, value) =
            item.with_context(|| format!("malformed environment cache file {path:?}"))?;
        env.set(key, value);
    }
    Ok(env)
}

/// Loads `path` on top of `env`. Returns `false` on a cache miss, leaving
/// `env` untouched.
pub fn overlay(path: &Path, env: &mut Environment) -> bool {
    match load(path) {
        Ok(cached) => {
            debug!(env_file = ?path, vars = cached.len(), "loaded environment cache");
            env.overlay(cached);
            true
        }
        Err(error) => {
            debug!(env_file = ?path, error = %format!("{error:#}"), "could not load environment cache");
            false
        }
    }
}
