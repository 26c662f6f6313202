//! Populating a missing environment cache.
//!
//! The environment produced by `vcvarsall.bat` only exists inside the
//! interpreter that ran it, so we run a two-line batch file: the first line
//! calls the vendor script, the second relaunches this executable with
//! `--save-env` so that it dumps the inherited environment to the cache.

use std::{fs, path::Path};

use anyhow::{Context, Result};
use tracing::{debug, info};

use crate::{
    env::{Environment, COMSPEC},
    flags::{Arch, Invocation, SAVE_ENV},
    runner::{self, OutputMode},
};

pub const SCRIPT_NAME: &str = "_withvs_env.bat";

pub fn render_script(vcvarsall: &Path, arch: Arch, exe: &Path, flags: &[String]) -> String {
    let mut relaunch = vec![format!("\"{}\"", exe.display())];
    relaunch.extend(flags.iter().cloned());
    relaunch.push(SAVE_ENV.to_owned());
    format!(
        "@call \"{}\" {arch}\r\n@{}\r\n",
        vcvarsall.display(),
        relaunch.join(" ")
    )
}

/// Runs `vcvarsall` for `arch` and relaunches `exe` so that it writes the
/// resulting environment to the cache. The batch file is removed afterwards.
pub async fn run(
    inv: &Invocation,
    vcvarsall: &Path,
    exe: &Path,
    env: &Environment,
) -> Result<()> {
    let comspec = env.non_empty(COMSPEC).context(
        "environment variable COMSPEC not found, it is needed to launch the batch file that captures the environment",
    )?;

    let dir = tempfile::Builder::new()
        .prefix("withvs")
        .tempdir()
        .context("failed to create temporary directory")?;
    let script = dir.path().join(SCRIPT_NAME);
    debug!(filename = ?script, "creating batch file");
    fs::write(&script, render_script(vcvarsall, inv.arch(), exe, &inv.flags))
        .with_context(|| format!("failed to create temporary batch file {script:?}"))?;

    info!(flags = ?inv.flags, batch_filename = ?script, "executing batch file via command interpreter");
    let command = [comspec.to_owned(), "/c".to_owned(), script.display().to_string()];
    runner::execute(
        &command,
        env,
        OutputMode::from_only_errors(inv.only_errors()),
    )
    .await
    .with_context(|| format!("failed to execute batch file {script:?} via {comspec}"))
}
