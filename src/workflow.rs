use std::path::Path;

use anyhow::{Context, Result};
use tracing::{debug, error};

use crate::{
    bootstrap, cache,
    env::{Environment, HOME, PATH},
    flags::Invocation,
    path,
    runner::{self, OutputMode},
    toolchain,
};

/// Runs one invocation against the environment snapshot `env`.
///
/// `exe` is what the bootstrap batch file relaunches to dump the
/// environment, normally the current executable.
///
/// Every error returned here has already been logged with its context.
pub async fn run(inv: &Invocation, mut env: Environment, exe: &Path) -> Result<()> {
    let located = toolchain::locate(&inv.flags, &env)
        .inspect_err(|e| error!(flags = ?inv.flags, error = %e, "no Visual Studio toolchain found"))?;
    let vcvarsall = located.vcvarsall();
    let arch = inv.arch();
    path::sanitize_env(&mut env);

    let home = env
        .non_empty(HOME)
        .context("environment variable HOME not found, it is where the environment cache lives")
        .inspect_err(|e| error!(error = %e, "no cache location"))?;
    let env_file = cache::cache_path(home, located.toolchain.id, arch);

    if inv.save_env() {
        debug!(env_file = ?env_file, "saving env to file");
        return cache::save(&env_file, &env).inspect_err(|e| {
            error!(env_file = ?env_file, error = format!("{e:#}"), "error while writing environment cache file")
        });
    }

    if !cache::overlay(&env_file, &mut env) {
        debug!(env_file = ?env_file, "could not find env file, will try to create it");
        bootstrap::run(inv, &vcvarsall, exe, &env)
            .await
            .inspect_err(|e| {
                error!(flags = ?inv.flags, error = format!("{e:#}"), "failed to execute batch file via comspec")
            })?;
        debug!(
            env_file = ?env_file,
            toolset = located.toolchain.id,
            config = %arch,
            "saved env variables to disk"
        );
        if !cache::overlay(&env_file, &mut env) {
            let e = anyhow::anyhow!("environment cache file {env_file:?} missing after bootstrap");
            error!(env_file = ?env_file, error = %e, "failed to load environment file even after it was created");
            return Err(e);
        }
    }
    path::sanitize_env(&mut env);

    if inv.verbose() {
        debug!(flags = ?inv.flags, "flags");
        debug!(prog_args = ?inv.program, "will launch this");
        debug!(vc_tools_path = ?vcvarsall, "full path to VS tools");
        debug!(config = %arch, "platform config");
        debug!(PATH = env.get(PATH).unwrap_or_default(), "full contents of PATH");
    }

    runner::execute(
        &inv.program,
        &env,
        OutputMode::from_only_errors(inv.only_errors()),
    )
    .await
    .inspect_err(|e| {
        error!(
            flags = ?inv.flags,
            prog_args = ?inv.program,
            error = format!("{e:#}"),
            "failed to execute command"
        )
    })
}
