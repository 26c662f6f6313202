use std::process::Stdio;

use anyhow::{bail, Context, Result};
use tokio::{
    io::{AsyncRead, AsyncReadExt},
    process::Command,
    select, signal,
    task::JoinHandle,
};
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::env::Environment;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OutputMode {
    /// The child shares our stdio.
    #[default]
    Passthrough,
    /// The child's output is buffered and only logged if it fails.
    OnlyErrors,
}

impl OutputMode {
    pub fn from_only_errors(only_errors: bool) -> Self {
        if only_errors {
            OutputMode::OnlyErrors
        } else {
            OutputMode::Passthrough
        }
    }
}

/// Runs `command` with exactly the variables of `env`, killing it if we
/// receive an interrupt before it exits.
pub async fn execute(command: &[String], env: &Environment, mode: OutputMode) -> Result<()> {
    let token = CancellationToken::new();
    let listener = {
        let token = token.clone();
        tokio::spawn(async move {
            if signal::ctrl_c().await.is_ok() {
                info!("received interrupt, killing child process");
                token.cancel();
            }
        })
    };
    let res = execute_until(command, env, mode, &token).await;
    listener.abort();
    res
}

/// Like [`execute`], but the child is killed once `token` is cancelled.
pub async fn execute_until(
    command: &[String],
    env: &Environment,
    mode: OutputMode,
    token: &CancellationToken,
) -> Result<()> {
    let [program, args @ ..] = command else {
        bail!("no command provided");
    };
    let line = command.join(" ");
    info!(?command, "executing command");

    let mut cmd = Command::new(program);
    cmd.args(args).env_clear().envs(env).kill_on_drop(true);
    match mode {
        OutputMode::Passthrough => {
            cmd.stdin(Stdio::inherit())
                .stdout(Stdio::inherit())
                .stderr(Stdio::inherit());
        }
        OutputMode::OnlyErrors => {
            cmd.stdin(Stdio::null())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped());
        }
    }

    let mut child = cmd
        .spawn()
        .with_context(|| format!("failed to start the command '{line}'"))?;
    let captured = Captured {
        stdout: child.stdout.take().map(|it| tokio::spawn(drain(it))),
        stderr: child.stderr.take().map(|it| tokio::spawn(drain(it))),
    };

    select! {
        status = child.wait() => {
            let status = status.with_context(|| format!("failed to wait for the command '{line}'"))?;
            if !status.success() {
                captured.log().await;
                bail!("command '{line}' failed: {status}");
            }
            debug!(%status, "command finished");
            Ok(())
        }
        _ = token.cancelled() => {
            captured.abort();
            child
                .kill()
                .await
                .with_context(|| format!("failed to kill the command '{line}'"))?;
            bail!("command '{line}' was killed after an interrupt")
        }
    }
}

async fn drain(mut pipe: impl AsyncRead + Unpin) -> Vec<u8> {
    let mut buf = Vec::new();
    if let Err(e) = pipe.read_to_end(&mut buf).await {
        warn!("failed to read child output: {e}");
    }
    buf
}

/// Output buffered in [`OutputMode::OnlyErrors`].
struct Captured {
    stdout: Option<JoinHandle<Vec<u8>>>,
    stderr: Option<JoinHandle<Vec<u8>>>,
}

impl Captured {
    /// Stdout followed by stderr; the two pipes are read separately so
    /// their relative order is lost.
    async fn combined(self) -> String {
        let mut out = String::new();
        for handle in [self.stdout, self.stderr].into_iter().flatten() {
            let Ok(buf) = handle.await else { continue };
            let text = String::from_utf8_lossy(&buf);
            let text = text.trim_end();
            if text.is_empty() {
                continue;
            }
            if !out.is_empty() {
                out.push('\n');
            }
            out.push_str(text);
        }
        out
    }

    async fn log(self) {
        let output = self.combined().await;
        if !output.is_empty() {
            info!("{output}");
        }
    }

    fn abort(&self) {
        for handle in [&self.stdout, &self.stderr].into_iter().flatten() {
            handle.abort();
        }
    }
}

#[cfg(all(test, unix))]
mod tests {
    use std::time::Duration;

    use tokio::time;

    use super::*;

    fn cmd(args: &[&str]) -> Vec<String> {
        args.iter().map(|it| it.to_string()).collect()
    }

    fn base_env() -> Environment {
        Environment::capture()
            .iter()
            .filter(|(key, _)| key.as_str() == "PATH")
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect()
    }

    #[tokio::test]
    async fn passthrough_success() {
        let token = CancellationToken::new();
        execute_until(&cmd(&["true"]), &base_env(), OutputMode::Passthrough, &token)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn non_zero_exit_is_an_error() {
        let token = CancellationToken::new();
        for mode in [OutputMode::Passthrough, OutputMode::OnlyErrors] {
            let err = execute_until(
                &cmd(&["sh", "-c", "echo oops; exit 3"]),
                &base_env(),
                mode,
                &token,
            )
            .await
            .unwrap_err();
            let msg = err.to_string();
            assert!(msg.contains("sh -c echo oops; exit 3"), "{msg}");
            assert!(msg.contains('3'), "{msg}");
        }
    }

    #[tokio::test]
    async fn child_sees_only_the_snapshot() {
        let mut env = base_env();
        env.set("WITHVS_MARKER", "yes");
        let token = CancellationToken::new();
        execute_until(
            &cmd(&["sh", "-c", r#"test "$WITHVS_MARKER" = yes && test -z "$HOME""#]),
            &env,
            OutputMode::OnlyErrors,
            &token,
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn missing_program_fails_to_start() {
        let token = CancellationToken::new();
        let err = execute_until(
            &cmd(&["withvs-definitely-not-a-program"]),
            &base_env(),
            OutputMode::Passthrough,
            &token,
        )
        .await
        .unwrap_err();
        assert!(err.to_string().contains("failed to start"), "{err}");
    }

    #[tokio::test]
    async fn empty_command_is_rejected() {
        let token = CancellationToken::new();
        let err = execute_until(&[], &base_env(), OutputMode::Passthrough, &token)
            .await
            .unwrap_err();
        assert!(err.to_string().contains("no command provided"), "{err}");
    }

    #[tokio::test]
    async fn captured_output_is_one_block() {
        let mut child = Command::new("sh")
            .args(["-c", "echo out; echo err >&2; echo more"])
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .unwrap();
        let captured = Captured {
            stdout: child.stdout.take().map(|it| tokio::spawn(drain(it))),
            stderr: child.stderr.take().map(|it| tokio::spawn(drain(it))),
        };
        child.wait().await.unwrap();
        assert_eq!(captured.combined().await, "out\nmore\nerr");
    }

    #[tokio::test]
    async fn interrupt_kills_the_child() {
        // SIGINT must never hit the default handler, or it takes down the test binary.
        let _guard = signal::unix::signal(signal::unix::SignalKind::interrupt()).unwrap();
        let pid = std::process::id().to_string();
        let sender = std::thread::spawn(move || {
            std::thread::sleep(Duration::from_millis(500));
            std::process::Command::new("kill")
                .args(["-INT", pid.as_str()])
                .status()
        });

        let started = std::time::Instant::now();
        let res = time::timeout(
            Duration::from_secs(15),
            execute(&cmd(&["sleep", "20"]), &base_env(), OutputMode::Passthrough),
        )
        .await
        .expect("child was not killed");
        assert!(sender.join().unwrap().unwrap().success());

        let err = res.unwrap_err();
        assert!(err.to_string().contains("interrupt"), "{err}");
        assert!(started.elapsed() < Duration::from_secs(10));
    }

    #[tokio::test]
    async fn cancellation_kills_the_child() {
        for mode in [OutputMode::Passthrough, OutputMode::OnlyErrors] {
            let token = CancellationToken::new();
            {
                let token = token.clone();
                tokio::spawn(async move {
                    time::sleep(Duration::from_millis(200)).await;
                    token.cancel();
                });
            }
            let res = time::timeout(
                Duration::from_secs(10),
                execute_until(&cmd(&["sleep", "30"]), &base_env(), mode, &token),
            )
            .await
            .expect("child was not killed");
            let err = res.unwrap_err();
            assert!(err.to_string().contains("interrupt"), "{err}");
        }
    }
}
