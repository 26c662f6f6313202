use std::path::{Path, PathBuf};

use anyhow::{bail, Result};
use tracing::{debug, info};

use crate::{env::Environment, flags};

/// A supported Visual Studio generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Toolchain {
    /// Short id used in cache filenames, e.g. `vs140`.
    pub id: &'static str,
    /// Variable holding the `Common7\Tools` directory of the installation.
    pub var: &'static str,
    pub label: &'static str,
    /// Flag requesting this generation explicitly.
    pub flag: &'static str,
}

/// Newest first; this is also the fallback order.
pub const KNOWN: [Toolchain; 3] = [
    Toolchain {
        id: "vs140",
        var: "VS140COMNTOOLS",
        label: "Visual Studio 2015",
        flag: flags::VS14,
    },
    Toolchain {
        id: "vs120",
        var: "VS120COMNTOOLS",
        label: "Visual Studio 2013",
        flag: flags::VS12,
    },
    Toolchain {
        id: "vs110",
        var: "VS110COMNTOOLS",
        label: "Visual Studio 2012",
        flag: flags::VS11,
    },
];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Located {
    pub toolchain: Toolchain,
    pub tools_dir: PathBuf,
}

impl Located {
    /// Path of the vendor environment initialization script.
    pub fn vcvarsall(&self) -> PathBuf {
        vcvarsall(&self.tools_dir)
    }
}

pub fn vcvarsall(tools_dir: &Path) -> PathBuf {
    tools_dir.join("../../VC/vcvarsall.bat")
}

/// Toolchains requested by `flags`, newest first. No version flag means all of them.
pub fn requested(flags: &[impl AsRef<str>]) -> Vec<Toolchain> {
    let picked = KNOWN
        .into_iter()
        .filter(|it| flags::find_flag(flags, it.flag))
        .collect::<Vec<_>>();
    if picked.is_empty() {
        KNOWN.to_vec()
    } else {
        picked
    }
}

/// Returns the first requested toolchain whose variable is set and non-empty.
pub fn locate(flags: &[impl AsRef<str>], env: &Environment) -> Result<Located> {
    for toolchain in requested(flags) {
        match env.non_empty(toolchain.var) {
            Some(dir) => {
                debug!(toolchain = toolchain.id, tools_dir = dir, "found {}", toolchain.label);
                return Ok(Located {
                    toolchain,
                    tools_dir: PathBuf::from(dir),
                });
            }
            None => info!("{}: appropriate version not found", toolchain.id),
        }
    }
    bail!(
        "VS Tools not found (withvs relies on the environment variables VS*COMNTOOLS to find Visual Studio)"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    const NO_FLAGS: [&str; 0] = [];

    fn env_of(pairs: &[(&str, &str)]) -> Environment {
        pairs.iter().copied().collect()
    }

    #[test]
    fn no_version_flag_tries_newest_first() {
        let env = env_of(&[("VS120COMNTOOLS", "c:\\vs12"), ("VS110COMNTOOLS", "c:\\vs11")]);
        let found = locate(&NO_FLAGS, &env).unwrap();
        assert_eq!(found.toolchain.id, "vs120");
        assert_eq!(found.tools_dir, PathBuf::from("c:\\vs12"));
    }

    #[test]
    fn explicit_version_wins_over_newer() {
        let env = env_of(&[("VS140COMNTOOLS", "c:\\vs14"), ("VS110COMNTOOLS", "c:\\vs11")]);
        let found = locate(&["--VS11"], &env).unwrap();
        assert_eq!(found.toolchain.id, "vs110");
    }

    #[test]
    fn requested_but_unset_version_falls_through() {
        let env = env_of(&[("VS140COMNTOOLS", ""), ("VS120COMNTOOLS", "c:\\vs12")]);
        let found = locate(&["--vs14", "--vs12"], &env).unwrap();
        assert_eq!(found.toolchain.id, "vs120");

        let err = locate(&["--vs14"], &env).unwrap_err();
        assert!(err.to_string().contains("VS*COMNTOOLS"), "{err}");
    }

    #[test]
    fn nothing_installed_is_not_found() {
        let env = env_of(&[("HOME", "/home/u")]);
        let err = locate(&NO_FLAGS, &env).unwrap_err();
        assert!(err.to_string().contains("VS Tools not found"), "{err}");
    }

    #[test]
    fn requested_preserves_priority_order() {
        let ids = requested(&["--vs11", "--vs14"])
            .iter()
            .map(|it| it.id)
            .collect::<Vec<_>>();
        assert_eq!(ids, ["vs140", "vs110"]);
        assert_eq!(requested(&["--32"]).len(), KNOWN.len());
    }

    #[test]
    fn vcvarsall_is_relative_to_tools_dir() {
        let located = Located {
            toolchain: KNOWN[0],
            tools_dir: PathBuf::from("/vs/Common7/Tools"),
        };
        assert_eq!(
            located.vcvarsall(),
            PathBuf::from("/vs/Common7/Tools/../../VC/vcvarsall.bat")
        );
    }
}
