use std::{ffi::OsString, fmt};

use anyhow::{anyhow, Result};

pub const SEPARATOR: &str = "--";

pub const VS14: &str = "--vs14";
pub const VS12: &str = "--vs12";
pub const VS11: &str = "--vs11";
pub const X86: &str = "--32";
pub const VERBOSE: &str = "--verbose";
pub const SAVE_ENV: &str = "--save-env";
pub const ONLY_ERRORS: &str = "--only-errors";

/// A command line split at the first `--`: our flags on the left,
/// the program to launch on the right.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Invocation {
    pub flags: Vec<String>,
    pub program: Vec<String>,
}

impl Invocation {
    pub fn parse<I, S>(args: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let mut args = args.into_iter().map(Into::into);
        let flags = args.by_ref().take_while(|it| it != SEPARATOR).collect();
        let program = args.collect();
        Self { flags, program }
    }

    /// Parses raw process arguments. Non-Unicode arguments are rejected
    /// rather than rewritten, since they would reach the child altered.
    pub fn from_args_os<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = OsString>,
    {
        let args = args
            .into_iter()
            .map(|it| {
                it.into_string()
                    .map_err(|it| anyhow!("argument {it:?} is not valid Unicode"))
            })
            .collect::<Result<Vec<_>>>()?;
        Ok(Self::parse(args))
    }

    pub fn has_flag(&self, flag: &str) -> bool {
        find_flag(&self.flags, flag)
    }

    pub fn arch(&self) -> Arch {
        if self.has_flag(X86) {
            Arch::X86
        } else {
            Arch::Amd64
        }
    }

    pub fn verbose(&self) -> bool {
        self.has_flag(VERBOSE)
    }

    pub fn save_env(&self) -> bool {
        self.has_flag(SAVE_ENV)
    }

    pub fn only_errors(&self) -> bool {
        self.has_flag(ONLY_ERRORS)
    }
}

pub fn find_flag(flags: &[impl AsRef<str>], flag: &str) -> bool {
    flags.iter().any(|it| it.as_ref().eq_ignore_ascii_case(flag))
}

/// Target platform handed to the vendor initialization script.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Arch {
    X86,
    Amd64,
}

impl Arch {
    pub fn as_str(self) -> &'static str {
        match self {
            Arch::X86 => "x86",
            Arch::Amd64 => "amd64",
        }
    }
}

impl fmt::Display for Arch {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
