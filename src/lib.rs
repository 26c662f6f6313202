//! Runs a command inside a cached Visual Studio build environment.
//!
//! `vcvarsall.bat` takes seconds to run, so the environment it produces is
//! captured once per toolchain and architecture into
//! `$HOME/withvs-<toolchain>-<arch>.env` and replayed on later runs.

pub mod bootstrap;
pub mod cache;
pub mod env;
pub mod flags;
pub mod logging;
pub mod path;
pub mod runner;
pub mod toolchain;
pub mod workflow;

pub use env::Environment;
pub use flags::Invocation;
