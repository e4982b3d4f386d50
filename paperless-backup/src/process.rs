//! Blocking execution of external tools (`systemctl`, `docker`).

use std::io;
use std::process::{Command, Stdio};
use tracing::debug;

/// Captured result of a finished command
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandOutput {
    pub success: bool,
    pub stdout: String,
    pub stderr: String,
}

pub trait CommandRunner: Send + Sync {
    /// Run to completion with output discarded; `Ok(true)` on exit status 0
    fn status(&self, program: &str, args: &[&str]) -> io::Result<bool>;

    /// Run to completion capturing stdout and stderr
    fn output(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput>;
}

impl<T: CommandRunner + ?Sized> CommandRunner for &T {
    fn status(&self, program: &str, args: &[&str]) -> io::Result<bool> {
        (**self).status(program, args)
    }

    fn output(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        (**self).output(program, args)
    }
}

/// Runs commands on the host
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn status(&self, program: &str, args: &[&str]) -> io::Result<bool> {
        debug!("Running {} {}", program, args.join(" "));
        let status = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()?;
        Ok(status.success())
    }

    fn output(&self, program: &str, args: &[&str]) -> io::Result<CommandOutput> {
        debug!("Running {} {}", program, args.join(" "));
        let output = Command::new(program)
            .args(args)
            .stdin(Stdio::null())
            .output()?;
        Ok(CommandOutput {
            success: output.status.success(),
            stdout: String::from_utf8_lossy(&output.stdout).into_owned(),
            stderr: String::from_utf8_lossy(&output.stderr).into_owned(),
        })
    }
}
