use std::{
    ffi::{OsStr, OsString},
    io::{self, Read, Write},
    os::unix::process::ExitStatusExt,
    path::PathBuf,
    process::{Command as StdCommand, Output, Stdio},
    sync::mpsc::{self, Sender},
    thread::{self, JoinHandle},
};

use log::trace;
use strum_macros::IntoStaticStr;

#[derive(Debug, thiserror::Error)]
pub enum DependencyError {
    #[error("Failed to find dependency '{dependency}': {source}")]
    NotFound {
        dependency: Dependency,
        #[source]
        source: which::Error,
    },

    #[error("Failed to execute dependency '{dependency}': {inner}")]
    CouldNotExecute {
        dependency: Dependency,
        #[source]
        inner: io::Error,
    },

    #[error("Dependency '{dependency}' finished unsuccessfully: {explanation}\nCmdline: {rendered_command}\n{output}")]
    ExecutionFailed {
        dependency: Dependency,
        rendered_command: String,
        code: Option<i32>,
        signal: Option<i32>,
        stdout: String,
        stderr: String,
        explanation: String,
        output: String,
    },
}

/// Enum of runtime and test dependencies used in the code base.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoStaticStr)]
#[strum(serialize_all = "lowercase")]
pub enum Dependency {
    Blkid,
    Btrfs,
    E2fsck,
    Lsblk,
    Parted,
    Resize2fs,
    Swapoff,
    Swapon,
    Udevadm,
    #[strum(serialize = "xfs_growfs")]
    XfsGrowfs,
    // Test dependencies
    #[cfg(test)]
    Cat,
    #[cfg(test)]
    DoesNotExist,
    #[cfg(test)]
    Echo,
    #[cfg(test)]
    False,
    #[cfg(test)]
    Sh,
}

impl std::fmt::Display for Dependency {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.into())
    }
}

impl Dependency {
    /// Gets the name of the dependency
    ///
    /// For example, Dependency::XfsGrowfs => "xfs_growfs"
    pub fn name(&self) -> &'static str {
        self.into()
    }

    /// Checks if the dependency is present in the system
    pub fn exists(&self) -> bool {
        self.path().is_ok()
    }

    /// Gets the path of the dependency
    pub fn path(&self) -> Result<PathBuf, Box<DependencyError>> {
        which::which(self.name()).map_err(|source| {
            Box::new(DependencyError::NotFound {
                dependency: *self,
                source,
            })
        })
    }

    /// Converts the dependency to a new Command instance
    /// (Note this does not create a std::process::Command instance)
    pub fn cmd(&self) -> Command {
        Command {
            dependency: *self,
            args: vec![],
            input: None,
        }
    }
}

/// Stream a line of command output was read from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputStream {
    Stdout,
    Stderr,
}

/// A single segment of output produced by a running command. Segments are split on both `\n`
/// and `\r`, so progress bars that redraw a line in place produce one segment per redraw.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputLine {
    pub stream: OutputStream,
    pub text: String,
}

pub struct Command {
    dependency: Dependency,
    args: Vec<OsString>,
    input: Option<Vec<u8>>,
}

impl Command {
    pub fn arg<S: AsRef<OsStr>>(&mut self, arg: S) -> &mut Self {
        self.args.push(arg.as_ref().to_os_string());
        self
    }

    pub fn args<I, S>(&mut self, args: I) -> &mut Command
    where
        I: IntoIterator<Item = S>,
        S: AsRef<OsStr>,
    {
        for arg in args {
            self.arg(arg.as_ref());
        }
        self
    }

    /// Data written to the standard input of the command. Without it, stdin is closed.
    pub fn input(&mut self, data: impl Into<Vec<u8>>) -> &mut Command {
        self.input = Some(data.into());
        self
    }

    pub fn run_and_check(&self) -> Result<(), Box<DependencyError>> {
        self.output()?.check()
    }

    pub fn output_and_check(&self) -> Result<String, Box<DependencyError>> {
        self.output()?.check_output()
    }

    fn render_command(&self) -> String {
        if self.args.is_empty() {
            self.dependency.to_string()
        } else {
            format!(
                "{} {}",
                self.dependency,
                self.args
                    .iter()
                    .map(|arg| arg.to_string_lossy())
                    .map(|arg| if arg.contains(' ') {
                        format!("'{arg}'")
                    } else {
                        arg.into()
                    })
                    .collect::<Vec<_>>()
                    .join(" "),
            )
        }
    }

    fn std_command(&self) -> Result<StdCommand, Box<DependencyError>> {
        let mut cmd = StdCommand::new(self.dependency.path()?);
        cmd.args(&self.args);
        Ok(cmd)
    }

    fn could_not_execute(&self, inner: io::Error) -> Box<DependencyError> {
        Box::new(DependencyError::CouldNotExecute {
            dependency: self.dependency,
            inner,
        })
    }

    pub fn output(&self) -> Result<CommandOutput, Box<DependencyError>> {
        let mut cmd = self.std_command()?;
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}'");

        let output = match self.input {
            None => cmd.stdin(Stdio::null()).output(),
            Some(ref input) => cmd
                .stdin(Stdio::piped())
                .stdout(Stdio::piped())
                .stderr(Stdio::piped())
                .spawn()
                .and_then(|mut child| {
                    if let Some(mut stdin) = child.stdin.take() {
                        stdin.write_all(input)?;
                    }
                    child.wait_with_output()
                }),
        }
        .map_err(|inner| self.could_not_execute(inner))?;

        let output = CommandOutput {
            rendered_command: rendered_command.clone(),
            dependency: self.dependency,
            inner: output,
        };
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            output.explain_exit(),
            output.output_report(),
        );
        Ok(output)
    }

    /// Runs the command and hands every output segment to `on_output` while the command is still
    /// running. Blocks until the command exits. The full output is also collected and returned,
    /// so the result can be checked like the one from `output()`.
    pub fn stream(
        &self,
        mut on_output: impl FnMut(OutputLine),
    ) -> Result<CommandOutput, Box<DependencyError>> {
        let mut cmd = self.std_command()?;
        let rendered_command = self.render_command();
        trace!("Executing '{rendered_command}' with streamed output");

        let mut child = cmd
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|inner| self.could_not_execute(inner))?;

        let (sender, receiver) = mpsc::channel();
        let stdout_reader = child
            .stdout
            .take()
            .map(|pipe| spawn_reader(pipe, OutputStream::Stdout, sender.clone()));
        let stderr_reader = child
            .stderr
            .take()
            .map(|pipe| spawn_reader(pipe, OutputStream::Stderr, sender.clone()));
        // Only the readers hold senders now, so the loop ends once both pipes are closed.
        drop(sender);

        for line in receiver {
            on_output(line);
        }

        let stdout = join_reader(stdout_reader);
        let stderr = join_reader(stderr_reader);
        let status = child.wait().map_err(|inner| self.could_not_execute(inner))?;

        let output = CommandOutput {
            rendered_command: rendered_command.clone(),
            dependency: self.dependency,
            inner: Output {
                status,
                stdout,
                stderr,
            },
        };
        trace!(
            "Executed '{rendered_command}': {}. Report:\n{}",
            output.explain_exit(),
            output.output_report(),
        );
        Ok(output)
    }
}

fn spawn_reader<R>(mut pipe: R, stream: OutputStream, sender: Sender<OutputLine>) -> JoinHandle<Vec<u8>>
where
    R: Read + Send + 'static,
{
    thread::spawn(move || {
        let mut raw = Vec::new();
        let mut segment = Vec::new();
        let mut buffer = [0u8; 4096];

        loop {
            let read = match pipe.read(&mut buffer) {
                Ok(0) => break,
                Ok(read) => read,
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(_) => break,
            };

            raw.extend_from_slice(&buffer[..read]);
            for &byte in &buffer[..read] {
                if byte == b'\n' || byte == b'\r' {
                    send_segment(&mut segment, stream, &sender);
                } else {
                    segment.push(byte);
                }
            }
        }
        send_segment(&mut segment, stream, &sender);

        raw
    })
}

fn send_segment(segment: &mut Vec<u8>, stream: OutputStream, sender: &Sender<OutputLine>) {
    if segment.is_empty() {
        return;
    }

    let text = String::from_utf8_lossy(segment).into_owned();
    segment.clear();
    // The receiver lives until both readers are done.
    let _ = sender.send(OutputLine { stream, text });
}

fn join_reader(reader: Option<JoinHandle<Vec<u8>>>) -> Vec<u8> {
    reader
        .and_then(|handle| handle.join().ok())
        .unwrap_or_default()
}

#[derive(Debug)]
pub struct CommandOutput {
    rendered_command: String,
    dependency: Dependency,
    inner: Output,
}

impl CommandOutput {
    /// Checks if the process exited successfully
    pub fn success(&self) -> bool {
        self.inner.status.success()
    }

    /// Gets the exit code of the process, if it exited normally
    pub fn code(&self) -> Option<i32> {
        self.inner.status.code()
    }

    /// Gets the signal that terminated the process, if it was terminated by a signal
    fn signal(&self) -> Option<i32> {
        self.inner.status.signal()
    }

    /// Gets stderr
    pub fn error_output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stderr).into()
    }

    /// Gets stdout
    pub fn output(&self) -> String {
        String::from_utf8_lossy(&self.inner.stdout).into()
    }

    /// Gets all available output, useful for reporting or debugging
    pub fn output_report(&self) -> String {
        let stdout = self.output();
        let stderr = self.error_output();

        let mut res = String::with_capacity(stdout.len() + stderr.len() + 20);

        if !stdout.is_empty() {
            res += &format!("stdout:\n{stdout}\n");
        }

        if !stderr.is_empty() {
            if !res.is_empty() {
                res += "\n";
            }
            res += &format!("stderr:\n{stderr}\n");
        }

        res
    }

    /// Checks if the process exited successfully, otherwise produces an error
    pub fn check(&self) -> Result<(), Box<DependencyError>> {
        if self.success() {
            return Ok(());
        }

        Err(Box::new(DependencyError::ExecutionFailed {
            dependency: self.dependency,
            rendered_command: self.rendered_command.clone(),
            code: self.code(),
            signal: self.signal(),
            stdout: self.output(),
            stderr: self.error_output(),
            explanation: self.explain_exit(),
            output: match self.output_report() {
                s if !s.is_empty() => s,
                _ => "(no output collected)".into(),
            },
        }))
    }

    /// Checks if the process exited successfully and returns the output,
    /// otherwise produces an error with the output
    pub fn check_output(&self) -> Result<String, Box<DependencyError>> {
        self.check()?;
        Ok(self.output())
    }

    /// Produces a string explaining the exit status of the process
    fn explain_exit(&self) -> String {
        if let Some(code) = self.code() {
            format!("exited with status: {code}")
        } else if let Some(signal) = self.signal() {
            format!("terminated by signal: {signal}")
        } else {
            "exited with unknown status".into()
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_command() {
        let run_and_check_res = Dependency::Echo.cmd().arg("Hello, world").run_and_check();
        run_and_check_res.unwrap();
        let output_and_check_res = Dependency::Echo
            .cmd()
            .arg("Hello, world")
            .output_and_check();
        assert_eq!(output_and_check_res.unwrap(), "Hello, world\n");

        let render_command_res = Dependency::Echo.cmd().arg("Hello, world").render_command();
        assert_eq!(render_command_res, "echo 'Hello, world'");

        let output_res = Dependency::Echo.cmd().arg("Hello, world").output();
        assert_eq!(output_res.unwrap().output(), "Hello, world\n");
    }

    #[test]
    fn test_arg_and_args() {
        let arg = Dependency::Echo.cmd().arg("Hello, world").output();
        let args = Dependency::Echo.cmd().args(["Hello,", "world"]).output();

        let arg_output = arg.unwrap().output();
        let args_output = args.unwrap().output();
        assert_eq!(arg_output, args_output);
        assert_eq!(arg_output, "Hello, world\n");
    }

    #[test]
    fn test_input() {
        let output = Dependency::Cat.cmd().input("Yes\n").output_and_check();
        assert_eq!(output.unwrap(), "Yes\n");

        // Without input, stdin is closed and cat exits immediately
        let output = Dependency::Cat.cmd().output_and_check();
        assert_eq!(output.unwrap(), "");
    }

    #[test]
    fn test_nonexistent_dep() {
        let output = Dependency::DoesNotExist.cmd().output().unwrap_err();
        assert!(matches!(*output, DependencyError::NotFound { .. }));
        assert_eq!(
            output.to_string(),
            "Failed to find dependency 'doesnotexist': cannot find binary path"
        );
        assert!(!Dependency::DoesNotExist.exists());
        assert!(Dependency::Echo.exists());
    }

    #[test]
    fn test_failed_dep_explains_exit() {
        let error = Dependency::False.cmd().run_and_check().unwrap_err();
        let message = error.to_string();
        assert!(
            message.starts_with("Dependency 'false' finished unsuccessfully: exited with status: 1\n"),
            "{message}"
        );
        assert!(message.contains("Cmdline: false\n"), "{message}");

        // Wrapped in anyhow, the explanation stays in the error chain
        let error = anyhow::Error::from(error).context("Failed to run false");
        assert!(format!("{error:?}").contains("exited with status: 1"));
    }

    #[test]
    fn test_commandoutput() {
        // This command should succeed
        let output = Dependency::Echo.cmd().arg("Hello, world").output().unwrap();
        assert!(output.success());
        assert_eq!(output.code(), Some(0));
        assert_eq!(output.signal(), None);
        assert_eq!(output.error_output(), "");
        assert_eq!(output.output(), "Hello, world\n");
        assert_eq!(output.output_report(), "stdout:\nHello, world\n\n");
        assert!(matches!(output.check(), Ok(())));
        assert!(matches!(output.check_output(), Ok(s) if s == "Hello, world\n"));
        assert_eq!(output.explain_exit(), "exited with status: 0");

        // This command should fail
        let output = Dependency::False.cmd().output().unwrap();
        assert!(!output.success());
        assert_eq!(output.code(), Some(1));
        assert_eq!(output.signal(), None);
        assert_eq!(output.error_output(), "");
        assert_eq!(output.output(), "");
        assert_eq!(output.output_report(), "");
        assert!(matches!(
            *output.check().unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
        assert!(matches!(
            *output.check_output().unwrap_err(),
            DependencyError::ExecutionFailed { .. }
        ));
        assert_eq!(output.explain_exit(), "exited with status: 1");
    }

    #[test]
    fn test_stream() {
        let mut stdout_lines = Vec::new();
        let mut stderr_lines = Vec::new();
        let output = Dependency::Sh
            .cmd()
            .arg("-c")
            .arg("printf 'first\\rsecond\\r\\nthird'; printf 'oops\\n' >&2; exit 3")
            .stream(|line| match line.stream {
                OutputStream::Stdout => stdout_lines.push(line.text),
                OutputStream::Stderr => stderr_lines.push(line.text),
            })
            .unwrap();

        assert_eq!(stdout_lines, vec!["first", "second", "third"]);
        assert_eq!(stderr_lines, vec!["oops"]);

        // The collected output is unsplit and the exit status is preserved
        assert_eq!(output.output(), "first\rsecond\r\nthird");
        assert_eq!(output.error_output(), "oops\n");
        assert_eq!(output.code(), Some(3));
        assert!(matches!(
            *output.check().unwrap_err(),
            DependencyError::ExecutionFailed { code: Some(3), .. }
        ));
    }

    #[test]
    fn test_stream_nonexistent_dep() {
        let mut called = false;
        let error = Dependency::DoesNotExist
            .cmd()
            .stream(|_| called = true)
            .unwrap_err();
        assert!(matches!(*error, DependencyError::NotFound { .. }));
        assert!(!called);
    }
}
