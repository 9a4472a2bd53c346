use std::convert::Infallible;
use std::ffi::{CString, NulError};
use std::io::{self, Write};
use std::os::fd::{AsRawFd, OwnedFd};
#[cfg(test)]
use std::sync::atomic::{AtomicUsize, Ordering};

use nix::errno::Errno;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::unistd;
use thiserror::Error;
use tracing::info;

use crate::job;
use crate::parser;
use crate::types::{Command, Pipeline};

/// Failures of the controlling process while building or joining a pipeline.
/// None of them leaves the session in a usable state.
#[derive(Debug, Error)]
pub enum ExecError {
	#[error("pipe: {}", .0.desc())]
	Pipe(Errno),
	#[error("fork: {}", .0.desc())]
	Fork(Errno),
	#[error("wait: {}", .0.desc())]
	Wait(Errno),
}

#[cfg(test)]
static PIPES_OPENED: AtomicUsize = AtomicUsize::new(0);

/// Both ends of one anonymous pipe. Each end is closed when the pair drops.
#[derive(Debug)]
pub struct PipePair {
	read: OwnedFd,
	write: OwnedFd,
}

impl PipePair {
	pub fn new() -> Result<PipePair, ExecError> {
		let (read, write) = unistd::pipe().map_err(ExecError::Pipe)?;
		#[cfg(test)]
		PIPES_OPENED.fetch_add(1, Ordering::SeqCst);
		Ok(PipePair { read: read, write: write })
	}
}

fn build_argv(command: &Command) -> Result<Vec<CString>, NulError> {
	let mut argv = Vec::with_capacity(command.arguments.len() + 1);
	argv.push(CString::new(command.name)?);
	for &arg in &command.arguments {
		argv.push(CString::new(arg)?);
	}
	Ok(argv)
}

fn do_exec_command(argv: Result<Vec<CString>, NulError>, stdin: Option<PipePair>, stdout: Option<PipePair>) -> Result<Infallible, Errno> {
	if let Some(ref pair) = stdin {
		unistd::dup2(pair.read.as_raw_fd(), libc::STDIN_FILENO)?;
	}
	if let Some(ref pair) = stdout {
		unistd::dup2(pair.write.as_raw_fd(), libc::STDOUT_FILENO)?;
	}
	drop(stdin);
	drop(stdout);
	// The shell ignores SIGPIPE; programs expect the default.
	unsafe { signal::signal(Signal::SIGPIPE, SigHandler::SigDfl) }?;
	let argv = argv.map_err(|_| Errno::EINVAL)?;
	unistd::execvp(&argv[0], &argv)
}

/// Runs in the forked child: wires the pipe ends and replaces the image.
/// Only async-signal-safe calls are made here.
fn exec_command(name: &[u8], argv: Result<Vec<CString>, NulError>, stdin: Option<PipePair>, stdout: Option<PipePair>) -> ! {
	let Err(e) = do_exec_command(argv, stdin, stdout);
	let mut stderr = io::stderr();
	let _ = stderr.write_all(name);
	let _ = stderr.write_all(b": ");
	let _ = stderr.write_all(e.desc().as_bytes());
	let _ = stderr.write_all(b"\n");
	unsafe { libc::_exit(libc::EXIT_FAILURE) }
}

/// Spawns the stages from the last index down to 0, so the pipe feeding a
/// stage's stdin is already connected to the stage that reads it.
fn spawn_commands(pipeline: &Pipeline, job_builder: &mut job::JobBuilder) -> Result<(), ExecError> {
	let mut prev: Option<PipePair> = None;
	for i in (0 .. pipeline.len()).rev() {
		let next = if i != 0 { Some(PipePair::new()?) } else { None };
		let command = parser::split_arguments(pipeline.commands[i]);
		let argv = build_argv(&command);
		match unsafe { job_builder.push_fork() }.map_err(ExecError::Fork)? {
			unistd::ForkResult::Parent{..} => {
				drop(prev);
				prev = next;
			},
			unistd::ForkResult::Child => {
				exec_command(command.name, argv, prev, next);
			},
		}
	}
	debug_assert!(prev.is_none());
	Ok(())
}

/// Runs every stage of `pipeline` and returns once all of them have exited.
pub fn eval(pipeline: &Pipeline) -> Result<job::Job, ExecError> {
	assert!(pipeline.len() > 0);
	info!(stages = pipeline.len(), "running pipeline");

	let mut job_builder = job::JobBuilder::new(pipeline.len());
	spawn_commands(pipeline, &mut job_builder)?;
	let mut job = job_builder.build();
	job.wait().map_err(ExecError::Wait)?;
	Ok(job)
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::job::{State, WaitStatusExt};
	use nix::sys::wait::WaitStatus;
	use crate::global::lock_process;

	fn run(line: &str) -> job::Job {
		let pipeline = parser::parse(line.as_bytes()).unwrap();
		eval(&pipeline).unwrap()
	}

	#[cfg(target_os = "linux")]
	fn open_pipes() -> usize {
		std::fs::read_dir("/proc/self/fd").unwrap()
			.filter_map(|entry| entry.ok())
			.filter_map(|entry| std::fs::read_link(entry.path()).ok())
			.filter(|target| target.to_string_lossy().starts_with("pipe:"))
			.count()
	}

	#[test]
	fn single_command_spawns_one_process() {
		let _guard = lock_process();
		let job = run("true");
		assert_eq!(job.processes.len(), 1);
		assert_eq!(job.state(), State::Terminated);
		assert_eq!(job.processes[0].status.code(), Some(0));
	}

	#[test]
	fn one_process_per_stage() {
		let _guard = lock_process();
		let job = run("true ( true ( true ( true");
		assert_eq!(job.processes.len(), 4);
		assert_eq!(job.state(), State::Terminated);
	}

	#[test]
	fn statuses_follow_command_order() {
		let _guard = lock_process();
		let job = run("false ( true");
		assert_eq!(job.processes[0].status.code(), Some(1));
		assert_eq!(job.processes[1].status.code(), Some(0));
	}

	#[test]
	fn missing_program_fails_only_its_stage() {
		let _guard = lock_process();
		let job = run("true ( slush-test-no-such-program --flag");
		assert_eq!(job.processes.len(), 2);
		assert_eq!(job.processes[0].status.code(), Some(0));
		assert_eq!(job.processes[1].status.code(), Some(1));
	}

	#[test]
	fn writer_gets_sigpipe_once_reader_exits() {
		let _guard = lock_process();
		let job = run("true ( yes");
		match job.processes[1].status {
			WaitStatus::Signaled(_, Signal::SIGPIPE, _) => {},
			status => panic!("unexpected status {:?}", status),
		}
	}

	#[test]
	fn stages_are_joined_by_one_pipe_less_than_their_count() {
		let _guard = lock_process();
		for &(line, pipes) in &[("true", 0), ("true ( true", 1), ("true ( true ( true ( true", 3)] {
			let before = PIPES_OPENED.load(Ordering::SeqCst);
			run(line);
			assert_eq!(PIPES_OPENED.load(Ordering::SeqCst) - before, pipes, "{}", line);
		}
	}

	#[cfg(target_os = "linux")]
	#[test]
	fn no_pipe_stays_open_in_parent() {
		let _guard = lock_process();
		let before = open_pipes();
		run("true");
		assert_eq!(open_pipes(), before);
		run("true ( true ( true");
		assert_eq!(open_pipes(), before);
		run("true ( slush-test-no-such-program");
		assert_eq!(open_pipes(), before);
	}
}
