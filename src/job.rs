use nix::errno::Errno;
use nix::sys::wait::{self, WaitStatus};
use nix::unistd::{self, Pid};
use tracing::debug;

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub enum State { Active, Terminated }

pub trait WaitStatusExt {
	fn state(self) -> State;
	fn code(self) -> Option<i32>;
}

impl WaitStatusExt for WaitStatus {
	fn state(self) -> State {
		match self {
			WaitStatus::Exited(..) | WaitStatus::Signaled(..) => State::Terminated,
			_ => State::Active,
		}
	}

	/// Shell-style status: the exit code, or 128 plus the signal number.
	fn code(self) -> Option<i32> {
		match self {
			WaitStatus::Exited(_, code) => Some(code),
			WaitStatus::Signaled(_, sig, _) => Some(128 + sig as i32),
			_ => None,
		}
	}
}

#[derive(Debug, PartialEq, Eq, Clone, Copy)]
pub struct Process {
	pub pid: Pid,
	pub status: WaitStatus,
}

/// The processes of one pipeline, indexed like its commands.
#[derive(Debug)]
pub struct Job {
	pub processes: Vec<Process>,
}

impl Job {
	pub fn state(&self) -> State {
		if self.processes.iter().all(|pr| pr.status.state() == State::Terminated) {
			State::Terminated
		} else {
			State::Active
		}
	}

	/// Blocks until every process of the job has terminated. Only the job's
	/// own pids are reaped.
	pub fn wait(&mut self) -> nix::Result<()> {
		for pr in self.processes.iter_mut() {
			while pr.status.state() != State::Terminated {
				match wait::waitpid(pr.pid, None) {
					Ok(status) => {
						debug!(pid = %pr.pid, code = ?status.code(), "reaped");
						pr.status = status;
					},
					Err(Errno::EINTR) => continue,
					Err(Errno::ECHILD) => {
						// reaped elsewhere
						debug!(pid = %pr.pid, "no such child");
						break;
					},
					Err(e) => return Err(e),
				}
			}
		}
		Ok(())
	}
}

#[derive(Debug)]
pub struct JobBuilder {
	imp: Job,
}

impl JobBuilder {
	pub fn new(size_hint: usize) -> JobBuilder {
		JobBuilder {
			imp: Job { processes: Vec::with_capacity(size_hint) }
		}
	}

	/// Forks and records the child in the parent.
	///
	/// # Safety
	///
	/// The caller must keep the child to async-signal-safe calls until it
	/// execs or exits.
	pub unsafe fn push_fork(&mut self) -> nix::Result<unistd::ForkResult> {
		let r = unistd::fork()?;
		if let unistd::ForkResult::Parent{ child: pid } = r {
			debug!(pid = %pid, "spawned");
			self.imp.processes.push(Process { pid: pid, status: WaitStatus::StillAlive });
		}
		Ok(r)
	}

	/// Processes are pushed in spawn order, last command first.
	pub fn build(mut self) -> Job {
		self.imp.processes.reverse();
		self.imp
	}
}
