use std::io;
use std::os::fd::{AsFd, AsRawFd};

use nix::errno::Errno;
use nix::poll::{self, PollFd, PollFlags, PollTimeout};
use nix::unistd;
use tracing::{debug, trace};

use crate::signal::Interrupts;

/// Input buffer size of one line, terminator included.
pub const MAX_INPUT: usize = 256;

const CHUNK_SIZE: usize = 4096;

#[derive(Debug, PartialEq, Eq)]
pub enum Line {
	Text(Vec<u8>),
	/// The line exceeded `MAX_INPUT - 1` bytes and was discarded.
	TooLong,
	Eof,
}

/// Reads lines straight from a descriptor while watching for interrupts.
#[derive(Debug)]
pub struct LineReader<F: AsFd> {
	input: F,
	pending: Vec<u8>,
	discarding: bool,
	eof: bool,
}

impl<F: AsFd> LineReader<F> {
	pub fn new(input: F) -> LineReader<F> {
		LineReader { input: input, pending: vec![], discarding: false, eof: false }
	}

	/// Pops one complete line out of the buffer, newline stripped.
	fn take_line(&mut self) -> Option<Line> {
		loop {
			match self.pending.iter().position(|&c| c == b'\n') {
				Some(pos) => {
					let mut line: Vec<u8> = self.pending.drain(.. pos + 1).collect();
					line.pop();
					if self.discarding {
						self.discarding = false;
						return Some(Line::TooLong);
					}
					if line.len() >= MAX_INPUT {
						return Some(Line::TooLong);
					}
					return Some(Line::Text(line));
				},
				None if self.pending.len() >= MAX_INPUT => {
					// keep discarding until the newline shows up
					self.pending.clear();
					self.discarding = true;
				},
				None if self.eof => {
					if self.discarding {
						self.discarding = false;
						return Some(Line::TooLong);
					}
					if self.pending.is_empty() {
						return None;
					}
					return Some(Line::Text(self.pending.drain(..).collect()));
				},
				None => return None,
			}
		}
	}

	fn fill(&mut self) -> io::Result<()> {
		let mut chunk = [0u8; CHUNK_SIZE];
		loop {
			match unistd::read(self.input.as_fd().as_raw_fd(), &mut chunk) {
				Ok(0) => {
					self.eof = true;
					return Ok(());
				},
				Ok(n) => {
					trace!(bytes = n, "read input");
					self.pending.extend_from_slice(&chunk[.. n]);
					return Ok(());
				},
				Err(Errno::EINTR) => continue,
				Err(e) => return Err(e.into()),
			}
		}
	}

	/// Blocks for the next line. Each interrupt seen while waiting calls
	/// `on_interrupt`; buffered input is kept and reading resumes after it.
	pub fn read_line<C>(&mut self, interrupts: &Interrupts, mut on_interrupt: C) -> io::Result<Line>
		where C: FnMut() -> io::Result<()>
	{
		loop {
			if let Some(line) = self.take_line() {
				return Ok(line);
			}
			if self.eof {
				return Ok(Line::Eof);
			}
			if interrupts.take() {
				debug!("interrupted while reading");
				on_interrupt()?;
				continue;
			}

			let mut fds = [
				PollFd::new(self.input.as_fd(), PollFlags::POLLIN),
				PollFd::new(interrupts.as_fd(), PollFlags::POLLIN),
			];
			match poll::poll(&mut fds, PollTimeout::NONE) {
				Ok(_) => {},
				Err(Errno::EINTR) => continue,
				Err(e) => return Err(e.into()),
			}
			let input_ready = fds[0].revents().map_or(false, |r| !r.is_empty());
			if input_ready {
				self.fill()?;
			}
		}
	}
}
