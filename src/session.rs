use std::io::{self, Write};
use std::os::fd::AsFd;

use thiserror::Error;
use tracing::{debug, info};

use crate::builtin;
use crate::eval::{self, ExecError};
use crate::global;
use crate::parser;
use crate::reader::{Line, LineReader};
use crate::signal::Interrupts;

#[derive(Debug, Error)]
pub enum SessionError {
	#[error(transparent)]
	Exec(#[from] ExecError),
	#[error("I/O error: {0}")]
	Io(#[from] io::Error),
}

/// The read-eval loop: prompt, read a line, parse it, then either `cd` or
/// run the pipeline to completion.
pub struct Session<F: AsFd, W: Write> {
	state: global::State,
	interrupts: Interrupts,
	reader: LineReader<F>,
	out: W,
}

impl<F: AsFd, W: Write> Session<F, W> {
	pub fn new(state: global::State, interrupts: Interrupts, input: F, out: W) -> Session<F, W> {
		Session { state: state, interrupts: interrupts, reader: LineReader::new(input), out: out }
	}

	/// Runs until end of input. Only engine failures end it early.
	pub fn run(&mut self) -> Result<(), SessionError> {
		loop {
			self.state.write_prompt(&mut self.out)?;

			let state = &self.state;
			let out = &mut self.out;
			let line = self.reader.read_line(&self.interrupts, || {
				out.write_all(b"\n")?;
				state.write_prompt(out)
			})?;
			let line = match line {
				Line::Text(line) => line,
				Line::TooLong => {
					writeln!(self.out, "Input line too long")?;
					continue;
				},
				Line::Eof => {
					self.out.write_all(b"\n")?;
					self.out.flush()?;
					info!("end of input");
					return Ok(());
				},
			};
			self.dispatch(&line)?;
		}
	}

	fn dispatch(&mut self, line: &[u8]) -> Result<(), SessionError> {
		if line.is_empty() {
			return Ok(());
		}
		let pipeline = match parser::parse(line) {
			Ok(pipeline) => pipeline,
			Err(e) => {
				writeln!(self.out, "{}", e)?;
				return Ok(());
			},
		};

		if let Some(target) = pipeline.as_cd() {
			builtin::builtin_cd(&self.state, target);
			return Ok(());
		}

		self.out.flush()?;
		let job = eval::eval(&pipeline)?;
		debug!(processes = job.processes.len(), state = ?job.state(), "pipeline finished");
		if self.interrupts.take() {
			// the interrupt went to the pipeline; start the prompt on a fresh line
			self.out.write_all(b"\n")?;
		}
		Ok(())
	}
}
