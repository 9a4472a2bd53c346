mod builtin;
mod eval;
mod global;
mod job;
mod parser;
mod reader;
mod session;
mod signal;
mod types;

use std::io;
use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

const LOG_ENV: &'static str = "SLUSH_LOG";

fn main() -> ExitCode {
	let filter = EnvFilter::try_from_env(LOG_ENV).unwrap_or_else(|_| EnvFilter::new("warn"));
	tracing_subscriber::fmt()
		.with_env_filter(filter)
		.with_writer(io::stderr)
		.with_target(true)
		.init();

	let interrupts = match signal::Interrupts::install() {
		Ok(interrupts) => interrupts,
		Err(e) => {
			eprintln!("signal: {}", e);
			return ExitCode::FAILURE;
		},
	};

	let mut session = session::Session::new(global::State::new(), interrupts, io::stdin(), io::stdout());
	match session.run() {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			eprintln!("{}", e);
			ExitCode::FAILURE
		},
	}
}
