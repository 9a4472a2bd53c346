use std::env;
use std::io::{self, Write};
use std::os::unix::ffi::OsStrExt;
use std::path::{Path, PathBuf};

pub const PROMPT_PREFIX: &'static [u8] = b"SLUSH";

const HOME_KEY: &'static str = "HOME";

/// Serializes tests that touch the working directory or the descriptor table.
#[cfg(test)]
pub fn lock_process() -> std::sync::MutexGuard<'static, ()> {
	static PROCESS: std::sync::Mutex<()> = std::sync::Mutex::new(());
	PROCESS.lock().unwrap_or_else(|e| e.into_inner())
}

/// Session-wide context handed to the prompt and to `cd`. The working
/// directory itself stays process state, so children inherit it.
#[derive(Debug)]
pub struct State {
	home: Option<PathBuf>,
}

impl State {
	pub fn new() -> State {
		let home = env::var_os(HOME_KEY).filter(|h| !h.is_empty()).map(PathBuf::from);
		State::with_home(home)
	}

	pub fn with_home(home: Option<PathBuf>) -> State {
		State { home: home }
	}

	pub fn home(&self) -> Option<&Path> {
		self.home.as_deref()
	}

	pub fn prompt(&self) -> Vec<u8> {
		match env::current_dir() {
			Ok(cwd) => render_prompt(&cwd, self.home()),
			Err(e) => {
				eprintln!("getcwd: {}", e);
				let mut prompt = PROMPT_PREFIX.to_vec();
				prompt.extend(b"> ");
				prompt
			},
		}
	}

	/// Writes the prompt and flushes so it shows before the next read.
	pub fn write_prompt<W: Write>(&self, out: &mut W) -> io::Result<()> {
		out.write_all(&self.prompt())?;
		out.flush()
	}
}

/// `SLUSH|<dir>> `, with `<dir>` relative to `home` when `cwd` lies inside it.
pub fn render_prompt(cwd: &Path, home: Option<&Path>) -> Vec<u8> {
	let dir = home.and_then(|h| cwd.strip_prefix(h).ok()).unwrap_or(cwd);
	let mut prompt = PROMPT_PREFIX.to_vec();
	prompt.push(b'|');
	prompt.extend(dir.as_os_str().as_bytes());
	prompt.extend(b"> ");
	prompt
}
