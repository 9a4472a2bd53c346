use std::ffi::OsStr;
use std::os::unix::ffi::OsStrExt;

use nix::unistd;
use tracing::debug;

use crate::global;

/// Changes the working directory. An empty target means `HOME`. Failures are
/// reported on stderr and leave the directory as it was.
pub fn builtin_cd(state: &global::State, target: &[u8]) {
	let dir = if target.is_empty() {
		match state.home() {
			Some(home) => home.as_os_str(),
			None => {
				eprintln!("cd: HOME not set");
				return;
			},
		}
	} else {
		OsStr::from_bytes(target)
	};
	match unistd::chdir(dir) {
		Ok(()) => debug!(dir = ?dir, "changed directory"),
		Err(e) => {
			debug!(dir = ?dir, errno = %e, "cd failed");
			eprintln!("cd: {}", e.desc());
		},
	}
}
