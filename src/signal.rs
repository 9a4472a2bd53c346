use std::io::{self, Read};
use std::os::fd::{AsFd, BorrowedFd};
use std::os::unix::net::UnixStream;

use signal_hook::consts::SIGINT;
use signal_hook::low_level::{self, pipe};
use signal_hook::SigId;
use tracing::debug;

/// Pending `SIGINT` deliveries. The handler only writes a byte to a socket;
/// the session notices it the next time it polls for input.
#[derive(Debug)]
pub struct Interrupts {
	receiver: UnixStream,
	sig_id: Option<SigId>,
}

impl Interrupts {
	/// Registers the `SIGINT` handler. Call once at startup.
	pub fn install() -> io::Result<Interrupts> {
		let (receiver, sender) = UnixStream::pair()?;
		receiver.set_nonblocking(true)?;
		sender.set_nonblocking(true)?;
		let sig_id = pipe::register(SIGINT, sender)?;
		debug!("SIGINT handler installed");
		Ok(Interrupts { receiver: receiver, sig_id: Some(sig_id) })
	}

	/// An unregistered source, fed through the returned sender.
	#[cfg(test)]
	pub fn detached() -> io::Result<(Interrupts, UnixStream)> {
		let (receiver, sender) = UnixStream::pair()?;
		receiver.set_nonblocking(true)?;
		Ok((Interrupts { receiver: receiver, sig_id: None }, sender))
	}

	/// Consumes every pending interrupt, returning whether there was any.
	pub fn take(&self) -> bool {
		let mut buf = [0u8; 64];
		let mut seen = false;
		loop {
			match (&self.receiver).read(&mut buf) {
				Ok(0) => return seen,
				Ok(_) => seen = true,
				Err(ref e) if e.kind() == io::ErrorKind::Interrupted => continue,
				Err(_) => return seen,
			}
		}
	}
}

impl AsFd for Interrupts {
	fn as_fd(&self) -> BorrowedFd<'_> {
		self.receiver.as_fd()
	}
}

impl Drop for Interrupts {
	fn drop(&mut self) {
		if let Some(id) = self.sig_id.take() {
			low_level::unregister(id);
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::io::Write;

	#[test]
	fn take_drains_all_pending() {
		let (interrupts, mut sender) = Interrupts::detached().unwrap();
		assert!(!interrupts.take());
		sender.write_all(b"\x02\x02\x02").unwrap();
		assert!(interrupts.take());
		assert!(!interrupts.take());
	}
}
