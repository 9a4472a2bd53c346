/// One `(`-delimited stage of an input line, split into words.
#[derive(Debug, PartialEq, Eq)]
pub struct Command<'a> {
	pub name: &'a [u8],
	pub arguments: Vec<&'a [u8]>,
}

/// Stages in textual order: index 0 is the leftmost segment, whose output
/// reaches the terminal; the last index reads the terminal's input.
#[derive(Debug, PartialEq, Eq)]
pub struct Pipeline<'a> {
	pub commands: Vec<&'a [u8]>,
}

impl<'a> Pipeline<'a> {
	pub fn len(&self) -> usize {
		self.commands.len()
	}

	/// Target directory when the line is the `cd` built-in. A bare `cd` yields
	/// an empty target.
	pub fn as_cd(&self) -> Option<&'a [u8]> {
		if self.commands.len() != 1 {
			return None;
		}
		let command = self.commands[0];
		if command == b"cd" {
			Some(&command[2..])
		} else if command.starts_with(b"cd ") {
			Some(&command[3..])
		} else {
			None
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn cd_target_is_taken_verbatim() {
		let p = Pipeline { commands: vec![&b"cd  spaced dir "[..]] };
		assert_eq!(p.as_cd(), Some(&b" spaced dir "[..]));
	}

	#[test]
	fn bare_cd_has_empty_target() {
		let p = Pipeline { commands: vec![&b"cd"[..]] };
		assert_eq!(p.as_cd(), Some(&b""[..]));
	}

	#[test]
	fn cd_needs_separator_and_single_stage() {
		assert_eq!(Pipeline { commands: vec![&b"cdrom"[..]] }.as_cd(), None);
		assert_eq!(Pipeline { commands: vec![&b" cd x"[..]] }.as_cd(), None);
		assert_eq!(Pipeline { commands: vec![&b"cd x "[..], &b" ls"[..]] }.as_cd(), None);
	}
}
