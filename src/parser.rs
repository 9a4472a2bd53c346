use thiserror::Error;
use tracing::warn;

use crate::types::*;

/// Largest number of `(`-separated stages accepted on one line.
pub const MAX_COMMANDS: usize = 256;
/// Largest number of words (name included) handed to a program.
pub const MAX_ARGS: usize = 15;

const PIPE_SEPARATOR: u8 = b'(';
const WORD_SEPARATOR: u8 = b' ';

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ParseError {
	#[error("Invalid null command")]
	NullCommand,
	#[error("Too many commands (limit is {})", MAX_COMMANDS)]
	TooManyCommands,
}

type ParseResult<T> = Result<T, ParseError>;

struct Parser<'a> {
	line: &'a [u8],
	i: usize,
}

impl<'a> Parser<'a> {
	fn proceed_while<F>(&mut self, f: F) where F: Fn(u8) -> bool {
		while let Some(c) = self.line.get(self.i) {
			if !f(*c) { break; }
			self.i += 1;
		}
	}

	fn at_end(&self) -> bool {
		self.i >= self.line.len()
	}

	fn read_segment(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(|c| c != PIPE_SEPARATOR);
		&self.line[orig .. self.i]
	}

	fn skip_separator(&mut self, sep: u8) -> bool {
		if self.line.get(self.i) == Some(&sep) {
			self.i += 1;
			true
		} else {
			false
		}
	}

	fn parse_pipeline(&mut self) -> ParseResult<Pipeline<'a>> {
		let mut commands: Vec<&'a [u8]> = vec![];
		loop {
			let segment = self.read_segment();
			if segment.iter().all(|&c| c == WORD_SEPARATOR) {
				return Err(ParseError::NullCommand);
			}
			if commands.len() == MAX_COMMANDS {
				return Err(ParseError::TooManyCommands);
			}
			commands.push(segment);
			if !self.skip_separator(PIPE_SEPARATOR) {
				break;
			}
		}
		debug_assert!(self.at_end());
		Ok(Pipeline { commands: commands })
	}

	fn read_word(&mut self) -> &'a [u8] {
		let orig = self.i;
		self.proceed_while(|c| c != WORD_SEPARATOR);
		&self.line[orig .. self.i]
	}

	fn split_words(&mut self) -> Vec<&'a [u8]> {
		let mut words: Vec<&'a [u8]> = vec![];
		loop {
			self.proceed_while(|c| c == WORD_SEPARATOR);
			if self.at_end() {
				break;
			}
			if words.len() == MAX_ARGS {
				warn!(command = %String::from_utf8_lossy(self.line), limit = MAX_ARGS, "dropping arguments over the limit");
				break;
			}
			words.push(self.read_word());
		}
		words
	}
}

/// Splits a line on `(` into its stages. Segments are returned untrimmed; an
/// empty or all-space segment rejects the whole line.
pub fn parse<'a>(line: &'a [u8]) -> ParseResult<Pipeline<'a>> {
	let mut parser: Parser<'a> = Parser { line: line, i: 0 };
	parser.parse_pipeline()
}

/// Splits one stage on spaces. Words past `MAX_ARGS` are dropped.
///
/// The stage must contain a non-space byte, which `parse` guarantees.
pub fn split_arguments<'a>(command: &'a [u8]) -> Command<'a> {
	let mut parser: Parser<'a> = Parser { line: command, i: 0 };
	let mut words = parser.split_words().into_iter();
	let name = words.next().unwrap_or_default();
	Command { name: name, arguments: words.collect() }
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn splits_on_parenthesis_in_textual_order() {
		let p = parse(b"tr a-z A-Z ( rev ( echo hello").unwrap();
		assert_eq!(p.commands, vec![&b"tr a-z A-Z "[..], &b" rev "[..], &b" echo hello"[..]]);
	}

	#[test]
	fn single_command_has_one_stage() {
		let p = parse(b"ls -l").unwrap();
		assert_eq!(p.len(), 1);
		assert_eq!(p.commands[0], b"ls -l");
	}

	#[test]
	fn stage_count_matches_segments() {
		for n in 1..10 {
			let line = vec!["cat"; n].join(" ( ");
			assert_eq!(parse(line.as_bytes()).unwrap().len(), n);
		}
	}

	#[test]
	fn rejects_empty_and_blank_segments() {
		for line in [&b" "[..], b"ls (", b"( ls", b"ls (( cat", b"ls (   ( cat", b"ls (   "] {
			assert_eq!(parse(line), Err(ParseError::NullCommand), "{:?}", String::from_utf8_lossy(line));
		}
	}

	#[test]
	fn tab_is_not_blank() {
		assert!(parse(b"ls (\t").is_ok());
	}

	#[test]
	fn rejects_too_many_stages() {
		let ok = vec!["true"; MAX_COMMANDS].join("(");
		assert_eq!(parse(ok.as_bytes()).unwrap().len(), MAX_COMMANDS);
		let too_many = vec!["true"; MAX_COMMANDS + 1].join("(");
		assert_eq!(parse(too_many.as_bytes()), Err(ParseError::TooManyCommands));
	}

	#[test]
	fn splits_arguments_on_spaces() {
		let c = split_arguments(b"  grep  -v   foo ");
		assert_eq!(c.name, b"grep");
		assert_eq!(c.arguments, vec![&b"-v"[..], &b"foo"[..]]);
	}

	#[test]
	fn tabs_stay_inside_words() {
		let c = split_arguments(b"echo a\tb");
		assert_eq!(c.arguments, vec![&b"a\tb"[..]]);
	}

	#[test]
	fn drops_words_over_the_limit() {
		let line: Vec<String> = (0..20).map(|i| format!("w{}", i)).collect();
		let line = line.join(" ");
		let c = split_arguments(line.as_bytes());
		assert_eq!(c.name, b"w0");
		assert_eq!(c.arguments.len(), MAX_ARGS - 1);
		assert_eq!(*c.arguments.last().unwrap(), b"w14");
	}
}
