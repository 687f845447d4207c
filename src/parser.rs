//! Line Normalizer & Tokenizer (spec.md §4.1). Strips comments and
//! whitespace, drops empty lines, and classifies what's left into one of
//! the nine [`Command`] kinds. Segment names and numeric ranges are *not*
//! validated here — that's the Emitter's job (spec.md §4.2).

use std::io::BufRead;
use std::path::Path;

use crate::command::{ArithmeticOp, Command};
use crate::error::{Result, TranslateError};

/// Strips a `//`-to-end-of-line comment and surrounding whitespace. Returns
/// `None` if nothing is left.
fn strip_comment(raw: &str) -> Option<&str> {
    let code = match raw.find("//") {
        Some(idx) => &raw[..idx],
        None => raw,
    };
    let trimmed = code.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed)
    }
}

fn parse_index(path: &Path, line: usize, token: &str) -> Result<u16> {
    token.parse::<u16>().map_err(|_| TranslateError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: format!("expected a non-negative 16-bit index, got '{token}'"),
    })
}

fn require_arg<'a>(
    path: &Path,
    line: usize,
    opcode: &str,
    tokens: &[&'a str],
    index: usize,
) -> Result<&'a str> {
    tokens.get(index).copied().ok_or_else(|| TranslateError::Malformed {
        path: path.to_path_buf(),
        line,
        reason: format!("'{opcode}' is missing a required argument"),
    })
}

/// Classifies one already-stripped, non-empty line into a [`Command`].
fn parse_command(path: &Path, line: usize, stripped: &str) -> Result<Command> {
    let tokens: Vec<&str> = stripped.split_whitespace().collect();
    let opcode = tokens[0];

    if let Some(op) = ArithmeticOp::parse(opcode) {
        return Ok(Command::Arithmetic(op));
    }

    match opcode {
        "push" | "pop" => {
            let segment_tok = require_arg(path, line, opcode, &tokens, 1)?;
            let index_tok = require_arg(path, line, opcode, &tokens, 2)?;
            let index = parse_index(path, line, index_tok)?;
            let segment = crate::command::Segment::parse(segment_tok).ok_or_else(|| {
                TranslateError::Malformed {
                    path: path.to_path_buf(),
                    line,
                    reason: format!("unknown segment '{segment_tok}'"),
                }
            })?;
            Ok(if opcode == "push" {
                Command::Push { segment, index }
            } else {
                Command::Pop { segment, index }
            })
        }
        "label" => Ok(Command::Label(require_arg(path, line, opcode, &tokens, 1)?.to_string())),
        "goto" => Ok(Command::Goto(require_arg(path, line, opcode, &tokens, 1)?.to_string())),
        "if-goto" => Ok(Command::IfGoto(require_arg(path, line, opcode, &tokens, 1)?.to_string())),
        "function" => {
            let name = require_arg(path, line, opcode, &tokens, 1)?.to_string();
            let n_vars = parse_index(path, line, require_arg(path, line, opcode, &tokens, 2)?)?;
            Ok(Command::Function { name, n_vars })
        }
        "call" => {
            let name = require_arg(path, line, opcode, &tokens, 1)?.to_string();
            let n_args = parse_index(path, line, require_arg(path, line, opcode, &tokens, 2)?)?;
            Ok(Command::Call { name, n_args })
        }
        "return" => Ok(Command::Return),
        _ => Err(TranslateError::UnknownOpcode {
            path: path.to_path_buf(),
            line,
            token: opcode.to_string(),
        }),
    }
}

/// Reads every command out of `reader`, in source order, alongside the
/// 1-based line it came from. `path` is used only to attach file context
/// to errors. The line is carried past this module because the Emitter
/// needs it too (a `pop constant` is syntactically fine but semantically
/// an error, caught only once the Emitter knows what the opcode means).
pub fn parse_unit(path: &Path, reader: impl BufRead) -> Result<Vec<(usize, Command)>> {
    let mut commands = Vec::new();

    for (idx, raw) in reader.lines().enumerate() {
        let line = idx + 1;
        let raw = raw.map_err(|source| TranslateError::Io { path: path.to_path_buf(), source })?;
        let Some(stripped) = strip_comment(&raw) else { continue };
        commands.push((line, parse_command(path, line, stripped)?));
    }

    Ok(commands)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;
    use std::path::PathBuf;

    fn parse(src: &str) -> Result<Vec<Command>> {
        Ok(parse_unit(&PathBuf::from("test.vm"), Cursor::new(src))?
            .into_iter()
            .map(|(_, cmd)| cmd)
            .collect())
    }

    #[test]
    fn strips_comments_and_blank_lines() {
        let cmds = parse("// header\n\npush constant 7 // comment\n   \nadd\n").unwrap();
        assert_eq!(cmds.len(), 2);
        matches_push_constant(&cmds[0], 7);
        assert!(matches!(cmds[1], Command::Arithmetic(ArithmeticOp::Add)));
    }

    fn matches_push_constant(cmd: &Command, expected: u16) {
        match cmd {
            Command::Push { segment: crate::command::Segment::Constant, index } => {
                assert_eq!(*index, expected)
            }
            other => panic!("expected push constant, got {other:?}"),
        }
    }

    #[test]
    fn unknown_opcode_fails() {
        let err = parse("frobnicate\n").unwrap_err();
        assert!(matches!(err, TranslateError::UnknownOpcode { line: 1, .. }));
    }

    #[test]
    fn missing_argument_fails() {
        let err = parse("push constant\n").unwrap_err();
        assert!(matches!(err, TranslateError::Malformed { line: 1, .. }));
    }

    #[test]
    fn non_integer_index_fails() {
        let err = parse("push constant abc\n").unwrap_err();
        assert!(matches!(err, TranslateError::Malformed { line: 1, .. }));
    }

    #[test]
    fn parses_every_kind() {
        let src = "\
            add\nsub\nneg\neq\ngt\nlt\nand\nor\nnot\n\
            push local 1\npop argument 2\n\
            label LOOP\ngoto LOOP\nif-goto LOOP\n\
            function Foo.bar 2\ncall Foo.bar 1\nreturn\n";
        let cmds = parse(src).unwrap();
        assert_eq!(cmds.len(), 16);
    }
}
