//! The Emitter: the core of the translator (spec.md §4.2). Maintains
//! per-translation-unit state (current file's static-symbol base name, and
//! a process-wide label counter) and turns each [`Command`] into a
//! deterministic, fixed-register HACK assembly block.
//!
//! Every emitted block opens with a `// <mnemonic ...>` comment, purely for
//! traceability when reading the generated `.asm` by hand.

use std::io::Write;
use std::path::PathBuf;

use crate::command::{ArithmeticOp, Command, Segment};
use crate::error::{Result, TranslateError};

/// Writes the HACK assembly for a stream of VM [`Command`]s.
///
/// Owns a single output sink (mirrors the original `CodeWriter`'s one
/// output file) so callers can hand it a `BufWriter<File>` in production or
/// an in-memory buffer in tests.
pub struct Emitter<W: Write> {
    out: W,
    output_path: PathBuf,
    file_base: String,
    label_counter: u32,
}

const SEGMENT_REGISTERS: &[(Segment, &str)] = &[
    (Segment::Local, "LCL"),
    (Segment::Argument, "ARG"),
    (Segment::This, "THIS"),
    (Segment::That, "THAT"),
];

fn base_register(segment: Segment) -> Option<&'static str> {
    SEGMENT_REGISTERS
        .iter()
        .find(|(s, _)| *s == segment)
        .map(|(_, reg)| *reg)
}

impl<W: Write> Emitter<W> {
    /// `output_path` is used only to attach context to I/O errors.
    pub fn new(out: W, output_path: impl Into<PathBuf>) -> Self {
        Emitter { out, output_path: output_path.into(), file_base: String::new(), label_counter: 0 }
    }

    /// Informs the Emitter that translation of a new VM file has started
    /// (spec.md §4.1 lifecycle operation `setFileBase`).
    pub fn set_file_base(&mut self, name: impl Into<String>) {
        self.file_base = name.into();
    }

    fn write_lines(&mut self, lines: &[String]) -> Result<()> {
        for line in lines {
            writeln!(self.out, "{line}").map_err(|source| TranslateError::Io {
                path: self.output_path.clone(),
                source,
            })?;
        }
        Ok(())
    }

    /// Emits the bootstrap prologue (spec.md §4.2.8): `SP = 256`, and, if
    /// `call_sys_init` is set, an unconditional `call Sys.init 0`.
    pub fn write_bootstrap(&mut self, call_sys_init: bool) -> Result<()> {
        self.write_lines(&[
            "// bootstrap".to_string(),
            "@256".to_string(),
            "D=A".to_string(),
            "@SP".to_string(),
            "M=D".to_string(),
        ])?;
        if call_sys_init {
            self.write_call("Sys.init", 0)?;
        }
        Ok(())
    }

    /// Dispatches a single command to its lowering. `line` is the source
    /// line the command came from, used only to annotate a `pop constant`
    /// error. The `match` has no wildcard arm: adding a [`Command`] variant
    /// is a compile error here until this function is updated.
    pub fn write_command(&mut self, line: usize, cmd: &Command) -> Result<()> {
        match cmd {
            Command::Arithmetic(op) => self.write_arithmetic(*op),
            Command::Push { segment, index } => self.write_push(*segment, *index),
            Command::Pop { segment, index } => self.write_pop(line, *segment, *index),
            Command::Label(symbol) => self.write_label(symbol),
            Command::Goto(symbol) => self.write_goto(symbol),
            Command::IfGoto(symbol) => self.write_if_goto(symbol),
            Command::Function { name, n_vars } => self.write_function(name, *n_vars),
            Command::Return => self.write_return(),
            Command::Call { name, n_args } => self.write_call(name, *n_args),
        }
    }

    /// §4.2.1 — binary (`add`/`sub`/`and`/`or`), unary (`neg`/`not`), and
    /// comparison (`eq`/`lt`/`gt`) arithmetic lowering.
    pub fn write_arithmetic(&mut self, op: ArithmeticOp) -> Result<()> {
        let lines = match op {
            ArithmeticOp::Add => binary_op("add", "M=D+M"),
            ArithmeticOp::Sub => binary_op("sub", "M=M-D"),
            ArithmeticOp::And => binary_op("and", "M=D&M"),
            ArithmeticOp::Or => binary_op("or", "M=D|M"),
            ArithmeticOp::Neg => unary_op("neg", "M=-M"),
            ArithmeticOp::Not => unary_op("not", "M=!M"),
            ArithmeticOp::Eq => self.comparison_op("JEQ"),
            ArithmeticOp::Lt => self.comparison_op("JLT"),
            ArithmeticOp::Gt => self.comparison_op("JGT"),
        };
        self.write_lines(&lines)
    }

    /// The two-pop-one-push, two-register comparison template (spec.md
    /// §4.2.1). `D = M - D` is mandatory and not commutative: `x` (the
    /// lower operand) minus `y` (the upper) is what the `JEQ`/`JLT`/`JGT`
    /// jump mnemonics are calibrated against.
    fn comparison_op(&mut self, jump: &str) -> Vec<String> {
        let n = self.label_counter;
        self.label_counter += 1;
        let true_label = format!("{jump}_TRUE_{n}");
        let end_label = format!("{jump}_END_{n}");
        vec![
            format!("// {}", jump.to_lowercase()),
            "@SP".into(),
            "M=M-1".into(),
            "A=M".into(),
            "D=M".into(),
            "@SP".into(),
            "M=M-1".into(),
            "A=M".into(),
            "D=M-D".into(),
            format!("@{true_label}"),
            format!("D;{jump}"),
            "D=0".into(),
            format!("@{end_label}"),
            "0;JMP".into(),
            format!("({true_label})"),
            "D=-1".into(),
            format!("({end_label})"),
            "@SP".into(),
            "A=M".into(),
            "M=D".into(),
            "@SP".into(),
            "M=M+1".into(),
        ]
    }

    /// §4.2.2 — push lowering by segment.
    pub fn write_push(&mut self, segment: Segment, index: u16) -> Result<()> {
        let lines = match segment {
            Segment::Constant => vec![
                format!("// push constant {index}"),
                format!("@{index}"),
                "D=A".into(),
                "@SP".into(),
                "A=M".into(),
                "M=D".into(),
                "@SP".into(),
                "M=M+1".into(),
            ],
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                let base_reg = base_register(segment).unwrap();
                vec![
                    format!("// push {segment} {index}"),
                    format!("@{index}"),
                    "D=A".into(),
                    format!("@{base_reg}"),
                    "A=M".into(),
                    "A=D+A".into(),
                    "D=M".into(),
                    "@SP".into(),
                    "A=M".into(),
                    "M=D".into(),
                    "@SP".into(),
                    "M=M+1".into(),
                ]
            }
            Segment::Temp => {
                let addr = 5u32 + index as u32;
                vec![
                    format!("// push temp {index}"),
                    format!("@{addr}"),
                    "D=M".into(),
                    "@SP".into(),
                    "A=M".into(),
                    "M=D".into(),
                    "@SP".into(),
                    "M=M+1".into(),
                ]
            }
            Segment::Pointer => {
                let addr = 3u32 + index as u32;
                vec![
                    format!("// push pointer {index}"),
                    format!("@{addr}"),
                    "D=M".into(),
                    "@SP".into(),
                    "A=M".into(),
                    "M=D".into(),
                    "@SP".into(),
                    "M=M+1".into(),
                ]
            }
            Segment::Static => vec![
                format!("// push static {index}"),
                format!("@{}.{index}", self.file_base),
                "D=M".into(),
                "@SP".into(),
                "A=M".into(),
                "M=D".into(),
                "@SP".into(),
                "M=M+1".into(),
            ],
        };
        self.write_lines(&lines)
    }

    /// §4.2.3 — pop lowering by segment. `pop constant` has no meaning
    /// (spec.md's open-question resolution: this is an error, not a
    /// silent no-op) and `R13` holds the target address across the `SP`
    /// manipulation because `D` carries the popped value.
    pub fn write_pop(&mut self, line: usize, segment: Segment, index: u16) -> Result<()> {
        let lines = match segment {
            Segment::Constant => {
                return Err(TranslateError::BadSegment {
                    path: self.output_path.clone(),
                    line,
                    segment: "constant".to_string(),
                    direction: "pop",
                })
            }
            Segment::Local | Segment::Argument | Segment::This | Segment::That => {
                let base_reg = base_register(segment).unwrap();
                vec![
                    format!("// pop {segment} {index}"),
                    format!("@{index}"),
                    "D=A".into(),
                    format!("@{base_reg}"),
                    "D=D+M".into(),
                    "@R13".into(),
                    "M=D".into(),
                    "@SP".into(),
                    "M=M-1".into(),
                    "A=M".into(),
                    "D=M".into(),
                    "@R13".into(),
                    "A=M".into(),
                    "M=D".into(),
                ]
            }
            Segment::Temp => {
                let addr = 5u32 + index as u32;
                vec![
                    format!("// pop temp {index}"),
                    format!("@{addr}"),
                    "D=A".into(),
                    "@R13".into(),
                    "M=D".into(),
                    "@SP".into(),
                    "M=M-1".into(),
                    "A=M".into(),
                    "D=M".into(),
                    "@R13".into(),
                    "A=M".into(),
                    "M=D".into(),
                ]
            }
            Segment::Pointer => {
                let addr = 3u32 + index as u32;
                vec![
                    format!("// pop pointer {index}"),
                    "@SP".into(),
                    "M=M-1".into(),
                    "A=M".into(),
                    "D=M".into(),
                    format!("@{addr}"),
                    "M=D".into(),
                ]
            }
            Segment::Static => vec![
                format!("// pop static {index}"),
                "@SP".into(),
                "M=M-1".into(),
                "A=M".into(),
                "D=M".into(),
                format!("@{}.{index}", self.file_base),
                "M=D".into(),
            ],
        };
        self.write_lines(&lines)
    }

    /// §4.2.4 — `label`.
    pub fn write_label(&mut self, symbol: &str) -> Result<()> {
        self.write_lines(&[format!("({symbol})")])
    }

    /// §4.2.4 — `goto`.
    pub fn write_goto(&mut self, symbol: &str) -> Result<()> {
        self.write_lines(&[format!("// goto {symbol}"), format!("@{symbol}"), "0;JMP".into()])
    }

    /// §4.2.4 — `if-goto`.
    pub fn write_if_goto(&mut self, symbol: &str) -> Result<()> {
        self.write_lines(&[
            format!("// if-goto {symbol}"),
            "@SP".into(),
            "M=M-1".into(),
            "A=M".into(),
            "D=M".into(),
            format!("@{symbol}"),
            "D;JNE".into(),
        ])
    }

    /// §4.2.5 — `function name nVars`: defines the entry label, then pushes
    /// `nVars` zeros inline.
    pub fn write_function(&mut self, name: &str, n_vars: u16) -> Result<()> {
        let mut lines = vec![format!("({name})")];
        for _ in 0..n_vars {
            lines.push("@SP".into());
            lines.push("A=M".into());
            lines.push("M=0".into());
            lines.push("@SP".into());
            lines.push("M=M+1".into());
        }
        self.write_lines(&lines)
    }

    /// §4.2.7 — callee-side `return`. `R14` must capture the return
    /// address *before* `LCL` is restored: a zero-argument function makes
    /// `ARG = SP - 5` overlap the saved return address otherwise.
    pub fn write_return(&mut self) -> Result<()> {
        self.write_lines(&[
            "// return".into(),
            "@LCL".into(),
            "D=M".into(),
            "@R13".into(),
            "M=D".into(),
            "@5".into(),
            "A=D-A".into(),
            "D=M".into(),
            "@R14".into(),
            "M=D".into(),
            "@SP".into(),
            "M=M-1".into(),
            "A=M".into(),
            "D=M".into(),
            "@ARG".into(),
            "A=M".into(),
            "M=D".into(),
            "@ARG".into(),
            "D=M+1".into(),
            "@SP".into(),
            "M=D".into(),
            "@R13".into(),
            "D=M".into(),
            "@1".into(),
            "A=D-A".into(),
            "D=M".into(),
            "@THAT".into(),
            "M=D".into(),
            "@R13".into(),
            "D=M".into(),
            "@2".into(),
            "A=D-A".into(),
            "D=M".into(),
            "@THIS".into(),
            "M=D".into(),
            "@R13".into(),
            "D=M".into(),
            "@3".into(),
            "A=D-A".into(),
            "D=M".into(),
            "@ARG".into(),
            "M=D".into(),
            "@R13".into(),
            "D=M".into(),
            "@4".into(),
            "A=D-A".into(),
            "D=M".into(),
            "@LCL".into(),
            "M=D".into(),
            "@R14".into(),
            "A=M".into(),
            "0;JMP".into(),
        ])
    }

    /// §4.2.6 — caller-side `call name nArgs`. The push order (return
    /// address, then `LCL`/`ARG`/`THIS`/`THAT`) is part of the ABI; `return`
    /// depends on it.
    pub fn write_call(&mut self, name: &str, n_args: u16) -> Result<()> {
        let n = self.label_counter;
        self.label_counter += 1;
        let return_label = format!("{name}$ret.{n}");

        let mut lines = vec![format!("// call {name} {n_args}"), format!("@{return_label}"), "D=A".into()];
        lines.extend(push_d());
        for reg in ["LCL", "ARG", "THIS", "THAT"] {
            lines.push(format!("@{reg}"));
            lines.push("D=M".into());
            lines.extend(push_d());
        }
        lines.extend([
            "@SP".into(),
            "D=M".into(),
            "@5".into(),
            "D=D-A".into(),
            format!("@{n_args}"),
            "D=D-A".into(),
            "@ARG".into(),
            "M=D".into(),
            "@SP".into(),
            "D=M".into(),
            "@LCL".into(),
            "M=D".into(),
            format!("@{name}"),
            "0;JMP".into(),
            format!("({return_label})"),
        ]);
        self.write_lines(&lines)
    }
}

fn binary_op(name: &str, op: &str) -> Vec<String> {
    vec![
        format!("// {name}"),
        "@SP".into(),
        "M=M-1".into(),
        "A=M".into(),
        "D=M".into(),
        "@SP".into(),
        "M=M-1".into(),
        "A=M".into(),
        op.to_string(),
        "@SP".into(),
        "M=M+1".into(),
    ]
}

fn unary_op(name: &str, op: &str) -> Vec<String> {
    vec![
        format!("// {name}"),
        "@SP".into(),
        "M=M-1".into(),
        "A=M".into(),
        op.to_string(),
        "@SP".into(),
        "M=M+1".into(),
    ]
}

fn push_d() -> Vec<String> {
    vec!["@SP".into(), "A=M".into(), "M=D".into(), "@SP".into(), "M=M+1".into()]
}

#[cfg(test)]
mod tests {
    use super::*;

    fn render(f: impl FnOnce(&mut Emitter<Vec<u8>>) -> Result<()>) -> String {
        let mut emitter = Emitter::new(Vec::new(), "out.asm");
        f(&mut emitter).unwrap();
        String::from_utf8(emitter.out).unwrap()
    }

    #[test]
    fn push_constant_increments_sp() {
        let asm = render(|e| e.write_push(Segment::Constant, 42));
        assert!(asm.contains("@42"));
        assert!(asm.contains("M=M+1"));
    }

    #[test]
    fn pop_constant_is_rejected() {
        let mut emitter = Emitter::new(Vec::new(), "out.asm");
        let err = emitter.write_pop(3, Segment::Constant, 0).unwrap_err();
        assert!(matches!(err, TranslateError::BadSegment { line: 3, .. }));
    }

    #[test]
    fn consecutive_comparisons_get_distinct_labels() {
        let mut emitter = Emitter::new(Vec::new(), "out.asm");
        emitter.write_arithmetic(ArithmeticOp::Eq).unwrap();
        emitter.write_arithmetic(ArithmeticOp::Eq).unwrap();
        let asm = String::from_utf8(emitter.out).unwrap();
        assert!(asm.contains("JEQ_TRUE_0"));
        assert!(asm.contains("JEQ_TRUE_1"));
        assert_ne!(
            asm.match_indices("JEQ_TRUE_").map(|(i, _)| i).collect::<Vec<_>>().len(),
            0
        );
    }

    #[test]
    fn static_symbol_uses_current_file_base() {
        let mut emitter = Emitter::new(Vec::new(), "out.asm");
        emitter.set_file_base("Foo");
        emitter.write_push(Segment::Static, 3).unwrap();
        let asm = String::from_utf8(emitter.out).unwrap();
        assert!(asm.contains("@Foo.3"));
    }

    #[test]
    fn label_counter_is_shared_across_calls_and_comparisons() {
        let mut emitter = Emitter::new(Vec::new(), "out.asm");
        emitter.write_call("Foo.bar", 0).unwrap();
        emitter.write_arithmetic(ArithmeticOp::Lt).unwrap();
        let asm = String::from_utf8(emitter.out).unwrap();
        assert!(asm.contains("Foo.bar$ret.0"));
        assert!(asm.contains("JLT_TRUE_1"));
    }

    #[test]
    fn call_pushes_return_address_and_all_four_segment_pointers() {
        let asm = render(|e| e.write_call("Foo.bar", 2));
        assert_eq!(asm.matches("M=M+1").count(), 5);
        assert!(asm.contains("@LCL"));
        assert!(asm.contains("@ARG"));
        assert!(asm.contains("@THIS"));
        assert!(asm.contains("@THAT"));
    }
}
