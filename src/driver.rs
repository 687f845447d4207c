//! The Driver (spec.md §4.3): resolves CLI input into an ordered list of
//! translation units, decides whether a bootstrap is needed, and owns the
//! single output file.

use std::ffi::OsStr;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::{Path, PathBuf};

use crate::emitter::Emitter;
use crate::error::{Result, TranslateError};
use crate::parser;

fn is_vm_file(path: &Path) -> bool {
    path.extension().and_then(OsStr::to_str).map(|ext| ext.eq_ignore_ascii_case("vm")).unwrap_or(false)
}

fn file_base(path: &Path) -> String {
    path.file_stem().and_then(OsStr::to_str).unwrap_or_default().to_string()
}

/// One `.vm` file plus the basename its static symbols and the bootstrap
/// check key off of.
struct Unit {
    path: PathBuf,
    base: String,
}

/// Whether and how to emit the bootstrap prologue (spec.md §4.2.8). `sp_init`
/// is unconditional for directory input; `call_sys_init` additionally
/// requires a `Sys.vm` unit among the files found there.
#[derive(Clone, Copy, Default)]
struct Bootstrap {
    sp_init: bool,
    call_sys_init: bool,
}

/// Resolves `input` into `(units, output_path, needs_bootstrap)`.
///
/// - A single `.vm` file translates to a sibling `.asm` file and never gets
///   a bootstrap, regardless of its name.
/// - A directory translates every `.vm` file it directly contains (sorted
///   lexicographically by basename, for a reproducible listing — unlike
///   the directory-iteration order a plain `readdir` would give) into one
///   `<dir>/<dir-basename>.asm`. `SP=256` is unconditional for *any*
///   directory input, even one containing a single `.vm` file; only the
///   `call Sys.init 0` half of the bootstrap is conditional on one of
///   those files being named `Sys.vm` (case-insensitive) — this matches
///   the original translator, which always calls `write_sp_init()` in its
///   directory branch regardless of how many files it finds there.
fn resolve_units(input: &Path) -> Result<(Vec<Unit>, PathBuf, Bootstrap)> {
    if input.is_file() {
        if !is_vm_file(input) {
            return Err(TranslateError::InvalidInput { path: input.to_path_buf() });
        }
        let base = file_base(input);
        let output = input.with_extension("asm");
        return Ok((
            vec![Unit { path: input.to_path_buf(), base }],
            output,
            Bootstrap::default(),
        ));
    }

    if input.is_dir() {
        let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
            .map_err(|source| TranslateError::Io { path: input.to_path_buf(), source })?
            .collect::<std::io::Result<Vec<_>>>()
            .map_err(|source| TranslateError::Io { path: input.to_path_buf(), source })?
            .into_iter()
            .map(|entry| entry.path())
            .filter(|path| path.is_file() && is_vm_file(path))
            .collect();
        entries.sort_by(|a, b| file_base(a).cmp(&file_base(b)));

        if entries.is_empty() {
            return Err(TranslateError::InvalidInput { path: input.to_path_buf() });
        }

        let mut units = Vec::with_capacity(entries.len());
        let mut seen = std::collections::HashSet::new();
        let mut call_sys_init = false;

        for path in entries {
            let base = file_base(&path);
            if base.eq_ignore_ascii_case("Sys") {
                call_sys_init = true;
            }
            if !seen.insert(base.clone()) {
                return Err(TranslateError::DuplicateUnit { basename: base });
            }
            units.push(Unit { path, base });
        }

        let dir_name = input
            .file_name()
            .and_then(OsStr::to_str)
            .unwrap_or("out")
            .to_string();
        let output = input.join(format!("{dir_name}.asm"));
        return Ok((units, output, Bootstrap { sp_init: true, call_sys_init }));
    }

    Err(TranslateError::InvalidInput { path: input.to_path_buf() })
}

/// Translates `path` (a `.vm` file or a directory of them) into HACK
/// assembly and returns the path of the `.asm` file written.
///
/// This is the crate's single public entry point; `vmasm`'s CLI is a thin
/// wrapper around it.
pub fn translate(path: &Path) -> Result<PathBuf> {
    let (units, output_path, bootstrap) = resolve_units(path)?;

    let output_file = File::create(&output_path)
        .map_err(|source| TranslateError::Io { path: output_path.clone(), source })?;
    let mut emitter = Emitter::new(BufWriter::new(output_file), output_path.clone());

    if bootstrap.sp_init {
        log::info!("emitting bootstrap (call Sys.init: {})", bootstrap.call_sys_init);
        emitter.write_bootstrap(bootstrap.call_sys_init)?;
    }

    for unit in &units {
        log::debug!("translating {}", unit.path.display());
        let input_file = File::open(&unit.path)
            .map_err(|source| TranslateError::Io { path: unit.path.clone(), source })?;
        let commands = parser::parse_unit(&unit.path, BufReader::new(input_file))?;

        emitter.set_file_base(unit.base.clone());
        for (line, command) in &commands {
            emitter.write_command(*line, command)?;
        }
    }

    Ok(output_path)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_vm(dir: &Path, name: &str, body: &str) -> PathBuf {
        let path = dir.join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(body.as_bytes()).unwrap();
        path
    }

    #[test]
    fn single_file_never_bootstraps() {
        let dir = tempfile::tempdir().unwrap();
        let vm = write_vm(dir.path(), "Sys.vm", "push constant 1\n");
        let (units, output, bootstrap) = resolve_units(&vm).unwrap();
        assert_eq!(units.len(), 1);
        assert!(!bootstrap.sp_init);
        assert!(!bootstrap.call_sys_init);
        assert_eq!(output, vm.with_extension("asm"));
    }

    #[test]
    fn directory_without_sys_still_gets_sp_init_but_no_call() {
        let dir = tempfile::tempdir().unwrap();
        write_vm(dir.path(), "Foo.vm", "push constant 1\n");
        let (units, _output, bootstrap) = resolve_units(dir.path()).unwrap();
        assert_eq!(units.len(), 1);
        assert!(bootstrap.sp_init);
        assert!(!bootstrap.call_sys_init);
    }

    #[test]
    fn directory_with_sys_calls_sys_init() {
        let dir = tempfile::tempdir().unwrap();
        write_vm(dir.path(), "Sys.vm", "call Sys.init 0\n");
        write_vm(dir.path(), "Foo.vm", "push constant 1\n");
        let (units, _output, bootstrap) = resolve_units(dir.path()).unwrap();
        assert_eq!(units.len(), 2);
        assert!(bootstrap.sp_init);
        assert!(bootstrap.call_sys_init);
    }

    #[test]
    fn units_are_sorted_by_basename() {
        let dir = tempfile::tempdir().unwrap();
        write_vm(dir.path(), "Zeta.vm", "push constant 1\n");
        write_vm(dir.path(), "Alpha.vm", "push constant 2\n");
        let (units, _output, _) = resolve_units(dir.path()).unwrap();
        let bases: Vec<&str> = units.iter().map(|u| u.base.as_str()).collect();
        assert_eq!(bases, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn non_vm_file_is_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let path = write_vm(dir.path(), "notes.txt", "hello\n");
        assert!(matches!(resolve_units(&path), Err(TranslateError::InvalidInput { .. })));
    }

    #[test]
    fn translate_writes_asm_file() {
        let dir = tempfile::tempdir().unwrap();
        let vm = write_vm(dir.path(), "Foo.vm", "push constant 7\npush constant 8\nadd\n");
        let output = translate(&vm).unwrap();
        let contents = std::fs::read_to_string(output).unwrap();
        assert!(contents.contains("// push constant 7"));
        assert!(contents.contains("// add"));
    }
}
