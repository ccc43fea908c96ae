//! Jack Compiler CLI
//!
//! Command-line interface for compiling .jack source files to Hack VM
//! instruction files.

use clap::Parser as ClapParser;
use jackc::{CompilationEngine, Lexer, Token, TokenKind, TokenStream};
use std::fs;
use std::path::{Path, PathBuf};
use std::process;

#[derive(ClapParser)]
#[command(name = "jackc")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Jack compiler - compile .jack classes to Hack VM instructions", long_about = None)]
struct Cli {
    /// .jack source files, or directories to scan for them (not recursive)
    #[arg(required = true)]
    paths: Vec<PathBuf>,

    /// Directory to write .vm files to (defaults to each source's own directory)
    #[arg(short, long = "out-dir")]
    out_dir: Option<PathBuf>,

    /// Also write a <ClassName>.tokens file with one "KIND lexeme" pair per line
    #[arg(long)]
    keep_tokens: bool,
}

fn main() {
    let cli = Cli::parse();

    let mut had_error = false;
    for path in &cli.paths {
        for file in jack_files_under(path) {
            if let Err(e) = compile_one(&file, cli.out_dir.as_deref(), cli.keep_tokens) {
                eprintln!("error: {}: {}", file.display(), e);
                had_error = true;
            }
        }
    }

    if had_error {
        process::exit(1);
    }
}

/// A single `.jack` file, or every `.jack` file directly inside a directory
/// (no recursion into subdirectories).
fn jack_files_under(path: &Path) -> Vec<PathBuf> {
    if path.is_dir() {
        let mut files: Vec<PathBuf> = fs::read_dir(path)
            .into_iter()
            .flatten()
            .filter_map(Result::ok)
            .map(|entry| entry.path())
            .filter(|p| p.extension().is_some_and(|e| e == "jack"))
            .collect();
        files.sort();
        files
    } else {
        vec![path.to_path_buf()]
    }
}

fn compile_one(file: &Path, out_dir: Option<&Path>, keep_tokens: bool) -> Result<(), String> {
    let source = fs::read_to_string(file).map_err(|e| format!("failed to read file: {}", e))?;

    let class_name = file
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| "source path has no usable file stem".to_string())?
        .to_string();

    let tokens = Lexer::tokenize(&source).map_err(|e| e.to_string())?;

    if keep_tokens {
        write_tokens(file, out_dir, &class_name, &tokens)?;
    }

    let vm = CompilationEngine::new(class_name.clone(), TokenStream::new(tokens))
        .compile_class()
        .map_err(|e| e.to_string())?;

    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let out_path = dir.join(format!("{}.vm", class_name));
    fs::write(&out_path, vm).map_err(|e| format!("failed to write {}: {}", out_path.display(), e))
}

fn write_tokens(
    file: &Path,
    out_dir: Option<&Path>,
    class_name: &str,
    tokens: &[Token],
) -> Result<(), String> {
    let dir = out_dir
        .map(Path::to_path_buf)
        .or_else(|| file.parent().map(Path::to_path_buf))
        .unwrap_or_else(|| PathBuf::from("."));
    let out_path = dir.join(format!("{}.tokens", class_name));
    let dump: String = tokens
        .iter()
        .map(|t| format!("{} {}\n", token_kind_name(t.kind), t.lexeme))
        .collect();
    fs::write(&out_path, dump)
        .map_err(|e| format!("failed to write {}: {}", out_path.display(), e))
}

fn token_kind_name(kind: TokenKind) -> &'static str {
    match kind {
        TokenKind::Keyword => "KEYWORD",
        TokenKind::Symbol => "SYMBOL",
        TokenKind::Identifier => "IDENTIFIER",
        TokenKind::IntConst => "INT_CONST",
        TokenKind::StringConst => "STRING_CONST",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[test]
    fn directory_scan_is_non_recursive_and_sorted() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("Main.jack"), "class Main {}").unwrap();
        fs::write(dir.path().join("Foo.jack"), "class Foo {}").unwrap();
        fs::write(dir.path().join("notes.txt"), "ignore me").unwrap();
        fs::create_dir(dir.path().join("nested")).unwrap();
        fs::write(dir.path().join("nested/Hidden.jack"), "class Hidden {}").unwrap();

        let found = jack_files_under(dir.path());
        let names: Vec<String> = found
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["Foo.jack", "Main.jack"]);
    }

    #[test]
    fn single_file_path_is_returned_as_is() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Main.jack");
        fs::write(&file, "class Main {}").unwrap();

        assert_eq!(jack_files_under(&file), vec![file]);
    }

    #[test]
    fn compile_one_writes_a_vm_file_next_to_the_source() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Main.jack");
        fs::write(&file, "class Main { function void main() { return; } }").unwrap();

        compile_one(&file, None, false).unwrap();

        let vm = fs::read_to_string(dir.path().join("Main.vm")).unwrap();
        assert_eq!(vm, "function Main.main 0\npush constant 0\nreturn\n");
    }

    #[test]
    fn compile_one_reports_compile_errors_without_writing_output() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Wrong.jack");
        fs::write(&file, "class Main { function void main() { return; } }").unwrap();

        let err = compile_one(&file, None, false).unwrap_err();
        assert!(err.contains("does not match"));
        assert!(!dir.path().join("Wrong.vm").exists());
    }

    #[test]
    fn keep_tokens_writes_kind_and_lexeme_pairs() {
        let dir = tempdir().unwrap();
        let file = dir.path().join("Main.jack");
        fs::write(&file, "class Main {}").unwrap();

        compile_one(&file, None, true).unwrap();

        let dump = fs::read_to_string(dir.path().join("Main.tokens")).unwrap();
        assert_eq!(dump, "KEYWORD class\nIDENTIFIER Main\nSYMBOL {\nSYMBOL }\n");
    }
}
