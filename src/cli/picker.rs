//! Interactive CSV picker.
//!
//! Used when `--file` (or `FY_FILE`) is not given: lists `*.csv` exports under
//! the working directory and lets the user choose one by number or path.

use std::fs;
use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use crate::error::AppError;

/// Directory recursion depth for finding CSV files.
const SEARCH_DEPTH: usize = 4;

/// Prompt on stdin/stdout for an inspection-history CSV.
pub fn prompt_for_csv_path() -> Result<PathBuf, AppError> {
    let files = discover_csv_files(Path::new("."));
    let stdin = io::stdin();
    let mut stdout = io::stdout();
    pick_csv(&files, &mut stdin.lock(), &mut stdout)
}

/// Run the picker dialogue over arbitrary input/output.
///
/// Accepts a list number or an explicit path; `q` cancels.
pub fn pick_csv<R: BufRead, W: Write>(files: &[PathBuf], input: &mut R, out: &mut W) -> Result<PathBuf, AppError> {
    if files.is_empty() {
        return Err(AppError::input(
            "No .csv files found. Provide one with `fy analyze --file <history.csv>`.",
        ));
    }

    let io_err = |e: io::Error| AppError::input(format!("Picker I/O failed: {e}"));

    writeln!(out, "Found {} CSV file(s):", files.len()).map_err(io_err)?;
    for (idx, path) in files.iter().enumerate() {
        writeln!(out, "{:>3}) {}", idx + 1, display_path(path)).map_err(io_err)?;
    }

    loop {
        write!(out, "Select a file (1-{}), type a path, or q to quit: ", files.len()).map_err(io_err)?;
        out.flush().map_err(io_err)?;

        let mut line = String::new();
        if input.read_line(&mut line).map_err(io_err)? == 0 {
            return Err(AppError::input("No input received. Pass the CSV with `--file`."));
        }

        let answer = line.trim();
        if answer.eq_ignore_ascii_case("q") {
            return Err(AppError::input("Canceled."));
        }

        if let Ok(choice) = answer.parse::<usize>() {
            match files.get(choice.wrapping_sub(1)) {
                Some(path) => return validate_csv_path(path),
                None => {
                    writeln!(out, "No file #{choice}.").map_err(io_err)?;
                    continue;
                }
            }
        }

        match validate_csv_path(Path::new(answer)) {
            Ok(path) => return Ok(path),
            Err(err) => writeln!(out, "{err}").map_err(io_err)?,
        }
    }
}

/// Validate that `path` is an existing `.csv` file.
pub fn validate_csv_path(path: &Path) -> Result<PathBuf, AppError> {
    if !path.exists() {
        return Err(AppError::input(format!("CSV file not found: {}", path.display())));
    }
    if path.is_dir() {
        return Err(AppError::input(format!("Expected a file, got a directory: {}", path.display())));
    }
    if !has_csv_extension(path) {
        return Err(AppError::input(format!("Expected a .csv file (got: {})", path.display())));
    }
    Ok(path.to_path_buf())
}

/// `*.csv` files under `root`, sorted by displayed path.
pub fn discover_csv_files(root: &Path) -> Vec<PathBuf> {
    let mut out = Vec::new();
    walk(root, 0, &mut out);
    out.sort_by_key(|p| display_path(p));
    out
}

fn walk(dir: &Path, depth: usize, out: &mut Vec<PathBuf>) {
    if depth > SEARCH_DEPTH {
        return;
    }
    let Ok(entries) = fs::read_dir(dir) else {
        return;
    };

    for entry in entries.flatten() {
        let path = entry.path();
        let Ok(file_type) = entry.file_type() else {
            continue;
        };
        if file_type.is_dir() {
            let name = path.file_name().and_then(|s| s.to_str()).unwrap_or("");
            if !matches!(name, ".git" | "target" | "node_modules") {
                walk(&path, depth + 1, out);
            }
        } else if file_type.is_file() && has_csv_extension(&path) {
            out.push(path);
        }
    }
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("csv"))
}

fn display_path(path: &Path) -> String {
    path.strip_prefix("./").unwrap_or(path).display().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn fixture_dir() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("b.csv"), "SNumber\n").unwrap();
        fs::write(dir.path().join("notes.txt"), "").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("a.CSV"), "SNumber\n").unwrap();
        fs::create_dir(dir.path().join("target")).unwrap();
        fs::write(dir.path().join("target").join("skip.csv"), "").unwrap();
        dir
    }

    #[test]
    fn discovers_csv_files_and_skips_build_dirs() {
        let dir = fixture_dir();
        let files = discover_csv_files(dir.path());
        let names: Vec<String> = files
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().into_owned())
            .collect();
        assert_eq!(names, vec!["b.csv", "a.CSV"]);
    }

    #[test]
    fn picks_by_number_after_a_bad_answer() {
        let dir = fixture_dir();
        let files = discover_csv_files(dir.path());
        let mut input = Cursor::new("7\n1\n");
        let mut out = Vec::new();
        let picked = pick_csv(&files, &mut input, &mut out).unwrap();
        assert_eq!(picked, files[0]);
        assert!(String::from_utf8(out).unwrap().contains("No file #7."));
    }

    #[test]
    fn quit_and_eof_cancel() {
        let files = vec![PathBuf::from("x.csv")];
        let mut out = Vec::new();
        assert_eq!(pick_csv(&files, &mut Cursor::new("q\n"), &mut out).unwrap_err().message(), "Canceled.");
        assert_eq!(pick_csv(&files, &mut Cursor::new(""), &mut out).unwrap_err().exit_code(), 2);
        assert!(pick_csv(&[], &mut Cursor::new("1\n"), &mut out).is_err());
    }

    #[test]
    fn rejects_non_csv_paths() {
        let dir = fixture_dir();
        assert!(validate_csv_path(&dir.path().join("notes.txt")).is_err());
        assert!(validate_csv_path(dir.path()).is_err());
        assert!(validate_csv_path(&dir.path().join("b.csv")).is_ok());
    }
}
