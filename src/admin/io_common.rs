use std::path::{Path, PathBuf};

use crate::admin::*;

/// The name of the file, without its directory. Used as the file name of the upload.
pub fn simplify_file_name(path: &str) -> String {
    Path::new(path)
        .file_name()
        .and_then(|n| n.to_str())
        .unwrap_or(path)
        .to_string()
}

/// Paths in a job file are relative to the job file itself.
pub fn resolve_path(root: &Path, path: &str) -> String {
    let p = Path::new(path);
    if p.is_absolute() {
        path.to_string()
    } else {
        let full: PathBuf = root.join(p);
        full.to_string_lossy().into_owned()
    }
}

pub fn read_bytes(path: &str) -> AdminResult<Vec<u8>> {
    fs::read(path).context(OpeningFileSnafu { path })
}

/// Writes to the given file, or to the standard output when no file is given or
/// when the file is 'stdout'.
pub fn write_output(out: Option<&str>, content: &str) -> AdminResult<()> {
    match out {
        None | Some("stdout") => {
            println!("{}", content);
            Ok(())
        }
        Some(path) => {
            info!("write_output: writing {} bytes to {}", content.len(), path);
            fs::write(path, content).context(WritingFileSnafu { path })
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn file_names() {
        assert_eq!(simplify_file_name("/data/in/divisions.csv"), "divisions.csv");
        assert_eq!(simplify_file_name("parties.xlsx"), "parties.xlsx");
    }

    #[test]
    fn relative_paths() {
        let root = Path::new("/jobs/2024");
        assert_eq!(resolve_path(root, "divisions.csv"), "/jobs/2024/divisions.csv");
        assert_eq!(resolve_path(root, "/data/parties.csv"), "/data/parties.csv");
    }
}
