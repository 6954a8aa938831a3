// ============================================================
// Layer 4 — Corpus Loader
// ============================================================
// Reads UTF-8 corpus files from disk. A missing or unreadable
// file is fatal: there is no useful training run without data.

use std::{fs, path::Path};

use crate::error::{GptError, Result};

/// Read a whole corpus file into memory.
pub fn read_corpus(path: impl AsRef<Path>) -> Result<String> {
    let path = path.as_ref();
    let text = fs::read_to_string(path).map_err(|source| GptError::FileRead {
        path: path.to_path_buf(),
        source,
    })?;
    tracing::debug!("Read corpus '{}' ({} bytes)", path.display(), text.len());
    Ok(text)
}

/// Read a "name<TAB>birthplace" file into (name, birthplace) pairs.
pub fn read_pairs(path: impl AsRef<Path>) -> Result<Vec<(String, String)>> {
    let path = path.as_ref();
    let text = read_corpus(path)?;
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(i, line)| {
            crate::data::names::split_pair(line)
                .map(|(n, p)| (n.to_string(), p.to_string()))
                .ok_or_else(|| {
                    GptError::Corpus(format!(
                        "{}:{}: expected 'name<TAB>birthplace'",
                        path.display(),
                        i + 1
                    ))
                })
        })
        .collect()
}

/// Read an evaluation file: one name per line, optionally followed by
/// a tab and the gold birthplace.
pub fn read_eval_lines(path: impl AsRef<Path>) -> Result<Vec<(String, Option<String>)>> {
    let text = read_corpus(path)?;
    Ok(text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .map(|line| match crate::data::names::split_pair(line) {
            Some((name, place)) => (name.to_string(), Some(place.to_string())),
            None => (line.trim_end_matches('\r').to_string(), None),
        })
        .collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_missing_file_is_file_read_error() {
        let err = read_corpus("/definitely/not/here.txt").unwrap_err();
        assert!(matches!(err, GptError::FileRead { .. }));
    }

    #[test]
    fn test_read_pairs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("dev.tsv");
        let mut f = fs::File::create(&path).unwrap();
        writeln!(f, "Ada Lovelace\tLondon").unwrap();
        writeln!(f).unwrap();
        writeln!(f, "Grace Hopper\tNew York City").unwrap();

        let pairs = read_pairs(&path).unwrap();
        assert_eq!(pairs.len(), 2);
        assert_eq!(pairs[1].1, "New York City");
    }

    #[test]
    fn test_eval_lines_without_gold() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("test.inputs");
        fs::write(&path, "Ada Lovelace\nGrace Hopper\tNew York City\n").unwrap();

        let lines = read_eval_lines(&path).unwrap();
        assert_eq!(lines[0], ("Ada Lovelace".to_string(), None));
        assert_eq!(lines[1].1.as_deref(), Some("New York City"));
    }
}
