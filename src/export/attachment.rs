//! Save attachment parts to the output directory without ever clobbering
//! an existing file.

use std::fs::OpenOptions;
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::error::{HarvestError, Result};
use crate::model::MessageId;

/// Name used when a decoded filename has nothing usable left.
const FALLBACK_NAME: &str = "attachment";

/// Write one attachment and return the path it landed at.
///
/// The file goes to `output_dir/<filename>`. When that name is taken, the
/// message identifier is inserted before the extension
/// (`report.pdf` → `report_<id>.pdf`). If the suffixed name is taken as well
/// (the same message processed twice) the write fails; existing files are
/// never overwritten.
pub fn save_attachment(
    output_dir: &Path,
    filename: &str,
    id: &MessageId,
    data: &[u8],
) -> Result<PathBuf> {
    std::fs::create_dir_all(output_dir).map_err(|e| HarvestError::write(output_dir, e))?;

    let name = safe_file_name(filename);
    let path = output_dir.join(&name);

    match write_new(&path, data) {
        Ok(()) => Ok(path),
        Err(e) if e.kind() == ErrorKind::AlreadyExists => {
            let suffixed = output_dir.join(suffixed_name(&name, id));
            debug!(
                existing = %path.display(),
                renamed = %suffixed.display(),
                "Attachment name taken, adding message id"
            );
            write_new(&suffixed, data).map_err(|e| HarvestError::write(&suffixed, e))?;
            Ok(suffixed)
        }
        Err(e) => Err(HarvestError::write(&path, e)),
    }
}

/// Create `path` (failing if it exists) and write `data` into it.
fn write_new(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let mut file = OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(path)?;
    file.write_all(data)
}

/// Reduce a decoded filename to a single path component.
///
/// Directory parts (`../`, `C:\dir\`) are dropped so the file cannot land
/// outside the output directory; control characters are removed.
fn safe_file_name(filename: &str) -> String {
    let last = filename
        .rsplit(['/', '\\'])
        .find(|segment| !segment.trim().is_empty())
        .unwrap_or_default();

    let cleaned: String = last.chars().filter(|c| !c.is_control()).collect();
    let cleaned = cleaned.trim();

    if cleaned.is_empty() || cleaned == "." || cleaned == ".." {
        FALLBACK_NAME.to_string()
    } else {
        cleaned.to_string()
    }
}

/// `name.ext` → `name_<id>.ext`. Only the last extension is split off and
/// leading dots belong to the stem (`.profile` → `.profile_<id>`).
fn suffixed_name(name: &str, id: &MessageId) -> String {
    let (stem, ext) = split_extension(name);
    format!("{stem}_{id}{ext}")
}

fn split_extension(name: &str) -> (&str, &str) {
    let leading_dots = name.len() - name.trim_start_matches('.').len();
    match name[leading_dots..].rfind('.') {
        Some(dot) => name.split_at(leading_dots + dot),
        None => (name, ""),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_extension() {
        assert_eq!(split_extension("report.pdf"), ("report", ".pdf"));
        assert_eq!(split_extension("archive.tar.gz"), ("archive.tar", ".gz"));
        assert_eq!(split_extension("README"), ("README", ""));
        assert_eq!(split_extension(".profile"), (".profile", ""));
        assert_eq!(split_extension("trailing."), ("trailing", "."));
    }

    #[test]
    fn test_suffixed_name() {
        let id = MessageId::from(42);
        assert_eq!(suffixed_name("invoice.pdf", &id), "invoice_42.pdf");
        assert_eq!(suffixed_name("notes", &id), "notes_42");
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("invoice.pdf"), "invoice.pdf");
        assert_eq!(safe_file_name("../../etc/passwd"), "passwd");
        assert_eq!(safe_file_name("C:\\Users\\me\\scan.png"), "scan.png");
        assert_eq!(safe_file_name("dir/"), "dir");
        assert_eq!(safe_file_name("bad\u{0007}name.txt"), "badname.txt");
        assert_eq!(safe_file_name(".."), FALLBACK_NAME);
        assert_eq!(safe_file_name("   "), FALLBACK_NAME);
        assert_eq!(safe_file_name("счёт №1.xlsx"), "счёт №1.xlsx");
    }

    #[test]
    fn test_save_creates_output_dir() {
        let tmp = tempfile::tempdir().unwrap();
        let out = tmp.path().join("nested").join("attachments");
        let path = save_attachment(&out, "a.txt", &MessageId::from(1), b"data").unwrap();
        assert_eq!(path, out.join("a.txt"));
        assert_eq!(std::fs::read(&path).unwrap(), b"data");
    }

    #[test]
    fn test_collision_inserts_message_id() {
        let tmp = tempfile::tempdir().unwrap();
        let existing = tmp.path().join("scan.pdf");
        std::fs::write(&existing, b"original").unwrap();

        let path = save_attachment(tmp.path(), "scan.pdf", &MessageId::from(7), b"new").unwrap();

        assert_eq!(path, tmp.path().join("scan_7.pdf"));
        assert_eq!(std::fs::read(&path).unwrap(), b"new");
        assert_eq!(std::fs::read(&existing).unwrap(), b"original");
    }

    #[test]
    fn test_second_collision_fails_without_overwriting() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("scan.pdf"), b"first").unwrap();
        std::fs::write(tmp.path().join("scan_7.pdf"), b"second").unwrap();

        let err = save_attachment(tmp.path(), "scan.pdf", &MessageId::from(7), b"third")
            .unwrap_err();

        match err {
            HarvestError::AttachmentWrite { path, source } => {
                assert_eq!(path, tmp.path().join("scan_7.pdf"));
                assert_eq!(source.kind(), ErrorKind::AlreadyExists);
            }
            other => panic!("unexpected error: {other}"),
        }
        assert_eq!(std::fs::read(tmp.path().join("scan.pdf")).unwrap(), b"first");
        assert_eq!(std::fs::read(tmp.path().join("scan_7.pdf")).unwrap(), b"second");
    }

    #[test]
    fn test_output_dir_is_a_file() {
        let tmp = tempfile::tempdir().unwrap();
        let blocker = tmp.path().join("blocker");
        std::fs::write(&blocker, b"").unwrap();

        let err = save_attachment(&blocker, "a.txt", &MessageId::from(1), b"x").unwrap_err();
        assert!(matches!(err, HarvestError::AttachmentWrite { .. }));
    }
}
