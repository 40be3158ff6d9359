use crate::error::ExtractionError;
use crate::models::RawFile;
use std::fs;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Recursively find PDF files under `folder`, sorted for deterministic
/// batch ordering.
pub fn discover_pdf_files(folder: &Path) -> Vec<PathBuf> {
    let mut files = Vec::new();

    for entry in WalkDir::new(folder)
        .into_iter()
        .filter_map(|item| item.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }

        let is_pdf = entry
            .path()
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"));

        if is_pdf {
            files.push(entry.path().to_path_buf());
        }
    }

    files.sort_unstable();
    files
}

/// Read every PDF under `folder` into an in-memory batch for the ingestion
/// entrypoints.
pub fn read_pdf_batch(folder: &Path) -> Result<Vec<RawFile>, ExtractionError> {
    let mut files = Vec::new();

    for path in discover_pdf_files(folder) {
        let bytes = fs::read(&path).map_err(|error| ExtractionError::Io {
            source_id: path.display().to_string(),
            details: error.to_string(),
        })?;

        let name = path
            .file_name()
            .and_then(|name| name.to_str())
            .map(str::to_string)
            .unwrap_or_else(|| path.display().to_string());

        files.push(RawFile::new(name, bytes));
    }

    Ok(files)
}

#[cfg(test)]
mod tests {
    use super::{discover_pdf_files, read_pdf_batch};
    use std::fs::{self, File};
    use std::io::Write;
    use tempfile::tempdir;

    #[test]
    fn discovery_is_recursive_and_sorted() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        let base = dir.path();
        let nested = base.join("nested");
        fs::create_dir(&nested)?;

        File::create(base.join("b.pdf")).and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(nested.join("a.pdf"))
            .and_then(|mut file| file.write_all(b"%PDF-1.4\n%fake"))?;
        File::create(base.join("notes.txt")).and_then(|mut file| file.write_all(b"not a pdf"))?;

        let files = discover_pdf_files(base);
        assert_eq!(files.len(), 2);
        Ok(())
    }

    #[test]
    fn batch_reading_keeps_filenames_and_bytes() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        fs::write(dir.path().join("visit.pdf"), b"%PDF-1.4\n%fake")?;

        let batch = read_pdf_batch(dir.path())?;
        assert_eq!(batch.len(), 1);
        assert_eq!(batch[0].name, "visit.pdf");
        assert_eq!(batch[0].bytes, b"%PDF-1.4\n%fake");
        Ok(())
    }

    #[test]
    fn empty_folder_yields_empty_batch() -> Result<(), Box<dyn std::error::Error>> {
        let dir = tempdir()?;
        assert!(read_pdf_batch(dir.path())?.is_empty());
        Ok(())
    }
}
