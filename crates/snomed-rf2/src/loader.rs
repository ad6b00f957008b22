//! RF2 file discovery and loading utilities.

use std::fs::{self, File};
use std::io::{BufRead, BufReader};
use std::path::{Path, PathBuf};

use crate::types::{Rf2Error, Rf2Files, Rf2Result};

/// Discovers RF2 files in a SNOMED CT release directory.
///
/// Searches for the Snapshot/Terminology directory and locates
/// concept, description, and relationship files. Also searches
/// for MRCM reference set files in Refset/Metadata.
pub fn discover_rf2_files<P: AsRef<Path>>(path: P) -> Rf2Result<Rf2Files> {
    let path = path.as_ref();

    if !path.exists() {
        return Err(Rf2Error::DirectoryNotFound {
            path: path.display().to_string(),
        });
    }

    // Try to find the Terminology directory
    let terminology_dir = find_terminology_dir(path)?;

    let mut files = Rf2Files::new();

    // Scan for RF2 files in Terminology directory
    for entry in fs::read_dir(&terminology_dir)? {
        let entry = entry?;
        let filename = entry.file_name();
        let filename_str = filename.to_string_lossy();

        if !filename_str.ends_with(".txt") {
            continue;
        }

        if filename_str.starts_with("sct2_Concept_Snapshot") {
            files.concept_file = Some(entry.path());
            // Extract release date from filename
            if let Some(date) = extract_release_date(&filename_str) {
                files.release_date = Some(date);
            }
        } else if filename_str.starts_with("sct2_Description_Snapshot") {
            files.description_file = Some(entry.path());
        } else if filename_str.starts_with("sct2_Relationship_Snapshot") {
            files.relationship_file = Some(entry.path());
        } else if filename_str.starts_with("sct2_StatedRelationship_Snapshot") {
            files.stated_relationship_file = Some(entry.path());
        } else if filename_str.starts_with("sct2_TextDefinition_Snapshot") {
            files.text_definition_file = Some(entry.path());
        } else if filename_str.contains("RelationshipConcreteValues") {
            files.concrete_relationship_file = Some(entry.path());
        }
    }

    // Refset files live under Snapshot/Refset/{Language,Content,Map,Metadata,...}.
    if let Some(snapshot_dir) = terminology_dir.parent() {
        let refset_dir = snapshot_dir.join("Refset");
        if refset_dir.exists() {
            let metadata_dir = refset_dir.join("Metadata");
            if metadata_dir.exists() {
                discover_mrcm_files(&metadata_dir, &mut files)?;
            }
            discover_refset_files(&refset_dir, &mut files)?;
        }
    }

    if !files.has_required_files() {
        let missing = files.missing_files();
        return Err(Rf2Error::RequiredFileMissing {
            file_type: missing.join(", "),
            directory: terminology_dir.display().to_string(),
        });
    }

    Ok(files)
}

/// Discovers MRCM reference set files in a Metadata directory.
fn discover_mrcm_files(metadata_dir: &Path, files: &mut Rf2Files) -> Rf2Result<()> {
    if !metadata_dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(metadata_dir)? {
        let entry = entry?;
        let filename = entry.file_name();
        let filename_str = filename.to_string_lossy();

        if !filename_str.ends_with(".txt") {
            continue;
        }

        if filename_str.contains("MRCMDomainSnapshot") && !filename_str.contains("ModuleScope") {
            files.mrcm_domain = Some(entry.path());
        } else if filename_str.contains("MRCMAttributeDomainSnapshot") {
            files.mrcm_attribute_domain = Some(entry.path());
        } else if filename_str.contains("MRCMAttributeRangeSnapshot") {
            files.mrcm_attribute_range = Some(entry.path());
        }
    }

    Ok(())
}

/// Walks every subdirectory of `Refset/` and classifies each `.txt` file by
/// its header row, per §4.1's "recognises RF2 files by filename pattern"
/// contract generalised to the header itself (content refset filenames
/// don't encode their schema as distinctly as `Language`/`Association` do).
/// A schema that matches none of the named variants falls back to the
/// generic bucket, parsed later via [`crate::refset::parse_generic_refset_file`].
fn discover_refset_files(refset_dir: &Path, files: &mut Rf2Files) -> Rf2Result<()> {
    let mut stack = vec![refset_dir.to_path_buf()];
    while let Some(dir) = stack.pop() {
        for entry in fs::read_dir(&dir)? {
            let entry = entry?;
            let path = entry.path();
            if entry.file_type()?.is_dir() {
                stack.push(path);
                continue;
            }

            let filename = entry.file_name();
            let filename_str = filename.to_string_lossy();
            if !filename_str.ends_with(".txt") {
                continue;
            }
            // MRCM files were already classified by filename in discover_mrcm_files.
            if filename_str.contains("MRCM") {
                continue;
            }

            match peek_header(&path)? {
                Some(header) => classify_refset_header(&header, path, files),
                None => files.generic_refset_files.push(path),
            }
        }
    }
    Ok(())
}

fn classify_refset_header(header: &[String], path: PathBuf, files: &mut Rf2Files) {
    let last = header.last().map(String::as_str).unwrap_or("");
    match (header.len(), last) {
        (7, "acceptabilityId") => files.language_refset_files.push(path),
        (7, "targetComponentId") => files.association_refset_files.push(path),
        (7, "owlExpression") => files.owl_expression_files.push(path),
        (6, "referencedComponentId") => files.simple_refset_files.push(path),
        _ => files.generic_refset_files.push(path),
    }
}

/// Reads and tab-splits the header line of an RF2 file, stripping a
/// leading UTF-8 BOM. Returns `None` for an empty or unreadable file rather
/// than failing outright, since `list`/discovery should be best-effort.
fn peek_header(path: &Path) -> Rf2Result<Option<Vec<String>>> {
    let file = File::open(path)?;
    let mut reader = BufReader::new(file);
    let mut line = String::new();
    if reader.read_line(&mut line)? == 0 {
        return Ok(None);
    }
    let line = line.trim_end_matches(['\n', '\r']).trim_start_matches('\u{feff}');
    Ok(Some(line.split('\t').map(str::to_string).collect()))
}

/// Finds the Terminology directory within an RF2 release structure.
fn find_terminology_dir(base: &Path) -> Rf2Result<PathBuf> {
    // Check if base is already the Terminology directory
    if base.ends_with("Terminology") && base.is_dir() {
        return Ok(base.to_path_buf());
    }

    // Check for Snapshot/Terminology
    let snapshot_term = base.join("Snapshot").join("Terminology");
    if snapshot_term.exists() {
        return Ok(snapshot_term);
    }

    // Check for just Terminology
    let term = base.join("Terminology");
    if term.exists() {
        return Ok(term);
    }

    // Search one level deep for a directory containing the structure
    for entry in fs::read_dir(base)? {
        let entry = entry?;
        if entry.file_type()?.is_dir() {
            let subdir = entry.path();

            // Check subdir/Snapshot/Terminology
            let sub_snapshot_term = subdir.join("Snapshot").join("Terminology");
            if sub_snapshot_term.exists() {
                return Ok(sub_snapshot_term);
            }

            // Check subdir/Terminology
            let sub_term = subdir.join("Terminology");
            if sub_term.exists() {
                return Ok(sub_term);
            }
        }
    }

    Err(Rf2Error::DirectoryNotFound {
        path: format!("Terminology directory not found in {}", base.display()),
    })
}

/// Extracts release date from RF2 filename.
///
/// RF2 files have names like `sct2_Concept_Snapshot_INT_20251201.txt`
fn extract_release_date(filename: &str) -> Option<String> {
    let without_ext = filename.trim_end_matches(".txt");
    let parts: Vec<&str> = without_ext.split('_').collect();

    if let Some(&last) = parts.last() {
        if last.len() == 8 && last.chars().all(|c| c.is_ascii_digit()) {
            return Some(last.to_string());
        }
    }

    None
}

/// Formats a byte count as a human-readable string.
pub fn format_bytes(bytes: usize) -> String {
    const KB: usize = 1024;
    const MB: usize = KB * 1024;
    const GB: usize = MB * 1024;

    if bytes >= GB {
        format!("{:.2} GB", bytes as f64 / GB as f64)
    } else if bytes >= MB {
        format!("{:.2} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.2} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_release_date() {
        assert_eq!(
            extract_release_date("sct2_Concept_Snapshot_INT_20251201.txt"),
            Some("20251201".to_string())
        );
        assert_eq!(
            extract_release_date("sct2_Description_Snapshot-en_INT_20251201.txt"),
            Some("20251201".to_string())
        );
        assert_eq!(extract_release_date("invalid_filename.txt"), None);
    }

    #[test]
    fn test_format_bytes() {
        assert_eq!(format_bytes(500), "500 bytes");
        assert_eq!(format_bytes(1024), "1.00 KB");
        assert_eq!(format_bytes(1536), "1.50 KB");
        assert_eq!(format_bytes(1024 * 1024), "1.00 MB");
        assert_eq!(format_bytes(1024 * 1024 * 1024), "1.00 GB");
    }

    #[test]
    fn test_classify_refset_header_by_trailing_column() {
        let mut files = Rf2Files::new();
        let base = &[
            "id".to_string(),
            "effectiveTime".to_string(),
            "active".to_string(),
            "moduleId".to_string(),
            "refsetId".to_string(),
            "referencedComponentId".to_string(),
        ];

        let simple = base.to_vec();
        classify_refset_header(&simple, PathBuf::from("simple.txt"), &mut files);
        assert_eq!(files.simple_refset_files.len(), 1);

        let mut language = base.to_vec();
        language.push("acceptabilityId".to_string());
        classify_refset_header(&language, PathBuf::from("lang.txt"), &mut files);
        assert_eq!(files.language_refset_files.len(), 1);

        let mut association = base.to_vec();
        association.push("targetComponentId".to_string());
        classify_refset_header(&association, PathBuf::from("assoc.txt"), &mut files);
        assert_eq!(files.association_refset_files.len(), 1);

        let mut owl = base.to_vec();
        owl.push("owlExpression".to_string());
        classify_refset_header(&owl, PathBuf::from("owl.txt"), &mut files);
        assert_eq!(files.owl_expression_files.len(), 1);

        let mut generic = base.to_vec();
        generic.push("mapTarget".to_string());
        classify_refset_header(&generic, PathBuf::from("map.txt"), &mut files);
        assert_eq!(files.generic_refset_files.len(), 1);
    }

    #[test]
    fn test_peek_header_strips_bom_and_splits_tabs() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.txt");
        fs::write(&path, "\u{feff}id\teffectiveTime\tactive\n100\t20200101\t1\n").unwrap();

        let header = peek_header(&path).unwrap().unwrap();
        assert_eq!(header, vec!["id", "effectiveTime", "active"]);
    }

    #[test]
    fn test_discover_refset_files_walks_subdirectories() {
        let dir = tempfile::tempdir().unwrap();
        let language_dir = dir.path().join("Language");
        fs::create_dir_all(&language_dir).unwrap();
        fs::write(
            language_dir.join("der2_cRefset_LanguageSnapshot-en_INT_20251201.txt"),
            "id\teffectiveTime\tactive\tmoduleId\trefsetId\treferencedComponentId\tacceptabilityId\n",
        )
        .unwrap();

        let mut files = Rf2Files::new();
        discover_refset_files(dir.path(), &mut files).unwrap();
        assert_eq!(files.language_refset_files.len(), 1);
    }
}
