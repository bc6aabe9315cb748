// ============================================
// packs.rs - Language pack CAB files on disk
// ============================================
// The Install page works from a folder of .cab files the user has
// downloaded (e.g. from the Microsoft Update Catalog or a Features on
// Demand ISO). This module:
//   - Opens the native folder picker
//   - Scans the chosen folder (top level only) for CAB files
//   - Guesses the language tag from each filename so the list can be
//     grouped by language
//
// Typical filenames we need to handle:
//   Microsoft-Windows-Client-Language-Pack_x64_de-de.cab
//   Microsoft-Windows-LanguageFeatures-OCR-sv-se-Package~...cab
//   lp.cab                                  (no tag at all)
// ============================================

use anyhow::Result;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Shown for CABs whose filename carries no recognizable language tag.
pub const UNKNOWN_LANGUAGE: &str = "unknown";

// ============================================
// PACK LIST MODEL
// ============================================

/// One CAB file found in the selected folder.
#[derive(Debug, Clone)]
pub struct CabPack {
    /// Filename only, e.g. "Microsoft-Windows-...-de-de.cab"
    pub file_name: String,
    /// Full path, handed to DISM as /PackagePath
    pub path: PathBuf,
    /// Language tag guessed from the filename, e.g. "de-DE", or "unknown"
    pub language_tag: String,
    /// Whether the user ticked this pack for installation
    pub selected: bool,
}

// ============================================
// FOLDER PICKING
// ============================================

/// Open the native folder picker for the Install page.
/// Runs on the main thread (rfd requirement). None = user cancelled.
pub fn pick_cab_folder() -> Option<PathBuf> {
    rfd::FileDialog::new()
        .set_title("Select a folder containing language pack CAB files")
        .pick_folder()
}

/// Open the native file picker for the Features page.
/// The user picks any CAB inside their source folder; DISM wants the
/// *directory* as /Source, so we return the parent.
pub fn pick_feature_source() -> Option<PathBuf> {
    let cab = rfd::FileDialog::new()
        .set_title("Select a CAB file in the .NET feature source folder")
        .add_filter("CAB files", &["cab"])
        .pick_file()?;
    cab.parent().map(|p| p.to_path_buf())
}

// ============================================
// FOLDER SCANNING
// ============================================

/// List the CAB files in a folder (top level only, like the file manager
/// view the user just looked at). Results are sorted by language tag,
/// then filename, so packs for the same language sit together.
pub fn scan_cab_folder(folder: &Path) -> Result<Vec<CabPack>> {
    if !folder.is_dir() {
        anyhow::bail!("folder does not exist: {}", folder.display());
    }

    let mut packs = Vec::new();

    for entry in WalkDir::new(folder)
        .min_depth(1)
        .max_depth(1)
        .into_iter()
        .filter_map(|e| e.ok())
    {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();
        let is_cab = path
            .extension()
            .map(|ext| ext.eq_ignore_ascii_case("cab"))
            .unwrap_or(false);
        if !is_cab {
            continue;
        }

        let file_name = entry.file_name().to_string_lossy().to_string();
        let language_tag = extract_language_tag(&file_name);

        packs.push(CabPack {
            file_name,
            path: path.to_path_buf(),
            language_tag,
            selected: false,
        });
    }

    packs.sort_by(|a, b| {
        (a.language_tag.as_str(), a.file_name.as_str())
            .cmp(&(b.language_tag.as_str(), b.file_name.as_str()))
    });

    Ok(packs)
}

// ============================================
// LANGUAGE TAG EXTRACTION
// ============================================

/// Guess the language tag from a CAB filename.
///
/// Looks for an xx-XX token (two letters, hyphen, two letters) whose
/// neighbors are not letters, so "de-de" in "..._x64_de-de.cab" matches
/// but the "ws-Cl" inside "Windows-Client" does not. The result is
/// normalized to the usual ll-CC casing ("de-de" -> "de-DE").
pub fn extract_language_tag(file_name: &str) -> String {
    let bytes = file_name.as_bytes();
    let is_letter = |i: usize| bytes.get(i).map(|b| b.is_ascii_alphabetic()).unwrap_or(false);

    for i in 0..bytes.len().saturating_sub(4) {
        let shape_matches = is_letter(i)
            && is_letter(i + 1)
            && bytes[i + 2] == b'-'
            && is_letter(i + 3)
            && is_letter(i + 4);
        if !shape_matches {
            continue;
        }
        // The token must stand alone: no letter directly before or after
        if i > 0 && is_letter(i - 1) {
            continue;
        }
        if is_letter(i + 5) {
            continue;
        }

        let lang = file_name[i..i + 2].to_ascii_lowercase();
        let region = file_name[i + 3..i + 5].to_ascii_uppercase();
        return format!("{}-{}", lang, region);
    }

    UNKNOWN_LANGUAGE.to_string()
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    #[test]
    fn test_extract_language_tag() {
        assert_eq!(
            extract_language_tag("Microsoft-Windows-Client-Language-Pack_x64_de-de.cab"),
            "de-DE"
        );
        assert_eq!(extract_language_tag("lp_sv-SE.cab"), "sv-SE");
        // Already-normalized tags pass through unchanged
        assert_eq!(extract_language_tag("something_ja-JP_v2.cab"), "ja-JP");
    }

    #[test]
    fn test_extract_language_tag_ignores_embedded_hyphens() {
        // "Windows-Client" must not yield "ws-CL"
        assert_eq!(extract_language_tag("Microsoft-Windows-Client.cab"), UNKNOWN_LANGUAGE);
        assert_eq!(extract_language_tag("lp.cab"), UNKNOWN_LANGUAGE);
        assert_eq!(extract_language_tag(""), UNKNOWN_LANGUAGE);
    }

    #[test]
    fn test_extract_language_tag_at_string_start() {
        assert_eq!(extract_language_tag("fr-FR_pack.cab"), "fr-FR");
    }

    #[test]
    fn test_extract_language_tag_normalizes_case() {
        assert_eq!(extract_language_tag("pack_DE-de.cab"), "de-DE");
        assert_eq!(extract_language_tag("pack_ZH-CN.cab"), "zh-CN");
    }

    #[test]
    fn test_scan_cab_folder() {
        // Build a throwaway folder with a mix of files
        let dir = std::env::temp_dir().join(format!(
            "langpack-manager-test-{}-{:?}",
            std::process::id(),
            std::thread::current().id()
        ));
        let sub = dir.join("nested");
        fs::create_dir_all(&sub).unwrap();

        fs::write(dir.join("lp_sv-SE.cab"), b"x").unwrap();
        fs::write(dir.join("lp_de-de.cab"), b"x").unwrap();
        fs::write(dir.join("readme.txt"), b"x").unwrap();
        fs::write(dir.join("Other.CAB"), b"x").unwrap();
        // CABs in subfolders must NOT be picked up (top level only)
        fs::write(sub.join("lp_fr-FR.cab"), b"x").unwrap();

        let packs = scan_cab_folder(&dir).unwrap();
        let names: Vec<&str> = packs.iter().map(|p| p.file_name.as_str()).collect();

        // Sorted by tag then filename; extension match is case-insensitive;
        // the txt file and the nested CAB are absent
        assert_eq!(names, vec!["lp_de-de.cab", "lp_sv-SE.cab", "Other.CAB"]);
        assert_eq!(packs[0].language_tag, "de-DE");
        assert_eq!(packs[2].language_tag, UNKNOWN_LANGUAGE);
        assert!(packs.iter().all(|p| !p.selected));

        fs::remove_dir_all(&dir).unwrap();
    }

    #[test]
    fn test_scan_missing_folder() {
        let missing = std::env::temp_dir().join("langpack-manager-no-such-folder");
        assert!(scan_cab_folder(&missing).is_err());
    }
}
