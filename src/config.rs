// ============================================
// config.rs - Supported language list
// ============================================
// The Check, Remove, and Refresh pages all work against a fixed list of
// language tags ("en-US", "de-DE", ...). The built-in defaults cover the
// languages the tool was written for, and a `languages.toml` file placed
// next to the EXE overrides them.
//
// PORTABLE DESIGN:
// Like everything else in this tool, configuration lives next to the EXE
// so the whole thing can run from a USB stick:
//
//   USB Drive/
//   ├── langpack-manager.exe
//   └── languages.toml          # optional override
//
// The file is never written by the program - the user creates it by hand:
//
//   languages = ["en-US", "de-DE", "nb-NO"]
// ============================================

use serde::Deserialize;
use std::path::PathBuf;

/// Filename of the optional override, stored next to the EXE.
const LANGUAGES_FILE_NAME: &str = "languages.toml";

/// The built-in language tags offered in the UI selectors.
pub const DEFAULT_LANGUAGES: &[&str] = &[
    "en-US", "de-DE", "fr-FR", "it-IT", "ja-JP", "sv-SE", "zh-CN",
];

/// Shape of languages.toml.
#[derive(Debug, Deserialize)]
struct LanguagesFile {
    languages: Vec<String>,
}

/// Get the directory where the EXE lives.
/// Falls back to the current directory if the EXE path can't be determined.
pub fn app_directory() -> PathBuf {
    std::env::current_exe()
        .ok()
        .and_then(|exe| exe.parent().map(|p| p.to_path_buf()))
        .unwrap_or_else(|| PathBuf::from("."))
}

/// The language tags to offer in the UI.
///
/// Reads languages.toml next to the EXE if present; otherwise returns the
/// built-in defaults. A malformed file also falls back to the defaults
/// (with a console warning) - a bad config should never block servicing.
pub fn supported_languages() -> Vec<String> {
    let path = app_directory().join(LANGUAGES_FILE_NAME);

    if path.exists() {
        match std::fs::read_to_string(&path) {
            Ok(text) => match parse_languages_toml(&text) {
                Ok(langs) => {
                    println!("Loaded {} languages from {}", langs.len(), path.display());
                    return langs;
                }
                Err(e) => {
                    eprintln!("Warning: ignoring malformed {}: {}", path.display(), e);
                }
            },
            Err(e) => {
                eprintln!("Warning: could not read {}: {}", path.display(), e);
            }
        }
    }

    DEFAULT_LANGUAGES.iter().map(|s| s.to_string()).collect()
}

/// The tag an operation should act on, from the selector's current text.
/// Tags are picked from the list or typed by hand, so the raw value may
/// carry whitespace or be empty; blank input yields None and the caller
/// asks the user for a tag instead of running a command.
pub fn effective_tag(input: &str) -> Option<String> {
    let tag = input.trim();
    if tag.is_empty() {
        None
    } else {
        Some(tag.to_string())
    }
}

/// Parse the override file. An empty language list counts as malformed -
/// the selectors would be useless without any entries.
fn parse_languages_toml(text: &str) -> anyhow::Result<Vec<String>> {
    let file: LanguagesFile = toml::from_str(text)?;
    if file.languages.is_empty() {
        anyhow::bail!("the languages list is empty");
    }
    Ok(file.languages)
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_valid_tags() {
        for tag in DEFAULT_LANGUAGES {
            // All defaults are xx-XX form
            assert_eq!(tag.len(), 5, "unexpected tag: {}", tag);
            assert_eq!(&tag[2..3], "-");
        }
    }

    #[test]
    fn test_effective_tag_rejects_blank_input() {
        assert_eq!(effective_tag(""), None);
        assert_eq!(effective_tag("   \t"), None);
    }

    #[test]
    fn test_effective_tag_trims() {
        assert_eq!(effective_tag("  de-DE "), Some("de-DE".to_string()));
    }

    #[test]
    fn test_effective_tag_accepts_typed_tags_outside_the_list() {
        // Hand-typed tags are not restricted to DEFAULT_LANGUAGES
        assert_eq!(effective_tag("nb-NO"), Some("nb-NO".to_string()));
    }

    #[test]
    fn test_parse_languages_toml() {
        let langs = parse_languages_toml(r#"languages = ["en-US", "nb-NO"]"#).unwrap();
        assert_eq!(langs, vec!["en-US", "nb-NO"]);
    }

    #[test]
    fn test_parse_rejects_empty_list() {
        assert!(parse_languages_toml("languages = []").is_err());
    }

    #[test]
    fn test_parse_rejects_garbage() {
        assert!(parse_languages_toml("languages = \"en-US\"").is_err());
        assert!(parse_languages_toml("not even toml [[[").is_err());
    }
}
