// ============================================
// winlang.rs - Windows user language list refresh
// ============================================
// Installing a language pack CAB doesn't make the language show up in
// Settings > Language - Windows keeps a separate per-user language list.
// The Refresh page fixes that: for every installed language pack whose
// tag is in our supported list, it runs a small PowerShell script that
// adds the tag to the user language list if it isn't there yet.
//
// We deliberately do NOT reimplement Get-WinUserLanguageList - that
// cmdlet is the OS service for this, we just call it.
// ============================================

use crate::dism::{run_captured, CommandOutput};
use anyhow::Result;

// ============================================
// SCRIPT TEMPLATE
// ============================================

/// Build the PowerShell script that registers one language tag in the
/// per-user language list. The script prints one line saying what it did;
/// that line goes straight into the operation log.
pub fn refresh_script(tag: &str) -> String {
    format!(
        r#"
$langList = Get-WinUserLanguageList
if (-not ($langList.LanguageTag -contains '{tag}')) {{
    $langList.Add('{tag}')
    Set-WinUserLanguageList $langList -Force
    'Added {tag} to user interface.'
}} else {{
    'Language {tag} already present.'
}}
"#
    )
}

/// The tags to refresh: installed language packs restricted to the
/// configured language list, in installed order. Tags outside the list
/// are skipped - the user never selected them in this tool.
pub fn tags_to_refresh(installed: &[String], supported: &[String]) -> Vec<String> {
    installed
        .iter()
        .filter(|tag| supported.iter().any(|s| s.eq_ignore_ascii_case(tag)))
        .cloned()
        .collect()
}

// ============================================
// EXECUTION
// ============================================

/// Run the refresh script for one tag.
/// stdout carries the script's status line(s); stderr carries any
/// PowerShell errors. Both are relayed to the operation log by the caller.
pub fn run_refresh(tag: &str) -> Result<CommandOutput> {
    run_captured(
        "powershell",
        &["-Command".to_string(), refresh_script(tag)],
    )
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_refresh_script_fills_tag() {
        let script = refresh_script("de-DE");
        assert!(script.contains("Get-WinUserLanguageList"));
        assert!(script.contains("$langList.Add('de-DE')"));
        assert!(script.contains("'Added de-DE to user interface.'"));
        assert!(script.contains("'Language de-DE already present.'"));
        // No leftover placeholders
        assert!(!script.contains("{tag}"));
    }

    #[test]
    fn test_tags_to_refresh_intersects() {
        let installed = vec!["de-DE".to_string(), "pl-PL".to_string(), "sv-SE".to_string()];
        let supported = vec!["en-US".to_string(), "de-DE".to_string(), "sv-SE".to_string()];

        assert_eq!(
            tags_to_refresh(&installed, &supported),
            vec!["de-DE", "sv-SE"]
        );
    }

    #[test]
    fn test_tags_to_refresh_is_case_insensitive() {
        let installed = vec!["de-de".to_string()];
        let supported = vec!["de-DE".to_string()];
        assert_eq!(tags_to_refresh(&installed, &supported), vec!["de-de"]);
    }

    #[test]
    fn test_tags_to_refresh_empty() {
        assert!(tags_to_refresh(&[], &["en-US".to_string()]).is_empty());
    }
}
