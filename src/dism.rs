// ============================================
// dism.rs - DISM command dispatch and output scraping
// ============================================
//
// This module owns every `dism` invocation the tool makes:
//   - Listing installed packages (/Get-Packages)
//   - Installing language pack CABs (/Add-Package)
//   - Removing language packages (/Remove-Package)
//   - Enabling .NET Framework features (/Enable-Feature)
//
// DISM's output is plain text, so the other half of this module is
// scraping: picking package identities out of lines like
//
//   Package Identity : Microsoft-Windows-Client-LanguagePack-Package~31bf3856ad364e35~amd64~de-DE~10.0.22621.1
//
// All parsing functions are pure (text in, records out) so they can be
// unit tested without a Windows servicing stack.
// ============================================

use anyhow::{Context, Result};
use std::path::Path;
use std::process::Command;

#[cfg(windows)]
use std::os::windows::process::CommandExt;

/// Don't flash a console window when spawning servicing commands
#[cfg(windows)]
const CREATE_NO_WINDOW: u32 = 0x0800_0000;

// ============================================
// COMMAND EXECUTION
// ============================================

/// Captured result of one external servicing command.
/// A nonzero exit code is data for the operation log, not an error.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: i32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run an external command with hidden window and captured output.
/// Returns Err only when the process could not be started at all
/// (e.g. dism.exe not on PATH). Shared with the PowerShell and restart
/// modules so every servicing child gets the same window suppression.
pub(crate) fn run_captured(program: &str, args: &[String]) -> Result<CommandOutput> {
    let mut cmd = Command::new(program);
    cmd.args(args);
    #[cfg(windows)]
    cmd.creation_flags(CREATE_NO_WINDOW);

    let output = cmd
        .output()
        .with_context(|| format!("failed to run {}", program))?;

    Ok(CommandOutput {
        // No exit code means the process was killed by a signal;
        // report it as a generic failure code
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

/// Check whether dism.exe is on the PATH (startup probe).
pub fn is_dism_available() -> bool {
    let check = Command::new("where").arg("dism").output();
    if let Ok(output) = check {
        return output.status.success();
    }
    false
}

// ============================================
// ARGUMENT TEMPLATES
// ============================================
// Each user action maps to exactly one fixed DISM argument template.
// Kept as builders so the templates can be asserted in tests.

pub fn get_packages_args() -> Vec<String> {
    vec!["/online".into(), "/Get-Packages".into()]
}

pub fn add_package_args(cab_path: &Path) -> Vec<String> {
    vec![
        "/online".into(),
        "/Add-Package".into(),
        format!("/PackagePath:{}", cab_path.display()),
        "/Quiet".into(),
        "/NoRestart".into(),
    ]
}

pub fn remove_package_args(identity: &str) -> Vec<String> {
    vec![
        "/online".into(),
        "/Remove-Package".into(),
        format!("/PackageName:{}", identity),
    ]
}

pub fn enable_feature_args(feature: &str, source: &Path) -> Vec<String> {
    vec![
        "/Online".into(),
        "/Enable-Feature".into(),
        format!("/FeatureName:{}", feature),
        "/All".into(),
        "/LimitAccess".into(),
        format!("/Source:{}", source.display()),
    ]
}

/// The .NET Framework servicing features the Features page enables, in order.
pub const DOTNET_FEATURES: &[&str] = &["NetFx3", "WCF-HTTP-Activation", "WCF-NonHTTP-Activation"];

// ============================================
// DISM OPERATIONS
// ============================================

/// Run `dism /online /Get-Packages` and return its raw stdout.
pub fn get_packages_output() -> Result<String> {
    let output = run_captured("dism", &get_packages_args())?;
    if !output.success() {
        anyhow::bail!(
            "dism /Get-Packages failed (exit code {}): {}",
            output.exit_code,
            output.stderr.trim()
        );
    }
    Ok(output.stdout)
}

/// Install one language pack CAB: `dism /online /Add-Package ...`
pub fn add_package(cab_path: &Path) -> Result<CommandOutput> {
    run_captured("dism", &add_package_args(cab_path))
}

/// Remove one package by identity: `dism /online /Remove-Package ...`
pub fn remove_package(identity: &str) -> Result<CommandOutput> {
    run_captured("dism", &remove_package_args(identity))
}

/// Enable one Windows feature from a local source directory.
pub fn enable_feature(feature: &str, source: &Path) -> Result<CommandOutput> {
    run_captured("dism", &enable_feature_args(feature, source))
}

// ============================================
// OUTPUT SCRAPING
// ============================================

/// Strip the "Package Identity : " prefix from a Get-Packages line.
/// Lines without the prefix are returned trimmed but otherwise untouched.
pub fn strip_identity_prefix(line: &str) -> String {
    let cleaned = line.trim();
    if cleaned
        .to_ascii_lowercase()
        .starts_with("package identity")
    {
        if let Some(colon) = cleaned.find(':') {
            return cleaned[colon + 1..].trim().to_string();
        }
    }
    cleaned.to_string()
}

/// Case-insensitive substring check (DISM output casing varies by locale).
fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    haystack
        .to_ascii_lowercase()
        .contains(&needle.to_ascii_lowercase())
}

/// Check page: every non-blank Get-Packages line mentioning the language
/// tag, with the identity prefix stripped where present.
pub fn packages_for_language(output: &str, tag: &str) -> Vec<String> {
    let mut found = Vec::new();
    for raw in output.lines() {
        if raw.trim().is_empty() || !contains_ignore_case(raw, tag) {
            continue;
        }
        found.push(strip_identity_prefix(raw));
    }
    found
}

/// Package name fragments that mark a package as language-related.
/// Only packages matching one of these are ever removed - the tag filter
/// alone would also match unrelated servicing packages.
const LANGUAGE_PACKAGE_MARKERS: &[&str] = &[
    "LanguagePack-Package",
    "LanguageFeatures-Basic",
    "LanguageFeatures-Handwriting",
    "LanguageFeatures-OCR",
    "LanguageFeatures-Speech",
    "LanguageFeatures-TextToSpeech",
];

/// Is this package identity a language pack or language feature?
pub fn is_language_related(identity: &str) -> bool {
    LANGUAGE_PACKAGE_MARKERS
        .iter()
        .any(|marker| identity.contains(marker))
}

/// Remove page: the package identities to delete for a language tag.
/// Only identity lines are considered, and only language-related
/// packages survive the filter.
pub fn removable_language_packages(output: &str, tag: &str) -> Vec<String> {
    let mut packages = Vec::new();
    for line in output.lines() {
        if line.trim().is_empty()
            || !contains_ignore_case(line, tag)
            || !line.contains("Package Identity")
        {
            continue;
        }
        let identity = strip_identity_prefix(line);
        if is_language_related(&identity) {
            packages.push(identity);
        }
    }
    packages
}

/// Refresh page: the language tags of all installed language packs.
///
/// Identity lines look like
///   Package Identity : Microsoft-Windows-Client-LanguagePack-Package~31bf3856ad364e35~amd64~de-DE~10.0.22621.1
/// so the tag is the fourth tilde-delimited field. Duplicates are dropped
/// (a language can ship several LanguagePack packages).
pub fn installed_language_tags(output: &str) -> Vec<String> {
    let mut tags: Vec<String> = Vec::new();
    for line in output.lines() {
        if !contains_ignore_case(line, "LanguagePack") {
            continue;
        }
        let parts: Vec<&str> = line.split('~').collect();
        if parts.len() >= 4 {
            let tag = parts[3].trim().to_string();
            if !tag.is_empty() && !tags.contains(&tag) {
                tags.push(tag);
            }
        }
    }
    tags
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    /// A trimmed-down but realistic `dism /online /Get-Packages` output.
    const SAMPLE_OUTPUT: &str = "\
Deployment Image Servicing and Management tool
Version: 10.0.22621.1

Image Version: 10.0.22621.1

Packages listing:

Package Identity : Microsoft-Windows-Client-LanguagePack-Package~31bf3856ad364e35~amd64~de-DE~10.0.22621.1
State : Installed
Release Type : Language Pack
Install Time : 21.03.2024 09:15

Package Identity : Microsoft-Windows-LanguageFeatures-Basic-de-de-Package~31bf3856ad364e35~amd64~~10.0.22621.1
State : Installed
Release Type : OnDemand Pack
Install Time : 21.03.2024 09:18

Package Identity : Microsoft-Windows-LanguageFeatures-OCR-de-de-Package~31bf3856ad364e35~amd64~~10.0.22621.1
State : Installed

Package Identity : Microsoft-Windows-Client-LanguagePack-Package~31bf3856ad364e35~amd64~sv-SE~10.0.22621.1
State : Installed

Package Identity : Microsoft-Windows-Foundation-Package~31bf3856ad364e35~amd64~~10.0.22621.1
State : Installed

The operation completed successfully.
";

    #[test]
    fn test_strip_identity_prefix() {
        assert_eq!(
            strip_identity_prefix("Package Identity : Some-Package~123"),
            "Some-Package~123"
        );
        // Lowercase prefix still stripped (locale-dependent output)
        assert_eq!(
            strip_identity_prefix("package identity : Some-Package"),
            "Some-Package"
        );
        // Non-identity lines just get trimmed
        assert_eq!(strip_identity_prefix("  State : Installed  "), "State : Installed");
    }

    #[test]
    fn test_packages_for_language() {
        let found = packages_for_language(SAMPLE_OUTPUT, "de-DE");
        // Identity line plus the two de-de feature lines (case-insensitive match)
        assert_eq!(found.len(), 3);
        assert!(found[0].starts_with("Microsoft-Windows-Client-LanguagePack-Package"));
        assert!(found.iter().all(|line| !line.contains("Package Identity")));
    }

    #[test]
    fn test_packages_for_language_no_match() {
        assert!(packages_for_language(SAMPLE_OUTPUT, "fr-FR").is_empty());
    }

    #[test]
    fn test_is_language_related() {
        assert!(is_language_related(
            "Microsoft-Windows-Client-LanguagePack-Package~31bf3856ad364e35~amd64~de-DE~10.0.22621.1"
        ));
        assert!(is_language_related(
            "Microsoft-Windows-LanguageFeatures-TextToSpeech-sv-se-Package~...~amd64~~10.0.22621.1"
        ));
        // Foundation package mentions no language marker
        assert!(!is_language_related(
            "Microsoft-Windows-Foundation-Package~31bf3856ad364e35~amd64~~10.0.22621.1"
        ));
    }

    #[test]
    fn test_removable_language_packages() {
        let packages = removable_language_packages(SAMPLE_OUTPUT, "de-de");
        assert_eq!(packages.len(), 3);
        // The Foundation package never shows up even though other tags do
        assert!(packages.iter().all(|p| is_language_related(p)));

        let none = removable_language_packages(SAMPLE_OUTPUT, "ja-JP");
        assert!(none.is_empty());
    }

    #[test]
    fn test_installed_language_tags() {
        let tags = installed_language_tags(SAMPLE_OUTPUT);
        // Only the LanguagePack identity lines carry a tag in field 3;
        // the LanguageFeatures lines have an empty fourth field
        assert_eq!(tags, vec!["de-DE", "sv-SE"]);
    }

    #[test]
    fn test_installed_language_tags_deduplicates() {
        let doubled = format!("{}{}", SAMPLE_OUTPUT, SAMPLE_OUTPUT);
        assert_eq!(installed_language_tags(&doubled), vec!["de-DE", "sv-SE"]);
    }

    #[test]
    fn test_argument_templates() {
        assert_eq!(get_packages_args(), vec!["/online", "/Get-Packages"]);

        let add = add_package_args(&PathBuf::from(r"D:\packs\lp_de-de.cab"));
        assert_eq!(add[1], "/Add-Package");
        assert!(add[2].starts_with("/PackagePath:"));
        assert!(add[2].ends_with("lp_de-de.cab"));
        assert_eq!(&add[3..], &["/Quiet", "/NoRestart"]);

        let remove = remove_package_args("Some-Package~123~amd64~de-DE~1.0");
        assert_eq!(
            remove,
            vec![
                "/online",
                "/Remove-Package",
                "/PackageName:Some-Package~123~amd64~de-DE~1.0"
            ]
        );

        let enable = enable_feature_args("NetFx3", &PathBuf::from(r"E:\sources\sxs"));
        assert_eq!(enable[2], "/FeatureName:NetFx3");
        assert!(enable.contains(&"/LimitAccess".to_string()));
        assert!(enable[5].starts_with("/Source:"));
    }

    #[test]
    fn test_dotnet_feature_order() {
        // NetFx3 must come first - the WCF activation features depend on it
        assert_eq!(DOTNET_FEATURES[0], "NetFx3");
        assert_eq!(DOTNET_FEATURES.len(), 3);
    }

    /// Run against the live servicing stack:
    /// cargo test test_live_get_packages -- --nocapture --ignored
    #[test]
    #[ignore] // Requires Windows with dism.exe on the PATH
    fn test_live_get_packages() {
        let output = get_packages_output().expect("dism should run");
        println!("Get-Packages returned {} bytes", output.len());
        let tags = installed_language_tags(&output);
        println!("Installed language tags: {:?}", tags);
        assert!(output.contains("Package Identity"));
    }
}
