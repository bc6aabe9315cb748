// ============================================
// restart.rs - Restart guard
// ============================================
// Language packs only fully apply after a reboot, so the UI offers a
// restart button. Restarting while DISM is still grinding through a
// package would leave the component store in a bad state, so before
// showing the confirmation we check the process table for servicing
// processes and escalate the warning if any are found.
//
// The check is advisory, not a lock: if the process table can't be read
// we fall back to the plain confirmation rather than blocking the user.
// ============================================

use crate::dism::run_captured;
use anyhow::Result;

// ============================================
// PROCESS NAME SET
// ============================================

/// Process names (without ".exe") that indicate a servicing operation is
/// still in flight. Add names here if the tool ever invokes more.
pub const SERVICING_PROCESS_NAMES: &[&str] = &[
    "dism",     // Deployment Image Servicing and Management
    "dismhost", // Child processes used by DISM
    "lpksetup", // Legacy language pack installer (may still appear)
    "wusa",     // Windows Update Standalone Installer
];

// ============================================
// PROCESS TABLE SCRAPING
// ============================================

/// Pull the image names out of `tasklist /FO CSV /NH` output.
///
/// Each data line looks like:
///   "dism.exe","4242","Console","1","48,212 K"
/// The image name is the first quoted field. Lines that don't start with
/// a quote (e.g. tasklist's "INFO: ..." message) are skipped.
pub fn parse_tasklist_names(csv: &str) -> Vec<String> {
    let mut names = Vec::new();
    for line in csv.lines() {
        let line = line.trim();
        let Some(rest) = line.strip_prefix('"') else {
            continue;
        };
        if let Some(end) = rest.find('"') {
            let name = &rest[..end];
            if !name.is_empty() {
                names.push(name.to_string());
            }
        }
    }
    names
}

/// Which servicing processes appear in the given image-name list?
/// Matching ignores case and the ".exe" suffix. The result uses our
/// canonical names, sorted and deduplicated, ready for the dialog text.
pub fn match_servicing_processes(image_names: &[String]) -> Vec<String> {
    let mut found: Vec<String> = Vec::new();
    for image in image_names {
        // ".exe" can show up in any case mix ("Dism.Exe"), so the
        // suffix strip has to ignore case too
        let stem = if image.len() > 4
            && image.is_char_boundary(image.len() - 4)
            && image[image.len() - 4..].eq_ignore_ascii_case(".exe")
        {
            &image[..image.len() - 4]
        } else {
            image.as_str()
        };
        for name in SERVICING_PROCESS_NAMES {
            if stem.eq_ignore_ascii_case(name) && !found.contains(&name.to_string()) {
                found.push(name.to_string());
            }
        }
    }
    found.sort();
    found
}

/// Enumerate running servicing processes right now.
/// Any failure reads as "nothing running" - see the module comment.
pub fn running_servicing_processes() -> Vec<String> {
    let args: Vec<String> = vec!["/FO".into(), "CSV".into(), "/NH".into()];
    match run_captured("tasklist", &args) {
        Ok(output) if output.success() => {
            match_servicing_processes(&parse_tasklist_names(&output.stdout))
        }
        Ok(output) => {
            eprintln!(
                "Warning: tasklist failed (exit code {}), skipping restart guard",
                output.exit_code
            );
            Vec::new()
        }
        Err(e) => {
            eprintln!("Warning: could not run tasklist: {}", e);
            Vec::new()
        }
    }
}

// ============================================
// CONFIRMATION PROMPT
// ============================================

/// What the restart confirmation dialog should show.
#[derive(Debug, Clone)]
pub struct RestartPrompt {
    /// True when servicing processes were detected (stronger warning)
    pub escalated: bool,
    pub message: String,
}

/// Build the confirmation text, escalated if servicing processes run.
pub fn build_restart_prompt(running: &[String]) -> RestartPrompt {
    if running.is_empty() {
        return RestartPrompt {
            escalated: false,
            message: "Are you sure you want to restart the computer?".to_string(),
        };
    }

    let details = running.join(", ");
    RestartPrompt {
        escalated: true,
        message: format!(
            "It looks like a system operation is still running \
             (e.g., DISM / language pack installation / feature enablement).\n\n\
             Detected process(es): {}\n\n\
             Restarting now may interrupt it and leave the system in an \
             inconsistent state.\n\n\
             Do you still want to restart the computer?",
            details
        ),
    }
}

// ============================================
// RESTART
// ============================================

/// Restart the machine immediately: `shutdown /r /t 0`.
pub fn restart_computer() -> Result<()> {
    let args: Vec<String> = vec!["/r".into(), "/t".into(), "0".into()];
    let output = run_captured("shutdown", &args)?;
    if !output.success() {
        anyhow::bail!(
            "shutdown failed (exit code {}): {}",
            output.exit_code,
            output.stderr.trim()
        );
    }
    Ok(())
}

// ============================================
// TESTS
// ============================================

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE_TASKLIST: &str = "\
\"System Idle Process\",\"0\",\"Services\",\"0\",\"8 K\"
\"explorer.exe\",\"5216\",\"Console\",\"1\",\"151,208 K\"
\"Dism.exe\",\"4242\",\"Console\",\"1\",\"48,212 K\"
\"DismHost.exe\",\"4260\",\"Services\",\"0\",\"22,104 K\"
\"DismHost.exe\",\"4261\",\"Services\",\"0\",\"21,816 K\"
INFO: some informational line without quotes
\"powershell.exe\",\"901\",\"Console\",\"1\",\"80,040 K\"
";

    #[test]
    fn test_parse_tasklist_names() {
        let names = parse_tasklist_names(SAMPLE_TASKLIST);
        assert_eq!(names.len(), 6);
        assert_eq!(names[0], "System Idle Process");
        assert_eq!(names[2], "Dism.exe");
        // The INFO line is skipped
        assert!(names.iter().all(|n| !n.starts_with("INFO")));
    }

    #[test]
    fn test_match_servicing_processes() {
        let names = parse_tasklist_names(SAMPLE_TASKLIST);
        let running = match_servicing_processes(&names);
        // Case-insensitive, ".exe" stripped, duplicates collapsed, sorted
        assert_eq!(running, vec!["dism", "dismhost"]);
    }

    #[test]
    fn test_match_mixed_case_exe_suffix() {
        let names = vec![
            "Dism.Exe".to_string(),
            "WUSA.EXE".to_string(),
            "lpksetup".to_string(),
        ];
        assert_eq!(
            match_servicing_processes(&names),
            vec!["dism", "lpksetup", "wusa"]
        );
    }

    #[test]
    fn test_match_nothing_running() {
        let names = vec!["explorer.exe".to_string(), "notepad.exe".to_string()];
        assert!(match_servicing_processes(&names).is_empty());
    }

    #[test]
    fn test_plain_prompt() {
        let prompt = build_restart_prompt(&[]);
        assert!(!prompt.escalated);
        assert_eq!(prompt.message, "Are you sure you want to restart the computer?");
    }

    #[test]
    fn test_escalated_prompt() {
        let prompt =
            build_restart_prompt(&["dism".to_string(), "wusa".to_string()]);
        assert!(prompt.escalated);
        assert!(prompt.message.contains("Detected process(es): dism, wusa"));
        assert!(prompt.message.contains("inconsistent state"));
        assert!(prompt.message.ends_with("restart the computer?"));
    }
}
