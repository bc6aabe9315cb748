// ============================================
// Language Pack Manager - build.rs
// ============================================
// This file runs BEFORE the main program is compiled.
// It does two things:
// 1. Compile the Slint UI file (.slint) into Rust code
// 2. Embed the Windows icon into the EXE (so it shows in File Explorer/taskbar)
// ============================================

fn main() {
    // Step 1: Compile the main Slint UI file
    // This converts src/ui/main.slint into Rust code that main.rs can use
    if let Err(e) = slint_build::compile("src/ui/main.slint") {
        eprintln!("============================================");
        eprintln!("ERROR: Failed to compile Slint UI");
        eprintln!("============================================");
        eprintln!("{}", e);
        eprintln!();
        eprintln!("Make sure src/ui/main.slint exists and has valid syntax.");
        eprintln!("============================================");

        // Exit with error code so the build fails
        std::process::exit(1);
    }

    // Step 2: Embed the Windows icon into the EXE
    // Only runs on Windows targets (skipped on other platforms),
    // and only when the icon file is actually present.
    #[cfg(target_os = "windows")]
    {
        if std::path::Path::new("assets/icon.ico").exists() {
            let mut res = winres::WindowsResource::new();
            res.set_icon("assets/icon.ico");
            if let Err(e) = res.compile() {
                eprintln!("Warning: Failed to embed Windows icon: {}", e);
                // The app works fine without an icon
            }
        }
    }
}
