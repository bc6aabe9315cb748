// ============================================
// Language Pack Manager - main.rs
// ============================================
// This is the entry point of the application.
//
// The program flow is:
// 1. main() starts
// 2. Create the UI window from the Slint file
// 3. Load the language list and probe for dism.exe
// 4. Set up callbacks (what happens when buttons are clicked)
// 5. Run the UI event loop (keeps the window open)
//
// Every servicing action follows the same shape:
//   - The callback checks the busy gate and reads its inputs from the UI
//   - The external command runs on a background thread so the UI stays
//     responsive (DISM can take minutes per package)
//   - Results and log lines come back to the UI thread via
//     slint::invoke_from_event_loop on a weak UI handle
// ============================================

// Include the compiled Slint UI code
// This macro reads the generated code from build.rs
slint::include_modules!();

use slint::{Color, Model, ModelRc, SharedString, VecModel};
use std::path::PathBuf;
use std::rc::Rc;
use std::sync::{Arc, Mutex};

// Our modules
mod config; // Supported language list (+ languages.toml override)
mod dism; // DISM invocation and output scraping
mod oplog; // Timestamped, severity-colored operation log
mod packs; // CAB folder scanning for the Install page
mod restart; // Restart guard and shutdown
mod winlang; // PowerShell user language list refresh

use oplog::{LogEntry, Severity};

/// The operation log entries, shared with worker threads so every append
/// lands in the same ordered list the export buttons read from.
/// Locked only on the UI thread (appends all happen there), so the mutex
/// is never contended.
type LogStore = Arc<Mutex<Vec<LogEntry>>>;

// ============================================
// LOG PLUMBING
// ============================================

/// Map a log severity to the color used in the UI log pane.
fn severity_color(severity: Severity) -> Color {
    let (r, g, b) = severity.rgb();
    Color::from_rgb_u8(r, g, b)
}

/// Append one entry to the operation log: the shared store, the UI list,
/// and the console mirror. Must be called on the UI thread.
fn append_log(ui: &MainWindow, store: &LogStore, severity: Severity, message: &str) {
    let entry = LogEntry::new(severity, message);
    entry.mirror_to_console();

    let line = LogLine {
        text: entry.display_line().into(),
        color: severity_color(severity),
    };
    let model = ui.get_log_lines();
    if let Some(vec) = model.as_any().downcast_ref::<VecModel<LogLine>>() {
        vec.push(line);
    }

    if let Ok(mut entries) = store.lock() {
        entries.push(entry);
    }
}

/// Append a log entry from a background thread.
/// Queues the append onto the UI event loop; ordering is preserved
/// because the event loop runs queued closures in FIFO order.
fn log_from_worker(ui: &slint::Weak<MainWindow>, store: &LogStore, severity: Severity, message: String) {
    let ui = ui.clone();
    let store = store.clone();
    let _ = slint::invoke_from_event_loop(move || {
        if let Some(ui) = ui.upgrade() {
            append_log(&ui, &store, severity, &message);
        }
    });
}

/// Clear the busy flag and set the status line, from a background thread.
fn finish_from_worker(ui: &slint::Weak<MainWindow>, status: String) {
    let ui = ui.clone();
    let _ = slint::invoke_from_event_loop(move || {
        if let Some(ui) = ui.upgrade() {
            ui.set_busy(false);
            ui.set_status_text(status.into());
        }
    });
}

/// Convert a scanned CAB file into its UI row.
fn pack_to_item(pack: &packs::CabPack) -> PackItem {
    PackItem {
        file_name: pack.file_name.as_str().into(),
        language_tag: pack.language_tag.as_str().into(),
        path: pack.path.display().to_string().into(),
        selected: pack.selected,
    }
}

/// Recompute the has-selected-packs flag from the Install page model.
fn update_has_selected(ui: &MainWindow) {
    let model = ui.get_install_packs();
    let any = model.iter().any(|item| item.selected);
    ui.set_has_selected_packs(any);
}

/// Helper: set the selected flag on every listed pack.
fn set_all_packs(win: &MainWindow, selected: bool) {
    let model = win.get_install_packs();
    for i in 0..model.row_count() {
        if let Some(mut item) = model.row_data(i) {
            item.selected = selected;
            model.set_row_data(i, item);
        }
    }
    win.set_has_selected_packs(selected && model.row_count() > 0);
}

/// Build a Slint string model from a list of Rust strings.
fn string_model(items: &[String]) -> ModelRc<SharedString> {
    Rc::new(VecModel::from(
        items
            .iter()
            .map(|s| SharedString::from(s.as_str()))
            .collect::<Vec<_>>(),
    ))
    .into()
}

// ============================================
// MAIN FUNCTION
// ============================================

fn main() -> Result<(), slint::PlatformError> {
    // Print startup message to console (helpful for debugging)
    println!("============================================");
    println!("Language Pack Manager v{}", env!("CARGO_PKG_VERSION"));
    println!("============================================");
    println!("EXE: {:?}", std::env::current_exe().unwrap_or_default());
    println!("App directory: {:?}", config::app_directory());

    // Create the main window from the Slint UI definition
    // MainWindow is defined in src/ui/main.slint
    let ui = MainWindow::new()?;
    ui.set_version(format!("v{}", env!("CARGO_PKG_VERSION")).into());

    // ============================================
    // SET UP UI STATE
    // ============================================

    // The operation log starts empty; the store backs the copy/save buttons
    let log_store: LogStore = Arc::new(Mutex::new(Vec::new()));
    ui.set_log_lines(ModelRc::from(Rc::new(VecModel::<LogLine>::default())));
    ui.set_check_results(ModelRc::from(Rc::new(VecModel::<SharedString>::default())));
    ui.set_install_packs(ModelRc::from(Rc::new(VecModel::<PackItem>::default())));

    // Language list: built-in defaults, or languages.toml next to the EXE
    let languages = config::supported_languages();
    println!("Supported languages: {:?}", languages);
    // The Check/Remove selectors start empty: the user picks from the
    // list or types a tag by hand before running anything
    ui.set_languages(string_model(&languages));

    // Probe for dism.exe (synchronous, but `where` returns instantly)
    let dism_found = dism::is_dism_available();
    ui.set_dism_found(dism_found);
    if dism_found {
        println!("dism.exe found on PATH");
    } else {
        append_log(
            &ui,
            &log_store,
            Severity::Warning,
            "dism.exe was not found on the PATH - servicing operations will fail.",
        );
    }

    // ============================================
    // SET UP CALLBACKS
    // ============================================
    // Callbacks connect UI buttons to Rust functions.
    // When a button is clicked in the UI, the corresponding callback runs.

    // Clone the UI handle for use in callbacks
    // (Rust ownership rules require this)
    let ui_handle = ui.as_weak();

    // ============================================
    // CHECK PAGE
    // ============================================

    // Callback: Check installed packages for the selected language
    ui.on_check_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                append_log(&win, &store, Severity::Warning, "An operation is already running.");
                return;
            }
            let Some(tag) = config::effective_tag(&win.get_check_language()) else {
                append_log(&win, &store, Severity::Warning, "Please select or enter a language code.");
                return;
            };

            println!("Check clicked for {}", tag);
            win.set_busy(true);
            win.set_status_text(format!("Checking packages for {}...", tag).into());
            append_log(
                &win,
                &store,
                Severity::Info,
                &format!("Checking installed packages for {}...", tag),
            );
            // Clear the previous result list
            win.set_check_results(ModelRc::from(Rc::new(VecModel::<SharedString>::default())));

            // Run DISM in a background thread (it's slow)
            let ui_bg = ui.clone();
            let store_bg = store.clone();
            std::thread::spawn(move || {
                let result = dism::get_packages_output()
                    .map(|output| dism::packages_for_language(&output, &tag));

                let _ = slint::invoke_from_event_loop(move || {
                    let Some(win) = ui_bg.upgrade() else { return };
                    match result {
                        Ok(found) => {
                            for identity in &found {
                                append_log(&win, &store_bg, Severity::Detail, &format!("Found: {}", identity));
                            }
                            if found.is_empty() {
                                append_log(
                                    &win,
                                    &store_bg,
                                    Severity::Detail,
                                    &format!("No packages found for {}.", tag),
                                );
                            }
                            win.set_check_results(string_model(&found));
                            append_log(
                                &win,
                                &store_bg,
                                Severity::Success,
                                &format!("Check completed for {}.", tag),
                            );
                            win.set_status_text(format!("Check completed for {}", tag).into());
                        }
                        Err(e) => {
                            append_log(
                                &win,
                                &store_bg,
                                Severity::Error,
                                &format!("Error occurred while checking packages: {}", e),
                            );
                            win.set_status_text("Check failed".into());
                        }
                    }
                    win.set_busy(false);
                });
            });
        }
    });

    // ============================================
    // INSTALL PAGE
    // ============================================

    // Callback: Browse for a folder of CAB files
    // Runs on the main thread (rfd works on the main thread)
    ui.on_browse_folder_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                return;
            }
            println!("Install: Browse folder clicked");

            let Some(folder) = packs::pick_cab_folder() else {
                return; // user cancelled
            };
            win.set_install_folder(folder.display().to_string().into());

            match packs::scan_cab_folder(&folder) {
                Ok(list) => {
                    append_log(
                        &win,
                        &store,
                        Severity::Info,
                        &format!("{} CAB files found in {}.", list.len(), folder.display()),
                    );
                    let items: Vec<PackItem> = list.iter().map(pack_to_item).collect();
                    win.set_install_packs(ModelRc::from(Rc::new(VecModel::from(items))));
                    win.set_has_selected_packs(false);
                    win.set_status_text(format!("{} CAB files listed", list.len()).into());
                }
                Err(e) => {
                    append_log(
                        &win,
                        &store,
                        Severity::Error,
                        &format!("Selected folder could not be scanned: {}", e),
                    );
                }
            }
        }
    });

    // Callback: A pack's checkbox was toggled
    ui.on_pack_toggled({
        let ui = ui_handle.clone();
        move |index, checked| {
            let Some(win) = ui.upgrade() else { return };
            let model = win.get_install_packs();
            if let Some(mut item) = model.row_data(index as usize) {
                item.selected = checked;
                model.set_row_data(index as usize, item);
            }
            update_has_selected(&win);
        }
    });

    // Callback: Select all / Deselect all
    ui.on_select_all_clicked({
        let ui = ui_handle.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            set_all_packs(&win, true);
        }
    });
    ui.on_deselect_all_clicked({
        let ui = ui_handle.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            set_all_packs(&win, false);
        }
    });

    // Callback: Install the selected packs, one DISM call each
    ui.on_install_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                append_log(&win, &store, Severity::Warning, "An operation is already running.");
                return;
            }

            // Collect (filename, path) for every ticked pack
            let selected: Vec<(String, PathBuf)> = win
                .get_install_packs()
                .iter()
                .filter(|item| item.selected)
                .map(|item| (item.file_name.to_string(), PathBuf::from(item.path.to_string())))
                .collect();
            if selected.is_empty() {
                append_log(&win, &store, Severity::Warning, "No packs selected.");
                return;
            }

            println!("Install clicked: {} packs", selected.len());
            win.set_busy(true);
            win.set_status_text(format!("Installing {} pack(s)...", selected.len()).into());

            let ui_bg = ui.clone();
            let store_bg = store.clone();
            std::thread::spawn(move || {
                for (file_name, path) in &selected {
                    log_from_worker(
                        &ui_bg,
                        &store_bg,
                        Severity::Info,
                        format!("Installing {}...", file_name),
                    );

                    match dism::add_package(path) {
                        Ok(output) if output.success() => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Success,
                                format!("Successfully installed {}", file_name),
                            );
                        }
                        Ok(output) => {
                            // One failure doesn't stop the rest of the list
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!(
                                    "Failed to install {} (ExitCode {}). Output: {} Error: {}",
                                    file_name,
                                    output.exit_code,
                                    output.stdout.trim(),
                                    output.stderr.trim()
                                ),
                            );
                        }
                        Err(e) => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!("Failed to run DISM for {}: {}", file_name, e),
                            );
                        }
                    }
                }

                log_from_worker(
                    &ui_bg,
                    &store_bg,
                    Severity::Success,
                    "Installation process completed.".to_string(),
                );
                finish_from_worker(&ui_bg, "Installation process completed".to_string());
            });
        }
    });

    // ============================================
    // REMOVE PAGE
    // ============================================

    // Callback: Remove all language-related packages for the selected tag
    ui.on_remove_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                append_log(&win, &store, Severity::Warning, "An operation is already running.");
                return;
            }
            let Some(tag) = config::effective_tag(&win.get_remove_language()) else {
                append_log(&win, &store, Severity::Warning, "Please select or enter a language code.");
                return;
            };

            println!("Remove clicked for {}", tag);
            win.set_busy(true);
            win.set_status_text(format!("Removing packages for {}...", tag).into());
            append_log(
                &win,
                &store,
                Severity::Info,
                &format!("Deleting packages for {}...", tag),
            );

            let ui_bg = ui.clone();
            let store_bg = store.clone();
            std::thread::spawn(move || {
                let packages = match dism::get_packages_output() {
                    Ok(output) => dism::removable_language_packages(&output, &tag),
                    Err(e) => {
                        log_from_worker(
                            &ui_bg,
                            &store_bg,
                            Severity::Error,
                            format!("Error occurred while deleting packages: {}", e),
                        );
                        finish_from_worker(&ui_bg, "Removal failed".to_string());
                        return;
                    }
                };

                if packages.is_empty() {
                    log_from_worker(
                        &ui_bg,
                        &store_bg,
                        Severity::Detail,
                        format!("No language-related packages found for {}.", tag),
                    );
                }

                for identity in &packages {
                    log_from_worker(
                        &ui_bg,
                        &store_bg,
                        Severity::Warning,
                        format!("Removing: {}", identity),
                    );

                    match dism::remove_package(identity) {
                        Ok(output) if output.success() => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Success,
                                format!("Successfully removed {}", identity),
                            );
                        }
                        Ok(output) => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!(
                                    "Failed to remove {} (ExitCode {}). Output: {} Error: {}",
                                    identity,
                                    output.exit_code,
                                    output.stdout.trim(),
                                    output.stderr.trim()
                                ),
                            );
                        }
                        Err(e) => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!("Failed to run DISM for {}: {}", identity, e),
                            );
                        }
                    }
                }

                log_from_worker(
                    &ui_bg,
                    &store_bg,
                    Severity::Success,
                    format!("Deletion completed for {}.", tag),
                );
                finish_from_worker(&ui_bg, format!("Deletion completed for {}", tag));
            });
        }
    });

    // ============================================
    // REFRESH PAGE
    // ============================================

    // Callback: Register installed language packs in the user language list
    ui.on_refresh_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        let supported = languages.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                append_log(&win, &store, Severity::Warning, "An operation is already running.");
                return;
            }

            println!("Refresh clicked");
            win.set_busy(true);
            win.set_status_text("Refreshing user language list...".into());

            let ui_bg = ui.clone();
            let store_bg = store.clone();
            let supported = supported.clone();
            std::thread::spawn(move || {
                let installed = match dism::get_packages_output() {
                    Ok(output) => dism::installed_language_tags(&output),
                    Err(e) => {
                        log_from_worker(&ui_bg, &store_bg, Severity::Error, format!("Exception: {}", e));
                        finish_from_worker(&ui_bg, "Refresh failed".to_string());
                        return;
                    }
                };

                if installed.is_empty() {
                    log_from_worker(
                        &ui_bg,
                        &store_bg,
                        Severity::Error,
                        "No installed language packs found.".to_string(),
                    );
                    finish_from_worker(&ui_bg, "No installed language packs found".to_string());
                    return;
                }

                for tag in winlang::tags_to_refresh(&installed, &supported) {
                    log_from_worker(
                        &ui_bg,
                        &store_bg,
                        Severity::Detail,
                        format!("Refreshing UI for {}...", tag),
                    );

                    match winlang::run_refresh(&tag) {
                        Ok(output) => {
                            // The script prints what it did; relay it
                            for line in output.stdout.lines().filter(|l| !l.trim().is_empty()) {
                                log_from_worker(&ui_bg, &store_bg, Severity::Info, line.to_string());
                            }
                            for line in output.stderr.lines().filter(|l| !l.trim().is_empty()) {
                                log_from_worker(
                                    &ui_bg,
                                    &store_bg,
                                    Severity::Error,
                                    format!("PowerShell error: {}", line),
                                );
                            }
                        }
                        Err(e) => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!("Failed to run PowerShell: {}", e),
                            );
                        }
                    }
                }

                log_from_worker(
                    &ui_bg,
                    &store_bg,
                    Severity::Success,
                    "Refresh process completed.".to_string(),
                );
                finish_from_worker(&ui_bg, "Refresh process completed".to_string());
            });
        }
    });

    // ============================================
    // FEATURES PAGE
    // ============================================

    // Callback: Browse for the .NET feature source folder (via a CAB in it)
    ui.on_browse_feature_source_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                return;
            }
            println!("Features: Browse source clicked");

            if let Some(source) = packs::pick_feature_source() {
                win.set_feature_source(source.display().to_string().into());
                append_log(
                    &win,
                    &store,
                    Severity::Info,
                    &format!("Selected source path: {}", source.display()),
                );
            }
        }
    });

    // Callback: Enable the .NET Framework features from the chosen source
    ui.on_enable_features_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                append_log(&win, &store, Severity::Warning, "An operation is already running.");
                return;
            }
            let source = win.get_feature_source().to_string();
            if source.trim().is_empty() {
                append_log(&win, &store, Severity::Warning, "Please select a feature source folder first.");
                return;
            }

            println!("Enable features clicked, source: {}", source);
            win.set_busy(true);
            win.set_status_text("Enabling .NET features...".into());

            let ui_bg = ui.clone();
            let store_bg = store.clone();
            std::thread::spawn(move || {
                let source = PathBuf::from(source);
                for feature in dism::DOTNET_FEATURES {
                    log_from_worker(
                        &ui_bg,
                        &store_bg,
                        Severity::Detail,
                        format!("Enabling feature: {}", feature),
                    );

                    match dism::enable_feature(feature, &source) {
                        Ok(output) if output.success() => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Success,
                                format!("Feature {} enabled successfully.", feature),
                            );
                        }
                        Ok(output) => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!(
                                    "Failed to enable {} (ExitCode {}). Error: {}",
                                    feature,
                                    output.exit_code,
                                    output.stderr.trim()
                                ),
                            );
                        }
                        Err(e) => {
                            log_from_worker(
                                &ui_bg,
                                &store_bg,
                                Severity::Error,
                                format!("Failed to run DISM for {}: {}", feature, e),
                            );
                        }
                    }
                }

                log_from_worker(
                    &ui_bg,
                    &store_bg,
                    Severity::Success,
                    "All features processed.".to_string(),
                );
                finish_from_worker(&ui_bg, "All features processed".to_string());
            });
        }
    });

    // ============================================
    // RESTART GUARD
    // ============================================

    // Callback: Restart button - check the process table first, then show
    // the confirmation (escalated when servicing processes are running).
    // Allowed even while busy: our own operation counts as a reason to warn.
    ui.on_restart_clicked({
        let ui = ui_handle.clone();
        move || {
            println!("Restart clicked - checking for running servicing processes");
            let ui_bg = ui.clone();
            std::thread::spawn(move || {
                let running = restart::running_servicing_processes();
                let prompt = restart::build_restart_prompt(&running);

                let _ = slint::invoke_from_event_loop(move || {
                    if let Some(win) = ui_bg.upgrade() {
                        win.set_restart_escalated(prompt.escalated);
                        win.set_restart_message(prompt.message.into());
                        win.set_restart_confirm_visible(true);
                    }
                });
            });
        }
    });

    // Callback: user confirmed the restart
    ui.on_restart_confirmed({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            win.set_restart_confirm_visible(false);
            println!("Restart confirmed - running shutdown /r /t 0");

            match restart::restart_computer() {
                Ok(()) => {
                    win.set_status_text("Restarting...".into());
                }
                Err(e) => {
                    append_log(
                        &win,
                        &store,
                        Severity::Error,
                        &format!("Failed to initiate restart: {}", e),
                    );
                }
            }
        }
    });

    // Callback: user cancelled the restart dialog
    ui.on_restart_cancelled({
        let ui = ui_handle.clone();
        move || {
            if let Some(win) = ui.upgrade() {
                win.set_restart_confirm_visible(false);
            }
        }
    });

    // ============================================
    // LOG EXPORT
    // ============================================

    // Callback: Copy the whole operation log to the clipboard
    ui.on_copy_log_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            // Export only while idle, like every other button
            if win.get_busy() {
                return;
            }
            let text = match store.lock() {
                Ok(entries) => oplog::entries_to_text(&entries),
                Err(_) => return,
            };

            match arboard::Clipboard::new() {
                Ok(mut clipboard) => match clipboard.set_text(&text) {
                    Ok(()) => {
                        win.set_status_text("Log copied to clipboard".into());
                    }
                    Err(e) => {
                        win.set_status_text(format!("Failed to copy: {}", e).into());
                    }
                },
                Err(e) => {
                    win.set_status_text(format!("Clipboard unavailable: {}", e).into());
                }
            }
        }
    });

    // Callback: Save the operation log as JSON
    // The save dialog runs on the main thread (rfd requirement)
    ui.on_save_log_clicked({
        let ui = ui_handle.clone();
        let store = log_store.clone();
        move || {
            let Some(win) = ui.upgrade() else { return };
            if win.get_busy() {
                return;
            }

            let Some(path) = rfd::FileDialog::new()
                .set_title("Save operation log")
                .add_filter("JSON files", &["json"])
                .set_file_name("langpack-log.json")
                .save_file()
            else {
                return; // user cancelled
            };

            let json = match store.lock() {
                Ok(entries) => oplog::entries_to_json(&entries),
                Err(_) => return,
            };

            let result = json.and_then(|text| {
                std::fs::write(&path, text)
                    .map_err(|e| anyhow::anyhow!("could not write {}: {}", path.display(), e))
            });
            match result {
                Ok(()) => {
                    append_log(
                        &win,
                        &store,
                        Severity::Success,
                        &format!("Log saved to {}", path.display()),
                    );
                }
                Err(e) => {
                    append_log(&win, &store, Severity::Error, &format!("Failed to save log: {}", e));
                }
            }
        }
    });

    // ============================================
    // RUN THE UI EVENT LOOP
    // ============================================
    // This blocks until the window is closed.
    ui.run()
}
