//! Native open/save pickers through `rfd`.

use formkit::FileDialog;
use std::path::PathBuf;

/// Which native picker a [`FileDialog`] maps to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PickMode {
    SaveFile,
    File,
    Files,
    Folder,
    Folders,
}

impl PickMode {
    pub fn of(dialog: &FileDialog) -> Self {
        match (dialog.saving, dialog.directories, dialog.multiple) {
            (true, _, _) => PickMode::SaveFile,
            (false, true, true) => PickMode::Folders,
            (false, true, false) => PickMode::Folder,
            (false, false, true) => PickMode::Files,
            (false, false, false) => PickMode::File,
        }
    }
}

fn native(dialog: &FileDialog) -> rfd::FileDialog {
    let mut native = rfd::FileDialog::new();
    if !dialog.title.is_empty() {
        native = native.set_title(dialog.title.as_str());
    }
    if !dialog.message.is_empty() {
        log::debug!("native pickers show no message; dropping {:?}", dialog.message);
    }
    if let Some(directory) = &dialog.start_directory {
        native = native.set_directory(directory);
    }
    if let Some(filename) = &dialog.filename {
        native = native.set_file_name(filename.as_str());
    }
    for filter in &dialog.filters {
        native = native.add_filter(filter.name.as_str(), filter.extensions.as_slice());
    }
    native
}

/// Runs the native picker to completion. `None` when the user backed out.
pub fn pick(dialog: &FileDialog) -> Option<Vec<PathBuf>> {
    let native = native(dialog);
    let picked = match PickMode::of(dialog) {
        PickMode::SaveFile => native.save_file().map(|path| vec![path]),
        PickMode::File => native.pick_file().map(|path| vec![path]),
        PickMode::Files => native.pick_files(),
        PickMode::Folder => native.pick_folder().map(|path| vec![path]),
        PickMode::Folders => native.pick_folders(),
    };

    match &picked {
        Some(paths) => log::debug!("picker {:?} returned {} path(s)", dialog.title, paths.len()),
        None => log::debug!("picker {:?} cancelled", dialog.title),
    }
    picked
}
