//! Open/save dialog description and the handler sequencing every backend
//! shares. Backends only supply the picking chrome.

use crate::dialog::DialogResult;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileFilter {
    pub name: String,
    /// Extensions without the leading dot.
    pub extensions: Vec<String>,
}

impl FileFilter {
    pub fn new<I, S>(name: impl Into<String>, extensions: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            name: name.into(),
            extensions: extensions
                .into_iter()
                .map(|ext| ext.into().trim_start_matches('.').to_string())
                .collect(),
        }
    }

    /// The `accept` attribute value of an HTML file input, e.g. `.png,.jpg`.
    pub fn accept(&self) -> String {
        self.extensions
            .iter()
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(",")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FileDialog {
    pub title: String,
    pub message: String,
    pub start_directory: Option<PathBuf>,
    pub filename: Option<String>,
    pub filters: Vec<FileFilter>,
    pub directories: bool,
    pub saving: bool,
    pub multiple: bool,
}

/// Receives the picked entries in selection order.
pub trait FileHandler {
    /// Returning `false` stops the sequence and fails the dialog.
    fn handle(&mut self, path: &Path) -> bool;
    fn canceled(&mut self) {}
}

impl<F: FnMut(&Path) -> bool> FileHandler for F {
    fn handle(&mut self, path: &Path) -> bool {
        self(path)
    }
}

impl FileDialog {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            ..Self::default()
        }
    }

    pub fn message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    pub fn start_directory(mut self, directory: impl Into<PathBuf>) -> Self {
        self.start_directory = Some(directory.into());
        self
    }

    pub fn filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }

    pub fn filter(mut self, filter: FileFilter) -> Self {
        self.filters.push(filter);
        self
    }

    pub fn directories(mut self, directories: bool) -> Self {
        self.directories = directories;
        self
    }

    pub fn saving(mut self, saving: bool) -> Self {
        self.saving = saving;
        self
    }

    pub fn multiple(mut self, multiple: bool) -> Self {
        self.multiple = multiple;
        self
    }

    /// Feeds a picker's outcome to `handler`. `None` means the user backed
    /// out.
    pub fn dispatch(selection: Option<Vec<PathBuf>>, handler: &mut dyn FileHandler) -> DialogResult {
        let Some(paths) = selection else {
            handler.canceled();
            return DialogResult::Cancel;
        };

        for path in &paths {
            if !handler.handle(path) {
                log::debug!("file handler rejected {}", path.display());
                return DialogResult::Error;
            }
        }

        DialogResult::Ok
    }
}
