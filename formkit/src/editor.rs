//! Round-trips text through an external editor process.

use crate::awaiter::ProcessRunAfter;
use crate::error::EditorError;
use crate::settings::Settings;
use std::io::Write;
use std::process::Command;

/// The configured editor command, split into program and arguments. The
/// temp file path is appended as the last argument.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExternalEdit {
    command: String,
    argv: Vec<String>,
}

impl ExternalEdit {
    pub fn new(command: &str) -> Result<Self, EditorError> {
        let argv = shell_words::split(command).map_err(|err| EditorError::BadCommand {
            command: command.to_string(),
            reason: err.to_string(),
        })?;

        if argv.is_empty() {
            return Err(EditorError::NoEditor);
        }

        Ok(Self {
            command: command.to_string(),
            argv,
        })
    }

    pub fn from_settings(settings: &Settings) -> Result<Self, EditorError> {
        Self::new(&settings.editor)
    }

    pub fn command(&self) -> &str {
        &self.command
    }

    /// Writes `text` to a temp file ending in `extension`, launches the
    /// editor on it and returns the pending wait. Once the editor exits the
    /// file is read back and handed to `then`; the temp file is removed
    /// right after.
    pub fn start(
        &self,
        text: &str,
        extension: &str,
        then: impl FnOnce(Result<String, EditorError>) + 'static,
    ) -> Result<ProcessRunAfter, EditorError> {
        let suffix = match extension.trim_start_matches('.') {
            "" => String::new(),
            ext => format!(".{ext}"),
        };

        let mut file = tempfile::Builder::new()
            .prefix("formkit-edit-")
            .suffix(&suffix)
            .tempfile()
            .map_err(EditorError::TempFile)?;
        file.write_all(text.as_bytes())
            .and_then(|()| file.flush())
            .map_err(EditorError::TempFile)?;
        let path = file.into_temp_path();

        let (program, args) = self.argv.split_first().ok_or(EditorError::NoEditor)?;
        let child = Command::new(program)
            .args(args)
            .arg(path.as_os_str())
            .spawn()
            .map_err(|source| EditorError::Spawn {
                command: self.command.clone(),
                source,
            })?;
        log::debug!("editor {:?} started on {}", self.command, path.display());

        Ok(ProcessRunAfter::new(child, move |status| {
            let result = match status {
                Ok(status) => {
                    if !status.success() {
                        log::warn!("editor exited with {status}; reading file anyway");
                    }
                    std::fs::read_to_string(&path).map_err(EditorError::Read)
                }
                Err(err) => Err(EditorError::Wait(err)),
            };

            if let Err(err) = path.close() {
                log::warn!("failed to remove editor temp file: {err}");
            }
            then(result);
        }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::awaiter::RunAfter;
    use std::cell::RefCell;
    use std::rc::Rc;
    use std::time::{Duration, Instant};

    #[test]
    fn blank_and_unbalanced_commands_are_rejected() {
        assert!(matches!(ExternalEdit::new("   "), Err(EditorError::NoEditor)));
        assert!(matches!(
            ExternalEdit::new("vim 'unterminated"),
            Err(EditorError::BadCommand { .. })
        ));
    }

    #[test]
    fn command_with_arguments_is_split() {
        let edit = ExternalEdit::new("code --wait").expect("valid command");
        assert_eq!(edit.argv, ["code", "--wait"]);
        assert_eq!(edit.command(), "code --wait");
    }

    #[test]
    fn missing_program_fails_to_spawn() {
        let edit = ExternalEdit::new("formkit-no-such-editor-binary").expect("valid command");
        let result = edit.start("x", "txt", |_| {});
        assert!(matches!(result, Err(EditorError::Spawn { .. })));
    }

    #[cfg(unix)]
    #[test]
    fn edited_text_comes_back_after_exit() {
        let edit = ExternalEdit::new(r#"sh -c 'printf edited > "$0"'"#).expect("valid command");
        let seen: Rc<RefCell<Option<String>>> = Rc::default();
        let sink = seen.clone();

        let mut pending = edit
            .start("original", ".txt", move |result| {
                *sink.borrow_mut() = Some(result.expect("read back"));
            })
            .expect("editor started");

        let deadline = Instant::now() + Duration::from_secs(10);
        while !pending.is_ready() {
            assert!(Instant::now() < deadline, "editor did not exit");
            std::thread::sleep(Duration::from_millis(5));
        }
        Box::new(pending).run();

        assert_eq!(seen.borrow().as_deref(), Some("edited"));
    }
}
