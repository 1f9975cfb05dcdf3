//! Dialog completion contracts shared by every backend.

use crate::awaiter::{Awaiter, RunAfterAwaiter, TimedAwaiter};
use crate::editor::ExternalEdit;
use crate::file_dialog::{FileDialog, FileHandler};
use crate::form::Form;
use crate::menu::MenuList;
use crate::settings::Settings;
use crate::visitor::{SharedForm, share, unshare};
use std::cell::{Cell, RefCell};
use std::error::Error as StdError;
use std::fmt;
use std::rc::Rc;
use std::sync::PoisonError;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum DialogResult {
    Ok,
    Cancel,
    Error,
}

impl DialogResult {
    /// Maps an HTML `<dialog>` return value: `ok`, `cancel` or empty (closed
    /// through the close affordance). Anything else is an error.
    pub fn from_return_value(value: &str) -> Self {
        match value {
            "ok" => DialogResult::Ok,
            "" | "cancel" => DialogResult::Cancel,
            _ => DialogResult::Error,
        }
    }

    pub fn as_return_value(self) -> &'static str {
        match self {
            DialogResult::Ok => "ok",
            DialogResult::Cancel => "cancel",
            DialogResult::Error => "error",
        }
    }
}

impl fmt::Display for DialogResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_return_value())
    }
}

/// One-shot callback handle. Clones share the callback; whichever clone
/// completes first delivers the value, later attempts are refused.
pub struct Completion<T> {
    callback: Rc<RefCell<Option<Box<dyn FnOnce(T)>>>>,
}

impl<T> Clone for Completion<T> {
    fn clone(&self) -> Self {
        Self {
            callback: self.callback.clone(),
        }
    }
}

impl<T> Completion<T> {
    pub fn new(callback: impl FnOnce(T) + 'static) -> Self {
        Self {
            callback: Rc::new(RefCell::new(Some(Box::new(callback)))),
        }
    }

    /// Returns `false` if the value was already delivered.
    pub fn complete(&self, value: T) -> bool {
        // Taken out first so the callback may touch this handle again.
        let callback = self.callback.borrow_mut().take();
        match callback {
            Some(callback) => {
                callback(value);
                true
            }
            None => false,
        }
    }

    pub fn is_complete(&self) -> bool {
        self.callback.borrow().is_none()
    }
}

impl<T> fmt::Debug for Completion<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Completion")
            .field("complete", &self.is_complete())
            .finish()
    }
}

/// A form handed to a non-blocking dialog together with what to do once the
/// user dismisses it.
#[derive(Clone)]
pub struct AsyncForm {
    form: SharedForm,
    on_submit: Completion<DialogResult>,
}

impl AsyncForm {
    pub fn new(form: Form, on_submit: impl FnOnce(DialogResult, &mut Form) + 'static) -> Self {
        Self::from_shared(share(form), on_submit)
    }

    pub fn from_shared(
        form: SharedForm,
        on_submit: impl FnOnce(DialogResult, &mut Form) + 'static,
    ) -> Self {
        let target = form.clone();
        let on_submit = Completion::new(move |result| {
            // The lock is released while the callback runs so it may show the
            // same shared form again.
            let mut edited = target.lock().unwrap_or_else(PoisonError::into_inner).clone();
            on_submit(result, &mut edited);
            *target.lock().unwrap_or_else(PoisonError::into_inner) = edited;
        });
        Self { form, on_submit }
    }

    pub fn form(&self) -> &SharedForm {
        &self.form
    }

    /// Delivers the result. Only the first call reaches the callback.
    pub fn submit(&self, result: DialogResult) -> bool {
        let delivered = self.on_submit.complete(result);
        if !delivered {
            log::debug!("form already submitted; ignoring {result}");
        }
        delivered
    }

    pub fn is_submitted(&self) -> bool {
        self.on_submit.is_complete()
    }
}

impl fmt::Debug for AsyncForm {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AsyncForm")
            .field("submitted", &self.is_submitted())
            .finish()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MessageKind {
    Info,
    Warning,
    Error,
}

pub trait QuestionResponse {
    fn yes(self: Box<Self>);
    fn no(self: Box<Self>);
}

impl<F: FnOnce(bool)> QuestionResponse for F {
    fn yes(self: Box<Self>) {
        (*self)(true)
    }

    fn no(self: Box<Self>) {
        (*self)(false)
    }
}

/// Wraps a response so it answers exactly once, whichever way.
pub fn answer_once(response: Box<dyn QuestionResponse>) -> Completion<bool> {
    Completion::new(move |yes| {
        if yes {
            response.yes()
        } else {
            response.no()
        }
    })
}

/// Non-blocking entry points every backend provides.
///
/// Each dialog completes exactly once, after its widgets are torn down.
/// Closing a dialog through its close affordance counts as cancel (or "no").
pub trait DialogBackend {
    /// Opaque window or container handle used for modal ownership.
    type Parent: Clone + 'static;

    fn settings(&self) -> &Settings;

    fn show_async_form(&self, form: AsyncForm, title: &str, parent: Option<&Self::Parent>);

    fn show_menu(&self, title: &str, menus: MenuList, parent: Option<&Self::Parent>);

    fn show_message_box(
        &self,
        kind: MessageKind,
        title: &str,
        message: &str,
        parent: Option<&Self::Parent>,
    );

    fn ask_question(
        &self,
        title: &str,
        question: &str,
        response: Box<dyn QuestionResponse>,
        parent: Option<&Self::Parent>,
    );

    /// Shows `message` until `awaiter` reports done, polling it every
    /// `poll_interval` without blocking. The awaiter is polled to the end
    /// even when the popup itself cannot be shown.
    fn show_popup_until(
        &self,
        message: &str,
        awaiter: Box<dyn Awaiter>,
        poll_interval: Duration,
        parent: Option<&Self::Parent>,
    );

    fn show_file_dialog(
        &self,
        dialog: FileDialog,
        handler: Box<dyn FileHandler>,
        on_result: Box<dyn FnOnce(DialogResult)>,
        parent: Option<&Self::Parent>,
    );

    fn show_popup_for(&self, message: &str, duration: Duration, parent: Option<&Self::Parent>) {
        self.show_popup_until(
            message,
            Box::new(TimedAwaiter::new(duration)),
            self.settings().poll_interval,
            parent,
        );
    }

    fn report_error(&self, title: &str, err: &dyn StdError, parent: Option<&Self::Parent>) {
        log::warn!("{title}: {err}");
        self.show_message_box(MessageKind::Error, title, &err.to_string(), parent);
    }
}

/// Entry points that suspend the caller until the user answers. Only
/// backends with a native event loop to nest implement this.
pub trait BlockingDialogs: DialogBackend {
    fn execute_form(&self, title: &str, form: &mut Form, parent: Option<&Self::Parent>)
    -> DialogResult;

    fn run_file_dialog(
        &self,
        dialog: &FileDialog,
        handler: &mut dyn FileHandler,
        parent: Option<&Self::Parent>,
    ) -> DialogResult;

    /// Blocks with a "please wait" window until `awaiter` is done.
    fn wait_for(
        &self,
        message: &str,
        awaiter: &mut dyn Awaiter,
        poll_interval: Duration,
        parent: Option<&Self::Parent>,
    );
}

/// The blocking form round trip on top of [`DialogBackend::show_async_form`].
///
/// `form` is moved into a shared tree, `show` opens the dialog and `pump`
/// runs the caller's event loop until the check it is given turns true. The
/// edited tree is written back into `form` whatever the outcome. A `pump`
/// that returns `false` could not run and must have settled the dialog.
pub fn execute_form_with(
    form: &mut Form,
    show: impl FnOnce(AsyncForm),
    pump: impl FnOnce(&dyn Fn() -> bool) -> bool,
) -> DialogResult {
    let shared = share(std::mem::take(form));
    let outcome: Rc<Cell<Option<DialogResult>>> = Rc::default();
    let done = outcome.clone();
    show(AsyncForm::from_shared(shared.clone(), move |result, _| {
        done.set(Some(result))
    }));

    let pumped = pump(&|| outcome.get().is_some());
    *form = unshare(&shared);
    match outcome.get() {
        Some(result) if pumped => result,
        _ => DialogResult::Error,
    }
}

/// Opens `text` in the configured external editor behind a waiting popup.
/// When the editor exits the user is asked whether to keep the edited text;
/// `on_text` receives it only on "yes". Launch or read failures are shown as
/// an error message box.
pub fn edit_externally<B>(
    backend: &B,
    text: &str,
    extension: &str,
    settings: &Settings,
    parent: Option<&B::Parent>,
    on_text: impl FnOnce(String) + 'static,
) where
    B: DialogBackend + Clone + 'static,
{
    const TITLE: &str = "External editor";

    let edit = match ExternalEdit::from_settings(settings) {
        Ok(edit) => edit,
        Err(err) => {
            backend.report_error(TITLE, &err, parent);
            return;
        }
    };

    let after = backend.clone();
    let after_parent = parent.cloned();
    let started = edit.start(text, extension, move |result| match result {
        Ok(edited) => after.ask_question(
            TITLE,
            "The editor was closed. Apply the edited text?",
            Box::new(move |yes: bool| {
                if yes {
                    on_text(edited);
                }
            }),
            after_parent.as_ref(),
        ),
        Err(err) => after.report_error(TITLE, &err, after_parent.as_ref()),
    });

    match started {
        Ok(pending) => backend.show_popup_until(
            &format!("Waiting for {} to close…", edit.command()),
            Box::new(RunAfterAwaiter::new(pending)),
            settings.poll_interval,
            parent,
        ),
        Err(err) => backend.report_error(TITLE, &err, parent),
    }
}
