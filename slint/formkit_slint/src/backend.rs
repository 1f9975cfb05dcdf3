//! Dialogs as Slint windows.
//!
//! Widget callbacks only record what the user did. A poll task on the
//! backend's scheduler, ticked by a repeating [`slint::Timer`], notices the
//! recorded result, hides and drops the window and only then completes.

use crate::files;
use crate::menu::SlintMenuSurface;
use crate::rows::{FormRows, Role, RowView};
use crate::{CanvasWindow, FormDialog, FormRow, MessageDialog, PopupNote};
use formkit::{
    AsyncForm, Awaiter, BlockingDialogs, CanvasRegistry, DialogBackend, DialogResult, FileDialog,
    FileHandler, Form, MenuController, MenuList, MenuOutcome, MessageKind, QuestionResponse,
    Scheduler, Settings, TaskId, TaskStatus, answer_once, execute_form_with,
};
use slint::{
    CloseRequestResponse, ComponentHandle, Model, ModelRc, SharedString, TimerMode, VecModel,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::fmt;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

type SharedController = Rc<RefCell<MenuController<SlintMenuSurface>>>;
type Outcome = Rc<Cell<Option<DialogResult>>>;

/// Handle of a window registered with [`SlintBackend::register_window`],
/// used as a dialog parent and as the owner of canvases.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct WindowId(u64);

impl fmt::Display for WindowId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "window#{}", self.0)
    }
}

pub(crate) struct Inner {
    pub(crate) scheduler: Scheduler,
    pub(crate) settings: Settings,
    ticker: slint::Timer,
    windows: RefCell<BTreeMap<WindowId, Box<dyn Fn() -> bool>>>,
    next_window: Cell<u64>,
    menus: RefCell<BTreeMap<u64, SharedController>>,
    next_menu: Cell<u64>,
    in_loop: Cell<bool>,
    pub(crate) canvases: RefCell<CanvasRegistry<WindowId>>,
    pub(crate) canvas_windows: RefCell<BTreeMap<(WindowId, String), CanvasWindow>>,
}

/// The desktop backend. Clones share one scheduler and one window registry.
#[derive(Clone)]
pub struct SlintBackend {
    pub(crate) inner: Rc<Inner>,
}

impl Default for SlintBackend {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl SlintBackend {
    pub fn new(settings: Settings) -> Self {
        let backend = Self {
            inner: Rc::new(Inner {
                scheduler: Scheduler::new(),
                settings,
                ticker: slint::Timer::default(),
                windows: RefCell::new(BTreeMap::new()),
                next_window: Cell::new(0),
                menus: RefCell::new(BTreeMap::new()),
                next_menu: Cell::new(0),
                in_loop: Cell::new(false),
                canvases: RefCell::new(CanvasRegistry::new()),
                canvas_windows: RefCell::new(BTreeMap::new()),
            }),
        };

        let weak = Rc::downgrade(&backend.inner);
        let interval = backend
            .inner
            .settings
            .poll_interval
            .max(Duration::from_millis(1));
        backend.inner.ticker.start(TimerMode::Repeated, interval, move || {
            if let Some(inner) = weak.upgrade() {
                inner.scheduler.tick(Instant::now());
            }
        });
        backend
    }

    pub(crate) fn from_weak(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Runs every poll task due at `now`. The timer does this on its own
    /// while the event loop runs.
    pub fn tick(&self, now: Instant) -> usize {
        self.inner.scheduler.tick(now)
    }

    pub fn open_menus(&self) -> usize {
        self.inner.menus.borrow().len()
    }

    /// Makes an application window usable as a dialog parent. The id stops
    /// resolving once the window is dropped or hidden.
    pub fn register_window<C>(&self, component: &C) -> WindowId
    where
        C: ComponentHandle + 'static,
    {
        let id = WindowId(self.inner.next_window.get() + 1);
        self.inner.next_window.set(id.0);

        let weak = component.as_weak();
        self.inner.windows.borrow_mut().insert(
            id,
            Box::new(move || {
                weak.upgrade()
                    .is_some_and(|component| component.window().is_visible())
            }),
        );
        id
    }

    pub fn window_alive(&self, id: WindowId) -> bool {
        let alive = self
            .inner
            .windows
            .borrow()
            .get(&id)
            .is_some_and(|alive| alive());
        if !alive {
            self.inner.windows.borrow_mut().remove(&id);
        }
        alive
    }

    /// `false` (with a warning) when `parent` was given but is gone.
    fn parent_ok(&self, what: &str, parent: Option<&WindowId>) -> bool {
        match parent {
            Some(parent) if !self.window_alive(*parent) => {
                log::warn!("{what}: parent {parent} does not exist");
                self.forget_canvases(*parent);
                false
            }
            _ => true,
        }
    }

    /// Hides and drops `dialog` once `outcome` is set, then calls `on_close`.
    fn watch<C>(&self, dialog: C, outcome: Outcome, on_close: impl FnOnce(DialogResult) + 'static) -> TaskId
    where
        C: ComponentHandle + 'static,
    {
        let mut dialog = Some(dialog);
        let mut on_close = Some(on_close);

        self.inner
            .scheduler
            .schedule(self.inner.settings.poll_interval, move || {
                let Some(result) = outcome.get() else {
                    return TaskStatus::Pending;
                };

                if let Some(dialog) = dialog.take() {
                    if let Err(err) = dialog.hide() {
                        log::warn!("failed to hide dialog: {err}");
                    }
                }
                log::debug!("dialog closed with {result}");

                if let Some(on_close) = on_close.take() {
                    on_close(result);
                }
                TaskStatus::Done
            })
    }

    /// Shows `form` and returns the cell its buttons settle. `None` when the
    /// dialog could not be shown; the form has then completed with `Error`.
    fn open_form(&self, form: AsyncForm, title: &str, parent: Option<&WindowId>) -> Option<Outcome> {
        if !self.parent_ok(title, parent) {
            form.submit(DialogResult::Error);
            return None;
        }

        let built = form
            .form()
            .lock()
            .map(|snapshot| FormRows::build(&snapshot, form.form()))
            .ok();
        let Some(rows) = built else {
            log::error!("form lock poisoned; dialog {title:?} not shown");
            form.submit(DialogResult::Error);
            return None;
        };

        let dialog = match FormDialog::new() {
            Ok(dialog) => dialog,
            Err(err) => {
                log::error!("cannot create form dialog {title:?}: {err}");
                form.submit(DialogResult::Error);
                return None;
            }
        };
        let rows = RowModel::new(rows);
        dialog.set_heading(SharedString::from(title));
        dialog.set_rows(ModelRc::from(rows.model.clone()));

        let model = rows.clone();
        dialog.on_toggled(move |raw, checked| {
            if let Some(slot) = slot(raw) {
                model.rows.borrow_mut().toggle(slot, checked);
                model.refresh(false);
            }
        });

        let model = rows.clone();
        dialog.on_edited(move |raw, text| {
            if let Some(slot) = slot(raw) {
                if !model.rows.borrow_mut().edit_text(slot, text.as_str()) {
                    log::debug!("edit of row {slot} rejected");
                }
                model.refresh(false);
            }
        });

        let model = rows.clone();
        dialog.on_chosen(move |raw, index| {
            let (Some(slot), Ok(index)) = (slot(raw), usize::try_from(index)) else {
                return;
            };
            let snippet = model
                .rows
                .borrow()
                .rows()
                .get(slot)
                .is_some_and(|row| matches!(row.role, Role::Snippet(_)));
            model.rows.borrow_mut().choose(slot, index);
            // The text editor holds its own copy once typed into.
            model.refresh(snippet);
        });

        let model = rows.clone();
        dialog.on_header_clicked(move |raw| {
            if let Some(slot) = slot(raw) {
                model.rows.borrow_mut().toggle_header(slot);
                model.refresh(false);
            }
        });

        let outcome: Outcome = Rc::default();
        let accepted = outcome.clone();
        dialog.on_accepted(move || settle(&accepted, DialogResult::Ok));
        let rejected = outcome.clone();
        dialog.on_rejected(move || settle(&rejected, DialogResult::Cancel));
        cancel_on_close(&dialog, &outcome);

        if let Err(err) = dialog.show() {
            log::error!("cannot show form dialog {title:?}: {err}");
            form.submit(DialogResult::Error);
            return None;
        }

        self.watch(dialog, outcome.clone(), move |result| {
            form.submit(result);
        });
        Some(outcome)
    }

    pub(crate) fn click_menu(&self, session: u64, tab: usize, item: usize) {
        let controller = self.inner.menus.borrow().get(&session).cloned();
        let Some(controller) = controller else {
            log::debug!("click for finished menu session {session}");
            return;
        };

        let Ok(mut displayed) = controller.try_borrow_mut() else {
            log::warn!("menu session {session} is busy; click dropped");
            return;
        };
        let outcome = displayed.click(tab, item);
        let shown = displayed.surface().is_shown();
        drop(displayed);

        if outcome == MenuOutcome::Closed || !shown {
            if !shown {
                log::warn!("menu session {session} has no window left; dropping it");
            }
            self.inner.menus.borrow_mut().remove(&session);
        }
    }

    pub(crate) fn dismiss_menu(&self, session: u64) {
        let controller = self.inner.menus.borrow_mut().remove(&session);
        if let Some(controller) = controller {
            if let Ok(mut displayed) = controller.try_borrow_mut() {
                displayed.close();
            }
        }
    }

    fn popup_note(&self, message: &str) -> Option<PopupNote> {
        let popup = match PopupNote::new() {
            Ok(popup) => popup,
            Err(err) => {
                log::error!("cannot create popup: {err}");
                return None;
            }
        };
        popup.set_message(SharedString::from(message));
        if let Err(err) = popup.show() {
            log::error!("cannot show popup: {err}");
            return None;
        }
        Some(popup)
    }

    /// Runs the event loop until `done` turns true. Fails when a blocking
    /// dialog is already running one; nested loops are not supported.
    fn run_until(&self, what: &str, done: impl Fn() -> bool) -> bool {
        if self.inner.in_loop.replace(true) {
            log::error!("{what}: a blocking dialog is already running");
            return false;
        }

        let mut ran = true;
        while !done() {
            let interval = self.inner.settings.poll_interval.max(Duration::from_millis(1));
            slint::Timer::single_shot(interval, || {
                if let Err(err) = slint::quit_event_loop() {
                    log::warn!("failed to leave event loop: {err}");
                }
            });
            if let Err(err) = slint::run_event_loop_until_quit() {
                log::error!("{what}: event loop failed: {err}");
                ran = false;
                break;
            }
            self.inner.scheduler.tick(Instant::now());
        }

        self.inner.in_loop.set(false);
        ran
    }
}

fn settle(outcome: &Outcome, result: DialogResult) {
    if outcome.get().is_none() {
        outcome.set(Some(result));
    }
}

/// The close box counts as cancel.
fn cancel_on_close<C: ComponentHandle>(dialog: &C, outcome: &Outcome) {
    let outcome = outcome.clone();
    dialog.window().on_close_requested(move || {
        settle(&outcome, DialogResult::Cancel);
        CloseRequestResponse::HideWindow
    });
}

fn form_row(view: &RowView) -> FormRow {
    FormRow {
        slot: view.slot as i32,
        kind: view.kind.code(),
        label: SharedString::from(view.label.as_str()),
        depth: view.depth as i32,
        text: SharedString::from(view.text.as_str()),
        checked: view.checked,
        index: view.index,
        options: ModelRc::new(VecModel::from(
            view.options
                .iter()
                .map(|option| SharedString::from(option.as_str()))
                .collect::<Vec<_>>(),
        )),
        expanded: view.expanded,
    }
}

/// Keeps a dialog's row model in step with its form.
struct RowModel {
    rows: RefCell<FormRows>,
    shown: RefCell<Vec<RowView>>,
    model: Rc<VecModel<FormRow>>,
}

impl RowModel {
    fn new(rows: FormRows) -> Rc<Self> {
        let shown = rows.view();
        let model = Rc::new(VecModel::from(shown.iter().map(form_row).collect::<Vec<_>>()));
        Rc::new(Self {
            rows: RefCell::new(rows),
            shown: RefCell::new(shown),
            model,
        })
    }

    /// Rows keep their widgets while the visible set is unchanged; only
    /// changed rows are replaced. A different set, or `rebuild`, resets the
    /// whole model.
    fn refresh(&self, rebuild: bool) {
        let next = self.rows.borrow().view();
        let mut shown = self.shown.borrow_mut();

        let same_rows = !rebuild
            && shown.len() == next.len()
            && shown.iter().zip(&next).all(|(old, new)| old.slot == new.slot);
        if same_rows {
            for (index, (old, new)) in shown.iter().zip(&next).enumerate() {
                if old != new && index < self.model.row_count() {
                    self.model.set_row_data(index, form_row(new));
                }
            }
        } else {
            self.model.set_vec(next.iter().map(form_row).collect::<Vec<_>>());
        }
        *shown = next;
    }
}

fn slot(raw: i32) -> Option<usize> {
    usize::try_from(raw).ok()
}

impl DialogBackend for SlintBackend {
    type Parent = WindowId;

    fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    fn show_async_form(&self, form: AsyncForm, title: &str, parent: Option<&WindowId>) {
        self.open_form(form, title, parent);
    }


    fn show_menu(&self, title: &str, menus: MenuList, parent: Option<&WindowId>) {
        if !self.parent_ok(title, parent) {
            return;
        }

        let session = self.inner.next_menu.get() + 1;
        self.inner.next_menu.set(session);

        let surface = SlintMenuSurface {
            backend: Rc::downgrade(&self.inner),
            session,
            dialog: None,
        };
        let controller = MenuController::open(title, menus, surface);
        if !controller.surface().is_shown() {
            log::warn!("menu {title:?} could not be shown");
            return;
        }
        self.inner
            .menus
            .borrow_mut()
            .insert(session, Rc::new(RefCell::new(controller)));
    }

    fn show_message_box(&self, kind: MessageKind, title: &str, message: &str, parent: Option<&WindowId>) {
        if !self.parent_ok(title, parent) {
            log::warn!("message {title:?} could not be shown: {message}");
            return;
        }
        let dialog = match MessageDialog::new() {
            Ok(dialog) => dialog,
            Err(err) => {
                log::error!("cannot create message box {title:?}: {err}; message was {message}");
                return;
            }
        };
        let severity = match kind {
            MessageKind::Info => 0,
            MessageKind::Warning => 1,
            MessageKind::Error => 2,
        };
        dialog.set_heading(SharedString::from(title));
        dialog.set_message(SharedString::from(message));
        dialog.set_severity(severity);

        let outcome: Outcome = Rc::default();
        let answered = outcome.clone();
        dialog.on_answered(move |_| settle(&answered, DialogResult::Ok));
        cancel_on_close(&dialog, &outcome);

        if let Err(err) = dialog.show() {
            log::error!("cannot show message box {title:?}: {err}; message was {message}");
            return;
        }
        self.watch(dialog, outcome, |_| {});
    }

    fn ask_question(
        &self,
        title: &str,
        question: &str,
        response: Box<dyn QuestionResponse>,
        parent: Option<&WindowId>,
    ) {
        let answer = answer_once(response);
        if !self.parent_ok(title, parent) {
            answer.complete(false);
            return;
        }
        let dialog = match MessageDialog::new() {
            Ok(dialog) => dialog,
            Err(err) => {
                log::error!("cannot create question {title:?}: {err}");
                answer.complete(false);
                return;
            }
        };
        dialog.set_heading(SharedString::from(title));
        dialog.set_message(SharedString::from(question));
        dialog.set_severity(3);
        dialog.set_accept_text(SharedString::from("Yes"));
        dialog.set_reject_text(SharedString::from("No"));

        let outcome: Outcome = Rc::default();
        let answered = outcome.clone();
        dialog.on_answered(move |yes| {
            let result = if yes {
                DialogResult::Ok
            } else {
                DialogResult::Cancel
            };
            settle(&answered, result);
        });
        cancel_on_close(&dialog, &outcome);

        if let Err(err) = dialog.show() {
            log::error!("cannot show question {title:?}: {err}");
            answer.complete(false);
            return;
        }
        self.watch(dialog, outcome, move |result| {
            answer.complete(result == DialogResult::Ok);
        });
    }

    fn show_popup_until(
        &self,
        message: &str,
        mut awaiter: Box<dyn Awaiter>,
        poll_interval: Duration,
        parent: Option<&WindowId>,
    ) {
        let mut popup = if self.parent_ok("popup", parent) {
            self.popup_note(message)
        } else {
            None
        };
        if popup.is_none() {
            log::warn!("popup {message:?} not shown; still waiting for it");
        }

        self.inner.scheduler.schedule(poll_interval, move || {
            if !awaiter.is_done() {
                return TaskStatus::Pending;
            }
            if let Some(popup) = popup.take() {
                if let Err(err) = popup.hide() {
                    log::warn!("failed to hide popup: {err}");
                }
            }
            TaskStatus::Done
        });
    }

    /// Native pickers block, so the picker runs from a timer callback once
    /// the caller's own callback has returned.
    fn show_file_dialog(
        &self,
        dialog: FileDialog,
        mut handler: Box<dyn FileHandler>,
        on_result: Box<dyn FnOnce(DialogResult)>,
        parent: Option<&WindowId>,
    ) {
        if !self.parent_ok(&dialog.title, parent) {
            on_result(DialogResult::Error);
            return;
        }

        slint::Timer::single_shot(Duration::ZERO, move || {
            let result = FileDialog::dispatch(files::pick(&dialog), handler.as_mut());
            on_result(result);
        });
    }
}

impl BlockingDialogs for SlintBackend {
    fn execute_form(&self, title: &str, form: &mut Form, parent: Option<&WindowId>) -> DialogResult {
        if self.inner.in_loop.get() {
            log::error!("{title}: a blocking dialog is already running");
            return DialogResult::Error;
        }

        let opened: RefCell<Option<Outcome>> = RefCell::new(None);
        execute_form_with(
            form,
            |dialog| *opened.borrow_mut() = self.open_form(dialog, title, parent),
            |done| {
                if self.run_until(title, done) {
                    return true;
                }
                if let Some(outcome) = opened.borrow().as_ref() {
                    settle(outcome, DialogResult::Error);
                    // Runs the watch task now so the window is gone first.
                    self.tick(Instant::now() + self.inner.settings.poll_interval);
                }
                false
            },
        )
    }

    fn run_file_dialog(
        &self,
        dialog: &FileDialog,
        handler: &mut dyn FileHandler,
        parent: Option<&WindowId>,
    ) -> DialogResult {
        if !self.parent_ok(&dialog.title, parent) {
            return DialogResult::Error;
        }
        FileDialog::dispatch(files::pick(dialog), handler)
    }

    fn wait_for(
        &self,
        message: &str,
        awaiter: &mut dyn Awaiter,
        poll_interval: Duration,
        parent: Option<&WindowId>,
    ) {
        let popup = if self.parent_ok("wait", parent) {
            self.popup_note(message)
        } else {
            None
        };

        let done = RefCell::new(awaiter);
        let pumped = self.run_until("wait", || done.borrow_mut().is_done());
        if !pumped {
            // No event loop to pump; poll without repainting.
            let awaiter = done.into_inner();
            while !awaiter.is_done() {
                std::thread::sleep(poll_interval);
            }
        }

        if let Some(popup) = popup {
            if let Err(err) = popup.hide() {
                log::warn!("failed to hide wait popup: {err}");
            }
        }
    }
}
