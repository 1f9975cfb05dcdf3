//! Dialogs on the DOM mirror.
//!
//! The browser cannot block, so every dialog is built, shown and handed to a
//! poll task. The task notices the `<dialog>` closing, reads its return
//! value, removes the subtree and only then completes.

use crate::document::{Dom, NodeId};
use crate::error::ProtocolError;
use crate::protocol::{DomEnvelope, HostEvent};
use crate::visitor::DomVisitor;
use formkit::{
    AsyncForm, Awaiter, CanvasRegistry, DialogBackend, DialogResult, FileDialog, FileHandler,
    MenuController, MenuList, MenuOutcome, MenuSurface, MenuView, MessageKind, QuestionResponse,
    Scheduler, Settings, TaskId, TaskStatus, answer_once, walk_form,
};
use std::cell::{Cell, RefCell};
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::rc::{Rc, Weak};
use std::time::{Duration, Instant};

type SharedController = Rc<RefCell<MenuController<DomMenuSurface>>>;

pub(crate) struct Inner {
    pub(crate) dom: Dom,
    pub(crate) scheduler: Scheduler,
    pub(crate) settings: Settings,
    menus: RefCell<BTreeMap<u64, SharedController>>,
    next_menu: Cell<u64>,
    next_seq: Cell<u64>,
    pub(crate) canvases: RefCell<CanvasRegistry<NodeId>>,
    pub(crate) canvas_nodes: RefCell<BTreeMap<(NodeId, String), NodeId>>,
}

/// The browser backend. Clones share one document and one scheduler.
#[derive(Clone)]
pub struct DomBackend {
    pub(crate) inner: Rc<Inner>,
}

impl Default for DomBackend {
    fn default() -> Self {
        Self::new(Settings::default())
    }
}

impl DomBackend {
    pub fn new(settings: Settings) -> Self {
        Self::with_dom(Dom::new(), settings)
    }

    pub fn with_dom(dom: Dom, settings: Settings) -> Self {
        let backend = Self {
            inner: Rc::new(Inner {
                dom,
                scheduler: Scheduler::new(),
                settings,
                menus: RefCell::new(BTreeMap::new()),
                next_menu: Cell::new(0),
                next_seq: Cell::new(0),
                canvases: RefCell::new(CanvasRegistry::new()),
                canvas_nodes: RefCell::new(BTreeMap::new()),
            }),
        };

        let weak = Rc::downgrade(&backend.inner);
        backend.inner.dom.on_removed(move |removed| {
            if let Some(backend) = DomBackend::from_weak(&weak) {
                backend.forget_removed(removed);
            }
        });
        backend
    }

    fn from_weak(inner: &Weak<Inner>) -> Option<Self> {
        inner.upgrade().map(|inner| Self { inner })
    }

    pub fn dom(&self) -> &Dom {
        &self.inner.dom
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.inner.scheduler
    }

    /// Menus currently displayed.
    pub fn open_menus(&self) -> usize {
        self.inner.menus.borrow().len()
    }

    pub fn dispatch(&self, event: &HostEvent) -> bool {
        self.inner.dom.dispatch(event)
    }

    /// Runs every poll task due at `now`.
    pub fn tick(&self, now: Instant) -> usize {
        self.inner.scheduler.tick(now)
    }

    /// Drains the op journal into the next numbered batch.
    pub fn take_envelope(&self) -> Option<DomEnvelope> {
        let ops = self.inner.dom.take_ops();
        if ops.is_empty() {
            return None;
        }

        let seq = self.inner.next_seq.get() + 1;
        self.inner.next_seq.set(seq);
        Some(DomEnvelope::Ops { seq, ops })
    }

    /// Entry point for a host that talks JSON strings instead of frames.
    pub fn handle_event_json(&self, json: &str) -> Result<bool, ProtocolError> {
        let event: HostEvent = serde_json::from_str(json)?;
        Ok(self.dispatch(&event))
    }

    pub fn drain_ops_json(&self) -> Result<Option<String>, ProtocolError> {
        match self.take_envelope() {
            Some(envelope) => Ok(Some(serde_json::to_string(&envelope)?)),
            None => Ok(None),
        }
    }

    /// Creates an unshown `<dialog>` with a heading under `parent` (or the
    /// body). `None` when `parent` no longer exists.
    pub(crate) fn dialog_shell(&self, title: &str, class: &str, parent: Option<&NodeId>) -> Option<NodeId> {
        let dom = &self.inner.dom;
        let host = match parent {
            Some(parent) if !dom.exists(*parent) => {
                log::warn!("dialog {title:?}: parent {parent} does not exist");
                return None;
            }
            Some(parent) => *parent,
            None => dom.body(),
        };

        let dialog = dom.create_in(host, "dialog");
        dom.set_attr(dialog, "class", class);
        if !title.is_empty() {
            let heading = dom.create_in(dialog, "h2");
            dom.set_text(heading, title);
        }
        Some(dialog)
    }

    /// A button row with one button per `(caption, return value)`; each
    /// closes `dialog` with its value.
    fn buttons(&self, dialog: NodeId, buttons: &[(&str, &str)]) {
        let dom = &self.inner.dom;
        let row = dom.create_in(dialog, "div");
        dom.set_attr(row, "class", "buttons");

        for (caption, return_value) in buttons {
            let button = dom.create_in(row, "button");
            dom.set_text(button, *caption);
            dom.set_attr(button, "value", *return_value);
            let return_value = return_value.to_string();
            dom.on(button, move |dom, event| {
                if matches!(event, HostEvent::Click { .. }) {
                    dom.close(dialog, &return_value);
                }
            });
        }
    }

    /// Polls `dialog` until it closes, removes it, then calls `on_close`.
    fn watch(&self, dialog: NodeId, on_close: impl FnOnce(DialogResult) + 'static) -> TaskId {
        let dom = self.inner.dom.clone();
        let mut on_close = Some(on_close);

        self.inner
            .scheduler
            .schedule(self.inner.settings.poll_interval, move || {
                if dom.is_open(dialog) {
                    return TaskStatus::Pending;
                }

                let result = dom
                    .return_value(dialog)
                    .map_or(DialogResult::Cancel, |value| {
                        DialogResult::from_return_value(&value)
                    });
                dom.remove(dialog);
                log::debug!("dialog {dialog} closed with {result}");

                if let Some(on_close) = on_close.take() {
                    on_close(result);
                }
                TaskStatus::Done
            })
    }

    fn click_menu(&self, session: u64, tab: usize, item: usize) {
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
        let shown = displayed.surface().dialog().is_some();
        drop(displayed);

        if outcome == MenuOutcome::Closed || !shown {
            if !shown {
                log::warn!("menu session {session} has no dialog left; dropping it");
            }
            self.inner.menus.borrow_mut().remove(&session);
        }
    }

    fn dismiss_menu(&self, session: u64) {
        let controller = self.inner.menus.borrow_mut().remove(&session);
        if let Some(controller) = controller {
            if let Ok(mut displayed) = controller.try_borrow_mut() {
                displayed.close();
            }
        }
    }
}

pub struct DomMenuSurface {
    backend: Weak<Inner>,
    session: u64,
    parent: Option<NodeId>,
    dialog: Option<NodeId>,
    watcher: Option<TaskId>,
}

impl DomMenuSurface {
    pub fn dialog(&self) -> Option<NodeId> {
        self.dialog
    }
}

impl MenuSurface for DomMenuSurface {
    fn open(&mut self, view: &MenuView) {
        let Some(backend) = DomBackend::from_weak(&self.backend) else {
            return;
        };
        let Some(dialog) = backend.dialog_shell(&view.title, "menu", self.parent.as_ref()) else {
            return;
        };
        let dom = backend.dom();

        for (tab_index, tab) in view.tabs.iter().enumerate() {
            let section = dom.create_in(dialog, "section");
            let heading = dom.create_in(section, "h3");
            dom.set_text(heading, tab.title.as_str());

            for (item_index, label) in tab.items.iter().enumerate() {
                let button = dom.create_in(section, "button");
                dom.set_text(button, label.as_str());
                let weak = self.backend.clone();
                let session = self.session;
                dom.on(button, move |_, event| {
                    if !matches!(event, HostEvent::Click { .. }) {
                        return;
                    }
                    if let Some(backend) = DomBackend::from_weak(&weak) {
                        backend.click_menu(session, tab_index, item_index);
                    }
                });
            }
        }
        backend.buttons(dialog, &[("Close", "cancel")]);
        dom.show_modal(dialog);

        let weak = self.backend.clone();
        let session = self.session;
        let watched = dom.clone();
        let watcher = backend
            .scheduler()
            .schedule(backend.settings().poll_interval, move || {
                if watched.is_open(dialog) {
                    return TaskStatus::Pending;
                }
                if let Some(backend) = DomBackend::from_weak(&weak) {
                    backend.dismiss_menu(session);
                }
                TaskStatus::Done
            });

        self.dialog = Some(dialog);
        self.watcher = Some(watcher);
    }

    fn close(&mut self) {
        let Some(backend) = DomBackend::from_weak(&self.backend) else {
            return;
        };
        if let Some(watcher) = self.watcher.take() {
            backend.scheduler().cancel(watcher);
        }
        if let Some(dialog) = self.dialog.take() {
            backend.dom().remove(dialog);
        }
    }
}

impl DialogBackend for DomBackend {
    type Parent = NodeId;

    fn settings(&self) -> &Settings {
        &self.inner.settings
    }

    fn show_async_form(&self, form: AsyncForm, title: &str, parent: Option<&NodeId>) {
        let Some(dialog) = self.dialog_shell(title, "form", parent) else {
            form.submit(DialogResult::Error);
            return;
        };

        let walked = form
            .form()
            .lock()
            .map(|snapshot| {
                walk_form(
                    &snapshot,
                    form.form(),
                    "",
                    &mut DomVisitor::new(self.inner.dom.clone()),
                )
            })
            .ok();
        let Some(body) = walked else {
            log::error!("form lock poisoned; dialog {title:?} not shown");
            self.inner.dom.remove(dialog);
            form.submit(DialogResult::Error);
            return;
        };
        self.inner.dom.append(dialog, body);
        self.buttons(dialog, &[("OK", "ok"), ("Cancel", "cancel")]);
        self.inner.dom.show_modal(dialog);

        self.watch(dialog, move |result| {
            form.submit(result);
        });
    }

    fn show_menu(&self, title: &str, menus: MenuList, parent: Option<&NodeId>) {
        if let Some(parent) = parent {
            if !self.inner.dom.exists(*parent) {
                log::warn!("menu {title:?}: parent {parent} does not exist");
                return;
            }
        }

        let session = self.inner.next_menu.get() + 1;
        self.inner.next_menu.set(session);

        let surface = DomMenuSurface {
            backend: Rc::downgrade(&self.inner),
            session,
            parent: parent.copied(),
            dialog: None,
            watcher: None,
        };
        let controller = MenuController::open(title, menus, surface);
        if controller.surface().dialog().is_none() {
            log::warn!("menu {title:?} could not be shown");
            return;
        }
        self.inner
            .menus
            .borrow_mut()
            .insert(session, Rc::new(RefCell::new(controller)));
    }

    fn show_message_box(&self, kind: MessageKind, title: &str, message: &str, parent: Option<&NodeId>) {
        let class = match kind {
            MessageKind::Info => "message info",
            MessageKind::Warning => "message warning",
            MessageKind::Error => "message error",
        };
        let Some(dialog) = self.dialog_shell(title, class, parent) else {
            log::warn!("message {title:?} could not be shown: {message}");
            return;
        };

        let text = self.inner.dom.create_in(dialog, "p");
        self.inner.dom.set_text(text, message);
        self.buttons(dialog, &[("OK", "ok")]);
        self.inner.dom.show_modal(dialog);
        self.watch(dialog, |_| {});
    }

    fn ask_question(
        &self,
        title: &str,
        question: &str,
        response: Box<dyn QuestionResponse>,
        parent: Option<&NodeId>,
    ) {
        let answer = answer_once(response);
        let Some(dialog) = self.dialog_shell(title, "question", parent) else {
            answer.complete(false);
            return;
        };

        let text = self.inner.dom.create_in(dialog, "p");
        self.inner.dom.set_text(text, question);
        self.buttons(dialog, &[("Yes", "ok"), ("No", "cancel")]);
        self.inner.dom.show_modal(dialog);
        self.watch(dialog, move |result| {
            answer.complete(result == DialogResult::Ok);
        });
    }

    fn show_popup_until(
        &self,
        message: &str,
        mut awaiter: Box<dyn Awaiter>,
        poll_interval: Duration,
        parent: Option<&NodeId>,
    ) {
        let popup = self.dialog_shell("", "popup", parent);
        match popup {
            Some(popup) => {
                let text = self.inner.dom.create_in(popup, "p");
                self.inner.dom.set_text(text, message);
                self.inner.dom.show(popup);
            }
            None => log::warn!("popup {message:?} not shown; still waiting for it"),
        }

        let dom = self.inner.dom.clone();
        self.inner.scheduler.schedule(poll_interval, move || {
            if !awaiter.is_done() {
                return TaskStatus::Pending;
            }
            if let Some(popup) = popup {
                dom.remove(popup);
            }
            TaskStatus::Done
        });
    }

    fn show_file_dialog(
        &self,
        dialog: FileDialog,
        mut handler: Box<dyn FileHandler>,
        on_result: Box<dyn FnOnce(DialogResult)>,
        parent: Option<&NodeId>,
    ) {
        let Some(node) = self.dialog_shell(&dialog.title, "file", parent) else {
            on_result(DialogResult::Error);
            return;
        };
        let dom = &self.inner.dom;

        if !dialog.message.is_empty() {
            let text = dom.create_in(node, "p");
            dom.set_text(text, dialog.message.as_str());
        }

        let chosen: Rc<RefCell<Vec<String>>> = Rc::default();
        let input = dom.create_in(node, "input");
        let sink = chosen.clone();
        if dialog.saving {
            dom.set_attr(input, "type", "text");
            let filename = dialog.filename.clone().unwrap_or_default();
            dom.set_value(input, filename.as_str());
            if !filename.is_empty() {
                sink.borrow_mut().push(filename);
            }
            dom.on(input, move |_, event| {
                if let HostEvent::Input { value, .. } = event {
                    *sink.borrow_mut() = vec![value.clone()];
                }
            });
        } else {
            dom.set_attr(input, "type", "file");
            let accept = dialog
                .filters
                .iter()
                .map(|filter| filter.accept())
                .collect::<Vec<_>>()
                .join(",");
            if !accept.is_empty() {
                dom.set_attr(input, "accept", accept);
            }
            if dialog.multiple {
                dom.set_attr(input, "multiple", "");
            }
            if dialog.directories {
                dom.set_attr(input, "webkitdirectory", "");
            }
            dom.on(input, move |_, event| {
                if let HostEvent::Files { names, .. } = event {
                    *sink.borrow_mut() = names.clone();
                }
            });
        }

        self.buttons(node, &[("OK", "ok"), ("Cancel", "cancel")]);
        dom.show_modal(node);

        let start = dialog.start_directory.clone();
        self.watch(node, move |result| {
            let names = chosen.take();
            let outcome = match result {
                DialogResult::Ok if !names.is_empty() => {
                    let paths: Vec<PathBuf> = names
                        .iter()
                        .map(|name| match &start {
                            Some(directory) => directory.join(name),
                            None => PathBuf::from(name),
                        })
                        .collect();
                    FileDialog::dispatch(Some(paths), handler.as_mut())
                }
                DialogResult::Ok | DialogResult::Cancel => {
                    FileDialog::dispatch(None, handler.as_mut())
                }
                DialogResult::Error => DialogResult::Error,
            };
            on_result(outcome);
        });
    }
}
