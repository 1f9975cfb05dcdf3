//! Toolkit-agnostic core for dialogs, data-entry forms, popup menus and
//! simple canvases.
//!
//! Callers build a [`Form`] tree, hand it to a backend and read the edited
//! tree back when the dialog completes. Backends implement [`FormVisitor`]
//! for widget construction and [`DialogBackend`] for the entry points; the
//! walk, the edit paths and the completion bookkeeping live here once.

mod awaiter;
mod canvas;
mod dialog;
mod edit;
mod editor;
mod error;
mod file_dialog;
mod form;
mod menu;
mod path;
mod range;
mod scheduler;
mod settings;
mod visitor;

pub use awaiter::{
    Awaiter, DoneSignal, FlagAwaiter, ProcessRunAfter, RunAfter, RunAfterAwaiter, TimedAwaiter,
};
pub use canvas::{
    Canvas, CanvasRegistry, Color, FixedAdvance, MouseState, Point, Rect, RenderAtom,
    RenderAtomsUser, Shape, Style, TextMeasure, ViewRect,
};
pub use dialog::{
    AsyncForm, BlockingDialogs, Completion, DialogBackend, DialogResult, MessageKind,
    QuestionResponse, answer_once, edit_externally, execute_form_with,
};
pub use edit::{Edit, Slot, SlotRef};
pub use editor::ExternalEdit;
pub use error::{EditorError, FormError};
pub use file_dialog::{FileDialog, FileFilter, FileHandler};
pub use form::{
    Branches, ComplexString, EnableEntry, EnableForm, Form, FormData, MultiForm, PayloadKind,
    StringMap, StringSelection, StringSet, StructForm, VariantForm,
};
pub use menu::{
    ClickResult, Menu, MenuController, MenuItem, MenuList, MenuOutcome, MenuState, MenuSurface,
    MenuTabView, MenuView, NewMenu,
};
pub use path::{FieldPath, Segment};
pub use range::{Bounded, Number, Range};
pub use scheduler::{Scheduler, TaskId, TaskStatus};
pub use settings::{
    DEFAULT_DOM_OUTBOUND_QUEUE_CAP, DEFAULT_POLL_INTERVAL_MS, DOM_OUTBOUND_QUEUE_CAP_VAR,
    EDITOR_VAR, POLL_INTERVAL_VAR, Settings,
};
pub use visitor::{
    Binding, BranchUnit, EnableUnit, Field, FormVisitor, SharedForm, share, unshare, walk_form,
};
