//! Desktop backend: forms, menus and message boxes as Slint windows, file
//! pickers through the platform's native dialogs.

mod backend;
mod canvas;
mod files;
mod menu;
mod rows;

slint::include_modules!();

pub use backend::{SlintBackend, WindowId};
pub use canvas::screen_atoms;
pub use files::{PickMode, pick};
pub use menu::SlintMenuSurface;
pub use rows::{FormRows, Gate, Role, RowKind, RowSpec, RowView};
