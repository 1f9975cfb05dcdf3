use crate::backend::{Inner, SlintBackend};
use crate::{MenuDialog, MenuTab};
use formkit::{MenuSurface, MenuView};
use slint::{CloseRequestResponse, ComponentHandle, ModelRc, SharedString, VecModel};
use std::rc::Weak;
use std::time::Duration;

/// Shows a menu list as a window of buttons, one column section per tab.
///
/// Clicks are handed to the backend on the next turn of the event loop, so a
/// handler that closes or replaces the menu never drops the window from
/// inside its own callback.
pub struct SlintMenuSurface {
    pub(crate) backend: Weak<Inner>,
    pub(crate) session: u64,
    pub(crate) dialog: Option<MenuDialog>,
}

impl SlintMenuSurface {
    pub fn is_shown(&self) -> bool {
        self.dialog.is_some()
    }
}

pub(crate) fn menu_tabs(view: &MenuView) -> Vec<MenuTab> {
    view.tabs
        .iter()
        .map(|tab| MenuTab {
            title: SharedString::from(tab.title.as_str()),
            items: ModelRc::new(VecModel::from(
                tab.items
                    .iter()
                    .map(|item| SharedString::from(item.as_str()))
                    .collect::<Vec<_>>(),
            )),
        })
        .collect()
}

impl MenuSurface for SlintMenuSurface {
    fn open(&mut self, view: &MenuView) {
        let dialog = match MenuDialog::new() {
            Ok(dialog) => dialog,
            Err(err) => {
                log::error!("cannot create menu {:?}: {err}", view.title);
                return;
            }
        };
        dialog.set_heading(SharedString::from(view.title.as_str()));
        dialog.set_tabs(ModelRc::new(VecModel::from(menu_tabs(view))));

        let weak = self.backend.clone();
        let session = self.session;
        dialog.on_item_clicked(move |tab, item| {
            let (Ok(tab), Ok(item)) = (usize::try_from(tab), usize::try_from(item)) else {
                return;
            };
            let weak = weak.clone();
            slint::Timer::single_shot(Duration::ZERO, move || {
                if let Some(backend) = SlintBackend::from_weak(&weak) {
                    backend.click_menu(session, tab, item);
                }
            });
        });

        let weak = self.backend.clone();
        dialog.on_dismissed(move || defer_dismiss(weak.clone(), session));

        let weak = self.backend.clone();
        dialog.window().on_close_requested(move || {
            defer_dismiss(weak.clone(), session);
            CloseRequestResponse::HideWindow
        });

        if let Err(err) = dialog.show() {
            log::error!("cannot show menu {:?}: {err}", view.title);
            return;
        }
        self.dialog = Some(dialog);
    }

    fn close(&mut self) {
        if let Some(dialog) = self.dialog.take() {
            if let Err(err) = dialog.hide() {
                log::warn!("failed to hide menu window: {err}");
            }
        }
    }
}

fn defer_dismiss(weak: Weak<Inner>, session: u64) {
    slint::Timer::single_shot(Duration::ZERO, move || {
        if let Some(backend) = SlintBackend::from_weak(&weak) {
            backend.dismiss_menu(session);
        }
    });
}
