//! Menus of clickable items and the per-display state machine behind them.

use std::fmt;

/// A replacement menu, shown in place of the one whose item was clicked.
pub struct NewMenu {
    pub title: String,
    pub menus: MenuList,
}

impl NewMenu {
    pub fn new(title: impl Into<String>, menus: MenuList) -> Self {
        Self {
            title: title.into(),
            menus,
        }
    }
}

/// What an item's click handler asks the displayed menu to do.
pub enum ClickResult {
    Keep,
    Close,
    Replace(NewMenu),
}

/// `true` keeps the menu open, `false` closes it.
impl From<bool> for ClickResult {
    fn from(keep_open: bool) -> Self {
        if keep_open {
            ClickResult::Keep
        } else {
            ClickResult::Close
        }
    }
}

impl From<NewMenu> for ClickResult {
    fn from(menu: NewMenu) -> Self {
        ClickResult::Replace(menu)
    }
}

pub struct MenuItem {
    pub label: String,
    on_click: Box<dyn FnMut() -> ClickResult>,
}

impl MenuItem {
    pub fn new<R, F>(label: impl Into<String>, mut on_click: F) -> Self
    where
        R: Into<ClickResult>,
        F: FnMut() -> R + 'static,
    {
        Self {
            label: label.into(),
            on_click: Box::new(move || on_click().into()),
        }
    }

    pub fn click(&mut self) -> ClickResult {
        (self.on_click)()
    }
}

impl fmt::Debug for MenuItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MenuItem").field("label", &self.label).finish()
    }
}

#[derive(Debug)]
pub struct Menu {
    pub title: String,
    pub items: Vec<MenuItem>,
}

impl Menu {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            items: Vec::new(),
        }
    }

    pub fn item<R, F>(mut self, label: impl Into<String>, on_click: F) -> Self
    where
        R: Into<ClickResult>,
        F: FnMut() -> R + 'static,
    {
        self.items.push(MenuItem::new(label, on_click));
        self
    }
}

/// Menus shown together as tabs of one dialog.
pub type MenuList = Vec<Menu>;

/// The labels a surface needs to draw a menu list.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuView {
    pub title: String,
    pub tabs: Vec<MenuTabView>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MenuTabView {
    pub title: String,
    pub items: Vec<String>,
}

impl MenuView {
    pub fn of(title: &str, menus: &[Menu]) -> Self {
        Self {
            title: title.to_string(),
            tabs: menus
                .iter()
                .map(|menu| MenuTabView {
                    title: menu.title.clone(),
                    items: menu.items.iter().map(|item| item.label.clone()).collect(),
                })
                .collect(),
        }
    }
}

/// Backend resources that display one menu list.
pub trait MenuSurface {
    fn open(&mut self, view: &MenuView);
    /// Tears down everything `open` created. Called at most once per `open`.
    fn close(&mut self);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuState {
    Displayed,
    Closed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MenuOutcome {
    Kept,
    Closed,
    Replaced,
    /// The click did not reach an item: unknown position, or the menu is
    /// already closed.
    Ignored,
}

pub struct MenuController<S: MenuSurface> {
    title: String,
    menus: MenuList,
    surface: S,
    state: MenuState,
}

impl<S: MenuSurface> MenuController<S> {
    pub fn open(title: impl Into<String>, menus: MenuList, mut surface: S) -> Self {
        let title = title.into();
        surface.open(&MenuView::of(&title, &menus));
        Self {
            title,
            menus,
            surface,
            state: MenuState::Displayed,
        }
    }

    pub fn state(&self) -> MenuState {
        self.state
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn menus(&self) -> &[Menu] {
        &self.menus
    }

    pub fn surface(&self) -> &S {
        &self.surface
    }

    pub fn surface_mut(&mut self) -> &mut S {
        &mut self.surface
    }

    pub fn view(&self) -> MenuView {
        MenuView::of(&self.title, &self.menus)
    }

    /// Runs the handler of item `item` on tab `tab` and applies its result.
    pub fn click(&mut self, tab: usize, item: usize) -> MenuOutcome {
        if self.state == MenuState::Closed {
            log::debug!("click on closed menu {:?} ignored", self.title);
            return MenuOutcome::Ignored;
        }

        let Some(entry) = self
            .menus
            .get_mut(tab)
            .and_then(|menu| menu.items.get_mut(item))
        else {
            log::warn!("menu {:?} has no item {tab}/{item}", self.title);
            return MenuOutcome::Ignored;
        };

        match entry.click() {
            ClickResult::Keep => MenuOutcome::Kept,
            ClickResult::Close => {
                self.close();
                MenuOutcome::Closed
            }
            ClickResult::Replace(next) => {
                self.surface.close();
                log::debug!("menu {:?} replaced by {:?}", self.title, next.title);
                self.title = next.title;
                self.menus = next.menus;
                self.surface.open(&MenuView::of(&self.title, &self.menus));
                MenuOutcome::Replaced
            }
        }
    }

    /// Closes the display and drops the item handlers. Also what dismissing
    /// the dialog through its close affordance does.
    pub fn close(&mut self) -> bool {
        if self.state == MenuState::Closed {
            return false;
        }

        self.surface.close();
        self.menus.clear();
        self.state = MenuState::Closed;
        log::debug!("menu {:?} closed", self.title);
        true
    }
}

impl<S: MenuSurface> Drop for MenuController<S> {
    fn drop(&mut self) {
        self.close();
    }
}
