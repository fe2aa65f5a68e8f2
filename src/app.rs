use std::sync::Arc;

use log::debug;

use crate::dictionary::Dictionary;
use crate::error::{Result, StardictError};
use crate::registry::Registry;
use crate::view::{ViewModel, Viewport};

/// One input event for [`Viewer::handle`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewerEvent {
    Insert(char),
    SetInput(String),
    Backspace,
    Delete,
    CursorLeft,
    CursorRight,
    Home,
    End,
    DeleteWord,
    Clear,
    /// Scroll by this many lines, positive towards the end.
    ScrollLines(i32),
    /// Scroll by whole viewport heights.
    ScrollPages(i32),
    SelectNext,
    SelectPrev,
    Resize { width: i32, height: i32 },
    NextDictionary,
    PrevDictionary,
    SelectDictionary(usize),
    Quit,
}

/// The event loop's state: loaded dictionaries plus the view over the
/// active one. Events are processed one at a time on the caller's thread.
pub struct Viewer {
    registry: Registry,
    view: ViewModel,
}

impl Viewer {
    /// `registry` must already be loaded; its active slot is shown first.
    pub fn new(registry: Registry, viewport: Viewport, center_search: bool) -> Result<Self> {
        let dict = registry
            .active()
            .cloned()
            .ok_or_else(|| StardictError::InvalidArgument("no dictionary loaded".to_string()))?;
        let view = ViewModel::new(dict, viewport).with_center_search(center_search);
        Ok(Self { registry, view })
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    pub fn view(&self) -> &ViewModel {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ViewModel {
        &mut self.view
    }

    pub fn active_dictionary(&self) -> &Arc<Dictionary> {
        self.view.dictionary()
    }

    /// Display name of the active slot.
    pub fn active_name(&self) -> &str {
        self.registry
            .slots()
            .get(self.registry.active_index())
            .map_or("", |s| s.display_name.as_str())
    }

    /// Apply `event`. Returns `Ok(false)` once the viewer should stop.
    /// A failed dictionary switch leaves the current view untouched.
    pub fn handle(&mut self, event: ViewerEvent) -> Result<bool> {
        debug!("event {:?}", event);
        match event {
            ViewerEvent::Insert(c) => self.view.insert_char(c),
            ViewerEvent::SetInput(s) => self.view.set_input(&s),
            ViewerEvent::Backspace => self.view.backspace(),
            ViewerEvent::Delete => self.view.delete(),
            ViewerEvent::CursorLeft => self.view.cursor_left(),
            ViewerEvent::CursorRight => self.view.cursor_right(),
            ViewerEvent::Home => self.view.cursor_home(),
            ViewerEvent::End => self.view.cursor_end(),
            ViewerEvent::DeleteWord => self.view.delete_word(),
            ViewerEvent::Clear => self.view.clear_input(),
            ViewerEvent::ScrollLines(n) => self.view.scroll_lines(n),
            ViewerEvent::ScrollPages(n) => {
                let page = self.view.viewport().height;
                self.view.scroll(n.saturating_mul(page));
            }
            ViewerEvent::SelectNext => self.view.select_next(),
            ViewerEvent::SelectPrev => self.view.select_prev(),
            ViewerEvent::Resize { width, height } => {
                self.view.resize(Viewport::new(width, height))
            }
            ViewerEvent::NextDictionary => {
                let dict = self.registry.next()?;
                self.view.switch_dictionary(dict);
            }
            ViewerEvent::PrevDictionary => {
                let dict = self.registry.prev()?;
                self.view.switch_dictionary(dict);
            }
            ViewerEvent::SelectDictionary(i) => {
                let dict = self.registry.set_active(i)?;
                self.view.switch_dictionary(dict);
            }
            ViewerEvent::Quit => return Ok(false),
        }
        Ok(true)
    }
}
