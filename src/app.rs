use anyhow::{Context, Result};
use crossterm::event::KeyCode;

use crate::{
    clipboard::{BrowserOpener, ClipboardSink},
    sitemap::LoadedTree,
    tree::{NodeId, SiteTree},
    view::{NodeEvent, ViewKind, ViewState, VisibleNode, selection_label},
};

pub struct Toast {
    pub message: String,
    pub remaining: u8,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum KeyAction {
    None,
    Quit,
    Reload,
}

/// One browsing session: the loaded tree, its view state and the cursor row.
pub struct App {
    pub tree: SiteTree,
    pub view: ViewState,
    pub cursor: usize,
    pub status: Option<String>,
    pub toast: Option<Toast>,
    pending_g: bool,
}

impl App {
    pub const TOAST_TTL: u8 = 10;

    pub fn new(tree: SiteTree, kind: ViewKind, status: String) -> Self {
        let view = ViewState::new(&tree, kind);
        Self {
            tree,
            view,
            cursor: 0,
            status: Some(status),
            toast: None,
            pending_g: false,
        }
    }

    pub fn from_loaded(loaded: LoadedTree, kind: ViewKind) -> Self {
        let status = loaded.summary();
        Self::new(loaded.tree, kind, status)
    }

    pub fn visible_nodes(&self) -> Vec<VisibleNode> {
        self.view.visible_nodes(&self.tree)
    }

    pub fn ensure_cursor(&mut self, visible_len: usize) {
        if visible_len == 0 {
            self.cursor = 0;
        } else if self.cursor >= visible_len {
            self.cursor = visible_len - 1;
        }
    }

    fn cursor_node(&self, visible: &[VisibleNode]) -> Option<NodeId> {
        visible.get(self.cursor).map(|row| row.id)
    }

    /// Node that copy/open act on: the selection, else the row under the cursor.
    pub fn target_node(&self, visible: &[VisibleNode]) -> Option<NodeId> {
        self.view.selected().or_else(|| self.cursor_node(visible))
    }

    fn place_cursor_on(&mut self, id: NodeId) {
        let visible = self.visible_nodes();
        self.cursor = visible.iter().position(|row| row.id == id).unwrap_or(0);
    }

    fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    fn move_down(&mut self, visible_len: usize) {
        if self.cursor + 1 < visible_len {
            self.cursor += 1;
        }
    }

    fn move_bottom(&mut self, visible_len: usize) {
        self.cursor = visible_len.saturating_sub(1);
    }

    /// Enter on a row: the displayed root asks to go up, any other row is a
    /// regular node click.
    fn click(&mut self, visible: &[VisibleNode]) {
        let Some(id) = self.cursor_node(visible) else {
            return;
        };
        if id == self.view.current_root() {
            self.back_to_parent();
        } else {
            self.view.dispatch(&self.tree, NodeEvent::Click, id);
            let label = selection_label(self.tree.effective_url(id));
            self.set_status(format!("selected {label}"));
        }
    }

    fn back_to_parent(&mut self) {
        let previous = self.view.current_root();
        if self
            .view
            .dispatch(&self.tree, NodeEvent::BackToParent, previous)
        {
            self.place_cursor_on(previous);
        } else if !self.view.kind().supports_back_to_parent() {
            self.set_status("sunburst view cannot go up from its centre".to_string());
        } else {
            self.set_status("already at the top of the site".to_string());
        }
    }

    fn go_to_parent(&mut self) {
        let previous = self.view.current_root();
        if self.view.go_to_parent(&self.tree) {
            self.place_cursor_on(previous);
        } else {
            self.set_status("already at the top of the site".to_string());
        }
    }

    fn collapse_or_parent(&mut self, visible: &[VisibleNode]) {
        let Some(id) = self.cursor_node(visible) else {
            return;
        };
        if id == self.view.current_root() {
            return;
        }
        if !self.view.view_children(&self.tree, id).is_empty() {
            self.view.toggle_node(&self.tree, id);
        } else if let Some(parent) = self.tree.parent(id) {
            self.place_cursor_on(parent);
        }
    }

    fn expand_or_child(&mut self, visible: &[VisibleNode]) {
        let Some(id) = self.cursor_node(visible) else {
            return;
        };
        if !self.view.hidden_children(&self.tree, id).is_empty() {
            self.view.toggle_node(&self.tree, id);
        } else if let Some(&child) = self.view.view_children(&self.tree, id).first() {
            self.place_cursor_on(child);
        }
    }

    fn set_root_to_selection(&mut self) {
        let Some(id) = self.view.selected() else {
            self.set_status("nothing selected".to_string());
            return;
        };
        if self.view.set_root(&self.tree, id) {
            self.cursor = 0;
            let label = selection_label(self.tree.effective_url(id));
            self.set_status(format!("root: {label}"));
        }
    }

    fn reset_root(&mut self) {
        self.view.reset_root(&self.tree);
        self.cursor = 0;
        self.set_status("root reset".to_string());
    }

    fn switch_view(&mut self) {
        let kind = self.view.kind().next();
        self.view.set_kind(&self.tree, kind);
        self.set_status(format!("view: {}", kind.label()));
    }

    pub fn yank_target<C: ClipboardSink + ?Sized>(
        &mut self,
        visible: &[VisibleNode],
        clipboard: &mut C,
    ) -> Result<String> {
        let Some(id) = self.target_node(visible) else {
            anyhow::bail!("no selection");
        };
        let url = self.tree.effective_url(id).to_string();
        clipboard
            .set_text(url.clone())
            .with_context(|| format!("copying {url}"))?;
        Ok(url)
    }

    pub fn open_target<B: BrowserOpener + ?Sized>(
        &mut self,
        visible: &[VisibleNode],
        browser: &mut B,
    ) -> Result<String> {
        let Some(id) = self.target_node(visible) else {
            anyhow::bail!("no selection");
        };
        let url = self.tree.effective_url(id).to_string();
        browser.open(&url)?;
        Ok(url)
    }

    pub fn set_status(&mut self, message: String) {
        self.status = Some(message);
    }

    pub fn set_toast(&mut self, message: String) {
        self.toast = Some(Toast {
            message,
            remaining: Self::TOAST_TTL,
        });
    }

    pub fn tick_toast(&mut self) {
        if let Some(toast) = self.toast.as_mut() {
            toast.remaining = toast.remaining.saturating_sub(1);
            if toast.remaining == 0 {
                self.toast = None;
            }
        }
    }

    fn consume_pending_g(&mut self) -> bool {
        std::mem::take(&mut self.pending_g)
    }

    pub fn handle_key(
        &mut self,
        key: KeyCode,
        visible: &[VisibleNode],
        clipboard: Option<&mut dyn ClipboardSink>,
        browser: &mut dyn BrowserOpener,
    ) -> Result<KeyAction> {
        let action = match key {
            KeyCode::Char('q') => KeyAction::Quit,
            KeyCode::Char('r') => KeyAction::Reload,
            KeyCode::Up | KeyCode::Char('k') => {
                self.move_up();
                KeyAction::None
            }
            KeyCode::Down | KeyCode::Char('j') => {
                self.move_down(visible.len());
                KeyAction::None
            }
            KeyCode::Left | KeyCode::Char('h') => {
                self.collapse_or_parent(visible);
                KeyAction::None
            }
            KeyCode::Right | KeyCode::Char('l') => {
                self.expand_or_child(visible);
                KeyAction::None
            }
            KeyCode::Enter | KeyCode::Char(' ') => {
                self.click(visible);
                KeyAction::None
            }
            KeyCode::Char('s') => {
                self.set_root_to_selection();
                KeyAction::None
            }
            KeyCode::Char('u') | KeyCode::Backspace => {
                self.go_to_parent();
                KeyAction::None
            }
            KeyCode::Char('R') => {
                self.reset_root();
                KeyAction::None
            }
            KeyCode::Char('v') => {
                self.switch_view();
                KeyAction::None
            }
            KeyCode::Char('g') => {
                if self.consume_pending_g() {
                    self.cursor = 0;
                } else {
                    self.pending_g = true;
                }
                KeyAction::None
            }
            KeyCode::Char('G') => {
                self.move_bottom(visible.len());
                KeyAction::None
            }
            KeyCode::Char('y') => {
                if let Some(clipboard) = clipboard {
                    match self.yank_target(visible, clipboard) {
                        Ok(url) => {
                            self.set_status(format!("copied {url}"));
                            self.set_toast("Copied URL".to_string());
                        }
                        Err(err) => self.set_status(format!("copy failed: {err:#}")),
                    }
                } else {
                    self.set_status("clipboard unavailable".to_string());
                }
                KeyAction::None
            }
            KeyCode::Char('o') => {
                match self.open_target(visible, browser) {
                    Ok(url) => self.set_status(format!("opened {url}")),
                    Err(err) => self.set_status(format!("open failed: {err}")),
                }
                KeyAction::None
            }
            _ => KeyAction::None,
        };

        if key != KeyCode::Char('g') {
            self.pending_g = false;
        }

        Ok(action)
    }
}
