use crate::command::Command;
use crate::entity::Document;
use crate::statics;
use crate::workspace::{DocumentEvent, Workspace};
use std::collections::VecDeque;
use std::rc::Rc;
use tracing::debug;

/// Observer of document events. A listener may answer an event with commands
/// describing edits it already applied; the manager records them when it is
/// idle and drops them while an undo/redo/execute is in progress.
pub trait DocumentListener {
    fn on_event(&mut self, event: &DocumentEvent, document: &Document) -> Vec<Box<dyn Command>>;
}

/// Undo/redo log with a bounded history.
pub struct UndoManager {
    /// Oldest at the front, top of stack at the back.
    undo_stack: VecDeque<Rc<dyn Command>>,
    redo_stack: Vec<Rc<dyn Command>>,
    /// Newest first.
    history: VecDeque<Rc<dyn Command>>,
    max_history: usize,
    executing: bool,
    saved: Option<Rc<dyn Command>>,
    listeners: Vec<Box<dyn DocumentListener>>,
}

impl Default for UndoManager {
    fn default() -> Self {
        Self::new(statics::DEFAULT_MAX_HISTORY)
    }
}

impl std::fmt::Debug for UndoManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("UndoManager")
            .field("undo", &self.undo_stack.len())
            .field("redo", &self.redo_stack.len())
            .field("max_history", &self.max_history)
            .field("executing", &self.executing)
            .field("listeners", &self.listeners.len())
            .finish()
    }
}

impl UndoManager {
    pub fn new(max_history: usize) -> Self {
        Self {
            undo_stack: VecDeque::new(),
            redo_stack: Vec::new(),
            history: VecDeque::new(),
            max_history,
            executing: false,
            saved: None,
            listeners: Vec::new(),
        }
    }

    pub fn add_listener(&mut self, listener: Box<dyn DocumentListener>) {
        self.listeners.push(listener);
    }

    /// Run `command` and push it. Returns false (and does nothing) when called
    /// while another history operation is in progress.
    pub fn execute(&mut self, command: impl Command + 'static, workspace: &mut Workspace) -> bool {
        self.execute_rc(Rc::new(command), workspace)
    }

    pub fn execute_boxed(&mut self, command: Box<dyn Command>, workspace: &mut Workspace) -> bool {
        self.execute_rc(Rc::from(command), workspace)
    }

    fn execute_rc(&mut self, command: Rc<dyn Command>, workspace: &mut Workspace) -> bool {
        if self.executing {
            debug!(command = %command.description(), "execute suppressed while busy");
            return false;
        }
        self.executing = true;
        debug!(command = %command.description(), "execute");
        command.execute(workspace);
        self.push(command);
        self.deliver(workspace);
        self.executing = false;
        true
    }

    /// Push a command whose effect has already been applied. Does not hold the
    /// busy guard, so listener follow-ups to the applied edit are recorded too.
    pub fn record(&mut self, command: impl Command + 'static, workspace: &mut Workspace) -> bool {
        self.record_rc(Rc::new(command), workspace)
    }

    pub fn record_boxed(&mut self, command: Box<dyn Command>, workspace: &mut Workspace) -> bool {
        self.record_rc(Rc::from(command), workspace)
    }

    fn record_rc(&mut self, command: Rc<dyn Command>, workspace: &mut Workspace) -> bool {
        if self.executing {
            debug!(command = %command.description(), "record suppressed while busy");
            return false;
        }
        debug!(command = %command.description(), "record");
        self.push(command);
        self.deliver(workspace);
        true
    }

    pub fn undo(&mut self, workspace: &mut Workspace) -> bool {
        if self.executing {
            return false;
        }
        let Some(command) = self.undo_stack.pop_back() else {
            return false;
        };
        self.executing = true;
        debug!(command = %command.description(), "undo");
        command.undo(workspace);
        self.redo_stack.push(command);
        self.deliver(workspace);
        self.executing = false;
        true
    }

    pub fn redo(&mut self, workspace: &mut Workspace) -> bool {
        if self.executing {
            return false;
        }
        let Some(command) = self.redo_stack.pop() else {
            return false;
        };
        self.executing = true;
        debug!(command = %command.description(), "redo");
        command.execute(workspace);
        self.undo_stack.push_back(command);
        self.deliver(workspace);
        self.executing = false;
        true
    }

    /// Hand queued workspace events to the listeners and record whatever they
    /// return. Call after mutating the workspace outside the manager.
    pub fn dispatch(&mut self, workspace: &mut Workspace) {
        self.deliver(workspace);
    }

    fn deliver(&mut self, workspace: &mut Workspace) {
        let events = workspace.take_events();
        if events.is_empty() || self.listeners.is_empty() {
            return;
        }
        let mut follow_ups = Vec::new();
        for event in &events {
            for listener in &mut self.listeners {
                follow_ups.extend(listener.on_event(event, workspace.document()));
            }
        }
        for command in follow_ups {
            self.record_boxed(command, workspace);
        }
    }

    fn push(&mut self, command: Rc<dyn Command>) {
        self.undo_stack.push_back(Rc::clone(&command));
        self.history.push_front(command);
        self.redo_stack.clear();
        self.trim();
    }

    fn trim(&mut self) {
        while self.undo_stack.len() > self.max_history {
            let Some(oldest) = self.undo_stack.pop_front() else {
                break;
            };
            if let Some(pos) = self.history.iter().position(|c| Rc::ptr_eq(c, &oldest)) {
                self.history.remove(pos);
            }
        }
    }

    pub fn clear(&mut self) {
        self.undo_stack.clear();
        self.redo_stack.clear();
        self.history.clear();
        self.saved = None;
    }

    pub fn mark_saved(&mut self) {
        self.saved = self.undo_stack.back().cloned();
    }

    /// Whether the document differs from the last save point.
    pub fn is_modified(&self) -> bool {
        match (self.undo_stack.back(), &self.saved) {
            (None, saved) => saved.is_some(),
            (Some(top), Some(saved)) => !Rc::ptr_eq(top, saved),
            (Some(_), None) => true,
        }
    }

    pub fn can_undo(&self) -> bool {
        !self.undo_stack.is_empty()
    }

    pub fn can_redo(&self) -> bool {
        !self.redo_stack.is_empty()
    }

    pub fn undo_description(&self) -> Option<String> {
        self.undo_stack.back().map(|c| c.description())
    }

    pub fn redo_description(&self) -> Option<String> {
        self.redo_stack.last().map(|c| c.description())
    }

    pub fn undo_len(&self) -> usize {
        self.undo_stack.len()
    }

    pub fn redo_len(&self) -> usize {
        self.redo_stack.len()
    }

    /// Executed/recorded commands, newest first.
    pub fn history(&self) -> impl Iterator<Item = &dyn Command> {
        self.history.iter().map(|c| c.as_ref())
    }

    pub fn is_executing(&self) -> bool {
        self.executing
    }

    pub fn max_history(&self) -> usize {
        self.max_history
    }

    pub fn set_max_history(&mut self, max_history: usize) {
        self.max_history = max_history;
        self.trim();
    }
}
