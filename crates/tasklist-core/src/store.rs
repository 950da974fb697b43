use chrono::{DateTime, SubsecRound, Utc};
use tracing::{debug, instrument, trace, warn};

use crate::task::{Priority, Task};
use crate::view::{self, FilterMode, SortMode, ViewQuery, ViewRow};

/// Issues ids that look like creation timestamps (milliseconds) but are
/// strictly increasing, so two inserts in the same millisecond still differ.
/// Returns `None` once `u64::MAX` has been handed out.
#[derive(Debug, Clone, Default)]
pub struct IdAllocator {
    last: u64,
}

impl IdAllocator {
    pub fn seeded_from(tasks: &[Task]) -> Self {
        Self {
            last: tasks.iter().map(|t| t.id).max().unwrap_or(0),
        }
    }

    pub fn next(&mut self, now: DateTime<Utc>) -> Option<u64> {
        let millis = u64::try_from(now.timestamp_millis()).unwrap_or(0);
        self.last = millis.max(self.last.checked_add(1)?);
        Some(self.last)
    }
}

/// Buffered edits for the task currently open in the editor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditBuffer {
    pub id: u64,
    pub text: String,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Priority,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct UiState {
    pub filter: FilterMode,
    pub search: String,
    pub sort: SortMode,
    pub editing: Option<EditBuffer>,
}

impl UiState {
    pub fn query(&self) -> ViewQuery {
        ViewQuery {
            filter: self.filter,
            search: self.search.clone(),
            sort: self.sort,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Action {
    Add {
        text: String,
        deadline: Option<DateTime<Utc>>,
        priority: Priority,
    },
    Toggle(u64),
    Delete(u64),
    StartEdit(u64),
    SaveEdit {
        id: u64,
        text: String,
        deadline: Option<DateTime<Utc>>,
        priority: Priority,
    },
    CancelEdit,
    /// Drag gesture end. `destination` is `None` when the drag was cancelled.
    Reorder {
        source: usize,
        destination: Option<usize>,
    },
    SetFilter(FilterMode),
    SetSearch(String),
    SetSort(SortMode),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Outcome {
    /// The canonical list changed and must be mirrored to storage.
    pub tasks_changed: bool,
}

impl Outcome {
    fn changed(tasks_changed: bool) -> Self {
        Self { tasks_changed }
    }
}

#[derive(Debug, Clone, Default)]
pub struct TaskList {
    tasks: Vec<Task>,
    ui: UiState,
    ids: IdAllocator,
}

impl TaskList {
    pub fn new(tasks: Vec<Task>) -> Self {
        let ids = IdAllocator::seeded_from(&tasks);
        Self {
            tasks,
            ui: UiState::default(),
            ids,
        }
    }

    pub fn with_ui(mut self, ui: UiState) -> Self {
        self.ui = ui;
        self
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    pub fn ui(&self) -> &UiState {
        &self.ui
    }

    pub fn get(&self, id: u64) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == id)
    }

    pub fn view(&self) -> Vec<ViewRow<'_>> {
        view::derive(&self.tasks, &self.ui.query())
    }

    #[instrument(skip(self, now))]
    pub fn apply(&mut self, action: Action, now: DateTime<Utc>) -> Outcome {
        match action {
            Action::Add {
                text,
                deadline,
                priority,
            } => Outcome::changed(self.add(&text, deadline, priority, now).is_some()),
            Action::Toggle(id) => Outcome::changed(self.toggle(id)),
            Action::Delete(id) => Outcome::changed(self.delete(id)),
            Action::StartEdit(id) => {
                self.start_edit(id);
                Outcome::default()
            }
            Action::SaveEdit {
                id,
                text,
                deadline,
                priority,
            } => Outcome::changed(self.save_edit(id, &text, deadline, priority)),
            Action::CancelEdit => {
                self.ui.editing = None;
                Outcome::default()
            }
            Action::Reorder {
                source,
                destination,
            } => Outcome::changed(self.reorder(source, destination)),
            Action::SetFilter(filter) => {
                self.ui.filter = filter;
                Outcome::default()
            }
            Action::SetSearch(search) => {
                self.ui.search = search;
                Outcome::default()
            }
            Action::SetSort(sort) => {
                self.ui.sort = sort;
                Outcome::default()
            }
        }
    }

    /// Appends a task; blank text is ignored. Returns the new id.
    /// Timestamps are kept at millisecond precision, the stored resolution.
    pub fn add(
        &mut self,
        text: &str,
        deadline: Option<DateTime<Utc>>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> Option<u64> {
        let text = text.trim();
        if text.is_empty() {
            debug!("ignoring add with blank text");
            return None;
        }

        let Some(id) = self.ids.next(now) else {
            warn!("task ids exhausted, ignoring add");
            return None;
        };
        let now = now.trunc_subsecs(3);
        let deadline = deadline.map(|d| d.trunc_subsecs(3));
        self.tasks
            .push(Task::new(id, text.to_string(), now, deadline, priority));
        debug!(id, total = self.tasks.len(), "task added");
        Some(id)
    }

    pub fn toggle(&mut self, id: u64) -> bool {
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            trace!(id, "toggle: no such task");
            return false;
        };
        task.completed = !task.completed;
        true
    }

    pub fn delete(&mut self, id: u64) -> bool {
        let before = self.tasks.len();
        self.tasks.retain(|t| t.id != id);
        if self.ui.editing.as_ref().is_some_and(|e| e.id == id) {
            self.ui.editing = None;
        }
        self.tasks.len() != before
    }

    pub fn start_edit(&mut self, id: u64) -> Option<&EditBuffer> {
        let task = self.tasks.iter().find(|t| t.id == id)?;
        self.ui.editing = Some(EditBuffer {
            id,
            text: task.text.clone(),
            deadline: task.deadline,
            priority: task.priority,
        });
        self.ui.editing.as_ref()
    }

    pub fn editing(&self) -> Option<&EditBuffer> {
        self.ui.editing.as_ref()
    }

    /// Commits edited fields. Closes the editor either way; blank text
    /// leaves the record untouched.
    pub fn save_edit(
        &mut self,
        id: u64,
        text: &str,
        deadline: Option<DateTime<Utc>>,
        priority: Priority,
    ) -> bool {
        self.ui.editing = None;

        let text = text.trim();
        if text.is_empty() {
            debug!(id, "ignoring edit with blank text");
            return false;
        }

        let Some(task) = self.tasks.iter_mut().find(|t| t.id == id) else {
            trace!(id, "save_edit: no such task");
            return false;
        };
        let deadline = deadline.map(|d| d.trunc_subsecs(3));

        let changed =
            task.text != text || task.deadline != deadline || task.priority != priority;
        task.text = text.to_string();
        task.deadline = deadline;
        task.priority = priority;
        changed
    }

    /// Moves the task at `source` to `destination` in the canonical list.
    pub fn reorder(&mut self, source: usize, destination: Option<usize>) -> bool {
        let Some(destination) = destination else {
            trace!(source, "reorder cancelled");
            return false;
        };
        if source >= self.tasks.len() {
            trace!(source, len = self.tasks.len(), "reorder source out of range");
            return false;
        }

        let item = self.tasks.remove(source);
        let destination = destination.min(self.tasks.len());
        self.tasks.insert(destination, item);
        debug!(source, destination, "task reordered");
        source != destination
    }
}
