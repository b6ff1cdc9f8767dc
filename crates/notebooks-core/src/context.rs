//! Transactional contexts
//!
//! A context is a unit of work: it reads through an immutable snapshot of
//! committed records and tracks its own pending changes until it is saved.
//!
//! - [`MainContext`] is owned by the UI lane. Saving it writes to the backing
//!   store. It notifies result sets when its visible state changes.
//! - [`BackgroundContext`] is a child of the main context, confined to one
//!   background lane. Saving it pushes its changes to the main context,
//!   where they stay pending until the main context is saved.
//!
//! Records never cross contexts. Hand over an id and resolve it again with
//! [`ObjectContext::notebook`], [`ObjectContext::note`] or
//! [`ObjectContext::photograph`].

use std::collections::HashMap;
use std::hash::Hash;
use std::mem;
use std::sync::Arc;

use tokio::sync::{broadcast, mpsc};
use tracing::{debug, info, warn};

use crate::graph::{ChangeKind, ChangeSet, ObjectGraph, Pending};
use crate::models::{Note, NoteId, Notebook, NotebookId, ObjectId, Photograph, PhotographId};
use crate::storage::{SqliteStore, StoreError, StoreResult};

/// Capacity of the main context's notification channel
///
/// Result sets that fall further behind than this refetch from scratch.
const NOTIFICATION_CAPACITY: usize = 64;

/// Change notification posted by the main context
#[derive(Debug, Clone, PartialEq)]
pub enum ContextNotification {
    /// Objects visible through the context were inserted, updated or deleted
    ObjectsChanged {
        inserted: Vec<ObjectId>,
        updated: Vec<ObjectId>,
        deleted: Vec<ObjectId>,
    },
    /// The context discarded everything it was tracking
    Reset,
}

/// Pending changes of a context on top of a committed snapshot
///
/// Reads resolve through `changes`, then `sent`, then `base`.
#[derive(Debug)]
pub struct UnitOfWork {
    base: Arc<ObjectGraph>,
    /// Changes already pushed to the parent context (child contexts only)
    sent: ChangeSet,
    changes: ChangeSet,
    unposted: Vec<(ObjectId, ChangeKind)>,
}

fn layered<'a, K, T>(
    id: &K,
    changes: &'a HashMap<K, Pending<T>>,
    sent: &'a HashMap<K, Pending<T>>,
    base: &'a HashMap<K, T>,
) -> Option<&'a T>
where
    K: Eq + Hash,
{
    match changes.get(id).or_else(|| sent.get(id)) {
        Some(change) => change.value(),
        None => base.get(id),
    }
}

fn layered_values<'a, K, T>(
    changes: &'a HashMap<K, Pending<T>>,
    sent: &'a HashMap<K, Pending<T>>,
    base: &'a HashMap<K, T>,
) -> impl Iterator<Item = &'a T>
where
    K: Eq + Hash,
{
    let committed = base
        .iter()
        .filter(move |(id, _)| !changes.contains_key(*id) && !sent.contains_key(*id))
        .map(|(_, value)| value);
    let pushed = sent
        .iter()
        .filter(move |(id, _)| !changes.contains_key(*id))
        .filter_map(|(_, change)| change.value());
    committed
        .chain(pushed)
        .chain(changes.values().filter_map(Pending::value))
}

impl UnitOfWork {
    pub(crate) fn new(base: Arc<ObjectGraph>) -> Self {
        Self {
            base,
            sent: ChangeSet::default(),
            changes: ChangeSet::default(),
            unposted: Vec::new(),
        }
    }

    pub fn has_changes(&self) -> bool {
        !self.changes.is_empty()
    }

    pub(crate) fn changes(&self) -> &ChangeSet {
        &self.changes
    }

    fn notebook(&self, id: NotebookId) -> Option<&Notebook> {
        layered(
            &id,
            &self.changes.notebooks,
            &self.sent.notebooks,
            &self.base.notebooks,
        )
    }

    fn note(&self, id: NoteId) -> Option<&Note> {
        layered(&id, &self.changes.notes, &self.sent.notes, &self.base.notes)
    }

    fn photograph(&self, id: PhotographId) -> Option<&Photograph> {
        layered(
            &id,
            &self.changes.photographs,
            &self.sent.photographs,
            &self.base.photographs,
        )
    }

    fn notebooks(&self) -> impl Iterator<Item = &Notebook> {
        layered_values(
            &self.changes.notebooks,
            &self.sent.notebooks,
            &self.base.notebooks,
        )
    }

    fn notes(&self) -> impl Iterator<Item = &Note> {
        layered_values(&self.changes.notes, &self.sent.notes, &self.base.notes)
    }

    /// The notebook or note currently holding `photograph`
    fn owner_of(&self, photograph: PhotographId) -> Option<ObjectId> {
        if let Some(nb) = self
            .notebooks()
            .find(|nb| nb.photograph == Some(photograph))
        {
            return Some(nb.id.into());
        }
        self.notes()
            .find(|note| note.photograph == Some(photograph))
            .map(|note| note.id.into())
    }

    fn record_notebook(&mut self, id: NotebookId, change: Pending<Notebook>) {
        self.unposted.push((id.into(), change.kind()));
        self.changes.record_notebook(id, change);
    }

    fn record_note(&mut self, id: NoteId, change: Pending<Note>) {
        self.unposted.push((id.into(), change.kind()));
        self.changes.record_note(id, change);
    }

    fn record_photograph(&mut self, id: PhotographId, change: Pending<Photograph>) {
        self.unposted.push((id.into(), change.kind()));
        self.changes.record_photograph(id, change);
    }

    /// A record `child` points at that is visible neither here nor in `child`
    fn dangling_reference(&self, child: &ChangeSet) -> Option<ObjectId> {
        let photograph_visible = |id: PhotographId| match child.photographs.get(&id) {
            Some(change) => change.value().is_some(),
            None => self.photograph(id).is_some(),
        };

        for notebook in child.notebooks.values().filter_map(Pending::value) {
            if let Some(photograph) = notebook.photograph.filter(|p| !photograph_visible(*p)) {
                return Some(photograph.into());
            }
        }
        for note in child.notes.values().filter_map(Pending::value) {
            let notebook_visible = match child.notebooks.get(&note.notebook) {
                Some(change) => change.value().is_some(),
                None => self.notebook(note.notebook).is_some(),
            };
            if !notebook_visible {
                return Some(note.notebook.into());
            }
            if let Some(photograph) = note.photograph.filter(|p| !photograph_visible(*p)) {
                return Some(photograph.into());
            }
        }
        None
    }

    /// Fold a child's saved changes into the pending set
    fn merge(&mut self, child: ChangeSet) {
        self.unposted.extend(child.entries());
        self.changes.merge(child);
    }

    /// Make pending changes part of the committed snapshot
    fn commit(&mut self) {
        let changes = mem::take(&mut self.changes);
        Arc::make_mut(&mut self.base).apply(&changes);
    }

    fn take_changes(&mut self) -> ChangeSet {
        mem::take(&mut self.changes)
    }

    fn restore_changes(&mut self, changes: ChangeSet) {
        self.changes = changes;
    }

    /// Keep `changes` visible after they were pushed to the parent
    fn mark_sent(&mut self, changes: ChangeSet) {
        self.sent.merge(changes);
        self.unposted.clear();
    }

    fn discard(&mut self) {
        self.changes = ChangeSet::default();
        self.unposted.clear();
    }

    fn rebase(&mut self, base: Arc<ObjectGraph>) {
        self.base = base;
    }

    /// Committed records with pushed and pending changes applied
    ///
    /// Photograph bytes are shared with the source, never copied.
    fn snapshot(&self) -> Arc<ObjectGraph> {
        if self.changes.is_empty() && self.sent.is_empty() {
            return Arc::clone(&self.base);
        }
        let mut graph = (*self.base).clone();
        graph.apply(&self.sent);
        graph.apply(&self.changes);
        Arc::new(graph)
    }

    fn take_unposted(&mut self) -> Option<ContextNotification> {
        if self.unposted.is_empty() {
            return None;
        }

        let mut inserted = Vec::new();
        let mut updated = Vec::new();
        let mut deleted = Vec::new();
        for (id, kind) in self.unposted.drain(..) {
            let bucket = match kind {
                ChangeKind::Inserted => &mut inserted,
                ChangeKind::Updated => &mut updated,
                ChangeKind::Deleted => &mut deleted,
            };
            if !bucket.contains(&id) {
                bucket.push(id);
            }
        }

        Some(ContextNotification::ObjectsChanged {
            inserted,
            updated,
            deleted,
        })
    }
}

mod private {
    pub trait Sealed {}

    impl Sealed for super::MainContext {}
    impl Sealed for super::BackgroundContext {}
}

/// Read and write access shared by every context
///
/// Implemented by [`MainContext`] and [`BackgroundContext`]; entity factories
/// such as [`Notebook::create`] accept either.
pub trait ObjectContext: private::Sealed {
    #[doc(hidden)]
    fn unit(&self) -> &UnitOfWork;

    #[doc(hidden)]
    fn unit_mut(&mut self) -> &mut UnitOfWork;

    /// Whether the context holds unsaved changes
    fn has_changes(&self) -> bool {
        self.unit().has_changes()
    }

    /// Resolve a notebook by identity
    fn notebook(&self, id: NotebookId) -> StoreResult<Notebook> {
        self.unit()
            .notebook(id)
            .cloned()
            .ok_or(StoreError::ObjectNotFound(id.into()))
    }

    /// Resolve a note by identity
    fn note(&self, id: NoteId) -> StoreResult<Note> {
        self.unit()
            .note(id)
            .cloned()
            .ok_or(StoreError::ObjectNotFound(id.into()))
    }

    /// Resolve a photograph by identity
    fn photograph(&self, id: PhotographId) -> StoreResult<Photograph> {
        self.unit()
            .photograph(id)
            .cloned()
            .ok_or(StoreError::ObjectNotFound(id.into()))
    }

    /// Every notebook visible from this context, in no particular order
    fn notebooks(&self) -> Vec<Notebook> {
        self.unit().notebooks().cloned().collect()
    }

    /// Every note visible from this context, in no particular order
    fn notes(&self) -> Vec<Note> {
        self.unit().notes().cloned().collect()
    }

    /// Notes of one notebook, oldest first
    fn notes_in(&self, notebook: NotebookId) -> Vec<Note> {
        let mut notes: Vec<Note> = self
            .unit()
            .notes()
            .filter(|note| note.notebook == notebook)
            .cloned()
            .collect();
        notes.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        notes
    }

    /// Register a new notebook (prefer [`Notebook::create`])
    fn insert_notebook(&mut self, notebook: Notebook) -> StoreResult<()> {
        if let Some(photograph) = notebook.photograph {
            ensure_unowned(self.unit(), photograph)?;
        }
        debug!("Notebook inserted, id={}, title={}", notebook.id, notebook.title);
        self.unit_mut()
            .record_notebook(notebook.id, Pending::Inserted(notebook));
        Ok(())
    }

    /// Register a new note (prefer [`Note::create`])
    ///
    /// The owning notebook must be visible from this context.
    fn insert_note(&mut self, note: Note) -> StoreResult<()> {
        if self.unit().notebook(note.notebook).is_none() {
            return Err(StoreError::ObjectNotFound(note.notebook.into()));
        }
        if let Some(photograph) = note.photograph {
            ensure_unowned(self.unit(), photograph)?;
        }
        debug!("Note inserted, id={}, notebook={}", note.id, note.notebook);
        self.unit_mut().record_note(note.id, Pending::Inserted(note));
        Ok(())
    }

    /// Register a new photograph (prefer [`Photograph::create`])
    fn insert_photograph(&mut self, photograph: Photograph) -> StoreResult<()> {
        debug!("Photograph inserted, id={}, bytes={}", photograph.id, photograph.len());
        self.unit_mut()
            .record_photograph(photograph.id, Pending::Inserted(photograph));
        Ok(())
    }

    /// Attach `photograph` to a notebook
    ///
    /// A photograph the notebook held before is deleted.
    fn set_notebook_photograph(
        &mut self,
        notebook: NotebookId,
        photograph: PhotographId,
    ) -> StoreResult<()> {
        let mut record = self.notebook(notebook)?;
        if record.photograph == Some(photograph) {
            return Ok(());
        }
        ensure_unowned(self.unit(), photograph)?;

        let previous = record.photograph.replace(photograph);
        self.unit_mut()
            .record_notebook(notebook, Pending::Updated(record));
        if let Some(previous) = previous {
            self.unit_mut().record_photograph(previous, Pending::Deleted);
        }
        Ok(())
    }

    /// Attach `photograph` to a note
    ///
    /// A photograph the note held before is deleted.
    fn set_note_photograph(&mut self, note: NoteId, photograph: PhotographId) -> StoreResult<()> {
        let mut record = self.note(note)?;
        if record.photograph == Some(photograph) {
            return Ok(());
        }
        ensure_unowned(self.unit(), photograph)?;

        let previous = record.photograph.replace(photograph);
        self.unit_mut().record_note(note, Pending::Updated(record));
        if let Some(previous) = previous {
            self.unit_mut().record_photograph(previous, Pending::Deleted);
        }
        Ok(())
    }

    /// Overwrite the title and contents of a note
    fn update_note(
        &mut self,
        note: NoteId,
        title: String,
        contents: Option<String>,
    ) -> StoreResult<Note> {
        let mut record = self.note(note)?;
        record.title = title;
        record.contents = contents;
        self.unit_mut()
            .record_note(note, Pending::Updated(record.clone()));
        Ok(record)
    }
}

fn ensure_unowned(unit: &UnitOfWork, photograph: PhotographId) -> StoreResult<()> {
    if unit.photograph(photograph).is_none() {
        return Err(StoreError::ObjectNotFound(photograph.into()));
    }
    match unit.owner_of(photograph) {
        Some(owner) => Err(StoreError::PhotographAlreadyOwned { photograph, owner }),
        None => Ok(()),
    }
}

/// Changes pushed by a child context, stamped with the parent's generation
/// at the time the child was derived
#[derive(Debug)]
struct ChildSave {
    generation: u64,
    changes: ChangeSet,
}

/// The context bound to the UI lane
///
/// Only the lane that owns the [`Store`](crate::Store) may touch it. Result
/// sets observe it through [`MainContext::subscribe`].
pub struct MainContext {
    unit: UnitOfWork,
    backing: SqliteStore,
    /// Bumped on every reset; child saves from an older generation are dropped
    generation: u64,
    child_saves_tx: mpsc::UnboundedSender<ChildSave>,
    child_saves_rx: mpsc::UnboundedReceiver<ChildSave>,
    notifications: broadcast::Sender<ContextNotification>,
}

impl MainContext {
    /// Load the committed records of `backing` into a fresh main context
    pub(crate) fn new(backing: SqliteStore) -> StoreResult<Self> {
        let graph = backing.load()?;
        let (child_saves_tx, child_saves_rx) = mpsc::unbounded_channel();
        let (notifications, _) = broadcast::channel(NOTIFICATION_CAPACITY);

        Ok(Self {
            unit: UnitOfWork::new(Arc::new(graph)),
            backing,
            generation: 0,
            child_saves_tx,
            child_saves_rx,
            notifications,
        })
    }

    /// Subscribe to change notifications
    pub fn subscribe(&self) -> broadcast::Receiver<ContextNotification> {
        self.notifications.subscribe()
    }

    /// Fold completed child saves in and notify observers
    ///
    /// Call this on the UI lane after mutating the context or when a
    /// background save has finished. Returns how many child saves were
    /// merged.
    ///
    /// A child save is dropped whole when its child was derived before the
    /// last [`reset`](Self::reset), or when it points at a notebook or
    /// photograph this context no longer has.
    pub fn process_pending_changes(&mut self) -> usize {
        let mut merged = 0;
        while let Ok(save) = self.child_saves_rx.try_recv() {
            if self.accept(save) {
                merged += 1;
            }
        }
        self.post_notification();
        merged
    }

    /// Wait for the next child save, then merge it like
    /// [`process_pending_changes`](Self::process_pending_changes)
    pub async fn next_child_save(&mut self) -> usize {
        match self.child_saves_rx.recv().await {
            Some(save) => usize::from(self.accept(save)) + self.process_pending_changes(),
            None => 0,
        }
    }

    fn accept(&mut self, save: ChildSave) -> bool {
        if save.generation != self.generation {
            warn!(
                "Dropping child save from before the last reset, objects={}",
                save.changes.len()
            );
            return false;
        }
        if let Some(missing) = self.unit.dangling_reference(&save.changes) {
            warn!(
                "Dropping child save that refers to missing {}, objects={}",
                missing,
                save.changes.len()
            );
            return false;
        }

        debug!("Merging child context save, objects={}", save.changes.len());
        self.unit.merge(save.changes);
        true
    }

    /// Write pending changes to the backing store
    ///
    /// Child saves already queued are merged first. On failure the changes
    /// stay pending.
    pub fn save(&mut self) -> StoreResult<()> {
        self.process_pending_changes();
        if !self.unit.has_changes() {
            return Ok(());
        }

        let count = self.unit.changes().len();
        self.backing.write(self.unit.changes())?;
        self.unit.commit();
        info!("Main context saved, objects={}", count);
        Ok(())
    }

    /// Discard pending changes and reload committed records
    ///
    /// After the store has been destroyed this leaves the context empty.
    /// Child saves still queued are dropped, and so is anything saved later
    /// by a child derived before the reset.
    pub fn reset(&mut self) -> StoreResult<()> {
        self.unit.discard();
        self.generation = self.generation.wrapping_add(1);
        while self.child_saves_rx.try_recv().is_ok() {}

        let graph = self.backing.load()?;
        self.unit.rebase(Arc::new(graph));
        debug!("Main context reset, generation={}", self.generation);
        let _ = self.notifications.send(ContextNotification::Reset);
        Ok(())
    }

    /// Derive a child context from the current visible state
    pub(crate) fn child(&self) -> BackgroundContext {
        BackgroundContext {
            unit: UnitOfWork::new(self.unit.snapshot()),
            generation: self.generation,
            parent: self.child_saves_tx.clone(),
        }
    }

    pub(crate) fn backing(&self) -> &SqliteStore {
        &self.backing
    }

    pub(crate) fn backing_mut(&mut self) -> &mut SqliteStore {
        &mut self.backing
    }

    fn post_notification(&mut self) {
        if let Some(notification) = self.unit.take_unposted() {
            // No receivers just means no result set is alive
            let _ = self.notifications.send(notification);
        }
    }
}

impl ObjectContext for MainContext {
    fn unit(&self) -> &UnitOfWork {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut UnitOfWork {
        &mut self.unit
    }
}

/// A child context confined to one background lane
///
/// Created by [`Store::with_background_context`](crate::Store::with_background_context)
/// and dropped when the work closure returns.
pub struct BackgroundContext {
    unit: UnitOfWork,
    generation: u64,
    parent: mpsc::UnboundedSender<ChildSave>,
}

impl BackgroundContext {
    /// Push pending changes to the main context
    ///
    /// They become visible there once the main lane calls
    /// [`MainContext::process_pending_changes`]. This context keeps seeing
    /// them. If the main context is gone they stay pending here.
    pub fn save(&mut self) -> StoreResult<()> {
        if !self.unit.has_changes() {
            return Ok(());
        }

        let changes = self.unit.take_changes();
        let count = changes.len();
        let save = ChildSave {
            generation: self.generation,
            changes: changes.clone(),
        };
        if self.parent.send(save).is_err() {
            self.unit.restore_changes(changes);
            return Err(StoreError::ContextClosed);
        }
        self.unit.mark_sent(changes);
        debug!("Background context saved, objects={}", count);
        Ok(())
    }

    /// Discard pending changes
    pub fn reset(&mut self) {
        self.unit.discard();
    }
}

impl ObjectContext for BackgroundContext {
    fn unit(&self) -> &UnitOfWork {
        &self.unit
    }

    fn unit_mut(&mut self) -> &mut UnitOfWork {
        &mut self.unit
    }
}
