//! In-memory object graph and pending change sets
//!
//! An [`ObjectGraph`] is the committed state a context reads through. A
//! [`ChangeSet`] holds the mutations a context has made since its last save,
//! keyed by identity so that repeated edits to one object collapse into a
//! single pending change.

use std::collections::HashMap;
use std::hash::Hash;

use crate::models::{Note, NoteId, Notebook, NotebookId, ObjectId, Photograph, PhotographId};

/// Committed records, indexed by identity
#[derive(Debug, Clone, Default)]
pub struct ObjectGraph {
    pub(crate) notebooks: HashMap<NotebookId, Notebook>,
    pub(crate) notes: HashMap<NoteId, Note>,
    pub(crate) photographs: HashMap<PhotographId, Photograph>,
}

impl ObjectGraph {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notebook(&self, id: NotebookId) -> Option<&Notebook> {
        self.notebooks.get(&id)
    }

    pub fn note(&self, id: NoteId) -> Option<&Note> {
        self.notes.get(&id)
    }

    pub fn photograph(&self, id: PhotographId) -> Option<&Photograph> {
        self.photographs.get(&id)
    }

    pub fn notebook_count(&self) -> usize {
        self.notebooks.len()
    }

    pub fn note_count(&self) -> usize {
        self.notes.len()
    }

    pub fn photograph_count(&self) -> usize {
        self.photographs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.notebooks.is_empty() && self.notes.is_empty() && self.photographs.is_empty()
    }

    /// Fold a change set into the committed records
    pub(crate) fn apply(&mut self, changes: &ChangeSet) {
        apply_map(&mut self.notebooks, &changes.notebooks);
        apply_map(&mut self.notes, &changes.notes);
        apply_map(&mut self.photographs, &changes.photographs);
    }
}

fn apply_map<K, T>(records: &mut HashMap<K, T>, changes: &HashMap<K, Pending<T>>)
where
    K: Eq + Hash + Copy,
    T: Clone,
{
    for (id, change) in changes {
        match change {
            Pending::Inserted(value) | Pending::Updated(value) => {
                records.insert(*id, value.clone());
            }
            Pending::Deleted => {
                records.remove(id);
            }
        }
    }
}

/// A not-yet-saved mutation of one object
#[derive(Debug, Clone, PartialEq)]
pub enum Pending<T> {
    Inserted(T),
    Updated(T),
    Deleted,
}

impl<T> Pending<T> {
    /// The object's value after this change, if it still exists
    pub fn value(&self) -> Option<&T> {
        match self {
            Pending::Inserted(value) | Pending::Updated(value) => Some(value),
            Pending::Deleted => None,
        }
    }

    pub(crate) fn kind(&self) -> ChangeKind {
        match self {
            Pending::Inserted(_) => ChangeKind::Inserted,
            Pending::Updated(_) => ChangeKind::Updated,
            Pending::Deleted => ChangeKind::Deleted,
        }
    }

    /// Collapse a later change to the same object into this one
    ///
    /// Returns `None` when the pair cancels out (inserted then deleted
    /// before any save).
    fn then(self, next: Pending<T>) -> Option<Pending<T>> {
        match (self, next) {
            (Pending::Inserted(_), Pending::Updated(value)) => Some(Pending::Inserted(value)),
            (Pending::Inserted(_), Pending::Deleted) => None,
            (_, next) => Some(next),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ChangeKind {
    Inserted,
    Updated,
    Deleted,
}

fn record<K, T>(changes: &mut HashMap<K, Pending<T>>, id: K, change: Pending<T>)
where
    K: Eq + Hash,
{
    match changes.remove(&id) {
        Some(existing) => {
            if let Some(merged) = existing.then(change) {
                changes.insert(id, merged);
            }
        }
        None => {
            changes.insert(id, change);
        }
    }
}

/// Pending mutations of a context, keyed by identity
#[derive(Debug, Clone, Default)]
pub struct ChangeSet {
    pub(crate) notebooks: HashMap<NotebookId, Pending<Notebook>>,
    pub(crate) notes: HashMap<NoteId, Pending<Note>>,
    pub(crate) photographs: HashMap<PhotographId, Pending<Photograph>>,
}

impl ChangeSet {
    pub fn is_empty(&self) -> bool {
        self.notebooks.is_empty() && self.notes.is_empty() && self.photographs.is_empty()
    }

    /// Number of objects with a pending change
    pub fn len(&self) -> usize {
        self.notebooks.len() + self.notes.len() + self.photographs.len()
    }

    pub(crate) fn record_notebook(&mut self, id: NotebookId, change: Pending<Notebook>) {
        record(&mut self.notebooks, id, change);
    }

    pub(crate) fn record_note(&mut self, id: NoteId, change: Pending<Note>) {
        record(&mut self.notes, id, change);
    }

    pub(crate) fn record_photograph(&mut self, id: PhotographId, change: Pending<Photograph>) {
        record(&mut self.photographs, id, change);
    }

    /// Fold a child's saved changes into this (parent) change set
    pub(crate) fn merge(&mut self, child: ChangeSet) {
        for (id, change) in child.notebooks {
            self.record_notebook(id, change);
        }
        for (id, change) in child.notes {
            self.record_note(id, change);
        }
        for (id, change) in child.photographs {
            self.record_photograph(id, change);
        }
    }

    /// Every touched object with the kind of its change
    pub(crate) fn entries(&self) -> Vec<(ObjectId, ChangeKind)> {
        let notebooks = self
            .notebooks
            .iter()
            .map(|(id, change)| (ObjectId::from(*id), change.kind()));
        let notes = self
            .notes
            .iter()
            .map(|(id, change)| (ObjectId::from(*id), change.kind()));
        let photographs = self
            .photographs
            .iter()
            .map(|(id, change)| (ObjectId::from(*id), change.kind()));
        notebooks.chain(notes).chain(photographs).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn notebook(title: &str) -> Notebook {
        Notebook {
            id: NotebookId::new(),
            created_at: Utc::now(),
            title: title.to_string(),
            photograph: None,
        }
    }

    #[test]
    fn test_insert_then_update_stays_insert() {
        let mut changes = ChangeSet::default();
        let mut nb = notebook("Draft");
        changes.record_notebook(nb.id, Pending::Inserted(nb.clone()));

        nb.title = "Final".to_string();
        changes.record_notebook(nb.id, Pending::Updated(nb.clone()));

        assert_eq!(changes.len(), 1);
        assert_eq!(changes.notebooks[&nb.id], Pending::Inserted(nb));
    }

    #[test]
    fn test_insert_then_delete_cancels_out() {
        let mut changes = ChangeSet::default();
        let photo = Photograph {
            id: PhotographId::new(),
            image_data: vec![1, 2, 3].into(),
        };
        changes.record_photograph(photo.id, Pending::Inserted(photo.clone()));
        changes.record_photograph(photo.id, Pending::Deleted);

        assert!(changes.is_empty());
    }

    #[test]
    fn test_merge_child_update_into_parent_insert() {
        let nb = notebook("Inbox");
        let mut parent = ChangeSet::default();
        parent.record_notebook(nb.id, Pending::Inserted(nb.clone()));

        let mut renamed = nb.clone();
        renamed.title = "Archive".to_string();
        let mut child = ChangeSet::default();
        child.record_notebook(nb.id, Pending::Updated(renamed.clone()));

        parent.merge(child);
        assert_eq!(parent.notebooks[&nb.id], Pending::Inserted(renamed));
    }

    #[test]
    fn test_apply_inserts_updates_and_deletes() {
        let photo = Photograph {
            id: PhotographId::new(),
            image_data: vec![9].into(),
        };
        let mut graph = ObjectGraph::new();
        graph.photographs.insert(photo.id, photo.clone());

        let nb = notebook("Travel");
        let mut changes = ChangeSet::default();
        changes.record_notebook(nb.id, Pending::Inserted(nb.clone()));
        changes.record_photograph(photo.id, Pending::Deleted);

        graph.apply(&changes);
        assert_eq!(graph.notebook(nb.id), Some(&nb));
        assert!(graph.photograph(photo.id).is_none());
        assert_eq!(graph.photograph_count(), 0);
    }

    #[test]
    fn test_entries_report_kinds() {
        let nb = notebook("Work");
        let mut changes = ChangeSet::default();
        changes.record_notebook(nb.id, Pending::Updated(nb.clone()));

        let entries = changes.entries();
        assert_eq!(entries, vec![(ObjectId::from(nb.id), ChangeKind::Updated)]);
    }
}
