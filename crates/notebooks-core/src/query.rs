//! Live queries over the main context
//!
//! A [`ResultSet`] holds the sorted, filtered projection of one
//! [`FetchRequest`]. When the main context posts a change notification the
//! result set refetches, diffs the new rows against the old ones and sends
//! the difference to its subscriber as a batch of [`ResultSetEvent`]s.
//!
//! All result sets have a single implicit section. It exists while the
//! projection is non-empty.

use std::collections::HashMap;
use std::hash::Hash;

use serde::Serialize;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

use crate::context::{ContextNotification, MainContext, ObjectContext};
use crate::models::{Note, NoteId, Notebook, NotebookId};
use crate::storage::StoreResult;

/// A filter plus sort order over one record kind
pub trait FetchRequest {
    type Item: Clone + PartialEq;
    type Id: Copy + Eq + Hash;

    /// Produce the matching records in presentation order
    fn fetch<C: ObjectContext + ?Sized>(&self, ctx: &C) -> StoreResult<Vec<Self::Item>>;

    fn id_of(item: &Self::Item) -> Self::Id;
}

/// All notebooks, by title
#[derive(Debug, Clone, Default)]
pub struct NotebookQuery {
    /// Keep only notebooks whose title contains this text, ignoring case
    /// and accents. Empty means no filter.
    pub title_contains: Option<String>,
}

impl NotebookQuery {
    pub fn all() -> Self {
        Self::default()
    }

    pub fn titled(filter: impl Into<String>) -> Self {
        Self {
            title_contains: Some(filter.into()),
        }
    }
}

impl FetchRequest for NotebookQuery {
    type Item = Notebook;
    type Id = NotebookId;

    fn fetch<C: ObjectContext + ?Sized>(&self, ctx: &C) -> StoreResult<Vec<Notebook>> {
        let matcher = TitleMatcher::folded(self.title_contains.as_deref());
        let mut notebooks: Vec<Notebook> = ctx
            .notebooks()
            .into_iter()
            .filter(|nb| matcher.matches(&nb.title))
            .collect();
        notebooks.sort_by(|a, b| {
            a.title
                .cmp(&b.title)
                .then(a.created_at.cmp(&b.created_at))
                .then(a.id.cmp(&b.id))
        });
        Ok(notebooks)
    }

    fn id_of(item: &Notebook) -> NotebookId {
        item.id
    }
}

/// Notes of one notebook
///
/// Unfiltered, notes come oldest first. With a title filter they are
/// ordered by title. Once the notebook is gone the projection is empty.
#[derive(Debug, Clone)]
pub struct NoteQuery {
    pub notebook: NotebookId,
    /// Keep only notes whose title contains this exact text. Unlike the
    /// notebook filter this one is case and accent sensitive.
    pub title_contains: Option<String>,
}

impl NoteQuery {
    pub fn in_notebook(notebook: NotebookId) -> Self {
        Self {
            notebook,
            title_contains: None,
        }
    }

    pub fn titled(notebook: NotebookId, filter: impl Into<String>) -> Self {
        Self {
            notebook,
            title_contains: Some(filter.into()),
        }
    }
}

impl FetchRequest for NoteQuery {
    type Item = Note;
    type Id = NoteId;

    fn fetch<C: ObjectContext + ?Sized>(&self, ctx: &C) -> StoreResult<Vec<Note>> {
        let matcher = TitleMatcher::exact(self.title_contains.as_deref());
        let mut notes: Vec<Note> = ctx
            .notes_in(self.notebook)
            .into_iter()
            .filter(|note| matcher.matches(&note.title))
            .collect();

        if matcher.is_active() {
            notes.sort_by(|a, b| {
                a.title
                    .cmp(&b.title)
                    .then(a.created_at.cmp(&b.created_at))
                    .then(a.id.cmp(&b.id))
            });
        }
        Ok(notes)
    }

    fn id_of(item: &Note) -> NoteId {
        item.id
    }
}

/// Substring matcher over titles
struct TitleMatcher {
    needle: Option<String>,
    folded: bool,
}

impl TitleMatcher {
    /// Ignore case and diacritics
    fn folded(filter: Option<&str>) -> Self {
        Self {
            needle: filter.filter(|f| !f.is_empty()).map(fold),
            folded: true,
        }
    }

    /// Compare titles as they are
    fn exact(filter: Option<&str>) -> Self {
        Self {
            needle: filter.filter(|f| !f.is_empty()).map(str::to_string),
            folded: false,
        }
    }

    fn is_active(&self) -> bool {
        self.needle.is_some()
    }

    fn matches(&self, title: &str) -> bool {
        match &self.needle {
            Some(needle) if self.folded => fold(title).contains(needle.as_str()),
            Some(needle) => title.contains(needle.as_str()),
            None => true,
        }
    }
}

/// Lowercase `s` and strip its diacritics
///
/// Compatibility decomposition splits accented letters into base letter
/// plus combining marks, which are dropped. Letters with a stroke or a
/// ligature have no decomposition and are mapped by hand.
fn fold(s: &str) -> String {
    let mut folded = String::with_capacity(s.len());
    let letters = s
        .nfkd()
        .filter(|c| !is_combining_mark(*c))
        .flat_map(char::to_lowercase);
    for c in letters {
        match c {
            'đ' | 'ð' => folded.push('d'),
            'ħ' => folded.push('h'),
            'ı' => folded.push('i'),
            'ł' => folded.push('l'),
            'ø' => folded.push('o'),
            'ŧ' => folded.push('t'),
            'ß' => folded.push_str("ss"),
            'æ' => folded.push_str("ae"),
            'œ' => folded.push_str("oe"),
            other => folded.push(other),
        }
    }
    folded
}

/// Position of a row inside a result set
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct IndexPath {
    pub section: usize,
    pub row: usize,
}

impl IndexPath {
    pub fn row(row: usize) -> Self {
        Self { section: 0, row }
    }
}

/// One step of an incremental update
///
/// Events arrive in batches framed by `BeginUpdate` and `EndUpdate`. Deleted
/// and updated rows use positions from before the batch; inserted rows and
/// move targets use positions after it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ResultSetEvent {
    BeginUpdate,
    SectionInserted { section: usize },
    SectionDeleted { section: usize },
    RowInserted { at: IndexPath },
    RowDeleted { at: IndexPath },
    RowUpdated { at: IndexPath },
    RowMoved { from: IndexPath, to: IndexPath },
    EndUpdate,
}

/// An observable, ordered projection of a fetch request
pub struct ResultSet<Q: FetchRequest> {
    request: Q,
    items: Vec<Q::Item>,
    notifications: broadcast::Receiver<ContextNotification>,
    subscriber: Option<mpsc::UnboundedSender<ResultSetEvent>>,
}

impl<Q: FetchRequest> ResultSet<Q> {
    /// Run `request` against the main context and start observing it
    pub fn new(request: Q, ctx: &MainContext) -> StoreResult<Self> {
        // Subscribe before fetching so no notification falls in between
        let notifications = ctx.subscribe();
        let items = request.fetch(ctx)?;
        Ok(Self {
            request,
            items,
            notifications,
            subscriber: None,
        })
    }

    pub fn request(&self) -> &Q {
        &self.request
    }

    /// 0 when the projection is empty, otherwise 1
    pub fn section_count(&self) -> usize {
        usize::from(!self.items.is_empty())
    }

    pub fn row_count(&self, section: usize) -> usize {
        if section == 0 {
            self.items.len()
        } else {
            0
        }
    }

    pub fn item_at(&self, index: IndexPath) -> Option<&Q::Item> {
        if index.section != 0 {
            return None;
        }
        self.items.get(index.row)
    }

    pub fn items(&self) -> &[Q::Item] {
        &self.items
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    /// Current position of the record with identity `id`
    pub fn index_of(&self, id: Q::Id) -> Option<IndexPath> {
        self.items
            .iter()
            .position(|item| Q::id_of(item) == id)
            .map(IndexPath::row)
    }

    /// Receive change events from now on
    ///
    /// Replaces any earlier subscriber, whose receiver then closes.
    pub fn subscribe(&mut self) -> mpsc::UnboundedReceiver<ResultSetEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.subscriber = Some(tx);
        rx
    }

    /// Apply pending context notifications
    ///
    /// Refetches when the main context reported changes and sends the
    /// resulting events to the subscriber. Returns whether the projection
    /// changed.
    pub fn process_changes(&mut self, ctx: &MainContext) -> StoreResult<bool> {
        let mut notified = false;
        loop {
            match self.notifications.try_recv() {
                Ok(_) => notified = true,
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    debug!("Result set lagged behind notifications, skipped={}", skipped);
                    notified = true;
                }
                Err(_) => break,
            }
        }
        if !notified {
            return Ok(false);
        }

        let items = self.request.fetch(ctx)?;
        let events = diff(&self.items, &items, Q::id_of);
        self.items = items;

        if events.is_empty() {
            return Ok(false);
        }
        if let Some(tx) = &self.subscriber {
            let delivered = events.into_iter().all(|event| tx.send(event).is_ok());
            if !delivered {
                self.subscriber = None;
            }
        }
        Ok(true)
    }
}

/// Observe all notebooks, optionally filtered by title
pub fn query_notebooks(
    ctx: &MainContext,
    title_contains: Option<&str>,
) -> StoreResult<ResultSet<NotebookQuery>> {
    let request = NotebookQuery {
        title_contains: title_contains.map(str::to_string),
    };
    ResultSet::new(request, ctx)
}

/// Observe the notes of `notebook`, optionally filtered by title
///
/// Fails if `notebook` is not visible from `ctx`. A result set whose
/// notebook disappears later just becomes empty.
pub fn query_notes(
    ctx: &MainContext,
    notebook: NotebookId,
    title_contains: Option<&str>,
) -> StoreResult<ResultSet<NoteQuery>> {
    ctx.notebook(notebook)?;
    let request = NoteQuery {
        notebook,
        title_contains: title_contains.map(str::to_string),
    };
    ResultSet::new(request, ctx)
}

/// Events turning `old` into `new`
///
/// Empty when both are equal. Rows that keep their relative order stay in
/// place; only the rest are reported as moved.
fn diff<T, K, F>(old: &[T], new: &[T], id_of: F) -> Vec<ResultSetEvent>
where
    T: PartialEq,
    K: Eq + Hash,
    F: Fn(&T) -> K,
{
    if old == new {
        return Vec::new();
    }

    let mut events = vec![ResultSetEvent::BeginUpdate];
    if old.is_empty() {
        events.push(ResultSetEvent::SectionInserted { section: 0 });
        events.push(ResultSetEvent::EndUpdate);
        return events;
    }
    if new.is_empty() {
        events.push(ResultSetEvent::SectionDeleted { section: 0 });
        events.push(ResultSetEvent::EndUpdate);
        return events;
    }

    let old_index: HashMap<K, usize> = old.iter().enumerate().map(|(i, t)| (id_of(t), i)).collect();
    let new_index: HashMap<K, usize> = new.iter().enumerate().map(|(i, t)| (id_of(t), i)).collect();

    for (i, item) in old.iter().enumerate() {
        if !new_index.contains_key(&id_of(item)) {
            events.push(ResultSetEvent::RowDeleted {
                at: IndexPath::row(i),
            });
        }
    }

    // (old position, new position) of every surviving row, in new order
    let mut common = Vec::new();
    for (j, item) in new.iter().enumerate() {
        match old_index.get(&id_of(item)) {
            Some(&i) => common.push((i, j)),
            None => events.push(ResultSetEvent::RowInserted {
                at: IndexPath::row(j),
            }),
        }
    }

    let olds: Vec<usize> = common.iter().map(|&(i, _)| i).collect();
    let stable = longest_increasing(&olds);

    let mut updates = Vec::new();
    for (k, &(i, j)) in common.iter().enumerate() {
        if !stable[k] {
            events.push(ResultSetEvent::RowMoved {
                from: IndexPath::row(i),
                to: IndexPath::row(j),
            });
        } else if old[i] != new[j] {
            updates.push(ResultSetEvent::RowUpdated {
                at: IndexPath::row(i),
            });
        }
    }
    events.extend(updates);

    events.push(ResultSetEvent::EndUpdate);
    events
}

/// Mark the members of one longest strictly increasing subsequence
fn longest_increasing(seq: &[usize]) -> Vec<bool> {
    // tails[len] = index into seq of the smallest tail of a run of len + 1
    let mut tails: Vec<usize> = Vec::new();
    let mut prev: Vec<Option<usize>> = vec![None; seq.len()];

    for (k, &value) in seq.iter().enumerate() {
        let pos = tails.partition_point(|&t| seq[t] < value);
        if pos > 0 {
            prev[k] = Some(tails[pos - 1]);
        }
        if pos == tails.len() {
            tails.push(k);
        } else {
            tails[pos] = k;
        }
    }

    let mut keep = vec![false; seq.len()];
    let mut cursor = tails.last().copied();
    while let Some(k) = cursor {
        keep[k] = true;
        cursor = prev[k];
    }
    keep
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::Notebook;
    use crate::storage::{SqliteStore, StoreError};
    use chrono::{Duration, Utc};

    fn main_context() -> MainContext {
        MainContext::new(SqliteStore::open_in_memory().unwrap()).unwrap()
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<ResultSetEvent>) -> Vec<ResultSetEvent> {
        let mut events = Vec::new();
        while let Ok(event) = rx.try_recv() {
            events.push(event);
        }
        events
    }

    #[test]
    fn test_fold_ignores_case_and_accents() {
        assert_eq!(fold("Canción"), "cancion");
        assert_eq!(fold("ÉTÉ"), "ete");
        assert!(TitleMatcher::folded(Some("CAFE")).matches("Le café du coin"));
        assert!(!TitleMatcher::folded(Some("tea")).matches("coffee"));
    }

    #[test]
    fn test_fold_covers_letters_beyond_western_europe() {
        assert!(TitleMatcher::folded(Some("dogan")).matches("Doğan"));
        assert!(TitleMatcher::folded(Some("dak")).matches("Đak Lak"));
        assert!(TitleMatcher::folded(Some("strasse")).matches("Hauptstraße"));
        assert!(TitleMatcher::folded(Some("ha noi")).matches("Hà Nội"));
        assert!(TitleMatcher::folded(Some("esperanto")).matches("ĈEŜ Esperanto"));
        assert_eq!(fold("Ŝŭ"), "su");
        assert_eq!(fold("Łódź"), "lodz");
    }

    #[test]
    fn test_fold_accepts_decomposed_input() {
        // "cafe" followed by a combining acute accent
        let decomposed = "cafe\u{301}";
        assert_eq!(fold(decomposed), fold("Café"));
        assert!(TitleMatcher::folded(Some(decomposed)).matches("CAFÉ NOIR"));
    }

    #[test]
    fn test_exact_matcher_respects_case_and_accents() {
        let matcher = TitleMatcher::exact(Some("plan"));
        assert!(matcher.matches("a plan"));
        assert!(!matcher.matches("A PLAN"));
        assert!(!TitleMatcher::exact(Some("cafe")).matches("café"));
    }

    #[test]
    fn test_empty_filter_matches_everything() {
        for matcher in [TitleMatcher::folded(Some("")), TitleMatcher::exact(Some(""))] {
            assert!(!matcher.is_active());
            assert!(matcher.matches("anything"));
        }
    }

    #[test]
    fn test_notebooks_sorted_by_title() {
        let mut ctx = main_context();
        let now = Utc::now();
        for title in ["b", "a", "c"] {
            Notebook::create(&mut ctx, now, title).unwrap();
        }

        let rs = query_notebooks(&ctx, None).unwrap();
        let titles: Vec<&str> = rs.items().iter().map(|nb| nb.title.as_str()).collect();
        assert_eq!(titles, ["a", "b", "c"]);
    }

    #[test]
    fn test_notebook_filter() {
        let mut ctx = main_context();
        let now = Utc::now();
        for title in ["Work", "Homework", "Travel"] {
            Notebook::create(&mut ctx, now, title).unwrap();
        }

        let rs = query_notebooks(&ctx, Some("work")).unwrap();
        let titles: Vec<&str> = rs.items().iter().map(|nb| nb.title.as_str()).collect();
        assert_eq!(titles, ["Homework", "Work"]);

        let rs = query_notebooks(&ctx, Some("zzz")).unwrap();
        assert_eq!(rs.section_count(), 0);
        assert_eq!(rs.row_count(0), 0);
    }

    #[test]
    fn test_notes_unfiltered_by_creation() {
        let mut ctx = main_context();
        let now = Utc::now();
        let nb = Notebook::create(&mut ctx, now, "Journal").unwrap();
        let t2 = Note::create(&mut ctx, &nb, "second", now + Duration::seconds(2)).unwrap();
        let t1 = Note::create(&mut ctx, &nb, "first", now + Duration::seconds(1)).unwrap();
        let t3 = Note::create(&mut ctx, &nb, "third", now + Duration::seconds(3)).unwrap();

        let rs = query_notes(&ctx, nb.id, None).unwrap();
        let ids: Vec<NoteId> = rs.items().iter().map(|n| n.id).collect();
        assert_eq!(ids, [t1.id, t2.id, t3.id]);
        assert_eq!(rs.index_of(t3.id), Some(IndexPath::row(2)));
    }

    #[test]
    fn test_notes_filtered_by_title_within_notebook() {
        let mut ctx = main_context();
        let now = Utc::now();
        let nb = Notebook::create(&mut ctx, now, "Mine").unwrap();
        let other = Notebook::create(&mut ctx, now, "Other").unwrap();
        Note::create(&mut ctx, &nb, "zeta plan", now).unwrap();
        Note::create(&mut ctx, &nb, "alpha plan", now + Duration::seconds(1)).unwrap();
        Note::create(&mut ctx, &nb, "unrelated", now).unwrap();
        Note::create(&mut ctx, &other, "beta plan", now).unwrap();

        let rs = query_notes(&ctx, nb.id, Some("plan")).unwrap();
        let titles: Vec<&str> = rs.items().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["alpha plan", "zeta plan"]);
    }

    #[test]
    fn test_note_filter_is_case_sensitive() {
        let mut ctx = main_context();
        let now = Utc::now();
        let nb = Notebook::create(&mut ctx, now, "Mine").unwrap();
        Note::create(&mut ctx, &nb, "Plan", now).unwrap();
        Note::create(&mut ctx, &nb, "plan", now).unwrap();
        Note::create(&mut ctx, &nb, "Plän", now).unwrap();

        let rs = query_notes(&ctx, nb.id, Some("PLAN")).unwrap();
        assert!(rs.is_empty());

        let rs = query_notes(&ctx, nb.id, Some("Plan")).unwrap();
        let titles: Vec<&str> = rs.items().iter().map(|n| n.title.as_str()).collect();
        assert_eq!(titles, ["Plan"]);

        // The notebook filter, by contrast, folds
        let rs = query_notebooks(&ctx, Some("MINE")).unwrap();
        assert_eq!(rs.len(), 1);
    }

    #[test]
    fn test_notebook_order_stable_with_title_ties() {
        let temp_dir = tempfile::TempDir::new().unwrap();
        let path = temp_dir.path().join("ties.sqlite");
        let now = Utc::now();

        let mut ctx = MainContext::new(SqliteStore::open(&path).unwrap()).unwrap();
        for _ in 0..4 {
            Notebook::create(&mut ctx, now, "Same").unwrap();
        }
        let oldest = Notebook::create(&mut ctx, now - Duration::seconds(1), "Same").unwrap();
        Notebook::create(&mut ctx, now, "Another").unwrap();
        ctx.save().unwrap();

        let ids = |rs: &ResultSet<NotebookQuery>| -> Vec<NotebookId> {
            rs.items().iter().map(|nb| nb.id).collect()
        };
        let first = query_notebooks(&ctx, None).unwrap();
        assert_eq!(first.items()[0].title, "Another");
        assert_eq!(first.items()[1].id, oldest.id);

        for _ in 0..3 {
            assert_eq!(ids(&query_notebooks(&ctx, None).unwrap()), ids(&first));
            // A separately loaded context hashes its records differently
            let reopened = MainContext::new(SqliteStore::open(&path).unwrap()).unwrap();
            assert_eq!(ids(&query_notebooks(&reopened, None).unwrap()), ids(&first));
        }

        // A refetch with nothing visible changed reports nothing
        let mut rs = query_notebooks(&ctx, None).unwrap();
        let mut rx = rs.subscribe();
        Note::create(&mut ctx, &oldest, "Unrelated", now).unwrap();
        ctx.process_pending_changes();
        assert!(!rs.process_changes(&ctx).unwrap());
        assert!(drain(&mut rx).is_empty());
        assert_eq!(ids(&rs), ids(&first));
    }

    #[test]
    fn test_notes_of_unknown_notebook() {
        let ctx = main_context();
        let missing = NotebookId::new();
        assert!(matches!(
            query_notes(&ctx, missing, None),
            Err(StoreError::ObjectNotFound(_))
        ));
    }

    #[test]
    fn test_insert_into_empty_emits_section() {
        let mut ctx = main_context();
        let mut rs = query_notebooks(&ctx, None).unwrap();
        let mut rx = rs.subscribe();

        Notebook::create(&mut ctx, Utc::now(), "First").unwrap();
        ctx.process_pending_changes();
        assert!(rs.process_changes(&ctx).unwrap());

        assert_eq!(
            drain(&mut rx),
            vec![
                ResultSetEvent::BeginUpdate,
                ResultSetEvent::SectionInserted { section: 0 },
                ResultSetEvent::EndUpdate,
            ]
        );
        assert_eq!(rs.section_count(), 1);
    }

    #[test]
    fn test_row_insert_and_update() {
        let mut ctx = main_context();
        let now = Utc::now();
        let nb = Notebook::create(&mut ctx, now, "Notes").unwrap();
        let a = Note::create(&mut ctx, &nb, "a", now).unwrap();
        ctx.process_pending_changes();

        let mut rs = query_notes(&ctx, nb.id, None).unwrap();
        let mut rx = rs.subscribe();

        ctx.update_note(a.id, "a2".to_string(), Some("body".to_string()))
            .unwrap();
        Note::create(&mut ctx, &nb, "b", now + Duration::seconds(1)).unwrap();
        ctx.process_pending_changes();
        rs.process_changes(&ctx).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ResultSetEvent::BeginUpdate,
                ResultSetEvent::RowInserted {
                    at: IndexPath::row(1)
                },
                ResultSetEvent::RowUpdated {
                    at: IndexPath::row(0)
                },
                ResultSetEvent::EndUpdate,
            ]
        );
        assert_eq!(rs.item_at(IndexPath::row(0)).unwrap().title, "a2");
    }

    #[test]
    fn test_rename_moves_row() {
        let mut ctx = main_context();
        let now = Utc::now();
        let nb = Notebook::create(&mut ctx, now, "Plans").unwrap();
        let a = Note::create(&mut ctx, &nb, "plan a", now).unwrap();
        Note::create(&mut ctx, &nb, "plan b", now).unwrap();
        Note::create(&mut ctx, &nb, "plan c", now).unwrap();
        ctx.save().unwrap();

        let mut rs = query_notes(&ctx, nb.id, Some("plan")).unwrap();
        let mut rx = rs.subscribe();

        ctx.update_note(a.id, "plan d".to_string(), None).unwrap();
        ctx.process_pending_changes();
        rs.process_changes(&ctx).unwrap();

        // Moved rows carry their new contents, so no separate update
        assert_eq!(
            drain(&mut rx),
            vec![
                ResultSetEvent::BeginUpdate,
                ResultSetEvent::RowMoved {
                    from: IndexPath::row(0),
                    to: IndexPath::row(2)
                },
                ResultSetEvent::EndUpdate,
            ]
        );
        assert_eq!(rs.index_of(a.id), Some(IndexPath::row(2)));
    }

    #[test]
    fn test_no_events_without_visible_change() {
        let mut ctx = main_context();
        let nb = Notebook::create(&mut ctx, Utc::now(), "Only").unwrap();
        ctx.process_pending_changes();

        let mut rs = query_notes(&ctx, nb.id, None).unwrap();
        let mut rx = rs.subscribe();

        // A notebook change does not alter this note projection
        Notebook::create(&mut ctx, Utc::now(), "Another").unwrap();
        ctx.process_pending_changes();

        assert!(!rs.process_changes(&ctx).unwrap());
        assert!(drain(&mut rx).is_empty());
        assert!(!rs.process_changes(&ctx).unwrap());
    }

    #[test]
    fn test_reset_removes_section() {
        let mut ctx = main_context();
        Notebook::create(&mut ctx, Utc::now(), "Pending").unwrap();
        ctx.process_pending_changes();

        let mut rs = query_notebooks(&ctx, None).unwrap();
        let mut rx = rs.subscribe();

        ctx.reset().unwrap();
        rs.process_changes(&ctx).unwrap();

        assert_eq!(
            drain(&mut rx),
            vec![
                ResultSetEvent::BeginUpdate,
                ResultSetEvent::SectionDeleted { section: 0 },
                ResultSetEvent::EndUpdate,
            ]
        );
        assert!(rs.is_empty());
    }

    #[test]
    fn test_notes_empty_once_notebook_is_gone() {
        let mut ctx = main_context();
        let nb = Notebook::create(&mut ctx, Utc::now(), "Pending").unwrap();
        Note::create(&mut ctx, &nb, "row", Utc::now()).unwrap();
        ctx.process_pending_changes();

        let mut rs = query_notes(&ctx, nb.id, None).unwrap();
        let mut rx = rs.subscribe();
        assert_eq!(rs.len(), 1);

        ctx.reset().unwrap();
        assert!(rs.process_changes(&ctx).unwrap());

        assert_eq!(
            drain(&mut rx),
            vec![
                ResultSetEvent::BeginUpdate,
                ResultSetEvent::SectionDeleted { section: 0 },
                ResultSetEvent::EndUpdate,
            ]
        );
        assert!(rs.is_empty());
        assert_eq!(rs.section_count(), 0);
    }

    #[test]
    fn test_resubscribe_replaces_previous() {
        let mut ctx = main_context();
        let mut rs = query_notebooks(&ctx, None).unwrap();
        let mut first = rs.subscribe();
        let mut second = rs.subscribe();

        Notebook::create(&mut ctx, Utc::now(), "x").unwrap();
        ctx.process_pending_changes();
        rs.process_changes(&ctx).unwrap();

        assert!(first.try_recv().is_err());
        assert_eq!(second.try_recv().unwrap(), ResultSetEvent::BeginUpdate);
    }

    #[test]
    fn test_diff_delete_and_move() {
        let old = [1, 2, 3, 4];
        let new = [4, 1, 3];
        let events = diff(&old, &new, |v| *v);

        assert_eq!(
            events,
            vec![
                ResultSetEvent::BeginUpdate,
                ResultSetEvent::RowDeleted {
                    at: IndexPath::row(1)
                },
                ResultSetEvent::RowMoved {
                    from: IndexPath::row(3),
                    to: IndexPath::row(0)
                },
                ResultSetEvent::EndUpdate,
            ]
        );
    }

    #[test]
    fn test_longest_increasing_marks_stable_rows() {
        assert_eq!(longest_increasing(&[0, 1, 2]), [true, true, true]);
        assert_eq!(longest_increasing(&[2, 0, 1]), [false, true, true]);
        assert!(longest_increasing(&[]).is_empty());
    }
}
