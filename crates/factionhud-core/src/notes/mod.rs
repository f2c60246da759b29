//! Free-text notes about players, persisted under the `notes` key.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};

use tracing::debug;

use crate::models::Note;
use crate::storage::{load_or_default, save_or_warn, KeyValueStore, NOTES_KEY};
use crate::utils::lock;

pub struct NoteBook {
    store: Arc<dyn KeyValueStore>,
    notes: Mutex<BTreeMap<String, Note>>,
}

impl NoteBook {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        let notes: BTreeMap<String, Note> = load_or_default(store.as_ref(), NOTES_KEY);
        debug!(count = notes.len(), "Loaded notes");
        Self {
            store,
            notes: Mutex::new(notes),
        }
    }

    fn persist(&self, notes: &BTreeMap<String, Note>) {
        save_or_warn(self.store.as_ref(), NOTES_KEY, notes);
    }

    /// The note for `player_id`, or an empty one
    pub fn get(&self, player_id: &str) -> Note {
        lock(&self.notes).get(player_id).cloned().unwrap_or_default()
    }

    pub fn set(&self, player_id: &str, text: &str, color: &str) -> Note {
        let note = Note::new(text, color);
        let mut notes = lock(&self.notes);
        notes.insert(player_id.to_string(), note.clone());
        self.persist(&notes);
        note
    }

    pub fn remove(&self, player_id: &str) -> bool {
        let mut notes = lock(&self.notes);
        let removed = notes.remove(player_id).is_some();
        if removed {
            self.persist(&notes);
        }
        removed
    }

    pub fn all(&self) -> BTreeMap<String, Note> {
        lock(&self.notes).clone()
    }

    pub fn has(&self, player_id: &str) -> bool {
        lock(&self.notes)
            .get(player_id)
            .map(|n| !n.is_empty())
            .unwrap_or(false)
    }

    /// Case-insensitive substring match on note text
    pub fn search(&self, query: &str) -> Vec<(String, Note)> {
        let query = query.to_lowercase();
        lock(&self.notes)
            .iter()
            .filter(|(_, note)| note.text.to_lowercase().contains(&query))
            .map(|(id, note)| (id.clone(), note.clone()))
            .collect()
    }

    pub fn clear_all(&self) {
        let mut notes = lock(&self.notes);
        notes.clear();
        self.persist(&notes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::MemoryStore;

    fn notebook(store: &Arc<MemoryStore>) -> NoteBook {
        NoteBook::new(Arc::clone(store) as Arc<dyn KeyValueStore>)
    }

    #[test]
    fn test_missing_note_is_empty() {
        let book = notebook(&Arc::new(MemoryStore::new()));
        assert!(book.get("9").is_empty());
        assert!(!book.has("9"));
    }

    #[test]
    fn test_set_and_reload() {
        let store = Arc::new(MemoryStore::new());
        {
            let book = notebook(&store);
            book.set("9", "Huge defense, skip", "red");
        }
        let book = notebook(&store);
        let note = book.get("9");
        assert_eq!(note.text, "Huge defense, skip");
        assert_eq!(note.color, "red");
        assert!(note.updated_at.is_some());
        assert!(book.has("9"));
    }

    #[test]
    fn test_blank_text_does_not_count() {
        let book = notebook(&Arc::new(MemoryStore::new()));
        book.set("9", "", "blue");
        assert!(!book.has("9"));
    }

    #[test]
    fn test_search_is_case_insensitive() {
        let book = notebook(&Arc::new(MemoryStore::new()));
        book.set("1", "Uses a Katana", "");
        book.set("2", "katana and shield", "");
        book.set("3", "Easy hit", "");

        let ids: Vec<String> = book.search("KATANA").into_iter().map(|(id, _)| id).collect();
        assert_eq!(ids, vec!["1", "2"]);
    }

    #[test]
    fn test_remove_and_clear() {
        let book = notebook(&Arc::new(MemoryStore::new()));
        book.set("1", "a", "");
        book.set("2", "b", "");

        assert!(book.remove("1"));
        assert!(!book.remove("1"));
        assert_eq!(book.all().len(), 1);

        book.clear_all();
        assert!(book.all().is_empty());
    }
}
