//! crates/study_core/src/notebooks.rs
//!
//! Owner-scoped notebook operations and the search rules shared by every
//! `NotebookStore` implementation.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use crate::clock::Clock;
use crate::domain::{NewNotebook, Notebook, NotebookUpdate};
use crate::error::{CoreError, CoreResult};
use crate::ports::NotebookStore;
use crate::tracker::UsageTracker;

pub const LIST_LIMIT: usize = 50;
pub const RECENT_LIMIT: usize = 10;
pub const FEATURED_LIMIT: usize = 6;
pub const SEARCH_LIMIT: usize = 20;

/// Characters of summary shown in search results.
pub const PREVIEW_CHARS: usize = 200;

pub const DEFAULT_CATEGORY: &str = "General";

/// Whether a notebook matches a search query.
///
/// The query is taken literally and compared case-insensitively against the
/// title, summary, category and each tag.
pub fn matches_query(notebook: &Notebook, query: &str) -> bool {
    let needle = query.to_lowercase();
    let hit = |field: &str| field.to_lowercase().contains(&needle);
    hit(&notebook.title)
        || hit(&notebook.summary)
        || hit(&notebook.category)
        || notebook.tags.iter().any(|tag| hit(tag))
}

/// The first [`PREVIEW_CHARS`] characters of a summary followed by an ellipsis.
pub fn summary_preview(summary: &str) -> String {
    let mut preview: String = summary.chars().take(PREVIEW_CHARS).collect();
    preview.push_str("...");
    preview
}

/// Which slice of a user's notebooks to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Listing {
    All,
    Recent,
    Featured,
}

pub struct NotebookService {
    notebooks: Arc<dyn NotebookStore>,
    tracker: Arc<UsageTracker>,
    clock: Arc<dyn Clock>,
}

impl NotebookService {
    pub fn new(
        notebooks: Arc<dyn NotebookStore>,
        tracker: Arc<UsageTracker>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            notebooks,
            tracker,
            clock,
        }
    }

    /// Saves a new notebook and counts it as a reviewed material.
    ///
    /// The notebook is stored first. A failure to bump the counter afterwards is
    /// logged and does not undo or fail the save.
    pub async fn create(&self, owner: Uuid, new: NewNotebook) -> CoreResult<Notebook> {
        if [&new.title, &new.original_text, &new.summary]
            .iter()
            .any(|field| field.trim().is_empty())
        {
            return Err(CoreError::InvalidInput(
                "Title, original text, and summary are required".to_string(),
            ));
        }

        let now = self.clock.now();
        let notebook = Notebook {
            id: Uuid::new_v4(),
            owner,
            title: new.title,
            original_text: new.original_text,
            summary: new.summary,
            summary_length: new.summary_length.unwrap_or_default(),
            category: new
                .category
                .filter(|c| !c.trim().is_empty())
                .unwrap_or_else(|| DEFAULT_CATEGORY.to_string()),
            tags: new.tags,
            is_featured: false,
            source_type: new.source_type.unwrap_or_default(),
            source_file_name: new.source_file_name,
            created_at: now,
            updated_at: now,
        };
        self.notebooks.insert_notebook(&notebook).await?;
        info!(%owner, notebook_id = %notebook.id, "Notebook saved");

        if let Err(e) = self.tracker.increment_material(owner).await {
            warn!(%owner, notebook_id = %notebook.id, error = %e, "Failed to count notebook as reviewed material");
        }
        Ok(notebook)
    }

    pub async fn list(&self, owner: Uuid, listing: Listing) -> CoreResult<Vec<Notebook>> {
        let (featured_only, limit) = match listing {
            Listing::All => (false, LIST_LIMIT),
            Listing::Recent => (false, RECENT_LIMIT),
            Listing::Featured => (true, FEATURED_LIMIT),
        };
        Ok(self
            .notebooks
            .list_notebooks(owner, featured_only, limit)
            .await?)
    }

    /// Returns the trimmed query alongside its matches. A blank query matches nothing.
    pub async fn search(&self, owner: Uuid, query: &str) -> CoreResult<(String, Vec<Notebook>)> {
        let query = query.trim();
        if query.is_empty() {
            return Ok((String::new(), Vec::new()));
        }
        let found = self
            .notebooks
            .search_notebooks(owner, query, SEARCH_LIMIT)
            .await?;
        Ok((query.to_string(), found))
    }

    pub async fn get(&self, owner: Uuid, notebook_id: Uuid) -> CoreResult<Notebook> {
        Ok(self.notebooks.get_notebook(owner, notebook_id).await?)
    }

    pub async fn update(
        &self,
        owner: Uuid,
        notebook_id: Uuid,
        update: NotebookUpdate,
    ) -> CoreResult<Notebook> {
        Ok(self
            .notebooks
            .update_notebook(owner, notebook_id, &update, self.clock.now())
            .await?)
    }

    pub async fn delete(&self, owner: Uuid, notebook_id: Uuid) -> CoreResult<()> {
        self.notebooks.delete_notebook(owner, notebook_id).await?;
        info!(%owner, %notebook_id, "Notebook deleted");
        Ok(())
    }

    /// Flips the featured flag and returns its new value.
    pub async fn toggle_featured(&self, owner: Uuid, notebook_id: Uuid) -> CoreResult<bool> {
        let current = self.notebooks.get_notebook(owner, notebook_id).await?;
        let update = NotebookUpdate {
            is_featured: Some(!current.is_featured),
            ..NotebookUpdate::default()
        };
        let updated = self
            .notebooks
            .update_notebook(owner, notebook_id, &update, self.clock.now())
            .await?;
        Ok(updated.is_featured)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    fn notebook(title: &str, summary: &str, category: &str, tags: &[&str]) -> Notebook {
        Notebook {
            id: Uuid::new_v4(),
            owner: Uuid::new_v4(),
            title: title.to_string(),
            original_text: "text".to_string(),
            summary: summary.to_string(),
            summary_length: Default::default(),
            category: category.to_string(),
            tags: tags.iter().map(|t| t.to_string()).collect(),
            is_featured: false,
            source_type: Default::default(),
            source_file_name: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn query_matches_any_field_case_insensitively() {
        let nb = notebook("Cell Biology", "Mitochondria make ATP", "Science", &["exam"]);
        assert!(matches_query(&nb, "cell"));
        assert!(matches_query(&nb, "ATP"));
        assert!(matches_query(&nb, "scien"));
        assert!(matches_query(&nb, "EXAM"));
        assert!(!matches_query(&nb, "history"));
    }

    #[test]
    fn query_is_taken_literally() {
        let nb = notebook("C++ basics", "pointers", "General", &[]);
        assert!(matches_query(&nb, "c++"));
        assert!(!matches_query(&nb, ".*"));
    }

    #[tokio::test]
    async fn create_survives_a_failed_counter_update() {
        use crate::clock::ManualClock;
        use crate::testing::{MemoryNotebooks, MemoryUsers};

        let clock = Arc::new(ManualClock::new(Utc::now()));
        let users = Arc::new(MemoryUsers::default());
        let owner = users.add_user("Ada", "Lovelace", "ada@example.com");
        let tracker = Arc::new(UsageTracker::new(users.clone(), clock.clone()));
        let store = Arc::new(MemoryNotebooks::default());
        let service = NotebookService::new(store.clone(), tracker, clock);

        users.fail_writes(true);
        let new = NewNotebook {
            title: "Cells".to_string(),
            original_text: "text".to_string(),
            summary: "summary".to_string(),
            ..NewNotebook::default()
        };
        let saved = service.create(owner, new).await.unwrap();

        assert_eq!(store.count(), 1);
        assert_eq!(service.get(owner, saved.id).await.unwrap().title, "Cells");
        assert!(users.usage_of(owner).is_none());
    }

    #[test]
    fn preview_truncates_on_char_boundary() {
        let long = "é".repeat(300);
        let preview = summary_preview(&long);
        assert_eq!(preview.chars().count(), PREVIEW_CHARS + 3);
        assert!(preview.ends_with("..."));
        assert_eq!(summary_preview("short"), "short...");
    }
}
