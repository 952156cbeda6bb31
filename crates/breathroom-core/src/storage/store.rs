//! Persistence seam for custom patterns and favorites.

use crate::error::Result;
use crate::pattern::BreathingPattern;

/// CRUD for custom patterns, keyed by id and scoped to an owning user.
///
/// The catalog validates before every write; implementations only store
/// and return validated records.
pub trait PatternStore {
    /// Persist a new pattern. Returns it with its assigned id and creation time.
    fn insert_pattern(&self, pattern: &BreathingPattern) -> Result<BreathingPattern>;

    /// `owner`'s patterns, oldest first.
    fn list_patterns(&self, owner: &str) -> Result<Vec<BreathingPattern>>;

    fn get_pattern(&self, id: &str, owner: &str) -> Result<Option<BreathingPattern>>;

    /// Overwrite an existing pattern. Returns false if no row matched.
    fn update_pattern(&self, pattern: &BreathingPattern) -> Result<bool>;

    /// Returns false if no row matched.
    fn delete_pattern(&self, id: &str, owner: &str) -> Result<bool>;

    fn count_patterns(&self, owner: &str) -> Result<usize>;

    /// Favorite pattern ids of `owner`, in the order they were marked.
    fn favorites(&self, owner: &str) -> Result<Vec<String>>;

    fn set_favorites(&self, owner: &str, ids: &[String]) -> Result<()>;
}
