//! Category lookup table and its name-to-id cache.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use sqlx::{Pool, Postgres, Row};
use tokio::sync::RwLock;
use tracing::debug;

use kbase_core::{Category, CategoryRepository, Error, Result};

/// PostgreSQL category repository.
#[derive(Clone)]
pub struct PgCategoryRepository {
    pool: Pool<Postgres>,
}

impl PgCategoryRepository {
    pub fn new(pool: Pool<Postgres>) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl CategoryRepository for PgCategoryRepository {
    async fn list_all(&self) -> Result<Vec<Category>> {
        let rows = sqlx::query("SELECT id, name FROM category ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(Error::Database)?;

        Ok(rows
            .iter()
            .map(|r| Category {
                id: r.get("id"),
                name: r.get("name"),
            })
            .collect())
    }

    async fn ensure(&self, name: &str) -> Result<Category> {
        let row = sqlx::query(
            "INSERT INTO category (name) VALUES ($1)
             ON CONFLICT (name) DO UPDATE SET name = EXCLUDED.name
             RETURNING id, name",
        )
        .bind(name)
        .fetch_one(&self.pool)
        .await
        .map_err(Error::Database)?;

        Ok(Category {
            id: row.get("id"),
            name: row.get("name"),
        })
    }
}

/// Name-to-id cache over a [`CategoryRepository`].
///
/// The map is loaded on first use. A lookup miss triggers one refetch per
/// load, so categories added after startup are picked up without turning
/// every unknown name into a query. [`CategoryCache::invalidate`] drops the
/// map and re-arms the refetch.
pub struct CategoryCache {
    repo: Arc<dyn CategoryRepository>,
    map: RwLock<Option<HashMap<String, i32>>>,
    refetched: AtomicBool,
}

impl CategoryCache {
    pub fn new(repo: Arc<dyn CategoryRepository>) -> Self {
        Self {
            repo,
            map: RwLock::new(None),
            refetched: AtomicBool::new(false),
        }
    }

    /// Resolve a category name to its id.
    pub async fn resolve(&self, name: &str) -> Result<Option<i32>> {
        if let Some(id) = self.lookup(name).await? {
            return Ok(Some(id));
        }
        if self.refetched.swap(true, Ordering::SeqCst) {
            return Ok(None);
        }
        debug!(
            subsystem = "database",
            component = "category_cache",
            op = "refetch",
            category = name,
            "Category miss, refetching"
        );
        self.reload().await?;
        self.lookup(name).await
    }

    /// Resolve a category name, inserting it into the table when unseen.
    pub async fn resolve_or_insert(&self, name: &str) -> Result<i32> {
        if let Some(id) = self.resolve(name).await? {
            return Ok(id);
        }
        let category = self.repo.ensure(name).await?;
        debug!(
            subsystem = "database",
            component = "category_cache",
            op = "insert",
            category = name,
            id = category.id,
            "New category stored"
        );
        if let Some(map) = self.map.write().await.as_mut() {
            map.insert(category.name, category.id);
        }
        Ok(category.id)
    }

    /// Snapshot of the full name-to-id map.
    pub async fn snapshot(&self) -> Result<HashMap<String, i32>> {
        self.ensure_loaded().await?;
        Ok(self.map.read().await.clone().unwrap_or_default())
    }

    /// Drop the cached map; the next lookup reloads it.
    pub async fn invalidate(&self) {
        *self.map.write().await = None;
        self.refetched.store(false, Ordering::SeqCst);
    }

    async fn lookup(&self, name: &str) -> Result<Option<i32>> {
        self.ensure_loaded().await?;
        Ok(self
            .map
            .read()
            .await
            .as_ref()
            .and_then(|m| m.get(name).copied()))
    }

    async fn ensure_loaded(&self) -> Result<()> {
        if self.map.read().await.is_some() {
            return Ok(());
        }
        self.reload().await
    }

    async fn reload(&self) -> Result<()> {
        let categories = self.repo.list_all().await?;
        let map: HashMap<String, i32> = categories.into_iter().map(|c| (c.name, c.id)).collect();
        debug!(
            subsystem = "database",
            component = "category_cache",
            op = "load",
            count = map.len(),
            "Category map loaded"
        );
        *self.map.write().await = Some(map);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex;

    struct CountingRepo {
        calls: AtomicUsize,
        rows: Mutex<Vec<Category>>,
    }

    impl CountingRepo {
        fn new(rows: Vec<(i32, &str)>) -> Arc<Self> {
            Arc::new(Self {
                calls: AtomicUsize::new(0),
                rows: Mutex::new(
                    rows.into_iter()
                        .map(|(id, name)| Category {
                            id,
                            name: name.to_string(),
                        })
                        .collect(),
                ),
            })
        }
    }

    #[async_trait]
    impl CategoryRepository for CountingRepo {
        async fn list_all(&self) -> Result<Vec<Category>> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(self.rows.lock().unwrap().clone())
        }

        async fn ensure(&self, name: &str) -> Result<Category> {
            let mut rows = self.rows.lock().unwrap();
            if let Some(c) = rows.iter().find(|c| c.name == name) {
                return Ok(c.clone());
            }
            let category = Category {
                id: rows.len() as i32 + 100,
                name: name.to_string(),
            };
            rows.push(category.clone());
            Ok(category)
        }
    }

    #[tokio::test]
    async fn test_resolve_loads_lazily() {
        let repo = CountingRepo::new(vec![(1, "Music"), (2, "Education")]);
        let cache = CategoryCache::new(repo.clone());
        assert_eq!(repo.calls.load(Ordering::SeqCst), 0);

        assert_eq!(cache.resolve("Education").await.unwrap(), Some(2));
        assert_eq!(cache.resolve("Music").await.unwrap(), Some(1));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_first_miss_refetches_once() {
        let repo = CountingRepo::new(vec![(1, "Music")]);
        let cache = CategoryCache::new(repo.clone());
        cache.resolve("Music").await.unwrap();

        repo.rows.lock().unwrap().push(Category {
            id: 7,
            name: "Gaming".into(),
        });
        assert_eq!(cache.resolve("Gaming").await.unwrap(), Some(7));
        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);

        assert_eq!(cache.resolve("Nope").await.unwrap(), None);
        assert_eq!(cache.resolve("Still nope").await.unwrap(), None);
        assert_eq!(repo.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_invalidate_rearms_refetch() {
        let repo = CountingRepo::new(vec![(1, "Music")]);
        let cache = CategoryCache::new(repo.clone());
        assert_eq!(cache.resolve("Comedy").await.unwrap(), None);
        let calls = repo.calls.load(Ordering::SeqCst);

        cache.invalidate().await;
        repo.rows.lock().unwrap().push(Category {
            id: 9,
            name: "Comedy".into(),
        });
        assert_eq!(cache.resolve("Comedy").await.unwrap(), Some(9));
        assert!(repo.calls.load(Ordering::SeqCst) > calls);
        assert_eq!(cache.snapshot().await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_resolve_or_insert_stores_unseen_name() {
        let repo = CountingRepo::new(vec![(1, "Educational & Tutorials")]);
        let cache = CategoryCache::new(repo.clone());

        assert_eq!(cache.resolve_or_insert("Educational & Tutorials").await.unwrap(), 1);
        let id = cache.resolve_or_insert("Stock Picks & Analysis").await.unwrap();
        assert_eq!(id, 101);
        assert_eq!(cache.resolve("Stock Picks & Analysis").await.unwrap(), Some(101));
        assert_eq!(cache.resolve_or_insert("Stock Picks & Analysis").await.unwrap(), 101);
        assert_eq!(repo.rows.lock().unwrap().len(), 2);
    }
}
