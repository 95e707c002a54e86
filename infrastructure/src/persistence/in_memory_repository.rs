// ./infrastructure/src/persistence/in_memory_repository.rs
use application::{ApplicationError, ArticleFilter, CatalogRepository};
use domain::{Article, ArticleId, Author, AuthorId, DomainError, Magazine, MagazineId};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, error, instrument};

/// One append-only vector per entity kind. An entity's id is its position.
#[derive(Debug, Default)]
struct Registries {
    authors: Vec<Author>,
    magazines: Vec<Magazine>,
    articles: Vec<Article>,
}

/// Catalog registries held in process memory.
///
/// Clones share the same registries. Nothing is ever removed, so the id handed
/// out for an entity stays valid for the lifetime of the repository. Ids are
/// allocated under the same write lock that appends the entity.
#[derive(Debug, Clone, Default)]
pub struct InMemoryCatalogRepository {
    registries: Arc<RwLock<Registries>>,
}

impl InMemoryCatalogRepository {
    pub fn new() -> Self {
        Self {
            registries: Arc::new(RwLock::new(Registries::default())),
        }
    }

    fn read(&self) -> Result<RwLockReadGuard<'_, Registries>, ApplicationError> {
        self.registries.read().map_err(|e| {
            error!("Catalog registries lock poisoned: {}", e);
            ApplicationError::InfrastructureError("Catalog registries unavailable".to_string())
        })
    }

    fn write(&self) -> Result<RwLockWriteGuard<'_, Registries>, ApplicationError> {
        self.registries.write().map_err(|e| {
            error!("Catalog registries lock poisoned: {}", e);
            ApplicationError::InfrastructureError("Catalog registries unavailable".to_string())
        })
    }
}

/// Builds the entity for the next free position and appends it while the
/// caller still holds the write lock.
fn insert_with<T: Clone>(
    registry: &mut Vec<T>,
    build: impl FnOnce(u64) -> Result<T, DomainError>,
) -> Result<T, ApplicationError> {
    let entity = build(registry.len() as u64)?;
    registry.push(entity.clone());
    Ok(entity)
}

fn lookup<T: Clone>(registry: &[T], position: u64) -> Option<T> {
    usize::try_from(position)
        .ok()
        .and_then(|index| registry.get(index))
        .cloned()
}

/// Applies `change` to a copy of the entity at `position` and stores the copy
/// only if `change` succeeds.
fn update_with<T: Clone>(
    registry: &mut [T],
    position: u64,
    change: impl FnOnce(&mut T) -> Result<(), DomainError>,
) -> Result<Option<T>, ApplicationError> {
    let Some(slot) = usize::try_from(position)
        .ok()
        .and_then(|index| registry.get_mut(index))
    else {
        return Ok(None);
    };
    let mut entity = slot.clone();
    change(&mut entity)?;
    *slot = entity.clone();
    Ok(Some(entity))
}

impl CatalogRepository for InMemoryCatalogRepository {
    #[instrument(skip(self, build))]
    fn insert_author(
        &self,
        build: &dyn Fn(AuthorId) -> Result<Author, DomainError>,
    ) -> Result<Author, ApplicationError> {
        debug!("Inserting author into in-memory store");
        insert_with(&mut self.write()?.authors, |position| {
            build(AuthorId::new(position))
        })
    }

    fn get_author(&self, id: AuthorId) -> Result<Option<Author>, ApplicationError> {
        Ok(lookup(&self.read()?.authors, id.get()))
    }

    fn list_authors(&self) -> Result<Vec<Author>, ApplicationError> {
        Ok(self.read()?.authors.clone())
    }

    #[instrument(skip(self, build))]
    fn insert_magazine(
        &self,
        build: &dyn Fn(MagazineId) -> Result<Magazine, DomainError>,
    ) -> Result<Magazine, ApplicationError> {
        debug!("Inserting magazine into in-memory store");
        insert_with(&mut self.write()?.magazines, |position| {
            build(MagazineId::new(position))
        })
    }

    #[instrument(skip(self, change))]
    fn update_magazine(
        &self,
        id: MagazineId,
        change: &dyn Fn(&mut Magazine) -> Result<(), DomainError>,
    ) -> Result<Option<Magazine>, ApplicationError> {
        debug!("Updating magazine in in-memory store");
        update_with(&mut self.write()?.magazines, id.get(), change)
    }

    fn get_magazine(&self, id: MagazineId) -> Result<Option<Magazine>, ApplicationError> {
        Ok(lookup(&self.read()?.magazines, id.get()))
    }

    fn list_magazines(&self) -> Result<Vec<Magazine>, ApplicationError> {
        Ok(self.read()?.magazines.clone())
    }

    #[instrument(skip(self, build))]
    fn insert_article(
        &self,
        build: &dyn Fn(ArticleId) -> Result<Article, DomainError>,
    ) -> Result<Article, ApplicationError> {
        debug!("Inserting article into in-memory store");
        insert_with(&mut self.write()?.articles, |position| {
            build(ArticleId::new(position))
        })
    }

    #[instrument(skip(self, change))]
    fn update_article(
        &self,
        id: ArticleId,
        change: &dyn Fn(&mut Article) -> Result<(), DomainError>,
    ) -> Result<Option<Article>, ApplicationError> {
        debug!("Updating article in in-memory store");
        update_with(&mut self.write()?.articles, id.get(), change)
    }

    fn get_article(&self, id: ArticleId) -> Result<Option<Article>, ApplicationError> {
        Ok(lookup(&self.read()?.articles, id.get()))
    }

    fn list_articles(&self) -> Result<Vec<Article>, ApplicationError> {
        Ok(self.read()?.articles.clone())
    }

    /// Filters under the read lock instead of cloning the whole registry.
    #[instrument(skip(self))]
    fn find_articles(&self, filter: ArticleFilter) -> Result<Vec<Article>, ApplicationError> {
        let registries = self.read()?;
        let found: Vec<Article> = registries
            .articles
            .iter()
            .filter(|article| filter.matches(article))
            .cloned()
            .collect();
        debug!(count = found.len(), "Filtered articles in in-memory store");
        Ok(found)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use application::ErrorKind;
    use std::collections::HashSet;
    use std::sync::Barrier;
    use std::thread;

    fn add_author(repo: &InMemoryCatalogRepository, name: &str) -> Author {
        repo.insert_author(&|id| Author::new(id, name)).unwrap()
    }

    #[test]
    fn ids_follow_registry_length() {
        let repo = InMemoryCatalogRepository::new();
        assert_eq!(add_author(&repo, "Ann").id(), AuthorId::new(0));
        assert_eq!(add_author(&repo, "Bob").id(), AuthorId::new(1));
    }

    #[test]
    fn failed_build_stores_nothing_and_keeps_the_id_free() {
        let repo = InMemoryCatalogRepository::new();
        let result = repo.insert_author(&|id| Author::new(id, ""));
        assert!(matches!(result, Err(ApplicationError::DomainError(_))));
        assert!(repo.list_authors().unwrap().is_empty());
        assert_eq!(add_author(&repo, "Ann").id(), AuthorId::new(0));
    }

    #[test]
    fn update_replaces_in_place() {
        let repo = InMemoryCatalogRepository::new();
        let magazine = repo
            .insert_magazine(&|id| Magazine::new(id, "Vogue", "Fashion"))
            .unwrap();

        let updated = repo
            .update_magazine(magazine.id(), &|m| m.set_category("Style"))
            .unwrap()
            .unwrap();
        assert_eq!(updated.category(), "Style");

        let stored = repo.list_magazines().unwrap();
        assert_eq!(stored.len(), 1);
        assert_eq!(stored[0].category(), "Style");
    }

    #[test]
    fn failed_update_keeps_the_stored_entity() {
        let repo = InMemoryCatalogRepository::new();
        let magazine = repo
            .insert_magazine(&|id| Magazine::new(id, "Vogue", "Fashion"))
            .unwrap();

        let result = repo.update_magazine(magazine.id(), &|m| {
            m.set_name("Vogue Paris")?;
            m.set_category("")
        });
        assert!(result.is_err());
        assert_eq!(repo.get_magazine(magazine.id()).unwrap(), Some(magazine));
    }

    #[test]
    fn update_of_unknown_id_is_none() {
        let repo = InMemoryCatalogRepository::new();
        let result = repo
            .update_article(ArticleId::new(3), &|_| Ok(()))
            .unwrap();
        assert!(result.is_none());
        assert!(repo.list_articles().unwrap().is_empty());
    }

    #[test]
    fn unknown_ids_resolve_to_none() {
        let repo = InMemoryCatalogRepository::new();
        assert!(repo.get_author(AuthorId::new(0)).unwrap().is_none());
        assert!(repo.get_magazine(MagazineId::new(u64::MAX)).unwrap().is_none());
        assert!(repo.get_article(ArticleId::new(2)).unwrap().is_none());
    }

    #[test]
    fn clones_share_registries() {
        let repo = InMemoryCatalogRepository::new();
        let clone = repo.clone();
        add_author(&clone, "Ann");
        assert_eq!(repo.list_authors().unwrap().len(), 1);
    }

    #[test]
    fn concurrent_inserts_never_overwrite_each_other() {
        const THREADS: usize = 8;
        const PER_THREAD: usize = 250;

        let repo = InMemoryCatalogRepository::new();
        let barrier = Barrier::new(THREADS);
        let created: Vec<Author> = thread::scope(|scope| {
            let handles: Vec<_> = (0..THREADS)
                .map(|t| {
                    let repo = &repo;
                    let barrier = &barrier;
                    scope.spawn(move || {
                        barrier.wait();
                        (0..PER_THREAD)
                            .map(|i| add_author(repo, &format!("Author {t}-{i}")))
                            .collect::<Vec<_>>()
                    })
                })
                .collect();
            handles
                .into_iter()
                .flat_map(|handle| handle.join().unwrap())
                .collect()
        });

        let stored = repo.list_authors().unwrap();
        assert_eq!(created.len(), THREADS * PER_THREAD);
        assert_eq!(stored.len(), created.len());

        let ids: HashSet<AuthorId> = created.iter().map(Author::id).collect();
        assert_eq!(ids.len(), created.len());
        for (position, author) in stored.iter().enumerate() {
            assert_eq!(author.id(), AuthorId::new(position as u64));
        }
        for author in &created {
            assert_eq!(repo.get_author(author.id()).unwrap().as_ref(), Some(author));
        }
    }

    #[test]
    fn poisoned_lock_surfaces_as_infrastructure_error() {
        let repo = InMemoryCatalogRepository::new();
        let clone = repo.clone();
        let outcome = thread::spawn(move || {
            let _guard = clone.registries.write().unwrap();
            panic!("writer died while holding the registries");
        })
        .join();
        assert!(outcome.is_err());

        let err = repo.list_authors().unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Infrastructure);
        let err = repo.insert_author(&|id| Author::new(id, "Ann")).unwrap_err();
        assert!(matches!(err, ApplicationError::InfrastructureError(_)));
    }
}
