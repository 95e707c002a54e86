use domain::{Article, ArticleId, Author, AuthorId, DomainError, Magazine, MagazineId};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::env;
use std::str::FromStr;
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

// --- Application Errors ---
#[derive(Error, Debug)]
pub enum ApplicationError {
    #[error("Author not found: {0}")]
    AuthorNotFound(AuthorId),
    #[error("Magazine not found: {0}")]
    MagazineNotFound(MagazineId),
    #[error("Article not found: {0}")]
    ArticleNotFound(ArticleId),
    #[error("Domain validation error: {0}")]
    DomainError(#[from] DomainError), // Propagate domain errors cleanly
    #[error("Infrastructure error: {0}")]
    InfrastructureError(String),
}

/// Coarse classification of an [`ApplicationError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// A reference does not resolve to an entity of the required kind.
    TypeConstraint,
    /// A value failed a length or emptiness bound.
    ValueConstraint,
    /// A set-once field was targeted for reassignment.
    ImmutableField,
    Infrastructure,
}

impl ApplicationError {
    /// Maps the error onto the catalog's error taxonomy.
    ///
    /// Every `*NotFound` is reported as [`ErrorKind::TypeConstraint`]. That
    /// covers a dangling reference (an article pointing at an unknown author)
    /// as well as a lookup of an unknown id through `get_*` or `update_*`.
    /// Match on the variant itself to tell the two apart.
    pub fn kind(&self) -> ErrorKind {
        match self {
            ApplicationError::AuthorNotFound(_)
            | ApplicationError::MagazineNotFound(_)
            | ApplicationError::ArticleNotFound(_) => ErrorKind::TypeConstraint,
            ApplicationError::DomainError(DomainError::ValueConstraint { .. }) => {
                ErrorKind::ValueConstraint
            }
            ApplicationError::DomainError(DomainError::ImmutableField(_)) => {
                ErrorKind::ImmutableField
            }
            ApplicationError::InfrastructureError(_) => ErrorKind::Infrastructure,
        }
    }
}

// --- Settings ---

pub const CONTRIBUTOR_THRESHOLD_ENV: &str = "CATALOG_CONTRIBUTOR_THRESHOLD";
/// An author must have strictly more articles than this in one magazine to
/// count as a contributing author.
pub const DEFAULT_CONTRIBUTOR_THRESHOLD: usize = 2;

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct CatalogSettings {
    pub contributor_threshold: usize,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            contributor_threshold: DEFAULT_CONTRIBUTOR_THRESHOLD,
        }
    }
}

impl CatalogSettings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for
    /// missing or unparsable values.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let contributor_threshold = match lookup(CONTRIBUTOR_THRESHOLD_ENV) {
            Some(raw) => match usize::from_str(raw.trim()) {
                Ok(threshold) => {
                    info!(
                        "Using contributor threshold {} from environment variable {}.",
                        threshold, CONTRIBUTOR_THRESHOLD_ENV
                    );
                    threshold
                }
                Err(_) => {
                    warn!(
                        "Invalid {} value '{}'. Using default threshold {}.",
                        CONTRIBUTOR_THRESHOLD_ENV, raw, DEFAULT_CONTRIBUTOR_THRESHOLD
                    );
                    DEFAULT_CONTRIBUTOR_THRESHOLD
                }
            },
            None => {
                info!(
                    "{} not set. Using default threshold {}.",
                    CONTRIBUTOR_THRESHOLD_ENV, DEFAULT_CONTRIBUTOR_THRESHOLD
                );
                DEFAULT_CONTRIBUTOR_THRESHOLD
            }
        };
        Self {
            contributor_threshold,
        }
    }
}

// --- Infrastructure Interfaces (Traits) ---

/// Selects a subset of the article registry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArticleFilter {
    ByAuthor(AuthorId),
    ByMagazine(MagazineId),
}

impl ArticleFilter {
    pub fn matches(&self, article: &Article) -> bool {
        match *self {
            ArticleFilter::ByAuthor(author) => article.author() == author,
            ArticleFilter::ByMagazine(magazine) => article.magazine() == magazine,
        }
    }
}

/// Ordered, append-only registries of every author, magazine and article.
///
/// Listing methods return entities in creation order. Identifiers are handed
/// out by the repository and are only meaningful within it.
pub trait CatalogRepository: Send + Sync {
    /// Builds an author for the next free id and appends it, as one step.
    /// Nothing is stored if `build` fails.
    fn insert_author(
        &self,
        build: &dyn Fn(AuthorId) -> Result<Author, DomainError>,
    ) -> Result<Author, ApplicationError>;
    fn get_author(&self, id: AuthorId) -> Result<Option<Author>, ApplicationError>;
    fn list_authors(&self) -> Result<Vec<Author>, ApplicationError>;

    fn insert_magazine(
        &self,
        build: &dyn Fn(MagazineId) -> Result<Magazine, DomainError>,
    ) -> Result<Magazine, ApplicationError>;
    /// Applies `change` to a copy of the stored magazine and writes it back
    /// only if `change` succeeds. `None` when the id is unknown.
    fn update_magazine(
        &self,
        id: MagazineId,
        change: &dyn Fn(&mut Magazine) -> Result<(), DomainError>,
    ) -> Result<Option<Magazine>, ApplicationError>;
    fn get_magazine(&self, id: MagazineId) -> Result<Option<Magazine>, ApplicationError>;
    fn list_magazines(&self) -> Result<Vec<Magazine>, ApplicationError>;

    fn insert_article(
        &self,
        build: &dyn Fn(ArticleId) -> Result<Article, DomainError>,
    ) -> Result<Article, ApplicationError>;
    fn update_article(
        &self,
        id: ArticleId,
        change: &dyn Fn(&mut Article) -> Result<(), DomainError>,
    ) -> Result<Option<Article>, ApplicationError>;
    fn get_article(&self, id: ArticleId) -> Result<Option<Article>, ApplicationError>;
    fn list_articles(&self) -> Result<Vec<Article>, ApplicationError>;

    /// Articles matching `filter`, in registry order.
    #[instrument(skip(self))]
    fn find_articles(&self, filter: ArticleFilter) -> Result<Vec<Article>, ApplicationError> {
        debug!("Filtering articles via default iteration");
        Ok(self
            .list_articles()?
            .into_iter()
            .filter(|article| filter.matches(article))
            .collect())
    }
}

// --- Request/Response Models (Data Transfer Objects - DTOs) ---

#[derive(Deserialize, Debug, Clone)]
pub struct CreateArticleRequest {
    pub author: AuthorId,
    pub magazine: MagazineId,
    pub title: String,
}

/// Requested changes to an author. Names are set once, so any `name` fails.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct AuthorUpdate {
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Deserialize, Debug, Clone, Default)]
pub struct MagazineUpdate {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
}

/// Requested changes to an article. Titles are set once, so any `title` fails.
#[derive(Deserialize, Debug, Clone, Default)]
pub struct ArticleUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub author: Option<AuthorId>,
    #[serde(default)]
    pub magazine: Option<MagazineId>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct AuthorProfile {
    pub id: AuthorId,
    pub name: String,
    /// Titles of the author's articles, in creation order.
    pub articles: Vec<String>,
    /// Names of the magazines written for, first-seen order.
    pub magazines: Vec<String>,
    pub topic_areas: Option<Vec<String>>,
}

#[derive(Serialize, Debug, Clone, PartialEq, Eq)]
pub struct MagazineProfile {
    pub id: MagazineId,
    pub name: String,
    pub category: String,
    pub article_titles: Option<Vec<String>>,
    /// Names of every author published here, first-seen order.
    pub contributors: Vec<String>,
    pub contributing_authors: Option<Vec<String>>,
}

// --- Shared lookups ---

fn require_author(repo: &dyn CatalogRepository, id: AuthorId) -> Result<Author, ApplicationError> {
    repo.get_author(id)?.ok_or_else(|| {
        warn!(author = %id, "Author reference does not resolve");
        ApplicationError::AuthorNotFound(id)
    })
}

fn require_magazine(
    repo: &dyn CatalogRepository,
    id: MagazineId,
) -> Result<Magazine, ApplicationError> {
    repo.get_magazine(id)?.ok_or_else(|| {
        warn!(magazine = %id, "Magazine reference does not resolve");
        ApplicationError::MagazineNotFound(id)
    })
}

fn require_article(
    repo: &dyn CatalogRepository,
    id: ArticleId,
) -> Result<Article, ApplicationError> {
    repo.get_article(id)?.ok_or_else(|| {
        warn!(article = %id, "Article reference does not resolve");
        ApplicationError::ArticleNotFound(id)
    })
}

/// Validates every part of a new article before it touches the registry.
fn register_article(
    repo: &dyn CatalogRepository,
    author: AuthorId,
    magazine: MagazineId,
    title: String,
) -> Result<Article, ApplicationError> {
    require_author(repo, author)?;
    require_magazine(repo, magazine)?;
    // Registries are append-only, so the references checked above stay valid.
    let article = repo.insert_article(&|id| Article::new(id, author, magazine, title.as_str()))?;
    info!(article = %article.id(), author = %author, magazine = %magazine, "Article registered");
    Ok(article)
}

/// Removes repeated ids, keeping the first occurrence.
fn first_seen<T: Copy + Eq + std::hash::Hash>(ids: impl IntoIterator<Item = T>) -> Vec<T> {
    let mut seen = HashSet::new();
    ids.into_iter().filter(|id| seen.insert(*id)).collect()
}

// --- Application Services ---

/// Service for authors and the queries that start from one.
pub struct AuthorService {
    repo: Arc<dyn CatalogRepository>,
}

impl AuthorService {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self))]
    pub fn create_author(&self, name: &str) -> Result<Author, ApplicationError> {
        let author = self.repo.insert_author(&|id| Author::new(id, name))?;
        info!(author = %author.id(), "Author created");
        Ok(author)
    }

    #[instrument(skip(self))]
    pub fn get_author(&self, id: AuthorId) -> Result<Author, ApplicationError> {
        require_author(self.repo.as_ref(), id)
    }

    #[instrument(skip(self))]
    pub fn list_authors(&self) -> Result<Vec<Author>, ApplicationError> {
        self.repo.list_authors()
    }

    /// Applies `update` to the author. Names are set once, so only an empty
    /// update succeeds.
    #[instrument(skip(self))]
    pub fn update_author(
        &self,
        id: AuthorId,
        update: AuthorUpdate,
    ) -> Result<Author, ApplicationError> {
        let author = require_author(self.repo.as_ref(), id)?;
        if update.name.is_some() {
            warn!(author = %id, "Rejected attempt to rename author");
            return Err(DomainError::ImmutableField("name").into());
        }
        Ok(author)
    }

    /// Creates an article written by `author` for `magazine`.
    #[instrument(skip(self))]
    pub fn add_article(
        &self,
        author: AuthorId,
        magazine: MagazineId,
        title: &str,
    ) -> Result<Article, ApplicationError> {
        register_article(self.repo.as_ref(), author, magazine, title.to_string())
    }

    /// Every article by `author`, in creation order.
    #[instrument(skip(self))]
    pub fn articles(&self, author: AuthorId) -> Result<Vec<Article>, ApplicationError> {
        require_author(self.repo.as_ref(), author)?;
        self.repo.find_articles(ArticleFilter::ByAuthor(author))
    }

    /// Distinct magazines `author` has written for, in first-seen order.
    #[instrument(skip(self))]
    pub fn magazines(&self, author: AuthorId) -> Result<Vec<Magazine>, ApplicationError> {
        let articles = self.articles(author)?;
        first_seen(articles.iter().map(Article::magazine))
            .into_iter()
            .map(|id| require_magazine(self.repo.as_ref(), id))
            .collect()
    }

    /// Distinct categories across the author's magazines, or `None` if the
    /// author has no articles.
    #[instrument(skip(self))]
    pub fn topic_areas(&self, author: AuthorId) -> Result<Option<Vec<String>>, ApplicationError> {
        let magazines = self.magazines(author)?;
        if magazines.is_empty() {
            debug!(author = %author, "Author has no articles, no topic areas");
            return Ok(None);
        }
        let mut categories: Vec<String> = Vec::new();
        for magazine in magazines {
            if !categories.iter().any(|c| c == magazine.category()) {
                categories.push(magazine.category().to_string());
            }
        }
        Ok(Some(categories))
    }

    #[instrument(skip(self))]
    pub fn profile(&self, id: AuthorId) -> Result<AuthorProfile, ApplicationError> {
        let author = require_author(self.repo.as_ref(), id)?;
        let articles = self
            .articles(id)?
            .iter()
            .map(|article| article.title().to_string())
            .collect();
        let magazines = self
            .magazines(id)?
            .iter()
            .map(|magazine| magazine.name().to_string())
            .collect();
        Ok(AuthorProfile {
            id,
            name: author.name().to_string(),
            articles,
            magazines,
            topic_areas: self.topic_areas(id)?,
        })
    }
}

/// Service for magazines and the queries that start from one.
pub struct MagazineService {
    repo: Arc<dyn CatalogRepository>,
    settings: CatalogSettings,
}

impl MagazineService {
    pub fn new(repo: Arc<dyn CatalogRepository>, settings: CatalogSettings) -> Self {
        Self { repo, settings }
    }

    #[instrument(skip(self))]
    pub fn create_magazine(
        &self,
        name: &str,
        category: &str,
    ) -> Result<Magazine, ApplicationError> {
        let magazine = self
            .repo
            .insert_magazine(&|id| Magazine::new(id, name, category))?;
        info!(magazine = %magazine.id(), "Magazine created");
        Ok(magazine)
    }

    #[instrument(skip(self))]
    pub fn get_magazine(&self, id: MagazineId) -> Result<Magazine, ApplicationError> {
        require_magazine(self.repo.as_ref(), id)
    }

    #[instrument(skip(self))]
    pub fn list_magazines(&self) -> Result<Vec<Magazine>, ApplicationError> {
        self.repo.list_magazines()
    }

    /// Renames and/or recategorises a magazine. Every supplied field is
    /// validated before the registry is touched.
    #[instrument(skip(self))]
    pub fn update_magazine(
        &self,
        id: MagazineId,
        update: MagazineUpdate,
    ) -> Result<Magazine, ApplicationError> {
        let magazine = self
            .repo
            .update_magazine(id, &|magazine| {
                if let Some(name) = update.name.as_deref() {
                    magazine.set_name(name)?;
                }
                if let Some(category) = update.category.as_deref() {
                    magazine.set_category(category)?;
                }
                Ok(())
            })?
            .ok_or_else(|| {
                warn!(magazine = %id, "Magazine reference does not resolve");
                ApplicationError::MagazineNotFound(id)
            })?;
        info!(magazine = %id, "Magazine updated");
        Ok(magazine)
    }

    /// Every article published in `magazine`, in creation order.
    #[instrument(skip(self))]
    pub fn articles(&self, magazine: MagazineId) -> Result<Vec<Article>, ApplicationError> {
        require_magazine(self.repo.as_ref(), magazine)?;
        self.repo.find_articles(ArticleFilter::ByMagazine(magazine))
    }

    /// Distinct authors published in `magazine`, in first-seen order.
    #[instrument(skip(self))]
    pub fn contributors(&self, magazine: MagazineId) -> Result<Vec<Author>, ApplicationError> {
        let articles = self.articles(magazine)?;
        first_seen(articles.iter().map(Article::author))
            .into_iter()
            .map(|id| require_author(self.repo.as_ref(), id))
            .collect()
    }

    /// Titles of the magazine's articles, or `None` if it has none.
    #[instrument(skip(self))]
    pub fn article_titles(
        &self,
        magazine: MagazineId,
    ) -> Result<Option<Vec<String>>, ApplicationError> {
        let articles = self.articles(magazine)?;
        if articles.is_empty() {
            return Ok(None);
        }
        Ok(Some(
            articles
                .into_iter()
                .map(|article| article.title().to_string())
                .collect(),
        ))
    }

    /// Authors with more than the configured threshold of articles in
    /// `magazine`, first-seen order. `None` when nobody qualifies.
    #[instrument(skip(self))]
    pub fn contributing_authors(
        &self,
        magazine: MagazineId,
    ) -> Result<Option<Vec<Author>>, ApplicationError> {
        let articles = self.articles(magazine)?;

        let mut order = Vec::new();
        let mut counts: HashMap<AuthorId, usize> = HashMap::new();
        for article in &articles {
            let count = counts.entry(article.author()).or_insert_with(|| {
                order.push(article.author());
                0
            });
            *count += 1;
        }

        let threshold = self.settings.contributor_threshold;
        let qualifying = order
            .into_iter()
            .filter(|id| counts[id] > threshold)
            .map(|id| require_author(self.repo.as_ref(), id))
            .collect::<Result<Vec<_>, _>>()?;
        debug!(
            magazine = %magazine,
            threshold,
            qualifying = qualifying.len(),
            "Counted contributing authors"
        );

        if qualifying.is_empty() {
            Ok(None)
        } else {
            Ok(Some(qualifying))
        }
    }

    /// The magazine with the most articles overall.
    ///
    /// Ties go to the magazine created first. `None` when there are no
    /// magazines or no articles.
    #[instrument(skip(self))]
    pub fn top_publisher(&self) -> Result<Option<Magazine>, ApplicationError> {
        let articles = self.repo.list_articles()?;
        if articles.is_empty() {
            debug!("No articles registered, no top publisher");
            return Ok(None);
        }
        let magazines = self.repo.list_magazines()?;

        let mut counts: HashMap<MagazineId, usize> = HashMap::new();
        for article in &articles {
            *counts.entry(article.magazine()).or_default() += 1;
        }

        let mut top: Option<(Magazine, usize)> = None;
        for magazine in magazines {
            let count = counts.get(&magazine.id()).copied().unwrap_or(0);
            // Strictly greater keeps the earliest magazine on a tie.
            if top.as_ref().is_none_or(|(_, best)| count > *best) {
                top = Some((magazine, count));
            }
        }

        if let Some((magazine, count)) = &top {
            info!(magazine = %magazine.id(), articles = count, "Top publisher found");
        }
        Ok(top.map(|(magazine, _)| magazine))
    }

    #[instrument(skip(self))]
    pub fn profile(&self, id: MagazineId) -> Result<MagazineProfile, ApplicationError> {
        let magazine = require_magazine(self.repo.as_ref(), id)?;
        let names = |authors: Vec<Author>| -> Vec<String> {
            authors
                .iter()
                .map(|author| author.name().to_string())
                .collect()
        };
        Ok(MagazineProfile {
            id,
            name: magazine.name().to_string(),
            category: magazine.category().to_string(),
            article_titles: self.article_titles(id)?,
            contributors: names(self.contributors(id)?),
            contributing_authors: self.contributing_authors(id)?.map(names),
        })
    }
}

/// Service for creating, reading and re-linking articles.
pub struct ArticleService {
    repo: Arc<dyn CatalogRepository>,
}

impl ArticleService {
    pub fn new(repo: Arc<dyn CatalogRepository>) -> Self {
        Self { repo }
    }

    #[instrument(skip(self, request), fields(author = %request.author, magazine = %request.magazine))]
    pub fn create_article(
        &self,
        request: CreateArticleRequest,
    ) -> Result<Article, ApplicationError> {
        register_article(
            self.repo.as_ref(),
            request.author,
            request.magazine,
            request.title,
        )
    }

    #[instrument(skip(self))]
    pub fn get_article(&self, id: ArticleId) -> Result<Article, ApplicationError> {
        require_article(self.repo.as_ref(), id)
    }

    #[instrument(skip(self))]
    pub fn list_articles(&self) -> Result<Vec<Article>, ApplicationError> {
        self.repo.list_articles()
    }

    /// Re-links an article to another author and/or magazine.
    ///
    /// Titles are set once; an update carrying a title fails whatever its
    /// value. Nothing is stored unless every part of the update is valid.
    #[instrument(skip(self))]
    pub fn update_article(
        &self,
        id: ArticleId,
        update: ArticleUpdate,
    ) -> Result<Article, ApplicationError> {
        require_article(self.repo.as_ref(), id)?;
        if update.title.is_some() {
            warn!(article = %id, "Rejected attempt to retitle article");
            return Err(DomainError::ImmutableField("title").into());
        }
        if let Some(author) = update.author {
            require_author(self.repo.as_ref(), author)?;
        }
        if let Some(magazine) = update.magazine {
            require_magazine(self.repo.as_ref(), magazine)?;
        }
        let article = self
            .repo
            .update_article(id, &|article| {
                if let Some(author) = update.author {
                    article.set_author(author);
                }
                if let Some(magazine) = update.magazine {
                    article.set_magazine(magazine);
                }
                Ok(())
            })?
            .ok_or(ApplicationError::ArticleNotFound(id))?;
        info!(article = %id, "Article updated");
        Ok(article)
    }
}

/// The three services wired to one shared repository.
pub struct Catalog {
    pub authors: AuthorService,
    pub magazines: MagazineService,
    pub articles: ArticleService,
}

impl Catalog {
    pub fn new(repo: Arc<dyn CatalogRepository>, settings: CatalogSettings) -> Self {
        Self {
            authors: AuthorService::new(repo.clone()),
            magazines: MagazineService::new(repo.clone(), settings),
            articles: ArticleService::new(repo),
        }
    }
}
