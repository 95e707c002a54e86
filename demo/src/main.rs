// ./demo/src/main.rs
use serde::Serialize;
use std::sync::Arc;
use tracing::{error, info, level_filters::LevelFilter};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

use application::{
    ApplicationError, AuthorProfile, Catalog, CatalogSettings, MagazineProfile,
};
use domain::Magazine;
use infrastructure::InMemoryCatalogRepository;

/// Everything the demo knows about the seeded catalog.
#[derive(Serialize, Debug)]
struct CatalogReport {
    authors: Vec<AuthorProfile>,
    magazines: Vec<MagazineProfile>,
    top_publisher: Option<String>,
}

fn main() {
    // --- Logger Initialization ---
    let filter: EnvFilter = EnvFilter::builder()
        .with_default_directive(LevelFilter::INFO.into())
        .from_env_lossy();
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(filter)
        .init();
    info!("Logger initialized successfully.");

    let settings = CatalogSettings::from_env();

    // --- Dependency Injection ---
    let repository = Arc::new(InMemoryCatalogRepository::new());
    let catalog = Catalog::new(repository, settings);
    info!("Catalog services initialized.");

    let report = match seed(&catalog).and_then(|()| build_report(&catalog)) {
        Ok(report) => report,
        Err(e) => {
            error!("Failed to build catalog report: {}", e);
            std::process::exit(1);
        }
    };

    match serde_json::to_string_pretty(&report) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            error!("Failed to serialize catalog report: {}", e);
            std::process::exit(1);
        }
    }
}

/// Carly writes three pieces for Vogue and one for AutoWeek; Nina writes one
/// for AutoWeek and nobody writes for Wired.
fn seed(catalog: &Catalog) -> Result<(), ApplicationError> {
    let carly = catalog.authors.create_author("Carly Raccoon")?.id();
    let nina = catalog.authors.create_author("Nina Otter")?.id();

    let vogue = catalog.magazines.create_magazine("Vogue", "Fashion")?.id();
    let autoweek = catalog.magazines.create_magazine("AutoWeek", "Cars")?.id();
    catalog.magazines.create_magazine("Wired", "Technology")?;

    for title in ["How to wear a tutu", "Dating life in NYC", "Fall trends 2024"] {
        catalog.authors.add_article(carly, vogue, title)?;
    }
    catalog.authors.add_article(carly, autoweek, "2023 Subaru Outback")?;
    catalog.authors.add_article(nina, autoweek, "Electric pickups compared")?;

    info!("Catalog seeded.");
    Ok(())
}

fn build_report(catalog: &Catalog) -> Result<CatalogReport, ApplicationError> {
    let authors = catalog
        .authors
        .list_authors()?
        .iter()
        .map(|author| catalog.authors.profile(author.id()))
        .collect::<Result<Vec<_>, _>>()?;
    let magazines = catalog
        .magazines
        .list_magazines()?
        .iter()
        .map(|magazine| catalog.magazines.profile(magazine.id()))
        .collect::<Result<Vec<_>, _>>()?;
    let top_publisher = catalog
        .magazines
        .top_publisher()?
        .as_ref()
        .map(Magazine::name)
        .map(str::to_string);

    Ok(CatalogReport {
        authors,
        magazines,
        top_publisher,
    })
}
