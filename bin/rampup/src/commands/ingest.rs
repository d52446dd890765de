use rampup_core::Paths;
use rampup_retrieval::SqliteIndex;
use std::path::Path;

pub async fn run(dir: &str, category: &str) -> anyhow::Result<()> {
    let dir = Path::new(dir);
    if !dir.is_dir() {
        anyhow::bail!("{} is not a directory", dir.display());
    }

    let paths = Paths::new();
    paths.ensure_dirs()?;

    let index = SqliteIndex::open(&paths.index_db())?;
    let ingested = index.ingest_dir(dir, category)?;
    let total = index.count()?;

    println!(
        "✓ Ingested {} documents from {} (category: {})",
        ingested,
        dir.display(),
        category
    );
    println!("  Index now holds {} documents", total);

    Ok(())
}
