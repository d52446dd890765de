use rampup_core::{Config, Paths};
use rampup_retrieval::SqliteIndex;

pub async fn run() -> anyhow::Result<()> {
    let paths = Paths::new();

    println!("rampup status");
    println!("=============");
    println!();

    let config_path = paths.config_file();
    let config_exists = config_path.exists();
    println!(
        "Config:    {} {}",
        config_path.display(),
        if config_exists { "✓" } else { "✗ (not found)" }
    );

    if !config_exists {
        println!();
        println!("Run `rampup init` to initialize.");
        return Ok(());
    }

    let config = Config::load(&config_path)?;
    println!("Company:   {}", config.company.name);

    println!();
    println!("Providers:");
    let provider_names = ["openrouter", "openai", "deepseek", "ollama"];
    for name in provider_names {
        let status = if let Some(provider) = config.providers.get(name) {
            if !provider.api_key.is_empty() {
                "✓ configured"
            } else {
                "✗ no key"
            }
        } else {
            "✗ not set"
        };
        println!("  {:12} {}", name, status);
    }

    println!();
    let index_path = paths.index_db();
    if index_path.exists() {
        let index = SqliteIndex::open(&index_path)?;
        println!("Index:     {} documents ({})", index.count()?, index_path.display());
    } else {
        println!("Index:     ✗ empty (run `rampup ingest <dir>`)");
    }

    let sessions_dir = paths.sessions_dir();
    let session_count = if sessions_dir.exists() {
        std::fs::read_dir(&sessions_dir)?
            .filter_map(|e| e.ok())
            .filter(|e| e.path().extension().and_then(|x| x.to_str()) == Some("jsonl"))
            .count()
    } else {
        0
    };
    println!("Sessions:  {}", session_count);

    println!();
    println!("Router:    threshold {} / epsilon {}", config.router.confidence_threshold, config.router.tie_epsilon);
    println!(
        "Turns:     {}s agent timeout, top-{} evidence",
        config.orchestrator.agent_timeout_secs, config.orchestrator.evidence_top_k
    );

    Ok(())
}
