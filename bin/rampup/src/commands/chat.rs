use rampup_capabilities::builtin_registry;
use rampup_core::{Channel, Config, Error, Paths, TurnRequest};
use rampup_orchestrator::{compose, IntentRouter, Orchestrator};
use rampup_providers::create_provider;
use rampup_providers::Provider;
use rampup_retrieval::{DocumentIndex, SqliteIndex};
use rampup_storage::SessionStore;
use std::io::{self, BufRead, Write};
use std::sync::Arc;
use std::time::Duration;

fn build_orchestrator(paths: &Paths, config: &Config) -> anyhow::Result<Orchestrator> {
    let timeout = Duration::from_secs(config.orchestrator.agent_timeout_secs);
    let provider: Option<Arc<dyn Provider>> =
        create_provider(config, timeout).map(Arc::from);
    if provider.is_none() {
        eprintln!("No provider configured; answers will be extractive only.");
    }

    let index: Option<Arc<dyn DocumentIndex>> = if paths.index_db().exists() {
        Some(Arc::new(SqliteIndex::open(&paths.index_db())?))
    } else {
        eprintln!("No document index found; run `rampup ingest` to ground answers.");
        None
    };

    let registry = Arc::new(builtin_registry(provider.clone())?);
    let router = IntentRouter::new(config.router.clone(), provider, registry.tags());
    let store = SessionStore::new(paths.clone(), config.sessions.idle_timeout_secs);

    Ok(Orchestrator::new(
        store,
        registry,
        router,
        index,
        config.clone(),
    ))
}

async fn send(orchestrator: &Orchestrator, request: TurnRequest) -> anyhow::Result<()> {
    let channel = request.channel;
    match orchestrator.handle_turn(&request).await {
        Ok(result) => {
            let output = compose(&result.reply, channel);
            println!("{}", output.text);
        }
        Err(Error::SessionBusy(id)) => {
            println!("Session {} is already handling a message; try again shortly.", id);
        }
        Err(Error::SessionExpired(id)) => {
            println!(
                "Session {} expired after inactivity. Run `rampup sessions reset {}` to start over.",
                id, id
            );
        }
        Err(e) => return Err(e.into()),
    }
    Ok(())
}

pub async fn run(
    message: Option<String>,
    session: String,
    voice: bool,
    confidence: f64,
) -> anyhow::Result<()> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    let orchestrator = build_orchestrator(&paths, &config)?;

    if let Some(message) = message {
        let request = if voice {
            TurnRequest::voice(&session, &message, confidence)
        } else {
            TurnRequest::text(&session, &message)
        };
        return send(&orchestrator, request).await;
    }

    println!(
        "{} ({}). Type 'exit' to quit.",
        config.company.assistant_name, config.company.name
    );
    let stdin = io::stdin();
    loop {
        print!("> ");
        io::stdout().flush()?;
        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line.eq_ignore_ascii_case("exit") || line.eq_ignore_ascii_case("quit") {
            break;
        }
        send(&orchestrator, TurnRequest::text(&session, line)).await?;
    }

    Ok(())
}
