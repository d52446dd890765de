use rampup_core::types::now_ms;
use rampup_core::{Config, Paths};
use rampup_storage::SessionStore;

fn store() -> anyhow::Result<SessionStore> {
    let paths = Paths::new();
    let config = Config::load_or_default(&paths)?;
    Ok(SessionStore::new(paths, config.sessions.idle_timeout_secs))
}

pub async fn list() -> anyhow::Result<()> {
    let store = store()?;
    let ids = store.list()?;
    if ids.is_empty() {
        println!("No sessions.");
        return Ok(());
    }
    for id in ids {
        let session = store.load_or_create(&id)?;
        println!(
            "{}  {} turns  role: {}",
            id,
            session.turns.len(),
            session.profile.role.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

pub async fn expire() -> anyhow::Result<()> {
    let store = store()?;
    // Touch every on-disk session so idle ones are loaded and eligible.
    for id in store.list()? {
        store.load_or_create(&id)?;
    }
    let expired = store.expire_idle(now_ms())?;
    println!("Expired {} idle session(s).", expired);
    Ok(())
}

pub async fn reset(session_id: &str) -> anyhow::Result<()> {
    let store = store()?;
    store.reset(session_id)?;
    println!("Session {} removed.", session_id);
    Ok(())
}
