use rampup_core::Paths;
use std::io::{self, Write};

const EXAMPLE_CONFIG: &str = r#"{
  "providers": {
    "openrouter": {
      "apiKey": "",
      "apiBase": "https://openrouter.ai/api/v1"
    },
    "openai": {
      "apiKey": "",
      "apiBase": "https://api.openai.com/v1"
    },
    "deepseek": {
      "apiKey": "",
      "apiBase": "https://api.deepseek.com/v1"
    },
    "ollama": {
      "apiKey": "",
      "apiBase": "http://localhost:11434/v1"
    }
  },
  "router": {
    "confidenceThreshold": 0.55,
    "tieEpsilon": 0.05,
    "useModelFallback": true
  },
  "orchestrator": {
    "agentTimeoutSecs": 8,
    "retryDelayMs": 500,
    "evidenceTopK": 3,
    "transcriptConfidenceFloor": 0.5,
    "readinessPolicy": "suggest",
    "readinessFloor": 40
  },
  "sessions": {
    "idleTimeoutSecs": 1800
  },
  "company": {
    "name": "Company",
    "assistantName": "Onboarding Assistant"
  }
}
"#;

pub async fn run(force: bool) -> anyhow::Result<()> {
    let paths = Paths::new();

    if paths.config_file().exists() && !force {
        print!("Config already exists. Overwrite? [y/N] ");
        io::stdout().flush()?;

        let mut input = String::new();
        io::stdin().read_line(&mut input)?;

        if !input.trim().eq_ignore_ascii_case("y") {
            println!("Aborted.");
            return Ok(());
        }
    }

    paths.ensure_dirs()?;
    std::fs::write(paths.config_file(), EXAMPLE_CONFIG)?;
    println!("✓ Created config: {}", paths.config_file().display());
    println!("✓ Created data directories under {}", paths.base.display());
    println!();
    println!("Next steps:");
    println!(
        "  1. Edit {} to add an API key and your company name",
        paths.config_file().display()
    );
    println!("  2. Run `rampup ingest <docs-dir>` to index your onboarding documents");
    println!("  3. Run `rampup chat` to start a conversation");

    Ok(())
}
