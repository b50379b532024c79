use serde::Serialize;
use std::sync::OnceLock;

static QUIET: OnceLock<bool> = OnceLock::new();

/// Suppresses human chatter, e.g. when the CLI runs under a supervisor
pub fn is_quiet() -> bool {
    *QUIET.get_or_init(|| {
        std::env::var("DATAGRAPH_QUIET")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    })
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputMode {
    Human,
    Json,
}

impl OutputMode {
    pub fn from_flag(json: bool) -> Self {
        if json { OutputMode::Json } else { OutputMode::Human }
    }

    pub fn is_human(&self) -> bool {
        *self == OutputMode::Human
    }

    pub fn is_chatty(&self) -> bool {
        self.is_human() && !is_quiet()
    }
}

/// Print one machine-readable result envelope
pub fn emit_success<T: Serialize>(mode: OutputMode, command: &str, data: T) -> anyhow::Result<()> {
    if mode == OutputMode::Json {
        let envelope = serde_json::json!({
            "ok": true,
            "command": command,
            "data": data,
        });
        println!("{}", serde_json::to_string_pretty(&envelope)?);
    }
    Ok(())
}
