use flowstack_core::config::{AppConfig, ProviderConfig};
use flowstack_memory::SqliteVectorStore;

struct CheckResult {
    label: String,
    ok: bool,
    detail: String,
}

pub fn run_doctor(config: &AppConfig) {
    let checks = vec![
        check_provider("OpenAI", &config.providers.openai),
        check_provider("Gemini", &config.providers.gemini),
        check_any_provider(config),
        check_web_search(config),
        check_vector_store(config),
        check_retry(config),
    ];

    let mut ok_count = 0;
    let mut fail_count = 0;

    for check in &checks {
        let icon = if check.ok { "[OK]" } else { "[!!]" };
        println!("  {} {}: {}", icon, check.label, check.detail);
        if check.ok {
            ok_count += 1;
        } else {
            fail_count += 1;
        }
    }

    println!();
    println!("  {} passed, {} issues found", ok_count, fail_count);
}

fn check_provider(label: &str, slot: &Option<ProviderConfig>) -> CheckResult {
    let detail = match slot {
        Some(p) if p.api_key().is_some() => match &p.base_url {
            Some(url) => format!("API key set, base URL {}", url),
            None => "API key set".to_string(),
        },
        Some(_) => "Section present but API key missing or unexpanded".to_string(),
        None => "Not configured".to_string(),
    };
    CheckResult {
        label: label.into(),
        ok: slot.as_ref().map_or(true, |p| p.api_key().is_some()),
        detail,
    }
}

fn check_any_provider(config: &AppConfig) -> CheckResult {
    let keyed = [&config.providers.openai, &config.providers.gemini]
        .into_iter()
        .flatten()
        .any(|p| p.api_key().is_some());
    CheckResult {
        label: "Generation".into(),
        ok: keyed,
        detail: if keyed {
            "At least one provider can serve llm_engine components".into()
        } else {
            "No provider has an API key; every run will fail".into()
        },
    }
}

fn check_web_search(config: &AppConfig) -> CheckResult {
    match &config.web_search {
        Some(ws) => match flowstack_tools::create_web_search(ws) {
            Ok(search) => CheckResult {
                label: "Web Search".into(),
                ok: true,
                detail: format!("Provider {}", search.name()),
            },
            Err(e) => CheckResult {
                label: "Web Search".into(),
                ok: false,
                detail: e.to_string(),
            },
        },
        None => CheckResult {
            label: "Web Search".into(),
            ok: true,
            detail: "Not configured (use_web_search will be skipped)".into(),
        },
    }
}

fn check_vector_store(config: &AppConfig) -> CheckResult {
    let path = config.vector_store_path();
    match SqliteVectorStore::open(&path) {
        Ok(_) => CheckResult {
            label: "Vector Store".into(),
            ok: true,
            detail: format!("{}", path.display()),
        },
        Err(e) => CheckResult {
            label: "Vector Store".into(),
            ok: false,
            detail: format!("{}: {}", path.display(), e),
        },
    }
}

fn check_retry(config: &AppConfig) -> CheckResult {
    match &config.retry {
        Some(retry) if retry.initial_backoff_ms > retry.max_backoff_ms => CheckResult {
            label: "Retry".into(),
            ok: false,
            detail: format!(
                "initial_backoff_ms ({}) exceeds max_backoff_ms ({})",
                retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        },
        Some(retry) => CheckResult {
            label: "Retry".into(),
            ok: true,
            detail: format!(
                "{} retries, {}-{} ms backoff",
                retry.max_retries, retry.initial_backoff_ms, retry.max_backoff_ms
            ),
        },
        None => CheckResult {
            label: "Retry".into(),
            ok: true,
            detail: "Disabled".into(),
        },
    }
}
