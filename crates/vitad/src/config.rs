//! Daemon configuration, loaded from environment variables.

/// Runtime settings for one `vitad` instance.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listen address (default: 127.0.0.1:8099).
    pub bind_addr: String,
    /// Seconds a liveness session stays addressable.
    pub liveness_ttl_secs: u64,
    /// Seconds a document session stays addressable.
    pub doc_ttl_secs: u64,
    /// Seconds an uploaded face stays fetchable.
    pub face_ttl_secs: u64,
    /// How often the expiry sweep runs.
    pub sweep_interval_secs: u64,
    /// Cosine score at or above which two faces count as matching.
    pub match_threshold: f32,
    /// Whether document results stay hidden until the completion
    /// callback arrives.
    pub callback_required: bool,
    /// Path the completion callback is posted to.
    pub callback_path: String,
    /// Extra country/doc-type entries merged into the catalogue,
    /// e.g. "jpn:passport,id-card;usa:residence-permit".
    pub extra_doc_types: Vec<(String, Vec<String>)>,
}

impl Config {
    /// Load configuration from `VITA_*` environment variables with defaults.
    pub fn from_env() -> Self {
        Self {
            bind_addr: std::env::var("VITA_BIND_ADDR")
                .unwrap_or_else(|_| "127.0.0.1:8099".to_string()),
            liveness_ttl_secs: env_u64("VITA_LIVENESS_TTL_SECS", 600),
            doc_ttl_secs: env_u64("VITA_DOC_TTL_SECS", 300),
            face_ttl_secs: env_u64("VITA_FACE_TTL_SECS", 600),
            sweep_interval_secs: env_u64("VITA_SWEEP_INTERVAL_SECS", 30),
            match_threshold: env_f32("VITA_MATCH_THRESHOLD", 0.85),
            callback_required: std::env::var("VITA_CALLBACK_REQUIRED")
                .map(|v| v != "0")
                .unwrap_or(true),
            callback_path: normalize_path(
                &std::env::var("VITA_CALLBACK_PATH")
                    .unwrap_or_else(|_| "/doc-capture-callback".to_string()),
            ),
            extra_doc_types: parse_extra_doc_types(
                &std::env::var("VITA_EXTRA_DOC_TYPES").unwrap_or_default(),
            ),
        }
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            bind_addr: "127.0.0.1:8099".to_string(),
            liveness_ttl_secs: 600,
            doc_ttl_secs: 300,
            face_ttl_secs: 600,
            sweep_interval_secs: 30,
            match_threshold: 0.85,
            callback_required: true,
            callback_path: "/doc-capture-callback".to_string(),
            extra_doc_types: Vec::new(),
        }
    }
}

fn env_u64(key: &str, default: u64) -> u64 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn env_f32(key: &str, default: f32) -> f32 {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}

fn normalize_path(path: &str) -> String {
    format!("/{}", path.trim_start_matches('/'))
}

/// Parse "code:type[,type...];code:type[,...]" into catalogue extras.
/// Malformed segments are skipped.
fn parse_extra_doc_types(raw: &str) -> Vec<(String, Vec<String>)> {
    raw.split(';')
        .filter_map(|entry| {
            let (code, types) = entry.split_once(':')?;
            let code = code.trim().to_lowercase();
            let types: Vec<String> = types
                .split(',')
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect();
            if code.is_empty() || types.is_empty() {
                None
            } else {
                Some((code, types))
            }
        })
        .collect()
}
