pub(super) fn default_name() -> String {
    "Parley".to_string()
}

pub(super) fn default_data_dir() -> String {
    "~/.parley".to_string()
}

pub(super) fn default_log_level() -> String {
    "info".to_string()
}

pub(super) fn default_owner_id() -> String {
    "owner".to_string()
}

pub(super) fn default_db_path() -> String {
    "~/.parley/data/parley.db".to_string()
}

pub(super) fn default_sweep_interval_ms() -> u64 {
    1000
}

pub(super) fn default_diffusion_interval_ms() -> u64 {
    3000
}

pub(super) fn default_stale_after_secs() -> u64 {
    300
}

pub(super) fn default_suppression_minutes() -> u64 {
    30
}

pub(super) fn default_max_history_tokens() -> usize {
    8192
}

pub(super) fn default_notice_delay_ms() -> u64 {
    4000
}

pub(super) fn default_jitter_min_ms() -> u64 {
    3000
}

pub(super) fn default_jitter_max_ms() -> u64 {
    6000
}

pub(super) fn default_hosted_models() -> Vec<String> {
    vec!["gpt-4o-mini".to_string()]
}

pub(super) fn default_openai_base_url() -> String {
    "https://api.openai.com/v1".to_string()
}

pub(super) fn default_ollama_base_url() -> String {
    "http://localhost:11434".to_string()
}

pub(super) fn default_num_ctx() -> u32 {
    8192
}

pub(super) fn default_num_predict() -> u32 {
    1000
}

pub(super) fn default_typing_delay_min_ms() -> u64 {
    3000
}

pub(super) fn default_typing_delay_max_ms() -> u64 {
    6000
}

pub(super) fn default_true() -> bool {
    true
}
