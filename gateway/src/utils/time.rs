/// Current unix time in seconds.
pub fn now_sec() -> u64 {
    chrono::Utc::now().timestamp().try_into().unwrap_or_default()
}
