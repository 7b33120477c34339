// Timestamp window check for presence proofs

/// Absolute distance between the proof timestamp and now, in ms.
/// Device clocks can run ahead of the server, so a future timestamp
/// counts as age too.
pub fn proof_age_ms(timestamp_ms: i64, now_ms: i64) -> u64 {
    now_ms.abs_diff(timestamp_ms)
}

/// True when the proof age is inside the window. The boundary itself
/// still passes; only an age beyond the window rejects.
pub fn within_window(timestamp_ms: i64, now_ms: i64, window_ms: u64) -> bool {
    proof_age_ms(timestamp_ms, now_ms) <= window_ms
}
