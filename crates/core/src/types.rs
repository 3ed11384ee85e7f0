/// Job identifiers handed out by the job store.
pub type JobId = uuid::Uuid;

/// All timestamps are UTC.
pub type Timestamp = chrono::DateTime<chrono::Utc>;

/// Current wall-clock time in epoch milliseconds.
///
/// Used to disambiguate remote asset names on the render engine.
pub fn epoch_millis() -> i64 {
    chrono::Utc::now().timestamp_millis()
}
