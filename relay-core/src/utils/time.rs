use time::OffsetDateTime;

/// Istante corrente in UTC, troncato al millisecondo.
///
/// Lo store salva i timestamp in millisecondi: troncando qui, il record restituito
/// da `create` è identico a quello riletto dal database.
pub fn now_utc() -> OffsetDateTime {
    let now = OffsetDateTime::now_utc();
    from_unix_millis(to_unix_millis(now)).unwrap_or(now)
}

pub fn to_unix_millis(t: OffsetDateTime) -> i64 {
    (t.unix_timestamp_nanos() / 1_000_000) as i64
}

/// None se il valore è fuori dal range rappresentabile.
pub fn from_unix_millis(ms: i64) -> Option<OffsetDateTime> {
    OffsetDateTime::from_unix_timestamp_nanos(ms as i128 * 1_000_000).ok()
}
