pub fn new_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

/// Short id for chat messages. Nine hex chars is plenty for a wall that
/// only lives as long as the channel subscription.
pub fn new_short_id() -> String {
    let uuid = uuid::Uuid::new_v4();
    let bytes = uuid.as_bytes();
    format!(
        "{:02x}{:02x}{:02x}{:02x}{:x}",
        bytes[0],
        bytes[1],
        bytes[2],
        bytes[3],
        bytes[4] >> 4
    )
}
