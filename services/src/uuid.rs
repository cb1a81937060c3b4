use uuid::Uuid;

/// Deterministic UUIDv5 from an arbitrary string id.
///
/// Qdrant only accepts integer or UUID point ids, so content-derived chunk ids
/// (hex digests) are folded into a UUID before upsert.
pub fn stable_uuid(id: &str) -> Uuid {
    Uuid::new_v5(&Uuid::NAMESPACE_URL, id.as_bytes())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn same_input_same_uuid() {
        assert_eq!(stable_uuid("abc"), stable_uuid("abc"));
        assert_ne!(stable_uuid("abc"), stable_uuid("abd"));
    }
}
