use super::id_macro::string_id;

string_id! {
    /// Identity of a clipboard entry.
    ///
    /// Locally generated (UUID v4) at capture time and replaced by the
    /// server-assigned id once an upload succeeds.
    pub struct EntryId;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn new_ids_are_unique_uuids() {
        let a = EntryId::new();
        let b = EntryId::new();
        assert_ne!(a, b);
        uuid::Uuid::parse_str(a.as_str()).expect("entry id should be a uuid");
    }

    #[test]
    fn serializes_as_bare_string() {
        let id = EntryId::from("42");
        assert_eq!(serde_json::to_string(&id).unwrap(), "\"42\"");
        let back: EntryId = serde_json::from_str("\"42\"").unwrap();
        assert_eq!(back, id);
    }
}
