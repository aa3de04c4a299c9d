use crate::text::{Fnv1a, OffsetRange};
use crate::workspace::DocumentId;

/// Identity of an equivalent next-edit request.
///
/// Two requests with equal fingerprints would hand a backend the same input.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Fingerprint {
    pub document_id: DocumentId,
    pub version: u64,
    pub selection: Vec<OffsetRange>,
    pub history_checksum: u64,
}

impl Fingerprint {
    pub fn new(
        document_id: DocumentId,
        version: u64,
        selection: Vec<OffsetRange>,
        history_checksum: u64,
    ) -> Self {
        Self {
            document_id,
            version,
            selection,
            history_checksum,
        }
    }

    /// Short digest for log lines.
    pub fn digest(&self) -> u64 {
        let mut hasher = Fnv1a::new();
        hasher.write_str(self.document_id.as_str());
        hasher.write_u64(self.version);
        for range in &self.selection {
            hasher.write_u64(range.start as u64);
            hasher.write_u64(range.end as u64);
        }
        hasher.write_u64(self.history_checksum);
        hasher.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fingerprint(version: u64, caret: usize) -> Fingerprint {
        Fingerprint::new(DocumentId::new("a.rs"), version, vec![OffsetRange::empty(caret)], 42)
    }

    #[test]
    fn test_equal_inputs_are_equal() {
        assert_eq!(fingerprint(1, 3), fingerprint(1, 3));
        assert_eq!(fingerprint(1, 3).digest(), fingerprint(1, 3).digest());
    }

    #[test]
    fn test_selection_and_version_matter() {
        assert_ne!(fingerprint(1, 3), fingerprint(1, 4));
        assert_ne!(fingerprint(1, 3), fingerprint(2, 3));
        assert_ne!(fingerprint(1, 3).digest(), fingerprint(2, 3).digest());
    }
}
