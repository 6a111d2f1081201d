use recall_core::Document;

/// Render retrieved documents as `[source=<source> id=<id>]` headed blocks
/// separated by blank lines, ready to paste into a prompt.
pub fn format_context(docs: &[Document]) -> String {
    docs.iter()
        .map(|d| format!("[source={} id={}]\n{}", d.source, d.id, d.content))
        .collect::<Vec<_>>()
        .join("\n\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn blocks_are_headed_and_separated() {
        let docs = vec![
            Document::new("a1", "doc1", "alpha beta", "manual_text"),
            Document::new("system::crm::0", "system::crm", "System ID: crm", "system_registry"),
        ];
        assert_eq!(
            format_context(&docs),
            "[source=manual_text id=a1]\nalpha beta\n\n[source=system_registry id=system::crm::0]\nSystem ID: crm"
        );
        assert_eq!(format_context(&[]), "");
    }
}
