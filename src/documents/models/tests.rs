use super::*;

fn document(filename: &str, title: Option<&str>, description: Option<&str>, size: u64) -> Document {
    let now = Utc::now();
    Document {
        id: Uuid::new_v4(),
        filename: filename.to_string(),
        title: title.map(str::to_string),
        description: description.map(str::to_string),
        tags: Vec::new(),
        file_path: PathBuf::from(format!("/tmp/{filename}")),
        file_size: size,
        mime_type: "application/pdf".to_string(),
        pages: Some(1),
        created_at: now,
        updated_at: now,
        indexed: true,
        chunk_count: Some(1),
    }
}

#[test]
fn search_is_case_insensitive_across_fields() {
    let doc = document("Report.pdf", Some("Quarterly Numbers"), Some("Finance team"), 10);

    assert!(doc.matches("report"));
    assert!(doc.matches("QUARTERLY"));
    assert!(doc.matches("finance"));
    assert!(!doc.matches("marketing"));

    let bare = document("notes.pdf", None, None, 10);
    assert!(!bare.matches("quarterly"));
}

#[test]
fn apply_only_touches_given_fields() {
    let mut doc = document("a.pdf", Some("Old"), Some("Keep me"), 1);
    let before = doc.updated_at;

    doc.apply(DocumentUpdate {
        title: Some("New".to_string()),
        description: None,
        tags: Some(vec!["x".to_string()]),
    });

    assert_eq!(doc.title.as_deref(), Some("New"));
    assert_eq!(doc.description.as_deref(), Some("Keep me"));
    assert_eq!(doc.tags, vec!["x".to_string()]);
    assert!(doc.updated_at >= before);
}

#[test]
fn parse_tags_trims_and_drops_blanks() {
    assert_eq!(
        DocumentMetadata::parse_tags(" rust, ,async ,pdf"),
        vec!["rust".to_string(), "async".to_string(), "pdf".to_string()]
    );
    assert!(DocumentMetadata::parse_tags("").is_empty());
}

#[test]
fn stats_average_sizes() {
    let docs = vec![
        document("a.pdf", None, None, 1024 * 1024),
        document("b.pdf", None, None, 3 * 1024 * 1024),
    ];
    let stats = DocumentStats::from_documents(&docs);

    assert_eq!(stats.total_documents, 2);
    assert_eq!(stats.total_size_bytes, 4 * 1024 * 1024);
    assert!((stats.total_size_mb - 4.0).abs() < 1e-9);
    assert!((stats.average_size_mb - 2.0).abs() < 1e-9);

    let empty = DocumentStats::from_documents(&Vec::<Document>::new());
    assert_eq!(empty, DocumentStats::default());
}

#[test]
fn document_serializes_with_iso_timestamps() {
    let doc = document("a.pdf", None, None, 1);
    let value = serde_json::to_value(&doc).expect("should serialize");

    assert_eq!(value["id"], doc.id.to_string());
    assert!(value["created_at"].as_str().is_some_and(|s| s.contains('T')));
    assert_eq!(value["indexed"], true);
}
