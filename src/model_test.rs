use super::*;

#[test]
fn inspiration_deserializes_from_table_row() {
    let row = serde_json::json!({
        "id": "b1",
        "user_id": "u1",
        "content": "https://example.com",
        "description": "",
        "tags": ["AI", "tools"],
        "category": "技术学习",
        "status": "public",
        "image_url": null,
        "created_at": "2024-05-01T08:30:00.123456+00:00"
    });
    let item: Inspiration = serde_json::from_value(row).unwrap();
    assert_eq!(item.owner_id, UserId::new("u1"));
    assert_eq!(item.visibility, Visibility::Public);
    assert_eq!(item.tags, vec!["AI".to_string(), "tools".to_string()]);
    assert!(item.image_url.is_none());
    assert!(item.author.is_none());
    assert_eq!(item.created_at.year(), 2024);
}

#[test]
fn inspiration_tolerates_missing_optional_columns() {
    let row = serde_json::json!({
        "id": "b2",
        "user_id": "u1",
        "content": "note",
        "status": "private",
        "created_at": "2024-05-01T08:30:00Z"
    });
    let item: Inspiration = serde_json::from_value(row).unwrap();
    assert!(item.description.is_none());
    assert!(item.tags.is_empty());
    assert_eq!(item.category, "");
    assert_eq!(item.visibility, Visibility::Private);
}

#[test]
fn new_inspiration_uses_table_column_names() {
    let record = NewInspiration {
        owner_id: UserId::new("u1"),
        content: "idea".into(),
        description: String::new(),
        tags: vec![],
        category: "项目点子".into(),
        visibility: Visibility::Public,
        image_url: None,
    };
    let value = serde_json::to_value(&record).unwrap();
    assert_eq!(value["user_id"], "u1");
    assert_eq!(value["status"], "public");
    assert!(value["image_url"].is_null());
}

#[test]
fn parse_tags_trims_and_drops_blanks() {
    assert_eq!(parse_tags(" AI, ,tools ,"), vec!["AI".to_string(), "tools".to_string()]);
    assert!(parse_tags("").is_empty());
}

#[test]
fn profile_projects_to_author() {
    let profile = Profile {
        id: UserId::new("u1"),
        username: Some("ada".into()),
        full_name: None,
        avatar_url: Some("pixel:1-2-3".into()),
    };
    let author = profile.author();
    assert_eq!(author.username.as_deref(), Some("ada"));
    assert_eq!(author.avatar_url.as_deref(), Some("pixel:1-2-3"));
}

#[test]
fn default_categories_include_demo_labels() {
    assert!(DEFAULT_CATEGORIES.contains(&"技术学习"));
    assert!(DEFAULT_CATEGORIES.contains(&"项目点子"));
    assert_eq!(Visibility::default(), Visibility::Private);
}
