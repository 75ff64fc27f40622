use notifier_core::db::open_db_in_memory;
use notifier_core::{
    EntityRef, NewNotification, NotificationStore, NotificationType, NotificationValidationError,
    PageRequest, Priority, ReadState, SqliteNotificationStore, StoreError, PAGE_LIMIT_MAX,
};
use rusqlite::{params, Connection};

#[test]
fn insert_and_get_roundtrip() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let draft = NewNotification::new(
        1,
        NotificationType::TaskAssigned,
        "New task: Draft roadmap",
        "Ahmet assigned you \"Draft roadmap\" in Project X",
    )
    .with_priority(Priority::High)
    .with_related(EntityRef::task("task-42"));
    let id = store.insert(&draft).unwrap();

    let loaded = store.get(id).unwrap().unwrap();
    assert_eq!(loaded.id, id);
    assert_eq!(loaded.recipient, 1);
    assert_eq!(loaded.kind, NotificationType::TaskAssigned);
    assert_eq!(loaded.title, draft.title);
    assert_eq!(loaded.message, draft.message);
    assert_eq!(loaded.priority, Priority::High);
    assert_eq!(loaded.related, Some(EntityRef::task("task-42")));
    assert_eq!(loaded.read_state, ReadState::Unread);
    assert!(loaded.created_at > 0);
}

#[test]
fn custom_type_survives_storage() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let kind = NotificationType::Custom("sprint_closed".to_string());
    let id = store
        .insert(&NewNotification::new(1, kind.clone(), "Sprint closed", ""))
        .unwrap();

    assert_eq!(store.get(id).unwrap().unwrap().kind, kind);
}

#[test]
fn insert_for_unknown_recipient_is_storage_error() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let err = store
        .insert(&NewNotification::new(
            77,
            NotificationType::DebugTest,
            "t",
            "m",
        ))
        .unwrap_err();
    assert!(matches!(err, StoreError::UnknownRecipient(77)));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn insert_rejects_invalid_draft_before_storage() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    let err = store
        .insert(&NewNotification::new(
            1,
            NotificationType::DebugTest,
            "   ",
            "m",
        ))
        .unwrap_err();
    assert!(matches!(
        err,
        StoreError::Validation(NotificationValidationError::EmptyTitle)
    ));
    assert_eq!(row_count(&conn), 0);
}

#[test]
fn get_unknown_id_returns_none() {
    let conn = setup(&[]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    assert!(store.get(12345).unwrap().is_none());
}

#[test]
fn list_for_user_without_rows_is_empty() {
    let conn = setup(&[1, 2]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    insert_debug(&store, 1);

    assert!(store
        .user_notifications(2, &PageRequest::new(0, 10))
        .unwrap()
        .is_empty());
    assert!(store
        .user_notifications(404, &PageRequest::new(0, 10))
        .unwrap()
        .is_empty());
}

#[test]
fn list_orders_most_recent_first() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let older = insert_debug(&store, 1);
    let newer = insert_debug(&store, 1);

    set_created_at(&conn, older, 1_000);
    set_created_at(&conn, newer, 2_000);

    let listed = store
        .user_notifications(1, &PageRequest::new(0, 10))
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![newer, older]);
}

#[test]
fn equal_timestamps_are_ordered_by_id_descending() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let first = insert_debug(&store, 1);
    let second = insert_debug(&store, 1);
    let third = insert_debug(&store, 1);
    for id in [first, second, third] {
        set_created_at(&conn, id, 5_000);
    }

    let listed = store
        .user_notifications(1, &PageRequest::new(0, 10))
        .unwrap();
    let ids: Vec<_> = listed.iter().map(|n| n.id).collect();
    assert_eq!(ids, vec![third, second, first]);
}

#[test]
fn created_at_never_decreases_for_a_recipient() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let earlier = insert_debug(&store, 1);
    // Simulate a clock step backwards relative to the stored row.
    let future = 32_503_680_000_000_i64;
    set_created_at(&conn, earlier, future);

    let later = insert_debug(&store, 1);
    let later_row = store.get(later).unwrap().unwrap();
    assert!(later_row.created_at >= future);

    let listed = store
        .user_notifications(1, &PageRequest::new(0, 10))
        .unwrap();
    assert_eq!(listed[0].id, later);
    assert_eq!(listed[1].id, earlier);
}

#[test]
fn consecutive_pages_are_disjoint_and_complete() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    for _ in 0..4 {
        insert_debug(&store, 1);
    }

    let first_page = store
        .user_notifications(1, &PageRequest::new(0, 2))
        .unwrap();
    let second_page = store
        .user_notifications(1, &PageRequest::new(2, 2))
        .unwrap();
    let everything = store
        .user_notifications(1, &PageRequest::new(0, 4))
        .unwrap();

    assert_eq!(first_page.len(), 2);
    assert_eq!(second_page.len(), 2);
    let stitched: Vec<_> = first_page
        .iter()
        .chain(second_page.iter())
        .map(|n| n.id)
        .collect();
    let expected: Vec<_> = everything.iter().map(|n| n.id).collect();
    assert_eq!(stitched, expected);
}

#[test]
fn page_limit_is_clamped() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    for _ in 0..(PAGE_LIMIT_MAX + 5) {
        insert_debug(&store, 1);
    }

    let listed = store
        .user_notifications(1, &PageRequest::new(0, 10_000))
        .unwrap();
    assert_eq!(listed.len(), PAGE_LIMIT_MAX as usize);
}

#[test]
fn unread_count_is_scoped_to_user_and_unread_rows() {
    let conn = setup(&[1, 2]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let read_one = insert_debug(&store, 1);
    insert_debug(&store, 1);
    insert_debug(&store, 2);
    store.mark_read(read_one).unwrap();

    assert_eq!(store.unread_count(1).unwrap(), 1);
    assert_eq!(store.unread_count(2).unwrap(), 1);
    assert_eq!(store.unread_count(3).unwrap(), 0);
}

#[test]
fn unread_count_is_served_by_recipient_read_index() {
    let conn = setup(&[1]);

    let mut stmt = conn
        .prepare(
            "EXPLAIN QUERY PLAN
             SELECT COUNT(*)
             FROM notifications
             WHERE recipient_user_id = ?1
               AND is_read = 0;",
        )
        .unwrap();
    let details: Vec<String> = stmt
        .query_map([1_i64], |row| row.get::<_, String>(3))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();

    assert!(
        details
            .iter()
            .any(|detail| detail.contains("idx_notifications_recipient_read")),
        "unexpected plan: {details:?}"
    );
    assert!(!details.iter().any(|detail| detail.starts_with("SCAN")));
}

#[test]
fn mark_read_is_idempotent_and_sets_timestamp_once() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let id = insert_debug(&store, 1);

    assert!(store.mark_read(id).unwrap());
    let after_first = store.get(id).unwrap().unwrap();
    let first_read_at = after_first.read_at().unwrap();

    assert!(!store.mark_read(id).unwrap());
    let after_second = store.get(id).unwrap().unwrap();
    assert_eq!(after_second, after_first);
    assert_eq!(after_second.read_state, ReadState::Read { at: first_read_at });
}

#[test]
fn mark_read_unknown_id_is_noop() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    insert_debug(&store, 1);

    assert!(!store.mark_read(9_999).unwrap());
    assert_eq!(store.unread_count(1).unwrap(), 1);
}

#[test]
fn mark_all_read_clears_badge_for_zero_one_and_many() {
    let conn = setup(&[1, 2, 3]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();

    assert_eq!(store.mark_all_read(1).unwrap(), 0);
    assert_eq!(store.unread_count(1).unwrap(), 0);

    insert_debug(&store, 2);
    assert_eq!(store.mark_all_read(2).unwrap(), 1);
    assert_eq!(store.unread_count(2).unwrap(), 0);

    for _ in 0..7 {
        insert_debug(&store, 3);
    }
    let already_read = insert_debug(&store, 3);
    store.mark_read(already_read).unwrap();
    assert_eq!(store.mark_all_read(3).unwrap(), 7);
    assert_eq!(store.unread_count(3).unwrap(), 0);
    assert_eq!(store.mark_all_read(3).unwrap(), 0);
}

#[test]
fn mark_all_read_leaves_other_users_untouched() {
    let conn = setup(&[1, 2]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    insert_debug(&store, 1);
    insert_debug(&store, 2);

    store.mark_all_read(1).unwrap();
    assert_eq!(store.unread_count(1).unwrap(), 0);
    assert_eq!(store.unread_count(2).unwrap(), 1);
}

#[test]
fn mark_all_read_does_not_move_existing_read_timestamps() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let id = insert_debug(&store, 1);
    store.mark_read(id).unwrap();
    conn.execute(
        "UPDATE notifications SET read_at = 1234 WHERE id = ?1;",
        [id],
    )
    .unwrap();

    store.mark_all_read(1).unwrap();
    assert_eq!(
        store.get(id).unwrap().unwrap().read_state,
        ReadState::Read { at: 1234 }
    );
}

#[test]
fn undecodable_row_is_reported_as_invalid_data() {
    let conn = setup(&[1]);
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let id = insert_debug(&store, 1);
    conn.execute(
        "UPDATE notifications SET type = 'bogus' WHERE id = ?1;",
        [id],
    )
    .unwrap();

    let err = store.get(id).unwrap_err();
    assert!(matches!(err, StoreError::InvalidData(_)));
}

#[test]
fn try_new_rejects_connection_without_schema() {
    let conn = Connection::open_in_memory().unwrap();
    let err = SqliteNotificationStore::try_new(&conn).err().unwrap();
    assert!(matches!(err, StoreError::MissingRequiredTable("notifications")));
}

fn setup(users: &[i64]) -> Connection {
    let conn = open_db_in_memory().unwrap();
    for user in users {
        conn.execute(
            "INSERT INTO users (id, display_name) VALUES (?1, ?2);",
            params![user, format!("user-{user}")],
        )
        .unwrap();
    }
    conn
}

fn insert_debug(store: &SqliteNotificationStore<'_>, user: i64) -> i64 {
    store
        .insert(&NewNotification::new(
            user,
            NotificationType::DebugTest,
            "Test notification",
            "body",
        ))
        .unwrap()
}

fn set_created_at(conn: &Connection, id: i64, created_at: i64) {
    conn.execute(
        "UPDATE notifications SET created_at = ?2 WHERE id = ?1;",
        params![id, created_at],
    )
    .unwrap();
}

fn row_count(conn: &Connection) -> i64 {
    conn.query_row("SELECT COUNT(*) FROM notifications;", [], |row| row.get(0))
        .unwrap()
}
