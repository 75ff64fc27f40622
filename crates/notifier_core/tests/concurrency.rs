use notifier_core::db::open_db;
use notifier_core::{
    NewNotification, NotificationService, NotificationStore, NotificationType, PageRequest,
    SqliteNotificationStore,
};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Barrier};
use std::thread;

const USERS: [i64; 4] = [1, 2, 3, 4];

#[test]
fn concurrent_inserts_for_different_recipients_are_all_kept() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_db(dir.path());
    let barrier = Arc::new(Barrier::new(USERS.len()));

    let handles: Vec<_> = USERS
        .iter()
        .map(|&user| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let service =
                    NotificationService::new(SqliteNotificationStore::try_new(&conn).unwrap());
                barrier.wait();
                for _ in 0..25 {
                    service.debug_test(user).unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    let conn = open_db(&path).unwrap();
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    for user in USERS {
        assert_eq!(store.unread_count(user).unwrap(), 25);
    }
}

#[test]
fn racing_mark_all_read_calls_converge() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_db(dir.path());
    {
        let conn = open_db(&path).unwrap();
        let store = SqliteNotificationStore::try_new(&conn).unwrap();
        for _ in 0..50 {
            insert_debug(&store, 1);
        }
    }

    let barrier = Arc::new(Barrier::new(2));
    let handles: Vec<_> = (0..2)
        .map(|_| {
            let path = path.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let conn = open_db(&path).unwrap();
                let store = SqliteNotificationStore::try_new(&conn).unwrap();
                barrier.wait();
                store.mark_all_read(1).unwrap()
            })
        })
        .collect();
    let transitioned: usize = handles
        .into_iter()
        .map(|handle| handle.join().unwrap())
        .sum();

    assert_eq!(transitioned, 50);
    let conn = open_db(&path).unwrap();
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    assert_eq!(store.unread_count(1).unwrap(), 0);
}

#[test]
fn insert_racing_mark_all_read_never_loses_a_transition() {
    let dir = tempfile::tempdir().unwrap();
    let path = seeded_db(dir.path());
    let barrier = Arc::new(Barrier::new(2));

    let writer = {
        let path = path.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let conn = open_db(&path).unwrap();
            let store = SqliteNotificationStore::try_new(&conn).unwrap();
            barrier.wait();
            for _ in 0..40 {
                insert_debug(&store, 1);
            }
        })
    };
    let marker = {
        let path = path.clone();
        let barrier = Arc::clone(&barrier);
        thread::spawn(move || {
            let conn = open_db(&path).unwrap();
            let store = SqliteNotificationStore::try_new(&conn).unwrap();
            barrier.wait();
            (0..10)
                .map(|_| store.mark_all_read(1).unwrap())
                .sum::<usize>()
        })
    };
    writer.join().unwrap();
    let marked = marker.join().unwrap();

    let conn = open_db(&path).unwrap();
    let store = SqliteNotificationStore::try_new(&conn).unwrap();
    let rows = store
        .user_notifications(1, &PageRequest::new(0, 100))
        .unwrap();
    assert_eq!(rows.len(), 40);
    let read_rows = rows.iter().filter(|n| n.is_read()).count();
    assert_eq!(read_rows, marked);
    assert_eq!(store.unread_count(1).unwrap() as usize, 40 - marked);

    store.mark_all_read(1).unwrap();
    assert_eq!(store.unread_count(1).unwrap(), 0);
}

fn seeded_db(dir: &Path) -> PathBuf {
    let path = dir.join("concurrency.db");
    let conn = open_db(&path).unwrap();
    for user in USERS {
        conn.execute(
            "INSERT INTO users (id, display_name) VALUES (?1, 'user');",
            [user],
        )
        .unwrap();
    }
    path
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
