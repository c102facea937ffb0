/// Concurrent access tests
///
/// Several threads sharing one store, and several stores sharing one
/// backing file.
/// Run with: cargo test --test concurrent_access_tests

use dynstore::{Store, Value, attrs};
use std::sync::{Arc, Barrier};
use std::thread;
use tempfile::TempDir;

#[test]
fn test_concurrent_creates_share_one_store() {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_path(temp_dir.path().join("objects.db")).unwrap();
    let num_threads = 8;
    let creates_per_thread = 10;
    let barrier = Arc::new(Barrier::new(num_threads));

    let handles: Vec<_> = (0..num_threads)
        .map(|thread_id| {
            let store = store.clone();
            let barrier = Arc::clone(&barrier);
            thread::spawn(move || {
                let items = store.class("Item").unwrap();
                barrier.wait();
                for i in 0..creates_per_thread {
                    let item = items
                        .create(attrs! { thread: thread_id as i64, seq: i as i64 })
                        .unwrap();
                    assert_eq!(item.get("thread"), Some(Value::Integer(thread_id as i64)));
                }
            })
        })
        .collect();

    for handle in handles {
        handle.join().unwrap();
    }

    let items = store.class("Item").unwrap();
    assert_eq!(
        items.search(attrs! {}).unwrap().count().unwrap(),
        num_threads * creates_per_thread
    );
    assert_eq!(
        items.search(attrs! { thread: 3 }).unwrap().count().unwrap(),
        creates_per_thread
    );
}

#[test]
fn test_concurrent_retrieve_yields_one_object() {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_path(temp_dir.path().join("objects.db")).unwrap();
    let item = store.class("Item").unwrap().create(attrs! { hits: 0 }).unwrap();
    let id = item.id().to_string();

    let handles: Vec<_> = (0..6)
        .map(|_| {
            let store = store.clone();
            let id = id.clone();
            thread::spawn(move || store.class("Item").unwrap().retrieve(&id).unwrap())
        })
        .collect();

    for handle in handles {
        let retrieved = handle.join().unwrap();
        assert!(retrieved.ptr_eq(&item));
    }
}

#[test]
fn test_concurrent_writers_on_one_instance() {
    let temp_dir = TempDir::new().unwrap();
    let store = Store::open_path(temp_dir.path().join("objects.db")).unwrap();
    let item = store.class("Item").unwrap().create(attrs! {}).unwrap();

    let handles: Vec<_> = (0..4)
        .map(|n| {
            let item = item.clone();
            thread::spawn(move || {
                // each thread provisions its own column
                item.set(&format!("field_{}", n), n as i64).unwrap();
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    item.refresh().unwrap();
    for n in 0..4 {
        assert_eq!(
            item.get(&format!("field_{}", n)),
            Some(Value::Integer(n)),
            "field_{} lost",
            n
        );
    }
}

#[test]
fn test_two_stores_race_on_same_column() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("objects.db");
    let first = Store::open_path(&path).unwrap();
    let second = Store::open_path(&path).unwrap();

    let a = first.class("Item").unwrap().create(attrs! {}).unwrap();
    let b = second.class("Item").unwrap().create(attrs! {}).unwrap();

    // `b` was loaded before `color` existed; its snapshot is stale
    a.set("color", "red").unwrap();
    b.set("color", "blue").unwrap();

    assert_eq!(a.get("color"), Some(Value::from("red")));
    assert_eq!(b.get("color"), Some(Value::from("blue")));
    assert_eq!(first.class("Item").unwrap().columns().unwrap(), vec!["color"]);
}

#[test]
fn test_second_store_sees_first_store_classes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("objects.db");
    let first = Store::open_path(&path).unwrap();
    let second = Store::open_path(&path).unwrap();

    first.register("Invoice").unwrap();

    let names: Vec<String> = second
        .list_classes()
        .unwrap()
        .into_iter()
        .map(|c| c.name().to_string())
        .collect();
    assert_eq!(names, vec!["Invoice"]);
}
