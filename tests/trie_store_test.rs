//! Concurrency tests for the thread-safe trie store

use std::sync::Arc;
use std::thread;

use bedrock::trie::TrieStore;

#[test]
fn test_store_basic_operations() {
    let store = TrieStore::new();

    store.put(b"k1", 1u32);
    store.put(b"k2", "two".to_string());

    assert_eq!(*store.get::<u32>(b"k1").unwrap(), 1);
    assert_eq!(*store.get::<String>(b"k2").unwrap(), "two");
    assert!(store.get::<u64>(b"k1").is_none());
    assert!(store.get::<u32>(b"missing").is_none());

    store.remove(b"k1");
    assert!(store.get::<u32>(b"k1").is_none());
    assert_eq!(*store.get::<String>(b"k2").unwrap(), "two");
}

#[test]
fn test_store_guard_pins_snapshot() {
    let store = TrieStore::new();
    store.put(b"stable", 7u32);

    let guard = store.get::<u32>(b"stable").unwrap();

    // Overwrite and delete the key behind the guard's back.
    store.put(b"stable", 99u32);
    store.remove(b"stable");

    assert_eq!(*guard, 7);
    assert!(store.get::<u32>(b"stable").is_none());
}

#[test]
fn test_store_parallel_readers_and_writers_disjoint_ranges() {
    let store = Arc::new(TrieStore::new());

    // Seed a stable range readers will hold guards over.
    for i in 0..50u32 {
        store.put(format!("stable-{i}").as_bytes(), i);
    }

    let mut handles = Vec::new();

    // Writers churn their own key ranges.
    for w in 0..4u32 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for round in 0..100u32 {
                for i in 0..10u32 {
                    let key = format!("writer-{w}-{i}");
                    store.put(key.as_bytes(), round);
                }
                for i in (0..10u32).step_by(2) {
                    let key = format!("writer-{w}-{i}");
                    store.remove(key.as_bytes());
                }
            }
        }));
    }

    // Readers take guards over the stable range and hold them across the
    // writers' churn; each guard must stay valid and consistent.
    for _ in 0..4 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for _ in 0..200 {
                let mut guards = Vec::new();
                for i in 0..50u32 {
                    let guard = store.get::<u32>(format!("stable-{i}").as_bytes()).unwrap();
                    guards.push((i, guard));
                }
                for (i, guard) in &guards {
                    assert_eq!(**guard, *i);
                }
            }
        }));
    }

    for handle in handles {
        handle.join().unwrap();
    }

    // The stable range survived untouched.
    for i in 0..50u32 {
        assert_eq!(*store.get::<u32>(format!("stable-{i}").as_bytes()).unwrap(), i);
    }
}

#[test]
fn test_store_serialized_writers_on_one_key() {
    let store = Arc::new(TrieStore::new());
    store.put(b"counter", 0u64);

    // Writers race on the same key; each write is a full put of its own
    // value, so the final state is whichever write published last, and
    // every intermediate read sees some complete value.
    let mut handles = Vec::new();
    for t in 0..4u64 {
        let store = Arc::clone(&store);
        handles.push(thread::spawn(move || {
            for i in 0..250u64 {
                store.put(b"counter", t * 1000 + i);
            }
        }));
    }

    let reader = {
        let store = Arc::clone(&store);
        thread::spawn(move || {
            for _ in 0..1000 {
                let guard = store.get::<u64>(b"counter").unwrap();
                let v = *guard;
                assert!(v == 0 || (v % 1000) < 250);
            }
        })
    };

    for handle in handles {
        handle.join().unwrap();
    }
    reader.join().unwrap();

    let last = *store.get::<u64>(b"counter").unwrap();
    assert_eq!(last % 1000, 249);
}
