// ==============================================
// MISS DIAGNOSTICS (integration)
// ==============================================
//
// Only `get` reports an undefined key. Membership checks and iteration prune
// dead entries without logging.

use std::io;
use std::sync::Arc;

use identity_cache::prelude::*;
use parking_lot::Mutex;
use tracing_subscriber::fmt::MakeWriter;

const UNDEFINED_KEY: &str = "undefined identity key";

#[derive(Clone, Default)]
struct Captured(Arc<Mutex<Vec<u8>>>);

impl io::Write for Captured {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for Captured {
    type Writer = Captured;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}

/// Runs `f` under a thread-local subscriber and returns the miss warnings.
fn miss_warnings<F: FnOnce()>(f: F) -> Vec<String> {
    let sink = Captured::default();
    let subscriber = tracing_subscriber::fmt()
        .with_writer(sink.clone())
        .with_max_level(tracing::Level::WARN)
        .with_ansi(false)
        .without_time()
        .finish();
    tracing::subscriber::with_default(subscriber, f);

    let output = String::from_utf8(sink.0.lock().clone()).unwrap();
    output
        .lines()
        .filter(|line| line.contains(UNDEFINED_KEY))
        .map(str::to_owned)
        .collect()
}

/// Cache that drops every hold right after the write.
fn holdless_cache() -> IdentityCache<u32, String> {
    IdentityCacheBuilder::new()
        .config(
            ConfigPatch::new()
                .max_retained_objects(0)
                .purge_pressure_percent(100.0)
                .purge_strategy(PurgeStrategy::Random),
        )
        .memory_probe(Arc::new(FixedMemory::new(0)))
        .build()
        .unwrap()
}

/// Inserts `key` with a value that is reclaimed before returning.
fn insert_reclaimed(cache: &mut IdentityCache<u32, String>, key: u32) {
    cache.insert(key, &Arc::new(format!("value {key}")));
    assert!(!cache.is_held(&key));
}

// ==============================================
// get
// ==============================================

mod get {
    use super::*;

    #[test]
    fn missing_key_warns_once() {
        let mut cache = holdless_cache();
        let warnings = miss_warnings(|| {
            assert!(cache.get(&404).is_not_found());
        });
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert!(warnings[0].contains("404"));
    }

    #[test]
    fn reclaimed_key_warns_once() {
        let mut cache = holdless_cache();
        insert_reclaimed(&mut cache, 7);
        assert_eq!(cache.len(), 1);

        let warnings = miss_warnings(|| {
            assert!(cache.get(&7).is_not_found());
        });
        assert_eq!(warnings.len(), 1, "{warnings:?}");
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn hit_is_silent() {
        let mut cache = holdless_cache();
        cache.insert_owned(1, String::from("owned"));
        let warnings = miss_warnings(|| {
            assert!(cache.get(&1).is_found());
        });
        assert!(warnings.is_empty(), "{warnings:?}");
    }
}

// ==============================================
// Silent Pruning
// ==============================================

mod silent {
    use super::*;

    #[test]
    fn contains_prunes_without_warning() {
        let mut cache = holdless_cache();
        insert_reclaimed(&mut cache, 1);
        let warnings = miss_warnings(|| {
            assert!(!cache.contains(&1));
            assert!(!cache.contains(&2));
        });
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(cache.len(), 0);
    }

    #[test]
    fn iter_prunes_without_warning() {
        let mut cache = holdless_cache();
        insert_reclaimed(&mut cache, 1);
        cache.insert_owned(2, String::from("owned"));
        insert_reclaimed(&mut cache, 3);
        let warnings = miss_warnings(|| {
            let keys: Vec<u32> = cache.iter().map(|(key, _)| key).collect();
            assert_eq!(keys, vec![2]);
        });
        assert!(warnings.is_empty(), "{warnings:?}");
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn keys_prunes_without_warning() {
        let mut cache = holdless_cache();
        insert_reclaimed(&mut cache, 1);
        insert_reclaimed(&mut cache, 2);
        let warnings = miss_warnings(|| {
            assert!(cache.keys().is_empty());
        });
        assert!(warnings.is_empty(), "{warnings:?}");
        assert!(cache.is_empty());
    }

    #[test]
    fn cursor_walk_prunes_without_warning() {
        let mut cache = holdless_cache();
        insert_reclaimed(&mut cache, 1);
        cache.insert_owned(2, String::from("owned"));
        let warnings = miss_warnings(|| {
            cache.rewind();
            assert_eq!(cache.key(), Some(&2));
            cache.advance();
            assert!(!cache.valid());
        });
        assert!(warnings.is_empty(), "{warnings:?}");
    }
}
