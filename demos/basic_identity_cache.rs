//! Walkthrough of identity caching with hold-based eviction.
//!
//! Run with: `cargo run --example basic_identity_cache`

use std::sync::Arc;

use identity_cache::prelude::*;

#[derive(Debug)]
struct User {
    id: i64,
    name: String,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut cache: IdentityCache<IdentityKey, User> = IdentityCacheBuilder::new()
        .config(ConfigPatch::from_pairs([
            ("trigger", "maxRetainedObjects"),
            ("maxRetainedObjects", "2"),
            ("purgePressure", "50"),
            ("purgeStrategy", "popularity"),
        ])?)
        .build()?;

    let ada = Arc::new(User {
        id: 1,
        name: "ada".into(),
    });
    cache.insert(ada.id.into(), &ada);

    // Same instance comes back for the same key
    if let Lookup::Found(user) = cache.get(&IdentityKey::from(1)) {
        println!("found {} (same instance: {})", user.name, Arc::ptr_eq(&user, &ada));
    }

    for id in 2..=4 {
        cache.insert(
            id.into(),
            &Arc::new(User {
                id,
                name: format!("user{id}"),
            }),
        );
    }
    println!(
        "after churn: {} held, live keys {:?}",
        cache.held_len(),
        cache.keys()
    );

    // An outside reference keeps ada reachable even if her hold was purged
    assert!(cache.contains(&IdentityKey::from(1)));
    drop(ada);

    cache.acquire(&IdentityKey::from(4));
    println!("pinned user4: {}", cache.is_acquired(&IdentityKey::from(4)));

    match cache.get(&IdentityKey::from(99)) {
        Lookup::Found(user) => println!("unexpected {:?}", user),
        Lookup::NotFound => println!("user 99 is not cached"),
    }

    cache.check_invariants()?;
    Ok(())
}
