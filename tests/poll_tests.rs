//! Poll loop behavior against an in-memory store and a scripted platform.

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{
    BrokenScanStore, ScriptedPlatform, config, context, context_with_store, execute, is_new,
    listing, store_with,
};
use listing_bot::{
    pipeline::{PollState, Poller},
    storage::ListingStore,
};

#[tokio::test]
async fn test_only_matching_search_urls_are_posted() {
    let store = store_with(&[listing(1, 5), listing(2, 7), listing(3, 6)]).await;
    let platform = Arc::new(ScriptedPlatform::new());
    let poller = Poller::new(context(
        config(&[("bikes", &[5, 6], "1001")], 3),
        &store,
        &platform,
    ));

    let report = poller.run_cycle().await;

    assert_eq!(report.streams[0].fetched, 2);
    assert_eq!(platform.delivered_titles(), vec!["Listing 1", "Listing 3"]);
    assert!(!is_new(&store, 1).await);
    assert!(is_new(&store, 2).await);
    assert!(!is_new(&store, 3).await);
}

#[tokio::test]
async fn test_failed_delivery_leaves_rest_of_batch_new() {
    let store = store_with(&[listing(1, 5), listing(2, 5), listing(3, 5)]).await;
    let platform = Arc::new(ScriptedPlatform::new().failing_on(2));
    let poller = Poller::new(context(
        config(&[("bikes", &[5], "1001")], 3),
        &store,
        &platform,
    ));

    let report = poller.run_cycle().await;
    let outcome = &report.streams[0];

    assert_eq!(outcome.delivered, 1);
    assert_eq!(outcome.committed, 1);
    assert!(outcome.error.as_deref().unwrap().contains("503"));
    assert!(!is_new(&store, 1).await);
    assert!(is_new(&store, 2).await);
    assert!(is_new(&store, 3).await);

    // Next cycle picks up where the last one stopped.
    poller.run_cycle().await;
    assert_eq!(
        platform.delivered_titles(),
        vec!["Listing 1", "Listing 2", "Listing 3"]
    );
    assert_eq!(store.count_unseen(&[5]).await.unwrap(), 0);
}

#[tokio::test]
async fn test_second_cycle_posts_nothing() {
    let store = store_with(&[listing(1, 5), listing(2, 6)]).await;
    let platform = Arc::new(ScriptedPlatform::new());
    let poller = Poller::new(context(
        config(&[("bikes", &[5, 6], "1001")], 3),
        &store,
        &platform,
    ));

    assert_eq!(poller.run_cycle().await.committed(), 2);
    assert_eq!(poller.run_cycle().await.committed(), 0);
    assert_eq!(platform.delivered().len(), 2);
}

#[tokio::test]
async fn test_posting_limit_drains_one_per_cycle() {
    let records: Vec<_> = (1..=5).map(|id| listing(id, 5)).collect();
    let store = store_with(&records).await;
    let platform = Arc::new(ScriptedPlatform::new());
    let poller = Poller::new(context(
        config(&[("bikes", &[5], "1001")], 1),
        &store,
        &platform,
    ));

    for remaining in (0..5).rev() {
        let report = poller.run_cycle().await;
        assert_eq!(report.streams[0].fetched, 1);
        assert_eq!(store.count_unseen(&[5]).await.unwrap(), remaining);
    }

    assert_eq!(poller.run_cycle().await.streams[0].fetched, 0);
    assert_eq!(platform.delivered().len(), 5);
}

#[tokio::test]
async fn test_descriptions_follow_discovery_history() {
    let mut repost = listing(2, 5);
    repost.short_description = "Couch".into();
    repost.discovered = 2;
    repost.changes = Some(r#"[{"Property":"price","Finding":"dropped to $50"}]"#.into());

    let mut garbled = listing(3, 5);
    garbled.discovered = 1;
    garbled.changes = Some("{not json".into());

    let store = store_with(&[listing(1, 5), repost, garbled]).await;
    let platform = Arc::new(ScriptedPlatform::new());
    let poller = Poller::new(context(
        config(&[("bikes", &[5], "1001")], 3),
        &store,
        &platform,
    ));

    poller.run_cycle().await;
    let delivered = platform.delivered();
    assert_eq!(delivered.len(), 3);

    assert_eq!(delivered[0].1.description, "Bike for sale");

    let couch = &delivered[1].1.description;
    assert!(couch.starts_with("Couch"));
    assert!(couch.contains("found 2 time(s) before"));
    assert!(couch.contains("price: dropped to $50"));

    // Unreadable change logs still post, without the diff.
    let plain = &delivered[2].1.description;
    assert!(plain.contains("found 1 time(s) before"));
    assert!(!plain.contains("differences"));
    assert!(!is_new(&store, 3).await);
}

#[tokio::test]
async fn test_unresolved_channel_skips_only_that_stream() {
    let store = store_with(&[listing(1, 5), listing(2, 6)]).await;
    let platform = Arc::new(ScriptedPlatform::new().without_channel("404"));
    let ctx = context(
        config(&[("gone", &[5], "404"), ("bikes", &[6], "1001")], 3),
        &store,
        &platform,
    );
    let poller = Poller::new(ctx.clone());

    let report = poller.run_cycle().await;

    assert_eq!(report.failures(), 1);
    assert!(is_new(&store, 1).await);
    assert!(!is_new(&store, 2).await);

    let gone = ctx.status.stream("gone").unwrap();
    assert!(gone.last_searched.is_none());
    assert!(gone.last_error.unwrap().contains("404"));

    let bikes = ctx.status.stream("bikes").unwrap();
    assert!(bikes.last_searched.is_some());
    assert_eq!(bikes.delivered_total, 1);
}

#[tokio::test]
async fn test_delivery_timeout_keeps_listing_new() {
    let store = store_with(&[listing(1, 5)]).await;
    let platform = Arc::new(ScriptedPlatform::new().hanging());
    let poller = Poller::new(context(
        config(&[("bikes", &[5], "1001")], 3),
        &store,
        &platform,
    ));

    let report = poller.run_cycle().await;

    assert_eq!(report.streams[0].delivered, 0);
    assert!(report.streams[0].error.as_deref().unwrap().contains("timed out"));
    assert!(is_new(&store, 1).await);
}

#[tokio::test]
async fn test_run_stops_on_shutdown() {
    let store = store_with(&[listing(1, 5)]).await;
    let platform = Arc::new(ScriptedPlatform::new());
    let ctx = context(config(&[("bikes", &[5], "1001")], 3), &store, &platform);

    let poller = Poller::new(ctx.clone());
    let handle = tokio::spawn(async move { poller.run().await });

    while ctx.status.cycles() == 0 {
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert_eq!(platform.presences().len(), 1);

    ctx.shutdown.cancel();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap()
        .unwrap();

    assert_eq!(ctx.status.state(), PollState::Stopped);
    assert_eq!(platform.delivered().len(), 1);
}

#[tokio::test]
async fn test_commit_failure_keeps_whole_batch_new() {
    let store = store_with(&[listing(1, 5), listing(2, 5), listing(3, 6)]).await;
    execute(
        &store,
        "CREATE TRIGGER refuse_flip BEFORE UPDATE OF new ON listings
         WHEN OLD.id = 2
         BEGIN SELECT RAISE(ABORT, 'disk full'); END;",
    )
    .await;
    let platform = Arc::new(ScriptedPlatform::new());
    let poller = Poller::new(context(
        config(&[("a", &[5], "1001"), ("b", &[6], "1002")], 3),
        &store,
        &platform,
    ));

    let report = poller.run_cycle().await;

    let a = &report.streams[0];
    assert_eq!(a.delivered, 2);
    assert_eq!(a.committed, 0);
    assert!(a.error.as_deref().unwrap().contains("disk full"));
    assert!(is_new(&store, 1).await);
    assert!(is_new(&store, 2).await);

    let b = &report.streams[1];
    assert_eq!(b.committed, 1);
    assert!(b.is_clean());
    assert!(!is_new(&store, 3).await);
}

#[tokio::test]
async fn test_failed_scan_moves_on_to_next_stream() {
    let store = store_with(&[listing(1, 5), listing(2, 6)]).await;
    let platform = Arc::new(ScriptedPlatform::new());
    let broken = BrokenScanStore {
        inner: store.clone(),
        broken: vec![5],
    };
    let ctx = context_with_store(
        config(&[("a", &[5], "1001"), ("b", &[6], "1002")], 3),
        Arc::new(broken),
        &platform,
    );

    let report = Poller::new(ctx.clone()).run_cycle().await;

    assert_eq!(report.streams[0].fetched, 0);
    assert!(report.streams[0].error.is_some());
    assert_eq!(report.streams[1].committed, 1);
    assert_eq!(platform.delivered_titles(), vec!["Listing 2"]);
    assert!(is_new(&store, 1).await);
    assert!(ctx.status.stream("a").unwrap().last_error.is_some());
}

#[tokio::test]
async fn test_unreadable_dates_do_not_block_stream() {
    let store = store_with(&[listing(2, 5)]).await;
    execute(
        &store,
        "INSERT INTO listings (id, title, searchurlid, new, posted)
         VALUES (1, 'Listing 1', 5, 1, '2018-05-01'),
                (3, 'Listing 3', 5, 1, 'yesterday-ish');",
    )
    .await;
    let platform = Arc::new(ScriptedPlatform::new());
    let poller = Poller::new(context(
        config(&[("bikes", &[5], "1001")], 3),
        &store,
        &platform,
    ));

    let report = poller.run_cycle().await;

    assert!(report.streams[0].is_clean());
    assert_eq!(report.streams[0].committed, 3);
    let delivered = platform.delivered();
    assert_eq!(delivered[0].1.footer, "Listed: 2018-05-01 00:00:00");
    assert_eq!(delivered[2].1.footer, "Listed: unknown");
}
