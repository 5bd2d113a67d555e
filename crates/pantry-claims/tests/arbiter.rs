mod common;

use std::sync::Arc;
use std::sync::atomic::Ordering;
use std::time::Duration;

use common::{FailingSink, FlakyDonations, OWNER, ScriptedCodes, post, sqlite_ports};
use pantry_claims::{ArbiterConfig, ClaimArbiter, ClaimError, RetryPolicy, Unavailable};
use pantry_types::models::{DonationStatus, NotificationCategory};

fn arbiter(ports: pantry_claims::Ports) -> ClaimArbiter {
    ClaimArbiter::new(ports, ArbiterConfig::default())
}

#[tokio::test(start_paused = true)]
async fn lone_claimer_wins() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Sourdough");
    let arbiter = arbiter(ports);

    let receipt = arbiter.claim(&donation.id, "alice").await.unwrap();
    assert_eq!(receipt.collection_code.len(), 4);
    assert!(receipt.collection_code.chars().all(|c| c.is_ascii_digit()));

    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.status, DonationStatus::Claimed);
    assert_eq!(stored.claimed_by.as_deref(), Some("alice"));
    assert_eq!(stored.collection_code, Some(receipt.collection_code.clone()));
    assert!(stored.is_consistent());

    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());

    let claimer_inbox = db.list_notifications("alice").unwrap();
    assert_eq!(claimer_inbox.len(), 1);
    assert!(claimer_inbox[0].message.contains(&receipt.collection_code));
    let owner_categories: Vec<_> = db
        .list_notifications(OWNER)
        .unwrap()
        .into_iter()
        .map(|n| n.category)
        .collect();
    assert_eq!(owner_categories.len(), 2);
    assert!(owner_categories.contains(&NotificationCategory::DonationCreated));
    assert!(owner_categories.contains(&NotificationCategory::DonationClaimed));
}

#[tokio::test(start_paused = true)]
async fn simultaneous_claims_have_at_most_one_winner() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Bagels");
    let arbiter = arbiter(ports);

    let (a, b) = tokio::join!(
        arbiter.claim(&donation.id, "alice"),
        arbiter.claim(&donation.id, "bob"),
    );

    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    match (&a, &b) {
        (Ok(_), Ok(_)) => panic!("two winners"),
        (Ok(r), Err(_)) => {
            assert_eq!(stored.claimed_by.as_deref(), Some("alice"));
            assert_eq!(stored.collection_code.as_deref(), Some(r.collection_code.as_str()));
        }
        (Err(_), Ok(r)) => {
            assert_eq!(stored.claimed_by.as_deref(), Some("bob"));
            assert_eq!(stored.collection_code.as_deref(), Some(r.collection_code.as_str()));
        }
        (Err(_), Err(_)) => assert_eq!(stored.status, DonationStatus::Active),
    }
    assert!(stored.is_consistent());
    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn claims_200ms_apart_pick_exactly_one_winner() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Croissants");
    let arbiter = arbiter(ports);

    let (a, b) = tokio::join!(arbiter.claim(&donation.id, "alice"), async {
        tokio::time::sleep(Duration::from_millis(200)).await;
        arbiter.claim(&donation.id, "bob").await
    });

    let outcomes = [("alice", &a), ("bob", &b)];
    let winners: Vec<_> = outcomes.iter().filter(|(_, r)| r.is_ok()).collect();
    assert_eq!(winners.len(), 1, "alice: {:?}, bob: {:?}", a, b);

    let (winner, receipt) = winners[0];
    let receipt = receipt.as_ref().unwrap();
    assert_eq!(receipt.collection_code.len(), 4);

    let (_, loser) = outcomes.iter().find(|(_, r)| r.is_err()).unwrap();
    assert!(matches!(
        loser,
        Err(ClaimError::ConcurrentClaimDetected { .. }) | Err(ClaimError::InvalidStateTransition(_))
    ));

    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.status, DonationStatus::Claimed);
    assert_eq!(stored.claimed_by.as_deref(), Some(*winner));
    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn staggered_crowd_never_double_claims() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Rolls");
    let arbiter = Arc::new(arbiter(ports));

    let mut handles = Vec::new();
    for i in 0..12u64 {
        let arbiter = arbiter.clone();
        let id = donation.id.clone();
        handles.push(tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(i * 370 % 2_500)).await;
            let who = format!("user-{}", i);
            let result = arbiter.claim(&id, &who).await;
            (who, result)
        }));
    }

    let mut winners = Vec::new();
    for handle in handles {
        let (who, result) = handle.await.unwrap();
        if let Ok(receipt) = result {
            winners.push((who, receipt));
        }
    }

    assert!(winners.len() <= 1, "winners: {:?}", winners);
    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    match winners.first() {
        Some((who, receipt)) => {
            assert_eq!(stored.claimed_by.as_deref(), Some(who.as_str()));
            assert_eq!(stored.collection_code.as_deref(), Some(receipt.collection_code.as_str()));
        }
        None => assert_eq!(stored.status, DonationStatus::Active),
    }
    assert!(stored.is_consistent());
    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn late_claimer_is_told_someone_else_has_it() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Muffins");
    let arbiter = arbiter(ports);

    arbiter.claim(&donation.id, "alice").await.unwrap();
    let err = arbiter.claim(&donation.id, "bob").await.unwrap_err();
    assert!(matches!(
        err,
        ClaimError::InvalidStateTransition(Unavailable::ClaimedByOther)
    ));
    assert!(!err.is_retryable());

    let again = arbiter.claim(&donation.id, "alice").await.unwrap_err();
    assert!(matches!(
        again,
        ClaimError::InvalidStateTransition(Unavailable::AlreadyHeld)
    ));
    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn unclaim_then_reclaim_issues_a_new_code() {
    let (db, mut ports) = sqlite_ports();
    ports.codes = Arc::new(ScriptedCodes::new(&["0412", "7731"]));
    let donation = post(&ports, "Baguettes");
    let arbiter = arbiter(ports);

    let first = arbiter.claim(&donation.id, "alice").await.unwrap();
    arbiter.unclaim(&donation.id, "alice").unwrap();

    let released = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(released.status, DonationStatus::Active);
    assert!(released.is_consistent());

    let second = arbiter.claim(&donation.id, "bob").await.unwrap();
    assert_eq!(first.collection_code, "0412");
    assert_eq!(second.collection_code, "7731");

    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.claimed_by.as_deref(), Some("bob"));

    let cancelled: Vec<_> = db
        .list_notifications("alice")
        .unwrap()
        .into_iter()
        .filter(|n| n.category == NotificationCategory::ClaimCancelled)
        .collect();
    assert_eq!(cancelled.len(), 1);
}

#[tokio::test(start_paused = true)]
async fn only_the_holder_can_unclaim() {
    let (_db, ports) = sqlite_ports();
    let donation = post(&ports, "Pretzels");
    let arbiter = arbiter(ports);

    assert!(matches!(
        arbiter.unclaim(&donation.id, "alice"),
        Err(ClaimError::InvalidStateTransition(Unavailable::Status { .. }))
    ));

    arbiter.claim(&donation.id, "alice").await.unwrap();
    assert!(matches!(
        arbiter.unclaim(&donation.id, "bob"),
        Err(ClaimError::PermissionDenied(_))
    ));
    assert!(matches!(
        arbiter.unclaim("missing", "alice"),
        Err(ClaimError::NotFound(_))
    ));
}

#[tokio::test(start_paused = true)]
async fn notification_failure_does_not_undo_a_win() {
    let (db, mut ports) = sqlite_ports();
    let donation = post(&ports, "Scones");
    ports.sink = Arc::new(FailingSink);
    let arbiter = arbiter(ports);

    arbiter.claim(&donation.id, "alice").await.unwrap();
    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.claimed_by.as_deref(), Some("alice"));
}

#[tokio::test(start_paused = true)]
async fn storage_failure_on_commit_leaves_no_partial_state() {
    let (db, mut ports) = sqlite_ports();
    let donation = post(&ports, "Focaccia");
    let flaky = Arc::new(FlakyDonations::new(db.clone()));
    flaky.fail_transitions.store(true, Ordering::SeqCst);
    ports.donations = flaky.clone();
    let arbiter = arbiter(ports);

    let err = arbiter.claim(&donation.id, "alice").await.unwrap_err();
    assert!(matches!(err, ClaimError::StorageFailure(_)));
    assert!(err.is_retryable());

    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.status, DonationStatus::Active);
    assert!(stored.is_consistent());
    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
    assert!(db.list_notifications("alice").unwrap().is_empty());

    flaky.fail_transitions.store(false, Ordering::SeqCst);
    arbiter.claim(&donation.id, "alice").await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn abandoned_round_removes_its_intent() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Brioche");
    let arbiter = Arc::new(arbiter(ports));

    let task = {
        let arbiter = arbiter.clone();
        let id = donation.id.clone();
        tokio::spawn(async move { arbiter.claim(&id, "alice").await })
    };

    tokio::time::sleep(Duration::from_millis(300)).await;
    assert_eq!(db.list_intents_for(&donation.id).unwrap().len(), 1);

    task.abort();
    assert!(task.await.unwrap_err().is_cancelled());

    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.status, DonationStatus::Active);
}

#[tokio::test(start_paused = true)]
async fn retrying_contenders_settle_on_one_holder() {
    let (db, ports) = sqlite_ports();
    let donation = post(&ports, "Challah");
    let arbiter = arbiter(ports);
    let policy = RetryPolicy {
        max_attempts: 5,
        jitter: Duration::from_millis(400),
    };

    let (a, b) = tokio::join!(
        arbiter.claim_with_retry(&donation.id, "alice", &policy),
        arbiter.claim_with_retry(&donation.id, "bob", &policy),
    );

    let results = [&a, &b];
    assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "{:?} / {:?}", a, b);
    let loser = results.iter().find(|r| r.is_err()).unwrap();
    assert!(matches!(
        loser,
        Err(ClaimError::InvalidStateTransition(Unavailable::ClaimedByOther))
    ));

    let stored = db.get_donation(&donation.id).unwrap().unwrap();
    assert_eq!(stored.status, DonationStatus::Claimed);
    assert!(db.list_intents_for(&donation.id).unwrap().is_empty());
}

#[tokio::test(start_paused = true)]
async fn non_retryable_loss_is_returned_immediately() {
    let (_db, ports) = sqlite_ports();
    let arbiter = arbiter(ports);

    let started = tokio::time::Instant::now();
    let err = arbiter
        .claim_with_retry("missing", "alice", &RetryPolicy::default())
        .await
        .unwrap_err();
    assert!(matches!(
        err,
        ClaimError::InvalidStateTransition(Unavailable::Deleted)
    ));
    assert_eq!(started.elapsed(), Duration::from_secs(1));
}
