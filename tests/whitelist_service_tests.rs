use chrono::Duration;
use dvota::{
    clock::Clock,
    models::AllowedVoter,
    services::election_service::{ElectionError, NewElection},
    test_utils::test_helpers::{self, TestApp},
};

async fn user(app: &TestApp, fullname: &str, email: &str) -> i64 {
    test_helpers::insert_test_user(&app.pool, fullname, email, "password123", true)
        .await
        .unwrap()
}

async fn election(app: &TestApp, creator: i64) -> i64 {
    let start_time = app.clock.now() + Duration::hours(1);
    app.state
        .election_service
        .create_election(
            creator,
            NewElection {
                name: "Residents Association".to_string(),
                start_time,
                stop_time: start_time + Duration::hours(1),
            },
        )
        .await
        .unwrap()
        .id
}

fn emails(list: &[&str]) -> Vec<String> {
    list.iter().map(|e| e.to_string()).collect()
}

#[tokio::test]
async fn test_bulk_add_reports_each_email() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let creator = user(&app, "Ngozi Eze", "ngozi@example.com").await;
    let fresh = user(&app, "Fresh Voter", "fresh@example.com").await;
    let enrolled = user(&app, "Old Voter", "enrolled@example.com").await;
    let election_id = election(&app, creator).await;
    let service = &app.state.whitelist_service;

    service
        .add_allowed_voters(creator, election_id, &emails(&["enrolled@example.com"]))
        .await
        .unwrap();

    let report = service
        .add_allowed_voters(
            creator,
            election_id,
            &emails(&[
                "Fresh@Example.com",
                "enrolled@example.com",
                "unknown@example.com",
                "fresh@example.com",
            ]),
        )
        .await
        .unwrap();

    assert_eq!(report.added_count, 1);
    assert_eq!(report.added, emails(&["fresh@example.com"]));
    assert_eq!(report.already_enrolled, emails(&["enrolled@example.com"]));
    assert_eq!(report.not_registered, emails(&["unknown@example.com"]));

    assert!(AllowedVoter::exists(&app.pool, fresh, election_id).await.unwrap());
    assert!(AllowedVoter::exists(&app.pool, enrolled, election_id).await.unwrap());
}

#[tokio::test]
async fn test_whitelisting_is_allowed_after_start() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let creator = user(&app, "Ngozi Eze", "ngozi@example.com").await;
    let late = user(&app, "Late Voter", "late@example.com").await;
    let election_id = election(&app, creator).await;

    app.clock.advance(Duration::minutes(90));
    let report = app
        .state
        .whitelist_service
        .add_allowed_voters(creator, election_id, &emails(&["late@example.com"]))
        .await
        .unwrap();
    assert_eq!(report.added_count, 1);
    assert!(AllowedVoter::exists(&app.pool, late, election_id).await.unwrap());
}

#[tokio::test]
async fn test_only_creator_manages_whitelist() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let creator = user(&app, "Ngozi Eze", "ngozi@example.com").await;
    let intruder = user(&app, "Eve Ade", "eve@example.com").await;
    let election_id = election(&app, creator).await;
    let service = &app.state.whitelist_service;

    let result = service
        .add_allowed_voters(intruder, election_id, &emails(&["eve@example.com"]))
        .await;
    assert!(matches!(result, Err(ElectionError::NotCreator)));

    let result = service
        .remove_allowed_voter(intruder, election_id, "ngozi@example.com")
        .await;
    assert!(matches!(result, Err(ElectionError::NotCreator)));

    let result = service
        .add_allowed_voters(creator, election_id + 1, &emails(&["eve@example.com"]))
        .await;
    assert!(matches!(result, Err(ElectionError::ElectionNotFound)));
}

#[tokio::test]
async fn test_remove_allowed_voter() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let creator = user(&app, "Ngozi Eze", "ngozi@example.com").await;
    let voter = user(&app, "Some Voter", "voter@example.com").await;
    let election_id = election(&app, creator).await;
    let service = &app.state.whitelist_service;

    service
        .add_allowed_voters(creator, election_id, &emails(&["voter@example.com"]))
        .await
        .unwrap();

    service
        .remove_allowed_voter(creator, election_id, "VOTER@example.com")
        .await
        .unwrap();
    assert!(!AllowedVoter::exists(&app.pool, voter, election_id).await.unwrap());

    let again = service
        .remove_allowed_voter(creator, election_id, "voter@example.com")
        .await;
    assert!(matches!(again, Err(ElectionError::NotOnWhitelist)));

    let unknown = service
        .remove_allowed_voter(creator, election_id, "ghost@example.com")
        .await;
    assert!(matches!(unknown, Err(ElectionError::UserNotFound)));

    let creator_removal = service
        .remove_allowed_voter(creator, election_id, "ngozi@example.com")
        .await;
    assert!(matches!(creator_removal, Err(ElectionError::Validation(_))));
    assert!(AllowedVoter::exists(&app.pool, creator, election_id).await.unwrap());
}
