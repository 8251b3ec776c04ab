use chrono::Duration;
use dvota::{
    clock::Clock,
    models::{Candidate, ElectionStatus, Vote},
    services::{
        election_service::{ElectionError, NewCandidate, NewElection},
        voting_service::{CastVoteRequest, VoteStatus},
    },
    test_utils::test_helpers::{self, TestApp},
};

async fn user(app: &TestApp, fullname: &str, email: &str) -> i64 {
    test_helpers::insert_test_user(&app.pool, fullname, email, "password123", true)
        .await
        .unwrap()
}

/// An election starting in one hour and lasting one hour, with a single
/// "President" position and one candidate.
struct Fixture {
    creator: i64,
    election_id: i64,
    position_id: i64,
    candidate_id: i64,
}

async fn fixture(app: &TestApp) -> Fixture {
    let creator = user(app, "Ngozi Eze", "ngozi@example.com").await;
    user(app, "Amaka Obi", "amaka@example.com").await;

    let service = &app.state.election_service;
    let start_time = app.clock.now() + Duration::hours(1);
    let election = service
        .create_election(
            creator,
            NewElection {
                name: "Student Union".to_string(),
                start_time,
                stop_time: start_time + Duration::hours(1),
            },
        )
        .await
        .unwrap();
    let position = service
        .add_position(creator, election.id, "President")
        .await
        .unwrap();
    let candidate = service
        .add_candidate(
            creator,
            NewCandidate {
                election_id: election.id,
                position_id: position.id,
                email: "amaka@example.com".to_string(),
                fullname: None,
                nickname: None,
            },
        )
        .await
        .unwrap();

    Fixture {
        creator,
        election_id: election.id,
        position_id: position.id,
        candidate_id: candidate.id,
    }
}

fn ballot(f: &Fixture) -> CastVoteRequest {
    CastVoteRequest {
        election_id: f.election_id,
        position_id: f.position_id,
        candidate_id: f.candidate_id,
    }
}

async fn vote_count(app: &TestApp, f: &Fixture) -> i64 {
    Candidate::find_in_election(&app.pool, f.election_id, f.candidate_id)
        .await
        .unwrap()
        .unwrap()
        .vote_count
}

#[tokio::test]
async fn test_voting_window_scenario() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    let voting = &app.state.voting_service;

    let result = voting.cast_vote(f.creator, ballot(&f)).await;
    assert!(matches!(result, Err(ElectionError::ElectionNotStarted)));
    assert_eq!(Vote::count_for_position(&app.pool, f.position_id).await.unwrap(), 0);

    app.clock.advance(Duration::minutes(90));
    let vote = voting.cast_vote(f.creator, ballot(&f)).await.unwrap();
    assert_eq!(vote.user_id, f.creator);
    assert_eq!(vote.candidate_id, f.candidate_id);
    assert_eq!(vote_count(&app, &f).await, 1);

    let again = voting.cast_vote(f.creator, ballot(&f)).await;
    assert!(matches!(again, Err(ElectionError::AlreadyVoted)));
    assert_eq!(vote_count(&app, &f).await, 1);
    assert_eq!(Vote::count_for_position(&app.pool, f.position_id).await.unwrap(), 1);

    app.clock.advance(Duration::hours(1));
    let late = voting.cast_vote(f.creator, ballot(&f)).await;
    assert!(matches!(late, Err(ElectionError::ElectionEnded)));
}

#[tokio::test]
async fn test_vote_requires_whitelist() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    let outsider = user(&app, "Out Sider", "outsider@example.com").await;
    app.clock.advance(Duration::minutes(90));

    let result = app.state.voting_service.cast_vote(outsider, ballot(&f)).await;
    assert!(matches!(result, Err(ElectionError::NotWhitelisted)));
    assert_eq!(vote_count(&app, &f).await, 0);
}

#[tokio::test]
async fn test_vote_validates_candidate_and_position() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    let voting = &app.state.voting_service;

    // A second position in the same election
    let secretary = app
        .state
        .election_service
        .add_position(f.creator, f.election_id, "Secretary")
        .await
        .unwrap();
    app.clock.advance(Duration::minutes(90));

    let result = voting
        .cast_vote(
            f.creator,
            CastVoteRequest {
                candidate_id: f.candidate_id + 100,
                ..ballot(&f)
            },
        )
        .await;
    assert!(matches!(result, Err(ElectionError::InvalidCandidate)));

    let result = voting
        .cast_vote(
            f.creator,
            CastVoteRequest {
                position_id: secretary.id,
                ..ballot(&f)
            },
        )
        .await;
    assert!(matches!(result, Err(ElectionError::CandidateNotForPosition)));

    let result = voting
        .cast_vote(
            f.creator,
            CastVoteRequest {
                election_id: f.election_id + 100,
                ..ballot(&f)
            },
        )
        .await;
    assert!(matches!(result, Err(ElectionError::ElectionNotFound)));

    assert_eq!(vote_count(&app, &f).await, 0);
}

#[tokio::test]
async fn test_vote_boundaries_are_inclusive() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    let voting = &app.state.voting_service;
    let candidate_user = app
        .state
        .user_service
        .find_user_by_email("amaka@example.com")
        .await
        .unwrap()
        .unwrap();

    app.clock.advance(Duration::hours(1));
    voting.cast_vote(f.creator, ballot(&f)).await.unwrap();

    app.clock.advance(Duration::hours(1));
    voting
        .cast_vote(candidate_user.id, ballot(&f))
        .await
        .unwrap();
    assert_eq!(vote_count(&app, &f).await, 2);
}

#[tokio::test]
async fn test_election_details_hide_counts() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    let voting = &app.state.voting_service;
    let voter = app
        .state
        .user_service
        .find_user_by_email("amaka@example.com")
        .await
        .unwrap()
        .unwrap();

    let details = voting.election_details(voter.id, f.election_id).await.unwrap();
    assert_eq!(details.status, ElectionStatus::Upcoming);
    assert_eq!(details.positions.len(), 1);
    assert_eq!(details.positions[0].position_name, "President");
    assert_eq!(details.positions[0].candidates.len(), 1);
    assert_eq!(details.positions[0].candidates[0].vote_count, None);
    assert!(details.allowed_voters.is_none());

    let as_creator = voting
        .election_details(f.creator, f.election_id)
        .await
        .unwrap();
    let emails = as_creator.allowed_voters.unwrap();
    assert_eq!(
        emails,
        vec!["amaka@example.com".to_string(), "ngozi@example.com".to_string()]
    );

    let outsider = user(&app, "Out Sider", "outsider@example.com").await;
    let result = voting.election_details(outsider, f.election_id).await;
    assert!(matches!(result, Err(ElectionError::NotWhitelisted)));
}

#[tokio::test]
async fn test_results_rank_candidates() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    user(&app, "Bola Ade", "bola@example.com").await;
    let voter_a = user(&app, "Voter A", "a@example.com").await;
    let voter_b = user(&app, "Voter B", "b@example.com").await;

    let runner_up = app
        .state
        .election_service
        .add_candidate(
            f.creator,
            NewCandidate {
                election_id: f.election_id,
                position_id: f.position_id,
                email: "bola@example.com".to_string(),
                fullname: None,
                nickname: None,
            },
        )
        .await
        .unwrap();
    app.state
        .whitelist_service
        .add_allowed_voters(
            f.creator,
            f.election_id,
            &["a@example.com".to_string(), "b@example.com".to_string()],
        )
        .await
        .unwrap();

    app.clock.advance(Duration::minutes(90));
    let voting = &app.state.voting_service;
    voting.cast_vote(voter_a, ballot(&f)).await.unwrap();
    voting.cast_vote(voter_b, ballot(&f)).await.unwrap();
    voting
        .cast_vote(
            f.creator,
            CastVoteRequest {
                candidate_id: runner_up.id,
                ..ballot(&f)
            },
        )
        .await
        .unwrap();

    let results = voting.election_results(f.creator, f.election_id).await.unwrap();
    assert_eq!(results.status, ElectionStatus::Active);
    assert_eq!(results.leaderboard.len(), 1);

    let president = &results.leaderboard[0];
    assert_eq!(president.total_votes, 3);
    assert_eq!(president.candidates[0].id, f.candidate_id);
    assert_eq!(president.candidates[0].vote_count, Some(2));
    assert_eq!(president.candidates[1].id, runner_up.id);
    assert_eq!(president.candidates[1].vote_count, Some(1));

    let result = voting.election_results(voter_a, f.election_id).await;
    assert!(matches!(result, Err(ElectionError::NotCreator)));
}

#[tokio::test]
async fn test_my_ballot_tracks_vote_status() {
    let app = test_helpers::spawn_test_app().await.unwrap();
    let f = fixture(&app).await;
    let voting = &app.state.voting_service;

    let entries = voting.my_ballot(f.creator).await.unwrap();
    assert_eq!(entries.len(), 1);
    assert_eq!(entries[0].election_id, f.election_id);
    assert_eq!(entries[0].status, ElectionStatus::Upcoming);
    assert_eq!(entries[0].vote_status, VoteStatus::NotVoted);
    assert!(entries[0].is_creator);
    assert_eq!(
        serde_json::to_value(entries[0].vote_status).unwrap(),
        serde_json::json!("not voted")
    );

    app.clock.advance(Duration::minutes(90));
    voting.cast_vote(f.creator, ballot(&f)).await.unwrap();

    let entries = voting.my_ballot(f.creator).await.unwrap();
    assert_eq!(entries[0].status, ElectionStatus::Active);
    assert_eq!(entries[0].vote_status, VoteStatus::Voted);
    assert_eq!(
        serde_json::to_value(entries[0].vote_status).unwrap(),
        serde_json::json!("voted")
    );

    let outsider = user(&app, "Out Sider", "outsider@example.com").await;
    assert!(voting.my_ballot(outsider).await.unwrap().is_empty());
}
