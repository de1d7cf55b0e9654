//! Integration tests for `SqliteStore` against an in-memory database.

use std::{path::PathBuf, sync::Arc};

use chrono::{Duration, Utc};
use songvote_core::{
  password::Hasher,
  service::VoteService,
  session::{SessionRecord, SessionStore},
  song::{Ballot, NewSong, SongUpdate},
  store::VoteStore,
  user::{NewUser, NewUserRecord, UserUpdate},
};

use crate::{Error, SqliteStore};

async fn store() -> SqliteStore {
  SqliteStore::open_in_memory()
    .await
    .expect("in-memory store")
}

async fn add_user(s: &SqliteStore, name: &str) -> i64 {
  s.add_user(NewUserRecord {
    name:             name.into(),
    password_hash:    "$argon2id$placeholder".into(),
    vetoes_remaining: 1,
  })
  .await
  .unwrap()
}

async fn add_song(s: &SqliteStore, title: &str, added_by: i64) -> i64 {
  s.add_song(NewSong {
    title:    title.into(),
    artist:   "The Band".into(),
    link_url: String::new(),
    added_by,
  })
  .await
  .unwrap()
}

/// A fresh database path under the temp dir; the directory is emptied first.
fn scratch_db(tag: &str) -> PathBuf {
  let dir = std::env::temp_dir().join(format!("songvote-{tag}-{}", std::process::id()));
  let _ = std::fs::remove_dir_all(&dir);
  dir.join("songvote.db")
}

// ─── Users ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_and_get_user() {
  let s = store().await;
  let id = add_user(&s, "alice").await;

  let user = s.get_user_by_id(id).await.unwrap().expect("user exists");
  assert_eq!(user.name, "alice");
  assert_eq!(user.vetoes_remaining, 1);
  assert!(!user.inactive);

  let by_name = s.get_user_by_name("alice").await.unwrap().expect("user by name");
  assert_eq!(by_name.id, id);
}

#[tokio::test]
async fn duplicate_active_name_conflicts() {
  let s = store().await;
  add_user(&s, "alice").await;

  let err = s
    .add_user(NewUserRecord {
      name:             "alice".into(),
      password_hash:    "x".into(),
      vetoes_remaining: 1,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)), "got {err:?}");
}

#[tokio::test]
async fn soft_deleted_user_is_hidden_and_frees_name() {
  let s = store().await;
  let id = add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;

  s.soft_delete_user(id).await.unwrap();

  assert!(s.get_user_by_id(id).await.unwrap().is_none());
  assert!(s.get_user_by_name("alice").await.unwrap().is_none());
  assert!(s.find_user(id).await.unwrap().expect("row kept").inactive);

  let listed: Vec<i64> = s.list_users().await.unwrap().iter().map(|u| u.id).collect();
  assert_eq!(listed, vec![bob]);

  let again = s.soft_delete_user(id).await.unwrap_err();
  assert!(matches!(again, Error::NotFound(_)));

  let reused = add_user(&s, "alice").await;
  assert_ne!(reused, id);
}

#[tokio::test]
async fn update_user_changes_only_given_fields() {
  let s = store().await;
  let id = add_user(&s, "alice").await;

  s.update_user(id, UserUpdate { vetoes_remaining: Some(3), ..Default::default() })
    .await
    .unwrap();

  let user = s.get_user_by_id(id).await.unwrap().unwrap();
  assert_eq!(user.name, "alice");
  assert_eq!(user.vetoes_remaining, 3);
}

#[tokio::test]
async fn update_user_rename_onto_active_name_conflicts() {
  let s = store().await;
  add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;

  let err = s
    .update_user(bob, UserUpdate { name: Some("alice".into()), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
}

#[tokio::test]
async fn update_missing_user_is_not_found() {
  let s = store().await;
  let err = s.update_user(99, UserUpdate::default()).await.unwrap_err();
  assert!(matches!(err, Error::NotFound(_)));
}

// ─── Songs ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn add_song_records_submitter_vote() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let song = add_song(&s, "Song A", alice).await;

  let fetched = s.get_song(song).await.unwrap().expect("song exists");
  assert_eq!(fetched.votes, 1);
  assert!(!fetched.vetoed);
  assert_eq!(fetched.added_by, alice);

  let votes = s.list_votes_for_song(song).await.unwrap();
  assert_eq!(votes.len(), 1);
  assert_eq!(votes[0].user_id, alice);
  assert!(s.has_voted(song, alice).await.unwrap());
}

#[tokio::test]
async fn duplicate_song_conflicts_and_leaves_no_trace() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  add_song(&s, "Song A", alice).await;

  let err = s
    .add_song(NewSong {
      title:    "Song A".into(),
      artist:   "The Band".into(),
      link_url: String::new(),
      added_by: alice,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));
  assert_eq!(s.list_songs().await.unwrap().len(), 1);
}

#[tokio::test]
async fn add_song_by_inactive_user_rolls_back() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  s.soft_delete_user(alice).await.unwrap();

  let err = s
    .add_song(NewSong {
      title:    "Song A".into(),
      artist:   "The Band".into(),
      link_url: String::new(),
      added_by: alice,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)), "got {err:?}");
  assert!(s.list_songs().await.unwrap().is_empty());
}

#[tokio::test]
async fn add_song_by_unknown_user_is_not_found() {
  let s = store().await;
  let err = s
    .add_song(NewSong {
      title:    "Song A".into(),
      artist:   "The Band".into(),
      link_url: String::new(),
      added_by: 42,
    })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::NotFound(_)), "got {err:?}");
}

#[tokio::test]
async fn update_song_edits_fields_and_checks_pair() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let a = add_song(&s, "Song A", alice).await;
  add_song(&s, "Song B", alice).await;

  s.update_song(a, SongUpdate { link_url: Some("https://x".into()), ..Default::default() })
    .await
    .unwrap();
  let song = s.get_song(a).await.unwrap().unwrap();
  assert_eq!(song.link_url, "https://x");
  assert_eq!(song.votes, 1);

  let err = s
    .update_song(a, SongUpdate { title: Some("Song B".into()), ..Default::default() })
    .await
    .unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  let missing = s.update_song(99, SongUpdate::default()).await.unwrap_err();
  assert!(matches!(missing, Error::NotFound(_)));
}

#[tokio::test]
async fn delete_song_cascades_and_refunds_the_veto() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;
  let song = add_song(&s, "Song A", alice).await;
  let other = add_song(&s, "Song B", alice).await;
  s.record_veto(song, alice).await.unwrap();
  s.record_veto(other, bob).await.unwrap();
  assert_eq!(s.find_user(alice).await.unwrap().unwrap().vetoes_remaining, 0);

  s.delete_song(song).await.unwrap();

  assert!(s.get_song(song).await.unwrap().is_none());
  assert!(s.list_votes_for_song(song).await.unwrap().is_empty());
  assert!(s.get_veto_for_song(song).await.unwrap().is_none());
  assert_eq!(s.find_user(alice).await.unwrap().unwrap().vetoes_remaining, 1);
  assert_eq!(s.find_user(bob).await.unwrap().unwrap().vetoes_remaining, 0);

  // Unvetoed songs refund nobody.
  let plain = add_song(&s, "Song C", bob).await;
  s.delete_song(plain).await.unwrap();
  assert_eq!(s.find_user(bob).await.unwrap().unwrap().vetoes_remaining, 0);

  let again = s.delete_song(song).await.unwrap_err();
  assert!(matches!(again, Error::NotFound(_)));
}

// ─── Votes ───────────────────────────────────────────────────────────────────

#[tokio::test]
async fn vote_increments_counter_once() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;
  let song = add_song(&s, "Song A", alice).await;

  s.record_vote(song, bob).await.unwrap();
  let err = s.record_vote(song, bob).await.unwrap_err();
  assert!(matches!(err, Error::Conflict(_)));

  let fetched = s.get_song(song).await.unwrap().unwrap();
  assert_eq!(fetched.votes, 2);
  assert_eq!(s.list_votes_for_song(song).await.unwrap().len() as u32, fetched.votes);
}

#[tokio::test]
async fn vote_rejections() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;
  let song = add_song(&s, "Song A", alice).await;

  let missing_song = s.record_vote(99, bob).await.unwrap_err();
  assert!(matches!(missing_song, Error::NotFound(_)));

  s.soft_delete_user(bob).await.unwrap();
  let inactive = s.record_vote(song, bob).await.unwrap_err();
  assert!(matches!(inactive, Error::Forbidden(_)));

  assert_eq!(s.get_song(song).await.unwrap().unwrap().votes, 1);
}

// ─── Vetoes ──────────────────────────────────────────────────────────────────

#[tokio::test]
async fn veto_spends_budget_and_marks_song() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;
  let song = add_song(&s, "Song A", alice).await;

  s.record_veto(song, bob).await.unwrap();

  assert!(s.get_song(song).await.unwrap().unwrap().vetoed);
  assert_eq!(s.get_user_by_id(bob).await.unwrap().unwrap().vetoes_remaining, 0);
  let veto = s.get_veto_for_song(song).await.unwrap().expect("veto row");
  assert_eq!(veto.user_id, bob);

  let twice = s.record_veto(song, alice).await.unwrap_err();
  assert!(matches!(twice, Error::Conflict(_)));
  assert_eq!(s.get_user_by_id(alice).await.unwrap().unwrap().vetoes_remaining, 1);
}

#[tokio::test]
async fn veto_without_budget_is_forbidden_and_rolls_back() {
  let s = store().await;
  let alice = add_user(&s, "alice").await;
  let a = add_song(&s, "Song A", alice).await;
  let b = add_song(&s, "Song B", alice).await;

  s.record_veto(a, alice).await.unwrap();
  let err = s.record_veto(b, alice).await.unwrap_err();
  assert!(matches!(err, Error::Forbidden(_)));

  assert!(!s.get_song(b).await.unwrap().unwrap().vetoed);
  assert!(s.get_veto_for_song(b).await.unwrap().is_none());
}

// ─── Sessions ────────────────────────────────────────────────────────────────

fn record(token: &str, expiry: chrono::DateTime<Utc>) -> SessionRecord {
  SessionRecord { token: token.into(), data: b"{}".to_vec(), expiry }
}

#[tokio::test]
async fn session_save_load_and_replace() {
  let s = store().await;
  let now = Utc::now();

  s.save_session(record("t1", now + Duration::hours(1))).await.unwrap();
  let loaded = s.load_session("t1", now).await.unwrap().expect("live session");
  assert_eq!(loaded.data, b"{}");

  let mut updated = record("t1", now + Duration::hours(2));
  updated.data = br#"{"user_id":1}"#.to_vec();
  s.save_session(updated.clone()).await.unwrap();
  let loaded = s.load_session("t1", now).await.unwrap().unwrap();
  assert_eq!(loaded.data, updated.data);

  s.delete_session("t1").await.unwrap();
  assert!(s.load_session("t1", now).await.unwrap().is_none());
  s.delete_session("t1").await.unwrap();
}

#[tokio::test]
async fn expired_sessions_are_invisible_and_swept() {
  let s = store().await;
  let now = Utc::now();

  s.save_session(record("old", now - Duration::minutes(1))).await.unwrap();
  s.save_session(record("new", now + Duration::minutes(1))).await.unwrap();

  assert!(s.load_session("old", now).await.unwrap().is_none());
  assert_eq!(s.delete_expired_sessions(now).await.unwrap(), 1);
  assert!(s.load_session("new", now).await.unwrap().is_some());
}

// ─── Cancellation ────────────────────────────────────────────────────────────

#[tokio::test]
async fn dropped_writes_roll_back() {
  let path = scratch_db("dropped-writes");
  let s = SqliteStore::open(&path).await.unwrap();
  let alice = add_user(&s, "alice").await;
  let bob = add_user(&s, "bob").await;
  let song = add_song(&s, "Song A", alice).await;

  // Another connection holds the write lock, so both writes stall in BEGIN.
  let holder = rusqlite::Connection::open(&path).unwrap();
  holder.execute_batch("BEGIN IMMEDIATE").unwrap();

  let wait = std::time::Duration::from_millis(100);
  let mut vote = Box::pin(s.record_vote(song, bob));
  assert!(tokio::time::timeout(wait, &mut vote).await.is_err());
  let mut veto = Box::pin(s.record_veto(song, bob));
  assert!(tokio::time::timeout(wait, &mut veto).await.is_err());
  drop(vote);
  drop(veto);

  holder.execute_batch("COMMIT").unwrap();

  // Reads queue behind the abandoned writes on the store's connection.
  let fetched = s.get_song(song).await.unwrap().unwrap();
  assert_eq!(fetched.votes, 1);
  assert!(!fetched.vetoed);
  assert!(!s.has_voted(song, bob).await.unwrap());
  assert!(s.get_veto_for_song(song).await.unwrap().is_none());
  assert_eq!(s.find_user(bob).await.unwrap().unwrap().vetoes_remaining, 1);

  // The store is still usable afterwards.
  s.record_vote(song, bob).await.unwrap();
  assert_eq!(s.get_song(song).await.unwrap().unwrap().votes, 2);

  if let Some(dir) = path.parent() {
    let _ = std::fs::remove_dir_all(dir);
  }
}

// ─── Concurrency ─────────────────────────────────────────────────────────────

const VOTERS: usize = 16;

async fn service() -> VoteService<SqliteStore> {
  VoteService::with_hasher(Arc::new(store().await), Hasher::fast())
}

fn new_user(name: &str) -> NewUser {
  NewUser { name: name.into(), password: "p@ssword".into() }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_voters_never_lose_an_increment() {
  let svc = service().await;
  let submitter = svc.register(new_user("submitter")).await.unwrap();
  let song = svc
    .add_song(NewSong {
      title:    "Song A".into(),
      artist:   "The Band".into(),
      link_url: String::new(),
      added_by: submitter,
    })
    .await
    .unwrap();

  let mut voters = Vec::with_capacity(VOTERS);
  for i in 0..VOTERS {
    voters.push(svc.register(new_user(&format!("voter {i}"))).await.unwrap());
  }

  let handles: Vec<_> = voters
    .into_iter()
    .map(|user_id| {
      let svc = svc.clone();
      tokio::spawn(async move { svc.vote(Ballot { song_id: song, user_id }).await })
    })
    .collect();
  for handle in handles {
    handle.await.unwrap().unwrap();
  }

  let fetched = svc.get_song(song).await.unwrap();
  assert_eq!(fetched.votes as usize, VOTERS + 1);
  assert_eq!(svc.list_votes_for_song(song).await.unwrap().len(), fetched.votes as usize);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_double_vote_counts_once() {
  let svc = service().await;
  let alice = svc.register(new_user("alice")).await.unwrap();
  let bob = svc.register(new_user("bob")).await.unwrap();
  let song = svc
    .add_song(NewSong {
      title:    "Song A".into(),
      artist:   "The Band".into(),
      link_url: String::new(),
      added_by: alice,
    })
    .await
    .unwrap();

  let ballot = Ballot { song_id: song, user_id: bob };
  let (a, b) = tokio::join!(
    tokio::spawn({
      let svc = svc.clone();
      async move { svc.vote(ballot).await }
    }),
    tokio::spawn({
      let svc = svc.clone();
      async move { svc.vote(ballot).await }
    }),
  );
  let results = [a.unwrap(), b.unwrap()];

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1);
  assert!(
    results.iter().any(|r| matches!(r, Err(songvote_core::Error::Conflict(_)))),
    "got {results:?}"
  );
  assert_eq!(svc.get_song(song).await.unwrap().votes, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn racing_registrations_yield_one_conflict() {
  let svc = service().await;

  let (a, b) = tokio::join!(
    tokio::spawn({
      let svc = svc.clone();
      async move { svc.register(new_user("same")).await }
    }),
    tokio::spawn({
      let svc = svc.clone();
      async move { svc.register(new_user("same")).await }
    }),
  );
  let results = [a.unwrap(), b.unwrap()];

  assert_eq!(results.iter().filter(|r| r.is_ok()).count(), 1, "got {results:?}");
  assert!(
    results.iter().any(|r| matches!(r, Err(songvote_core::Error::Conflict(_)))),
    "got {results:?}"
  );
  assert_eq!(svc.list_users().await.unwrap().len(), 1);
}

// ─── On-disk ─────────────────────────────────────────────────────────────────

#[tokio::test]
async fn open_creates_parent_directories_and_reopens() {
  let dir = std::env::temp_dir().join(format!("songvote-store-{}", std::process::id()));
  let path = dir.join("nested").join("songvote.db");
  let _ = std::fs::remove_dir_all(&dir);

  {
    let s = SqliteStore::open(&path).await.unwrap();
    add_user(&s, "alice").await;
  }
  let s = SqliteStore::open(&path).await.unwrap();
  assert!(s.get_user_by_name("alice").await.unwrap().is_some());

  let _ = std::fs::remove_dir_all(&dir);
}
