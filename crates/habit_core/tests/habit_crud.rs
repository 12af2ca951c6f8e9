use chrono::NaiveTime;
use habit_core::db::migrations::latest_version;
use habit_core::db::open_db_in_memory;
use habit_core::{
    Habit, HabitField, HabitListQuery, HabitLog, HabitLogRepository, HabitOrder, HabitRepository,
    RepoError, SqliteHabitLogRepository, SqliteHabitRepository, SqliteUserRepository, User,
    UserId, UserRepository,
};
use rusqlite::Connection;
use uuid::Uuid;

fn at(hour: u32, minute: u32) -> NaiveTime {
    NaiveTime::from_hms_opt(hour, minute, 0).unwrap()
}

fn seed_user(conn: &Connection, email: &str) -> UserId {
    let users = SqliteUserRepository::try_new(conn).unwrap();
    users.create_user(&User::new(email, None)).unwrap()
}

fn useful(owner: UserId, action: &str) -> Habit {
    Habit::new(owner, action, "home", at(9, 0), 60)
}

fn pleasant(owner: UserId, action: &str) -> Habit {
    let mut habit = Habit::new(owner, action, "sofa", at(9, 5), 30);
    habit.is_pleasant = true;
    habit
}

#[test]
fn create_and_get_roundtrip() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "reader@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = useful(owner, "read");
    habit.reward = Some("tea".to_string());
    habit.periodicity = 3;
    let id = repo.create_habit(&habit).unwrap();

    let loaded = repo.get_habit(id).unwrap().unwrap();
    assert_eq!(loaded, habit);
}

#[test]
fn update_existing_habit() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "walker@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = useful(owner, "walk");
    repo.create_habit(&habit).unwrap();

    habit.place = "park".to_string();
    habit.time = at(18, 30);
    habit.is_public = true;
    repo.update_habit(&habit).unwrap();

    let loaded = repo.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(loaded.place, "park");
    assert_eq!(loaded.time, at(18, 30));
    assert!(loaded.is_public);
    assert_eq!(loaded.created_at, habit.created_at);
    assert!(loaded.updated_at >= loaded.created_at);
}

#[test]
fn update_not_found_returns_not_found() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "ghost@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let habit = useful(owner, "missing");
    let err = repo.update_habit(&habit).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(id) if id == habit.id));
}

#[test]
fn rule_violations_block_create_and_update() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "rules@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut invalid = useful(owner, "too long");
    invalid.estimated_time = 150;
    invalid.periodicity = 10;
    match repo.create_habit(&invalid).unwrap_err() {
        RepoError::Validation(err) => assert_eq!(
            err.fields(),
            vec![HabitField::EstimatedTime, HabitField::Periodicity]
        ),
        other => panic!("unexpected error: {other}"),
    }
    assert!(repo.get_habit(invalid.id).unwrap().is_none());

    let mut valid = useful(owner, "fine");
    repo.create_habit(&valid).unwrap();
    valid.is_pleasant = true;
    valid.reward = Some("chocolate".to_string());
    let err = repo.update_habit(&valid).unwrap_err();
    assert!(matches!(err, RepoError::Validation(ref e) if e.has(HabitField::Reward)));

    let stored = repo.get_habit(valid.id).unwrap().unwrap();
    assert!(!stored.is_pleasant);
    assert_eq!(stored.reward, None);
}

#[test]
fn related_habit_must_be_pleasant_and_exist() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "chain@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let bath = pleasant(owner, "take a bath");
    let chores = useful(owner, "do chores");
    repo.create_habit(&bath).unwrap();
    repo.create_habit(&chores).unwrap();

    let mut linked = useful(owner, "run");
    linked.related_habit = Some(bath.id);
    repo.create_habit(&linked).unwrap();

    let mut bad_link = useful(owner, "swim");
    bad_link.related_habit = Some(chores.id);
    let err = repo.create_habit(&bad_link).unwrap_err();
    assert!(matches!(err, RepoError::Validation(ref e) if e.has(HabitField::RelatedHabit)));

    let missing_id = Uuid::new_v4();
    let mut dangling = useful(owner, "stretch");
    dangling.related_habit = Some(missing_id);
    let err = repo.create_habit(&dangling).unwrap_err();
    assert!(matches!(err, RepoError::RelatedNotFound(id) if id == missing_id));
}

#[test]
fn self_reference_is_rejected_for_either_flag() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "loop@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = pleasant(owner, "nap");
    repo.create_habit(&habit).unwrap();

    habit.is_pleasant = false;
    habit.related_habit = Some(habit.id);
    let err = repo.update_habit(&habit).unwrap_err();
    assert!(matches!(err, RepoError::Validation(ref e) if e.has(HabitField::RelatedHabit)));

    habit.is_pleasant = true;
    let err = repo.update_habit(&habit).unwrap_err();
    assert!(matches!(err, RepoError::Validation(ref e) if e.has(HabitField::RelatedHabit)));
}

#[test]
fn field_shape_is_checked_before_rules() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "shape@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habit = useful(owner, "  ");
    habit.periodicity = 30;
    let err = repo.create_habit(&habit).unwrap_err();
    assert!(matches!(err, RepoError::InvalidField(ref e) if e.field == "action"));
}

#[test]
fn delete_cascades_logs_and_clears_related_pointers() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "cascade@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();
    let logs = SqliteHabitLogRepository::try_new(&conn).unwrap();

    let reward = pleasant(owner, "music");
    repo.create_habit(&reward).unwrap();
    let mut habit = useful(owner, "practice");
    habit.related_habit = Some(reward.id);
    repo.create_habit(&habit).unwrap();
    logs.append_log(&HabitLog::completed(reward.id, 1_000))
        .unwrap();

    repo.delete_habit(reward.id).unwrap();

    assert!(repo.get_habit(reward.id).unwrap().is_none());
    assert!(logs.list_logs(reward.id).unwrap().is_empty());
    let survivor = repo.get_habit(habit.id).unwrap().unwrap();
    assert_eq!(survivor.related_habit, None);

    let err = repo.delete_habit(reward.id).unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn list_filters_by_owner_flags_and_minute() {
    let conn = open_db_in_memory().unwrap();
    let alice = seed_user(&conn, "alice@example.com");
    let bob = seed_user(&conn, "bob@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut morning = useful(alice, "read");
    morning.time = NaiveTime::from_hms_opt(7, 15, 42).unwrap();
    let treat = pleasant(alice, "coffee");
    let mut shared = useful(bob, "jog");
    shared.is_public = true;
    for habit in [&morning, &treat, &shared] {
        repo.create_habit(habit).unwrap();
    }

    let alice_useful = repo
        .list_habits(&HabitListQuery {
            owner_id: Some(alice),
            is_pleasant: Some(false),
            ..HabitListQuery::default()
        })
        .unwrap();
    assert_eq!(alice_useful.len(), 1);
    assert_eq!(alice_useful[0].id, morning.id);

    let public = repo
        .list_habits(&HabitListQuery {
            is_public: Some(true),
            ..HabitListQuery::default()
        })
        .unwrap();
    assert_eq!(public.len(), 1);
    assert_eq!(public[0].id, shared.id);

    let due = repo
        .list_habits(&HabitListQuery {
            at_minute: Some(at(7, 15)),
            ..HabitListQuery::default()
        })
        .unwrap();
    assert_eq!(due.len(), 1);
    assert_eq!(due[0].id, morning.id);
}

#[test]
fn list_orders_and_paginates_stably() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "pages@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();

    let mut habits = Vec::new();
    for (index, hour) in [(0_i64, 12_u32), (1, 6), (2, 18)] {
        let mut habit = useful(owner, "habit");
        habit.time = at(hour, 0);
        habit.created_at = 1_000 + index;
        repo.create_habit(&habit).unwrap();
        habits.push(habit);
    }

    let newest_first = repo.list_habits(&HabitListQuery::default()).unwrap();
    let ids: Vec<_> = newest_first.iter().map(|habit| habit.id).collect();
    assert_eq!(ids, vec![habits[2].id, habits[1].id, habits[0].id]);

    let by_time = repo
        .list_habits(&HabitListQuery {
            order: HabitOrder::TimeAsc,
            limit: Some(2),
            offset: 1,
            ..HabitListQuery::default()
        })
        .unwrap();
    let ids: Vec<_> = by_time.iter().map(|habit| habit.id).collect();
    assert_eq!(ids, vec![habits[0].id, habits[2].id]);

    let ordered = |order: HabitOrder| -> Vec<_> {
        repo.list_habits(&HabitListQuery {
            order,
            ..HabitListQuery::default()
        })
        .unwrap()
        .iter()
        .map(|habit| habit.id)
        .collect()
    };
    assert_eq!(
        ordered(HabitOrder::CreatedAsc),
        vec![habits[0].id, habits[1].id, habits[2].id]
    );
    assert_eq!(
        ordered(HabitOrder::TimeDesc),
        vec![habits[2].id, habits[0].id, habits[1].id]
    );
}

#[test]
fn ordering_params_map_to_both_directions() {
    assert_eq!(
        HabitOrder::from_ordering_param("created_at"),
        Some(HabitOrder::CreatedAsc)
    );
    assert_eq!(
        HabitOrder::from_ordering_param("-created_at"),
        Some(HabitOrder::CreatedDesc)
    );
    assert_eq!(HabitOrder::from_ordering_param("time"), Some(HabitOrder::TimeAsc));
    assert_eq!(HabitOrder::from_ordering_param("-time"), Some(HabitOrder::TimeDesc));
    assert_eq!(HabitOrder::from_ordering_param("place"), None);
}

#[test]
fn logs_are_listed_newest_first_and_windowed() {
    let conn = open_db_in_memory().unwrap();
    let owner = seed_user(&conn, "logs@example.com");
    let repo = SqliteHabitRepository::try_new(&conn).unwrap();
    let logs = SqliteHabitLogRepository::try_new(&conn).unwrap();

    let habit = useful(owner, "floss");
    repo.create_habit(&habit).unwrap();
    logs.append_log(&HabitLog::completed(habit.id, 100)).unwrap();
    logs.append_log(&HabitLog::completed(habit.id, 300)).unwrap();
    let mut missed = HabitLog::completed(habit.id, 500);
    missed.is_completed = false;
    logs.append_log(&missed).unwrap();

    let listed = logs.list_logs(habit.id).unwrap();
    let stamps: Vec<_> = listed.iter().map(|log| log.completed_at).collect();
    assert_eq!(stamps, vec![500, 300, 100]);

    assert!(logs.has_log_between(habit.id, 200, 400, true).unwrap());
    assert!(!logs.has_log_between(habit.id, 301, 600, true).unwrap());
    assert!(logs.has_log_between(habit.id, 301, 600, false).unwrap());
    assert!(!logs.has_log_between(habit.id, 100, 100, false).unwrap());

    let err = logs
        .append_log(&HabitLog::completed(Uuid::new_v4(), 1))
        .unwrap_err();
    assert!(matches!(err, RepoError::NotFound(_)));
}

#[test]
fn repository_rejects_uninitialized_connection() {
    let conn = Connection::open_in_memory().unwrap();

    match SqliteHabitRepository::try_new(&conn) {
        Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version: 0,
        }) => assert_eq!(expected_version, latest_version()),
        Err(other) => panic!("unexpected error: {other}"),
        Ok(_) => panic!("expected uninitialized connection error"),
    }
}

#[test]
fn repository_rejects_connection_without_required_table() {
    let conn = Connection::open_in_memory().unwrap();
    conn.execute_batch(&format!("PRAGMA user_version = {};", latest_version()))
        .unwrap();

    let result = SqliteHabitLogRepository::try_new(&conn);
    assert!(matches!(
        result,
        Err(RepoError::MissingRequiredTable("habits"))
    ));
}

#[test]
fn users_round_trip_and_emails_are_unique() {
    let conn = open_db_in_memory().unwrap();
    let users = SqliteUserRepository::try_new(&conn).unwrap();

    let user = User::new("owner@example.com", Some("555".to_string()));
    let id = users.create_user(&user).unwrap();
    assert_eq!(users.get_user(id).unwrap(), Some(user));
    assert_eq!(users.get_user(Uuid::new_v4()).unwrap(), None);

    let duplicate = users.create_user(&User::new("owner@example.com", None));
    assert!(matches!(duplicate, Err(RepoError::Db(_))));
}
