use std::sync::atomic::{AtomicI64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, TimeZone, Utc};
use pretty_assertions::assert_eq;
use rusqlite::params;

use choir_instrument_ledger::catalog::{default_catalog, sample_roster};
use choir_instrument_ledger::{ErrorKind, Ledger, LoanStore, LoanTx, NewLoan, SqliteStore};

/// A clock that moves forward one minute every time it is read.
fn stepping_clock() -> impl Fn() -> DateTime<Utc> + Send + 'static {
    let start = Utc.with_ymd_and_hms(2025, 3, 2, 9, 0, 0).unwrap().timestamp();
    let ticks = Arc::new(AtomicI64::new(0));
    move || {
        let tick = ticks.fetch_add(1, Ordering::SeqCst);
        Utc.timestamp_opt(start + tick * 60, 0).unwrap()
    }
}

fn ledger() -> Ledger<SqliteStore> {
    let mut store = SqliteStore::open_in_memory().unwrap();
    store.seed(&default_catalog(), &sample_roster()).unwrap();
    Ledger::with_clock(store, stepping_clock())
}

fn request(name: &str, division: &str, kind: &str, number: &str) -> NewLoan {
    NewLoan {
        division: division.into(),
        group: None,
        chorister_name: name.into(),
        phone: None,
        instrument_type: kind.into(),
        instrument_number: number.into(),
    }
}

fn violin(number: &str) -> NewLoan {
    request("Jane Smith", "Adult Choir", "Violin", number)
}

fn is_available(ledger: &Ledger<SqliteStore>, number: &str) -> bool {
    ledger
        .store()
        .connection()
        .query_row(
            "SELECT is_available FROM instruments WHERE number = ?1",
            [number],
            |row| row.get(0),
        )
        .unwrap()
}

fn log_count(ledger: &Ledger<SqliteStore>) -> i64 {
    ledger
        .store()
        .connection()
        .query_row("SELECT COUNT(*) FROM logs", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn repeated_checkout_is_a_conflict() {
    let mut ledger = ledger();

    ledger.checkout(violin("Violin-001")).unwrap();
    assert!(!is_available(&ledger, "Violin-001"));

    let err = ledger.checkout(violin("Violin-001")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.status(), 400);
    assert_eq!(log_count(&ledger), 1);
}

#[test]
fn checkin_closes_the_loan_and_frees_the_instrument() {
    let mut ledger = ledger();
    let opened = ledger.checkout(violin("Violin-001")).unwrap();

    let closed = ledger.checkin("Violin-001", Some("Good")).unwrap();

    assert_eq!(closed, opened);
    assert!(is_available(&ledger, "Violin-001"));
    let history = ledger.history(None).unwrap();
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].condition_returned.as_deref(), Some("Good"));
    assert!(history[0].checkin_time.unwrap() > history[0].checkout_time);
    assert!(ledger.list_available("Violin").unwrap().contains(&"Violin-001".to_string()));
}

#[test]
fn checkin_without_open_loan_is_not_found() {
    let mut ledger = ledger();

    let err = ledger.checkin("Violin-002", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.status(), 404);

    ledger.checkout(violin("Violin-002")).unwrap();
    ledger.checkin("Violin-002", None).unwrap();
    let again = ledger.checkin("Violin-002", None).unwrap_err();
    assert_eq!(again.kind(), ErrorKind::NotFound);
}

#[test]
fn checkout_of_unknown_instrument_is_not_found() {
    let mut ledger = ledger();

    let err = ledger.checkout(violin("Violin-999")).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "Instrument not found.");
    assert_eq!(log_count(&ledger), 0);
}

#[test]
fn missing_fields_are_rejected_before_touching_storage() {
    let mut ledger = ledger();

    let err = ledger
        .checkout(request("  ", "Adult Choir", "Violin", "Violin-001"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(is_available(&ledger, "Violin-001"));

    let err = ledger.checkin("", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn type_must_match_the_catalogued_instrument() {
    let mut ledger = ledger();

    let err = ledger
        .checkout(request("John Doe", "Adult Choir", "Flute", "Violin-001"))
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    assert!(is_available(&ledger, "Violin-001"));

    ledger
        .checkout(request("John Doe", "Adult Choir", "violin", "Violin-001"))
        .unwrap();
    assert_eq!(ledger.history(None).unwrap()[0].instrument_type, "Violin");
}

#[test]
fn availability_tracks_open_loans() {
    let mut ledger = ledger();

    for number in ["Violin-001", "Violin-002", "Violin-003"] {
        ledger.checkout(violin(number)).unwrap();
    }
    ledger.checkin("Violin-002", Some("Scratched")).unwrap();
    ledger
        .checkout(request("Mary Youth", "Youth Choir", "Flute", "Flute-001"))
        .unwrap();

    let open: Vec<String> = ledger
        .open_loans()
        .unwrap()
        .into_iter()
        .map(|loan| loan.instrument_number)
        .collect();
    assert_eq!(open, vec!["Flute-001", "Violin-003", "Violin-001"]);

    let unavailable: i64 = ledger
        .store()
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM instruments WHERE is_available = 0",
            [],
            |row| row.get(0),
        )
        .unwrap();
    assert_eq!(unavailable as usize, open.len());

    let available = ledger.list_available("Violin").unwrap();
    assert_eq!(available.len(), 38);
    assert_eq!(available[..2].to_vec(), vec!["Violin-002", "Violin-004"]);
}

#[test]
fn history_is_newest_first_and_searchable() {
    let mut ledger = ledger();
    ledger.checkout(violin("Violin-001")).unwrap();
    ledger
        .checkout(request("Samuel Youth", "Youth Choir", "Trumpet", "Trumpet-004"))
        .unwrap();
    ledger
        .checkout(request("Peter Child", "Children Choir", "Viola", "Viola-002"))
        .unwrap();

    let all = ledger.history(None).unwrap();
    let numbers: Vec<&str> = all.iter().map(|l| l.instrument_number.as_str()).collect();
    assert_eq!(numbers, vec!["Viola-002", "Trumpet-004", "Violin-001"]);

    let youth = ledger.history(Some("YOUTH")).unwrap();
    assert_eq!(youth.len(), 1);
    assert_eq!(youth[0].chorister_name, "Samuel Youth");

    let viol = ledger.history(Some("viol")).unwrap();
    let expected: Vec<_> = all.iter().filter(|l| l.matches("viol")).cloned().collect();
    assert_eq!(viol, expected);
    assert_eq!(viol.len(), 2);

    assert_eq!(ledger.history(Some("   ")).unwrap(), all);
    assert!(ledger.history(Some("%")).unwrap().is_empty());
}

#[test]
fn checkin_closes_the_latest_of_duplicate_open_loans() {
    let mut ledger = ledger();
    let conn = ledger.store().connection();
    for at in ["2025-01-01T10:00:00.000Z", "2025-01-02T10:00:00.000Z"] {
        conn.execute(
            "INSERT INTO logs (division, chorister_name, instrument_type,
                               instrument_number, sign_out_time)
             VALUES ('Adult Choir', 'John Doe', 'Violin', 'Violin-005', ?1)",
            params![at],
        )
        .unwrap();
    }
    conn.execute(
        "UPDATE instruments SET is_available = 0 WHERE number = 'Violin-005'",
        [],
    )
    .unwrap();

    let closed = ledger.checkin("Violin-005", None).unwrap();

    let history = ledger.history(Some("Violin-005")).unwrap();
    assert_eq!(history[0].id, closed);
    assert!(!history[0].is_open());
    assert!(history[1].is_open());
}

#[test]
fn failed_write_rolls_back_the_whole_checkout() {
    let mut ledger = ledger();
    ledger
        .store()
        .connection()
        .execute_batch(
            "CREATE TRIGGER refuse_flag BEFORE UPDATE ON instruments
             BEGIN SELECT RAISE(ABORT, 'flag locked'); END;",
        )
        .unwrap();

    let err = ledger.checkout(violin("Violin-001")).unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Storage);
    assert_eq!(err.status(), 500);
    assert_eq!(log_count(&ledger), 0);
    assert!(is_available(&ledger, "Violin-001"));
}

#[test]
fn reference_reads_follow_the_seeded_data() {
    let ledger = ledger();

    assert_eq!(
        ledger.divisions().unwrap(),
        vec!["Adult Choir", "Children Choir", "Youth Choir", "YPF Choir"]
    );
    let youth: Vec<String> = ledger
        .choristers("Youth Choir")
        .unwrap()
        .into_iter()
        .map(|chorister| chorister.name)
        .collect();
    assert_eq!(youth, vec!["Mary Youth", "Samuel Youth"]);
    let types = ledger.instrument_types().unwrap();
    assert_eq!(types.len(), 16);
    assert_eq!(types[0], "Violin");
    assert_eq!(
        ledger.list_available("Double bass").unwrap()[0],
        "Doublebass-001"
    );
    assert!(ledger.store().open_loans().unwrap().is_empty());
}

fn open_loans_for(store: &SqliteStore, number: &str) -> i64 {
    store
        .connection()
        .query_row(
            "SELECT COUNT(*) FROM logs WHERE instrument_number = ?1 AND sign_in_time IS NULL",
            [number],
            |row| row.get(0),
        )
        .unwrap()
}

#[test]
fn second_handle_on_the_same_file_sees_the_loan() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    let mut desk = SqliteStore::open(&path).unwrap();
    desk.seed(&default_catalog(), &sample_roster()).unwrap();
    let mut desk = Ledger::with_clock(desk, stepping_clock());
    let mut cli = Ledger::with_clock(SqliteStore::open(&path).unwrap(), stepping_clock());

    desk.checkout(violin("Violin-001")).unwrap();
    let err = cli
        .checkout(request("John Doe", "Adult Choir", "Violin", "Violin-001"))
        .unwrap_err();

    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(open_loans_for(cli.store(), "Violin-001"), 1);
    assert_eq!(open_loans_for(desk.store(), "Violin-001"), 1);
}

#[test]
fn open_transaction_locks_out_other_handles() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    let mut holder = SqliteStore::open(&path).unwrap();
    holder.seed(&default_catalog(), &sample_roster()).unwrap();
    let other = SqliteStore::open(&path).unwrap();
    other.connection().busy_timeout(Duration::ZERO).unwrap();
    let mut other = Ledger::with_clock(other, stepping_clock());

    let blocked = holder
        .transaction(|tx| {
            assert!(tx.instrument("Violin-001")?.is_some());
            Ok(other.checkout(violin("Violin-001")))
        })
        .unwrap();

    assert_eq!(blocked.unwrap_err().kind(), ErrorKind::Storage);
    assert_eq!(open_loans_for(&holder, "Violin-001"), 0);

    other.checkout(violin("Violin-001")).unwrap();
    assert_eq!(open_loans_for(&holder, "Violin-001"), 1);
}

#[test]
fn store_search_and_record_matching_agree_on_non_ascii_names() {
    let mut ledger = ledger();
    ledger
        .checkout(request("Zoë Ödegaard", "Adult Choir", "Violin", "Violin-001"))
        .unwrap();
    let all = ledger.history(None).unwrap();

    for needle in ["Ödegaard", "ödegaard", "ZOë", "ZOË"] {
        let found = ledger.history(Some(needle)).unwrap();
        let expected: Vec<_> = all.iter().filter(|l| l.matches(needle)).cloned().collect();
        assert_eq!(found, expected, "search {needle:?}");
    }
    assert_eq!(ledger.history(Some("ödegaard")).unwrap().len(), 0);
    assert_eq!(ledger.history(Some("ZOë")).unwrap().len(), 1);
}
