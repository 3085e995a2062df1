mod property;
mod status;

use super::Database;

pub fn run_all_tests(db: &Database) {
    resource::run_resource_tests(db);

    status::run_status_tests(db);
    status::run_backfill_tests(db);
    status::run_cascade_tests(db);
    status::run_sweep_tests(db);

    grant::run_grant_tests(db);
    grant::run_find_grant_tests(db);

    property::run_property_tests(db);
}

#[test]
fn test_sqlite() {
    let db = Database::new_test();
    run_all_tests(&db);
}
