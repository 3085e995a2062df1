use crate::server::db::{
    Database, DatePolicy, LevelPolicy, StatusRecord, SweepPattern, WriteScope,
};
use crate::types::level::AccessLevel;
use crate::types::resource::ResourceKind;

use super::resource::mock_resource;

fn mock_status(
    resource: u64,
    level: AccessLevel,
    start: Option<u64>,
    end: Option<u64>,
) -> StatusRecord {
    StatusRecord {
        resource,
        level,
        embargo_start: start,
        embargo_end: end,
        update_time: 0,
    }
}

pub fn run_status_tests(db: &Database) {
    let resource = db
        .with_transaction(|tx| {
            tx.create_resource(mock_resource(ResourceKind::Item, None, true, "Alice"))
        })
        .unwrap();

    db.with_transaction(|tx| {
        assert!(tx.get_status(resource.id)?.is_none());

        tx.upsert_status(mock_status(
            resource.id,
            AccessLevel::Reserved,
            Some(100),
            None,
        ))?;
        let ret = tx.get_status(resource.id)?.unwrap();
        assert_eq!(ret.level, AccessLevel::Reserved);
        assert_eq!(ret.embargo_start, Some(100));
        assert_eq!(ret.embargo_end, None);

        // Upsert replaces in place, one row per resource
        tx.upsert_status(mock_status(resource.id, AccessLevel::Forbidden, None, Some(200)))?;
        let ret = tx.get_status(resource.id)?.unwrap();
        assert_eq!(ret.level, AccessLevel::Forbidden);
        assert_eq!(ret.embargo_start, None);
        assert_eq!(ret.embargo_end, Some(200));
        assert_eq!(tx.count_statuses()?, 1);

        let page = tx.list_statuses(10, 0)?;
        assert_eq!(page.len(), 1);
        assert_eq!(page[0].resource, resource.id);

        tx.delete_status(resource.id)?;
        assert!(tx.get_status(resource.id)?.is_none());
        assert_eq!(tx.count_statuses()?, 0);

        Ok(())
    })
    .unwrap();

    // Deleting the resource removes the status row with it
    db.with_transaction(|tx| {
        tx.upsert_status(mock_status(resource.id, AccessLevel::Free, None, None))?;
        tx.delete_resource(resource.id)?;
        assert!(tx.get_status(resource.id)?.is_none());
        assert_eq!(tx.count_statuses()?, 0);
        Ok(())
    })
    .unwrap();
}

pub fn run_backfill_tests(db: &Database) {
    let (public1, public2, private) = db
        .with_transaction(|tx| {
            let public1 =
                tx.create_resource(mock_resource(ResourceKind::Item, None, true, "Alice"))?;
            let public2 =
                tx.create_resource(mock_resource(ResourceKind::Part, None, true, "Alice"))?;
            let private =
                tx.create_resource(mock_resource(ResourceKind::Item, None, false, "Bob"))?;

            // One of them already has a status, backfill must not touch it
            tx.upsert_status(mock_status(public2.id, AccessLevel::Protected, None, None))?;
            Ok((public1, public2, private))
        })
        .unwrap();

    db.with_transaction(|tx| {
        let created = tx.backfill_statuses(AccessLevel::Free, AccessLevel::Forbidden)?;
        assert_eq!(created, 2);

        let ret = tx.get_status(public1.id)?.unwrap();
        assert_eq!(ret.level, AccessLevel::Free);
        let ret = tx.get_status(private.id)?.unwrap();
        assert_eq!(ret.level, AccessLevel::Forbidden);
        let ret = tx.get_status(public2.id)?.unwrap();
        assert_eq!(ret.level, AccessLevel::Protected);

        // Second run is a no-op
        let created = tx.backfill_statuses(AccessLevel::Free, AccessLevel::Forbidden)?;
        assert_eq!(created, 0);

        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        for id in [public1.id, public2.id, private.id] {
            tx.delete_resource(id)?;
        }
        Ok(())
    })
    .unwrap();
}

pub fn run_cascade_tests(db: &Database) {
    // collection -> {item1 (public, Alice), item2 (private, Bob)}
    // item1 -> {part1 (public, Alice), part2 (private, Bob)}
    // item2 -> {part3 (public, Alice)}
    // outside: other collection with its own item
    let ids = db
        .with_transaction(|tx| {
            let collection =
                tx.create_resource(mock_resource(ResourceKind::Collection, None, true, "Alice"))?;
            let item1 = tx.create_resource(mock_resource(
                ResourceKind::Item,
                Some(collection.id),
                true,
                "Alice",
            ))?;
            let item2 = tx.create_resource(mock_resource(
                ResourceKind::Item,
                Some(collection.id),
                false,
                "Bob",
            ))?;
            let part1 = tx.create_resource(mock_resource(
                ResourceKind::Part,
                Some(item1.id),
                true,
                "Alice",
            ))?;
            let part2 = tx.create_resource(mock_resource(
                ResourceKind::Part,
                Some(item1.id),
                false,
                "Bob",
            ))?;
            let part3 = tx.create_resource(mock_resource(
                ResourceKind::Part,
                Some(item2.id),
                true,
                "Alice",
            ))?;

            let outside =
                tx.create_resource(mock_resource(ResourceKind::Collection, None, true, "Alice"))?;
            let outside_item = tx.create_resource(mock_resource(
                ResourceKind::Item,
                Some(outside.id),
                true,
                "Alice",
            ))?;

            Ok((
                collection.id,
                item1.id,
                item2.id,
                part1.id,
                part2.id,
                part3.id,
                outside.id,
                outside_item.id,
            ))
        })
        .unwrap();
    let (collection, item1, item2, part1, part2, part3, outside, outside_item) = ids;

    let source = mock_status(collection, AccessLevel::Protected, Some(100), Some(200));

    // Blanket scope reaches the whole subtree and nothing else
    db.with_transaction(|tx| {
        let count = tx.cascade_children(collection, &source, &WriteScope::All)?;
        assert_eq!(count, 2);
        let count = tx.cascade_grandchildren(collection, &source, &WriteScope::All)?;
        assert_eq!(count, 3);

        for id in [item1, item2, part1, part2, part3] {
            let ret = tx.get_status(id)?.unwrap();
            assert_eq!(ret.level, AccessLevel::Protected);
            assert_eq!(ret.embargo_start, Some(100));
            assert_eq!(ret.embargo_end, Some(200));
        }
        assert!(tx.get_status(outside)?.is_none());
        assert!(tx.get_status(outside_item)?.is_none());

        Ok(())
    })
    .unwrap();

    // Restricted scope only touches public or owned descendants
    let source = mock_status(collection, AccessLevel::Free, None, None);
    db.with_transaction(|tx| {
        let scope = WriteScope::OwnedOrPublic("Alice".to_string());
        let count = tx.cascade_children(collection, &source, &scope)?;
        assert_eq!(count, 1);
        let count = tx.cascade_grandchildren(collection, &source, &scope)?;
        assert_eq!(count, 2);

        // item1 is public, part1/part3 are public: updated
        for id in [item1, part1, part3] {
            let ret = tx.get_status(id)?.unwrap();
            assert_eq!(ret.level, AccessLevel::Free);
        }
        // item2 and part2 are Bob's private records: untouched
        for id in [item2, part2] {
            let ret = tx.get_status(id)?.unwrap();
            assert_eq!(ret.level, AccessLevel::Protected);
        }

        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        for id in [part1, part2, part3, item1, item2, collection, outside_item, outside] {
            tx.delete_resource(id)?;
        }
        Ok(())
    })
    .unwrap();
}

pub fn run_sweep_tests(db: &Database) {
    let now = 200;

    let ids = db
        .with_transaction(|tx| {
            let mut ids = vec![];
            for _ in 0..5 {
                let resource =
                    tx.create_resource(mock_resource(ResourceKind::Part, None, true, "Alice"))?;
                ids.push(resource.id);
            }

            tx.upsert_status(mock_status(ids[0], AccessLevel::Protected, Some(100), None))?;
            tx.upsert_status(mock_status(ids[1], AccessLevel::Forbidden, None, Some(150)))?;
            tx.upsert_status(mock_status(ids[2], AccessLevel::Reserved, Some(50), Some(150)))?;
            // Still inside its window, must not be touched
            tx.upsert_status(mock_status(ids[3], AccessLevel::Protected, Some(100), Some(300)))?;
            // No embargo at all, must not be touched
            tx.upsert_status(mock_status(ids[4], AccessLevel::Protected, None, None))?;

            Ok(ids)
        })
        .unwrap();

    db.with_transaction(|tx| {
        let mut total = 0;
        for pattern in SweepPattern::ALL {
            total += tx.sweep_statuses(pattern, LevelPolicy::Under, DatePolicy::Clear, now)?;
        }
        assert_eq!(total, 3);

        // Stepped down one rank, dates cleared
        let ret = tx.get_status(ids[0])?.unwrap();
        assert_eq!(ret.level, AccessLevel::Reserved);
        assert_eq!(ret.embargo_start, None);
        let ret = tx.get_status(ids[1])?.unwrap();
        assert_eq!(ret.level, AccessLevel::Reserved);
        assert_eq!(ret.embargo_end, None);
        let ret = tx.get_status(ids[2])?.unwrap();
        assert_eq!(ret.level, AccessLevel::Free);
        assert_eq!(ret.embargo_start, None);
        assert_eq!(ret.embargo_end, None);

        // Untouched rows
        let ret = tx.get_status(ids[3])?.unwrap();
        assert_eq!(ret.level, AccessLevel::Protected);
        assert_eq!(ret.embargo_start, Some(100));
        assert_eq!(ret.embargo_end, Some(300));
        let ret = tx.get_status(ids[4])?.unwrap();
        assert_eq!(ret.level, AccessLevel::Protected);

        Ok(())
    })
    .unwrap();

    // End-only pattern is strict: a row ending exactly now stays
    db.with_transaction(|tx| {
        tx.upsert_status(mock_status(ids[4], AccessLevel::Protected, None, Some(now)))?;
        let count =
            tx.sweep_statuses(SweepPattern::EndOnly, LevelPolicy::Free, DatePolicy::Clear, now)?;
        assert_eq!(count, 0);

        let count = tx.sweep_statuses(
            SweepPattern::EndOnly,
            LevelPolicy::Free,
            DatePolicy::Keep,
            now + 1,
        )?;
        assert_eq!(count, 1);
        let ret = tx.get_status(ids[4])?.unwrap();
        assert_eq!(ret.level, AccessLevel::Free);
        assert_eq!(ret.embargo_end, Some(now));

        // keep + keep is a no-op by definition
        let count = tx.sweep_statuses(
            SweepPattern::EndOnly,
            LevelPolicy::Keep,
            DatePolicy::Keep,
            now + 1,
        )?;
        assert_eq!(count, 0);

        Ok(())
    })
    .unwrap();

    db.with_transaction(|tx| {
        for id in ids {
            tx.delete_resource(id)?;
        }
        Ok(())
    })
    .unwrap();
}
