use crate::server::db::{Database, PropertyRecord};

fn mock_property(resource: u64, field: &str, value: &str) -> PropertyRecord {
    PropertyRecord {
        resource,
        field: field.to_string(),
        value: value.to_string(),
    }
}

pub fn run_property_tests(db: &Database) {
    let fields = vec!["access:level".to_string(), "access:start".to_string()];

    db.with_transaction(|tx| {
        let props = vec![
            mock_property(1, "access:level", "free"),
            mock_property(1, "access:start", "2024-03-01"),
            mock_property(2, "access:level", "protected"),
            mock_property(3, "dcterms:title", "unrelated"),
        ];
        let count = tx.insert_properties(&props)?;
        assert_eq!(count, 4);

        let rets = tx.list_properties(&fields)?;
        assert_eq!(rets.len(), 3);
        assert_eq!(rets[0], props[0]);
        assert_eq!(rets[1], props[1]);
        assert_eq!(rets[2], props[2]);

        // Re-inserting replaces the value in place
        let count = tx.insert_properties(&[mock_property(2, "access:level", "reserved")])?;
        assert_eq!(count, 1);
        let rets = tx.list_properties(&fields)?;
        assert_eq!(rets.len(), 3);
        assert_eq!(rets[2].value, "reserved");

        // Deleting the designated fields leaves other fields alone
        let count = tx.delete_properties(&fields)?;
        assert_eq!(count, 3);
        assert!(tx.list_properties(&fields)?.is_empty());
        let rets = tx.list_properties(&["dcterms:title".to_string()])?;
        assert_eq!(rets.len(), 1);

        // Empty inputs are no-ops
        assert_eq!(tx.insert_properties(&[])?, 0);
        assert_eq!(tx.delete_properties(&[])?, 0);
        assert!(tx.list_properties(&[])?.is_empty());

        tx.delete_properties(&["dcterms:title".to_string()])?;
        Ok(())
    })
    .unwrap();
}
