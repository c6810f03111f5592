use asset_ledger_core::analysis::identity::compare;
use asset_ledger_core::directory::StaticDirectory;
use asset_ledger_core::model::{
    AssetStatus, AssetUpdate, AuditAction, CustomField, CustomFieldType, DepreciationMethod,
    DiscoveredRecord,
    DiscoverySource, NewAsset, NewLicense, Passthrough, PurchaseInfo,
};
use asset_ledger_core::storage::{Database, InventoryStore};
use asset_ledger_core::{EntityKind, ErrorKind, FixedClock, Inventory, ReconcileEngine, ReconcileOptions, SilentReporter};
use chrono::{DateTime, Duration, TimeZone, Utc};

fn now() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2026, 3, 2, 9, 30, 0).unwrap()
}

fn make_inventory() -> Inventory<Database> {
    let db = Database::open_in_memory().unwrap();
    Inventory::new(db).with_clock(FixedClock::new(now()))
}

fn laptop(serial: &str) -> NewAsset {
    NewAsset {
        serial_number: Some(serial.to_string()),
        name: "Dell Latitude 5540".to_string(),
        manufacturer: Some("Dell".to_string()),
        ..Default::default()
    }
}

// ── Assets ───────────────────────────────────────────────────

#[test]
fn test_create_and_reload_asset() {
    let inventory = make_inventory();
    let created = inventory.create_asset(laptop("SN-1"), "admin").unwrap();

    let loaded = inventory.asset(&created.id).unwrap();
    assert_eq!(loaded, created);
    assert_eq!(loaded.status, AssetStatus::InStock);
    assert_eq!(inventory.store().count_assets().unwrap(), 1);

    let trail = inventory.audit_trail(EntityKind::Asset, &created.id).unwrap();
    assert_eq!(trail.len(), 1);
    assert_eq!(trail[0].action, AuditAction::Create);
    assert_eq!(trail[0].actor, "admin");
}

#[test]
fn test_create_rejects_case_insensitive_serial_duplicate() {
    let inventory = make_inventory();
    inventory.create_asset(laptop("abc-123"), "admin").unwrap();

    let err = inventory.create_asset(laptop("ABC-123"), "admin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(inventory.store().count_assets().unwrap(), 1);
}

#[test]
fn test_missing_asset_is_not_found() {
    let inventory = make_inventory();
    let err = inventory.assign_asset("nope", "alice", "admin", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::NotFound);
    assert_eq!(err.to_string(), "Asset not found");
}

#[test]
fn test_archived_asset_rejects_assignment() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-2"), "admin").unwrap();
    let archived = inventory
        .archive_asset(&asset.id, "admin", Some("end of life"))
        .unwrap();
    assert!(archived.is_archived);
    assert_eq!(archived.status, AssetStatus::Retired);

    let err = inventory
        .assign_asset(&asset.id, "alice", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(err.to_string(), "Cannot assign archived asset");

    let stored = inventory.asset(&asset.id).unwrap();
    assert!(stored.assigned_to.is_none());
    assert!(stored.assignment_history.is_empty());
}

#[test]
fn test_archive_twice_conflicts() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-3"), "admin").unwrap();
    inventory.archive_asset(&asset.id, "admin", None).unwrap();
    let err = inventory.archive_asset(&asset.id, "admin", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
}

#[test]
fn test_assign_return_cycle_keeps_history() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-4"), "admin").unwrap();

    let assigned = inventory
        .assign_asset(&asset.id, "alice", "admin", Some("onboarding"))
        .unwrap();
    assert_eq!(assigned.assigned_to.as_deref(), Some("alice"));
    assert_eq!(assigned.status, AssetStatus::Active);

    let err = inventory
        .assign_asset(&asset.id, "bob", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let returned = inventory.return_asset(&asset.id, "admin", Some("left")).unwrap();
    assert!(returned.assigned_to.is_none());
    assert_eq!(returned.status, AssetStatus::InStock);
    assert_eq!(returned.assignment_history.len(), 1);
    assert_eq!(returned.assignment_history[0].returned_date, Some(now()));

    inventory.assign_asset(&asset.id, "bob", "admin", None).unwrap();
    let stored = inventory.asset(&asset.id).unwrap();
    assert_eq!(stored.assignment_history.len(), 2);
    assert_eq!(stored.open_assignment().unwrap().user_id, "bob");

    let actions: Vec<AuditAction> = inventory
        .audit_trail(EntityKind::Asset, &asset.id)
        .unwrap()
        .into_iter()
        .map(|e| e.action)
        .collect();
    assert_eq!(
        actions,
        vec![AuditAction::Create, AuditAction::Assign, AuditAction::Return, AuditAction::Assign]
    );
}

#[test]
fn test_return_unassigned_asset_is_state_error() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-5"), "admin").unwrap();
    let err = inventory.return_asset(&asset.id, "admin", None).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);
}

#[test]
fn test_unknown_user_rejected_by_directory() {
    let db = Database::open_in_memory().unwrap();
    let inventory = Inventory::new(db)
        .with_clock(FixedClock::new(now()))
        .with_users(StaticDirectory::new(["alice"]));
    let asset = inventory.create_asset(laptop("SN-6"), "admin").unwrap();

    let err = inventory
        .assign_asset(&asset.id, "mallory", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
    inventory.assign_asset(&asset.id, "alice", "admin", None).unwrap();
}

#[test]
fn test_transfer_and_custom_fields() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-7"), "admin").unwrap();

    inventory.transfer_asset(&asset.id, "hq-3", "admin").unwrap();
    let moved = inventory.transfer_asset(&asset.id, "branch-1", "admin").unwrap();
    assert_eq!(moved.location_id.as_deref(), Some("branch-1"));
    assert_eq!(moved.location_history.len(), 2);
    assert_eq!(moved.location_history[1].from.as_deref(), Some("hq-3"));

    let field = CustomField {
        value: "16".to_string(),
        field_type: CustomFieldType::Number,
    };
    let updated = inventory
        .set_custom_field(&asset.id, "ram_gb", field, "admin")
        .unwrap();
    assert!(updated.custom_fields.contains_key("ram_gb"));

    let bad = CustomField {
        value: "sixteen".to_string(),
        field_type: CustomFieldType::Number,
    };
    let err = inventory
        .set_custom_field(&asset.id, "ram_gb", bad, "admin")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);

    let removed = inventory.remove_custom_field(&asset.id, "ram_gb", "admin").unwrap();
    assert!(removed.custom_fields.is_empty());
    let err = inventory
        .remove_custom_field(&asset.id, "ram_gb", "admin")
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_restore_returns_asset_to_stock() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-8"), "admin").unwrap();

    let err = inventory.restore_asset(&asset.id, "admin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    inventory.archive_asset(&asset.id, "admin", None).unwrap();
    let restored = inventory.restore_asset(&asset.id, "admin").unwrap();
    assert!(!restored.is_archived);
    assert_eq!(restored.status, AssetStatus::InStock);
    inventory.assign_asset(&asset.id, "alice", "admin", None).unwrap();
}

#[test]
fn test_update_rejects_active_status() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-9"), "admin").unwrap();

    let mut update = AssetUpdate::new(&asset.id);
    update.status = Some(AssetStatus::Active);
    let err = inventory.update_asset(&update, "admin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    update.status = Some(AssetStatus::Repair);
    update.name = Some("Latitude (keyboard)".to_string());
    let updated = inventory.update_asset(&update, "admin").unwrap();
    assert_eq!(updated.status, AssetStatus::Repair);
    assert_eq!(updated.name, "Latitude (keyboard)");
}

#[test]
fn test_update_to_taken_serial_conflicts() {
    let inventory = make_inventory();
    inventory.create_asset(laptop("TAKEN"), "admin").unwrap();
    let other = inventory.create_asset(laptop("FREE"), "admin").unwrap();

    let mut update = AssetUpdate::new(&other.id);
    update.serial_number = Some("taken".to_string());
    let err = inventory.update_asset(&update, "admin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(inventory.asset(&other.id).unwrap().serial_number.as_deref(), Some("FREE"));
}

#[test]
fn test_stale_version_is_rejected() {
    let inventory = make_inventory();
    let asset = inventory.create_asset(laptop("SN-10"), "admin").unwrap();

    let mut first = inventory.asset(&asset.id).unwrap();
    let mut second = inventory.asset(&asset.id).unwrap();

    first.name = "First writer".to_string();
    inventory.store().update_asset(&mut first, &[]).unwrap();
    assert_eq!(first.version, asset.version + 1);

    second.name = "Second writer".to_string();
    let err = inventory.store().update_asset(&mut second, &[]).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);
    assert_eq!(inventory.asset(&asset.id).unwrap().name, "First writer");
}

#[test]
fn test_depreciation_through_inventory() {
    let inventory = make_inventory();
    let mut new = laptop("SN-11");
    new.purchase = Some(PurchaseInfo {
        purchase_date: now() - Duration::days(730),
        purchase_price: 1000.0,
        salvage_value: 100.0,
        useful_life_years: 5,
        method: DepreciationMethod::StraightLine,
    });
    let asset = inventory.create_asset(new, "admin").unwrap();
    let schedule = inventory.depreciation(&asset.id).unwrap();
    assert!((schedule.depreciation_per_year - 180.0).abs() < 1e-9);
    assert!(schedule.current_value < 1000.0);
    assert!(schedule.current_value > 100.0);

    let bare = inventory.create_asset(laptop("SN-12"), "admin").unwrap();
    let err = inventory.depreciation(&bare.id).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

fn sighting(external_id: &str, serial: &str) -> DiscoveredRecord {
    DiscoveredRecord {
        source_id: "intune".to_string(),
        source: DiscoverySource::Mdm {
            provider: "intune".to_string(),
        },
        external_id: external_id.to_string(),
        name: "Dell Latitude 5540".to_string(),
        serial_number: Some(serial.to_string()),
        manufacturer: Some("Dell".to_string()),
        model: None,
        last_seen: now() - Duration::hours(2),
        metadata: Passthrough::new(),
    }
}

#[test]
fn test_record_sightings_from_reconciliation() {
    let inventory = make_inventory();
    let seen = inventory.create_asset(laptop("SEEN"), "admin").unwrap();
    let archived = inventory.create_asset(laptop("GONE"), "admin").unwrap();
    inventory.archive_asset(&archived.id, "admin", None).unwrap();

    let discovered = vec![sighting("dev-1", "seen"), sighting("dev-2", "gone")];

    let engine = ReconcileEngine::new(ReconcileOptions::new(30));
    let report = engine
        .run_against_store(inventory.store(), &discovered, now(), &SilentReporter)
        .unwrap();
    // archived assets are left out of the snapshot
    assert_eq!(report.outcome.matches.len(), 1);
    assert_eq!(report.outcome.unmatched, vec!["dev-2".to_string()]);

    let result = inventory.record_sightings(&report.outcome.matches, &discovered);
    assert_eq!(result.success, 1);
    assert_eq!(result.failed, 0);
    assert_eq!(result.items, vec![seen.id.clone()]);
    assert_eq!(
        inventory.asset(&seen.id).unwrap().last_seen_in_discovery,
        Some(now() - Duration::hours(2))
    );
    assert!(inventory.asset(&archived.id).unwrap().last_seen_in_discovery.is_none());

    // a second pass with the same sightings writes nothing
    let again = inventory.record_sightings(&report.outcome.matches, &discovered);
    assert_eq!(again.success, 0);
    assert_eq!(again.failed, 0);
}

#[test]
fn test_record_sightings_keeps_going_past_failures() {
    let inventory = make_inventory();
    let first = inventory.create_asset(laptop("ONE"), "admin").unwrap();
    let second = inventory.create_asset(laptop("TWO"), "admin").unwrap();

    let discovered = vec![
        sighting("dev-1", "one"),
        sighting("dev-2", "two"),
        sighting("dev-3", "three"),
    ];
    let mut ghost = compare(&discovered[2], &first);
    ghost.asset_id = "0-deleted".to_string();
    let matches = vec![
        compare(&discovered[0], &first),
        ghost,
        compare(&discovered[1], &second),
    ];

    let result = inventory.record_sightings(&matches, &discovered);
    assert_eq!(result.success, 2);
    assert_eq!(result.failed, 1);
    assert_eq!(result.errors[0].item, "0-deleted");
    assert_eq!(result.errors[0].error.kind(), ErrorKind::NotFound);
    assert!(inventory.asset(&first.id).unwrap().last_seen_in_discovery.is_some());
    assert!(inventory.asset(&second.id).unwrap().last_seen_in_discovery.is_some());
}

#[test]
fn test_archived_assets_are_not_orphans() {
    let inventory = make_inventory();
    let live = inventory.create_asset(laptop("LIVE"), "admin").unwrap();
    let retired = inventory.create_asset(laptop("RETIRED"), "admin").unwrap();
    inventory.archive_asset(&retired.id, "admin", Some("disposed")).unwrap();

    let engine = ReconcileEngine::new(ReconcileOptions::new(30));
    let report = engine
        .run_against_store(inventory.store(), &[], now(), &SilentReporter)
        .unwrap();

    let orphan_ids: Vec<&str> = report
        .outcome
        .orphaned
        .iter()
        .map(|o| o.asset_id.as_str())
        .collect();
    assert_eq!(orphan_ids, vec![live.id.as_str()]);
}

// ── Licenses ─────────────────────────────────────────────────

fn office(seats: u32) -> NewLicense {
    NewLicense {
        name: "Office 365 E3".to_string(),
        vendor: Some("Microsoft".to_string()),
        total_seats: seats,
        purchase_cost: 100.0 * seats as f64,
        ..Default::default()
    }
}

#[test]
fn test_license_seat_flow() {
    let inventory = make_inventory();
    let license = inventory.create_license(office(2), "admin").unwrap();
    assert_eq!(license.renewal_notification_days, 30);

    inventory.allocate_seat(&license.id, "alice", "admin", None).unwrap();
    let err = inventory
        .allocate_seat(&license.id, "alice", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let full = inventory.allocate_seat(&license.id, "bob", "admin", None).unwrap();
    assert_eq!(full.available_seats(), 0);

    let err = inventory
        .allocate_seat(&license.id, "carol", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Capacity);

    let released = inventory
        .deallocate_seat(&license.id, "alice", "admin", Some("offboarded"))
        .unwrap();
    assert_eq!(released.used_seats(), 1);
    assert_eq!(released.assignment_history.len(), 2);

    let err = inventory
        .deallocate_seat(&license.id, "alice", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::State);

    let trail = inventory.audit_trail(EntityKind::License, &license.id).unwrap();
    assert_eq!(trail.len(), 4);
    assert_eq!(trail[3].action, AuditAction::Deallocate);
    assert_eq!(trail[3].subject.as_deref(), Some("alice"));
    assert_eq!(trail[3].reason.as_deref(), Some("offboarded"));
}

#[test]
fn test_archived_license_blocks_allocation_but_not_release() {
    let inventory = make_inventory();
    let license = inventory.create_license(office(3), "admin").unwrap();
    inventory.allocate_seat(&license.id, "alice", "admin", None).unwrap();
    inventory.archive_license(&license.id, "admin", Some("contract ended")).unwrap();

    let err = inventory
        .allocate_seat(&license.id, "bob", "admin", None)
        .unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Conflict);

    let released = inventory.deallocate_seat(&license.id, "alice", "admin", None).unwrap();
    assert_eq!(released.used_seats(), 0);

    let restored = inventory.restore_license(&license.id, "admin").unwrap();
    assert!(!restored.is_archived);
}

#[test]
fn test_resize_below_usage_over_allocates() {
    let inventory = make_inventory();
    let license = inventory.create_license(office(3), "admin").unwrap();
    for user in ["alice", "bob", "carol"] {
        inventory.allocate_seat(&license.id, user, "admin", None).unwrap();
    }
    let resized = inventory.resize_license(&license.id, 2, "admin").unwrap();
    assert_eq!(resized.true_up().shortfall, 1);

    let err = inventory.resize_license(&license.id, 0, "admin").unwrap_err();
    assert_eq!(err.kind(), ErrorKind::Validation);
}

#[test]
fn test_configured_renewal_default() {
    let mut config = asset_ledger_core::AppConfig::default();
    config.licensing.default_renewal_notification_days = 60;
    let inventory = make_inventory().with_config(&config);
    let license = inventory.create_license(office(1), "admin").unwrap();
    assert_eq!(license.renewal_notification_days, 60);

    let mut explicit = office(1);
    explicit.renewal_notification_days = Some(7);
    let license = inventory.create_license(explicit, "admin").unwrap();
    assert_eq!(license.renewal_notification_days, 7);
}

#[test]
fn test_on_disk_database_persists() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("ledger.db");

    let id = {
        let db = Database::open(path.to_str().unwrap()).unwrap();
        let inventory = Inventory::new(db).with_clock(FixedClock::new(now()));
        inventory.create_asset(laptop("DISK-1"), "admin").unwrap().id
    };

    let db = Database::open(path.to_str().unwrap()).unwrap();
    let found = db.find_asset_by_serial("disk-1").unwrap().unwrap();
    assert_eq!(found.id, id);
}
