use tally_testkit::{load_records_csv, record, write_records_csv};
use tempfile::TempDir;

#[test]
fn scenario_record_set_survives_csv_roundtrip() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("psp.csv");

    let records = vec![
        record("REF-001").build(),
        record("REF-002")
            .currency("USD")
            .fx_rate(Some(1.0843))
            .amounts(250.0, 5.25, 244.75)
            .build(),
    ];
    write_records_csv(&path, &records).unwrap();

    let loaded = load_records_csv(&path).unwrap();
    assert_eq!(loaded.len(), 2);
    assert_eq!(loaded[0], records[0]);
    assert_eq!(loaded[1], records[1]);
    // An absent fx rate stays absent, not zero.
    assert_eq!(loaded[0].fx_rate, None);
    assert_eq!(loaded[1].fx_rate, Some(1.0843));
}
