use district_pulse::aggregate::build_features;
use district_pulse::anomaly::score_districts;
use district_pulse::config::Config;
use district_pulse::loader::load_dataset;
use district_pulse::{PulseError, PulseService, ReferenceTables};
use std::fs;
use std::path::Path;
use std::sync::Arc;
use tempfile::TempDir;

fn write(dir: &Path, folder: &str, file: &str, content: &str) {
    let d = dir.join(folder);
    fs::create_dir_all(&d).unwrap();
    fs::write(d.join(file), content).unwrap();
}

fn config_for(dir: &Path) -> Config {
    Config {
        data_dir: dir.to_path_buf(),
        ..Config::default()
    }
}

/// One file per category, two regions, one misspelt region and one
/// historical district name.
fn small_fixture() -> TempDir {
    let dir = TempDir::new().unwrap();
    write(
        dir.path(),
        "api_data_aadhar_enrolment",
        "part1.csv",
        "date,state,district,pincode,age_0_5,age_5_17,age_18_greater\n\
         01-03-2025,Westbengal,Midnapore,721101,5,2,1\n\
         01-03-2025,West Bengal,Howrah,711101,3,x,4\n\
         02-03-2025,Odisha,Cuttack,753001,1,1,1\n\
         02-03-2025,123456,Cuttack,753001,9,9,9\n",
    );
    write(
        dir.path(),
        "api_data_aadhar_demographic",
        "part1.csv",
        "date,state,district,pincode,demo_age_5_17,demo_age_17_\n\
         01-03-2025,westbengal,MIDNAPORE *,721101,10,20\n\
         02-03-2025,West Bengal,Paschim Medinipur,721101,5,5\n\
         01-03-2025,Odisha,Cuttack,753001,7,3\n",
    );
    write(
        dir.path(),
        "api_data_aadhar_biometric",
        "part1.csv",
        "date,state,district,pincode,bio_age_5_17,bio_age_17_\n\
         01-03-2025,West Bengal,Midnapore,721101,4,4\n\
         01-03-2025,Odisha,Puri,752001,6,1\n",
    );
    dir
}

#[test]
fn typos_are_replaced_by_canonical_names_end_to_end() {
    let dir = small_fixture();
    let reference = ReferenceTables::embedded().unwrap();
    let dataset = load_dataset(&config_for(dir.path()), &reference).unwrap();

    for table in [&dataset.enrolment, &dataset.demographic, &dataset.biometric] {
        for r in &table.records {
            assert_ne!(r.region, "Westbengal");
            assert!(r.region == "West Bengal" || r.region == "Odisha", "{}", r.region);
            let district = r.district.as_deref().unwrap();
            assert!(!district.contains("Midnapore"), "{district}");
        }
    }
    let wb: Vec<_> = dataset
        .enrolment
        .records
        .iter()
        .filter(|r| r.region == "West Bengal")
        .map(|r| r.district.clone().unwrap())
        .collect();
    assert_eq!(wb, vec!["Paschim Medinipur", "Howrah"]);

    // The numeric region row is gone; the non-numeric bracket counts as zero.
    assert_eq!(dataset.enrolment.len(), 3);
    assert_eq!(dataset.enrolment.report.dropped_numeric_region, 1);
    assert_eq!(dataset.enrolment.records[1].total, 7.0);
    assert_eq!(dataset.enrolment.records[0].total, 8.0);
}

#[test]
fn variants_merge_into_one_feature_row() {
    let dir = small_fixture();
    let reference = ReferenceTables::embedded().unwrap();
    let dataset = load_dataset(&config_for(dir.path()), &reference).unwrap();
    let features = build_features(&dataset.demographic, &dataset.biometric);

    let names: Vec<(&str, &str)> = features
        .iter()
        .map(|f| (f.region.as_str(), f.district.as_str()))
        .collect();
    assert_eq!(
        names,
        vec![
            ("Odisha", "Cuttack"),
            ("Odisha", "Puri"),
            ("West Bengal", "Paschim Medinipur"),
        ]
    );

    let medinipur = &features[2];
    assert_eq!(medinipur.demographic.records, 2);
    assert_eq!(medinipur.demographic.sum, 40.0);
    assert_eq!(medinipur.biometric.sum, 8.0);
    assert_eq!(medinipur.total_load, 48.0);

    let puri = &features[1];
    assert_eq!(puri.demographic.sum, 0.0);
    assert_eq!(puri.demographic.records, 0);
    assert_eq!(puri.total_load, 7.0);

    // Three districts is below the scoring floor: nothing flagged, no error.
    let report = score_districts(&features, &Config::default().scoring).unwrap();
    assert_eq!(report.districts.len(), 3);
    assert!(report.high_risk.is_empty());
}

#[test]
fn build_is_shared_until_rebuild() {
    let dir = small_fixture();
    let service = PulseService::new(config_for(dir.path()), ReferenceTables::embedded().unwrap());
    assert!(service.dataset().is_none());

    let first = service.build().unwrap();
    let again = service.build().unwrap();
    assert!(Arc::ptr_eq(&first, &again));
    let scores = service.scores().unwrap();
    assert!(Arc::ptr_eq(&scores, &service.scores().unwrap()));

    write(
        dir.path(),
        "api_data_aadhar_biometric",
        "part2.csv",
        "date,state,district,pincode,bio_age_5_17,bio_age_17_\n\
         03-03-2025,Odisha,Khordha,751001,2,2\n",
    );
    let rebuilt = service.rebuild().unwrap();
    assert!(!Arc::ptr_eq(&first, &rebuilt));
    assert_eq!(rebuilt.biometric.len(), 3);
    let rescored = service.scores().unwrap();
    assert!(!Arc::ptr_eq(&scores, &rescored));
    assert_eq!(rescored.districts.len(), 4);
}

#[test]
fn concurrent_callers_share_one_build() {
    let dir = small_fixture();
    let service = Arc::new(PulseService::new(
        config_for(dir.path()),
        ReferenceTables::embedded().unwrap(),
    ));
    let handles: Vec<_> = (0..4)
        .map(|_| {
            let service = Arc::clone(&service);
            std::thread::spawn(move || service.build().unwrap())
        })
        .collect();
    let built: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();
    for b in &built[1..] {
        assert!(Arc::ptr_eq(&built[0], b));
    }
}

#[test]
fn empty_data_dir_is_fatal_and_retryable() {
    let dir = TempDir::new().unwrap();
    let service = PulseService::new(config_for(dir.path()), ReferenceTables::embedded().unwrap());
    assert!(matches!(service.build(), Err(PulseError::EmptyDataset(_))));
    assert!(service.dataset().is_none());

    let fixture = small_fixture();
    for folder in ["api_data_aadhar_demographic", "api_data_aadhar_biometric"] {
        let src = fixture.path().join(folder).join("part1.csv");
        write(dir.path(), folder, "part1.csv", &fs::read_to_string(src).unwrap());
    }
    let dataset = service.build().unwrap();
    assert!(dataset.enrolment.is_empty());
    assert_eq!(dataset.demographic.len(), 3);
}

#[test]
fn structural_break_surfaces_as_error() {
    let dir = small_fixture();
    write(
        dir.path(),
        "api_data_aadhar_enrolment",
        "part1.csv",
        "date,state,district,age_0_5\n01-03-2025,Odisha,Puri,1\n",
    );
    let service = PulseService::new(config_for(dir.path()), ReferenceTables::embedded().unwrap());
    assert!(matches!(
        service.build(),
        Err(PulseError::MissingColumns { .. })
    ));
}

#[test]
fn queries_over_the_built_dataset() {
    let dir = small_fixture();
    let service = PulseService::new(config_for(dir.path()), ReferenceTables::embedded().unwrap());

    assert_eq!(service.regions().unwrap(), vec!["Odisha", "West Bengal"]);
    assert_eq!(service.districts_in("Odisha").unwrap(), vec!["Cuttack"]);

    let stats = service.district_stats("Paschim Medinipur").unwrap();
    assert_eq!(stats.len(), 1);
    assert_eq!(stats[0].features.total_load, 48.0);

    let plan = service.recommend("West Bengal", "Paschim Medinipur", 0.25).unwrap();
    assert_eq!(plan.projected_monthly_load, 60);
    assert_eq!(plan.kits_required, 1);

    assert!(matches!(
        service.recommend("Odisha", "Nowhere", 0.1),
        Err(PulseError::UnknownDistrict { .. })
    ));
    assert!(matches!(
        service.recommend("Odisha", "Puri", -0.5),
        Err(PulseError::InvalidGrowth(_))
    ));
}

#[test]
fn custom_reference_tables_from_config() {
    let dir = small_fixture();
    let ref_path = dir.path().join("tables.toml");
    fs::write(
        &ref_path,
        r#"
        version = "test"
        valid_regions = ["Odisha"]
        [district_corrections]
        "Puri" = "Puri Sadar"
        "#,
    )
    .unwrap();
    let config = Config {
        reference: Some(ref_path),
        ..config_for(dir.path())
    };
    let service = PulseService::from_config(config).unwrap();
    assert_eq!(service.reference().version, "test");
    let dataset = service.build().unwrap();
    assert!(dataset.demographic.records.iter().all(|r| r.region == "Odisha"));
    assert_eq!(
        dataset.biometric.records[0].district.as_deref(),
        Some("Puri Sadar")
    );
    // "Westbengal" is not on this whitelist at all.
    assert_eq!(dataset.demographic.report.dropped_unrecognized_region, 2);
}
