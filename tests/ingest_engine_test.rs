// ==========================================
// IngestEngine 集成测试
// ==========================================
// 测试目标: 哈希去重、类型检测、upsert 替换、
//           历史记录与归档的端到端行为
// ==========================================

mod test_helpers;

use macroclaw::domain::ExportType;
use macroclaw::importer::ImportError;
use macroclaw::{logging, IngestEngine};
use test_helpers::{create_test_store, table_count, write_csv, write_nutrition_csv, write_xlsx};

#[test]
fn test_ingest_csv_nutrition_end_to_end() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let file = write_nutrition_csv(
        dir.path(),
        "daily.csv",
        &[
            vec!["2024-01-01", "Breakfast", "Oatmeal", "300", "10", "50", "6"],
            vec!["2024-01-01", "Lunch", "Chicken Rice", "650", "45", "70", "18"],
        ],
    );

    let report = engine.ingest(&file, None, None).unwrap();
    assert!(!report.skipped);
    assert_eq!(report.export_type, "nutrition");
    assert_eq!(report.rows_imported, 2);
    assert_eq!(report.file_hash.len(), 64);

    assert_eq!(table_count(&store, "nutrition_log"), 2);
    assert_eq!(table_count(&store, "export_history"), 1);

    let conn = store.connection().unwrap();
    let (meal, calories): (String, f64) = conn
        .query_row(
            "SELECT meal, calories FROM nutrition_log WHERE food_name = 'Oatmeal'",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    assert_eq!(meal, "Breakfast");
    assert_eq!(calories, 300.0);
}

#[test]
fn test_reingest_same_content_is_skipped_regardless_of_name() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let rows = vec![vec!["2024-01-01", "Lunch", "Rice", "200", "4", "44", "1"]];
    let first = write_nutrition_csv(dir.path(), "export_a.csv", &rows);
    let second = write_nutrition_csv(dir.path(), "export_b.csv", &rows);

    let r1 = engine.ingest(&first, None, None).unwrap();
    assert!(!r1.skipped);
    assert_eq!(r1.rows_imported, 1);

    // 字节相同、文件名不同: 幂等跳过
    let r2 = engine.ingest(&second, None, None).unwrap();
    assert!(r2.skipped);
    assert_eq!(r2.rows_imported, 0);
    assert_eq!(r2.file_hash, r1.file_hash);

    assert_eq!(table_count(&store, "nutrition_log"), 1);
    assert_eq!(table_count(&store, "export_history"), 1);
}

#[test]
fn test_upsert_replaces_row_on_same_business_key() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let v1 = write_nutrition_csv(
        dir.path(),
        "v1.csv",
        &[vec!["2024-01-01", "Breakfast", "Oatmeal", "300", "10", "50", "6"]],
    );
    let v2 = write_nutrition_csv(
        dir.path(),
        "v2.csv",
        &[vec!["2024-01-01", "Breakfast", "Oatmeal", "310", "10", "52", "6"]],
    );

    engine.ingest(&v1, None, None).unwrap();
    engine.ingest(&v2, None, None).unwrap();

    let conn = store.connection().unwrap();
    let (count, calories): (i64, f64) = conn
        .query_row(
            "SELECT COUNT(*), MAX(calories) FROM nutrition_log",
            [],
            |row| Ok((row.get(0)?, row.get(1)?)),
        )
        .unwrap();
    // 重叠键不产生重复行，后写入者胜
    assert_eq!(count, 1);
    assert_eq!(calories, 310.0);
}

#[test]
fn test_suffixed_and_bare_headers_produce_same_canonical_row() {
    logging::init_test();

    let extract = |headers: &[&str]| {
        let (dir, store) = create_test_store();
        let engine = IngestEngine::new(store.clone());
        let path = dir.path().join("export.csv");
        write_csv(
            &path,
            headers,
            &[vec!["2024-01-01", "Breakfast", "Oatmeal", "300", "10"]],
        );
        let report = engine.ingest(&path, None, None).unwrap();
        assert_eq!(report.export_type, "nutrition");

        let conn = store.connection().unwrap();
        conn.query_row(
            "SELECT date, meal, food_name, calories, protein_g FROM nutrition_log",
            [],
            |row| {
                Ok((
                    row.get::<_, String>(0)?,
                    row.get::<_, String>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, f64>(4)?,
                ))
            },
        )
        .unwrap()
    };

    let bare = extract(&["Date", "Meal", "Food Name", "Calories", "Protein"]);
    let suffixed = extract(&["Date", "Meal", "Food Name", "Calories (kcal)", "Protein (g)"]);
    assert_eq!(bare, suffixed);
}

#[test]
fn test_detection_failure_aborts_without_history_or_archive() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let path = dir.path().join("mystery.csv");
    write_csv(&path, &["Foo", "Bar"], &[vec!["1", "2"]]);
    let archive_dir = dir.path().join("archive");

    let result = engine.ingest(&path, None, Some(&archive_dir));
    assert!(matches!(result, Err(ImportError::DetectionFailure { .. })));

    // 失败的文件不记历史、不归档，可修复后重试
    assert_eq!(table_count(&store, "export_history"), 0);
    assert!(path.exists());
    assert!(!archive_dir.exists());
}

#[test]
fn test_explicit_type_overrides_failed_detection() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let path = dir.path().join("custom.csv");
    write_csv(
        &path,
        &["Date", "Mystery Column"],
        &[vec!["2024-01-01", "x"]],
    );

    let report = engine
        .ingest(&path, Some(ExportType::Nutrition), None)
        .unwrap();
    assert_eq!(report.export_type, "nutrition");
    assert_eq!(report.rows_imported, 1);

    let conn = store.connection().unwrap();
    let meal: String = conn
        .query_row("SELECT meal FROM nutrition_log", [], |row| row.get(0))
        .unwrap();
    assert_eq!(meal, "Unknown");
}

#[test]
fn test_summary_detected_over_nutrition_from_file() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    // 同时含营养类表头与 summary 专有标记
    let path = dir.path().join("summary.csv");
    write_csv(
        &path,
        &["Date", "Calories", "Protein", "Calorie Target", "Expenditure"],
        &[vec!["2024-01-01", "2100", "150", "2200", "2500"]],
    );

    let report = engine.ingest(&path, None, None).unwrap();
    assert_eq!(report.export_type, "summary");
    assert_eq!(table_count(&store, "daily_summary"), 1);
    assert_eq!(table_count(&store, "nutrition_log"), 0);
}

#[test]
fn test_empty_export_records_history_once() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let path = dir.path().join("empty.csv");
    write_csv(&path, &["Date", "Calories"], &[]);

    let r1 = engine.ingest(&path, None, None).unwrap();
    assert!(!r1.skipped);
    assert_eq!(r1.rows_imported, 0);
    assert_eq!(table_count(&store, "export_history"), 1);

    // 同内容第二次: 命中哈希直接跳过，不再解析
    let r2 = engine.ingest(&path, None, None).unwrap();
    assert!(r2.skipped);
    assert_eq!(table_count(&store, "export_history"), 1);
}

#[test]
fn test_xlsx_single_sheet_workout_ingest() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store.clone());

    let path = dir.path().join("workout.xlsx");
    write_xlsx(
        &path,
        "Sheet1",
        &["Date", "Workout Name", "Exercise Name", "Reps", "Weight (kg)"],
        &[
            vec!["2024-01-05", "Push Day", "Bench Press", "8", "60"],
            vec!["2024-01-05", "Push Day", "Bench Press", "6", "65"],
        ],
    );

    let report = engine.ingest(&path, None, None).unwrap();
    assert_eq!(report.export_type, "workout");
    assert_eq!(report.rows_imported, 2);

    let conn = store.connection().unwrap();
    // 源数据无组号: 批内 1 起始序号
    let sets: Vec<i64> = conn
        .prepare("SELECT set_number FROM workouts ORDER BY set_number")
        .unwrap()
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<_, _>>()
        .unwrap();
    assert_eq!(sets, vec![1, 2]);
}

#[test]
fn test_successful_ingest_archives_file() {
    logging::init_test();
    let (dir, store) = create_test_store();
    let engine = IngestEngine::new(store);

    let path = write_nutrition_csv(
        dir.path(),
        "to_archive.csv",
        &[vec!["2024-01-01", "Lunch", "Rice", "200", "4", "44", "1"]],
    );
    let archive_dir = dir.path().join("archive");

    engine.ingest(&path, None, Some(&archive_dir)).unwrap();

    assert!(!path.exists());
    assert!(archive_dir.join("to_archive.csv").exists());
}

#[test]
fn test_missing_file_is_read_error() {
    logging::init_test();
    let (_dir, store) = create_test_store();
    let engine = IngestEngine::new(store);

    let result = engine.ingest("no_such_export.xlsx", None, None);
    assert!(matches!(result, Err(ImportError::FileNotFound(_))));
}
