// ==========================================
// 测试辅助函数
// ==========================================
// 职责: 生成 xlsx/csv 测试导出文件，提供临时存储
// ==========================================

use macroclaw::repository::Store;
use rust_xlsxwriter::Workbook;
use std::io::Write;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// 创建临时目录与其中的文件存储
pub fn create_test_store() -> (TempDir, Store) {
    let dir = TempDir::new().expect("无法创建临时目录");
    let store = Store::open(dir.path().join("macroclaw.db")).expect("无法打开测试数据库");
    (dir, store)
}

/// 向工作簿追加一张全字符串单元格的工作表
///
/// 数值一律写成文本，摄取侧的类型解析覆盖该形态
pub fn add_sheet(workbook: &mut Workbook, name: &str, headers: &[&str], rows: &[Vec<&str>]) {
    let sheet = workbook.add_worksheet();
    sheet.set_name(name).expect("非法工作表名");

    for (col, header) in headers.iter().enumerate() {
        sheet
            .write_string(0, col as u16, *header)
            .expect("写入表头失败");
    }
    for (row_idx, row) in rows.iter().enumerate() {
        for (col, value) in row.iter().enumerate() {
            sheet
                .write_string((row_idx + 1) as u32, col as u16, *value)
                .expect("写入单元格失败");
        }
    }
}

/// 写出单工作表 xlsx 导出文件
pub fn write_xlsx(path: &Path, sheet_name: &str, headers: &[&str], rows: &[Vec<&str>]) {
    let mut workbook = Workbook::new();
    add_sheet(&mut workbook, sheet_name, headers, rows);
    workbook.save(path).expect("保存 xlsx 失败");
}

/// 写出 csv 导出文件
pub fn write_csv(path: &Path, headers: &[&str], rows: &[Vec<&str>]) {
    let mut file = std::fs::File::create(path).expect("无法创建 csv");
    writeln!(file, "{}", headers.join(",")).expect("写入表头失败");
    for row in rows {
        writeln!(file, "{}", row.join(",")).expect("写入数据行失败");
    }
}

/// 典型的单表营养导出（daily 模式，裸表头）
pub fn write_nutrition_csv(dir: &Path, file_name: &str, rows: &[Vec<&str>]) -> PathBuf {
    let path = dir.join(file_name);
    write_csv(
        &path,
        &["Date", "Meal", "Food Name", "Calories", "Protein", "Carbs", "Fat"],
        rows,
    );
    path
}

/// 查询某表总行数
pub fn table_count(store: &Store, table: &str) -> i64 {
    let conn = store.connection().expect("无法获取连接");
    conn.query_row(&format!("SELECT COUNT(*) FROM {}", table), [], |row| {
        row.get(0)
    })
    .expect("计数查询失败")
}
