// ==========================================
// MacroClaw 摄取管线 - 工作簿解析器
// ==========================================
// 支持: Excel (.xlsx/.xls) / CSV (.csv)
// 输出: 表头 + 原始字符串记录（表头已做单位后缀归一化）
// ==========================================

use crate::importer::detect::normalize_header;
use crate::importer::error::{ImportError, ImportResult};
use calamine::{open_workbook, Data, Range, Reader, Xlsx};
use csv::ReaderBuilder;
use std::collections::HashMap;
use std::fs::File;
use std::io::BufReader;
use std::path::Path;

// ==========================================
// RawSheet - 归一化后的原始工作表
// ==========================================
/// 一张工作表的原始内容
///
/// 表头在读取时即做过单位后缀归一化，检测与映射共用同一份表头
#[derive(Debug, Clone)]
pub struct RawSheet {
    pub name: String,
    pub headers: Vec<String>,
    pub rows: Vec<HashMap<String, String>>,
}

// ==========================================
// Excel 读取
// ==========================================

fn open_xlsx(path: &Path) -> ImportResult<Xlsx<BufReader<File>>> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }
    open_workbook(path).map_err(|e: calamine::XlsxError| ImportError::ExcelParseError(e.to_string()))
}

/// 列出工作簿内的全部工作表名（bulk 检测用）
pub fn sheet_names(path: &Path) -> ImportResult<Vec<String>> {
    let workbook = open_xlsx(path)?;
    Ok(workbook.sheet_names().to_vec())
}

/// 读取指定名称的工作表
pub fn read_sheet(path: &Path, sheet_name: &str) -> ImportResult<RawSheet> {
    let mut workbook = open_xlsx(path)?;
    let range = workbook
        .worksheet_range(sheet_name)
        .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
    Ok(sheet_from_range(sheet_name, &range))
}

/// 读取第一个工作表（单表导出路径）
pub fn read_first_sheet(path: &Path) -> ImportResult<RawSheet> {
    let mut workbook = open_xlsx(path)?;
    let names = workbook.sheet_names().to_vec();
    let first = names
        .first()
        .ok_or_else(|| ImportError::ExcelParseError("Excel 文件无工作表".to_string()))?
        .clone();

    let range = workbook
        .worksheet_range(&first)
        .map_err(|e| ImportError::ExcelParseError(e.to_string()))?;
    Ok(sheet_from_range(&first, &range))
}

/// 把单元格矩阵转为表头 + 记录，跳过完全空白的行
fn sheet_from_range(name: &str, range: &Range<Data>) -> RawSheet {
    let mut rows_iter = range.rows();

    let headers: Vec<String> = match rows_iter.next() {
        Some(header_row) => header_row
            .iter()
            .map(|cell| normalize_header(&cell.to_string()))
            .collect(),
        None => Vec::new(),
    };

    let mut rows = Vec::new();
    for data_row in rows_iter {
        let mut row_map = HashMap::new();
        for (col_idx, cell) in data_row.iter().enumerate() {
            if let Some(header) = headers.get(col_idx) {
                if header.is_empty() {
                    continue;
                }
                let value = cell.to_string().trim().to_string();
                row_map.insert(header.clone(), value);
            }
        }

        if row_map.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row_map);
    }

    RawSheet {
        name: name.to_string(),
        headers,
        rows,
    }
}

// ==========================================
// CSV 读取
// ==========================================

/// 读取 CSV 文件为单张工作表
pub fn read_csv_sheet(path: &Path) -> ImportResult<RawSheet> {
    if !path.exists() {
        return Err(ImportError::FileNotFound(path.display().to_string()));
    }

    let file = File::open(path)?;
    let mut reader = ReaderBuilder::new()
        .has_headers(true)
        .flexible(true) // 允许行长度不一致
        .from_reader(file);

    let headers: Vec<String> = reader
        .headers()?
        .iter()
        .map(normalize_header)
        .collect();

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let mut row_map = HashMap::new();

        for (col_idx, value) in record.iter().enumerate() {
            if let Some(header) = headers.get(col_idx) {
                if header.is_empty() {
                    continue;
                }
                row_map.insert(header.clone(), value.trim().to_string());
            }
        }

        if row_map.values().all(|v| v.is_empty()) {
            continue;
        }
        rows.push(row_map);
    }

    let name = path
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "csv".to_string());

    Ok(RawSheet {
        name,
        headers,
        rows,
    })
}

// ==========================================
// 按扩展名分派
// ==========================================

/// 读取单表导出（根据扩展名自动选择解析器）
pub fn read_single(path: &Path) -> ImportResult<RawSheet> {
    match file_extension(path).as_str() {
        "xlsx" | "xls" => read_first_sheet(path),
        "csv" => read_csv_sheet(path),
        other => Err(ImportError::UnsupportedFormat(other.to_string())),
    }
}

/// 小写文件扩展名（无扩展名时为空串）
pub fn file_extension(path: &Path) -> String {
    path.extension()
        .and_then(|e| e.to_str())
        .unwrap_or("")
        .to_lowercase()
}
