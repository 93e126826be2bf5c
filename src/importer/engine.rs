// ==========================================
// MacroClaw 摄取管线 - 摄取引擎
// ==========================================
// 流程: 哈希 -> 查重 -> 分类(单表/bulk) -> 准备 -> upsert
//       -> 历史记录 -> 归档
// 约束: 查重到写入全程持有存储锁并在单事务内提交，
//       历史记录是事务内最后一次写入；事务提交前的任何
//       失败都让该文件可重试
// ==========================================

use crate::domain::records::{ImportHistoryEntry, IngestReport};
use crate::domain::types::ExportType;
use crate::importer::bulk;
use crate::importer::detect::detect_export_type;
use crate::importer::error::{ImportError, ImportResult};
use crate::importer::prepare::{import_stamp, prepare_batch};
use crate::importer::workbook;
use crate::repository::error::RepositoryError;
use crate::repository::ingest_repo;
use crate::repository::store::Store;
use sha2::{Digest, Sha256};
use std::fs::File;
use std::io::Read;
use std::path::{Path, PathBuf};
use tracing::{info, warn};
use uuid::Uuid;

// ==========================================
// IngestEngine - 单文件摄取编排
// ==========================================
/// 摄取引擎：写入侧的唯一入口
///
/// 同步单线程处理：一个文件完整走完哈希、分类、准备、
/// 落库后才处理下一个
pub struct IngestEngine {
    store: Store,
}

impl IngestEngine {
    pub fn new(store: Store) -> Self {
        Self { store }
    }

    /// 摄取一个导出文件
    ///
    /// # 参数
    /// - path: 导出文件路径（.xlsx/.xls/.csv）
    /// - explicit_type: 指定导出类型，None 时按表头自动检测
    /// - archive_dir: 归档目录，None 时文件留在原处
    ///
    /// # 返回
    /// - Ok(IngestReport): 摄取结果（内容重复时 skipped=true）
    /// - Err(ImportError): 检测失败/解析失败/存储失败等，
    ///   此时不写历史记录、不归档
    pub fn ingest<P: AsRef<Path>>(
        &self,
        path: P,
        explicit_type: Option<ExportType>,
        archive_dir: Option<&Path>,
    ) -> ImportResult<IngestReport> {
        let path = path.as_ref();
        if !path.exists() {
            return Err(ImportError::FileNotFound(path.display().to_string()));
        }

        let file_path = std::fs::canonicalize(path).unwrap_or_else(|_| path.to_path_buf());
        let file_path_str = file_path.display().to_string();
        let source = display_name(&file_path);

        info!(file = %file_path_str, "开始摄取");
        let file_hash = file_sha256(&file_path)?;

        // 锁覆盖"查重 -> 写入"全程，两个进程不会同时看到"未导入"
        let conn = self.store.connection()?;
        let tx = conn.unchecked_transaction().map_err(tx_error)?;

        if ingest_repo::find_history_by_hash(&tx, &file_hash)?.is_some() {
            info!(hash = %file_hash, "文件内容已导入过，跳过");
            return Ok(IngestReport {
                export_type: explicit_type
                    .map(|t| t.as_str().to_string())
                    .unwrap_or_else(|| "unknown".to_string()),
                rows_imported: 0,
                file_hash,
                file_path: file_path_str,
                skipped: true,
                sheet_breakdown: None,
            });
        }

        // --- bulk（多工作表全历史）路径 -------------------------------------
        let ext = workbook::file_extension(&file_path);
        let is_excel = ext == "xlsx" || ext == "xls";
        if explicit_type.is_none()
            && is_excel
            && bulk::is_bulk_workbook(&workbook::sheet_names(&file_path)?)
        {
            info!("检测到 bulk 导出，按多工作表处理");
            let breakdown = bulk::ingest_bulk(&tx, &file_path, &source)?;
            let rows_imported: usize = breakdown.values().sum();

            ingest_repo::insert_history(
                &tx,
                &history_entry("bulk", &file_path_str, &file_hash, rows_imported),
            )?;
            tx.commit().map_err(tx_error)?;
            drop(conn);

            info!(rows_imported, "bulk 摄取完成");
            if let Some(dir) = archive_dir {
                archive_file(&file_path, dir)?;
            }

            return Ok(IngestReport {
                export_type: "bulk".to_string(),
                rows_imported,
                file_hash,
                file_path: file_path_str,
                skipped: false,
                sheet_breakdown: Some(breakdown),
            });
        }

        // --- 单表导出路径 ---------------------------------------------------
        let sheet = workbook::read_single(&file_path)?;
        info!(
            rows = sheet.rows.len(),
            columns = sheet.headers.len(),
            "工作表读取完成"
        );

        if sheet.rows.is_empty() {
            warn!(file = %file_path_str, "空导出文件，记录历史后跳过");
            let etype_str = explicit_type
                .map(|t| t.as_str().to_string())
                .unwrap_or_else(|| "unknown".to_string());
            ingest_repo::insert_history(
                &tx,
                &history_entry(&etype_str, &file_path_str, &file_hash, 0),
            )?;
            tx.commit().map_err(tx_error)?;
            drop(conn);

            if let Some(dir) = archive_dir {
                archive_file(&file_path, dir)?;
            }
            return Ok(IngestReport {
                export_type: etype_str,
                rows_imported: 0,
                file_hash,
                file_path: file_path_str,
                skipped: false,
                sheet_breakdown: None,
            });
        }

        // 检测或校验导出类型；显式指定优先于自动检测
        let etype = match (explicit_type, detect_export_type(&sheet.headers)) {
            (Some(explicit), Ok(detected)) => {
                if explicit != detected {
                    warn!(
                        explicit = explicit.as_str(),
                        detected = detected.as_str(),
                        "指定类型与检测结果不一致，使用指定值"
                    );
                }
                explicit
            }
            (Some(explicit), Err(e)) => {
                warn!(error = %e, "自动检测失败，使用指定类型");
                explicit
            }
            (None, Ok(detected)) => detected,
            (None, Err(e)) => return Err(e),
        };

        let batch = prepare_batch(etype, &sheet, &source)?;
        let rows_imported = ingest_repo::upsert_batch(&tx, &batch)?;

        ingest_repo::insert_history(
            &tx,
            &history_entry(etype.as_str(), &file_path_str, &file_hash, rows_imported),
        )?;
        tx.commit().map_err(tx_error)?;
        drop(conn);

        info!(rows_imported, export_type = etype.as_str(), "摄取完成");
        if let Some(dir) = archive_dir {
            archive_file(&file_path, dir)?;
        }

        Ok(IngestReport {
            export_type: etype.as_str().to_string(),
            rows_imported,
            file_hash,
            file_path: file_path_str,
            skipped: false,
            sheet_breakdown: None,
        })
    }
}

// ==========================================
// 辅助函数
// ==========================================

fn history_entry(
    export_type: &str,
    file_path: &str,
    file_hash: &str,
    rows_imported: usize,
) -> ImportHistoryEntry {
    ImportHistoryEntry {
        id: Uuid::new_v4().to_string(),
        export_type: export_type.to_string(),
        file_path: file_path.to_string(),
        file_hash: file_hash.to_string(),
        rows_imported,
        imported_at: import_stamp(),
    }
}

fn tx_error(err: rusqlite::Error) -> RepositoryError {
    RepositoryError::DatabaseTransactionError(err.to_string())
}

/// 来源标识：文件显示名
fn display_name(path: &Path) -> String {
    path.file_name()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| path.display().to_string())
}

/// 文件内容的 SHA-256 十六进制摘要（分块流式读取）
pub fn file_sha256(path: &Path) -> ImportResult<String> {
    let mut file = File::open(path)?;
    let mut hasher = Sha256::new();
    let mut buf = [0u8; 1 << 16];
    loop {
        let n = file.read(&mut buf)?;
        if n == 0 {
            break;
        }
        hasher.update(&buf[..n]);
    }
    Ok(format!("{:x}", hasher.finalize()))
}

/// 把处理完的文件移入归档目录
///
/// 目标重名时追加时间戳后缀，绝不覆盖
fn archive_file(path: &Path, archive_dir: &Path) -> ImportResult<PathBuf> {
    std::fs::create_dir_all(archive_dir)
        .map_err(|e| ImportError::ArchiveError(format!("无法创建归档目录: {}", e)))?;

    let file_name = path
        .file_name()
        .ok_or_else(|| ImportError::ArchiveError(format!("非法文件路径: {}", path.display())))?;
    let mut dest = archive_dir.join(file_name);

    if dest.exists() {
        let stem = path
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or("export");
        let ts = chrono::Local::now().format("%Y%m%d_%H%M%S");
        let renamed = match path.extension().and_then(|s| s.to_str()) {
            Some(ext) => format!("{}_{}.{}", stem, ts, ext),
            None => format!("{}_{}", stem, ts),
        };
        dest = archive_dir.join(renamed);
    }

    // 跨文件系统时 rename 不可用，回退为复制后删除
    if std::fs::rename(path, &dest).is_err() {
        std::fs::copy(path, &dest).map_err(|e| ImportError::ArchiveError(e.to_string()))?;
        std::fs::remove_file(path).map_err(|e| ImportError::ArchiveError(e.to_string()))?;
    }

    info!(dest = %dest.display(), "源文件已归档");
    Ok(dest)
}
