// ==========================================
// MacroClaw 摄取管线 - CLI 入口
// ==========================================
// 职责: 手动摄取与读取侧校验命令
// 输出: 查询结果走 stdout（JSON），日志走 stderr
// ==========================================

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use std::path::PathBuf;

use macroclaw::config::PipelineConfig;
use macroclaw::domain::ExportType;
use macroclaw::{logging, IngestEngine, QueryApi, Store};

#[derive(Parser)]
#[command(name = "macroclaw", version, about = "MacroFactor 数据自动化摄取管线")]
struct Cli {
    /// 配置文件路径（省略时自动探测）
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 输出 debug 级别日志
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// 初始化数据库（建表建索引，幂等）
    Init,
    /// 手动摄取一个导出文件
    Ingest {
        /// 导出文件路径（.xlsx/.xls/.csv）
        file: PathBuf,
        /// 覆盖自动检测: nutrition/workout/weight/summary
        #[arg(long = "type")]
        export_type: Option<ExportType>,
        /// 处理后不移入归档目录
        #[arg(long)]
        no_archive: bool,
    },
    /// 某日的每日汇总（默认今天）
    Summary {
        /// 日期 (YYYY-MM-DD)
        date: Option<String>,
    },
    /// 某日的营养记录（默认今天）
    Nutrition {
        /// 日期 (YYYY-MM-DD)
        date: Option<String>,
    },
    /// 最近 N 天的训练记录
    Workouts {
        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },
    /// 最近 N 天的体重走势
    Weight {
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },
    /// 最近 N 天的宏量依从度
    Adherence {
        #[arg(short, long, default_value_t = 7)]
        days: i64,
    },
    /// 最近 N 天每个动作的最重一组
    Prs {
        #[arg(short, long, default_value_t = 30)]
        days: i64,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    logging::init(if cli.verbose { "debug" } else { "info" });

    let cfg = PipelineConfig::load(cli.config.as_deref())?;
    let store = Store::open(&cfg.db_path).context("无法打开数据库")?;

    match cli.command {
        Commands::Init => {
            // Store::open 已幂等建好 schema
            println!("数据库已初始化: {}", cfg.db_path.display());
        }
        Commands::Ingest {
            file,
            export_type,
            no_archive,
        } => {
            let engine = IngestEngine::new(store);
            let archive_dir = if no_archive {
                None
            } else {
                Some(cfg.archive_dir.as_path())
            };
            let report = engine.ingest(&file, export_type, archive_dir)?;
            if report.skipped {
                println!("已跳过（内容重复）: {}", report.file_path);
            } else {
                println!(
                    "已导入 {} 行（{}）: {}",
                    report.rows_imported, report.export_type, report.file_path
                );
                if let Some(breakdown) = &report.sheet_breakdown {
                    println!("{}", serde_json::to_string_pretty(breakdown)?);
                }
            }
        }
        Commands::Summary { date } => {
            let api = QueryApi::new(store);
            let date = date.unwrap_or_else(today_iso);
            match api.daily_summary(&date)? {
                Some(row) => print_json(&row)?,
                None => println!("无 {} 的汇总数据", date),
            }
        }
        Commands::Nutrition { date } => {
            let api = QueryApi::new(store);
            let date = date.unwrap_or_else(today_iso);
            let rows = api.nutrition_log(&date)?;
            if rows.is_empty() {
                println!("无 {} 的营养数据", date);
            } else {
                print_json(&rows)?;
            }
        }
        Commands::Workouts { days } => {
            let api = QueryApi::new(store);
            let end = chrono::Local::now().date_naive();
            let start = end - chrono::Duration::days(days);
            let rows = api.workouts(&start.to_string(), &end.to_string())?;
            if rows.is_empty() {
                println!("最近 {} 天无训练数据", days);
            } else {
                print_json(&rows)?;
            }
        }
        Commands::Weight { days } => {
            let api = QueryApi::new(store);
            let rows = api.weight_trend(days)?;
            if rows.is_empty() {
                println!("最近 {} 天无体重数据", days);
            } else {
                print_json(&rows)?;
            }
        }
        Commands::Adherence { days } => {
            let api = QueryApi::new(store);
            print_json(&api.macro_adherence(days)?)?;
        }
        Commands::Prs { days } => {
            let api = QueryApi::new(store);
            let rows = api.recent_prs(days)?;
            if rows.is_empty() {
                println!("最近 {} 天无训练记录", days);
            } else {
                print_json(&rows)?;
            }
        }
    }

    Ok(())
}

fn today_iso() -> String {
    chrono::Local::now().date_naive().to_string()
}

fn print_json<T: serde::Serialize>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}
