//! # 图片工具箱 — 命令行入口
//!
//! 本文件仅负责参数解析、日志初始化与服务状态构建。
//! 业务逻辑分布在各子模块中，详见 `lib.rs` 架构文档。

use std::path::PathBuf;
use std::process::ExitCode;
use std::sync::Arc;

use clap::{Parser, Subcommand};
use image_toolkit::error::AppError;
use image_toolkit::image_handler::commands::{self, CommandOutcome};
use image_toolkit::image_handler::{ToolkitService, TransformSpec};
use image_toolkit::{server, settings};

/// image-toolkit - 格式转换、缩放、压缩与网格拼图
#[derive(Parser, Debug)]
#[command(name = "image-toolkit")]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON 设置文件
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// 性能档位（quality / balanced / speed）
    #[arg(long, global = true)]
    profile: Option<String>,

    /// 批处理并发数，1 表示按顺序逐项处理
    #[arg(short, long, global = true)]
    jobs: Option<usize>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// 批量缩放
    Resize {
        #[arg(required = true)]
        files: Vec<String>,

        /// 目标宽度（像素）
        #[arg(long)]
        width: Option<u32>,

        /// 目标高度（像素）
        #[arg(long)]
        height: Option<u32>,

        /// 不保持宽高比，精确输出指定尺寸
        #[arg(long)]
        no_preserve: bool,

        /// 编码质量（0~1）
        #[arg(short, long)]
        quality: Option<f32>,

        /// 输出目录
        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// 打包为单个 ZIP
        #[arg(long)]
        archive: bool,
    },

    /// 批量压缩
    Compress {
        #[arg(required = true)]
        files: Vec<String>,

        /// 压缩质量（0~1）
        #[arg(short, long)]
        quality: Option<f32>,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        #[arg(long)]
        archive: bool,
    },

    /// 网格拼图
    Collage {
        #[arg(required = true)]
        files: Vec<String>,

        #[arg(long)]
        columns: u32,

        #[arg(long)]
        rows: u32,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,
    },

    /// 格式转换
    Convert {
        file: String,

        /// 目标格式（webp / png / jpg / jpeg / gif / tiff）
        #[arg(short, long)]
        format: String,

        #[arg(short, long, default_value = ".")]
        out: PathBuf,

        /// 远程转换服务地址，例如 http://127.0.0.1:8080/convert
        #[arg(long)]
        remote: Option<String>,
    },

    /// 启动转换服务
    Serve {
        #[arg(long, default_value = "127.0.0.1:8080")]
        addr: String,
    },
}

#[tokio::main]
async fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();
    match run(cli).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            log::error!("❌ [{}] {}", err.code(), err);
            eprintln!("错误: {err}");
            ExitCode::FAILURE
        }
    }
}

async fn run(cli: Cli) -> Result<(), AppError> {
    let mut config = settings::resolve_config(cli.config.as_deref())?;
    if let Some(jobs) = cli.jobs {
        config.batch_concurrency = jobs;
    }
    let default_quality = config.default_quality;

    let service = Arc::new(ToolkitService::with_config(config)?);
    if let Some(profile) = &cli.profile {
        commands::set_performance_profile(&service, profile)?;
    }
    log::info!("⚙️ 当前性能档位：{}", commands::get_performance_profile(&service)?);

    let outcome = match cli.command {
        Commands::Resize {
            files,
            width,
            height,
            no_preserve,
            quality,
            out,
            archive,
        } => {
            let spec = TransformSpec {
                width,
                height,
                preserve_aspect: !no_preserve,
                quality: quality.unwrap_or(default_quality),
                grid: None,
            };
            commands::resize_images(&service, files, spec, &out, archive).await?
        }
        Commands::Compress {
            files,
            quality,
            out,
            archive,
        } => {
            commands::compress_images(&service, files, quality.unwrap_or(default_quality), &out, archive).await?
        }
        Commands::Collage {
            files,
            columns,
            rows,
            out,
        } => commands::collage_images(&service, files, columns, rows, &out).await?,
        Commands::Convert {
            file,
            format,
            out,
            remote,
        } => commands::convert_image(&service, file, &format, &out, remote.as_deref()).await?,
        Commands::Serve { addr } => return server::serve(&addr, service).await,
    };

    print_outcome(&outcome)
}

fn print_outcome(outcome: &CommandOutcome) -> Result<(), AppError> {
    let json = serde_json::to_string_pretty(outcome).map_err(std::io::Error::from)?;
    println!("{json}");
    for error in &outcome.errors {
        log::warn!("⚠️ {}", error);
    }
    Ok(())
}
