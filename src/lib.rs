//! # 图片工具箱 — 库入口
//!
//! ## 架构总览
//!
//! ```text
//! ┌──────────────────────────────────────────────────────────┐
//! │         CLI (clap 子命令)        HTTP (axum)              │
//! │  resize · compress · collage ·   POST /convert            │
//! │  convert · serve                 GET  /health             │
//! └───────┬──────────────────────────────┬───────────────────┘
//!         ↕ Result<T, AppError>           ↕ 400 / 500 + JSON
//! ┌───────┼──────────────────────────────┼───────────────────┐
//! │       ↕                              ↕                   │
//! │  ┌─ error ────── AppError (统一错误类型)                  │
//! │  │                                                       │
//! │  ├─ settings ─── JSON 设置文件 → ImageConfig              │
//! │  │                                                       │
//! │  ├─ server ───── 转换接口路由                             │
//! │  │                                                       │
//! │  └─ image_handler                                        │
//! │      ├─ service       会话 · 批处理 · spawn_blocking       │
//! │      ├─ loader        文件 / Base64 / 字节 + 签名校验      │
//! │      ├─ resizer       等比缩放                            │
//! │      ├─ compressor    质量压缩 + 透明度策略               │
//! │      ├─ collage       网格拼图                            │
//! │      ├─ convert       格式转换 + MIME 表                  │
//! │      ├─ batch         状态迁移 + 逐项隔离                 │
//! │      ├─ archive       ZIP 打包                            │
//! │      └─ remote        远程转换客户端                      │
//! └──────────────────────────────────────────────────────────┘
//! ```
//!
//! ## 模块职责
//!
//! | 模块 | 职责 |
//! |------|------|
//! | [`error`] | 统一错误类型 `AppError`，CLI 命令与设置加载的返回类型 |
//! | [`image_handler`] | 图片加载、变换、批处理、打包与远程转换 |
//! | [`server`] | `POST /convert` 转换接口 |
//! | [`settings`] | JSON 设置文件的读取与校验 |

pub mod error;
pub mod image_handler;
pub mod server;
pub mod settings;
