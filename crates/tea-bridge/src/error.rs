//! ブリッジのエラー型
//!
//! チャンネル操作自体は失敗しない。ここにあるのはどれも起動時の失敗か、
//! ドライバの致命的終了をホストへ伝えるためのもの。

use thiserror::Error;

use tea_driver::ProgramError;

#[derive(Debug, Error)]
pub enum BridgeError {
    /// ホストから渡された設定 JSON が不正
    #[error("invalid bridge config: {0}")]
    InvalidConfig(#[from] serde_json::Error),
    /// ドライバスレッドを起動できない
    #[error("failed to spawn driver thread: {0}")]
    Spawn(#[source] std::io::Error),
    /// ドライバがエラーで終了した
    #[error("program driver failed: {0}")]
    Program(#[from] ProgramError),
    /// ドライバが panic した
    #[error("program driver panicked: {0}")]
    Panicked(String),
    /// ステップ駆動のドライバがまだ終了していない
    #[error("program driver is still running")]
    StillRunning,
}
