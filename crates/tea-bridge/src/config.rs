//! ブリッジ設定
//!
//! ホストはコンストラクタに JSON オブジェクトを渡せる。省略したフィールドは
//! デフォルト値になる。
//!
//! ```json
//! {
//!   "wait": { "mode": "poll", "interval_ms": 100 },
//!   "read_buffer_size": 256,
//!   "escape_timeout_ms": 250,
//!   "alt_screen": true,
//!   "inbound_high_water": 1048576,
//!   "outbound_high_water": null
//! }
//! ```

use serde::Deserialize;

use tea_driver::{ProgramOptions, DEFAULT_ESCAPE_TIMEOUT_MS};
use tea_stream::WaitStrategy;

use crate::error::BridgeError;

/// バッファ長警告のデフォルト閾値（1 MiB）
pub const DEFAULT_HIGH_WATER: usize = 1 << 20;

/// 入力スレッドの read サイズのデフォルト
pub const DEFAULT_READ_BUFFER_SIZE: usize = 256;

/// ブリッジの実行時設定
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BridgeConfig {
    /// inbound が空のときの待ち方（スレッド版 `Bridge::start` のみ）
    pub wait: WaitStrategy,
    /// 1 回の read で受け取る最大バイト数
    pub read_buffer_size: usize,
    /// 入力末尾の ESC を単独の ESC とみなすまで続きを待つ時間
    pub escape_timeout_ms: u64,
    /// 代替スクリーンで描画する
    pub alt_screen: bool,
    /// inbound の警告閾値（`null` で無効）
    pub inbound_high_water: Option<usize>,
    /// outbound の警告閾値（`null` で無効）
    pub outbound_high_water: Option<usize>,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        BridgeConfig {
            wait: WaitStrategy::Notify,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            escape_timeout_ms: DEFAULT_ESCAPE_TIMEOUT_MS,
            alt_screen: true,
            inbound_high_water: Some(DEFAULT_HIGH_WATER),
            outbound_high_water: Some(DEFAULT_HIGH_WATER),
        }
    }
}

impl BridgeConfig {
    /// ホストから渡された JSON を解析する
    pub fn from_json(json: &str) -> Result<Self, BridgeError> {
        Ok(serde_json::from_str(json)?)
    }

    pub(crate) fn program_options(&self) -> ProgramOptions {
        ProgramOptions {
            alt_screen: self.alt_screen,
            read_buffer_size: self.read_buffer_size,
            escape_timeout_ms: self.escape_timeout_ms,
        }
    }
}
