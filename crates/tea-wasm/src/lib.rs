//! # tea-wasm
//!
//! wasm-bindgen エクスポート：JS ホストから呼び出す公開 API。
//!
//! ## 使用方法（TypeScript）
//!
//! ```typescript
//! import { TeaHost, init_panic_hook, initLogging } from '../tea-wasm-pkg/tea_wasm';
//!
//! // パニック時のスタックトレースを有効化（開発時）
//! init_panic_hook();
//! initLogging("debug");
//!
//! // プログラム起動（設定は省略可）
//! const host = new TeaHost(JSON.stringify({ alt_screen: true }));
//!
//! // キー入力をプログラムへ
//! term.onData((data) => host.write(data));
//!
//! // 表示領域のサイズ変更
//! host.resize(term.cols, term.rows);
//!
//! // 描画ループ（プログラムを進め、出力を引き抜いて端末へ）
//! setInterval(() => {
//!     host.tick(Date.now());
//!     const out = host.read();
//!     if (out.length > 0) {
//!         term.write(out);
//!     }
//!     if (!host.isRunning()) {
//!         const err = host.takeExitError();
//!         if (err) console.error(err);
//!     }
//! }, 16);
//! ```
//!
//! ## スレッド
//!
//! WASM はシングルスレッド。ドライバは `tick()` の中で 1 ステップずつ進み、
//! read で待つことはない。入力が届いてから画面に出るまでの遅れは最大で
//! tick 間隔 1 回分。

use wasm_bindgen::prelude::*;

pub mod editors;
pub mod host;
pub mod logging;

pub use editors::SplitEditors;
pub use host::TeaHost;

/// パニック時にブラウザコンソールにスタックトレースを出力する
///
/// 開発時に必ず呼び出すこと。本番ビルドでは feature flag で無効化可能。
#[wasm_bindgen]
pub fn init_panic_hook() {
    #[cfg(feature = "console_error_panic_hook")]
    console_error_panic_hook::set_once();
}

/// ログ出力をブラウザコンソールへつなぐ
///
/// # 引数
/// - `level`: `"trace"` / `"debug"` / `"info"` / `"warn"` / `"error"`（省略時 info）
///
/// # 戻り値
/// 既に初期化済みなら `false`
#[wasm_bindgen(js_name = "initLogging")]
pub fn init_logging(level: Option<String>) -> bool {
    logging::install(logging::parse_level(level.as_deref()))
}
