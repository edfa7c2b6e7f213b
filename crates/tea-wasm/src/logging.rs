//! tracing → ブラウザコンソール
//!
//! 1 イベント 1 行をバッファし、writer の drop 時に `console.log` へ渡す。
//! native ビルド（テスト）では stderr に出す。

use std::io;

use tracing::Level;
use tracing_subscriber::fmt::MakeWriter;

/// イベントごとに `ConsoleWriter` を作る
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleMakeWriter;

impl<'a> MakeWriter<'a> for ConsoleMakeWriter {
    type Writer = ConsoleWriter;

    fn make_writer(&'a self) -> Self::Writer {
        ConsoleWriter::default()
    }
}

/// 1 行分のログを溜める writer
#[derive(Debug, Default)]
pub struct ConsoleWriter {
    buf: Vec<u8>,
}

impl io::Write for ConsoleWriter {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.buf.extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl Drop for ConsoleWriter {
    fn drop(&mut self) {
        if self.buf.is_empty() {
            return;
        }
        let line = String::from_utf8_lossy(&self.buf);
        emit(line.trim_end());
    }
}

#[cfg(target_arch = "wasm32")]
fn emit(line: &str) {
    web_sys::console::log_1(&wasm_bindgen::JsValue::from_str(line));
}

#[cfg(not(target_arch = "wasm32"))]
fn emit(line: &str) {
    eprintln!("{line}");
}

/// レベル文字列を解釈する（不正・省略時は INFO）
pub fn parse_level(level: Option<&str>) -> Level {
    level
        .and_then(|l| l.trim().parse::<Level>().ok())
        .unwrap_or(Level::INFO)
}

/// グローバル subscriber を設定する
///
/// # 戻り値
/// 既に設定済みなら `false`
pub fn install(level: Level) -> bool {
    tracing_subscriber::fmt()
        .with_writer(ConsoleMakeWriter)
        .with_max_level(level)
        .with_ansi(false)
        .with_target(false)
        .without_time()
        .try_init()
        .is_ok()
}
