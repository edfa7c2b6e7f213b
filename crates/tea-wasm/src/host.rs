//! TeaHost wasm-bindgen エクスポート
//!
//! JS ホストから呼び出す唯一のエントリポイント。書き込み・読み出し・resize の
//! 3 つの入口を `Bridge` に中継する。

use wasm_bindgen::prelude::*;
use js_sys::Uint8Array;

use tea_bridge::{Bridge, BridgeConfig};

use crate::editors::SplitEditors;

/// 埋め込みプログラムのホスト側ハンドル
///
/// ## 内部アーキテクチャ
///
/// ```text
/// TeaHost
///   └── Bridge            (tea-bridge)
///         ├── inbound      write() / writeBytes() が積む
///         ├── outbound     read() / readBytes() が引き抜く
///         ├── EventSender  resize() が直接投入
///         └── driver       tick() で 1 ステップずつ進む
///               └── SteppedProgram<SplitEditors> (tea-driver)
/// ```
///
/// ## スレッド
///
/// WASM はシングルスレッドなので、ドライバもスレッドを持たない。
/// JS の `setInterval` から `tick(Date.now())` を呼ぶと、その時点までに
/// 溜まった入力と resize が処理され、新しいフレームが outbound に積まれる。
/// どのメソッドもブロックしない。
#[wasm_bindgen]
pub struct TeaHost {
    bridge: Bridge,
}

#[wasm_bindgen]
impl TeaHost {
    /// プログラムを起動する
    ///
    /// # 引数
    /// - `config_json`: `BridgeConfig` の JSON（省略時はデフォルト）
    ///
    /// 最初のフレームは戻る前に描画済みで、すぐ `read()` できる。
    ///
    /// # エラー
    /// - 設定 JSON が不正
    /// - 最初のフレームを描画できない
    ///
    /// # 例（TypeScript）
    /// ```typescript
    /// const host = new TeaHost();
    /// const inline = new TeaHost('{"alt_screen":false,"escape_timeout_ms":100}');
    /// ```
    #[wasm_bindgen(constructor)]
    pub fn new(config_json: Option<String>) -> Result<TeaHost, JsError> {
        let config = match config_json.as_deref() {
            Some(json) => BridgeConfig::from_json(json)
                .map_err(|e| JsError::new(&format!("{}", e)))?,
            None => BridgeConfig::default(),
        };

        let bridge = Bridge::start_stepped(SplitEditors::new(), config)
            .map_err(|e| JsError::new(&format!("Failed to start program: {}", e)))?;

        Ok(TeaHost { bridge })
    }

    /// 定期タイマー tick
    ///
    /// `setInterval` から定期的に呼び出す。溜まった resize → 入力の順に処理し、
    /// 続きの来なかった ESC は待ち時間を過ぎた tick で ESC として確定する。
    ///
    /// # 引数
    /// - `now_ms`: 現在時刻（`Date.now()`）
    ///
    /// # 戻り値
    /// プログラムがまだ動作中なら `true`
    #[wasm_bindgen]
    pub fn tick(&self, now_ms: f64) -> bool {
        self.bridge.pump(now_ms as u64)
    }

    /// キー入力（端末の onData 文字列）をプログラムへ送る
    #[wasm_bindgen]
    pub fn write(&self, data: &str) {
        self.bridge.push_bytes_in(data.as_bytes());
    }

    /// 生バイト列をプログラムへ送る
    #[wasm_bindgen(js_name = "writeBytes")]
    pub fn write_bytes(&self, data: &[u8]) {
        self.bridge.push_bytes_in(data);
    }

    /// プログラムの出力をすべて取り出す
    ///
    /// # 戻り値
    /// 出力文字列。何もなければ空文字列。途中で切れた UTF-8 文字は
    /// 次回に持ち越される。
    #[wasm_bindgen]
    pub fn read(&self) -> String {
        self.bridge.pull_text_out()
    }

    /// プログラムの出力を生バイト列で取り出す
    #[wasm_bindgen(js_name = "readBytes")]
    pub fn read_bytes(&self) -> Uint8Array {
        let data = self.bridge.pull_bytes_out();
        let arr = Uint8Array::new_with_length(data.len() as u32);
        arr.copy_from(&data);
        arr
    }

    /// 表示領域のサイズ変更を通知する
    #[wasm_bindgen]
    pub fn resize(&self, width: u32, height: u32) {
        self.bridge.notify_resize(width, height);
    }

    /// プログラムに終了を要求する
    #[wasm_bindgen]
    pub fn quit(&self) {
        self.bridge.quit();
    }

    /// プログラムが動作中か
    #[wasm_bindgen(js_name = "isRunning")]
    pub fn is_running(&self) -> bool {
        self.bridge.is_running()
    }

    /// 終了したプログラムのエラーを取り出す
    ///
    /// 動作中、正常終了、または取り出し済みなら `undefined`。
    #[wasm_bindgen(js_name = "takeExitError")]
    pub fn take_exit_error(&self) -> Option<String> {
        if self.bridge.is_running() {
            return None;
        }
        self.bridge.wait().err().map(|e| format!("{}", e))
    }

    /// ブリッジ統計を JSON 文字列で返す
    ///
    /// # 戻り値
    /// ```json
    /// {
    ///   "bytes_in": 42,
    ///   "bytes_out": 10240,
    ///   "inbound_buffered": 0,
    ///   "outbound_buffered": 512,
    ///   "running": true
    /// }
    /// ```
    #[wasm_bindgen(js_name = "getStats")]
    pub fn get_stats(&self) -> String {
        self.bridge.stats().to_json()
    }
}
