//! バイトチャンネル実装

use std::collections::VecDeque;
use std::sync::{Arc, Condvar, Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

/// チャンネル内部状態（必ず `Mutex` 越しに触る）
pub(crate) struct State {
    /// 未読バイト列
    pub(crate) buffer: VecDeque<u8>,
    /// close 済みか（以降の append は破棄される）
    pub(crate) closed: bool,
    /// append された総バイト数（統計用）
    total_appended: u64,
    /// drain された総バイト数（統計用）
    total_drained: u64,
    /// 警告を出すバッファ長の閾値
    high_water: Option<usize>,
    /// 閾値を超えた状態か（警告の連発防止）
    over_high_water: bool,
}

struct Shared {
    name: &'static str,
    state: Mutex<State>,
    /// append / close で起こされる待機者
    readable: Condvar,
}

/// スレッド間で共有されるバイトチャンネル
///
/// ホストのコールバックスレッドとドライバのスレッドの両方から触られる
/// 可変バッファ。`Clone` は同じバッファへのハンドルを複製するだけで、
/// `ByteChannel::new` で作った別インスタンスとは状態を一切共有しない。
///
/// ## 責任
/// - producer からの append を順序通りに積む
/// - consumer の drain で先頭から取り出す（欠落・重複なし）
/// - append / close 時に待機中の reader を起こす
///
/// ## 注意
/// 容量制限はない。`with_high_water_mark` で閾値を設定すると、
/// 超えたときに一度だけ警告ログを出す（append 自体は拒否しない）。
#[derive(Clone)]
pub struct ByteChannel {
    shared: Arc<Shared>,
}

impl ByteChannel {
    /// 新しい空のチャンネルを生成する
    ///
    /// # 引数
    /// - `name`: ログに出すチャンネル名（例: `"inbound"`）
    pub fn new(name: &'static str) -> Self {
        ByteChannel {
            shared: Arc::new(Shared {
                name,
                state: Mutex::new(State {
                    buffer: VecDeque::new(),
                    closed: false,
                    total_appended: 0,
                    total_drained: 0,
                    high_water: None,
                    over_high_water: false,
                }),
                readable: Condvar::new(),
            }),
        }
    }

    /// バッファ長の警告閾値を設定する
    pub fn with_high_water_mark(self, limit: usize) -> Self {
        self.lock().high_water = Some(limit);
        self
    }

    /// チャンネル名
    pub fn name(&self) -> &'static str {
        self.shared.name
    }

    /// producer 側: バイト列を末尾に積む
    ///
    /// close 済みのチャンネルへの append は破棄される。
    pub fn append(&self, data: &[u8]) {
        if data.is_empty() {
            return;
        }

        let mut state = self.lock();
        if state.closed {
            debug!(channel = self.shared.name, len = data.len(), "append after close dropped");
            return;
        }

        state.buffer.extend(data.iter().copied());
        state.total_appended += data.len() as u64;

        let buffered = state.buffer.len();
        let crossed = match state.high_water {
            Some(limit) => !state.over_high_water && buffered > limit,
            None => false,
        };
        if crossed {
            state.over_high_water = true;
            warn!(
                channel = self.shared.name,
                buffered,
                limit = state.high_water,
                "byte channel exceeded high-water mark"
            );
        }
        drop(state);

        self.shared.readable.notify_all();
    }

    /// consumer 側: 先頭から最大 `buf.len()` バイトを取り出す
    ///
    /// # 戻り値
    /// コピーしたバイト数（空なら 0）
    pub fn drain_into(&self, buf: &mut [u8]) -> usize {
        let mut state = self.lock();
        drain_locked(&mut state, buf)
    }

    /// バッファの中身をすべて取り出し、空にする
    pub fn drain_all(&self) -> Vec<u8> {
        let mut state = self.lock();
        let n = state.buffer.len();
        let data: Vec<u8> = state.buffer.drain(..).collect();
        settle_after_drain(&mut state, n);
        data
    }

    /// UTF-8 として安全な境界まで取り出す
    ///
    /// 末尾が途中で切れたコードポイントで終わっている場合、その断片は
    /// バッファに残し、次回の呼び出しで続きと一緒に返す。
    /// close 済みなら続きは来ないので、断片も U+FFFD として返す。
    /// 不正なシーケンスは U+FFFD に置き換える。
    pub fn drain_utf8(&self) -> String {
        let mut state = self.lock();
        let data: Vec<u8> = state.buffer.drain(..).collect();
        let split = if state.closed {
            data.len()
        } else {
            data.len() - incomplete_tail_len(&data)
        };

        // drain 済みなので残りは断片だけ
        state.buffer.extend(data[split..].iter().copied());
        settle_after_drain(&mut state, split);

        String::from_utf8_lossy(&data[..split]).into_owned()
    }

    /// チャンネルを閉じ、待機中の reader をすべて起こす
    ///
    /// 既に積まれているデータは引き続き drain できる。
    pub fn close(&self) {
        let mut state = self.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        debug!(channel = self.shared.name, buffered = state.buffer.len(), "byte channel closed");
        drop(state);

        self.shared.readable.notify_all();
    }

    /// close 済みか
    pub fn is_closed(&self) -> bool {
        self.lock().closed
    }

    /// 未読バイト数
    pub fn len(&self) -> usize {
        self.lock().buffer.len()
    }

    /// 未読データがないか
    pub fn is_empty(&self) -> bool {
        self.lock().buffer.is_empty()
    }

    /// 警告閾値を超えている状態か
    pub fn is_over_high_water(&self) -> bool {
        self.lock().over_high_water
    }

    /// append された総バイト数（統計用）
    pub fn total_appended(&self) -> u64 {
        self.lock().total_appended
    }

    /// drain された総バイト数（統計用）
    pub fn total_drained(&self) -> u64 {
        self.lock().total_drained
    }

    /// ロックを取得する
    ///
    /// 中身はただのバイト列なので、他スレッドの panic で poison されても
    /// 状態は壊れていない。そのまま使い続ける。
    pub(crate) fn lock(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// `append` / `close` まで待機する
    pub(crate) fn wait<'a>(&'a self, guard: MutexGuard<'a, State>) -> MutexGuard<'a, State> {
        self.shared
            .readable
            .wait(guard)
            .unwrap_or_else(PoisonError::into_inner)
    }
}

impl core::fmt::Debug for ByteChannel {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        let state = self.lock();
        f.debug_struct("ByteChannel")
            .field("name", &self.shared.name)
            .field("buffered", &state.buffer.len())
            .field("closed", &state.closed)
            .finish()
    }
}

/// ロック済みの状態から最大 `buf.len()` バイトを取り出す
pub(crate) fn drain_locked(state: &mut State, buf: &mut [u8]) -> usize {
    let n = buf.len().min(state.buffer.len());
    for (dst, src) in buf.iter_mut().zip(state.buffer.drain(..n)) {
        *dst = src;
    }
    settle_after_drain(state, n);
    n
}

fn settle_after_drain(state: &mut State, drained: usize) {
    state.total_drained += drained as u64;
    if let Some(limit) = state.high_water {
        if state.over_high_water && state.buffer.len() <= limit {
            state.over_high_water = false;
        }
    }
}

/// 末尾の未完成 UTF-8 コードポイントのバイト数を返す
fn incomplete_tail_len(bytes: &[u8]) -> usize {
    let start = bytes.len().saturating_sub(3);
    for i in (start..bytes.len()).rev() {
        let b = bytes[i];
        if b & 0xC0 == 0x80 {
            // continuation byte
            continue;
        }
        let need = match b {
            0xC0..=0xDF => 2,
            0xE0..=0xEF => 3,
            0xF0..=0xF7 => 4,
            _ => 1,
        };
        let have = bytes.len() - i;
        return if have < need { have } else { 0 };
    }
    0
}
