//! ブロッキング read アダプタ
//!
//! ドライバは長さ 0 の成功 read を end-of-stream と解釈して終了してしまう。
//! そのため inbound が空の間は待ち続け、1 バイト以上届いてから返す。

use std::io;
use std::thread;
use std::time::Duration;

use serde::Deserialize;

use crate::channel::{drain_locked, ByteChannel};

/// ポーリング待機のデフォルト間隔
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(100);

/// inbound が空のときの待ち方
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum WaitStrategy {
    /// 条件変数で append を待つ
    Notify,
    /// 一定間隔でスリープしながら再確認する
    ///
    /// ブロッキングプリミティブが使えないホスト向け。
    /// レイテンシは最大 `interval_ms` 増える。
    Poll {
        #[serde(rename = "interval_ms", with = "millis", default = "default_interval")]
        interval: Duration,
    },
}

impl WaitStrategy {
    /// デフォルト間隔でのポーリング
    pub fn poll() -> Self {
        WaitStrategy::Poll {
            interval: DEFAULT_POLL_INTERVAL,
        }
    }
}

impl Default for WaitStrategy {
    fn default() -> Self {
        WaitStrategy::Notify
    }
}

fn default_interval() -> Duration {
    DEFAULT_POLL_INTERVAL
}

mod millis {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer};

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_millis(u64::deserialize(d)?))
    }
}

/// inbound チャンネル上の `std::io::Read` 実装
///
/// ## スレッド
/// 呼び出し元スレッドを止めるので、ドライバ側のスレッドからのみ呼ぶこと。
/// ホストのコールバックから呼ぶとデッドロックする。
///
/// ## 戻り値の規約
/// - チャンネルが開いている間は `Ok(0)` を返さない
/// - close 済みかつ空なら `Ok(0)`（end-of-stream、終了処理専用）
/// - `buf` が空なら即座に `Ok(0)`（`Read` の慣例どおり）
#[derive(Debug, Clone)]
pub struct BlockingReader {
    channel: ByteChannel,
    strategy: WaitStrategy,
}

impl BlockingReader {
    pub fn new(channel: ByteChannel, strategy: WaitStrategy) -> Self {
        BlockingReader { channel, strategy }
    }

    pub fn strategy(&self) -> WaitStrategy {
        self.strategy
    }

    fn read_notify(&self, buf: &mut [u8]) -> usize {
        let mut state = self.channel.lock();
        loop {
            if !state.buffer.is_empty() {
                return drain_locked(&mut state, buf);
            }
            if state.closed {
                return 0;
            }
            state = self.channel.wait(state);
        }
    }

    fn read_poll(&self, buf: &mut [u8], interval: Duration) -> usize {
        loop {
            {
                let mut state = self.channel.lock();
                if !state.buffer.is_empty() {
                    return drain_locked(&mut state, buf);
                }
                if state.closed {
                    return 0;
                }
            }
            thread::sleep(interval);
        }
    }
}

impl io::Read for BlockingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let n = match self.strategy {
            WaitStrategy::Notify => self.read_notify(buf),
            WaitStrategy::Poll { interval } => self.read_poll(buf, interval),
        };
        Ok(n)
    }
}

/// inbound チャンネル上のノンブロッキング `std::io::Read` 実装
///
/// スレッドを持てないホスト（wasm32）で、ドライバを 1 ステップずつ
/// 進めるときの入力。待つ代わりに `WouldBlock` を返し、次のステップで
/// もう一度読まれる。
///
/// ## 戻り値の規約
/// - 空で開いている間は `Err(WouldBlock)`。`Ok(0)` は返さない
/// - close 済みかつ空なら `Ok(0)`
#[derive(Debug, Clone)]
pub struct NonBlockingReader {
    channel: ByteChannel,
}

impl NonBlockingReader {
    pub fn new(channel: ByteChannel) -> Self {
        NonBlockingReader { channel }
    }
}

impl io::Read for NonBlockingReader {
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        if buf.is_empty() {
            return Ok(0);
        }
        let mut state = self.channel.lock();
        if !state.buffer.is_empty() {
            return Ok(drain_locked(&mut state, buf));
        }
        if state.closed {
            return Ok(0);
        }
        Err(io::ErrorKind::WouldBlock.into())
    }
}
