//! Bridge 本体

use std::sync::{Mutex, MutexGuard, PoisonError};
use std::thread::{self, JoinHandle};

use serde::Serialize;
use tracing::{debug, error, info};

use tea_driver::{
    Event, EventSender, Model, Program, ProgramError, SteppedProgram, WindowSize,
};
use tea_stream::{BlockingReader, ByteChannel, NonBlockingReader, PassthroughWriter};

use crate::config::BridgeConfig;
use crate::error::BridgeError;

type DriverHandle = JoinHandle<Result<(), ProgramError>>;

/// ドライバの動かし方
enum Driver {
    /// 専用スレッドで `Program::run`
    Thread(Option<DriverHandle>),
    /// ホストの `pump` で 1 ステップずつ
    Stepped(Stepped),
}

enum Stepped {
    Running(Box<dyn Step>),
    Exited(Option<Result<(), ProgramError>>),
}

/// モデルの型を消した `SteppedProgram`
trait Step: Send {
    fn step(&mut self, now_ms: u64) -> Result<bool, ProgramError>;
}

impl<M: Model> Step for SteppedProgram<M> {
    fn step(&mut self, now_ms: u64) -> Result<bool, ProgramError> {
        SteppedProgram::step(self, now_ms)
    }
}

/// ホストとプログラムドライバをつなぐ集約
///
/// ## 内部構成
///
/// ```text
/// Bridge
///   ├── inbound   ByteChannel  host → reader → ドライバ
///   ├── outbound  ByteChannel  PassthroughWriter → host
///   ├── events    EventSender  resize をキューへ直接投入
///   └── driver    専用スレッド (start) / ホストが pump する (start_stepped)
/// ```
///
/// 起動時に一度だけ作り、ドライバが終了（quit / 致命的エラー）した時点で
/// 両方のチャンネルを close する。`&self` のメソッドはすべて任意のスレッドから呼べる。
pub struct Bridge {
    inbound: ByteChannel,
    outbound: ByteChannel,
    events: EventSender,
    driver: Mutex<Driver>,
}

/// ブリッジの統計情報
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BridgeStats {
    /// ホストから受け取った総バイト数
    pub bytes_in: u64,
    /// ホストへ渡した総バイト数
    pub bytes_out: u64,
    /// inbound の未読バイト数
    pub inbound_buffered: usize,
    /// outbound の未読バイト数
    pub outbound_buffered: usize,
    /// ドライバが動作中か
    pub running: bool,
}

impl BridgeStats {
    pub fn to_json(&self) -> String {
        // 数値と bool だけなので失敗しない
        serde_json::to_string(self).unwrap_or_default()
    }
}

/// ドライバ終了時（panic を含む）に両方のチャンネルを閉じる
///
/// outbound も閉じるので、途中で切れた UTF-8 の断片も `pull_text_out` で出てくる。
struct CloseOnDrop {
    inbound: ByteChannel,
    outbound: ByteChannel,
}

impl Drop for CloseOnDrop {
    fn drop(&mut self) {
        self.inbound.close();
        self.outbound.close();
    }
}

impl Bridge {
    /// チャンネルを作り、ドライバを専用スレッドで起動する
    ///
    /// native 向け。wasm32 はスレッドを作れないので `start_stepped` を使う。
    ///
    /// # エラー
    /// - スレッドを起動できない
    pub fn start<M: Model>(model: M, config: BridgeConfig) -> Result<Self, BridgeError> {
        let inbound = new_channel("inbound", config.inbound_high_water);
        let outbound = new_channel("outbound", config.outbound_high_water);

        let program = Program::new(model, PassthroughWriter::new(outbound.clone()))
            .with_input(BlockingReader::new(inbound.clone(), config.wait))
            .with_options(config.program_options());
        let events = program.sender();

        let guard = CloseOnDrop {
            inbound: inbound.clone(),
            outbound: outbound.clone(),
        };
        let handle = thread::Builder::new()
            .name("tea-driver".into())
            .spawn(move || {
                let _guard = guard;
                let result = program.run().map(|_model| ());
                match &result {
                    Ok(()) => info!("program driver exited"),
                    Err(err) => error!(%err, "program driver failed"),
                }
                result
            })
            .map_err(BridgeError::Spawn)?;

        info!(wait = ?config.wait, alt_screen = config.alt_screen, "bridge started");

        Ok(Bridge {
            inbound,
            outbound,
            events,
            driver: Mutex::new(Driver::Thread(Some(handle))),
        })
    }

    /// スレッドを作らずに起動する
    ///
    /// 最初のフレームは戻る前に outbound へ書かれる。以降はホストが
    /// タイマーから `pump` を呼ぶたびに、溜まった入力とイベントを処理する。
    /// `config.wait` は使わない（ホストの呼び出し間隔がポーリング間隔になる）。
    pub fn start_stepped<M: Model>(model: M, config: BridgeConfig) -> Result<Self, BridgeError> {
        let inbound = new_channel("inbound", config.inbound_high_water);
        let outbound = new_channel("outbound", config.outbound_high_water);

        let program = Program::new(model, PassthroughWriter::new(outbound.clone()))
            .with_input(NonBlockingReader::new(inbound.clone()))
            .with_options(config.program_options());
        let events = program.sender();

        let stepped = program.into_stepped()?;
        let state = if stepped.is_running() {
            Stepped::Running(Box::new(stepped))
        } else {
            info!("program driver exited");
            inbound.close();
            outbound.close();
            Stepped::Exited(Some(Ok(())))
        };

        info!(alt_screen = config.alt_screen, "bridge started (stepped)");

        Ok(Bridge {
            inbound,
            outbound,
            events,
            driver: Mutex::new(Driver::Stepped(state)),
        })
    }

    /// ステップ駆動のドライバを 1 回進める
    ///
    /// `now_ms` はホストの時計（単調増加）。スレッド版では何もしない。
    ///
    /// # 戻り値
    /// ドライバがまだ動作中なら `true`
    pub fn pump(&self, now_ms: u64) -> bool {
        let mut driver = self.driver_slot();
        let outcome = match &mut *driver {
            Driver::Thread(handle) => return thread_running(handle),
            Driver::Stepped(Stepped::Exited(_)) => return false,
            Driver::Stepped(Stepped::Running(program)) => program.step(now_ms),
        };

        let result = match outcome {
            Ok(true) => return true,
            Ok(false) => {
                info!("program driver exited");
                Ok(())
            }
            Err(err) => {
                error!(%err, "program driver failed");
                Err(err)
            }
        };
        self.inbound.close();
        self.outbound.close();
        *driver = Driver::Stepped(Stepped::Exited(Some(result)));
        false
    }

    /// push-bytes-in: ホストからの入力を inbound に積む
    pub fn push_bytes_in(&self, bytes: &[u8]) {
        debug!(len = bytes.len(), "host -> program");
        self.inbound.append(bytes);
    }

    /// pull-bytes-out: outbound をすべて取り出して空にする
    ///
    /// 何も書かれていなければ空の Vec を返す。
    pub fn pull_bytes_out(&self) -> Vec<u8> {
        let data = self.outbound.drain_all();
        if !data.is_empty() {
            debug!(len = data.len(), "program -> host");
        }
        data
    }

    /// pull-bytes-out の文字列版
    ///
    /// 末尾で切れた UTF-8 文字は次の呼び出しまで outbound に残す。
    pub fn pull_text_out(&self) -> String {
        let text = self.outbound.drain_utf8();
        if !text.is_empty() {
            debug!(len = text.len(), "program -> host");
        }
        text
    }

    /// notify-resize: resize イベントをドライバのキューへ直接投入する
    ///
    /// inbound を経由しないので、read 待ちの最中でも次の描画前に処理される。
    pub fn notify_resize(&self, width: u32, height: u32) {
        let size = WindowSize::new(width, height);
        if self.events.send(Event::Resize(size)) {
            debug!(width, height, "resize injected");
        } else {
            debug!(width, height, "resize dropped: program driver has exited");
        }
    }

    /// ドライバに終了を要求する
    pub fn quit(&self) {
        self.events.quit();
    }

    /// ドライバが動作中か
    pub fn is_running(&self) -> bool {
        match &*self.driver_slot() {
            Driver::Thread(handle) => thread_running(handle),
            Driver::Stepped(state) => matches!(state, Stepped::Running(_)),
        }
    }

    /// ドライバの終了を待ち、その結果を返す
    ///
    /// 2 回目以降の呼び出しは即座に `Ok(())` を返す。
    ///
    /// # エラー
    /// - ドライバのエラー / panic
    /// - ステップ駆動でまだ動作中（待つと進める者がいなくなる）
    pub fn wait(&self) -> Result<(), BridgeError> {
        let handle = match &mut *self.driver_slot() {
            Driver::Thread(handle) => handle.take(),
            Driver::Stepped(Stepped::Running(_)) => return Err(BridgeError::StillRunning),
            Driver::Stepped(Stepped::Exited(result)) => {
                return result.take().unwrap_or(Ok(())).map_err(BridgeError::from);
            }
        };
        let Some(handle) = handle else {
            return Ok(());
        };
        match handle.join() {
            Ok(result) => result.map_err(BridgeError::from),
            Err(panic) => Err(BridgeError::Panicked(panic_message(panic.as_ref()))),
        }
    }

    pub fn stats(&self) -> BridgeStats {
        BridgeStats {
            bytes_in: self.inbound.total_appended(),
            bytes_out: self.outbound.total_drained(),
            inbound_buffered: self.inbound.len(),
            outbound_buffered: self.outbound.len(),
            running: self.is_running(),
        }
    }

    fn driver_slot(&self) -> MutexGuard<'_, Driver> {
        self.driver.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl Drop for Bridge {
    /// ドライバには終了を要求するだけで join はしない
    fn drop(&mut self) {
        self.events.quit();
        self.inbound.close();
    }
}

fn thread_running(handle: &Option<DriverHandle>) -> bool {
    handle.as_ref().is_some_and(|handle| !handle.is_finished())
}

fn new_channel(name: &'static str, high_water: Option<usize>) -> ByteChannel {
    let channel = ByteChannel::new(name);
    match high_water {
        Some(limit) => channel.with_high_water_mark(limit),
        None => channel,
    }
}

fn panic_message(panic: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = panic.downcast_ref::<&str>() {
        (*s).to_owned()
    } else if let Some(s) = panic.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic payload".to_owned()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_panic_message() {
        let boxed: Box<dyn std::any::Any + Send> = Box::new("boom");
        assert_eq!(panic_message(boxed.as_ref()), "boom");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(String::from("bang"));
        assert_eq!(panic_message(boxed.as_ref()), "bang");

        let boxed: Box<dyn std::any::Any + Send> = Box::new(7u8);
        assert_eq!(panic_message(boxed.as_ref()), "unknown panic payload");
    }

    #[test]
    fn test_new_channel_high_water() {
        let ch = new_channel("x", Some(2));
        ch.append(b"abc");
        assert!(ch.is_over_high_water());

        let ch = new_channel("y", None);
        ch.append(&[0u8; 4096]);
        assert!(!ch.is_over_high_water());
    }
}
