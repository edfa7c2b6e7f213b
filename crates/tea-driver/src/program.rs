//! プログラムドライバ
//!
//! 2 通りの動かし方がある。
//!
//! - `Program::run`: 入力スレッドとメインループの 2 本で動く。メインループは
//!   イベントキューだけを待つので、入力が止まっていても `EventSender` からの
//!   イベントは処理される。
//! - `Program::into_stepped`: スレッドを作らず、ホストが `SteppedProgram::step`
//!   を定期的に呼んで進める。wasm32 のようにスレッドを持てない環境向け。

use std::io::{self, Read, Write};
use std::sync::mpsc::{self, Receiver, RecvTimeoutError, Sender, TryRecvError};
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ProgramError;
use crate::event::Event;
use crate::model::Model;
use crate::runtime::{Flow, Runtime};

/// 入力スレッドの read バッファのデフォルトサイズ
const DEFAULT_READ_BUFFER_SIZE: usize = 256;
/// 単独の ESC とみなすまで続きを待つ時間のデフォルト
pub const DEFAULT_ESCAPE_TIMEOUT_MS: u64 = 250;

/// キューを流れる内部メッセージ
#[derive(Debug)]
pub(crate) enum Message {
    Event(Event),
    /// 入力スレッドが読んだ生バイト（キー解析はメインループ側）
    Input(Vec<u8>),
    Quit,
    InputClosed,
    InputFailed(io::Error),
}

/// ドライバのイベントキューへの投入口
///
/// `Clone + Send + Sync`。どのスレッドからでも、read や描画の最中でも
/// 安全に呼べる。
#[derive(Debug, Clone)]
pub struct EventSender {
    tx: Sender<Message>,
}

impl EventSender {
    /// イベントを積む
    ///
    /// # 戻り値
    /// プログラムが既に終了していれば `false`
    pub fn send(&self, event: Event) -> bool {
        self.tx.send(Message::Event(event)).is_ok()
    }

    /// 終了を要求する
    pub fn quit(&self) -> bool {
        self.tx.send(Message::Quit).is_ok()
    }
}

/// ドライバの起動オプション
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ProgramOptions {
    /// 代替スクリーンで描画する
    pub alt_screen: bool,
    /// 1 回の read サイズ
    pub read_buffer_size: usize,
    /// 末尾の ESC を単独の ESC と確定させるまでの待ち時間
    pub escape_timeout_ms: u64,
}

impl Default for ProgramOptions {
    fn default() -> Self {
        ProgramOptions {
            alt_screen: false,
            read_buffer_size: DEFAULT_READ_BUFFER_SIZE,
            escape_timeout_ms: DEFAULT_ESCAPE_TIMEOUT_MS,
        }
    }
}

/// init → update → view ループ
///
/// ## 使い方
///
/// ```no_run
/// # use tea_driver::{Effect, Event, Model, Program};
/// struct Hello;
///
/// impl Model for Hello {
///     fn update(&mut self, _event: &Event) -> Effect {
///         Effect::Quit
///     }
///     fn view(&self) -> String {
///         "hello".into()
///     }
/// }
///
/// let program = Program::new(Hello, std::io::stdout()).with_input(std::io::stdin());
/// let _model = program.run()?;
/// # Ok::<(), tea_driver::ProgramError>(())
/// ```
pub struct Program<M: Model> {
    model: M,
    input: Option<Box<dyn Read + Send>>,
    output: Box<dyn Write + Send>,
    options: ProgramOptions,
    tx: Sender<Message>,
    rx: Receiver<Message>,
}

impl<M: Model> Program<M> {
    pub fn new(model: M, output: impl Write + Send + 'static) -> Self {
        let (tx, rx) = mpsc::channel();
        Program {
            model,
            input: None,
            output: Box::new(output),
            options: ProgramOptions::default(),
            tx,
            rx,
        }
    }

    /// 入力をつなぐ
    ///
    /// `run` ではブロッキング read、`into_stepped` では `WouldBlock` を返す
    /// ノンブロッキング read を渡す。どちらも `Ok(0)` は end-of-stream とみなして
    /// 終了する。
    pub fn with_input(mut self, input: impl Read + Send + 'static) -> Self {
        self.input = Some(Box::new(input));
        self
    }

    pub fn with_options(mut self, options: ProgramOptions) -> Self {
        self.options = options;
        self
    }

    /// イベントキューへの投入口を取得する（`run` の前に取っておく）
    pub fn sender(&self) -> EventSender {
        EventSender {
            tx: self.tx.clone(),
        }
    }

    /// プログラムを実行し、終了後のモデルを返す
    ///
    /// 呼び出しスレッドをブロックする。入力スレッドは切り離されたまま残り、
    /// 入力が end-of-stream を返した時点で終了する。
    pub fn run(self) -> Result<M, ProgramError> {
        let Program {
            model,
            input,
            output,
            options,
            tx,
            rx,
        } = self;

        if let Some(input) = input {
            spawn_input_reader(input, tx.clone(), options.read_buffer_size.max(1))?;
        }

        let mut runtime = Runtime::new(model, output, options, tx);
        let result = event_loop(&mut runtime, &rx);
        let stopped = runtime.stop();

        result?;
        stopped?;
        Ok(runtime.into_model())
    }

    /// スレッドを使わずに起動し、最初のフレームまで描画する
    ///
    /// 以降はホストが `SteppedProgram::step` を呼んで進める。
    pub fn into_stepped(self) -> Result<SteppedProgram<M>, ProgramError> {
        let Program {
            model,
            input,
            output,
            options,
            tx,
            rx,
        } = self;

        let mut runtime = Runtime::new(model, output, options, tx);
        let running = match runtime.start() {
            Ok(Flow::Continue) => true,
            Ok(Flow::Quit) => {
                runtime.stop()?;
                false
            }
            Err(err) => {
                let _ = runtime.stop();
                return Err(err);
            }
        };

        Ok(SteppedProgram {
            runtime,
            input,
            rx,
            buf: vec![0u8; options.read_buffer_size.max(1)],
            running,
        })
    }
}

fn event_loop<M: Model>(
    runtime: &mut Runtime<M>,
    rx: &Receiver<Message>,
) -> Result<(), ProgramError> {
    let clock = Instant::now();
    let now_ms = || clock.elapsed().as_millis() as u64;

    if runtime.start()? == Flow::Quit {
        return Ok(());
    }

    loop {
        // runtime が tx を持っているので切断エラーになることはない
        let message = match runtime.escape_deadline() {
            Some(deadline) => {
                let wait = Duration::from_millis(deadline.saturating_sub(now_ms()));
                match rx.recv_timeout(wait) {
                    Ok(message) => message,
                    Err(RecvTimeoutError::Timeout) => {
                        if runtime.expire_escape(now_ms())? == Flow::Quit {
                            return Ok(());
                        }
                        continue;
                    }
                    Err(RecvTimeoutError::Disconnected) => return Ok(()),
                }
            }
            None => match rx.recv() {
                Ok(message) => message,
                Err(_) => return Ok(()),
            },
        };

        if runtime.handle_message(message, now_ms())? == Flow::Quit {
            return Ok(());
        }
    }
}

fn spawn_input_reader(
    mut input: Box<dyn Read + Send>,
    tx: Sender<Message>,
    buffer_size: usize,
) -> Result<(), ProgramError> {
    thread::Builder::new()
        .name("tea-input".into())
        .spawn(move || {
            let mut buf = vec![0u8; buffer_size];
            loop {
                match input.read(&mut buf) {
                    Ok(0) => {
                        let _ = tx.send(Message::InputClosed);
                        return;
                    }
                    Ok(n) => {
                        if tx.send(Message::Input(buf[..n].to_vec())).is_err() {
                            // メインループは終了済み
                            return;
                        }
                    }
                    Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                    Err(err) => {
                        let _ = tx.send(Message::InputFailed(err));
                        return;
                    }
                }
            }
        })
        .map_err(ProgramError::Spawn)?;
    Ok(())
}

/// ホストが進めるプログラム
///
/// `step` 1 回で、キューのイベント → 読めるだけの入力 → キューのイベント
/// （update が `Effect::Send` で積んだもの）→ ESC の期限切れ、の順に処理する。
/// キューに先に積まれた resize は、同じステップで読んだ入力より先に
/// update される。
///
/// `now_ms` はホストの時計（JS なら `Date.now()`）。単調増加であればよい。
pub struct SteppedProgram<M: Model> {
    runtime: Runtime<M>,
    input: Option<Box<dyn Read + Send>>,
    rx: Receiver<Message>,
    buf: Vec<u8>,
    running: bool,
}

impl<M: Model> SteppedProgram<M> {
    pub fn is_running(&self) -> bool {
        self.running
    }

    /// 1 ステップ進める
    ///
    /// # 戻り値
    /// まだ動作中なら `true`。終了後に呼んでも何もせず `false`。
    pub fn step(&mut self, now_ms: u64) -> Result<bool, ProgramError> {
        if !self.running {
            return Ok(false);
        }
        match self.advance(now_ms) {
            Ok(Flow::Continue) => Ok(true),
            Ok(Flow::Quit) => {
                self.running = false;
                self.runtime.stop()?;
                Ok(false)
            }
            Err(err) => {
                self.running = false;
                let _ = self.runtime.stop();
                Err(err)
            }
        }
    }

    pub fn into_model(self) -> M {
        self.runtime.into_model()
    }

    fn advance(&mut self, now_ms: u64) -> Result<Flow, ProgramError> {
        if self.drain_queue(now_ms)? == Flow::Quit {
            return Ok(Flow::Quit);
        }
        if self.read_input(now_ms)? == Flow::Quit {
            return Ok(Flow::Quit);
        }
        if self.drain_queue(now_ms)? == Flow::Quit {
            return Ok(Flow::Quit);
        }
        self.runtime.expire_escape(now_ms)
    }

    fn drain_queue(&mut self, now_ms: u64) -> Result<Flow, ProgramError> {
        loop {
            let message = match self.rx.try_recv() {
                Ok(message) => message,
                Err(TryRecvError::Empty) => return Ok(Flow::Continue),
                Err(TryRecvError::Disconnected) => return Ok(Flow::Quit),
            };
            if self.runtime.handle_message(message, now_ms)? == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }
    }

    /// `WouldBlock` まで読む
    fn read_input(&mut self, now_ms: u64) -> Result<Flow, ProgramError> {
        let Some(input) = self.input.as_mut() else {
            return Ok(Flow::Continue);
        };
        loop {
            match input.read(&mut self.buf) {
                Ok(0) => {
                    self.input = None;
                    return self.runtime.end_of_input();
                }
                Ok(n) => {
                    if self.runtime.handle_input(&self.buf[..n], now_ms)? == Flow::Quit {
                        return Ok(Flow::Quit);
                    }
                }
                Err(err) if err.kind() == io::ErrorKind::WouldBlock => return Ok(Flow::Continue),
                Err(err) if err.kind() == io::ErrorKind::Interrupted => continue,
                Err(err) => return Err(ProgramError::Input(err)),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::event::{Effect, WindowSize};
    use crate::key::Key;
    use std::io::Cursor;
    use std::sync::{Arc, Mutex};

    /// 受け取ったイベントを記録し、'q' で終了するモデル
    #[derive(Default)]
    struct Recorder {
        events: Vec<Event>,
    }

    impl Model for Recorder {
        fn update(&mut self, event: &Event) -> Effect {
            self.events.push(event.clone());
            match event {
                Event::Key(Key::Char('q')) => Effect::Quit,
                _ => Effect::None,
            }
        }

        fn view(&self) -> String {
            format!("events: {}\nlast", self.events.len())
        }
    }

    /// テスト用の共有出力
    #[derive(Clone, Default)]
    struct SharedOutput(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedOutput {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }
        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    impl SharedOutput {
        fn text(&self) -> String {
            String::from_utf8_lossy(&self.0.lock().unwrap()).into_owned()
        }
    }

    #[test]
    fn test_runs_until_quit_key() {
        let out = SharedOutput::default();
        let program = Program::new(Recorder::default(), out.clone())
            .with_input(Cursor::new(b"abq-ignored".to_vec()));

        let model = program.run().unwrap();
        assert_eq!(
            model.events,
            vec![
                Event::Key(Key::Char('a')),
                Event::Key(Key::Char('b')),
                Event::Key(Key::Char('q')),
            ]
        );
        assert!(out.text().contains("events: 3\r\nlast"));
    }

    #[test]
    fn test_end_of_input_stops_program() {
        let program = Program::new(Recorder::default(), io::sink())
            .with_input(Cursor::new(b"xy".to_vec()));
        let model = program.run().unwrap();
        assert_eq!(model.events.len(), 2);
    }

    #[test]
    fn test_sender_events_without_input() {
        let program = Program::new(Recorder::default(), io::sink());
        let sender = program.sender();
        assert!(sender.send(Event::Resize(WindowSize::new(80, 24))));
        assert!(sender.quit());

        let model = program.run().unwrap();
        assert_eq!(model.events, vec![Event::Resize(WindowSize::new(80, 24))]);

        // 終了後の送信は失敗する
        assert!(!sender.send(Event::Resize(WindowSize::new(1, 1))));
    }

    #[test]
    fn test_identical_frames_are_skipped() {
        struct Static;
        impl Model for Static {
            fn update(&mut self, _event: &Event) -> Effect {
                Effect::None
            }
            fn view(&self) -> String {
                "same".into()
            }
        }

        let out = SharedOutput::default();
        let program = Program::new(Static, out.clone()).with_input(Cursor::new(b"abc".to_vec()));
        program.run().unwrap();
        assert_eq!(out.text().matches("same").count(), 1);
    }

    #[test]
    fn test_alt_screen_wraps_session() {
        let out = SharedOutput::default();
        let program = Program::new(Recorder::default(), out.clone())
            .with_input(Cursor::new(b"q".to_vec()))
            .with_options(ProgramOptions {
                alt_screen: true,
                ..ProgramOptions::default()
            });
        program.run().unwrap();

        let text = out.text();
        assert!(text.starts_with("\x1b[?1049h"));
        assert!(text.ends_with("\x1b[?1049l"));
    }

    #[test]
    fn test_effect_send_and_batch() {
        struct Echo {
            resizes: u32,
        }
        impl Model for Echo {
            fn init(&mut self) -> Effect {
                Effect::batch([
                    Effect::Send(Event::Resize(WindowSize::new(10, 5))),
                    Effect::None,
                ])
            }
            fn update(&mut self, event: &Event) -> Effect {
                match event {
                    Event::Resize(_) => {
                        self.resizes += 1;
                        Effect::Quit
                    }
                    _ => Effect::None,
                }
            }
            fn view(&self) -> String {
                String::new()
            }
        }

        let model = Program::new(Echo { resizes: 0 }, io::sink()).run().unwrap();
        assert_eq!(model.resizes, 1);
    }

    #[test]
    fn test_input_error_is_reported() {
        struct Broken;
        impl Read for Broken {
            fn read(&mut self, _buf: &mut [u8]) -> io::Result<usize> {
                Err(io::Error::new(io::ErrorKind::BrokenPipe, "gone"))
            }
        }

        let result = Program::new(Recorder::default(), io::sink())
            .with_input(Broken)
            .run();
        assert!(matches!(result, Err(ProgramError::Input(_))));
    }

    #[test]
    fn test_blocking_reader_input() {
        use tea_stream::{BlockingReader, ByteChannel, PassthroughWriter, WaitStrategy};

        let inbound = ByteChannel::new("inbound");
        let outbound = ByteChannel::new("outbound");
        let program = Program::new(Recorder::default(), PassthroughWriter::new(outbound.clone()))
            .with_input(BlockingReader::new(inbound.clone(), WaitStrategy::Notify));

        let handle = thread::spawn(move || program.run());
        inbound.append(b"hq");

        let model = handle.join().unwrap().unwrap();
        assert_eq!(model.events.len(), 2);
        assert!(String::from_utf8_lossy(&outbound.drain_all()).contains("events: 2"));
        inbound.close();
    }

    #[test]
    fn test_sequence_split_by_one_byte_reads() {
        let program = Program::new(Recorder::default(), io::sink())
            .with_input(Cursor::new(b"\x1b[Zq".to_vec()))
            .with_options(ProgramOptions {
                read_buffer_size: 1,
                ..ProgramOptions::default()
            });

        let model = program.run().unwrap();
        assert_eq!(
            model.events,
            vec![
                Event::Key(Key::Sequence(Key::BACK_TAB.to_vec())),
                Event::Key(Key::Char('q')),
            ]
        );
    }

    #[test]
    fn test_lone_escape_is_delivered_after_timeout() {
        use tea_stream::{BlockingReader, ByteChannel, WaitStrategy};

        let inbound = ByteChannel::new("inbound");
        let program = Program::new(Recorder::default(), io::sink())
            .with_input(BlockingReader::new(inbound.clone(), WaitStrategy::Notify))
            .with_options(ProgramOptions {
                escape_timeout_ms: 20,
                ..ProgramOptions::default()
            });

        let handle = thread::spawn(move || program.run());
        inbound.append(b"\x1b");
        thread::sleep(Duration::from_millis(200));
        inbound.append(b"q");

        let model = handle.join().unwrap().unwrap();
        assert_eq!(
            model.events,
            vec![Event::Key(Key::Esc), Event::Key(Key::Char('q'))]
        );
        inbound.close();
    }

    // ==============================================================
    // SteppedProgram
    // ==============================================================

    fn stepped(
        inbound: &tea_stream::ByteChannel,
        out: &SharedOutput,
    ) -> (SteppedProgram<Recorder>, EventSender) {
        let program = Program::new(Recorder::default(), out.clone())
            .with_input(tea_stream::NonBlockingReader::new(inbound.clone()))
            .with_options(ProgramOptions {
                escape_timeout_ms: 100,
                ..ProgramOptions::default()
            });
        let sender = program.sender();
        (program.into_stepped().unwrap(), sender)
    }

    #[test]
    fn test_stepped_renders_first_frame_without_step() {
        let inbound = tea_stream::ByteChannel::new("inbound");
        let out = SharedOutput::default();
        let (program, _sender) = stepped(&inbound, &out);

        assert!(program.is_running());
        assert!(out.text().contains("events: 0"));
    }

    #[test]
    fn test_stepped_queue_is_handled_before_input() {
        let inbound = tea_stream::ByteChannel::new("inbound");
        let out = SharedOutput::default();
        let (mut program, sender) = stepped(&inbound, &out);

        sender.send(Event::Resize(WindowSize::new(40, 10)));
        inbound.append(b"ab");
        assert!(program.step(0).unwrap());
        // 入力がなくても step は戻る
        assert!(program.step(1).unwrap());

        let model = program.into_model();
        assert_eq!(
            model.events,
            vec![
                Event::Resize(WindowSize::new(40, 10)),
                Event::Key(Key::Char('a')),
                Event::Key(Key::Char('b')),
            ]
        );
        assert!(out.text().contains("events: 3"));
    }

    #[test]
    fn test_stepped_escape_waits_for_host_clock() {
        let inbound = tea_stream::ByteChannel::new("inbound");
        let out = SharedOutput::default();
        let (mut program, _sender) = stepped(&inbound, &out);

        inbound.append(b"\x1b");
        assert!(program.step(1_000).unwrap());
        inbound.append(b"[A");
        assert!(program.step(1_050).unwrap());

        inbound.append(b"\x1b");
        assert!(program.step(2_000).unwrap());
        assert!(program.step(2_099).unwrap());
        assert!(program.step(2_100).unwrap());

        let model = program.into_model();
        assert_eq!(
            model.events,
            vec![
                Event::Key(Key::Sequence(b"\x1b[A".to_vec())),
                Event::Key(Key::Esc),
            ]
        );
    }

    #[test]
    fn test_stepped_quit_and_end_of_input() {
        let inbound = tea_stream::ByteChannel::new("inbound");
        let out = SharedOutput::default();
        let (mut program, _sender) = stepped(&inbound, &out);

        inbound.append(b"xq");
        assert!(!program.step(0).unwrap());
        assert!(!program.is_running());
        // 終了後は何もしない
        inbound.append(b"y");
        assert!(!program.step(1).unwrap());
        assert_eq!(program.into_model().events.len(), 2);

        let inbound = tea_stream::ByteChannel::new("inbound");
        let (mut program, _sender) = stepped(&inbound, &out);
        inbound.append(b"z");
        inbound.close();
        assert!(!program.step(0).unwrap());
        assert_eq!(program.into_model().events, vec![Event::Key(Key::Char('z'))]);
    }

    #[test]
    fn test_stepped_sender_quit() {
        let inbound = tea_stream::ByteChannel::new("inbound");
        let out = SharedOutput::default();
        let (mut program, sender) = stepped(&inbound, &out);

        assert!(sender.quit());
        assert!(!program.step(0).unwrap());
    }

    #[test]
    fn test_stepped_alt_screen_is_left_once() {
        let inbound = tea_stream::ByteChannel::new("inbound");
        let out = SharedOutput::default();
        let mut program = Program::new(Recorder::default(), out.clone())
            .with_input(tea_stream::NonBlockingReader::new(inbound.clone()))
            .with_options(ProgramOptions {
                alt_screen: true,
                ..ProgramOptions::default()
            })
            .into_stepped()
            .unwrap();

        inbound.append(b"q");
        assert!(!program.step(0).unwrap());
        assert!(!program.step(1).unwrap());

        let text = out.text();
        assert!(text.starts_with("\x1b[?1049h"));
        assert!(text.ends_with("\x1b[?1049l"));
        assert_eq!(text.matches("\x1b[?1049l").count(), 1);
    }
}
