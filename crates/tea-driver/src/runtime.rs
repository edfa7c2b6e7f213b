//! update → render の 1 ステップ
//!
//! スレッド版 (`Program::run`) とステップ版 (`SteppedProgram`) で共有する。
//! 時刻は呼び出し側がミリ秒で渡す（wasm32 では `Instant` が使えないため）。

use std::io::Write;
use std::sync::mpsc::Sender;

use tracing::{debug, trace};

use crate::error::ProgramError;
use crate::event::{Effect, Event};
use crate::key::{Key, KeyDecoder};
use crate::model::Model;
use crate::program::{Message, ProgramOptions};

/// 代替スクリーンに入る / 出る
const ENTER_ALT_SCREEN: &[u8] = b"\x1b[?1049h\x1b[?25l";
const EXIT_ALT_SCREEN: &[u8] = b"\x1b[?25h\x1b[?1049l";
/// カーソルを左上へ移動して画面消去
const CLEAR_HOME: &[u8] = b"\x1b[H\x1b[2J";

/// ループを続けるか
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Flow {
    Continue,
    Quit,
}

pub(crate) struct Runtime<M: Model> {
    model: M,
    decoder: KeyDecoder,
    renderer: Renderer,
    tx: Sender<Message>,
    escape_timeout_ms: u64,
    /// 保持中の ESC を確定させる時刻
    escape_deadline: Option<u64>,
}

impl<M: Model> Runtime<M> {
    pub(crate) fn new(
        model: M,
        output: Box<dyn Write + Send>,
        options: ProgramOptions,
        tx: Sender<Message>,
    ) -> Self {
        Runtime {
            model,
            decoder: KeyDecoder::new(),
            renderer: Renderer::new(output, options.alt_screen),
            tx,
            escape_timeout_ms: options.escape_timeout_ms,
            escape_deadline: None,
        }
    }

    /// 代替スクリーンに入り、init を適用して最初のフレームを描く
    pub(crate) fn start(&mut self) -> Result<Flow, ProgramError> {
        self.renderer.start()?;
        let flow = apply(self.model.init(), &self.tx);
        self.renderer.render(&self.model.view())?;
        Ok(flow)
    }

    pub(crate) fn handle_message(
        &mut self,
        message: Message,
        now_ms: u64,
    ) -> Result<Flow, ProgramError> {
        match message {
            Message::Event(event) => self.handle_event(&event),
            Message::Input(bytes) => self.handle_input(&bytes, now_ms),
            Message::Quit => {
                debug!("quit requested");
                Ok(Flow::Quit)
            }
            Message::InputClosed => self.end_of_input(),
            Message::InputFailed(err) => Err(ProgramError::Input(err)),
        }
    }

    pub(crate) fn handle_event(&mut self, event: &Event) -> Result<Flow, ProgramError> {
        trace!(?event, "update");
        let flow = apply(self.model.update(event), &self.tx);
        self.renderer.render(&self.model.view())?;
        Ok(flow)
    }

    /// 生の入力バイトをキーに分解して順に update する
    pub(crate) fn handle_input(&mut self, bytes: &[u8], now_ms: u64) -> Result<Flow, ProgramError> {
        let keys = self.decoder.feed(bytes);
        self.escape_deadline = self
            .decoder
            .has_pending_escape()
            .then(|| now_ms.saturating_add(self.escape_timeout_ms));
        self.dispatch_keys(keys)
    }

    pub(crate) fn escape_deadline(&self) -> Option<u64> {
        self.escape_deadline
    }

    /// 期限を過ぎた ESC を単独の ESC として確定させる
    pub(crate) fn expire_escape(&mut self, now_ms: u64) -> Result<Flow, ProgramError> {
        match self.escape_deadline {
            Some(deadline) if now_ms >= deadline => {
                self.escape_deadline = None;
                let keys = self.decoder.flush();
                self.dispatch_keys(keys)
            }
            _ => Ok(Flow::Continue),
        }
    }

    /// 入力が end-of-stream に達した。保持中のバイトを確定させてから終了する
    pub(crate) fn end_of_input(&mut self) -> Result<Flow, ProgramError> {
        debug!("input reached end of stream");
        self.escape_deadline = None;
        let keys = self.decoder.flush();
        self.dispatch_keys(keys)?;
        Ok(Flow::Quit)
    }

    fn dispatch_keys(&mut self, keys: Vec<Key>) -> Result<Flow, ProgramError> {
        for key in keys {
            if self.handle_event(&Event::Key(key))? == Flow::Quit {
                return Ok(Flow::Quit);
            }
        }
        Ok(Flow::Continue)
    }

    pub(crate) fn stop(&mut self) -> Result<(), ProgramError> {
        self.renderer.stop()
    }

    pub(crate) fn into_model(self) -> M {
        self.model
    }
}

/// 副作用を適用し、ループを続けるかを返す
fn apply(effect: Effect, tx: &Sender<Message>) -> Flow {
    match effect {
        Effect::None => Flow::Continue,
        Effect::Quit => Flow::Quit,
        Effect::Send(event) => {
            let _ = tx.send(Message::Event(event));
            Flow::Continue
        }
        Effect::Batch(effects) => effects.into_iter().fold(Flow::Continue, |flow, effect| {
            match apply(effect, tx) {
                Flow::Quit => Flow::Quit,
                Flow::Continue => flow,
            }
        }),
    }
}

/// 描画文字列をフレームとして出力に書き出す
struct Renderer {
    output: Box<dyn Write + Send>,
    alt_screen: bool,
    last_frame: Option<String>,
    started: bool,
}

impl Renderer {
    fn new(output: Box<dyn Write + Send>, alt_screen: bool) -> Self {
        Renderer {
            output,
            alt_screen,
            last_frame: None,
            started: false,
        }
    }

    fn start(&mut self) -> Result<(), ProgramError> {
        self.started = true;
        if self.alt_screen {
            self.write(ENTER_ALT_SCREEN)?;
        }
        Ok(())
    }

    /// 前回と同じフレームは書き出さない
    fn render(&mut self, view: &str) -> Result<(), ProgramError> {
        if self.last_frame.as_deref() == Some(view) {
            return Ok(());
        }

        let mut frame = Vec::with_capacity(CLEAR_HOME.len() + view.len() + 16);
        frame.extend_from_slice(CLEAR_HOME);
        frame.extend_from_slice(view.replace('\n', "\r\n").as_bytes());
        self.write(&frame)?;

        self.last_frame = Some(view.to_owned());
        Ok(())
    }

    /// 2 回目以降は何もしない
    fn stop(&mut self) -> Result<(), ProgramError> {
        if !std::mem::take(&mut self.started) {
            return Ok(());
        }
        if self.alt_screen {
            self.write(EXIT_ALT_SCREEN)?;
        }
        Ok(())
    }

    fn write(&mut self, bytes: &[u8]) -> Result<(), ProgramError> {
        self.output
            .write_all(bytes)
            .and_then(|()| self.output.flush())
            .map_err(ProgramError::Output)
    }
}
