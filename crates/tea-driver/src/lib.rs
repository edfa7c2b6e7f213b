//! # tea-driver
//!
//! init → update → view の単純なイベントループ。
//!
//! ## 構成
//!
//! ```text
//! Program<M>
//!   ├── 入力スレッド   Read → 生バイトをキューへ
//!   ├── イベントキュー mpsc（EventSender から resize 等も直接投入できる）
//!   └── メインループ   recv → KeyDecoder → Model::update → Model::view → Write
//! ```
//!
//! スレッドを持てないホストでは `Program::into_stepped` で `SteppedProgram` を
//! 作り、ホストのタイマーから `step(now_ms)` を呼ぶ。1 ステップの処理内容は
//! スレッド版のメインループと同じ。
//!
//! 入力は `std::io::Read` で受け取るので、ブロッキング read を提供できる
//! ものなら何でもつなげる。resize のような構造化データはバイト列に
//! エンコードせず、`EventSender` 経由でキューへ直接入れる。

mod error;
pub mod event;
pub mod key;
pub mod model;
pub mod program;
mod runtime;

pub use error::ProgramError;
pub use event::{Effect, Event, WindowSize};
pub use key::{Key, KeyDecoder};
pub use model::Model;
pub use program::{
    EventSender, Program, ProgramOptions, SteppedProgram, DEFAULT_ESCAPE_TIMEOUT_MS,
};
