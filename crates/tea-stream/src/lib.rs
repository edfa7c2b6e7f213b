//! # tea-stream
//!
//! ホスト（JS）とプログラムドライバの間でバイト列を受け渡すためのチャンネル層。
//!
//! ## 設計の背景
//!
//! 埋め込まれる端末プログラムは「read で待ち、write で書く」古典的なブロッキング
//! ストリームを前提にしている。一方ホストはコールバックでバイトを押し込み、
//! 描画タイミングで出力を引き抜くことしかできない。
//! この差をバッファ 2 本とアダプタ 2 つで吸収する。
//!
//! ```text
//! 入力:
//!   1. Host → inbound.append(data)
//!   2. BlockingReader::read() がデータ到着まで待機
//!   3. ドライバの入力スレッドが drain してキー解析へ
//!
//! 出力:
//!   1. ドライバの描画 → PassthroughWriter::write(frame)
//!   2. outbound に積まれる（ブロックしない）
//!   3. Host → outbound.drain_all() で画面へ
//! ```
//!
//! 2 本のチャンネルは別スレッドから同時に触られるため、append / drain は
//! すべて `Mutex` の内側で行う。
//!
//! スレッドを持てないホストでは `BlockingReader` の代わりに
//! `NonBlockingReader` を使い、ホストのタイマーでドライバを進める。

pub mod channel;
pub mod reader;
pub mod writer;

pub use channel::ByteChannel;
pub use reader::{BlockingReader, NonBlockingReader, WaitStrategy, DEFAULT_POLL_INTERVAL};
pub use writer::PassthroughWriter;
