//! # tea-bridge
//!
//! ホストとプログラムドライバをつなぐ集約。
//!
//! ## ホストから見た入口
//!
//! | 入口 | 動作 |
//! |------|------|
//! | [`Bridge::push_bytes_in`] | inbound に積む |
//! | [`Bridge::pull_bytes_out`] | outbound を取り出して空にする |
//! | [`Bridge::notify_resize`] | resize イベントをドライバのキューへ直接投入 |
//!
//! ドライバの動かし方は 2 通り。
//!
//! - [`Bridge::start`]: ドライバを専用スレッドで動かす（native）。入口はどれも
//!   ホストのコールバックスレッドから呼ぶ前提で、ドライバのスレッドとは同期して
//!   いない。ブロッキング read はドライバ側の入力スレッドでのみ起きる。
//! - [`Bridge::start_stepped`]: スレッドを作らない（wasm32）。ホストのタイマーが
//!   [`Bridge::pump`] を呼ぶたびに、溜まった入力とイベントを処理して描画する。

mod bridge;
pub mod config;
mod error;

pub use bridge::{Bridge, BridgeStats};
pub use config::BridgeConfig;
pub use error::BridgeError;

pub use tea_driver::{Effect, Event, Key, Model, WindowSize};
pub use tea_stream::WaitStrategy;
