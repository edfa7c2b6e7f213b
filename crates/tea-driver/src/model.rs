//! モデル trait

use crate::event::{Effect, Event};

/// ドライバが駆動するアプリケーション状態
///
/// ドライバ専用スレッドへ移されるので `Send + 'static` が必要。
pub trait Model: Send + 'static {
    /// 起動直後に一度だけ呼ばれる
    fn init(&mut self) -> Effect {
        Effect::None
    }

    /// イベントを 1 つ処理する
    fn update(&mut self, event: &Event) -> Effect;

    /// 現在の状態を描画文字列にする
    fn view(&self) -> String;
}
