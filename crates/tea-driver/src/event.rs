//! イベントと副作用

use crate::key::Key;

/// 表示領域のサイズ変更
///
/// ホストの resize 通知ごとに生成され、イベントキューで一度だけ消費される。
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowSize {
    pub width: u32,
    pub height: u32,
}

impl WindowSize {
    pub fn new(width: u32, height: u32) -> Self {
        WindowSize { width, height }
    }
}

/// モデルに届くイベント
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    /// 入力バイト列から解析したキー
    Key(Key),
    /// サイズ変更（バイト列を経由しない）
    Resize(WindowSize),
}

/// `Model::init` / `Model::update` が返す副作用
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Effect {
    /// 何もしない
    #[default]
    None,
    /// プログラムを終了する
    Quit,
    /// 自分自身のキューにイベントを積む
    Send(Event),
    /// 複数の副作用を順に適用する
    Batch(Vec<Effect>),
}

impl Effect {
    /// `None` を除いて束ねる。中身が 1 つならそのまま返す。
    pub fn batch(effects: impl IntoIterator<Item = Effect>) -> Effect {
        let mut effects: Vec<Effect> = effects
            .into_iter()
            .filter(|e| *e != Effect::None)
            .collect();
        match effects.len() {
            0 => Effect::None,
            1 => effects.remove(0),
            _ => Effect::Batch(effects),
        }
    }
}
