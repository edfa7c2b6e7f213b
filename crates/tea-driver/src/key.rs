//! 入力バイト列 → キー
//!
//! 制御文字と UTF-8 文字だけを解釈する。ESC で始まるシーケンスは中身を
//! 解釈せず `Key::Sequence` としてそのまま渡す。
//!
//! read の境界はどこにでも来るので、末尾の ESC や終端前の `ESC [` / `ESC O` は
//! 次の `feed` まで保持する。続きが来なければ呼び出し側が `flush` で確定させる。

use std::mem;

/// 終端が見つからない CSI をこの長さで打ち切る
const MAX_SEQUENCE_LEN: usize = 32;

/// 解析済みのキー入力
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    /// 通常の文字
    Char(char),
    /// CR / LF
    Enter,
    Tab,
    /// DEL / BS
    Backspace,
    /// 単独の ESC
    Esc,
    /// ctrl+文字（`Ctrl('c')` = 0x03）
    Ctrl(char),
    /// ESC で始まる未解釈のシーケンス（矢印キー、shift+tab など）
    Sequence(Vec<u8>),
}

impl Key {
    /// shift+tab が送ってくるシーケンス
    pub const BACK_TAB: &'static [u8] = b"\x1b[Z";

    pub fn is_back_tab(&self) -> bool {
        matches!(self, Key::Sequence(seq) if seq.as_slice() == Self::BACK_TAB)
    }
}

/// バイト列を `Key` に分解する
///
/// read の境界で UTF-8 文字やエスケープシーケンスが分断されることがあるので、
/// 未完成の末尾は次の `feed` まで保持する。
#[derive(Debug, Default)]
pub struct KeyDecoder {
    pending: Vec<u8>,
}

impl KeyDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    /// 次の続きを待っているバイトがあるか
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }

    /// 保持中の末尾が ESC で始まるか（単独 ESC か、未完成のシーケンス）
    pub fn has_pending_escape(&self) -> bool {
        self.pending.first() == Some(&0x1b)
    }

    /// 保持中の末尾を続きを待たずに確定させる
    ///
    /// 単独の ESC は `Key::Esc`、未完成のシーケンスはそのまま `Key::Sequence`、
    /// 途切れた UTF-8 は U+FFFD になる。
    pub fn flush(&mut self) -> Vec<Key> {
        let pending = mem::take(&mut self.pending);
        match pending.as_slice() {
            [] => Vec::new(),
            [0x1b] => vec![Key::Esc],
            [0x1b, ..] => vec![Key::Sequence(pending)],
            _ => vec![Key::Char(char::REPLACEMENT_CHARACTER)],
        }
    }

    /// 受け取ったバイト列を解析する
    pub fn feed(&mut self, bytes: &[u8]) -> Vec<Key> {
        let mut data = mem::take(&mut self.pending);
        data.extend_from_slice(bytes);

        let mut keys = Vec::new();
        let mut i = 0;
        while i < data.len() {
            let b = data[i];
            let (key, len) = match b {
                0x1b => match escape_len(&data[i..]) {
                    Some(1) => (Key::Esc, 1),
                    Some(len) => (Key::Sequence(data[i..i + len].to_vec()), len),
                    None => {
                        self.pending = data[i..].to_vec();
                        break;
                    }
                },
                b'\r' | b'\n' => (Key::Enter, 1),
                b'\t' => (Key::Tab, 1),
                0x7f | 0x08 => (Key::Backspace, 1),
                0x01..=0x1a => (Key::Ctrl((b - 1 + b'a') as char), 1),
                0x00..=0x1f => (Key::Ctrl((b + 0x40) as char), 1),
                _ => {
                    let need = utf8_width(b);
                    if need == 0 {
                        (Key::Char(char::REPLACEMENT_CHARACTER), 1)
                    } else if i + need > data.len() {
                        self.pending = data[i..].to_vec();
                        break;
                    } else {
                        match std::str::from_utf8(&data[i..i + need]) {
                            Ok(s) => match s.chars().next() {
                                Some(c) => (Key::Char(c), need),
                                None => (Key::Char(char::REPLACEMENT_CHARACTER), need),
                            },
                            Err(_) => (Key::Char(char::REPLACEMENT_CHARACTER), 1),
                        }
                    }
                }
            };
            keys.push(key);
            i += len;
        }
        keys
    }
}

/// ESC で始まる部分の長さ
///
/// 続きのバイトでまだ意味が変わりうる場合は `None`
fn escape_len(data: &[u8]) -> Option<usize> {
    if data.len() < 2 {
        return None;
    }
    match data[1] {
        b'[' => {
            // CSI: 0x40..=0x7E の終端バイトまで
            let terminator = data
                .iter()
                .take(MAX_SEQUENCE_LEN)
                .skip(2)
                .position(|b| (0x40..=0x7e).contains(b));
            match terminator {
                Some(j) => Some(j + 3),
                None if data.len() >= MAX_SEQUENCE_LEN => Some(MAX_SEQUENCE_LEN),
                None => None,
            }
        }
        b'O' if data.len() < 3 => None,
        b'O' => Some(3),
        0x1b => Some(1),
        b if b < 0x80 => Some(2),
        _ => Some(1),
    }
}

/// UTF-8 先頭バイトからコードポイントのバイト数を返す（不正なら 0）
fn utf8_width(lead: u8) -> usize {
    match lead {
        0x00..=0x7f => 1,
        0xc2..=0xdf => 2,
        0xe0..=0xef => 3,
        0xf0..=0xf4 => 4,
        _ => 0,
    }
}
