//! ドライバのエラー型

use std::io;

use thiserror::Error;

/// プログラム実行中の致命的エラー
///
/// どれも回復不能で、発生した時点でループは終了する。
#[derive(Debug, Error)]
pub enum ProgramError {
    /// 入力の read に失敗
    #[error("input read failed: {0}")]
    Input(#[source] io::Error),
    /// 出力の write に失敗
    #[error("output write failed: {0}")]
    Output(#[source] io::Error),
    /// 入力スレッドを起動できない
    #[error("failed to spawn input thread: {0}")]
    Spawn(#[source] io::Error),
}
