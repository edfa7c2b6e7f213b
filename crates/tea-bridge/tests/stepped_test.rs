//! tea-bridge ステップ駆動の統合テスト
//!
//! スレッドを作らず、ホストのタイマー役として `pump(now_ms)` を呼ぶ。
//! 時刻はテストが決めるので、ESC の待ち時間も実時間に依存しない。

use std::sync::{Arc, Mutex};

use tea_bridge::{Bridge, BridgeConfig, BridgeError, Effect, Event, Key, Model, WindowSize};

// ==============================================================
// ヘルパー
// ==============================================================

/// 観測したイベントを記録し、ctrl+c / esc で終了するモデル
struct Recorder {
    seen: Arc<Mutex<Vec<Event>>>,
}

impl Model for Recorder {
    fn update(&mut self, event: &Event) -> Effect {
        self.seen.lock().unwrap().push(event.clone());
        match event {
            Event::Key(Key::Ctrl('c')) | Event::Key(Key::Esc) => Effect::Quit,
            _ => Effect::None,
        }
    }

    fn view(&self) -> String {
        format!("stepped [{}]", self.seen.lock().unwrap().len())
    }
}

fn start(config: BridgeConfig) -> (Bridge, Arc<Mutex<Vec<Event>>>) {
    let seen = Arc::new(Mutex::new(Vec::new()));
    let model = Recorder {
        seen: Arc::clone(&seen),
    };
    let bridge = Bridge::start_stepped(model, config).expect("bridge should start");
    (bridge, seen)
}

fn quiet_config() -> BridgeConfig {
    BridgeConfig {
        alt_screen: false,
        ..BridgeConfig::default()
    }
}

// ==============================================================
// テスト
// ==============================================================

/// 最初のフレームは pump しなくても outbound にある
#[test]
fn test_first_frame_is_written_on_start() {
    let (bridge, _seen) = start(quiet_config());
    assert!(bridge.is_running());
    assert!(bridge.pull_text_out().contains("stepped [0]"));
}

/// pump するまで入力は処理されない。pump で溜まった分がまとめて処理される
#[test]
fn test_pump_processes_buffered_input() {
    let (bridge, seen) = start(quiet_config());

    bridge.push_bytes_in(b"ab");
    bridge.push_bytes_in(b"c");
    assert!(seen.lock().unwrap().is_empty());

    assert!(bridge.pump(0));
    assert_eq!(seen.lock().unwrap().len(), 3);
    assert!(bridge.pull_text_out().contains("stepped [3]"));
    assert_eq!(bridge.stats().inbound_buffered, 0);

    // 何もなければ出力もない
    assert!(bridge.pump(1));
    assert_eq!(bridge.pull_text_out(), "");
}

/// resize は同じ間隔で push されたバイトより先に update される
#[test]
fn test_resize_before_bytes_of_same_tick() {
    let (bridge, seen) = start(quiet_config());

    bridge.notify_resize(80, 24);
    bridge.push_bytes_in(b"a");
    assert!(bridge.pump(0));

    assert_eq!(
        seen.lock().unwrap().as_slice(),
        &[
            Event::Resize(WindowSize::new(80, 24)),
            Event::Key(Key::Char('a')),
        ]
    );
}

/// ESC と続きが別々の pump で届いても 1 つのシーケンスになる
#[test]
fn test_escape_sequence_split_across_pumps() {
    let config = BridgeConfig {
        read_buffer_size: 1,
        ..quiet_config()
    };
    let (bridge, seen) = start(config);

    bridge.push_bytes_in(b"\x1b");
    assert!(bridge.pump(1_000));
    bridge.push_bytes_in(b"[Z");
    assert!(bridge.pump(1_050));

    let events = seen.lock().unwrap().clone();
    assert_eq!(events.len(), 1);
    assert!(matches!(&events[0], Event::Key(k) if k.is_back_tab()));
    assert!(bridge.is_running());
}

/// 続きの来ない ESC は待ち時間を過ぎた pump で ESC になる
#[test]
fn test_lone_escape_quits_after_timeout() {
    let config = BridgeConfig {
        escape_timeout_ms: 100,
        ..quiet_config()
    };
    let (bridge, seen) = start(config);

    bridge.push_bytes_in(b"\x1b");
    assert!(bridge.pump(5_000));
    assert!(bridge.pump(5_099));
    assert!(!bridge.pump(5_100));

    assert_eq!(seen.lock().unwrap().as_slice(), &[Event::Key(Key::Esc)]);
    assert!(!bridge.is_running());
    bridge.wait().unwrap();
}

/// 動作中の wait は待たずにエラーを返す
#[test]
fn test_wait_while_running() {
    let (bridge, _seen) = start(quiet_config());
    assert!(matches!(bridge.wait(), Err(BridgeError::StillRunning)));

    bridge.quit();
    assert!(!bridge.pump(0));
    bridge.wait().unwrap();
    // 2 回目もすぐ返る
    bridge.wait().unwrap();
}

/// 終了後の入口呼び出しは何もしない
#[test]
fn test_entry_points_after_exit_are_noops() {
    let config = BridgeConfig {
        alt_screen: true,
        ..BridgeConfig::default()
    };
    let (bridge, seen) = start(config);

    bridge.push_bytes_in(b"\x03");
    assert!(!bridge.pump(0));
    let out = bridge.pull_text_out();
    assert!(out.starts_with("\x1b[?1049h"));
    assert!(out.ends_with("\x1b[?1049l"));

    let observed = seen.lock().unwrap().len();
    bridge.push_bytes_in(b"late");
    bridge.notify_resize(1, 1);
    assert!(!bridge.pump(1));

    assert_eq!(seen.lock().unwrap().len(), observed);
    let stats = bridge.stats();
    assert_eq!(stats.inbound_buffered, 0);
    assert_eq!(stats.outbound_buffered, 0);
    assert!(!stats.running);
}

/// init で終了するモデルは起動直後から停止している
#[test]
fn test_model_quitting_in_init() {
    struct Once;
    impl Model for Once {
        fn init(&mut self) -> Effect {
            Effect::Quit
        }
        fn update(&mut self, _event: &Event) -> Effect {
            Effect::None
        }
        fn view(&self) -> String {
            "bye".into()
        }
    }

    let bridge = Bridge::start_stepped(Once, quiet_config()).unwrap();
    assert!(!bridge.is_running());
    assert!(bridge.pull_text_out().contains("bye"));
    bridge.wait().unwrap();
}
