//! 横並びの複数エディタ（デモ用モデル）
//!
//! tab / shift+tab でフォーカス移動、ctrl+n で追加、ctrl+w で削除、
//! esc / ctrl+c で終了。編集は文字追加・改行・後退のみ。

use tea_bridge::{Effect, Event, Key, Model};

/// 起動時のエディタ数
pub const INITIAL_EDITORS: usize = 2;
/// エディタ数の上限
pub const MAX_EDITORS: usize = 6;
/// エディタ数の下限
pub const MIN_EDITORS: usize = 1;
/// ヘルプ行のために空ける高さ
pub const HELP_HEIGHT: u32 = 5;

/// resize を受け取る前に使う表示サイズ
const DEFAULT_WIDTH: u32 = 80;
const DEFAULT_HEIGHT: u32 = 24;

const PLACEHOLDER: &str = "Type something";
const CURSOR: char = '█';
const HELP_SEPARATOR: &str = " • ";

/// キー操作
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Action {
    Next,
    Prev,
    Add,
    Remove,
    Quit,
}

impl Action {
    fn from_key(key: &Key) -> Option<Action> {
        match key {
            Key::Tab => Some(Action::Next),
            k if k.is_back_tab() => Some(Action::Prev),
            Key::Ctrl('n') => Some(Action::Add),
            Key::Ctrl('w') => Some(Action::Remove),
            Key::Esc | Key::Ctrl('c') => Some(Action::Quit),
            _ => None,
        }
    }
}

/// 1 つのエディタ領域
#[derive(Debug, Clone, Default)]
struct Editor {
    text: String,
    focused: bool,
    width: usize,
    height: usize,
}

impl Editor {
    fn handle_key(&mut self, key: &Key) {
        match key {
            Key::Char(c) => self.text.push(*c),
            Key::Enter => self.text.push('\n'),
            Key::Backspace => {
                self.text.pop();
            }
            _ => {}
        }
    }

    /// 枠付きで `height` 行を描画する（各行ちょうど `width` 文字）
    fn render(&self) -> Vec<String> {
        let (w, h) = (self.width, self.height);
        if w < 2 || h < 2 {
            return vec![fit("", w); h];
        }
        let (inner_w, inner_h) = (w - 2, h - 2);

        let mut body: Vec<String> = if self.text.is_empty() {
            vec![format!("{:>3} {}", 1, PLACEHOLDER)]
        } else {
            self.text
                .split('\n')
                .enumerate()
                .map(|(i, line)| format!("{:>3} {}", i + 1, line))
                .collect()
        };
        if self.focused && !self.text.is_empty() {
            if let Some(last) = body.last_mut() {
                last.push(CURSOR);
            }
        }
        // カーソルは常に末尾なので、あふれたら末尾側を見せる
        if body.len() > inner_h {
            body.drain(..body.len() - inner_h);
        }

        let (tl, hz, tr, vt, bl, br) = if self.focused {
            ('╭', '─', '╮', '│', '╰', '╯')
        } else {
            (' ', ' ', ' ', ' ', ' ', ' ')
        };

        let mut rows = Vec::with_capacity(h);
        rows.push(format!("{tl}{}{tr}", hz.to_string().repeat(inner_w)));
        for i in 0..inner_h {
            let line = body.get(i).map(String::as_str).unwrap_or("");
            rows.push(format!("{vt}{}{vt}", fit(line, inner_w)));
        }
        rows.push(format!("{bl}{}{br}", hz.to_string().repeat(inner_w)));
        rows
    }
}

/// 文字数を `width` に切り詰め・空白埋めする
fn fit(s: &str, width: usize) -> String {
    let mut out: String = s.chars().take(width).collect();
    let len = out.chars().count();
    out.extend(std::iter::repeat(' ').take(width - len));
    out
}

/// 横並びエディタのモデル
#[derive(Debug, Clone)]
pub struct SplitEditors {
    width: u32,
    height: u32,
    editors: Vec<Editor>,
    focus: usize,
}

impl SplitEditors {
    pub fn new() -> Self {
        let mut model = SplitEditors {
            width: 0,
            height: 0,
            editors: vec![Editor::default(); INITIAL_EDITORS],
            focus: 0,
        };
        model.editors[0].focused = true;
        model.size_editors();
        model
    }

    pub fn editor_count(&self) -> usize {
        self.editors.len()
    }

    pub fn focus(&self) -> usize {
        self.focus
    }

    /// 最後に受け取った表示サイズ（未受信なら `(0, 0)`）
    pub fn size(&self) -> (u32, u32) {
        (self.width, self.height)
    }

    pub fn editor_text(&self, index: usize) -> Option<&str> {
        self.editors.get(index).map(|e| e.text.as_str())
    }

    fn can_add(&self) -> bool {
        self.editors.len() < MAX_EDITORS
    }

    fn can_remove(&self) -> bool {
        self.editors.len() > MIN_EDITORS
    }

    fn set_focus(&mut self, index: usize) {
        if let Some(editor) = self.editors.get_mut(self.focus) {
            editor.focused = false;
        }
        self.focus = index;
        self.editors[index].focused = true;
    }

    fn size_editors(&mut self) {
        let (width, height) = if self.width == 0 && self.height == 0 {
            (DEFAULT_WIDTH, DEFAULT_HEIGHT)
        } else {
            (self.width, self.height)
        };
        let each_width = (width as usize) / self.editors.len();
        let each_height = height.saturating_sub(HELP_HEIGHT) as usize;
        for editor in &mut self.editors {
            editor.width = each_width;
            editor.height = each_height;
        }
    }

    fn help(&self) -> String {
        let mut entries = vec!["tab next", "shift+tab prev"];
        if self.can_add() {
            entries.push("ctrl+n add an editor");
        }
        if self.can_remove() {
            entries.push("ctrl+w remove an editor");
        }
        entries.push("esc quit");
        entries.join(HELP_SEPARATOR)
    }
}

impl Default for SplitEditors {
    fn default() -> Self {
        Self::new()
    }
}

impl Model for SplitEditors {
    fn update(&mut self, event: &Event) -> Effect {
        match event {
            Event::Key(key) => match Action::from_key(key) {
                Some(Action::Quit) => {
                    for editor in &mut self.editors {
                        editor.focused = false;
                    }
                    return Effect::Quit;
                }
                Some(Action::Next) => {
                    let next = (self.focus + 1) % self.editors.len();
                    self.set_focus(next);
                }
                Some(Action::Prev) => {
                    let n = self.editors.len();
                    self.set_focus((self.focus + n - 1) % n);
                }
                Some(Action::Add) => {
                    if self.can_add() {
                        self.editors.push(Editor::default());
                    }
                }
                Some(Action::Remove) => {
                    if self.can_remove() {
                        self.editors.pop();
                        let last = self.editors.len() - 1;
                        if self.focus > last {
                            self.focus = last;
                        }
                        self.editors[self.focus].focused = true;
                    }
                }
                None => {
                    if let Some(editor) = self.editors.get_mut(self.focus) {
                        editor.handle_key(key);
                    }
                }
            },
            Event::Resize(size) => {
                self.width = size.width;
                self.height = size.height;
            }
        }

        self.size_editors();
        Effect::None
    }

    fn view(&self) -> String {
        let rendered: Vec<Vec<String>> = self.editors.iter().map(Editor::render).collect();
        let rows = rendered.first().map(Vec::len).unwrap_or(0);

        let mut out = String::new();
        for row in 0..rows {
            for columns in &rendered {
                if let Some(line) = columns.get(row) {
                    out.push_str(line);
                }
            }
            out.push('\n');
        }
        out.push('\n');
        out.push_str(&self.help());
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tea_bridge::WindowSize;

    fn key(k: Key) -> Event {
        Event::Key(k)
    }

    #[test]
    fn test_initial_state() {
        let m = SplitEditors::new();
        assert_eq!(m.editor_count(), INITIAL_EDITORS);
        assert_eq!(m.focus(), 0);
        assert_eq!(m.size(), (0, 0));
        assert!(m.editors[0].focused);
        assert!(!m.editors[1].focused);
    }

    #[test]
    fn test_focus_cycles_both_ways() {
        let mut m = SplitEditors::new();
        m.update(&key(Key::Tab));
        assert_eq!(m.focus(), 1);
        m.update(&key(Key::Tab));
        assert_eq!(m.focus(), 0);

        m.update(&key(Key::Sequence(Key::BACK_TAB.to_vec())));
        assert_eq!(m.focus(), 1);
        assert!(m.editors[1].focused);
        assert!(!m.editors[0].focused);
    }

    #[test]
    fn test_add_and_remove_respect_limits() {
        let mut m = SplitEditors::new();
        for _ in 0..10 {
            m.update(&key(Key::Ctrl('n')));
        }
        assert_eq!(m.editor_count(), MAX_EDITORS);
        assert!(!m.help().contains("ctrl+n"));

        for _ in 0..10 {
            m.update(&key(Key::Ctrl('w')));
        }
        assert_eq!(m.editor_count(), MIN_EDITORS);
        assert!(!m.help().contains("ctrl+w"));
        assert!(m.help().contains("ctrl+n add an editor"));
    }

    #[test]
    fn test_remove_clamps_focus() {
        let mut m = SplitEditors::new();
        m.update(&key(Key::Tab));
        assert_eq!(m.focus(), 1);

        m.update(&key(Key::Ctrl('w')));
        assert_eq!(m.focus(), 0);
        assert!(m.editors[0].focused);
    }

    #[test]
    fn test_typing_goes_to_focused_editor() {
        let mut m = SplitEditors::new();
        for c in "hi".chars() {
            m.update(&key(Key::Char(c)));
        }
        m.update(&key(Key::Tab));
        m.update(&key(Key::Char('x')));
        m.update(&key(Key::Enter));
        m.update(&key(Key::Char('y')));
        m.update(&key(Key::Backspace));

        assert_eq!(m.editor_text(0), Some("hi"));
        assert_eq!(m.editor_text(1), Some("x\n"));
    }

    #[test]
    fn test_quit_blurs_everything() {
        let mut m = SplitEditors::new();
        assert_eq!(m.update(&key(Key::Esc)), Effect::Quit);
        assert!(m.editors.iter().all(|e| !e.focused));

        let mut m = SplitEditors::new();
        assert_eq!(m.update(&key(Key::Ctrl('c'))), Effect::Quit);
    }

    #[test]
    fn test_resize_sizes_editors() {
        let mut m = SplitEditors::new();
        m.update(&Event::Resize(WindowSize::new(100, 30)));
        assert_eq!(m.size(), (100, 30));
        assert!(m.editors.iter().all(|e| e.width == 50 && e.height == 25));

        m.update(&key(Key::Ctrl('n')));
        assert!(m.editors.iter().all(|e| e.width == 33));
    }

    #[test]
    fn test_view_layout() {
        let mut m = SplitEditors::new();
        m.update(&Event::Resize(WindowSize::new(40, 10)));
        m.update(&key(Key::Char('a')));

        let view = m.view();
        let lines: Vec<&str> = view.split('\n').collect();

        // 高さ 10 - 5 = 5 行 + 空行 + ヘルプ
        assert_eq!(lines.len(), 7);
        assert!(lines[..5].iter().all(|l| l.chars().count() == 40));
        assert!(lines[0].starts_with('╭'));
        assert!(lines[1].contains("  1 a█"));
        assert!(lines[1].contains("  1 Type something"));
        assert_eq!(lines[5], "");
        assert!(lines[6].starts_with("tab next • shift+tab prev"));
    }

    #[test]
    fn test_tiny_window_does_not_panic() {
        let mut m = SplitEditors::new();
        m.update(&Event::Resize(WindowSize::new(1, 3)));
        let _ = m.view();

        m.update(&Event::Resize(WindowSize::new(0, 0)));
        assert!(m.view().contains("esc quit"));
    }

    #[test]
    fn test_fit() {
        assert_eq!(fit("abc", 5), "abc  ");
        assert_eq!(fit("abcdef", 3), "abc");
        assert_eq!(fit("☃☃", 3), "☃☃ ");
    }
}
