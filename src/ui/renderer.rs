/// Presentation layer: double-buffered, diff-based terminal renderer.
///
/// How it works:
///   1. Build the next frame into `front` buffer (array of Cell)
///   2. Compare each cell with `back` buffer (previous frame)
///   3. Only emit terminal commands for cells that changed
///   4. All commands are batched with `queue!`, flushed once at the end
///   5. Swap front/back
///
/// The playfield is drawn through a `Viewport` that maps world units to
/// terminal cells (`UNITS_PER_COL` x `UNITS_PER_ROW` units per cell),
/// centred horizontally in the terminal.

use std::io::{self, BufWriter, Write};

use crossterm::{
    cursor::{self, MoveTo},
    event::{
        DisableMouseCapture, EnableMouseCapture, KeyboardEnhancementFlags,
        PopKeyboardEnhancementFlags, PushKeyboardEnhancementFlags,
    },
    execute, queue,
    style::{Color, Print, ResetColor, SetBackgroundColor, SetForegroundColor},
    terminal::{self, Clear, ClearType},
};

use crate::config::GameConfig;
use crate::domain::platform::{Platform, PlatformKind};
use crate::domain::player::{Facing, JumpState, Player};
use crate::sim::diagnostics;
use crate::sim::world::{Phase, WorldState};

// ── Cell: the unit of the back-buffer ──

#[derive(Clone, Copy, PartialEq, Eq)]
struct Cell {
    ch: char,
    fg: Color,
    bg: Color,
}

impl Cell {
    /// Explicit background for every "empty" cell, also used for Clear, so
    /// row gaps on VTE terminals match the cells.
    const BASE_BG: Color = Color::Rgb { r: 18, g: 22, b: 40 };

    const BLANK: Cell = Cell { ch: ' ', fg: Color::White, bg: Cell::BASE_BG };

    /// Sentinel that differs from any real cell; forces a full repaint.
    const INVALID: Cell = Cell { ch: '?', fg: Color::Magenta, bg: Color::Magenta };

    #[inline]
    fn new(ch: char, fg: Color, bg: Color) -> Self {
        let bg = match bg {
            Color::Reset => Self::BASE_BG,
            other => other,
        };
        Cell { ch, fg, bg }
    }
}

// ── FrameBuffer: a 2D grid of Cells ──

struct FrameBuffer {
    width: usize,
    height: usize,
    cells: Vec<Cell>,
}

impl FrameBuffer {
    fn new(w: usize, h: usize) -> Self {
        FrameBuffer { width: w, height: h, cells: vec![Cell::BLANK; w * h] }
    }

    fn resize(&mut self, w: usize, h: usize) {
        if self.width != w || self.height != h {
            self.width = w;
            self.height = h;
            self.cells = vec![Cell::BLANK; w * h];
        }
    }

    fn clear(&mut self) {
        self.cells.fill(Cell::BLANK);
    }

    fn set(&mut self, x: usize, y: usize, cell: Cell) {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x] = cell;
        }
    }

    fn get(&self, x: usize, y: usize) -> Cell {
        if x < self.width && y < self.height {
            self.cells[y * self.width + x]
        } else {
            Cell::BLANK
        }
    }

    fn put_str(&mut self, x: usize, y: usize, s: &str, fg: Color, bg: Color) {
        for (i, ch) in s.chars().enumerate() {
            if x + i >= self.width { break; }
            self.set(x + i, y, Cell::new(ch, fg, bg));
        }
    }

    fn put_centered(&mut self, y: usize, s: &str, fg: Color, bg: Color) {
        let len = s.chars().count();
        let x = self.width.saturating_sub(len) / 2;
        self.put_str(x, y, s, fg, bg);
    }

    fn fill_row(&mut self, y: usize, bg: Color) {
        for x in 0..self.width {
            self.set(x, y, Cell::new(' ', Color::White, bg));
        }
    }
}

// ── Viewport: world units ↔ terminal cells ──

pub const UNITS_PER_COL: f32 = 8.0;
pub const UNITS_PER_ROW: f32 = 20.0;

const HUD_ROW: usize = 0;
const FIELD_ROW: usize = 2;

/// Where the playfield sits on screen.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct Viewport {
    /// Terminal column of the playfield's left edge (inside the frame).
    pub left: usize,
    pub top: usize,
    pub cols: usize,
    pub rows: usize,
}

impl Viewport {
    pub fn fit(cfg: &GameConfig, term_w: usize) -> Self {
        let cols = (cfg.canvas.width / UNITS_PER_COL).ceil().max(1.0) as usize;
        let rows = (cfg.canvas.height / UNITS_PER_ROW).ceil().max(1.0) as usize;
        Viewport {
            left: term_w.saturating_sub(cols + 2) / 2 + 1,
            top: FIELD_ROW,
            cols,
            rows,
        }
    }

    /// Terminal size needed to show the whole playfield with HUD and help.
    pub fn required_size(&self) -> (usize, usize) {
        (self.cols + 2, self.top + self.rows + 3)
    }

    /// Playfield column of world x (may be out of range).
    pub fn col_of(&self, world_x: f32) -> i32 {
        (world_x / UNITS_PER_COL).floor() as i32
    }

    /// Playfield row of a y already relative to the camera.
    pub fn row_of(&self, view_y: f32) -> i32 {
        (view_y / UNITS_PER_ROW).floor() as i32
    }

    /// World x at the centre of a terminal column, if it lies on the field.
    pub fn world_x_at(&self, term_col: u16) -> Option<f32> {
        let col = term_col as usize;
        if col < self.left || col >= self.left + self.cols {
            return None;
        }
        Some(((col - self.left) as f32 + 0.5) * UNITS_PER_COL)
    }
}

/// Blend `c` toward the background by `alpha` (1.0 = unchanged).
fn fade(c: (u8, u8, u8), alpha: f32) -> Color {
    let (br, bgc, bb) = (18.0, 22.0, 40.0);
    let a = alpha.clamp(0.0, 1.0);
    let mix = |v: u8, base: f32| (base + (v as f32 - base) * a).round() as u8;
    Color::Rgb { r: mix(c.0, br), g: mix(c.1, bgc), b: mix(c.2, bb) }
}

// ── Palette ──

const HUD_BG: Color = Color::Rgb { r: 30, g: 36, b: 70 };
const MSG_BG: Color = Color::Rgb { r: 200, g: 180, b: 50 };
const FRAME_FG: Color = Color::Rgb { r: 70, g: 80, b: 120 };
const TITLE_FG: Color = Color::Rgb { r: 120, g: 220, b: 255 };
const ACCENT: Color = Color::Rgb { r: 80, g: 255, b: 120 };
const GOLD: Color = Color::Rgb { r: 255, g: 220, b: 50 };
const DIM: Color = Color::DarkGrey;
const DEBUG_FG: Color = Color::Rgb { r: 140, g: 255, b: 160 };

const NORMAL_RGB: (u8, u8, u8) = (90, 200, 90);
const MOVING_RGB: (u8, u8, u8) = (80, 170, 255);
const BREAKING_RGB: (u8, u8, u8) = (190, 130, 70);
const PLAYER_FG: Color = Color::Rgb { r: 255, g: 235, b: 120 };

pub struct Renderer {
    writer: BufWriter<io::Stdout>,
    front: FrameBuffer,
    back: FrameBuffer,
    term_w: usize,
    term_h: usize,
    last_phase: Option<Phase>,
    viewport: Viewport,
    key_release: bool,
}

impl Renderer {
    pub fn new(cfg: &GameConfig) -> Self {
        Renderer {
            writer: BufWriter::with_capacity(16384, io::stdout()),
            front: FrameBuffer::new(0, 0),
            back: FrameBuffer::new(0, 0),
            term_w: 0,
            term_h: 0,
            last_phase: None,
            viewport: Viewport::fit(cfg, 0),
            key_release: false,
        }
    }

    pub fn init(&mut self) -> io::Result<()> {
        terminal::enable_raw_mode()?;
        execute!(
            self.writer,
            terminal::EnterAlternateScreen,
            EnableMouseCapture,
            cursor::Hide,
            SetBackgroundColor(Cell::BASE_BG),
            Clear(ClearType::All)
        )?;

        let (tw, th) = terminal::size().unwrap_or((80, 24));
        self.term_w = tw as usize;
        self.term_h = th as usize;
        self.front.resize(self.term_w, self.term_h);
        self.back.resize(self.term_w, self.term_h);
        self.back.cells.fill(Cell::INVALID);

        Ok(())
    }

    /// Ask the terminal for key Release events. Returns true if it agreed.
    pub fn enable_key_release(&mut self) -> bool {
        if !matches!(terminal::supports_keyboard_enhancement(), Ok(true)) {
            log::info!("terminal has no key release events; using hold timeout");
            return false;
        }
        let flags = KeyboardEnhancementFlags::REPORT_EVENT_TYPES;
        self.key_release = execute!(self.writer, PushKeyboardEnhancementFlags(flags)).is_ok();
        self.key_release
    }

    pub fn cleanup(&mut self) -> io::Result<()> {
        if self.key_release {
            execute!(self.writer, PopKeyboardEnhancementFlags)?;
            self.key_release = false;
        }
        execute!(
            self.writer,
            ResetColor,
            DisableMouseCapture,
            cursor::Show,
            terminal::LeaveAlternateScreen
        )?;
        terminal::disable_raw_mode()
    }

    /// Current playfield placement (for mapping mouse columns).
    pub fn viewport(&self) -> Viewport {
        self.viewport
    }

    pub fn render(&mut self, world: &WorldState, cfg: &GameConfig) -> io::Result<()> {
        let (tw, th) = terminal::size().unwrap_or((80, 24));
        if tw as usize != self.term_w || th as usize != self.term_h {
            self.term_w = tw as usize;
            self.term_h = th as usize;
            self.front.resize(self.term_w, self.term_h);
            self.back.resize(self.term_w, self.term_h);
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            log::debug!("terminal resized to {}x{}", self.term_w, self.term_h);
        }
        self.viewport = Viewport::fit(cfg, self.term_w);

        if self.last_phase != Some(world.phase) {
            self.back.cells.fill(Cell::INVALID);
            queue!(self.writer, SetBackgroundColor(Cell::BASE_BG), Clear(ClearType::All))?;
            self.last_phase = Some(world.phase);
        }

        self.front.clear();

        let (need_w, need_h) = self.viewport.required_size();
        if self.term_w < need_w || self.term_h < need_h {
            self.compose_too_small(need_w, need_h);
        } else {
            match world.phase {
                Phase::Loading => self.compose_loading(world),
                Phase::Menu => self.compose_menu(world),
                Phase::Playing => self.compose_game(world),
                Phase::Paused => {
                    self.compose_game(world);
                    self.compose_pause_overlay(world);
                }
                Phase::GameOver => {
                    self.compose_game(world);
                    self.compose_game_over(world);
                }
                Phase::Victory => {
                    self.compose_game(world);
                    self.compose_victory(world);
                }
            }
        }

        self.flush_diff()?;
        std::mem::swap(&mut self.front, &mut self.back);
        Ok(())
    }

    // ── Diff flush: only write changed cells ──

    fn flush_diff(&mut self) -> io::Result<()> {
        let mut last_fg = Color::White;
        let mut last_bg = Cell::BASE_BG;
        let mut cursor_at: Option<(usize, usize)> = None;

        // Explicit base colors; ResetColor would fall back to the terminal default.
        queue!(self.writer,
            SetForegroundColor(Color::White),
            SetBackgroundColor(Cell::BASE_BG),
        )?;

        for y in 0..self.front.height {
            for x in 0..self.front.width {
                let cell = self.front.get(x, y);
                if cell == self.back.get(x, y) {
                    continue;
                }

                if cursor_at != Some((x, y)) {
                    queue!(self.writer, MoveTo(x as u16, y as u16))?;
                }
                if cell.fg != last_fg {
                    queue!(self.writer, SetForegroundColor(cell.fg))?;
                    last_fg = cell.fg;
                }
                if cell.bg != last_bg {
                    queue!(self.writer, SetBackgroundColor(cell.bg))?;
                    last_bg = cell.bg;
                }
                queue!(self.writer, Print(cell.ch))?;
                cursor_at = Some((x + 1, y));
            }
        }

        self.writer.flush()
    }

    // ── Compose: build front buffer content ──

    fn compose_too_small(&mut self, need_w: usize, need_h: usize) {
        let msg = format!("Terminal too small: need {}x{}, have {}x{}", need_w, need_h, self.term_w, self.term_h);
        let y = self.front.height / 2;
        self.front.put_centered(y, &msg, GOLD, Color::Reset);
    }

    fn compose_loading(&mut self, w: &WorldState) {
        const SPIN: [char; 4] = ['|', '/', '-', '\\'];
        let spin = SPIN[(w.anim_tick as usize / 4) % SPIN.len()];
        let y = self.front.height / 2;
        self.front.put_centered(y, &format!("{spin} Loading {spin}"), TITLE_FG, Color::Reset);
    }

    fn compose_menu(&mut self, w: &WorldState) {
        let title = [
            r"  ___  _            _                ",
            r" / __|| |__ _  _   | |_   ___  _ __  ",
            r" \__ \| / /| || |  | ' \ / _ \| '_ \ ",
            r" |___/|_\_\ \_, |  |_||_|\___/| .__/ ",
            r"            |__/              |_|    ",
        ];
        for (i, line) in title.iter().enumerate() {
            self.front.put_centered(2 + i, line, TITLE_FG, Color::Reset);
        }
        self.front.put_centered(8, "bounce higher, never look down", DIM, Color::Reset);

        // Little hopper bobbing over a platform
        let bob = if (w.anim_tick / 10) % 2 == 0 { 0 } else { 1 };
        self.front.put_centered(10 + bob, "(^o^)", PLAYER_FG, Color::Reset);
        self.front.put_centered(11 + bob, " /|\\ ", PLAYER_FG, Color::Reset);
        self.front.put_centered(13, "=========", fade(NORMAL_RGB, 1.0), Color::Reset);

        let best = format!("Best: {}", w.high_score);
        self.front.put_centered(15, &best, GOLD, Color::Reset);

        self.front.put_centered(17, "ENTER / SPACE   Start", ACCENT, Color::Reset);
        self.front.put_centered(18, "Q               Quit ", Color::White, Color::Reset);

        let help = [
            "Controls",
            "  Left/Right, A/D    Steer",
            "  Mouse drag         Steer to pointer",
            "  P / F1             Pause",
            "  R                  Restart",
            "  F3                 Debug overlay",
            "  ESC                Menu",
        ];
        for (i, line) in help.iter().enumerate() {
            let color = if i == 0 { GOLD } else { Color::White };
            self.front.put_centered(20 + i, &format!("{:<38}", line), color, Color::Reset);
        }
    }

    fn compose_game(&mut self, w: &WorldState) {
        let vp = self.viewport;

        // ── HUD row ──
        self.front.fill_row(HUD_ROW, HUD_BG);
        let hud = format!(
            " Score {:<6}  Best {:<6}  Height {:>5}m",
            w.score, w.high_score.max(w.score), (w.best_height / 10.0).floor() as i64,
        );
        self.front.put_str(vp.left.saturating_sub(1), HUD_ROW, &hud, Color::White, HUD_BG);

        // ── Frame ──
        for r in 0..vp.rows {
            self.front.set(vp.left - 1, vp.top + r, Cell::new('│', FRAME_FG, Color::Reset));
            self.front.set(vp.left + vp.cols, vp.top + r, Cell::new('│', FRAME_FG, Color::Reset));
        }

        for p in w.platforms.iter() {
            self.compose_platform(w, p);
        }
        self.compose_player(w, &w.player);
        if w.debug_overlay {
            self.compose_debug(w);
        }

        // ── Message bar ──
        let msg_row = vp.top + vp.rows;
        if !w.message.is_empty() {
            self.front.fill_row(msg_row, MSG_BG);
            self.front.put_centered(msg_row, &format!(" {} ", w.message), Color::Black, MSG_BG);
        }

        // ── Help bar ──
        let help = "←→/AD steer  mouse drag  P pause  R restart  F3 debug  ESC menu";
        self.front.put_centered(msg_row + 2, help, DIM, Color::Reset);
    }

    /// Diagnostics panel in the playfield's top-left corner.
    fn compose_debug(&mut self, w: &WorldState) {
        let vp = self.viewport;
        let bg = Color::Rgb { r: 10, g: 10, b: 16 };
        for (i, line) in diagnostics::debug_lines(w).iter().enumerate().take(vp.rows) {
            let text: String = line.chars().take(vp.cols).collect();
            self.front.put_str(vp.left, vp.top + i, &text, DEBUG_FG, bg);
        }
    }

    fn compose_platform(&mut self, w: &WorldState, p: &Platform) {
        let vp = self.viewport;
        let row = vp.row_of(w.camera.to_view(p.y));
        if row < 0 || row >= vp.rows as i32 { return; }

        let (rgb, ch) = match p.kind {
            PlatformKind::Normal => (NORMAL_RGB, '═'),
            PlatformKind::Moving => (MOVING_RGB, '≡'),
            PlatformKind::Breaking if p.is_breaking() && p.opacity() < 0.5 => (BREAKING_RGB, '░'),
            PlatformKind::Breaking => (BREAKING_RGB, '▒'),
        };
        let fg = fade(rgb, p.opacity());

        let c0 = vp.col_of(p.x);
        let c1 = vp.col_of(p.x + p.width - 0.01);
        for c in c0.max(0)..=c1.min(vp.cols as i32 - 1) {
            self.front.set(vp.left + c as usize, vp.top + row as usize, Cell::new(ch, fg, Color::Reset));
        }
    }

    fn compose_player(&mut self, w: &WorldState, p: &Player) {
        let vp = self.viewport;
        let head = match p.state {
            JumpState::Jumping => "(^o^)",
            JumpState::Grounded => "(^_^)",
            JumpState::Airborne => "(o_o)",
        };
        let legs = match p.facing {
            Facing::Right => " /|> ",
            Facing::Left => " <|\\ ",
        };

        let top = vp.row_of(w.camera.to_view(p.y));
        let bottom = vp.row_of(w.camera.to_view(p.y + p.height - 0.01));
        let sprite_w = head.chars().count() as i32;
        let c0 = vp.col_of(p.center_x()) - sprite_w / 2;

        for (i, line) in [head, legs].iter().enumerate() {
            let row = if i == 0 { top } else { bottom.max(top + 1) };
            if row < 0 || row >= vp.rows as i32 { continue; }
            for (j, ch) in line.chars().enumerate() {
                let c = c0 + j as i32;
                if c < 0 || c >= vp.cols as i32 || ch == ' ' { continue; }
                self.front.set(vp.left + c as usize, vp.top + row as usize, Cell::new(ch, PLAYER_FG, Color::Reset));
            }
        }
    }

    /// Dark box centred on the playfield; returns (x, y, width).
    fn overlay_box(&mut self, height: usize) -> (usize, usize, usize) {
        let vp = self.viewport;
        let box_w = 34_usize.min(vp.cols);
        let box_h = height.min(vp.rows);
        let x = vp.left + (vp.cols - box_w) / 2;
        let y = vp.top + (vp.rows - box_h) / 2;
        let bg = Color::Rgb { r: 40, g: 40, b: 55 };
        for yy in y..y + box_h {
            for xx in x..x + box_w {
                self.front.set(xx, yy, Cell::new(' ', Color::White, bg));
            }
        }
        (x, y, box_w)
    }

    fn put_in_box(&mut self, bx: usize, bw: usize, y: usize, s: &str, fg: Color) {
        let bg = Color::Rgb { r: 40, g: 40, b: 55 };
        let len = s.chars().count();
        self.front.put_str(bx + bw.saturating_sub(len) / 2, y, s, fg, bg);
    }

    fn compose_pause_overlay(&mut self, w: &WorldState) {
        let (x, y, bw) = self.overlay_box(8);
        let blink = (w.anim_tick / 8) % 2 == 0;
        let label = if blink { "▶  PAUSED  ◀" } else { "   PAUSED   " };
        self.put_in_box(x, bw, y + 1, label, GOLD);
        self.put_in_box(x, bw, y + 3, "P / F1   Resume ", Color::White);
        self.put_in_box(x, bw, y + 4, "R        Restart", Color::White);
        self.put_in_box(x, bw, y + 5, "ESC      Menu   ", Color::White);
    }

    fn compose_game_over(&mut self, w: &WorldState) {
        let (x, y, bw) = self.overlay_box(11);
        self.put_in_box(x, bw, y + 1, "✕  GAME OVER  ✕", Color::Rgb { r: 255, g: 80, b: 80 });
        self.put_in_box(x, bw, y + 3, &format!("Score: {}", w.score), Color::White);
        self.put_in_box(x, bw, y + 4, &format!("Best:  {}", w.high_score), GOLD);
        if w.new_high_score && (w.anim_tick / 8) % 2 == 0 {
            self.put_in_box(x, bw, y + 5, "★ NEW RECORD ★", ACCENT);
        }
        self.put_in_box(x, bw, y + 7, "ENTER  Play again", ACCENT);
        self.put_in_box(x, bw, y + 8, "S      Share     ", Color::White);
        self.put_in_box(x, bw, y + 9, "ESC    Menu      ", DIM);
    }

    fn compose_victory(&mut self, w: &WorldState) {
        let (x, y, bw) = self.overlay_box(11);
        self.put_in_box(x, bw, y + 1, "★  YOU REACHED THE SKY  ★", GOLD);
        self.put_in_box(x, bw, y + 3, &format!("Score: {}", w.score), Color::White);
        self.put_in_box(x, bw, y + 4, &format!("Best:  {}", w.high_score), GOLD);
        if w.new_high_score {
            self.put_in_box(x, bw, y + 5, "NEW RECORD", ACCENT);
        }
        self.put_in_box(x, bw, y + 7, "ENTER  Play again", ACCENT);
        self.put_in_box(x, bw, y + 8, "S      Share     ", Color::White);
        self.put_in_box(x, bw, y + 9, "ESC    Menu      ", DIM);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn viewport_fits_default_canvas() {
        let cfg = GameConfig::default();
        let vp = Viewport::fit(&cfg, 80);
        assert_eq!((vp.cols, vp.rows), (45, 30));
        assert_eq!(vp.left, (80 - 47) / 2 + 1);
        assert_eq!(vp.required_size(), (47, 35));
    }

    #[test]
    fn columns_map_back_to_world_x() {
        let cfg = GameConfig::default();
        let vp = Viewport::fit(&cfg, 80);
        assert_eq!(vp.world_x_at(vp.left as u16), Some(UNITS_PER_COL / 2.0));
        assert_eq!(vp.world_x_at((vp.left - 1) as u16), None);
        assert_eq!(vp.world_x_at((vp.left + vp.cols) as u16), None);
        let x = vp.world_x_at((vp.left + 10) as u16).unwrap();
        assert_eq!(vp.col_of(x), 10);
    }

    #[test]
    fn rows_floor_toward_top() {
        let cfg = GameConfig::default();
        let vp = Viewport::fit(&cfg, 80);
        assert_eq!(vp.row_of(0.0), 0);
        assert_eq!(vp.row_of(19.9), 0);
        assert_eq!(vp.row_of(20.0), 1);
        assert_eq!(vp.row_of(-0.1), -1);
    }

    #[test]
    fn fade_reaches_background() {
        assert_eq!(fade((200, 100, 50), 1.0), Color::Rgb { r: 200, g: 100, b: 50 });
        assert_eq!(fade((200, 100, 50), 0.0), Cell::BASE_BG);
    }
}
