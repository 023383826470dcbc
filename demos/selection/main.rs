use anyhow::{bail, ensure, Context, Result};
use clap::Parser;
use rangeset::{RangeSet, RangeSetIter};
use tracing::{debug, info};

/// Tracks a cell selection on a 2D grid with a RangeSet over row-major cell
/// indices, the way a table widget tracks its selected rows and columns.
///
/// Operations are applied left to right to an initially empty selection,
/// then the resulting selection is rendered.
#[derive(Debug, Clone, Parser)]
#[command(name = "selection-demo", rename_all = "kebab-case")]
struct Opt {
    /// Width of the grid, in cells.
    #[arg(long, default_value_t = 16)]
    cols: u32,

    /// Height of the grid, in cells.
    #[arg(long, default_value_t = 8)]
    rows: u32,

    /// Logging level to use: one of "error", "warn", "info", "debug", "trace"
    #[arg(short, long, default_value = "info")]
    log_level: tracing::Level,

    /// Operations, each two words: `select SPEC`, `deselect SPEC` or
    /// `toggle SPEC`, where SPEC is `COL,ROW` or `COL,ROW+WxH`.
    #[arg(required = true)]
    ops: Vec<String>,
}

/// A rectangle of cells, given as `COL,ROW` (a single cell) or `COL,ROW+WxH`.
#[derive(Debug, Copy, Clone)]
struct Rect {
    col: u32,
    row: u32,
    width: u32,
    height: u32,
}

impl Rect {
    fn parse(spec: &str) -> Result<Rect> {
        let (corner, size) = match spec.split_once('+') {
            Some((corner, size)) => (corner, Some(size)),
            None => (spec, None),
        };
        let (col, row) = corner
            .split_once(',')
            .with_context(|| format!("expected COL,ROW in '{spec}'"))?;
        let (width, height) = match size {
            Some(size) => size
                .split_once('x')
                .with_context(|| format!("expected WxH after '+' in '{spec}'"))?,
            None => ("1", "1"),
        };
        Ok(Rect {
            col: col.parse().with_context(|| format!("bad column in '{spec}'"))?,
            row: row.parse().with_context(|| format!("bad row in '{spec}'"))?,
            width: width.parse().with_context(|| format!("bad width in '{spec}'"))?,
            height: height.parse().with_context(|| format!("bad height in '{spec}'"))?,
        })
    }

    fn check_within(&self, cols: u32, rows: u32) -> Result<()> {
        ensure!(
            self.col as u64 + self.width as u64 <= cols as u64
                && self.row as u64 + self.height as u64 <= rows as u64,
            "rectangle {self:?} does not fit a {cols}x{rows} grid"
        );
        Ok(())
    }

    /// Row-major index of the top-left cell.
    fn origin(&self, cols: u32) -> u32 {
        self.row * cols + self.col
    }
}

fn apply(selection: &mut RangeSet, op: &str, rect: Rect, cols: u32) -> Result<()> {
    match op {
        "select" => selection.add_rectangle(rect.origin(cols), rect.width, rect.height, cols),
        "deselect" => selection.remove_rectangle(rect.origin(cols), rect.width, rect.height, cols),
        "toggle" => {
            let mut flipped = RangeSet::new();
            flipped.add_rectangle(rect.origin(cols), rect.width, rect.height, cols);
            *selection ^= &flipped;
        }
        other => bail!("unknown operation '{other}' (expected select, deselect or toggle)"),
    }
    Ok(())
}

fn render(selection: &RangeSet, cols: u32, rows: u32) {
    for row in 0..rows {
        let line: String = (0..cols)
            .map(|col| if selection.contains(row * cols + col) { '#' } else { '.' })
            .collect();
        println!("{line}");
    }
}

fn main() -> Result<()> {
    let opt = Opt::parse();

    // set up logger
    let subscriber = tracing_subscriber::fmt()
        .with_timer(tracing_subscriber::fmt::time::Uptime::from(std::time::Instant::now()))
        .with_max_level(opt.log_level)
        .finish();
    tracing::subscriber::set_global_default(subscriber)?;

    ensure!(opt.cols > 0 && opt.rows > 0, "the grid must have at least one cell");
    ensure!(opt.ops.len() % 2 == 0, "operations come in pairs: OP SPEC");

    let mut selection = RangeSet::new();
    for pair in opt.ops.chunks(2) {
        let rect = Rect::parse(&pair[1])?;
        rect.check_within(opt.cols, opt.rows)?;
        apply(&mut selection, &pair[0], rect, opt.cols)?;
        info!(
            "{} {}: {} cells selected in {} blocks",
            pair[0],
            pair[1],
            selection.size(),
            selection.iter_runs().count()
        );
    }

    render(&selection, opt.cols, opt.rows);

    if selection.is_empty() {
        info!("nothing selected");
        return Ok(());
    }
    let first = RangeSetIter::first(&selection);
    let last = RangeSetIter::last(&selection);
    info!(
        "{} cells selected, cursor range {} to {}",
        selection.size(),
        first.value(),
        last.value()
    );
    for block in selection.iter_runs() {
        debug!("selected block {:?}", block);
    }
    Ok(())
}
