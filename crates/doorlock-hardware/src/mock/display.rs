//! Mock character display for testing and development.
//!
//! Keeps a rows × columns grid of cells. The handle reads back each line as
//! it would appear on the glass, with trailing blanks trimmed.

use crate::{HardwareError, Result, traits::CharacterDisplay};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

/// Display operation, as recorded in the call log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisplayOp {
    Clear,
    SetCursor { column: u8, row: u8 },
    Print(String),
}

#[derive(Debug)]
struct Panel {
    cells: Vec<Vec<char>>,
    cursor: (usize, usize),
    log: Vec<DisplayOp>,
    fault: Option<HardwareError>,
}

impl Panel {
    fn blank(&mut self) {
        for row in &mut self.cells {
            row.iter_mut().for_each(|cell| *cell = ' ');
        }
        self.cursor = (0, 0);
    }
}

fn lock(panel: &Mutex<Panel>) -> MutexGuard<'_, Panel> {
    panel.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Mock HD44780-style display.
///
/// # Examples
///
/// ```
/// use doorlock_hardware::CharacterDisplay;
/// use doorlock_hardware::mock::MockDisplay;
///
/// #[tokio::main]
/// async fn main() -> doorlock_hardware::Result<()> {
///     let (mut display, handle) = MockDisplay::new(16, 2);
///     display.set_cursor(0, 1).await?;
///     display.print("VALID").await?;
///
///     assert_eq!(handle.line(1), "VALID");
///     Ok(())
/// }
/// ```
#[derive(Debug)]
pub struct MockDisplay {
    panel: Arc<Mutex<Panel>>,
}

impl MockDisplay {
    /// Create a blank display of `columns` × `rows` cells.
    pub fn new(columns: u8, rows: u8) -> (Self, MockDisplayHandle) {
        let panel = Arc::new(Mutex::new(Panel {
            cells: vec![vec![' '; usize::from(columns)]; usize::from(rows)],
            cursor: (0, 0),
            log: Vec::new(),
            fault: None,
        }));
        let handle = MockDisplayHandle {
            panel: Arc::clone(&panel),
        };
        (Self { panel }, handle)
    }

    fn apply(&self, op: DisplayOp) -> Result<()> {
        let mut panel = lock(&self.panel);
        if let Some(fault) = panel.fault.take() {
            return Err(fault);
        }

        match &op {
            DisplayOp::Clear => panel.blank(),
            DisplayOp::SetCursor { column, row } => {
                panel.cursor = (usize::from(*column), usize::from(*row));
            }
            DisplayOp::Print(text) => {
                let (mut column, row) = panel.cursor;
                if let Some(cells) = panel.cells.get_mut(row) {
                    for ch in text.chars() {
                        match cells.get_mut(column) {
                            Some(cell) => *cell = ch,
                            None => break,
                        }
                        column += 1;
                    }
                }
                panel.cursor.0 = column;
            }
        }

        panel.log.push(op);
        Ok(())
    }
}

impl CharacterDisplay for MockDisplay {
    async fn clear(&mut self) -> Result<()> {
        self.apply(DisplayOp::Clear)
    }

    async fn set_cursor(&mut self, column: u8, row: u8) -> Result<()> {
        self.apply(DisplayOp::SetCursor { column, row })
    }

    async fn print(&mut self, text: &str) -> Result<()> {
        self.apply(DisplayOp::Print(text.to_string()))
    }
}

/// Handle for inspecting a [`MockDisplay`].
#[derive(Debug, Clone)]
pub struct MockDisplayHandle {
    panel: Arc<Mutex<Panel>>,
}

impl MockDisplayHandle {
    /// Contents of `row` with trailing blanks removed. Empty for rows
    /// outside the panel.
    pub fn line(&self, row: usize) -> String {
        lock(&self.panel)
            .cells
            .get(row)
            .map(|cells| cells.iter().collect::<String>().trim_end().to_string())
            .unwrap_or_default()
    }

    /// Every operation applied so far.
    pub fn operations(&self) -> Vec<DisplayOp> {
        lock(&self.panel).log.clone()
    }

    /// Number of successful clears.
    pub fn clears(&self) -> usize {
        lock(&self.panel)
            .log
            .iter()
            .filter(|op| **op == DisplayOp::Clear)
            .count()
    }

    /// Make the next operation fail with `error`.
    pub fn fail_next(&self, error: HardwareError) {
        lock(&self.panel).fault = Some(error);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_print_clips_at_last_column() {
        let (mut display, handle) = MockDisplay::new(4, 2);
        display.print("ABCDEFG").await.unwrap();

        assert_eq!(handle.line(0), "ABCD");
        assert_eq!(handle.line(1), "");
    }

    #[tokio::test]
    async fn test_cursor_and_clear() {
        let (mut display, handle) = MockDisplay::new(16, 2);
        display.set_cursor(0, 0).await.unwrap();
        display.print("Smart Lock").await.unwrap();
        display.set_cursor(0, 1).await.unwrap();
        display.print("DOOR LOCKED").await.unwrap();

        assert_eq!(handle.line(0), "Smart Lock");
        assert_eq!(handle.line(1), "DOOR LOCKED");

        display.clear().await.unwrap();
        assert_eq!(handle.line(0), "");
        assert_eq!(handle.line(1), "");
        assert_eq!(handle.clears(), 1);
    }

    #[tokio::test]
    async fn test_print_outside_rows_is_ignored() {
        let (mut display, handle) = MockDisplay::new(16, 2);
        display.set_cursor(0, 5).await.unwrap();
        display.print("lost").await.unwrap();

        assert_eq!(handle.line(5), "");
        assert_eq!(handle.operations().len(), 2);
    }

    #[tokio::test]
    async fn test_fault_is_not_logged() {
        let (mut display, handle) = MockDisplay::new(16, 2);
        handle.fail_next(HardwareError::bus("i2c nack"));

        assert!(display.clear().await.is_err());
        assert!(handle.operations().is_empty());
        assert!(display.clear().await.is_ok());
    }
}
