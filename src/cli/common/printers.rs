// This Source Code Form is subject to the terms of the Mozilla Public
// License, v. 2.0. If a copy of the MPL was not distributed with this
// file, You can obtain one at http://mozilla.org/MPL/2.0/.

//! Pretty printers for reporting information.

use std::{
    borrow::Cow,
    sync::{Mutex, PoisonError},
};

use log::Level;

const VERTICAL: char = '│';
const UP_AND_RIGHT: char = '└';
const VERTICAL_AND_RIGHT: char = '├';

type Block = Vec<Cow<'static, str>>;

lazy_static::lazy_static! {
    static ref WARNINGS: Mutex<Vec<Block>> = Mutex::new(vec![]);
}

/// Log a bold title, then each block of lines as a branch of a tree.
fn log_tree(level: Level, title: &str, blocks: &[Block]) {
    log::log!(level, "{}", console::style(title).bold());
    let num_blocks = blocks.len();
    for (i_block, block) in blocks.iter().enumerate() {
        let num_lines = block.len();
        for (i_line, line) in block.iter().enumerate() {
            let symbol = match (i_line, i_line + 1 == num_lines, i_block + 1 == num_blocks) {
                (0, false, _) | (0, _, false) => VERTICAL_AND_RIGHT,
                (0, true, true) => UP_AND_RIGHT,
                _ => VERTICAL,
            };
            log::log!(level, "{symbol} {line}");
        }
    }
    log::log!(level, "");
}

/// Collects blocks of information about a run, then logs them all at once.
pub(crate) struct InfoPrinter {
    title: Cow<'static, str>,
    blocks: Vec<Block>,
}

impl InfoPrinter {
    pub(crate) fn new(title: Cow<'static, str>) -> Self {
        Self {
            title,
            blocks: vec![],
        }
    }

    pub(crate) fn push_line(&mut self, line: Cow<'static, str>) {
        self.blocks.push(vec![line]);
    }

    pub(crate) fn push_block(&mut self, block: Block) {
        self.blocks.push(block);
    }

    pub(crate) fn display(self) {
        log_tree(Level::Info, &self.title, &self.blocks);
    }
}

fn push_warning(block: Block) {
    WARNINGS
        .lock()
        .unwrap_or_else(PoisonError::into_inner)
        .push(block);
}

/// Things that can be deferred as warnings until [`display_warnings`] is
/// called.
pub(crate) trait Warn {
    fn warn(self);
}

impl Warn for &'static str {
    fn warn(self) {
        push_warning(vec![self.into()]);
    }
}

impl Warn for String {
    fn warn(self) {
        push_warning(vec![self.into()]);
    }
}

impl Warn for Cow<'static, str> {
    fn warn(self) {
        push_warning(vec![self]);
    }
}

impl Warn for Vec<Cow<'static, str>> {
    fn warn(self) {
        push_warning(self);
    }
}

impl<const N: usize> Warn for [Cow<'static, str>; N] {
    fn warn(self) {
        push_warning(self.to_vec());
    }
}

/// Print out any warnings that have been collected as CLI arguments have been
/// parsed, then forget them.
pub(crate) fn display_warnings() {
    log::debug!("Displaying warnings");
    let mut warnings = WARNINGS.lock().unwrap_or_else(PoisonError::into_inner);
    if !warnings.is_empty() {
        log_tree(Level::Warn, "Warnings", &warnings);
        warnings.clear();
    }
}

/// The number of warnings waiting to be displayed.
#[cfg(test)]
pub(crate) fn num_pending_warnings() -> usize {
    WARNINGS.lock().unwrap_or_else(PoisonError::into_inner).len()
}
